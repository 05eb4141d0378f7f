//! Hand-off of extracted meshes to an external renderer.
//!
//! This crate owns no window, graphics context or frame loop. A renderer
//! implements [`RenderSink`] and receives flat buffers it can upload as-is.

use crate::{error::Result, mesh::IsoMesh, types::Value};

/// Flat vertex and index buffers ready for upload.
///
/// ```text
/// positions = [x0, y0, z0,  x1, y1, z1, ...]
/// normals   = [nx0, ny0, nz0, ...]            (empty when normals are disabled)
/// indices   = [a0, b0, c0,  a1, b1, c1, ...]  (counter-clockwise from outside)
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderBuffers {
    pub positions: Vec<Value>,
    pub normals: Vec<Value>,
    pub indices: Vec<u32>,
}

impl RenderBuffers {
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

impl From<&IsoMesh> for RenderBuffers {
    fn from(mesh: &IsoMesh) -> Self {
        Self {
            positions: mesh.vertices.as_flattened().to_vec(),
            normals: mesh.normals.as_flattened().to_vec(),
            indices: mesh.indices.as_flattened().to_vec(),
        }
    }
}

impl From<IsoMesh> for RenderBuffers {
    fn from(mesh: IsoMesh) -> Self {
        Self::from(&mesh)
    }
}

/// Anything that can draw a triangle mesh.
pub trait RenderSink {
    /// Receives one mesh worth of buffers.
    fn submit(&mut self, buffers: &RenderBuffers) -> Result<()>;
}

/// Validates `mesh` and submits it to `sink`.
///
/// A mesh whose indices point past its vertex buffer is never handed over.
pub fn render_mesh<S: RenderSink + ?Sized>(mesh: &IsoMesh, sink: &mut S) -> Result<()> {
    mesh.validate()?;
    sink.submit(&RenderBuffers::from(mesh))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IsosurfaceError;

    #[derive(Default)]
    struct Recorder {
        frames: Vec<RenderBuffers>,
    }

    impl RenderSink for Recorder {
        fn submit(&mut self, buffers: &RenderBuffers) -> Result<()> {
            self.frames.push(buffers.clone());
            Ok(())
        }
    }

    fn triangle() -> IsoMesh {
        IsoMesh {
            vertices: vec![[0., 0., 0.], [1., 0., 0.], [0., 1., 0.]],
            normals: vec![[0., 0., 1.]; 3],
            indices: vec![[0, 1, 2]],
        }
    }

    #[test]
    fn buffers_are_interleaved_triples() {
        let buffers = RenderBuffers::from(&triangle());
        assert_eq!(buffers.positions, vec![0., 0., 0., 1., 0., 0., 0., 1., 0.]);
        assert_eq!(buffers.normals.len(), 9);
        assert_eq!(buffers.indices, vec![0, 1, 2]);
        assert_eq!(buffers.vertex_count(), 3);
        assert_eq!(buffers.triangle_count(), 1);
    }

    #[test]
    fn valid_meshes_reach_the_sink() {
        let mut sink = Recorder::default();
        render_mesh(&triangle(), &mut sink).unwrap();
        assert_eq!(sink.frames.len(), 1);
    }

    #[test]
    fn broken_meshes_never_reach_the_sink() {
        let mut mesh = triangle();
        mesh.indices.push([0, 2, 3]);
        let mut sink = Recorder::default();
        assert!(matches!(
            render_mesh(&mesh, &mut sink),
            Err(IsosurfaceError::InvalidIndex { .. })
        ));
        assert!(sink.frames.is_empty());
    }
}
