pub mod assemble;
pub mod classify;
pub mod error;
pub mod extract;
pub mod interp;
pub mod mesh;
#[cfg(feature = "bevy")]
pub mod plugin;
pub mod render;
pub mod tables;
pub mod types;
pub mod volume;

pub use error::{IsosurfaceError, Result};
pub use extract::{ExtractConfig, compute_mesh, compute_mesh_with};
pub use mesh::IsoMesh;
#[cfg(feature = "bevy")]
pub use plugin::IsosurfacePlugin;
pub use render::{RenderBuffers, RenderSink, render_mesh};
pub use types::{Point, Sample, Value, Vector};
pub use volume::Volume;
