use derive_more::Display;

pub type Result<T> = core::result::Result<T, IsosurfaceError>;

#[derive(Debug, Display, Clone, PartialEq)]
pub enum IsosurfaceError {
    /// A lattice index had a component outside `[0, size)`.
    #[display("lattice index {index:?} is outside a volume of size {size}")]
    OutOfBounds { index: [usize; 3], size: usize },

    /// The volume cannot be meshed (too small, wrong sample count, bad spacing, ...).
    #[display("invalid volume: {_0}")]
    InvalidVolume(String),

    /// A triangle references a vertex the mesh does not have.
    #[display("triangle {triangle} references vertex {vertex} of {vertex_count}")]
    InvalidIndex {
        triangle: usize,
        vertex: u32,
        vertex_count: usize,
    },

    /// The mesh grew past what `u32` triangle indices can address.
    #[display("mesh needs {vertices} vertices, more than u32 indices can address")]
    IndexOverflow { vertices: usize },
}

impl std::error::Error for IsosurfaceError {}
