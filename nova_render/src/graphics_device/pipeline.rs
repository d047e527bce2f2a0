/// Pipeline trait

/// Shader stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
    Compute,
}

/// Compiled graphics pipeline (shaders, vertex layout, blend/depth state).
///
/// Pipelines are created by the backend from shader sources, which are
/// outside the render core; the core only binds them.
pub trait Pipeline: Send + Sync {
    /// Debug name
    fn name(&self) -> &str;
}
