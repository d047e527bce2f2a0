/// Per-frame recording contexts and deferred GPU object release

pub mod transient_resources;
pub mod render_resources;
pub mod render_image;

pub use transient_resources::TransientResources;
pub use render_resources::RenderResources;
pub use render_image::{RenderSurface, RenderImage};
