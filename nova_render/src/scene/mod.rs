//! Scene data fed to the frame pipeline
//!
//! Renderables (models, sprite chains) build render elements for the
//! material passes they support. Lights and the debug drawer are plain
//! values the frame pipeline reads every frame.

mod instanced_renderable;
mod model;
mod sprite_chain;
mod light;
mod debug_drawer;

pub use instanced_renderable::{ElementData, InstancedRenderable};
pub use model::{Model, Submesh};
pub use sprite_chain::SpriteChain;
pub use light::{Light, LightData, LightHeader, pack_light_buffer, select_lights};
pub use debug_drawer::DebugDrawer;
