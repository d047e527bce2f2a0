//! Camera module: viewer camera, frustum and bounding boxes.
//!
//! Plain data used by the frame pipeline to cull world instances and
//! lights per viewer.

mod aabb;
mod camera;
mod frustum;

pub use aabb::AABB;
pub use camera::Camera;
pub use frustum::Frustum;
