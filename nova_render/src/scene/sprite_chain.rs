/// SpriteChain - textured quads sharing one material

use std::sync::Arc;
use glam::Vec3;
use crate::camera::AABB;
use crate::error::Result;
use crate::material::MaterialInstance;
use crate::render_element::{RenderElementOwner, RenderElementPools, SpriteChainElement, SpriteVertex};
use super::{ElementData, InstancedRenderable};

pub struct SpriteChain {
    material: Arc<MaterialInstance>,
    vertices: Arc<[SpriteVertex]>,
    aabb: AABB,
    render_layer: u8,
}

impl SpriteChain {
    /// `vertices` holds four corners per sprite; a trailing partial sprite is ignored
    pub fn new(material: Arc<MaterialInstance>, vertices: Vec<SpriteVertex>) -> Self {
        let aabb = bounds(&vertices);
        Self {
            material,
            vertices: vertices.into(),
            aabb,
            render_layer: 0,
        }
    }

    pub fn with_render_layer(mut self, render_layer: u8) -> Self {
        self.render_layer = render_layer;
        self
    }

    pub fn sprite_count(&self) -> usize {
        self.vertices.len() / 4
    }
}

fn bounds(vertices: &[SpriteVertex]) -> AABB {
    if vertices.is_empty() {
        return AABB::new(Vec3::ZERO, Vec3::ZERO);
    }
    let (min, max) = vertices.iter().fold(
        (Vec3::splat(f32::MAX), Vec3::splat(f32::MIN)),
        |(min, max), vertex| {
            let position = Vec3::from(vertex.position);
            (min.min(position), max.max(position))
        },
    );
    AABB::new(min, max)
}

impl InstancedRenderable for SpriteChain {
    fn aabb(&self) -> AABB {
        self.aabb
    }

    fn render_layer(&self) -> u8 {
        self.render_layer
    }

    fn material_count(&self) -> usize {
        1
    }

    fn material(&self, index: usize) -> Option<Arc<MaterialInstance>> {
        (index == 0).then(|| self.material.clone())
    }

    fn build_elements(
        &self,
        pass_index: usize,
        data: &ElementData,
        pools: &mut RenderElementPools,
        elements: &mut Vec<RenderElementOwner>,
    ) -> Result<()> {
        let Some(pipeline) = self.material.pass_pipeline(pass_index) else {
            return Ok(());
        };
        let (owner, _) = pools.allocate(SpriteChainElement {
            render_layer: self.render_layer,
            pipeline,
            material: self.material.clone(),
            world_matrix: data.world_matrix,
            vertices: self.vertices.clone(),
            world_aabb: data.world_aabb,
            scissor: data.scissor,
        })?;
        elements.push(owner);
        Ok(())
    }
}
