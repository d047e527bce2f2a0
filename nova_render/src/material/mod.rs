/// Material module - material instances and material pass names.

mod material_instance;
mod material_pass_registry;

pub use material_instance::{MaterialId, MaterialInstance, MaterialTexture};
pub use material_pass_registry::MaterialPassRegistry;
