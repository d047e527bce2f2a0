/// Maps material pass names ("DepthPass", "ForwardPass", ...) to dense indices.
///
/// Material instances store one pipeline per pass index; frame pipeline
/// passes look their index up once at construction.

use rustc_hash::FxHashMap;

#[derive(Debug, Default, Clone)]
pub struct MaterialPassRegistry {
    indices: FxHashMap<String, usize>,
    names: Vec<String>,
}

impl MaterialPassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `name`, returning its index (existing names keep theirs)
    pub fn register_pass(&mut self, name: &str) -> usize {
        if let Some(&index) = self.indices.get(name) {
            return index;
        }
        let index = self.names.len();
        self.names.push(name.to_string());
        self.indices.insert(name.to_string(), index);
        index
    }

    pub fn pass_index(&self, name: &str) -> Option<usize> {
        self.indices.get(name).copied()
    }

    pub fn pass_name(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
