//! Canonical texture ordering shared by every material in a cook pass.

use std::collections::HashMap;

use crate::material::derived::{DerivedMaterialParamSet, ParamValue};

/// Ordered, duplicate-free texture names. Indices are only stable within the
/// cook pass that built the list.
#[derive(Debug, Clone, Default)]
pub struct TextureList {
  names:   Vec<String>,
  indices: HashMap<String, u32>,
}

impl TextureList {
  /// Assigns every texture parameter an index, in registry order.
  ///
  /// The first sight of a name appends it; later sights reuse its index. The
  /// index is stored next to the name on each parameter.
  pub fn build(derived: &mut [DerivedMaterialParamSet]) -> Self {
    let mut list = Self::default();
    for set in derived.iter_mut() {
      for param in set.params.iter_mut() {
        if let ParamValue::Texture(texture) = &mut param.value {
          texture.index = Some(list.insert(&texture.name));
        }
      }
    }
    list
  }

  fn insert(&mut self, name: &str) -> u32 {
    if let Some(&index) = self.indices.get(name) {
      return index;
    }
    let index = self.names.len() as u32;
    self.names.push(name.to_string());
    self.indices.insert(name.to_string(), index);
    index
  }

  pub fn names(&self) -> &[String] {
    &self.names
  }

  pub fn index_of(&self, name: &str) -> Option<u32> {
    self.indices.get(name).copied()
  }

  pub fn len(&self) -> usize {
    self.names.len()
  }

  pub fn is_empty(&self) -> bool {
    self.names.is_empty()
  }
}
