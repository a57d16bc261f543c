//! The GPU boundary of the material organizer.
//!
//! Cooking needs a handful of GPU operations: read shader reflection, upload
//! textures, create and fill the parameter buffer, build a descriptor set and
//! a pipeline. [`MaterialBackend`] is that seam; `render::VulkanoBackend`
//! implements it for a real device.

use std::path::{Path, PathBuf};

use crate::{
  config::{SHADOW_DEPTH_BASE, ZPREPASS_BASE},
  error::CookError,
  material::{compiler::BoundSets, layout::MaterialLayout},
  reflect::ReflectedBinding,
};

/// Fixed render configurations a material base can be cooked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassKind {
  /// Color pass with equal depth test against the prepass depth
  Opaque,
  /// Depth-only prepass
  ZPrepass,
  /// Depth-only shadow cascade pass
  Shadow,
}

impl PassKind {
  pub fn for_base(base_fname: &str) -> Self {
    match base_fname {
      ZPREPASS_BASE => PassKind::ZPrepass,
      SHADOW_DEPTH_BASE => PassKind::Shadow,
      _ => PassKind::Opaque,
    }
  }
}

/// Everything needed to build one material pipeline.
pub struct PipelineRequest<'a, D> {
  pub base_fname:         &'a str,
  /// Compiled vertex shader (`.spv`)
  pub vertex_shader:      PathBuf,
  /// Compiled fragment shader (`.spv`)
  pub fragment_shader:    PathBuf,
  pub pass:               PassKind,
  /// Descriptor set built from the parameter buffer and texture list
  pub material_set:       &'a D,
  /// Set index the fragment shader expects the material set at
  pub material_set_index: u32,
}

pub trait MaterialBackend: Sized {
  type Texture;
  type Buffer;
  type DescriptorSet;
  type Pipeline;

  /// Loads a compiled fragment shader and lists its descriptor bindings.
  fn reflect_fragment_shader(&mut self, spv_path: &Path) -> Result<Vec<ReflectedBinding>, CookError>;

  /// Loads a cooked texture with a point-filtered, clamp-to-edge sampler.
  ///
  /// Never fails: a texture that cannot be loaded yields a fallback handle.
  fn load_texture(&mut self, path: &Path) -> Self::Texture;

  /// Creates a zeroed storage buffer of `size` bytes and runs `fill` while it
  /// is mapped. The mapping ends when `fill` returns.
  fn create_parameter_buffer(
    &mut self,
    size: u64,
    fill: &mut dyn FnMut(&mut [u8]),
  ) -> Result<Self::Buffer, CookError>;

  /// Binding 0 is the storage buffer, binding 1 the texture array.
  fn build_descriptor_set(
    &mut self,
    buffer: &Self::Buffer,
    textures: &[Self::Texture],
  ) -> Result<Self::DescriptorSet, CookError>;

  fn build_pipeline(
    &mut self,
    request: &PipelineRequest<'_, Self::DescriptorSet>,
  ) -> Result<Self::Pipeline, CookError>;

  /// Queues a replaced material for destruction once in-flight frames are done.
  fn retire_material(&mut self, material: Compiled<Self>);

  /// Queues replaced textures for destruction once in-flight frames are done.
  fn retire_textures(&mut self, textures: Vec<Self::Texture>);
}

/// GPU objects of a cooked material base.
pub struct Compiled<B: MaterialBackend> {
  pub pipeline:       B::Pipeline,
  pub descriptor_set: B::DescriptorSet,
  pub buffer:         B::Buffer,
  pub layout:         MaterialLayout,
  pub bound:          BoundSets,
  pub pass:           PassKind,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_pass_for_base() {
    assert_eq!(PassKind::for_base("zprepass.special.humba"), PassKind::ZPrepass);
    assert_eq!(PassKind::for_base("shadowdepthpass.special.humba"), PassKind::Shadow);
    assert_eq!(PassKind::for_base("wood.humba"), PassKind::Opaque);
  }
}
