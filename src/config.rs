//! Resource directory conventions.
//!
//! The organizer never invents paths on its own: every file it touches is
//! resolved through a [`ResourcePaths`] value. The layout is fixed relative to
//! a resource root:
//! * `res/materials` - `.humba` and `.hderriere` files
//! * `shader` - shader sources and their compiled `.spv` binaries
//! * `res/texture_cooked` - cooked textures with the `hdelicious` extension

use std::path::{Path, PathBuf};

/// Extension of unique material base files.
pub const MATERIAL_BASE_EXTENSION: &str = "humba";
/// Extension of derived material parameter set files.
pub const DERIVED_MATERIAL_EXTENSION: &str = "hderriere";
/// Extension of cooked texture files.
pub const COOKED_TEXTURE_EXTENSION: &str = "hdelicious";
/// Extension appended to a shader filename to get its compiled binary.
pub const SHADER_BINARY_EXTENSION: &str = "spv";

/// Material base rendered in the depth-only prepass.
pub const ZPREPASS_BASE: &str = "zprepass.special.humba";
/// Material base rendered into the shadow cascades.
pub const SHADOW_DEPTH_BASE: &str = "shadowdepthpass.special.humba";

/// Directories the organizer reads from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourcePaths {
  /// Where `.humba` and `.hderriere` files live
  pub materials_dir:     PathBuf,
  /// Where shader sources and `.spv` binaries live
  pub shader_dir:        PathBuf,
  /// Where cooked textures live
  pub texture_cache_dir: PathBuf,
}

impl Default for ResourcePaths {
  fn default() -> Self {
    Self::rooted_at(".")
  }
}

impl ResourcePaths {
  /// Standard layout below `root`.
  pub fn rooted_at(root: impl AsRef<Path>) -> Self {
    let root = root.as_ref();
    Self {
      materials_dir:     root.join("res").join("materials"),
      shader_dir:        root.join("shader"),
      texture_cache_dir: root.join("res").join("texture_cooked"),
    }
  }

  /// Shader source file, used for staleness checks.
  pub fn shader_source(&self, fname: &str) -> PathBuf {
    self.shader_dir.join(fname)
  }

  /// Compiled SPIR-V for a shader filename (`name.frag` -> `name.frag.spv`).
  pub fn shader_binary(&self, fname: &str) -> PathBuf {
    self
      .shader_dir
      .join(format!("{fname}.{SHADER_BINARY_EXTENSION}"))
  }

  /// Cooked texture for a texture base name.
  pub fn cooked_texture(&self, name: &str) -> PathBuf {
    self
      .texture_cache_dir
      .join(format!("{name}.{COOKED_TEXTURE_EXTENSION}"))
  }
}

/// Returns true for the bases that absorb every derived parameter set.
pub fn is_special_base(base_fname: &str) -> bool {
  base_fname == ZPREPASS_BASE || base_fname == SHADOW_DEPTH_BASE
}
