//! Derived material parameter sets (`.hderriere`).

use std::{
  path::{Path, PathBuf},
  time::SystemTime,
};

use glam::Vec4;

use crate::config::ResourcePaths;

/// Value type inferred from the lexical shape of a literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamValueType {
  Texture,
  Float,
  Vec2,
  Vec3,
  Vec4,
  Bool,
  Int,
  UInt,
}

/// A texture referenced by name; `index` is filled in during a cook pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureRef {
  pub name:  String,
  pub index: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
  Texture(TextureRef),
  /// Components beyond the literal's arity are zero; bools are 0.0 / 1.0
  Numeric(Vec4),
}

impl ParamValue {
  pub fn texture_name(&self) -> Option<&str> {
    match self {
      ParamValue::Texture(texture) => Some(&texture.name),
      ParamValue::Numeric(_) => None,
    }
  }

  pub fn numeric(&self) -> Option<Vec4> {
    match self {
      ParamValue::Numeric(value) => Some(*value),
      ParamValue::Texture(_) => None,
    }
  }
}

/// One `<scopedName> <value>` line.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
  pub scoped_name: String,
  pub value_type:  ParamValueType,
  pub value:       ParamValue,
}

/// Parsed contents of one `.hderriere` file.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedMaterialParamSet {
  pub path:        PathBuf,
  /// Filename of the `.humba` this set binds to
  pub humba_fname: String,
  pub params:      Vec<Param>,
  pub loaded:      bool,
  pub loaded_at:   Option<SystemTime>,
}

impl DerivedMaterialParamSet {
  pub fn blank(path: &Path) -> Self {
    Self {
      path:        path.to_path_buf(),
      humba_fname: String::new(),
      params:      Vec::new(),
      loaded:      false,
      loaded_at:   None,
    }
  }

  /// Material name used by render code, i.e. the file stem.
  pub fn name(&self) -> String {
    self
      .path
      .file_stem()
      .map(|stem| stem.to_string_lossy().into_owned())
      .unwrap_or_default()
  }

  pub fn param(&self, scoped_name: &str) -> Option<&Param> {
    self
      .params
      .iter()
      .find(|param| param.scoped_name == scoped_name)
  }

  /// Cooked textures this set references.
  pub fn dependencies(&self, paths: &ResourcePaths) -> Vec<PathBuf> {
    self
      .params
      .iter()
      .filter_map(|param| param.value.texture_name())
      .map(|name| paths.cooked_texture(name))
      .collect()
  }
}
