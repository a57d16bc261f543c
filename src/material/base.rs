//! Unique material bases (`.humba`).
//!
//! A base is the parameter schema shared by many concrete materials: which
//! shaders to use, and for each stage which scoped names the shader expects
//! and how raw values are written for them.

use std::{
  path::{Path, PathBuf},
  str::FromStr,
  time::SystemTime,
};

use crate::config::ResourcePaths;

/// A keyword in a material file did not match any known entry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown keyword `{0}`")]
pub struct UnknownKeyword(pub String);

/// Declared GLSL type of a material parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariableType {
  Sampler1D,
  Sampler2D,
  Sampler2DArray,
  Sampler3D,
  SamplerCube,
  Float,
  Vec2,
  Vec3,
  Vec4,
  Bool,
  Int,
  UInt,
}

const VARIABLE_TYPE_KEYWORDS: [(&str, VariableType); 12] = [
  ("sampler1D", VariableType::Sampler1D),
  ("sampler2D", VariableType::Sampler2D),
  ("sampler2DArray", VariableType::Sampler2DArray),
  ("sampler3D", VariableType::Sampler3D),
  ("samplerCube", VariableType::SamplerCube),
  ("float", VariableType::Float),
  ("vec2", VariableType::Vec2),
  ("vec3", VariableType::Vec3),
  ("vec4", VariableType::Vec4),
  ("bool", VariableType::Bool),
  ("int", VariableType::Int),
  ("uint", VariableType::UInt),
];

impl VariableType {
  pub const ALL: [VariableType; 12] = [
    VariableType::Sampler1D,
    VariableType::Sampler2D,
    VariableType::Sampler2DArray,
    VariableType::Sampler3D,
    VariableType::SamplerCube,
    VariableType::Float,
    VariableType::Vec2,
    VariableType::Vec3,
    VariableType::Vec4,
    VariableType::Bool,
    VariableType::Int,
    VariableType::UInt,
  ];

  pub fn keyword(self) -> &'static str {
    VARIABLE_TYPE_KEYWORDS
      .iter()
      .find(|(_, ty)| *ty == self)
      .map(|(keyword, _)| *keyword)
      .unwrap_or("?")
  }

  pub fn is_sampler(self) -> bool {
    matches!(
      self,
      VariableType::Sampler1D
        | VariableType::Sampler2D
        | VariableType::Sampler2DArray
        | VariableType::Sampler3D
        | VariableType::SamplerCube
    )
  }

  /// Number of f32 components for the float vector types.
  pub fn float_components(self) -> Option<usize> {
    match self {
      VariableType::Float => Some(1),
      VariableType::Vec2 => Some(2),
      VariableType::Vec3 => Some(3),
      VariableType::Vec4 => Some(4),
      _ => None,
    }
  }
}

impl FromStr for VariableType {
  type Err = UnknownKeyword;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    VARIABLE_TYPE_KEYWORDS
      .iter()
      .find(|(keyword, _)| *keyword == s)
      .map(|(_, ty)| *ty)
      .ok_or_else(|| UnknownKeyword(s.to_string()))
  }
}

/// How a raw value is reinterpreted when written to the parameter buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mapping {
  OneToOne,
  TextureIndex,
  ToFloat,
}

const MAPPING_KEYWORDS: [(&str, Mapping); 4] = [
  ("121", Mapping::OneToOne),
  ("one_to_one", Mapping::OneToOne),
  ("texture_index", Mapping::TextureIndex),
  ("to_float", Mapping::ToFloat),
];

impl Mapping {
  pub const ALL: [Mapping; 3] = [Mapping::OneToOne, Mapping::TextureIndex, Mapping::ToFloat];
}

impl FromStr for Mapping {
  type Err = UnknownKeyword;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    MAPPING_KEYWORDS
      .iter()
      .find(|(keyword, _)| *keyword == s)
      .map(|(_, mapping)| *mapping)
      .ok_or_else(|| UnknownKeyword(s.to_string()))
  }
}

/// One `<type> <mapping> <scopedName>` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
  pub ty:          VariableType,
  pub mapping:     Mapping,
  pub scoped_name: String,
}

/// Shader filename plus the parameters it reads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShaderStage {
  pub fname:           String,
  pub material_params: Vec<Variable>,
}

/// Parsed contents of one `.humba` file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueMaterialBase {
  pub path:      PathBuf,
  pub vertex:    ShaderStage,
  pub fragment:  ShaderStage,
  /// False for the blank entry left behind by a failed load
  pub loaded:    bool,
  pub loaded_at: Option<SystemTime>,
}

impl UniqueMaterialBase {
  /// Entry for a path whose last load failed.
  pub fn blank(path: &Path) -> Self {
    Self {
      path:      path.to_path_buf(),
      vertex:    ShaderStage::default(),
      fragment:  ShaderStage::default(),
      loaded:    false,
      loaded_at: None,
    }
  }

  /// Filename used as the join key for derived sets and draw-time lookups.
  pub fn fname(&self) -> String {
    self
      .path
      .file_name()
      .map(|name| name.to_string_lossy().into_owned())
      .unwrap_or_default()
  }

  /// Finds the declared variable for a scoped name, fragment stage first.
  pub fn variable(&self, scoped_name: &str) -> Option<&Variable> {
    self
      .fragment
      .material_params
      .iter()
      .chain(self.vertex.material_params.iter())
      .find(|variable| variable.scoped_name == scoped_name)
  }

  /// Files whose modification invalidates this base: each stage's source
  /// and the `.spv` the cooker actually reads.
  pub fn dependencies(&self, paths: &ResourcePaths) -> Vec<PathBuf> {
    [&self.vertex, &self.fragment]
      .into_iter()
      .filter(|stage| !stage.fname.is_empty())
      .flat_map(|stage| [paths.shader_source(&stage.fname), paths.shader_binary(&stage.fname)])
      .collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_every_type_has_a_keyword() {
    for ty in VariableType::ALL {
      let keyword = ty.keyword();
      assert_ne!(keyword, "?", "{ty:?} missing from keyword table");
      assert_eq!(keyword.parse::<VariableType>(), Ok(ty));
    }
  }

  #[test]
  fn test_every_mapping_has_a_keyword() {
    for mapping in Mapping::ALL {
      assert!(
        MAPPING_KEYWORDS.iter().any(|(_, m)| *m == mapping),
        "{mapping:?} missing from keyword table"
      );
    }
    assert_eq!("121".parse::<Mapping>(), Ok(Mapping::OneToOne));
    assert_eq!(
      "texture_index".parse::<Mapping>(),
      Ok(Mapping::TextureIndex)
    );
    assert_eq!("to_float".parse::<Mapping>(), Ok(Mapping::ToFloat));
    assert!("blorp".parse::<Mapping>().is_err());
  }

  #[test]
  fn test_variable_lookup_prefers_fragment_stage() {
    let mut base = UniqueMaterialBase::blank(Path::new("res/materials/wood.humba"));
    base.vertex.material_params.push(Variable {
      ty:          VariableType::Float,
      mapping:     Mapping::OneToOne,
      scoped_name: "wave".into(),
    });
    base.fragment.material_params.push(Variable {
      ty:          VariableType::Vec3,
      mapping:     Mapping::OneToOne,
      scoped_name: "wave".into(),
    });
    assert_eq!(base.variable("wave").map(|v| v.ty), Some(VariableType::Vec3));
    assert_eq!(base.fname(), "wood.humba");
    assert!(base.variable("missing").is_none());
  }

  #[test]
  fn test_dependencies_cover_sources_and_binaries() {
    let paths = ResourcePaths::rooted_at(Path::new("root"));
    let mut base = UniqueMaterialBase::blank(Path::new("root/res/materials/wood.humba"));
    base.vertex.fname = "wood.vert".into();
    base.fragment.fname = "wood.frag".into();

    assert_eq!(base.dependencies(&paths), vec![
      paths.shader_source("wood.vert"),
      paths.shader_binary("wood.vert"),
      paths.shader_source("wood.frag"),
      paths.shader_binary("wood.frag"),
    ]);

    base.vertex.fname.clear();
    assert_eq!(base.dependencies(&paths).len(), 2);
  }
}
