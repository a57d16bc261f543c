//! Line-oriented parsers for `.humba` and `.hderriere` files.
//!
//! Both formats share the same line preparation: everything after `#` is a
//! comment, lines are trimmed and blank lines are skipped. The first content
//! line must be the format's tag.
//!
//! Structural problems (bad tag, missing shader or `HUMBA` line) fail the
//! whole file. A single bad parameter line is logged and dropped.

use std::path::Path;

use glam::Vec4;

use crate::{
  error::FormatError,
  material::{
    base::{Mapping, ShaderStage, UniqueMaterialBase, Variable, VariableType},
    derived::{DerivedMaterialParamSet, Param, ParamValue, ParamValueType, TextureRef},
  },
};

pub const MATERIAL_BASE_TAG: &str = "Hawsoo Unique Material BAse";
pub const DERIVED_MATERIAL_TAG: &str = "Hawsoo DERived MateRIal parametER Entry";

/// Separates the vertex parameters from the fragment shader line.
const STAGE_SEPARATOR: &str = "---";

/// Yields `(line number, content)` for every non-blank line with comments removed.
fn content_lines(source: &str) -> impl Iterator<Item = (usize, &str)> {
  source.lines().enumerate().filter_map(|(index, line)| {
    let line = match line.find('#') {
      Some(at) => &line[..at],
      None => line,
    }
    .trim();
    (!line.is_empty()).then_some((index + 1, line))
  })
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum BaseStage {
  Tag,
  VertexShader,
  VertexParams,
  FragmentShader,
  FragmentParams,
}

/// Parses the text of a `.humba` file.
pub fn parse_material_base(path: &Path, source: &str) -> Result<UniqueMaterialBase, FormatError> {
  let mut vertex = ShaderStage::default();
  let mut fragment = ShaderStage::default();
  let mut stage = BaseStage::Tag;

  for (line_number, line) in content_lines(source) {
    match stage {
      BaseStage::Tag => {
        if line != MATERIAL_BASE_TAG {
          return Err(FormatError::BadMagic {
            path:     path.to_path_buf(),
            line:     line_number,
            expected: MATERIAL_BASE_TAG,
          });
        }
        stage = BaseStage::VertexShader;
      }
      BaseStage::VertexShader => {
        vertex.fname = shader_fname(path, line_number, line)?;
        stage = BaseStage::VertexParams;
      }
      BaseStage::VertexParams if line == STAGE_SEPARATOR => {
        stage = BaseStage::FragmentShader;
      }
      BaseStage::FragmentShader => {
        fragment.fname = shader_fname(path, line_number, line)?;
        stage = BaseStage::FragmentParams;
      }
      BaseStage::VertexParams | BaseStage::FragmentParams => {
        let params = if stage == BaseStage::VertexParams {
          &mut vertex.material_params
        } else {
          &mut fragment.material_params
        };
        match parse_variable(line) {
          Ok(variable) => params.push(variable),
          Err(reason) => {
            tracing::error!("{path:?} line {line_number}: {reason}, parameter dropped");
          }
        }
      }
    }
  }

  let missing = match stage {
    BaseStage::Tag => Some("the file tag"),
    BaseStage::VertexShader => Some("the vertex shader filename"),
    BaseStage::VertexParams => Some("the `---` stage separator"),
    BaseStage::FragmentShader => Some("the fragment shader filename"),
    BaseStage::FragmentParams => None,
  };
  if let Some(missing) = missing {
    return Err(FormatError::Truncated {
      path: path.to_path_buf(),
      missing,
    });
  }

  Ok(UniqueMaterialBase {
    path: path.to_path_buf(),
    vertex,
    fragment,
    loaded: true,
    loaded_at: None,
  })
}

fn shader_fname(path: &Path, line_number: usize, line: &str) -> Result<String, FormatError> {
  let mut tokens = line.split_whitespace();
  match (tokens.next(), tokens.next()) {
    (Some(fname), None) => Ok(fname.to_string()),
    _ => Err(FormatError::MalformedLine {
      path:   path.to_path_buf(),
      line:   line_number,
      reason: format!("expected a single shader filename, got `{line}`"),
    }),
  }
}

/// Parses `<type> <mapping> <scopedName>`.
pub fn parse_variable(line: &str) -> Result<Variable, String> {
  let tokens: Vec<&str> = line.split_whitespace().collect();
  let [ty, mapping, scoped_name] = tokens.as_slice() else {
    return Err(format!(
      "expected `<type> <mapping> <scopedName>`, got {} tokens",
      tokens.len()
    ));
  };

  let ty = ty
    .parse::<VariableType>()
    .map_err(|e| format!("type: {e}"))?;
  let mapping = mapping
    .parse::<Mapping>()
    .map_err(|e| format!("mapping: {e}"))?;

  Ok(Variable {
    ty,
    mapping,
    scoped_name: scoped_name.to_string(),
  })
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum DerivedStage {
  Tag,
  Humba,
  Params,
}

/// Parses the text of a `.hderriere` file.
pub fn parse_derived_material(
  path: &Path,
  source: &str,
) -> Result<DerivedMaterialParamSet, FormatError> {
  let mut humba_fname = String::new();
  let mut params = Vec::new();
  let mut stage = DerivedStage::Tag;

  for (line_number, line) in content_lines(source) {
    match stage {
      DerivedStage::Tag => {
        if line != DERIVED_MATERIAL_TAG {
          return Err(FormatError::BadMagic {
            path:     path.to_path_buf(),
            line:     line_number,
            expected: DERIVED_MATERIAL_TAG,
          });
        }
        stage = DerivedStage::Humba;
      }
      DerivedStage::Humba => {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let ["HUMBA", fname] = tokens.as_slice() else {
          return Err(FormatError::MalformedLine {
            path:   path.to_path_buf(),
            line:   line_number,
            reason: format!("expected `HUMBA <filename>`, got `{line}`"),
          });
        };
        humba_fname = fname.to_string();
        stage = DerivedStage::Params;
      }
      DerivedStage::Params => match parse_param(line) {
        Ok(param) => params.push(param),
        Err(reason) => {
          tracing::error!("{path:?} line {line_number}: {reason}, parameter dropped");
        }
      },
    }
  }

  match stage {
    DerivedStage::Tag => Err(FormatError::Truncated {
      path:    path.to_path_buf(),
      missing: "the file tag",
    }),
    DerivedStage::Humba => Err(FormatError::Truncated {
      path:    path.to_path_buf(),
      missing: "the `HUMBA` line",
    }),
    DerivedStage::Params => Ok(DerivedMaterialParamSet {
      path: path.to_path_buf(),
      humba_fname,
      params,
      loaded: true,
      loaded_at: None,
    }),
  }
}

/// Parses `<scopedName> <value>`.
pub fn parse_param(line: &str) -> Result<Param, String> {
  let tokens: Vec<&str> = line.split_whitespace().collect();
  let [scoped_name, literal] = tokens.as_slice() else {
    return Err(format!(
      "expected `<scopedName> <value>`, got {} tokens",
      tokens.len()
    ));
  };

  let (value_type, value) = classify_value(literal)?;
  Ok(Param {
    scoped_name: scoped_name.to_string(),
    value_type,
    value,
  })
}

/// Infers a value's type from its lexical shape.
///
/// Literals made only of `[0-9.,-]` are numeric and the comma count selects
/// the arity. `true`/`false` are bools. Anything else names a texture.
pub fn classify_value(literal: &str) -> Result<(ParamValueType, ParamValue), String> {
  let literal = literal.trim();
  let numerical = !literal.is_empty()
    && literal
      .chars()
      .all(|c| c.is_ascii_digit() || matches!(c, '.' | ',' | '-'));

  if numerical {
    let commas = literal.matches(',').count();
    let value_type = match commas {
      0 if literal.contains('.') => ParamValueType::Float,
      0 => ParamValueType::Int,
      1 => ParamValueType::Vec2,
      2 => ParamValueType::Vec3,
      3 => ParamValueType::Vec4,
      n => return Err(format!("`{literal}` has {} components, at most 4 fit", n + 1)),
    };

    let spaced = literal.replace(',', " ");
    let components = spaced
      .split_whitespace()
      .map(str::parse::<f32>)
      .collect::<Result<Vec<_>, _>>()
      .map_err(|e| format!("`{literal}` is not numeric: {e}"))?;
    if components.len() != commas + 1 {
      return Err(format!("`{literal}` has an empty component"));
    }

    let mut value = Vec4::ZERO;
    for (index, component) in components.into_iter().enumerate() {
      value[index] = component;
    }
    return Ok((value_type, ParamValue::Numeric(value)));
  }

  match literal {
    "true" => Ok((ParamValueType::Bool, ParamValue::Numeric(Vec4::X))),
    "false" => Ok((ParamValueType::Bool, ParamValue::Numeric(Vec4::ZERO))),
    name => Ok((
      ParamValueType::Texture,
      ParamValue::Texture(TextureRef {
        name:  name.to_string(),
        index: None,
      }),
    )),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const WOOD: &str = "
# wood material
Hawsoo Unique Material BAse
wood.vert
float 121 sway   # wind sway
---
wood.frag
vec3 121 tint
sampler2D texture_index albedo
blorp 121 x
bool to_float wet
";

  #[test]
  fn test_parse_material_base() {
    let base = parse_material_base(Path::new("wood.humba"), WOOD).unwrap();
    assert!(base.loaded);
    assert_eq!(base.vertex.fname, "wood.vert");
    assert_eq!(base.fragment.fname, "wood.frag");
    assert_eq!(base.vertex.material_params.len(), 1);
    assert_eq!(base.vertex.material_params[0].scoped_name, "sway");

    // `blorp` is dropped, the lines after it still load
    let names: Vec<&str> = base
      .fragment
      .material_params
      .iter()
      .map(|v| v.scoped_name.as_str())
      .collect();
    assert_eq!(names, ["tint", "albedo", "wet"]);
    assert_eq!(base.fragment.material_params[1].ty, VariableType::Sampler2D);
    assert_eq!(
      base.fragment.material_params[1].mapping,
      Mapping::TextureIndex
    );
  }

  #[test]
  fn test_parse_variable() {
    let variable = parse_variable("float 121 myParam").unwrap();
    assert_eq!(variable.ty, VariableType::Float);
    assert_eq!(variable.mapping, Mapping::OneToOne);
    assert_eq!(variable.scoped_name, "myParam");

    assert!(parse_variable("blorp 121 x").is_err());
    assert!(parse_variable("float sideways x").is_err());
    assert!(parse_variable("float 121").is_err());
    assert!(parse_variable("float 121 x y").is_err());
  }

  #[test]
  fn test_bad_tag_fails() {
    let source = "Hawsoo Unique Material Base\nwood.vert\n---\nwood.frag\n";
    assert!(matches!(
      parse_material_base(Path::new("wood.humba"), source),
      Err(FormatError::BadMagic { line: 1, .. })
    ));
  }

  #[test]
  fn test_missing_fragment_stage_fails() {
    let source = "Hawsoo Unique Material BAse\nwood.vert\nfloat 121 sway\n";
    assert!(matches!(
      parse_material_base(Path::new("wood.humba"), source),
      Err(FormatError::Truncated { .. })
    ));
  }

  #[test]
  fn test_parse_derived_material() {
    let source = "
Hawsoo DERived MateRIal parametER Entry
HUMBA wood.humba   # binds to wood
tint 0.5,0.5,0.2
albedo bark
wet true
layers 3
broken 1,,2
roughness 0.25
";
    let set = parse_derived_material(Path::new("plank.hderriere"), source).unwrap();
    assert_eq!(set.humba_fname, "wood.humba");
    assert_eq!(set.name(), "plank");
    assert_eq!(set.params.len(), 5);

    let tint = set.param("tint").unwrap();
    assert_eq!(tint.value_type, ParamValueType::Vec3);
    assert_eq!(tint.value.numeric().unwrap().truncate().to_array(), [0.5, 0.5, 0.2]);

    assert_eq!(set.param("albedo").unwrap().value.texture_name(), Some("bark"));
    assert_eq!(set.param("layers").unwrap().value_type, ParamValueType::Int);
    assert_eq!(set.param("roughness").unwrap().value_type, ParamValueType::Float);
    assert!(set.param("broken").is_none());
  }

  #[test]
  fn test_missing_humba_line_fails() {
    let source = "Hawsoo DERived MateRIal parametER Entry\ntint 1,1,1\n";
    assert!(matches!(
      parse_derived_material(Path::new("plank.hderriere"), source),
      Err(FormatError::MalformedLine { line: 2, .. })
    ));

    let source = "Hawsoo DERived MateRIal parametER Entry\n";
    assert!(matches!(
      parse_derived_material(Path::new("plank.hderriere"), source),
      Err(FormatError::Truncated { .. })
    ));
  }

  #[test]
  fn test_classify_vectors() {
    let (ty, value) = classify_value("1.0,2.0,3.0").unwrap();
    assert_eq!(ty, ParamValueType::Vec3);
    assert_eq!(value.numeric().unwrap().truncate().to_array(), [1.0, 2.0, 3.0]);

    let (ty, value) = classify_value("0.1,0.2,0.3,1").unwrap();
    assert_eq!(ty, ParamValueType::Vec4);
    assert_eq!(value.numeric().unwrap().to_array(), [0.1, 0.2, 0.3, 1.0]);

    let (ty, value) = classify_value("-4,2").unwrap();
    assert_eq!(ty, ParamValueType::Vec2);
    assert_eq!(value.numeric().unwrap().x, -4.0);

    assert!(classify_value("1,2,3,4,5").is_err());
    assert!(classify_value("-").is_err());
  }

  #[test]
  fn test_classify_scalars_and_bools() {
    assert_eq!(classify_value("1.5").unwrap().0, ParamValueType::Float);
    assert_eq!(classify_value("-7").unwrap().0, ParamValueType::Int);

    let (ty, value) = classify_value("true").unwrap();
    assert_eq!(ty, ParamValueType::Bool);
    assert_eq!(value.numeric().unwrap().x, 1.0);

    let (ty, value) = classify_value("false").unwrap();
    assert_eq!(ty, ParamValueType::Bool);
    assert_eq!(value.numeric().unwrap().x, 0.0);

    let (ty, value) = classify_value("mossy_bark").unwrap();
    assert_eq!(ty, ParamValueType::Texture);
    assert_eq!(value.texture_name(), Some("mossy_bark"));
  }
}
