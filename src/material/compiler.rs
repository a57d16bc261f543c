//! Serializes derived parameter values into a material base's GPU buffer.
//!
//! Buffer layout for a base with `n` bound derived sets:
//! * `materialIDOffset` - registry index of the first bound set, as `u32`
//! * `n` records of `stride` bytes starting at `array_offset`
//!
//! A field is written only when its scoped name appears in the reflected
//! record, the base's declared variables and the derived set. Anything else is
//! left as it was (zeroed on creation).

use crate::{
  config::is_special_base,
  material::{
    base::{Mapping, UniqueMaterialBase, Variable, VariableType},
    derived::{DerivedMaterialParamSet, Param, ParamValue},
    layout::MaterialLayout,
    textures::TextureList,
  },
};

/// Registry indices of the derived sets bound to one base, in registry order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoundSets {
  pub indices: Vec<usize>,
}

impl BoundSets {
  /// Sets naming `base` in their `HUMBA` line; every set for the special bases.
  pub fn select(base: &UniqueMaterialBase, derived: &[DerivedMaterialParamSet]) -> Self {
    let fname = base.fname();
    let absorb_all = is_special_base(&fname);
    let indices = derived
      .iter()
      .enumerate()
      .filter(|(_, set)| set.loaded && (absorb_all || set.humba_fname == fname))
      .map(|(index, _)| index)
      .collect();
    Self { indices }
  }

  /// Value of the `materialIDOffset` header.
  pub fn first_index(&self) -> u32 {
    self.indices.first().copied().unwrap_or(0) as u32
  }

  pub fn len(&self) -> usize {
    self.indices.len()
  }

  pub fn is_empty(&self) -> bool {
    self.indices.is_empty()
  }
}

/// Outcome of one buffer write pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteStats {
  pub written: usize,
  pub skipped: usize,
}

/// Fills `bytes` (sized by [`MaterialLayout::buffer_size`]) for `base`.
pub fn write_parameters(
  bytes: &mut [u8],
  base: &UniqueMaterialBase,
  layout: &MaterialLayout,
  bound: &BoundSets,
  derived: &[DerivedMaterialParamSet],
  textures: &TextureList,
) -> WriteStats {
  let mut stats = WriteStats::default();

  let header = bound.first_index();
  if !put(bytes, layout.material_id_offset as usize, bytemuck::bytes_of(&header)) {
    tracing::error!(
      "{}: buffer of {} bytes has no room for materialIDOffset",
      base.fname(),
      bytes.len()
    );
  }

  for (position, &index) in bound.indices.iter().enumerate() {
    let set = &derived[index];
    for element in &layout.elements {
      let (Some(variable), Some(param)) = (
        base.variable(&element.param_name),
        set.param(&element.param_name),
      ) else {
        continue;
      };

      let encoded = match encode(variable, param, textures) {
        Ok(encoded) => encoded,
        Err(reason) => {
          tracing::error!(
            "{} / {}: `{}` {reason}, skipped",
            base.fname(),
            set.name(),
            element.param_name
          );
          stats.skipped += 1;
          continue;
        }
      };

      let offset = layout.element_offset(position, element);
      if put(bytes, offset, &encoded) {
        stats.written += 1;
      } else {
        tracing::error!(
          "{} / {}: `{}` at byte {offset} overruns the {} byte buffer, skipped",
          base.fname(),
          set.name(),
          element.param_name,
          bytes.len()
        );
        stats.skipped += 1;
      }
    }
  }

  stats
}

fn put(bytes: &mut [u8], offset: usize, data: &[u8]) -> bool {
  match bytes.get_mut(offset..offset + data.len()) {
    Some(target) => {
      target.copy_from_slice(data);
      true
    }
    None => false,
  }
}

/// Bytes for one field, reinterpreted per the declared type and mapping.
fn encode(variable: &Variable, param: &Param, textures: &TextureList) -> Result<Vec<u8>, String> {
  if variable.ty.is_sampler() {
    if variable.mapping != Mapping::TextureIndex {
      return Err(format!("is a {} but is not mapped texture_index", variable.ty.keyword()));
    }
    let ParamValue::Texture(texture) = &param.value else {
      return Err("expects a texture name".to_string());
    };
    let index = textures
      .index_of(&texture.name)
      .ok_or_else(|| format!("texture `{}` was never indexed", texture.name))?;
    return Ok(bytemuck::bytes_of(&index).to_vec());
  }

  let value = param
    .value
    .numeric()
    .ok_or_else(|| format!("is a {} but was given a texture", variable.ty.keyword()))?;

  if let Some(components) = variable.ty.float_components() {
    let floats = value.to_array();
    return Ok(bytemuck::cast_slice(&floats[..components]).to_vec());
  }

  match variable.ty {
    VariableType::Bool if variable.mapping == Mapping::ToFloat => {
      Ok(bytemuck::bytes_of(&value.x).to_vec())
    }
    VariableType::Bool => Err("is a bool but is not mapped to_float".to_string()),
    VariableType::Int => Ok(bytemuck::bytes_of(&(value.x as i32)).to_vec()),
    // Negative values wrap like a two's complement reinterpretation.
    VariableType::UInt => Ok(bytemuck::bytes_of(&(value.x as i64 as u32)).to_vec()),
    other => Err(format!("has unsupported type {}", other.keyword())),
  }
}

#[cfg(test)]
mod tests {
  use std::path::Path;

  use super::*;
  use crate::material::{
    format::{parse_derived_material, parse_material_base},
    layout::tests::material_bindings,
  };

  const BASE: &str = "Hawsoo Unique Material BAse
wood.vert
---
wood.frag
vec3 121 tint
sampler2D texture_index albedo
bool to_float wet
bool 121 dry
int 121 layers
uint 121 mask
float 121 gloss
";

  fn derived(name: &str, humba: &str, body: &str) -> DerivedMaterialParamSet {
    let source = format!("Hawsoo DERived MateRIal parametER Entry\nHUMBA {humba}\n{body}");
    parse_derived_material(Path::new(name), &source).unwrap()
  }

  fn f32_at(bytes: &[u8], offset: usize) -> f32 {
    bytemuck::pod_read_unaligned(&bytes[offset..offset + 4])
  }

  fn u32_at(bytes: &[u8], offset: usize) -> u32 {
    bytemuck::pod_read_unaligned(&bytes[offset..offset + 4])
  }

  fn layout() -> MaterialLayout {
    let fields = [
      ("tint", 0),
      ("albedo", 12),
      ("wet", 16),
      ("dry", 20),
      ("layers", 24),
      ("mask", 28),
      ("gloss", 32),
    ];
    MaterialLayout::from_bindings(&material_bindings(3, &fields, 48)).unwrap()
  }

  #[test]
  fn test_select_bound_sets() {
    let wood = parse_material_base(Path::new("wood.humba"), BASE).unwrap();
    let zprepass = parse_material_base(Path::new("zprepass.special.humba"), BASE).unwrap();
    let sets = vec![
      derived("rock.hderriere", "stone.humba", ""),
      derived("plank.hderriere", "wood.humba", ""),
      derived("log.hderriere", "wood.humba", ""),
    ];

    let bound = BoundSets::select(&wood, &sets);
    assert_eq!(bound.indices, [1, 2]);
    assert_eq!(bound.first_index(), 1);

    let bound = BoundSets::select(&zprepass, &sets);
    assert_eq!(bound.indices, [0, 1, 2]);
  }

  #[test]
  fn test_writes_every_field() {
    let base = parse_material_base(Path::new("wood.humba"), BASE).unwrap();
    let mut sets = vec![
      derived("rock.hderriere", "stone.humba", "albedo granite\n"),
      derived(
        "plank.hderriere",
        "wood.humba",
        "tint 0.5,0.5,0.2\nalbedo bark\nwet true\nlayers -3\nmask 7\ngloss 0.75\n",
      ),
    ];
    let textures = TextureList::build(&mut sets);
    let layout = layout();
    let bound = BoundSets::select(&base, &sets);

    let mut bytes = vec![0u8; layout.buffer_size(bound.len()) as usize];
    let stats = write_parameters(&mut bytes, &base, &layout, &bound, &sets, &textures);
    assert_eq!(stats, WriteStats { written: 6, skipped: 0 });

    let record = layout.array_offset as usize;
    assert_eq!(u32_at(&bytes, 0), 1);
    assert_eq!(f32_at(&bytes, record), 0.5);
    assert_eq!(f32_at(&bytes, record + 4), 0.5);
    assert_eq!(f32_at(&bytes, record + 8), 0.2);
    assert_eq!(u32_at(&bytes, record + 12), textures.index_of("bark").unwrap());
    assert_eq!(u32_at(&bytes, record + 12), 1);
    assert_eq!(f32_at(&bytes, record + 16), 1.0);
    assert_eq!(bytemuck::pod_read_unaligned::<i32>(&bytes[record + 24..record + 28]), -3);
    assert_eq!(u32_at(&bytes, record + 28), 7);
    assert_eq!(f32_at(&bytes, record + 32), 0.75);
  }

  #[test]
  fn test_bool_without_to_float_is_skipped() {
    let base = parse_material_base(Path::new("wood.humba"), BASE).unwrap();
    let mut sets = vec![derived("plank.hderriere", "wood.humba", "dry true\n")];
    let textures = TextureList::build(&mut sets);
    let layout = layout();
    let bound = BoundSets::select(&base, &sets);

    let mut bytes = vec![0u8; layout.buffer_size(bound.len()) as usize];
    let stats = write_parameters(&mut bytes, &base, &layout, &bound, &sets, &textures);
    assert_eq!(stats, WriteStats { written: 0, skipped: 1 });
    assert_eq!(f32_at(&bytes, layout.array_offset as usize + 20), 0.0);
  }

  #[test]
  fn test_records_follow_selection_order() {
    let base = parse_material_base(Path::new("wood.humba"), BASE).unwrap();
    let mut sets = vec![
      derived("plank.hderriere", "wood.humba", "gloss 0.25\n"),
      derived("log.hderriere", "wood.humba", "gloss 0.5\nunknown 3\n"),
    ];
    let textures = TextureList::build(&mut sets);
    let layout = layout();
    let bound = BoundSets::select(&base, &sets);

    let mut bytes = vec![0u8; layout.buffer_size(bound.len()) as usize];
    write_parameters(&mut bytes, &base, &layout, &bound, &sets, &textures);

    let gloss = &layout.elements[6];
    assert_eq!(f32_at(&bytes, layout.element_offset(0, gloss)), 0.25);
    assert_eq!(f32_at(&bytes, layout.element_offset(1, gloss)), 0.5);
    assert_eq!(u32_at(&bytes, 0), 0);
  }

  #[test]
  fn test_overrun_is_skipped() {
    let base = parse_material_base(Path::new("wood.humba"), BASE).unwrap();
    let mut sets = vec![derived("plank.hderriere", "wood.humba", "gloss 0.25\n")];
    let textures = TextureList::build(&mut sets);
    let layout = layout();
    let bound = BoundSets::select(&base, &sets);

    let mut bytes = vec![0u8; 20];
    let stats = write_parameters(&mut bytes, &base, &layout, &bound, &sets, &textures);
    assert_eq!(stats, WriteStats { written: 0, skipped: 1 });
  }
}
