//! Parameter buffer layout recovered from fragment shader reflection.
//!
//! A material fragment shader declares, in one descriptor set:
//!
//! ```glsl
//! layout(std430, binding = 0) readonly buffer MaterialCollection {
//!   uint materialIDOffset;
//!   MaterialParam params[];
//! } materialCollection;
//! layout(binding = 1) uniform sampler2D textureMaps[];
//! ```
//!
//! Every field of `MaterialParam` becomes a [`StructElement`] whose scoped
//! name is matched against the material base and its derived sets.

use crate::{
  error::ReflectionError,
  reflect::{BindingShape, MemberShape, ReflectedBinding, ReflectedStruct},
};

pub const MATERIAL_COLLECTION_BINDING: &str = "materialCollection";
pub const TEXTURE_MAPS_BINDING: &str = "textureMaps";
pub const MATERIAL_ID_OFFSET_MEMBER: &str = "materialIDOffset";
pub const MATERIAL_PARAM_TYPE: &str = "MaterialParam";

/// A named field inside one `MaterialParam` record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructElement {
  pub param_name:      String,
  pub relative_offset: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterialLayout {
  /// Descriptor set index holding both material bindings
  pub set:                u32,
  pub material_id_offset: u32,
  /// Start of the `MaterialParam` array
  pub array_offset:       u32,
  pub stride:             u32,
  pub elements:           Vec<StructElement>,
}

impl MaterialLayout {
  pub fn from_bindings(bindings: &[ReflectedBinding]) -> Result<Self, ReflectionError> {
    let (collection, block) = bindings
      .iter()
      .find_map(|binding| match &binding.shape {
        BindingShape::Struct(block)
          if binding.name == MATERIAL_COLLECTION_BINDING && binding.binding == 0 =>
        {
          Some((binding, block))
        }
        _ => None,
      })
      .ok_or(ReflectionError::MissingBinding {
        name:    MATERIAL_COLLECTION_BINDING,
        binding: 0,
      })?;

    let texture_maps = bindings
      .iter()
      .find(|binding| {
        binding.name == TEXTURE_MAPS_BINDING
          && binding.binding == 1
          && binding.shape == BindingShape::RuntimeArray
      })
      .ok_or(ReflectionError::MissingBinding {
        name:    TEXTURE_MAPS_BINDING,
        binding: 1,
      })?;

    if collection.set != texture_maps.set {
      return Err(ReflectionError::SetMismatch(collection.set, texture_maps.set));
    }

    let material_id_offset = block
      .members
      .iter()
      .find(|member| member.name == MATERIAL_ID_OFFSET_MEMBER && member.shape == MemberShape::Plain)
      .map(|member| member.offset)
      .ok_or(ReflectionError::MissingMember(MATERIAL_ID_OFFSET_MEMBER))?;

    let (array_offset, stride, params) = block
      .members
      .iter()
      .find_map(|member| match &member.shape {
        MemberShape::Array {
          stride,
          element: Some(element),
        } if element.type_name == MATERIAL_PARAM_TYPE => Some((member.offset, *stride, element)),
        _ => None,
      })
      .ok_or(ReflectionError::MissingMember(MATERIAL_PARAM_TYPE))?;

    Ok(Self {
      set: collection.set,
      material_id_offset,
      array_offset,
      stride,
      elements: elements_of(params),
    })
  }

  /// Bytes needed for `count` records.
  ///
  /// The array offset already includes the header padded to the array's
  /// alignment, so the header's own size is not added again.
  pub fn buffer_size(&self, count: usize) -> u64 {
    self.array_offset as u64 + self.stride as u64 * count as u64
  }

  /// Absolute byte offset of `element` in the record at `position`.
  pub fn element_offset(&self, position: usize, element: &StructElement) -> usize {
    self.array_offset as usize + self.stride as usize * position + element.relative_offset as usize
  }
}

fn elements_of(params: &ReflectedStruct) -> Vec<StructElement> {
  params
    .members
    .iter()
    .map(|member| StructElement {
      param_name:      member.name.clone(),
      relative_offset: member.offset,
    })
    .collect()
}
