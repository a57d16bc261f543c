//! SPIR-V reflection of descriptor bindings.
//!
//! Walks a compiled module with vulkano's SPIR-V parser and describes every
//! decorated descriptor binding: its name, set and binding number, and for
//! buffer blocks the byte layout of the block's members. Nothing here touches
//! the GPU.

use std::path::Path;

use vulkano::shader::spirv::{bytes_to_words, Decoration, Id, Instruction, Spirv};

use crate::error::{CookError, ReflectionError};

/// One descriptor binding declared by a shader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReflectedBinding {
  /// Variable name, e.g. `materialCollection`
  pub name:    String,
  pub set:     u32,
  pub binding: u32,
  pub shape:   BindingShape,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingShape {
  /// A uniform or storage block
  Struct(ReflectedStruct),
  /// An unsized array of descriptors, e.g. `sampler2D maps[]`
  RuntimeArray,
  Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReflectedStruct {
  pub type_name: String,
  pub members:   Vec<ReflectedMember>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReflectedMember {
  pub name:   String,
  /// Byte offset from the start of the enclosing struct
  pub offset: u32,
  pub shape:  MemberShape,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberShape {
  /// Scalar, vector, matrix or nested struct
  Plain,
  Array {
    stride:  u32,
    element: Option<ReflectedStruct>,
  },
}

/// Reads a `.spv` file into SPIR-V words.
pub fn read_spirv_words(path: &Path) -> Result<Vec<u32>, CookError> {
  let bytes = std::fs::read(path).map_err(|source| CookError::ShaderIo {
    path: path.to_path_buf(),
    source,
  })?;
  let words = bytes_to_words(&bytes).map_err(|e| CookError::ShaderModule {
    path:   path.to_path_buf(),
    reason: format!("{e:?}"),
  })?;
  Ok(words.into_owned())
}

/// Lists the module's descriptor bindings sorted by `(set, binding)`.
pub fn descriptor_bindings(words: &[u32]) -> Result<Vec<ReflectedBinding>, ReflectionError> {
  let spirv = Spirv::new(words).map_err(|e| ReflectionError::InvalidSpirv(format!("{e:?}")))?;

  let mut bindings = Vec::new();
  for instruction in spirv.global_variables() {
    let Instruction::Variable {
      result_type_id,
      result_id,
      ..
    } = instruction
    else {
      continue;
    };

    let mut set = None;
    let mut binding = None;
    for annotation in spirv.id(*result_id).decorations() {
      if let Instruction::Decorate { decoration, .. } = annotation {
        match decoration {
          Decoration::DescriptorSet { descriptor_set } => set = Some(*descriptor_set),
          Decoration::Binding { binding_point } => binding = Some(*binding_point),
          _ => {}
        }
      }
    }
    let (Some(set), Some(binding)) = (set, binding) else {
      continue;
    };

    let ty = pointee(&spirv, *result_type_id);
    let shape = match spirv.id(ty).instruction() {
      Instruction::TypeStruct { .. } => BindingShape::Struct(reflect_struct(&spirv, ty)),
      Instruction::TypeRuntimeArray { .. } => BindingShape::RuntimeArray,
      _ => BindingShape::Other,
    };

    bindings.push(ReflectedBinding {
      name: debug_name(&spirv, *result_id),
      set,
      binding,
      shape,
    });
  }

  bindings.sort_by_key(|binding| (binding.set, binding.binding));
  Ok(bindings)
}

fn pointee(spirv: &Spirv, ty: Id) -> Id {
  match spirv.id(ty).instruction() {
    Instruction::TypePointer { ty, .. } => *ty,
    _ => ty,
  }
}

fn debug_name(spirv: &Spirv, id: Id) -> String {
  spirv
    .id(id)
    .names()
    .iter()
    .find_map(|instruction| match instruction {
      Instruction::Name { name, .. } => Some(name.clone()),
      _ => None,
    })
    .unwrap_or_default()
}

fn reflect_struct(spirv: &Spirv, id: Id) -> ReflectedStruct {
  let info = spirv.id(id);
  let member_types: &[Id] = match info.instruction() {
    Instruction::TypeStruct { member_types, .. } => member_types.as_slice(),
    _ => &[],
  };

  let members = member_types
    .iter()
    .zip(info.members())
    .map(|(member_type, member)| {
      let name = member
        .names()
        .iter()
        .find_map(|instruction| match instruction {
          Instruction::MemberName { name, .. } => Some(name.clone()),
          _ => None,
        })
        .unwrap_or_default();
      let offset = member
        .decorations()
        .iter()
        .find_map(|instruction| match instruction {
          Instruction::MemberDecorate {
            decoration: Decoration::Offset { byte_offset },
            ..
          } => Some(*byte_offset),
          _ => None,
        })
        .unwrap_or(0);

      ReflectedMember {
        name,
        offset,
        shape: member_shape(spirv, *member_type),
      }
    })
    .collect();

  ReflectedStruct {
    type_name: debug_name(spirv, id),
    members,
  }
}

fn member_shape(spirv: &Spirv, ty: Id) -> MemberShape {
  let info = spirv.id(ty);
  let element_type = match info.instruction() {
    Instruction::TypeArray { element_type, .. }
    | Instruction::TypeRuntimeArray { element_type, .. } => *element_type,
    _ => return MemberShape::Plain,
  };

  let stride = info
    .decorations()
    .iter()
    .find_map(|instruction| match instruction {
      Instruction::Decorate {
        decoration: Decoration::ArrayStride { array_stride },
        ..
      } => Some(*array_stride),
      _ => None,
    })
    .unwrap_or(0);

  let element = match spirv.id(element_type).instruction() {
    Instruction::TypeStruct { .. } => Some(reflect_struct(spirv, element_type)),
    _ => None,
  };

  MemberShape::Array { stride, element }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::material::layout::MaterialLayout;

  /// Minimal SPIR-V assembler for hand-written test modules.
  #[derive(Default)]
  struct Assembler {
    words: Vec<u32>,
  }

  impl Assembler {
    fn op(&mut self, opcode: u32, operands: &[u32]) -> &mut Self {
      self.words.push(((operands.len() as u32 + 1) << 16) | opcode);
      self.words.extend_from_slice(operands);
      self
    }

    /// An instruction whose last operand is a literal string.
    fn op_str(&mut self, opcode: u32, operands: &[u32], literal: &str) -> &mut Self {
      let mut bytes = literal.as_bytes().to_vec();
      bytes.push(0);
      while bytes.len() % 4 != 0 {
        bytes.push(0);
      }
      let mut all = operands.to_vec();
      all.extend(
        bytes
          .chunks_exact(4)
          .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]])),
      );
      self.op(opcode, &all)
    }

    fn finish(&self, bound: u32) -> Vec<u32> {
      let mut module = vec![0x0723_0203, 0x0001_0000, 0, bound, 0];
      module.extend_from_slice(&self.words);
      module
    }
  }

  const OP_NAME: u32 = 5;
  const OP_MEMBER_NAME: u32 = 6;
  const OP_DECORATE: u32 = 71;
  const OP_MEMBER_DECORATE: u32 = 72;

  const DECORATION_BLOCK: u32 = 2;
  const DECORATION_ARRAY_STRIDE: u32 = 6;
  const DECORATION_BINDING: u32 = 33;
  const DECORATION_DESCRIPTOR_SET: u32 = 34;
  const DECORATION_OFFSET: u32 = 35;

  const STORAGE_UNIFORM_CONSTANT: u32 = 0;
  const STORAGE_UNIFORM: u32 = 2;

  /// A fragment shader declaring
  ///
  /// ```glsl
  /// struct MaterialParam { vec3 tint; uint albedo; };
  /// layout(set = 3, binding = 0) buffer MaterialCollection {
  ///   uint materialIDOffset;
  ///   MaterialParam params[];
  /// } materialCollection;
  /// layout(set = 3, binding = 1) uniform sampler2D textureMaps[];
  /// ```
  fn material_fragment_module() -> Vec<u32> {
    const MAIN: u32 = 1;
    const VOID: u32 = 2;
    const FN_VOID: u32 = 3;
    const FLOAT: u32 = 4;
    const UINT: u32 = 5;
    const VEC3: u32 = 6;
    const MATERIAL_PARAM: u32 = 7;
    const PARAM_ARRAY: u32 = 8;
    const COLLECTION: u32 = 9;
    const COLLECTION_PTR: u32 = 10;
    const COLLECTION_VAR: u32 = 11;
    const IMAGE: u32 = 12;
    const SAMPLED_IMAGE: u32 = 13;
    const SAMPLER_ARRAY: u32 = 14;
    const SAMPLER_ARRAY_PTR: u32 = 15;
    const TEXTURE_MAPS_VAR: u32 = 16;
    const LABEL: u32 = 17;

    let mut asm = Assembler::default();
    asm
      // Capability Shader, MemoryModel Logical GLSL450
      .op(17, &[1])
      .op(14, &[0, 1])
      // EntryPoint Fragment, ExecutionMode OriginUpperLeft
      .op_str(15, &[4, MAIN], "main")
      .op(16, &[MAIN, 7])
      .op_str(OP_NAME, &[MAIN], "main")
      .op_str(OP_NAME, &[MATERIAL_PARAM], "MaterialParam")
      .op_str(OP_MEMBER_NAME, &[MATERIAL_PARAM, 0], "tint")
      .op_str(OP_MEMBER_NAME, &[MATERIAL_PARAM, 1], "albedo")
      .op_str(OP_NAME, &[COLLECTION], "MaterialCollection")
      .op_str(OP_MEMBER_NAME, &[COLLECTION, 0], "materialIDOffset")
      .op_str(OP_MEMBER_NAME, &[COLLECTION, 1], "params")
      .op_str(OP_NAME, &[COLLECTION_VAR], "materialCollection")
      .op_str(OP_NAME, &[TEXTURE_MAPS_VAR], "textureMaps")
      .op(OP_MEMBER_DECORATE, &[MATERIAL_PARAM, 0, DECORATION_OFFSET, 0])
      .op(OP_MEMBER_DECORATE, &[MATERIAL_PARAM, 1, DECORATION_OFFSET, 12])
      .op(OP_DECORATE, &[PARAM_ARRAY, DECORATION_ARRAY_STRIDE, 16])
      .op(OP_MEMBER_DECORATE, &[COLLECTION, 0, DECORATION_OFFSET, 0])
      .op(OP_MEMBER_DECORATE, &[COLLECTION, 1, DECORATION_OFFSET, 16])
      .op(OP_DECORATE, &[COLLECTION, DECORATION_BLOCK])
      .op(OP_DECORATE, &[COLLECTION_VAR, DECORATION_DESCRIPTOR_SET, 3])
      .op(OP_DECORATE, &[COLLECTION_VAR, DECORATION_BINDING, 0])
      .op(OP_DECORATE, &[TEXTURE_MAPS_VAR, DECORATION_DESCRIPTOR_SET, 3])
      .op(OP_DECORATE, &[TEXTURE_MAPS_VAR, DECORATION_BINDING, 1])
      // Types
      .op(19, &[VOID])
      .op(33, &[FN_VOID, VOID])
      .op(22, &[FLOAT, 32])
      .op(21, &[UINT, 32, 0])
      .op(23, &[VEC3, FLOAT, 3])
      .op(30, &[MATERIAL_PARAM, VEC3, UINT])
      .op(29, &[PARAM_ARRAY, MATERIAL_PARAM])
      .op(30, &[COLLECTION, UINT, PARAM_ARRAY])
      .op(32, &[COLLECTION_PTR, STORAGE_UNIFORM, COLLECTION])
      .op(59, &[COLLECTION_PTR, COLLECTION_VAR, STORAGE_UNIFORM])
      // 2D, not depth, not arrayed, single-sampled, sampled, unknown format
      .op(25, &[IMAGE, FLOAT, 1, 0, 0, 0, 1, 0])
      .op(27, &[SAMPLED_IMAGE, IMAGE])
      .op(29, &[SAMPLER_ARRAY, SAMPLED_IMAGE])
      .op(32, &[SAMPLER_ARRAY_PTR, STORAGE_UNIFORM_CONSTANT, SAMPLER_ARRAY])
      .op(59, &[SAMPLER_ARRAY_PTR, TEXTURE_MAPS_VAR, STORAGE_UNIFORM_CONSTANT])
      // void main() {}
      .op(54, &[VOID, MAIN, 0, FN_VOID])
      .op(248, &[LABEL])
      .op(253, &[])
      .op(56, &[]);
    asm.finish(LABEL + 1)
  }

  #[test]
  fn test_material_bindings_reflected() {
    let bindings = descriptor_bindings(&material_fragment_module()).unwrap();
    assert_eq!(bindings.len(), 2);

    let collection = &bindings[0];
    assert_eq!(collection.name, "materialCollection");
    assert_eq!((collection.set, collection.binding), (3, 0));
    let BindingShape::Struct(block) = &collection.shape else {
      panic!("expected a block, got {:?}", collection.shape);
    };
    assert_eq!(block.type_name, "MaterialCollection");
    assert_eq!(block.members.len(), 2);
    assert_eq!(block.members[0].name, "materialIDOffset");
    assert_eq!(block.members[0].offset, 0);
    assert_eq!(block.members[0].shape, MemberShape::Plain);

    let params = &block.members[1];
    assert_eq!(params.name, "params");
    assert_eq!(params.offset, 16);
    let MemberShape::Array {
      stride,
      element: Some(element),
    } = &params.shape
    else {
      panic!("expected a struct array, got {:?}", params.shape);
    };
    assert_eq!(*stride, 16);
    assert_eq!(element.type_name, "MaterialParam");
    let fields: Vec<_> = element
      .members
      .iter()
      .map(|member| (member.name.as_str(), member.offset))
      .collect();
    assert_eq!(fields, vec![("tint", 0u32), ("albedo", 12u32)]);

    let texture_maps = &bindings[1];
    assert_eq!(texture_maps.name, "textureMaps");
    assert_eq!((texture_maps.set, texture_maps.binding), (3, 1));
    assert_eq!(texture_maps.shape, BindingShape::RuntimeArray);
  }

  #[test]
  fn test_reflected_module_yields_material_layout() {
    let bindings = descriptor_bindings(&material_fragment_module()).unwrap();
    let layout = MaterialLayout::from_bindings(&bindings).unwrap();

    assert_eq!(layout.set, 3);
    assert_eq!(layout.material_id_offset, 0);
    assert_eq!(layout.array_offset, 16);
    assert_eq!(layout.stride, 16);
    let fields: Vec<_> = layout
      .elements
      .iter()
      .map(|element| (element.param_name.as_str(), element.relative_offset))
      .collect();
    assert_eq!(fields, vec![("tint", 0u32), ("albedo", 12u32)]);
  }

  #[test]
  fn test_spv_file_read_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("wood.frag.spv");
    let bytes: Vec<u8> = material_fragment_module()
      .iter()
      .flat_map(|word| word.to_le_bytes())
      .collect();
    std::fs::write(&path, bytes).unwrap();

    let words = read_spirv_words(&path).unwrap();
    assert_eq!(words, material_fragment_module());
  }

  #[test]
  fn test_truncated_header_is_invalid_spirv() {
    let result = descriptor_bindings(&[0x0723_0203, 0x0001_0000]);
    assert!(matches!(result, Err(ReflectionError::InvalidSpirv(_))));
  }

  #[test]
  fn test_missing_spv_file() {
    let result = read_spirv_words(Path::new("does/not/exist.spv"));
    assert!(matches!(result, Err(CookError::ShaderIo { .. })));
  }
}
