//! The material descriptor set: parameter buffer plus texture array.

use std::{collections::BTreeMap, sync::Arc};

use vulkano::{
  buffer::Subbuffer,
  descriptor_set::{
    DescriptorSet,
    WriteDescriptorSet,
    allocator::StandardDescriptorSetAllocator,
    layout::{
      DescriptorSetLayout,
      DescriptorSetLayoutBinding,
      DescriptorSetLayoutCreateInfo,
      DescriptorType,
    },
  },
  device::{Device, DeviceOwned},
  shader::ShaderStages,
};

use crate::{error::GpuError, render::texture::MaterialTexture};

pub const PARAMETER_BUFFER_BINDING: u32 = 0;
pub const TEXTURE_ARRAY_BINDING: u32 = 1;

/// Layout sized for `texture_count` textures. The count changes between
/// cooks, so a new layout is built for every set.
pub fn material_set_layout(
  device: Arc<Device>,
  texture_count: u32,
) -> Result<Arc<DescriptorSetLayout>, GpuError> {
  let bindings = BTreeMap::from([
    (PARAMETER_BUFFER_BINDING, DescriptorSetLayoutBinding {
      stages: ShaderStages::FRAGMENT,
      ..DescriptorSetLayoutBinding::descriptor_type(DescriptorType::StorageBuffer)
    }),
    (TEXTURE_ARRAY_BINDING, DescriptorSetLayoutBinding {
      stages: ShaderStages::FRAGMENT,
      descriptor_count: texture_count,
      ..DescriptorSetLayoutBinding::descriptor_type(DescriptorType::CombinedImageSampler)
    }),
  ]);

  DescriptorSetLayout::new(device, DescriptorSetLayoutCreateInfo {
    bindings,
    ..Default::default()
  })
  .map_err(GpuError::wrap("creating the material set layout"))
}

/// Writes `buffer` at binding 0 and `textures` in order at binding 1.
/// `textures` must not be empty.
pub fn material_descriptor_set(
  allocator: Arc<StandardDescriptorSetAllocator>,
  buffer: Subbuffer<[u8]>,
  textures: &[MaterialTexture],
) -> Result<Arc<DescriptorSet>, GpuError> {
  let layout = material_set_layout(allocator.device().clone(), textures.len() as u32)?;

  DescriptorSet::new(
    allocator,
    layout,
    [
      WriteDescriptorSet::buffer(PARAMETER_BUFFER_BINDING, buffer),
      WriteDescriptorSet::image_view_sampler_array(
        TEXTURE_ARRAY_BINDING,
        0,
        textures
          .iter()
          .map(|texture| (texture.view.clone(), texture.sampler.clone())),
      ),
    ],
    [],
  )
  .map_err(GpuError::wrap("writing the material descriptor set"))
}
