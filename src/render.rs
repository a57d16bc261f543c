//! Vulkan objects shared by every material pipeline.
//!
//! Material pipelines are built against fixed render passes and a fixed
//! descriptor set order:
//! * Main pass: subpass 0 is the depth prepass, subpass 1 the opaque color pass
//!   testing against the prepass depth
//! * Shadow pass: one depth-only subpass rendered once per cascade
//!
//! Sets are bound as global, object, instance, material, skeletal, and for the
//! opaque pass only, the lighting grid.

pub mod backend;
pub mod descriptor;
pub mod init;
pub mod pipeline;
pub mod texture;

use std::{collections::BTreeMap, sync::Arc};

use vulkano::{
  descriptor_set::layout::{
    DescriptorSetLayout,
    DescriptorSetLayoutBinding,
    DescriptorSetLayoutCreateInfo,
    DescriptorType,
  },
  device::Device,
  format::Format,
  render_pass::{RenderPass, Subpass},
  shader::ShaderStages,
};

use crate::{error::GpuError, material::backend::PassKind};

pub const COLOR_FORMAT: Format = Format::R16G16B16A16_SFLOAT;
pub const DEPTH_FORMAT: Format = Format::D32_SFLOAT;

/// Set index of the material set in every material pipeline layout.
pub const MATERIAL_SET: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetSlot {
  Global,
  Object,
  Instance,
  Material,
  Skeletal,
  LightingGrid,
}

const DEPTH_SET_ORDER: &[SetSlot] = &[
  SetSlot::Global,
  SetSlot::Object,
  SetSlot::Instance,
  SetSlot::Material,
  SetSlot::Skeletal,
];

const OPAQUE_SET_ORDER: &[SetSlot] = &[
  SetSlot::Global,
  SetSlot::Object,
  SetSlot::Instance,
  SetSlot::Material,
  SetSlot::Skeletal,
  SetSlot::LightingGrid,
];

/// Descriptor sets of a pipeline layout, by set index.
pub fn set_order(pass: PassKind) -> &'static [SetSlot] {
  match pass {
    PassKind::Opaque => OPAQUE_SET_ORDER,
    PassKind::ZPrepass | PassKind::Shadow => DEPTH_SET_ORDER,
  }
}

/// Layouts of the sets the renderer owns; the material set comes per cook.
pub struct SharedSetLayouts {
  /// Camera and scene uniforms
  pub global:        Arc<DescriptorSetLayout>,
  /// Per-object transforms
  pub object:        Arc<DescriptorSetLayout>,
  /// Instance to object indirection
  pub instance:      Arc<DescriptorSetLayout>,
  /// Joint matrices of skinned meshes
  pub skeletal:      Arc<DescriptorSetLayout>,
  /// 3D lighting grid sampled by opaque shading
  pub lighting_grid: Arc<DescriptorSetLayout>,
}

impl SharedSetLayouts {
  pub fn new(device: Arc<Device>) -> Result<Self, GpuError> {
    Ok(Self {
      global:        single_binding_layout(
        device.clone(),
        DescriptorType::UniformBuffer,
        ShaderStages::VERTEX | ShaderStages::FRAGMENT,
      )?,
      object:        single_binding_layout(device.clone(), DescriptorType::StorageBuffer, ShaderStages::VERTEX)?,
      instance:      single_binding_layout(device.clone(), DescriptorType::StorageBuffer, ShaderStages::VERTEX)?,
      skeletal:      single_binding_layout(device.clone(), DescriptorType::StorageBuffer, ShaderStages::VERTEX)?,
      lighting_grid: single_binding_layout(
        device,
        DescriptorType::CombinedImageSampler,
        ShaderStages::FRAGMENT,
      )?,
    })
  }

  /// Set layouts for a pipeline of `pass`, with `material` at [`MATERIAL_SET`].
  pub fn for_pass(&self, pass: PassKind, material: Arc<DescriptorSetLayout>) -> Vec<Arc<DescriptorSetLayout>> {
    set_order(pass)
      .iter()
      .map(|slot| match slot {
        SetSlot::Global => self.global.clone(),
        SetSlot::Object => self.object.clone(),
        SetSlot::Instance => self.instance.clone(),
        SetSlot::Material => material.clone(),
        SetSlot::Skeletal => self.skeletal.clone(),
        SetSlot::LightingGrid => self.lighting_grid.clone(),
      })
      .collect()
  }
}

fn single_binding_layout(
  device: Arc<Device>,
  descriptor_type: DescriptorType,
  stages: ShaderStages,
) -> Result<Arc<DescriptorSetLayout>, GpuError> {
  DescriptorSetLayout::new(device, DescriptorSetLayoutCreateInfo {
    bindings: BTreeMap::from([(0, DescriptorSetLayoutBinding {
      stages,
      ..DescriptorSetLayoutBinding::descriptor_type(descriptor_type)
    })]),
    ..Default::default()
  })
  .map_err(GpuError::wrap("creating a shared set layout"))
}

pub struct RenderPasses {
  pub main:   Arc<RenderPass>,
  pub shadow: Arc<RenderPass>,
}

impl RenderPasses {
  pub fn new(device: Arc<Device>) -> Result<Self, GpuError> {
    let main = vulkano::ordered_passes_renderpass!(
      device.clone(),
      attachments: {
        color: {
          format: COLOR_FORMAT,
          samples: 1,
          load_op: Clear,
          store_op: Store,
        },
        depth: {
          format: DEPTH_FORMAT,
          samples: 1,
          load_op: Clear,
          store_op: Store,
        }
      },
      passes: [
        {
          color: [],
          depth_stencil: {depth},
          input: []
        },
        {
          color: [color],
          depth_stencil: {depth},
          input: []
        }
      ]
    )
    .map_err(GpuError::wrap("creating the main render pass"))?;

    let shadow = vulkano::single_pass_renderpass!(
      device,
      attachments: {
        depth: {
          format: DEPTH_FORMAT,
          samples: 1,
          load_op: Clear,
          store_op: Store,
        }
      },
      pass: {
        color: [],
        depth_stencil: {depth},
      },
    )
    .map_err(GpuError::wrap("creating the shadow render pass"))?;

    Ok(Self { main, shadow })
  }

  pub fn subpass(&self, pass: PassKind) -> Result<Subpass, GpuError> {
    let (render_pass, index) = match pass {
      PassKind::ZPrepass => (&self.main, 0),
      PassKind::Opaque => (&self.main, 1),
      PassKind::Shadow => (&self.shadow, 0),
    };
    Subpass::from(render_pass.clone(), index).ok_or(GpuError {
      context: "selecting a subpass",
      message: format!("{pass:?} subpass {index} does not exist"),
    })
  }
}
