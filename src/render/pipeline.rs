//! Material pipeline creation.
//!
//! Fixed-function state depends only on the [`PassKind`]:
//! * Shadow: depth only, no culling, depth clamp, one `u32` push constant
//!   holding the cascade index
//! * Z prepass: depth only, back faces culled with clockwise front faces
//! * Opaque: color output, equal depth test without writes, same culling as
//!   the prepass
//!
//! Viewport and scissor are dynamic so pipelines survive resizes.

use std::{path::Path, sync::Arc};

use vulkano::{
  descriptor_set::layout::DescriptorSetLayout,
  device::Device,
  pipeline::{
    DynamicState,
    GraphicsPipeline,
    PipelineLayout,
    PipelineShaderStageCreateInfo,
    graphics::{
      GraphicsPipelineCreateInfo,
      color_blend::{ColorBlendAttachmentState, ColorBlendState},
      depth_stencil::{CompareOp, DepthState, DepthStencilState},
      input_assembly::InputAssemblyState,
      multisample::MultisampleState,
      rasterization::{CullMode, FrontFace, RasterizationState},
      vertex_input::{Vertex, VertexDefinition},
      viewport::ViewportState,
    },
    layout::{PipelineLayoutCreateInfo, PushConstantRange},
  },
  render_pass::Subpass,
  shader::{EntryPoint, ShaderModule, ShaderModuleCreateInfo, ShaderStages},
};

use crate::{
  error::{CookError, GpuError},
  material::backend::PassKind,
  reflect::read_spirv_words,
  vertex::MeshVertex,
};

/// Loads a compiled shader and returns its `main` entry point.
pub fn load_entry_point(device: Arc<Device>, path: &Path) -> Result<EntryPoint, CookError> {
  let words = read_spirv_words(path)?;
  // SAFETY: material shaders come from the engine's own shader compiler.
  let module = unsafe { ShaderModule::new(device, ShaderModuleCreateInfo::new(&words)) }.map_err(|e| {
    CookError::ShaderModule {
      path:   path.to_path_buf(),
      reason: format!("{e:?}"),
    }
  })?;
  module.entry_point("main").ok_or_else(|| CookError::ShaderModule {
    path:   path.to_path_buf(),
    reason: "no `main` entry point".to_string(),
  })
}

pub fn rasterization_for(pass: PassKind, depth_clamp_supported: bool) -> RasterizationState {
  match pass {
    PassKind::Shadow => RasterizationState {
      depth_clamp_enable: depth_clamp_supported,
      cull_mode: CullMode::None,
      ..Default::default()
    },
    PassKind::ZPrepass | PassKind::Opaque => RasterizationState {
      cull_mode: CullMode::Back,
      front_face: FrontFace::Clockwise,
      ..Default::default()
    },
  }
}

pub fn depth_for(pass: PassKind) -> DepthState {
  match pass {
    PassKind::Shadow | PassKind::ZPrepass => DepthState {
      write_enable: true,
      compare_op:   CompareOp::LessOrEqual,
    },
    // The prepass already wrote the final depth.
    PassKind::Opaque => DepthState {
      write_enable: false,
      compare_op:   CompareOp::Equal,
    },
  }
}

pub fn push_constants_for(pass: PassKind) -> Vec<PushConstantRange> {
  match pass {
    PassKind::Shadow => vec![PushConstantRange {
      stages: ShaderStages::VERTEX,
      offset: 0,
      size:   size_of::<u32>() as u32,
    }],
    PassKind::ZPrepass | PassKind::Opaque => Vec::new(),
  }
}

pub struct MaterialPipelineConfig {
  pub vertex_shader:   EntryPoint,
  pub fragment_shader: EntryPoint,
  pub pass:            PassKind,
  /// Layouts by set index, see [`crate::render::SharedSetLayouts::for_pass`]
  pub set_layouts:     Vec<Arc<DescriptorSetLayout>>,
  pub subpass:         Subpass,
}

pub fn create_material_pipeline(
  device: Arc<Device>,
  config: MaterialPipelineConfig,
) -> Result<Arc<GraphicsPipeline>, GpuError> {
  let depth_clamp_supported = device.enabled_features().depth_clamp;
  if config.pass == PassKind::Shadow && !depth_clamp_supported {
    tracing::warn!("depth_clamp is not enabled; shadow casters past the far plane will be clipped");
  }

  let vertex_input_state = MeshVertex::per_vertex()
    .definition(&config.vertex_shader)
    .map_err(GpuError::wrap("matching vertex input to the vertex shader"))?;

  let stages = [
    PipelineShaderStageCreateInfo::new(config.vertex_shader),
    PipelineShaderStageCreateInfo::new(config.fragment_shader),
  ];

  let layout = PipelineLayout::new(device.clone(), PipelineLayoutCreateInfo {
    set_layouts: config.set_layouts,
    push_constant_ranges: push_constants_for(config.pass),
    ..Default::default()
  })
  .map_err(GpuError::wrap("creating a material pipeline layout"))?;

  let color_blend_state = (config.subpass.num_color_attachments() > 0).then(|| {
    ColorBlendState::with_attachment_states(
      config.subpass.num_color_attachments(),
      ColorBlendAttachmentState::default(),
    )
  });

  GraphicsPipeline::new(device.clone(), None, GraphicsPipelineCreateInfo {
    stages: stages.into_iter().collect(),
    vertex_input_state: Some(vertex_input_state),
    input_assembly_state: Some(InputAssemblyState::default()),
    viewport_state: Some(ViewportState::default()),
    rasterization_state: Some(rasterization_for(config.pass, depth_clamp_supported)),
    depth_stencil_state: Some(DepthStencilState {
      depth: Some(depth_for(config.pass)),
      ..Default::default()
    }),
    multisample_state: Some(MultisampleState::default()),
    color_blend_state,
    dynamic_state: [DynamicState::Viewport, DynamicState::Scissor]
      .into_iter()
      .collect(),
    subpass: Some(config.subpass.into()),
    ..GraphicsPipelineCreateInfo::layout(layout)
  })
  .map_err(GpuError::wrap("creating a material pipeline"))
}
