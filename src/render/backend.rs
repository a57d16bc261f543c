//! [`MaterialBackend`] on a vulkano device.

use std::{path::Path, sync::Arc};

use vulkano::{
  buffer::{Buffer, BufferCreateInfo, BufferUsage, Subbuffer},
  descriptor_set::DescriptorSet,
  image::sampler::Sampler,
  memory::allocator::{AllocationCreateInfo, MemoryTypeFilter},
  pipeline::GraphicsPipeline,
};

use crate::{
  error::{CookError, GpuError},
  material::backend::{Compiled, MaterialBackend, PipelineRequest},
  reflect::{ReflectedBinding, descriptor_bindings, read_spirv_words},
  render::{
    MATERIAL_SET,
    RenderPasses,
    SharedSetLayouts,
    descriptor::material_descriptor_set,
    init::Gpu,
    pipeline::{MaterialPipelineConfig, create_material_pipeline, load_entry_point},
    texture::{MaterialTexture, fallback_texture, load_cooked_texture, point_clamp_sampler},
  },
};

/// Objects kept alive only so their drop waits for `flush_deletion_queue`.
enum Retired {
  Material(#[allow(dead_code)] Compiled<VulkanoBackend>),
  Textures(Vec<MaterialTexture>),
}

pub struct VulkanoBackend {
  gpu:            Gpu,
  render_passes:  RenderPasses,
  set_layouts:    SharedSetLayouts,
  sampler:        Arc<Sampler>,
  fallback:       MaterialTexture,
  deletion_queue: Vec<Retired>,
}

impl VulkanoBackend {
  pub fn new(gpu: Gpu) -> Result<Self, GpuError> {
    let render_passes = RenderPasses::new(gpu.device.clone())?;
    let set_layouts = SharedSetLayouts::new(gpu.device.clone())?;
    let sampler = point_clamp_sampler(gpu.device.clone())?;
    let fallback = MaterialTexture {
      view:    fallback_texture(&gpu)?,
      sampler: sampler.clone(),
    };

    Ok(Self {
      gpu,
      render_passes,
      set_layouts,
      sampler,
      fallback,
      deletion_queue: Vec::new(),
    })
  }

  pub fn gpu(&self) -> &Gpu {
    &self.gpu
  }

  pub fn render_passes(&self) -> &RenderPasses {
    &self.render_passes
  }

  pub fn set_layouts(&self) -> &SharedSetLayouts {
    &self.set_layouts
  }

  pub fn pending_deletions(&self) -> usize {
    self.deletion_queue.len()
  }

  /// Drops everything retired so far. Call once no submitted frame can still
  /// reference the retired objects.
  pub fn flush_deletion_queue(&mut self) {
    if self.deletion_queue.is_empty() {
      return;
    }
    let (mut materials, mut textures) = (0, 0);
    for retired in self.deletion_queue.drain(..) {
      match retired {
        Retired::Material(_) => materials += 1,
        Retired::Textures(list) => textures += list.len(),
      }
    }
    tracing::debug!("Freed {materials} retired materials and {textures} retired textures");
  }
}

impl MaterialBackend for VulkanoBackend {
  type Texture = MaterialTexture;
  type Buffer = Subbuffer<[u8]>;
  type DescriptorSet = Arc<DescriptorSet>;
  type Pipeline = Arc<GraphicsPipeline>;

  fn reflect_fragment_shader(&mut self, spv_path: &Path) -> Result<Vec<ReflectedBinding>, CookError> {
    let words = read_spirv_words(spv_path)?;
    Ok(descriptor_bindings(&words)?)
  }

  fn load_texture(&mut self, path: &Path) -> MaterialTexture {
    match load_cooked_texture(&self.gpu, path) {
      Ok(view) => MaterialTexture {
        view,
        sampler: self.sampler.clone(),
      },
      Err(e) => {
        tracing::error!("{e}; using the fallback texture");
        self.fallback.clone()
      }
    }
  }

  fn create_parameter_buffer(
    &mut self,
    size: u64,
    fill: &mut dyn FnMut(&mut [u8]),
  ) -> Result<Subbuffer<[u8]>, CookError> {
    // Zero-sized buffers are invalid.
    let buffer = Buffer::new_slice::<u8>(
      self.gpu.memory_allocator.clone(),
      BufferCreateInfo {
        usage: BufferUsage::STORAGE_BUFFER,
        ..Default::default()
      },
      AllocationCreateInfo {
        memory_type_filter: MemoryTypeFilter::PREFER_DEVICE | MemoryTypeFilter::HOST_SEQUENTIAL_WRITE,
        ..Default::default()
      },
      size.max(1),
    )
    .map_err(GpuError::wrap("creating a material parameter buffer"))?;

    {
      let mut mapped = buffer
        .write()
        .map_err(GpuError::wrap("mapping a material parameter buffer"))?;
      mapped.fill(0);
      fill(&mut mapped[..size as usize]);
    }

    Ok(buffer)
  }

  fn build_descriptor_set(
    &mut self,
    buffer: &Subbuffer<[u8]>,
    textures: &[MaterialTexture],
  ) -> Result<Arc<DescriptorSet>, CookError> {
    let fallback = std::slice::from_ref(&self.fallback);
    let textures = if textures.is_empty() { fallback } else { textures };
    Ok(material_descriptor_set(
      self.gpu.descriptor_set_allocator.clone(),
      buffer.clone(),
      textures,
    )?)
  }

  fn build_pipeline(
    &mut self,
    request: &PipelineRequest<'_, Arc<DescriptorSet>>,
  ) -> Result<Arc<GraphicsPipeline>, CookError> {
    if request.material_set_index != MATERIAL_SET {
      return Err(CookError::ShaderModule {
        path:   request.fragment_shader.clone(),
        reason: format!(
          "material bindings are in set {}, pipelines bind materials at set {MATERIAL_SET}",
          request.material_set_index
        ),
      });
    }

    let device = self.gpu.device.clone();
    let config = MaterialPipelineConfig {
      vertex_shader:   load_entry_point(device.clone(), &request.vertex_shader)?,
      fragment_shader: load_entry_point(device.clone(), &request.fragment_shader)?,
      pass:            request.pass,
      set_layouts:     self
        .set_layouts
        .for_pass(request.pass, request.material_set.layout().clone()),
      subpass:         self.render_passes.subpass(request.pass)?,
    };

    let pipeline = create_material_pipeline(device, config)?;
    tracing::debug!("{}: built {:?} pipeline", request.base_fname, request.pass);
    Ok(pipeline)
  }

  fn retire_material(&mut self, material: Compiled<Self>) {
    self.deletion_queue.push(Retired::Material(material));
  }

  fn retire_textures(&mut self, textures: Vec<MaterialTexture>) {
    if !textures.is_empty() {
      self.deletion_queue.push(Retired::Textures(textures));
    }
  }
}
