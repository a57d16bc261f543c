//! Cooked texture upload.
//!
//! Every material texture is sampled with nearest filtering and clamp-to-edge
//! addressing, so one sampler is shared by all of them.

use std::{path::Path, sync::Arc};

use vulkano::{
  buffer::{Buffer, BufferCreateInfo, BufferUsage},
  command_buffer::{
    AutoCommandBufferBuilder,
    CommandBufferUsage,
    CopyBufferToImageInfo,
    PrimaryCommandBufferAbstract,
  },
  device::Device,
  format::Format,
  image::{
    Image,
    ImageCreateInfo,
    ImageType,
    ImageUsage,
    sampler::{Filter, Sampler, SamplerAddressMode, SamplerCreateInfo},
    view::ImageView,
  },
  memory::allocator::{AllocationCreateInfo, MemoryTypeFilter},
  sync::GpuFuture,
};

use crate::{
  error::{GpuError, TextureError},
  render::init::Gpu,
};

/// Pixel used when a texture cannot be loaded.
pub const FALLBACK_PIXEL: [u8; 4] = [255, 0, 255, 255];

/// An uploaded texture and the sampler it is bound with.
#[derive(Clone)]
pub struct MaterialTexture {
  pub view:    Arc<ImageView>,
  pub sampler: Arc<Sampler>,
}

pub fn point_clamp_sampler(device: Arc<Device>) -> Result<Arc<Sampler>, GpuError> {
  Sampler::new(
    device,
    SamplerCreateInfo {
      mag_filter: Filter::Nearest,
      min_filter: Filter::Nearest,
      address_mode: [SamplerAddressMode::ClampToEdge; 3],
      ..Default::default()
    },
  )
  .map_err(GpuError::wrap("creating the material sampler"))
}

/// Decoded RGBA8 pixels of an image file.
pub struct DecodedImage {
  pub width:  u32,
  pub height: u32,
  pub pixels: Vec<u8>,
}

/// Decodes a cooked texture, sniffing the container format from its bytes.
pub fn decode_rgba8(path: &Path) -> Result<DecodedImage, TextureError> {
  let reader = image::ImageReader::open(path)
    .map_err(|source| TextureError::Io {
      path: path.to_path_buf(),
      source,
    })?
    .with_guessed_format()
    .map_err(|source| TextureError::Io {
      path: path.to_path_buf(),
      source,
    })?;
  let rgba = reader
    .decode()
    .map_err(|source| TextureError::Decode {
      path: path.to_path_buf(),
      source,
    })?
    .to_rgba8();

  let (width, height) = rgba.dimensions();
  Ok(DecodedImage {
    width,
    height,
    pixels: rgba.into_raw(),
  })
}

/// Copies RGBA8 pixels into a device-local sampled image and waits for the copy.
pub fn upload_rgba8(gpu: &Gpu, decoded: DecodedImage) -> Result<Arc<ImageView>, GpuError> {
  let image = Image::new(
    gpu.memory_allocator.clone(),
    ImageCreateInfo {
      image_type: ImageType::Dim2d,
      format: Format::R8G8B8A8_UNORM,
      extent: [decoded.width, decoded.height, 1],
      usage: ImageUsage::TRANSFER_DST | ImageUsage::SAMPLED,
      ..Default::default()
    },
    AllocationCreateInfo {
      memory_type_filter: MemoryTypeFilter::PREFER_DEVICE,
      ..Default::default()
    },
  )
  .map_err(GpuError::wrap("creating a texture image"))?;

  let staging_buffer = Buffer::from_iter(
    gpu.memory_allocator.clone(),
    BufferCreateInfo {
      usage: BufferUsage::TRANSFER_SRC,
      ..Default::default()
    },
    AllocationCreateInfo {
      memory_type_filter: MemoryTypeFilter::PREFER_HOST | MemoryTypeFilter::HOST_SEQUENTIAL_WRITE,
      ..Default::default()
    },
    decoded.pixels,
  )
  .map_err(GpuError::wrap("creating a texture staging buffer"))?;

  let mut upload = AutoCommandBufferBuilder::primary(
    gpu.command_buffer_allocator.clone(),
    gpu.queue.queue_family_index(),
    CommandBufferUsage::OneTimeSubmit,
  )
  .map_err(GpuError::wrap("recording a texture upload"))?;

  upload
    .copy_buffer_to_image(CopyBufferToImageInfo::buffer_image(staging_buffer, image.clone()))
    .map_err(GpuError::wrap("recording a texture upload"))?;

  upload
    .build()
    .map_err(GpuError::wrap("recording a texture upload"))?
    .execute(gpu.queue.clone())
    .map_err(GpuError::wrap("submitting a texture upload"))?
    .then_signal_fence_and_flush()
    .map_err(GpuError::wrap("submitting a texture upload"))?
    .wait(None)
    .map_err(GpuError::wrap("waiting for a texture upload"))?;

  ImageView::new_default(image).map_err(GpuError::wrap("creating a texture view"))
}

pub fn load_cooked_texture(gpu: &Gpu, path: &Path) -> Result<Arc<ImageView>, TextureError> {
  let decoded = decode_rgba8(path)?;
  tracing::debug!("Uploading {:?} ({}x{})", path, decoded.width, decoded.height);
  Ok(upload_rgba8(gpu, decoded)?)
}

/// 1x1 magenta stand-in for textures that failed to load.
pub fn fallback_texture(gpu: &Gpu) -> Result<Arc<ImageView>, GpuError> {
  upload_rgba8(gpu, DecodedImage {
    width:  1,
    height: 1,
    pixels: FALLBACK_PIXEL.to_vec(),
  })
}
