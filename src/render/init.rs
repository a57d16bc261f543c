//! Headless Vulkan bring-up for the material cooker.

use std::sync::Arc;

use vulkano::{
  Version,
  VulkanLibrary,
  command_buffer::allocator::StandardCommandBufferAllocator,
  descriptor_set::allocator::StandardDescriptorSetAllocator,
  device::{
    Device,
    DeviceCreateInfo,
    DeviceExtensions,
    DeviceFeatures,
    Queue,
    QueueCreateInfo,
    QueueFlags,
    physical::PhysicalDeviceType,
  },
  instance::{Instance, InstanceCreateFlags, InstanceCreateInfo},
  memory::allocator::StandardMemoryAllocator,
};

use crate::error::GpuError;

pub struct Gpu {
  pub instance:                 Arc<Instance>,
  pub device:                   Arc<Device>,
  pub queue:                    Arc<Queue>,
  pub memory_allocator:         Arc<StandardMemoryAllocator>,
  pub descriptor_set_allocator: Arc<StandardDescriptorSetAllocator>,
  pub command_buffer_allocator: Arc<StandardCommandBufferAllocator>,
}

/// Features material pipelines use when the device has them:
/// * `depth_clamp` for shadow cascades
/// * runtime-sized, non-uniformly indexed `textureMaps[]`
fn wanted_features() -> DeviceFeatures {
  DeviceFeatures {
    depth_clamp: true,
    runtime_descriptor_array: true,
    shader_sampled_image_array_non_uniform_indexing: true,
    ..DeviceFeatures::empty()
  }
}

/// Splits the wanted features into `(enabled, missing)` for a device.
fn negotiate_features(supported: &DeviceFeatures) -> (DeviceFeatures, DeviceFeatures) {
  let wanted = wanted_features();
  let enabled = wanted.intersection(supported);
  let missing = wanted.difference(&enabled);
  (enabled, missing)
}

/// Creates an instance and device without any surface or swapchain.
pub fn initialize_headless() -> Result<Gpu, GpuError> {
  let library = VulkanLibrary::new().map_err(GpuError::wrap("loading the Vulkan library"))?;
  let instance = Instance::new(
    library,
    InstanceCreateInfo {
      flags: InstanceCreateFlags::ENUMERATE_PORTABILITY,
      ..Default::default()
    },
  )
  .map_err(GpuError::wrap("creating the instance"))?;

  let (physical_device, queue_family_index) = instance
    .enumerate_physical_devices()
    .map_err(GpuError::wrap("enumerating physical devices"))?
    .filter_map(|p| {
      p.queue_family_properties()
        .iter()
        .position(|q| q.queue_flags.intersects(QueueFlags::GRAPHICS))
        .map(|i| (p, i as u32))
    })
    .min_by_key(|(p, _)| match p.properties().device_type {
      PhysicalDeviceType::DiscreteGpu => 0,
      PhysicalDeviceType::IntegratedGpu => 1,
      PhysicalDeviceType::VirtualGpu => 2,
      PhysicalDeviceType::Cpu => 3,
      PhysicalDeviceType::Other => 4,
      _ => 5,
    })
    .ok_or(GpuError {
      context: "selecting a physical device",
      message: "no device exposes a graphics queue".to_string(),
    })?;

  tracing::info!(
    "Using device: {} (type: {:?}, Vulkan {:?})",
    physical_device.properties().device_name,
    physical_device.properties().device_type,
    physical_device.api_version(),
  );

  let (enabled_features, missing) = negotiate_features(physical_device.supported_features());
  if missing != DeviceFeatures::empty() {
    tracing::warn!("Device lacks {:?}; some material pipelines may fail to build", missing);
  }

  // Before 1.2 descriptor indexing is an extension.
  let enabled_extensions = if physical_device.api_version() < Version::V1_2
    && physical_device.supported_extensions().ext_descriptor_indexing
  {
    DeviceExtensions {
      ext_descriptor_indexing: true,
      ..DeviceExtensions::empty()
    }
  } else {
    DeviceExtensions::empty()
  };

  let (device, mut queues) = Device::new(
    physical_device,
    DeviceCreateInfo {
      enabled_extensions,
      enabled_features,
      queue_create_infos: vec![QueueCreateInfo {
        queue_family_index,
        ..Default::default()
      }],
      ..Default::default()
    },
  )
  .map_err(GpuError::wrap("creating the logical device"))?;

  let queue = queues.next().ok_or(GpuError {
    context: "creating the logical device",
    message: "no queue was returned".to_string(),
  })?;

  let memory_allocator = Arc::new(StandardMemoryAllocator::new_default(device.clone()));
  let descriptor_set_allocator = Arc::new(StandardDescriptorSetAllocator::new(
    device.clone(),
    Default::default(),
  ));
  let command_buffer_allocator = Arc::new(StandardCommandBufferAllocator::new(
    device.clone(),
    Default::default(),
  ));

  Ok(Gpu {
    instance,
    device,
    queue,
    memory_allocator,
    descriptor_set_allocator,
    command_buffer_allocator,
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_full_support_enables_everything() {
    let (enabled, missing) = negotiate_features(&wanted_features());
    assert_eq!(enabled, wanted_features());
    assert_eq!(missing, DeviceFeatures::empty());
  }

  #[test]
  fn test_partial_support_reports_missing() {
    let supported = DeviceFeatures {
      depth_clamp: true,
      ..DeviceFeatures::empty()
    };
    let (enabled, missing) = negotiate_features(&supported);
    assert!(enabled.depth_clamp);
    assert!(!enabled.runtime_descriptor_array);
    assert_ne!(missing, DeviceFeatures::empty());
    assert!(missing.runtime_descriptor_array);
    assert!(missing.shader_sampled_image_array_non_uniform_indexing);
    assert!(!missing.depth_clamp);
  }
}
