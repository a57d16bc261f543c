use vulkano::buffer::BufferContents;
use vulkano::pipeline::graphics::vertex_input::Vertex;

/// Interleaved vertex shared by every material pipeline.
///
/// Skinned and static meshes use the same layout; static meshes leave
/// `joint0` and `weight0` zeroed.
#[derive(BufferContents, Vertex, Clone, Copy, Debug, Default)]
#[repr(C)]
pub struct MeshVertex {
  #[format(R32G32B32_SFLOAT)]
  pub pos:     [f32; 3],
  #[format(R32G32B32_SFLOAT)]
  pub normal:  [f32; 3],
  #[format(R32G32_SFLOAT)]
  pub uv0:     [f32; 2],
  #[format(R32G32_SFLOAT)]
  pub uv1:     [f32; 2],
  #[format(R32G32B32A32_SFLOAT)]
  pub joint0:  [f32; 4],
  #[format(R32G32B32A32_SFLOAT)]
  pub weight0: [f32; 4],
  #[format(R32G32B32A32_SFLOAT)]
  pub color:   [f32; 4],
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_vertex_stride() {
    assert_eq!(std::mem::size_of::<MeshVertex>(), (3 + 3 + 2 + 2 + 4 + 4 + 4) * 4);
  }
}
