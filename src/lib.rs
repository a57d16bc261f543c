pub mod config;
pub mod error;
pub mod material;
pub mod reflect;
pub mod render;
pub mod vertex;

// Re-export commonly used items
pub use config::ResourcePaths;
pub use error::{CookError, FormatError, GpuError, ReflectionError, TextureError};
pub use material::{
  backend::{MaterialBackend, PassKind},
  organizer::{CookReport, LoadReport, MaterialOrganizer},
  registry::MaterialRegistry,
};
pub use render::backend::VulkanoBackend;
pub use vertex::MeshVertex;
