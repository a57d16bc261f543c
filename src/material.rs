//! Material files, their registry and the cooking pipeline built on them.

pub mod backend;
pub mod base;
pub mod compiler;
pub mod derived;
pub mod format;
pub mod layout;
pub mod organizer;
pub mod registry;
pub mod textures;
