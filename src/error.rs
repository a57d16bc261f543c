//! Error types for loading, reflecting and cooking materials.

use std::path::PathBuf;

/// A material file could not be loaded at all.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
  #[error("could not read {path:?}: {source}")]
  Io {
    path:   PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("{path:?} line {line}: file tag missing, expected {expected:?}")]
  BadMagic {
    path:     PathBuf,
    line:     usize,
    expected: &'static str,
  },

  #[error("{path:?} line {line}: {reason}")]
  MalformedLine {
    path:   PathBuf,
    line:   usize,
    reason: String,
  },

  #[error("{path:?}: file ended before {missing}")]
  Truncated {
    path:    PathBuf,
    missing: &'static str,
  },

  #[error("{0:?} is neither a .humba nor a .hderriere file")]
  UnknownExtension(PathBuf),
}

/// The fragment shader does not expose the material collection layout.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ReflectionError {
  #[error("SPIR-V could not be parsed: {0}")]
  InvalidSpirv(String),

  #[error("binding `{name}` not found at binding {binding}")]
  MissingBinding { name: &'static str, binding: u32 },

  #[error("bindings `materialCollection` and `textureMaps` are in different sets ({0} and {1})")]
  SetMismatch(u32, u32),

  #[error("`materialCollection` has no member `{0}`")]
  MissingMember(&'static str),
}

/// A vulkano object could not be created.
#[derive(Debug, thiserror::Error)]
#[error("{context}: {message}")]
pub struct GpuError {
  pub context: &'static str,
  pub message: String,
}

impl GpuError {
  /// Adapter for `map_err` on any vulkano result.
  pub fn wrap<E: std::fmt::Debug>(context: &'static str) -> impl FnOnce(E) -> GpuError {
    move |e| GpuError {
      context,
      message: format!("{e:?}"),
    }
  }
}

/// Cooking one material base failed; the base stays uncooked.
#[derive(Debug, thiserror::Error)]
pub enum CookError {
  #[error("could not read shader {path:?}: {source}")]
  ShaderIo {
    path:   PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("shader {path:?}: {reason}")]
  ShaderModule { path: PathBuf, reason: String },

  #[error(transparent)]
  Reflection(#[from] ReflectionError),

  #[error(transparent)]
  Gpu(#[from] GpuError),
}

/// A cooked texture could not be turned into an image view.
#[derive(Debug, thiserror::Error)]
pub enum TextureError {
  #[error("could not read texture {path:?}: {source}")]
  Io {
    path:   PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("could not decode texture {path:?}: {source}")]
  Decode {
    path:   PathBuf,
    #[source]
    source: image::ImageError,
  },

  #[error(transparent)]
  Gpu(#[from] GpuError),
}
