//! Owns the material registry and every cooked GPU object.
//!
//! A cook pass runs in three steps:
//! 1. rebuild the texture list from all derived sets and upload it
//! 2. for every loaded base, reflect its fragment shader and build the layout
//! 3. fill a parameter buffer, then build the descriptor set and pipeline
//!
//! Replaced GPU objects go to the backend's deletion queue. A base whose cook
//! fails has no entry afterwards, so lookups for it return `None`.

use std::{
  collections::HashMap,
  path::{Path, PathBuf},
};

use crate::{
  config::{DERIVED_MATERIAL_EXTENSION, MATERIAL_BASE_EXTENSION, ResourcePaths},
  error::{CookError, FormatError},
  material::{
    backend::{Compiled, MaterialBackend, PassKind, PipelineRequest},
    base::UniqueMaterialBase,
    compiler::{BoundSets, WriteStats, write_parameters},
    layout::MaterialLayout,
    registry::MaterialRegistry,
    textures::TextureList,
  },
};

/// Result of [`MaterialOrganizer::load_directory`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
  pub loaded: usize,
  pub failed: usize,
}

/// Result of one cook pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CookReport {
  pub cooked:   usize,
  pub failed:   usize,
  pub textures: usize,
}

enum MaterialFile {
  Base,
  Derived,
}

fn classify(path: &Path) -> Option<MaterialFile> {
  match path.extension()?.to_str()? {
    MATERIAL_BASE_EXTENSION => Some(MaterialFile::Base),
    DERIVED_MATERIAL_EXTENSION => Some(MaterialFile::Derived),
    _ => None,
  }
}

pub struct MaterialOrganizer<B: MaterialBackend> {
  backend:         B,
  registry:        MaterialRegistry,
  textures:        TextureList,
  texture_handles: Vec<B::Texture>,
  compiled:        HashMap<String, Compiled<B>>,
}

impl<B: MaterialBackend> MaterialOrganizer<B> {
  pub fn new(backend: B, paths: ResourcePaths) -> Self {
    Self {
      backend,
      registry: MaterialRegistry::new(paths),
      textures: TextureList::default(),
      texture_handles: Vec::new(),
      compiled: HashMap::new(),
    }
  }

  pub fn registry(&self) -> &MaterialRegistry {
    &self.registry
  }

  pub fn textures(&self) -> &TextureList {
    &self.textures
  }

  pub fn backend(&self) -> &B {
    &self.backend
  }

  pub fn backend_mut(&mut self) -> &mut B {
    &mut self.backend
  }

  /// Loads one material file, picking the parser from its extension.
  pub fn load(&mut self, path: &Path) -> Result<(), FormatError> {
    match classify(path) {
      Some(MaterialFile::Base) => self.registry.load_material_base(path),
      Some(MaterialFile::Derived) => self.registry.load_derived_material_param(path),
      None => Err(FormatError::UnknownExtension(path.to_path_buf())),
    }
  }

  /// Loads every `.humba` and `.hderriere` file under the materials
  /// directory, subfolders included.
  pub fn load_directory(&mut self) -> LoadReport {
    let mut report = LoadReport::default();
    let dir = self.registry.paths().materials_dir.clone();

    let mut files = Vec::new();
    if let Err(e) = collect_material_files(&dir, &mut files) {
      tracing::error!("Could not read materials directory {:?}: {e}", dir);
      return report;
    }
    files.sort();

    for path in files {
      match self.load(&path) {
        Ok(()) => report.loaded += 1,
        Err(e) => {
          tracing::error!("{e}");
          report.failed += 1;
        }
      }
    }

    tracing::info!(
      "Loaded {} material files from {:?} ({} failed)",
      report.loaded,
      dir,
      report.failed
    );
    report
  }

  /// Whether `path` or anything it depends on changed since it was loaded.
  pub fn check_reload_needed(&self, path: &Path) -> bool {
    match classify(path) {
      Some(MaterialFile::Base) => self.registry.material_base_reload_needed(path),
      Some(MaterialFile::Derived) => self.registry.derived_material_param_reload_needed(path),
      None => false,
    }
  }

  /// Reloads one file and recooks everything.
  ///
  /// The cook runs even when the load fails, since the file's entry is now
  /// blank and must stop contributing to buffers.
  pub fn reload(&mut self, path: &Path) -> Result<CookReport, FormatError> {
    let loaded = self.load(path);
    let report = self.cook_all();
    loaded.map(|()| report)
  }

  /// Reloads every stale file and recooks once. `None` if nothing was stale.
  pub fn poll_reloads(&mut self) -> Option<CookReport> {
    let stale: Vec<PathBuf> = self
      .registry
      .known_paths()
      .into_iter()
      .filter(|path| self.check_reload_needed(path))
      .collect();
    if stale.is_empty() {
      return None;
    }

    for path in &stale {
      tracing::info!("Hot reloading {:?}", path);
      if let Err(e) = self.load(path) {
        tracing::error!("{e}");
      }
    }
    Some(self.cook_all())
  }

  pub fn cook_all(&mut self) -> CookReport {
    let mut report = CookReport::default();

    self.textures = TextureList::build(self.registry.derived_mut());
    let mut handles = Vec::with_capacity(self.textures.len());
    for name in self.textures.names() {
      let path = self.registry.paths().cooked_texture(name);
      handles.push(self.backend.load_texture(&path));
    }
    let replaced = std::mem::replace(&mut self.texture_handles, handles);
    self.backend.retire_textures(replaced);
    report.textures = self.textures.len();

    let previous: Vec<Compiled<B>> = self.compiled.drain().map(|(_, compiled)| compiled).collect();

    for base in self.registry.bases().iter().filter(|base| base.loaded) {
      let fname = base.fname();
      match cook_base(
        &mut self.backend,
        &self.registry,
        base,
        &self.textures,
        &self.texture_handles,
      ) {
        Ok(compiled) => {
          if let Some(displaced) = self.compiled.insert(fname.clone(), compiled) {
            tracing::warn!("{fname}: another base with the same filename was replaced");
            self.backend.retire_material(displaced);
          }
          report.cooked += 1;
        }
        Err(e) => {
          tracing::error!("Could not cook {fname}: {e}");
          report.failed += 1;
        }
      }
    }

    for compiled in previous {
      self.backend.retire_material(compiled);
    }

    tracing::info!(
      "Cooked {} material bases ({} failed, {} textures)",
      report.cooked,
      report.failed,
      report.textures
    );
    report
  }

  /// Cooked objects for a base filename, e.g. `wood.humba`.
  pub fn material(&self, base_fname: &str) -> Option<&Compiled<B>> {
    self.compiled.get(base_fname)
  }

  pub fn pipeline(&self, base_fname: &str) -> Option<&B::Pipeline> {
    self.material(base_fname).map(|compiled| &compiled.pipeline)
  }

  pub fn descriptor_set(&self, base_fname: &str) -> Option<&B::DescriptorSet> {
    self.material(base_fname).map(|compiled| &compiled.descriptor_set)
  }

  /// Registry index of the base a derived material is written against.
  pub fn base_index_for_derived(&self, derived_name: &str) -> Option<usize> {
    let set = &self.registry.derived()[self.registry.derived_by_name(derived_name)?];
    self.registry.base_by_fname(&set.humba_fname)
  }

  /// Registry index of a derived material, the value a draw call subtracts
  /// `materialIDOffset` from.
  pub fn derived_index(&self, derived_name: &str) -> Option<usize> {
    self.registry.derived_by_name(derived_name)
  }
}

/// Recursively gathers material files below `dir`. Unreadable subfolders
/// are logged and skipped.
fn collect_material_files(dir: &Path, files: &mut Vec<PathBuf>) -> std::io::Result<()> {
  for entry in std::fs::read_dir(dir)? {
    let Ok(entry) = entry else {
      continue;
    };
    let path = entry.path();
    if entry.file_type().is_ok_and(|ty| ty.is_dir()) {
      if let Err(e) = collect_material_files(&path, files) {
        tracing::warn!("Skipping material folder {:?}: {e}", path);
      }
    } else if classify(&path).is_some() {
      files.push(path);
    }
  }
  Ok(())
}

fn cook_base<B: MaterialBackend>(
  backend: &mut B,
  registry: &MaterialRegistry,
  base: &UniqueMaterialBase,
  textures: &TextureList,
  texture_handles: &[B::Texture],
) -> Result<Compiled<B>, CookError> {
  let paths = registry.paths();
  let fname = base.fname();

  let bindings = backend.reflect_fragment_shader(&paths.shader_binary(&base.fragment.fname))?;
  let layout = MaterialLayout::from_bindings(&bindings)?;

  let bound = BoundSets::select(base, registry.derived());
  if bound.is_empty() {
    tracing::warn!("{fname}: no derived materials are bound to it");
  }

  let mut stats = WriteStats::default();
  let buffer = backend.create_parameter_buffer(layout.buffer_size(bound.len()), &mut |bytes: &mut [u8]| {
    stats = write_parameters(bytes, base, &layout, &bound, registry.derived(), textures);
  })?;

  let descriptor_set = backend.build_descriptor_set(&buffer, texture_handles)?;
  let pass = PassKind::for_base(&fname);
  let pipeline = backend.build_pipeline(&PipelineRequest {
    base_fname: &fname,
    vertex_shader: paths.shader_binary(&base.vertex.fname),
    fragment_shader: paths.shader_binary(&base.fragment.fname),
    pass,
    material_set: &descriptor_set,
    material_set_index: layout.set,
  })?;

  tracing::debug!(
    "{fname}: {:?} pipeline, {} derived sets, {} fields written, {} skipped",
    pass,
    bound.len(),
    stats.written,
    stats.skipped
  );

  Ok(Compiled {
    pipeline,
    descriptor_set,
    buffer,
    layout,
    bound,
    pass,
  })
}
