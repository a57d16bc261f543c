//! Cache of loaded material files keyed by path.
//!
//! Entries are rebuilt from scratch on every load and swapped in whole, so a
//! reader never sees a half-parsed entry. A failed load swaps in a blank
//! entry; entries are never removed.
//!
//! Staleness compares modification times against the moment an entry was
//! loaded. A base also depends on its two shader sources and their compiled
//! `.spv` binaries, a derived set on every cooked texture it names.

use std::{
  path::{Path, PathBuf},
  time::SystemTime,
};

use crate::{
  config::ResourcePaths,
  error::FormatError,
  material::{
    base::UniqueMaterialBase,
    derived::DerivedMaterialParamSet,
    format::{parse_derived_material, parse_material_base},
  },
};

pub struct MaterialRegistry {
  paths:   ResourcePaths,
  bases:   Vec<UniqueMaterialBase>,
  derived: Vec<DerivedMaterialParamSet>,
}

impl MaterialRegistry {
  pub fn new(paths: ResourcePaths) -> Self {
    Self {
      paths,
      bases: Vec::new(),
      derived: Vec::new(),
    }
  }

  pub fn paths(&self) -> &ResourcePaths {
    &self.paths
  }

  pub fn bases(&self) -> &[UniqueMaterialBase] {
    &self.bases
  }

  /// Derived sets, ordered so that sets bound to the same base are contiguous.
  pub fn derived(&self) -> &[DerivedMaterialParamSet] {
    &self.derived
  }

  pub fn derived_mut(&mut self) -> &mut [DerivedMaterialParamSet] {
    &mut self.derived
  }

  pub fn base_index(&self, path: &Path) -> Option<usize> {
    self.bases.iter().position(|base| base.path == path)
  }

  pub fn derived_index(&self, path: &Path) -> Option<usize> {
    self.derived.iter().position(|set| set.path == path)
  }

  /// Finds a loaded base by its filename, e.g. `wood.humba`.
  pub fn base_by_fname(&self, fname: &str) -> Option<usize> {
    self
      .bases
      .iter()
      .position(|base| base.loaded && base.fname() == fname)
  }

  /// Finds a loaded derived set by material name (file stem) or filename.
  pub fn derived_by_name(&self, name: &str) -> Option<usize> {
    self.derived.iter().position(|set| {
      set.loaded
        && (set.name() == name
          || set
            .path
            .file_name()
            .is_some_and(|fname| fname.to_string_lossy() == name))
    })
  }

  pub fn load_material_base(&mut self, path: &Path) -> Result<(), FormatError> {
    let loaded_at = SystemTime::now();
    let result = read_source(path).and_then(|source| parse_material_base(path, &source));

    let (entry, result) = match result {
      Ok(mut base) => {
        base.loaded_at = Some(loaded_at);
        tracing::info!(
          "Loaded material base {:?} ({} vertex, {} fragment params)",
          path,
          base.vertex.material_params.len(),
          base.fragment.material_params.len()
        );
        (base, Ok(()))
      }
      Err(e) => {
        let mut blank = UniqueMaterialBase::blank(path);
        blank.loaded_at = Some(loaded_at);
        (blank, Err(e))
      }
    };

    match self.base_index(path) {
      Some(index) => self.bases[index] = entry,
      None => self.bases.push(entry),
    }
    result
  }

  pub fn load_derived_material_param(&mut self, path: &Path) -> Result<(), FormatError> {
    let loaded_at = SystemTime::now();
    let result = read_source(path).and_then(|source| parse_derived_material(path, &source));

    let (entry, result) = match result {
      Ok(mut set) => {
        set.loaded_at = Some(loaded_at);
        tracing::info!(
          "Loaded derived material {:?} -> {} ({} params)",
          path,
          set.humba_fname,
          set.params.len()
        );
        (set, Ok(()))
      }
      Err(e) => {
        let mut blank = DerivedMaterialParamSet::blank(path);
        blank.loaded_at = Some(loaded_at);
        (blank, Err(e))
      }
    };

    match self.derived_index(path) {
      Some(index) => self.derived[index] = entry,
      None => self.derived.push(entry),
    }

    // Stable: sets bound to the same base keep their insertion order.
    self
      .derived
      .sort_by(|a, b| a.humba_fname.cmp(&b.humba_fname));
    result
  }

  pub fn material_base_reload_needed(&self, path: &Path) -> bool {
    let Some(base) = self.base_index(path).map(|index| &self.bases[index]) else {
      return true;
    };
    is_stale(path, base.loaded_at, &base.dependencies(&self.paths))
  }

  pub fn derived_material_param_reload_needed(&self, path: &Path) -> bool {
    let Some(set) = self.derived_index(path).map(|index| &self.derived[index]) else {
      return true;
    };
    is_stale(path, set.loaded_at, &set.dependencies(&self.paths))
  }

  /// Every path with an entry, bases first.
  pub fn known_paths(&self) -> Vec<PathBuf> {
    self
      .bases
      .iter()
      .map(|base| base.path.clone())
      .chain(self.derived.iter().map(|set| set.path.clone()))
      .collect()
  }
}

fn read_source(path: &Path) -> Result<String, FormatError> {
  std::fs::read_to_string(path).map_err(|source| FormatError::Io {
    path: path.to_path_buf(),
    source,
  })
}

fn modified_since(path: &Path, since: SystemTime) -> Option<bool> {
  std::fs::metadata(path)
    .and_then(|metadata| metadata.modified())
    .ok()
    .map(|modified| modified > since)
}

fn is_stale(path: &Path, loaded_at: Option<SystemTime>, dependencies: &[PathBuf]) -> bool {
  let Some(loaded_at) = loaded_at else {
    return true;
  };
  // A missing dependency cannot be fixed by reloading, so it does not count.
  modified_since(path, loaded_at).unwrap_or(true)
    || dependencies
      .iter()
      .any(|dependency| modified_since(dependency, loaded_at).unwrap_or(false))
}
