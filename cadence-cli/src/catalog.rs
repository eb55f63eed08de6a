//! File-backed catalog provider: one TOML file per module under
//! ~/.cadence/catalog/, file stem = module id.
//!
//! Every file is validated at load time; a malformed entry aborts the load
//! with an error naming the file, so regeneration never sees a partial
//! catalog.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use cadence_core::{CatalogGroup, ModuleCatalog, validate_groups};
use cadence_engine::CatalogProvider;

#[derive(Debug, Deserialize)]
struct CatalogFile {
    groups: Vec<CatalogGroup>,
}

#[derive(Debug, Clone)]
pub struct FileCatalogProvider {
    dir: PathBuf,
}

impl FileCatalogProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn load_file(&self, path: &Path) -> Result<ModuleCatalog> {
        let module_id = path
            .file_stem()
            .and_then(|s| s.to_str())
            .map(str::to_string)
            .with_context(|| format!("bad catalog file name: {}", path.display()))?;

        let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        let parsed: CatalogFile =
            toml::from_str(&raw).with_context(|| format!("parse {}", path.display()))?;

        validate_groups(&parsed.groups)
            .with_context(|| format!("invalid catalog in {}", path.display()))?;

        Ok(ModuleCatalog {
            module_id,
            groups: parsed.groups,
        })
    }

    fn module_paths(&self) -> Result<Vec<PathBuf>> {
        if !self.dir.exists() {
            return Ok(vec![]);
        }
        let mut paths: Vec<PathBuf> = fs::read_dir(&self.dir)
            .with_context(|| format!("read dir {}", self.dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("toml"))
            .collect();
        paths.sort();
        Ok(paths)
    }
}

impl CatalogProvider for FileCatalogProvider {
    fn load(&self) -> Result<Vec<ModuleCatalog>> {
        let mut modules = Vec::new();
        for path in self.module_paths()? {
            modules.push(self.load_file(&path)?);
        }
        Ok(modules)
    }

    fn load_module(&self, module_id: &str) -> Result<ModuleCatalog> {
        let path = self.dir.join(format!("{module_id}.toml"));
        if !path.exists() {
            bail!("no catalog file for module {module_id} at {}", path.display());
        }
        self.load_file(&path)
    }
}

/// Starter catalog written by `cadence init`.
pub const EXAMPLE_CATALOG: &str = r#"# Cadence catalog module. File stem = module id.

[[groups]]
name = "Fundamentals"

  [[groups.items]]
  name = "Array two-pointer drill"
  importance = 3.0
  task_type = "coding"

  [[groups.items]]
  name = "Hash map patterns"
  importance = 2.0
  task_type = "coding"

[[groups]]
name = "Habits"

  [[groups.items]]
  name = "Walk 30 minutes"
  importance = 2.0

  [[groups.items]]
  name = "Read 20 pages"
  importance = 1.0
"#;

pub fn write_example_catalog(dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    let path = dir.join("daily_practice.toml");
    if !path.exists() {
        fs::write(&path, EXAMPLE_CATALOG).with_context(|| format!("write {}", path.display()))?;
    }
    Ok(path)
}
