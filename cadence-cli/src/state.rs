//! Home-directory layout: ~/.cadence holds config, catalog, and stores.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};

pub fn cadence_home() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("CADENCE_HOME") {
        return Ok(PathBuf::from(dir));
    }
    let home = std::env::var("HOME").context("HOME is not set")?;
    Ok(PathBuf::from(home).join(".cadence"))
}

pub fn ensure_cadence_home() -> Result<PathBuf> {
    let dir = cadence_home()?;
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    Ok(dir)
}

pub fn catalog_dir() -> Result<PathBuf> {
    Ok(ensure_cadence_home()?.join("catalog"))
}

pub fn history_path() -> Result<PathBuf> {
    Ok(ensure_cadence_home()?.join("history.json"))
}

pub fn plans_path() -> Result<PathBuf> {
    Ok(ensure_cadence_home()?.join("plans.json"))
}
