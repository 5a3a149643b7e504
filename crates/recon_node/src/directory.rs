//! Hot-reloadable `EntityMap` directory (§3 "loaded from the process configuration layer,
//! never hard-coded"). A plain file read guarded by a `RwLock`, reloaded between batches rather
//! than on every lookup, matching the "reloadable between batches" characterization.

use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use recon_model::{Entity, EntityMap};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("failed to read entity directory file {path}: {source}")]
    ReadFile { path: String, source: std::io::Error },
    #[error("entity directory file {path} is not valid JSON: {source}")]
    ParseFile { path: String, source: serde_json::Error },
}

/// Owns the process's current view of the entity directory. `None` path means an empty,
/// never-reloaded map (fine for a deployment that hasn't wired a directory source yet).
pub struct EntityDirectory {
    path: Option<PathBuf>,
    current: RwLock<Arc<EntityMap>>,
}

impl EntityDirectory {
    pub fn load(path: Option<PathBuf>) -> Result<Self, DirectoryError> {
        let map = match &path {
            Some(p) => read_entities(p)?,
            None => EntityMap::default(),
        };
        Ok(Self { path, current: RwLock::new(Arc::new(map)) })
    }

    pub fn current(&self) -> Arc<EntityMap> {
        self.current.read().expect("entity directory lock poisoned").clone()
    }

    /// Re-read the backing file, if configured, and swap in the new snapshot. A failed reload
    /// keeps serving the previous snapshot rather than blanking the directory out from under an
    /// in-flight batch.
    pub fn reload(&self) {
        let Some(path) = &self.path else { return };
        match read_entities(path) {
            Ok(map) => {
                info!(entities = map.len(), "entity directory reloaded");
                *self.current.write().expect("entity directory lock poisoned") = Arc::new(map);
            }
            Err(e) => {
                warn!(error = %e, "entity directory reload failed, keeping previous snapshot");
            }
        }
    }
}

fn read_entities(path: &PathBuf) -> Result<EntityMap, DirectoryError> {
    let contents = std::fs::read_to_string(path)
        .map_err(|source| DirectoryError::ReadFile { path: path.display().to_string(), source })?;
    let entities: Vec<Entity> = serde_json::from_str(&contents)
        .map_err(|source| DirectoryError::ParseFile { path: path.display().to_string(), source })?;
    Ok(EntityMap::new(entities))
}
