use crate::error::{AppError, AppResult};
use crate::models::ProjectSettings;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// On-disk layout: the whole workspace → settings mapping lives under one
/// fixed key, so the storage file stays a single self-describing document.
#[derive(Debug, Default, Serialize, Deserialize)]
struct PersistedSettings {
    #[serde(rename = "efCoreProjects", default)]
    projects: HashMap<String, ProjectSettings>,
}

/// Per-workspace project settings, mirrored in memory and flushed to disk
/// after every mutation. There is no deletion path; entries are only ever
/// overwritten.
pub struct SettingsStore {
    path: PathBuf,
    settings: RwLock<HashMap<String, ProjectSettings>>,
}

impl SettingsStore {
    /// Load persisted settings. A missing file is a first run, not an error;
    /// an unreadable file is logged and treated the same way.
    pub fn load(path: &Path) -> AppResult<Self> {
        let projects = match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<PersistedSettings>(&contents) {
                Ok(persisted) => persisted.projects,
                Err(e) => {
                    tracing::warn!(
                        "Ignoring unreadable settings file {}: {}",
                        path.display(),
                        e
                    );
                    HashMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(AppError::Io(e)),
        };

        Ok(Self {
            path: path.to_path_buf(),
            settings: RwLock::new(projects),
        })
    }

    /// Settings for a workspace, or `None` when it was never configured.
    /// `None` is the normal not-yet-configured state, not an error.
    pub fn get(&self, workspace_id: &str) -> Option<ProjectSettings> {
        self.settings.read().ok()?.get(workspace_id).cloned()
    }

    /// Overwrite the entry for a workspace and flush to disk immediately.
    pub fn set(
        &self,
        workspace_id: &str,
        startup_project_path: String,
        migration_project_path: String,
    ) -> AppResult<()> {
        let snapshot = {
            let mut settings = self
                .settings
                .write()
                .map_err(|e| AppError::Internal(format!("Settings lock poisoned: {e}")))?;
            settings.insert(
                workspace_id.to_string(),
                ProjectSettings::new(startup_project_path, migration_project_path),
            );
            settings.clone()
        };

        self.persist(snapshot)
    }

    fn persist(&self, projects: HashMap<String, ProjectSettings>) -> AppResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&PersistedSettings { projects })?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}
