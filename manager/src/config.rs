use config::{Config, ConfigError, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub workspace: Option<WorkspaceConfig>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StorageConfig {
    pub path: PathBuf,
}

/// The workspace the daemon operates against. Absent means no workspace is
/// open and every project-scoped operation fails its precondition.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WorkspaceConfig {
    pub path: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8090,
            },
            storage: StorageConfig {
                path: get_default_storage_path(),
            },
            workspace: None,
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = get_config_path();

        // Create config directory if it doesn't exist
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ConfigError::Message(format!("Failed to create config directory: {e}"))
            })?;
        }

        // Create default config file if it doesn't exist
        if !config_path.exists() {
            let default_config = r#"
[server]
host = "127.0.0.1"
port = 8090

[storage]
path = "~/.local/share/efcore-manager/projects.json"

[workspace]
# path = "~/src/MyApp"
"#;
            std::fs::write(&config_path, default_config).map_err(|e| {
                ConfigError::Message(format!("Failed to write default config: {e}"))
            })?;
        }

        Self::load_from_file(&config_path)
    }

    pub fn load_from_file(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            return Err(ConfigError::Message(format!(
                "Configuration file not found: {}",
                config_path.display()
            )));
        }

        let builder = Config::builder()
            .add_source(File::from(config_path.to_path_buf()))
            .build()?;

        let mut config: AppConfig = builder.try_deserialize()?;

        config.storage.path = expand_tilde(&config.storage.path);
        if let Some(ref mut workspace) = config.workspace {
            if let Some(ref path) = workspace.path {
                workspace.path = Some(expand_tilde(path));
            }
        }

        Ok(config)
    }
}

fn get_config_path() -> PathBuf {
    if let Some(home) = home::home_dir() {
        home.join(".config/efcore-manager/manager.toml")
    } else {
        PathBuf::from("manager.toml")
    }
}

fn get_default_storage_path() -> PathBuf {
    if let Some(home) = home::home_dir() {
        home.join(".local/share/efcore-manager/projects.json")
    } else {
        PathBuf::from("projects.json")
    }
}

fn expand_tilde(path: &Path) -> PathBuf {
    if path.starts_with("~") {
        if let Some(home) = home::home_dir() {
            let path_str = path.to_string_lossy();
            return PathBuf::from(path_str.replacen('~', &home.to_string_lossy(), 1));
        }
    }
    path.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn load_from_file_reads_all_sections() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("manager.toml");
        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(
            file,
            r#"
[server]
host = "0.0.0.0"
port = 9000

[storage]
path = "/tmp/efcore-test/projects.json"

[workspace]
path = "/tmp/efcore-test/workspace"
"#
        )
        .unwrap();

        let config = AppConfig::load_from_file(&config_path).unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 9000);
        assert_eq!(
            config.storage.path,
            PathBuf::from("/tmp/efcore-test/projects.json")
        );
        assert_eq!(
            config.workspace.unwrap().path,
            Some(PathBuf::from("/tmp/efcore-test/workspace"))
        );
    }

    #[test]
    fn missing_workspace_section_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("manager.toml");
        std::fs::write(
            &config_path,
            "[server]\nhost = \"127.0.0.1\"\nport = 8090\n\n[storage]\npath = \"/tmp/p.json\"\n",
        )
        .unwrap();

        let config = AppConfig::load_from_file(&config_path).unwrap();
        assert!(config.workspace.is_none());
    }

    #[test]
    fn load_from_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(AppConfig::load_from_file(&dir.path().join("nope.toml")).is_err());
    }
}
