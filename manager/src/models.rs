use serde::{Deserialize, Serialize};

/// The pair of project references every dotnet-ef invocation needs. Both
/// fields are always written together; a half-configured pair never exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSettings {
    pub startup_project_path: String,
    pub migration_project_path: String,
}

impl ProjectSettings {
    pub fn new(startup_project_path: String, migration_project_path: String) -> Self {
        Self {
            startup_project_path,
            migration_project_path,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ServerStatus {
    pub status: String,
    pub version: String,
    pub uptime: u64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsResponse {
    pub workspace: Option<String>,
    pub settings: Option<ProjectSettings>,
    pub storage_path: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProjectFilesResponse {
    pub projects: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ActionQueuedResponse {
    pub status: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_settings_serialize_camel_case() {
        let settings = ProjectSettings::new("A/A.csproj".to_string(), "B/B.csproj".to_string());
        let json = serde_json::to_value(&settings).unwrap();
        assert_eq!(json["startupProjectPath"], "A/A.csproj");
        assert_eq!(json["migrationProjectPath"], "B/B.csproj");
    }
}
