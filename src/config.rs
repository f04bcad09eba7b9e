use std::path::Path;

use serde::Deserialize;

use crate::error::{EngineError, EngineResult};

/// `buildServer.json`, loaded once at the workspace root (spec §6).
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub name: String,
    pub argv: Vec<String>,
    pub version: String,
    #[serde(rename = "bspVersion")]
    pub bsp_version: String,
    pub languages: Vec<String>,
    pub targets: Vec<String>,
    #[serde(rename = "indexDatabasePath")]
    pub index_database_path: String,
    #[serde(rename = "aqueryArgs", default)]
    pub aquery_args: Vec<String>,
    #[serde(rename = "defaultSettings")]
    pub default_settings: Option<Vec<String>>,
}

impl ServerConfig {
    pub fn load(workspace_root: &Path) -> EngineResult<ServerConfig> {
        let path = workspace_root.join("buildServer.json");
        let bytes = std::fs::read(&path).map_err(|e| {
            EngineError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        serde_json::from_slice(&bytes)
            .map_err(|e| EngineError::Config(format!("malformed buildServer.json: {}", e)))
    }

    /// `<execroot>/bazel-out/_global_index_store`, per spec §6.
    pub fn index_store_path(execroot: &str) -> String {
        format!("{}/bazel-out/_global_index_store", execroot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn loads_valid_config() {
        let dir = std::env::temp_dir().join(format!(
            "bazel-sourcekit-bsp-config-test-{}",
            std::process::id()
        ));
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("buildServer.json"),
            r#"{
                "name": "bazel-sourcekit-bsp",
                "argv": ["bazel-sourcekit-bsp"],
                "version": "1.0",
                "bspVersion": "2.0.0",
                "languages": ["swift"],
                "targets": ["//app:Lib"],
                "indexDatabasePath": "/tmp/index-db",
                "aqueryArgs": ["--noshow_progress"]
            }"#,
        )
        .unwrap();

        let config = ServerConfig::load(&dir).unwrap();
        assert_eq!(config.bsp_version, "2.0.0");
        assert_eq!(config.targets, vec!["//app:Lib".to_string()]);
        assert!(config.default_settings.is_none());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_file_is_config_error() {
        let dir = std::env::temp_dir().join(format!(
            "bazel-sourcekit-bsp-config-missing-{}",
            std::process::id()
        ));
        let err = ServerConfig::load(&dir).unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn index_store_path_is_execroot_join() {
        assert_eq!(
            ServerConfig::index_store_path("/e"),
            "/e/bazel-out/_global_index_store"
        );
    }
}
