use std::path::Path;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::action_processor::BazelTarget;
use crate::logging::Logger;
use crate::process::{self, ProcessOutput};

/// BSP target capabilities (spec §4.9).
#[derive(Debug, Clone)]
pub struct BuildTargetView {
    pub id: String,
    pub display_name: String,
    pub tags: Vec<String>,
    pub language_ids: Vec<String>,
    pub dependencies: Vec<String>,
    pub can_compile: bool,
    pub can_test: bool,
    pub can_run: bool,
    pub can_debug: bool,
}

#[derive(Debug, Clone)]
pub struct SourceItem {
    pub uri: String,
    pub kind_generated: bool,
}

#[derive(Debug, Clone)]
pub struct SourcesItem {
    pub target: String,
    pub sources: Vec<SourceItem>,
    pub data_kind: &'static str,
}

#[derive(Debug, Clone)]
pub struct SourceKitOptionsResult {
    pub compiler_arguments: Vec<String>,
    pub working_directory: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Changed,
    Deleted,
}

/// Single-writer / many-reader cell holding the current target list
/// (spec §9's design note): readers snapshot, the engine's completion
/// callback installs a full replacement.
pub struct TargetRegistry {
    targets: RwLock<Vec<BazelTarget>>,
}

impl TargetRegistry {
    pub fn new() -> Self {
        Self {
            targets: RwLock::new(Vec::new()),
        }
    }

    pub async fn replace(&self, targets: Vec<BazelTarget>) {
        *self.targets.write().await = targets;
    }

    pub async fn snapshot(&self) -> Vec<BazelTarget> {
        self.targets.read().await.clone()
    }

    /// `workspace/buildTargets`.
    pub async fn build_targets(&self) -> Vec<BuildTargetView> {
        self.targets
            .read()
            .await
            .iter()
            .map(|t| BuildTargetView {
                id: t.uri.clone(),
                display_name: t.label.clone(),
                tags: t.tags.clone(),
                language_ids: vec!["swift".to_string()],
                dependencies: t.dependencies.clone(),
                can_compile: true,
                can_test: t.kind.contains("test"),
                can_run: t.kind.contains("binary"),
                can_debug: false,
            })
            .collect()
    }

    /// `buildTarget/sources`.
    pub async fn sources(&self, uris: &[String]) -> Vec<SourcesItem> {
        let targets = self.targets.read().await;
        uris.iter()
            .filter_map(|uri| {
                let target = targets.iter().find(|t| &t.uri == uri)?;
                Some(SourcesItem {
                    target: target.uri.clone(),
                    sources: target
                        .input_files
                        .iter()
                        .map(|file_uri| SourceItem {
                            uri: file_uri.clone(),
                            kind_generated: false,
                        })
                        .collect(),
                    data_kind: "sourceKit",
                })
            })
            .collect()
    }

    /// `textDocument/sourceKitOptions`.
    pub async fn source_kit_options(
        &self,
        uri: &str,
        workspace_root: &str,
        default_settings: &Option<Vec<String>>,
    ) -> SourceKitOptionsResult {
        let targets = self.targets.read().await;
        match targets.iter().find(|t| t.uri == uri) {
            Some(target) => SourceKitOptionsResult {
                compiler_arguments: target.compiler_arguments.clone(),
                working_directory: workspace_root.to_string(),
            },
            None => SourceKitOptionsResult {
                compiler_arguments: default_settings.clone().unwrap_or_default(),
                working_directory: workspace_root.to_string(),
            },
        }
    }

    /// `textDocument/registerForChanges`: scans every target's
    /// `input_files` for a match on `file_uri`.
    pub async fn register_for_changes(
        &self,
        file_uri: &str,
        default_settings: &Option<Vec<String>>,
    ) -> Vec<String> {
        let targets = self.targets.read().await;
        targets
            .iter()
            .find(|t| t.input_files.iter().any(|f| f == file_uri))
            .map(|t| t.compiler_arguments.clone())
            .unwrap_or_else(|| default_settings.clone().unwrap_or_default())
    }

    /// `workspace/didChangeWatchedFiles`: every current target, reported
    /// as changed. Emits nothing (and a warning) if the registry is empty.
    pub async fn did_change_watched_files(&self, logger: &dyn Logger) -> Vec<(String, ChangeKind)> {
        let targets = self.targets.read().await;
        if targets.is_empty() {
            logger.warning("didChangeWatchedFiles: no targets to report as changed");
            return Vec::new();
        }
        targets
            .iter()
            .map(|t| (t.uri.clone(), ChangeKind::Changed))
            .collect()
    }

    /// `buildTarget/prepare`: fires `bazel build` asynchronously and
    /// returns immediately; build output is never surfaced to the caller.
    pub async fn prepare(
        &self,
        targets: &[String],
        aquery_args: &[String],
        workspace_root: &Path,
        logger: Arc<dyn Logger>,
    ) {
        let workspace_root = workspace_root.to_path_buf();
        let mut args: Vec<String> = vec!["build".to_string()];
        args.extend(targets.iter().cloned());
        args.extend(aquery_args.iter().cloned());

        tokio::spawn(async move {
            logger.info(&format!("prepare: bazel build {}", args.join(" ")));
            let output: ProcessOutput =
                process::run("bazel", &workspace_root, &args, &*logger).await;
            if output.exit_code == 0 {
                logger.info("prepare: bazel build completed successfully");
            } else {
                logger.warning(&format!(
                    "prepare: bazel build exited with {}",
                    output.exit_code
                ));
            }
        });
    }
}

impl Default for TargetRegistry {
    fn default() -> Self {
        Self::new()
    }
}
