use std::collections::HashSet;
use std::path::Path;
use std::sync::Mutex;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::graph::ActionGraph;
use crate::logging::Logger;
use crate::path::{closure, resolve_artifact_path};
use crate::rewriter::rewrite_arguments;
use crate::sdk::select_sdk;

const ACCEPTED_EXTENSIONS: [&str; 3] = ["swift", "m", "h"];

/// The core output entity (spec §3). Equality/hashing is by value over
/// every field, which is what the dedup law in §8 relies on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BazelTarget {
    pub id: u32,
    pub uri: String,
    pub label: String,
    pub kind: String,
    pub tags: Vec<String>,
    pub input_files: Vec<String>,
    pub compiler_arguments: Vec<String>,
    pub dependencies: Vec<String>,
}

/// Fans the action list out over the host's available parallelism,
/// joining each action's inputs/SDK/rewritten-arguments into a target
/// record, then folds the collected records through value equality to
/// implement the dedup law.
pub fn process_actions(
    graph: &ActionGraph,
    workspace_root: &str,
    execroot: &str,
    logger: &dyn Logger,
) -> Vec<BazelTarget> {
    let results = Mutex::new(Vec::with_capacity(graph.actions.len()));
    let completed = Mutex::new(0usize);
    let total = graph.actions.len();

    graph.actions.par_iter().for_each(|action| {
        match build_target(graph, action, workspace_root, execroot) {
            Ok(Some(target)) => {
                results.lock().expect("results mutex poisoned").push(target);
            }
            Ok(None) => {
                logger.warning(&format!(
                    "skipping action: no target found for target_id {}",
                    action.target_id
                ));
            }
            Err(message) => {
                logger.warning(&message);
            }
        }

        let mut count = completed.lock().expect("counter mutex poisoned");
        *count += 1;
        if *count % 10 == 0 || *count == total {
            logger.info(&format!("processed {}/{} actions", *count, total));
        }
    });

    let collected = results.into_inner().expect("results mutex poisoned");
    dedup_by_value(collected)
}

fn build_target(
    graph: &ActionGraph,
    action: &crate::graph::Action,
    workspace_root: &str,
    execroot: &str,
) -> Result<Option<BazelTarget>, String> {
    let Some(target) = graph.targets.get(&action.target_id) else {
        return Ok(None);
    };

    let input_files = collect_input_files(graph, action, workspace_root);

    let sdk = select_sdk(action).map_err(|e| e.to_string())?;
    let rewrite = rewrite_arguments(&action.arguments, execroot, &sdk);

    Ok(Some(BazelTarget {
        id: target.id,
        uri: format!("bazel://{}#{}", target.label, target.id),
        label: target.label.clone(),
        kind: "swift_library".to_string(),
        tags: Vec::new(),
        input_files,
        compiler_arguments: rewrite.arguments,
        dependencies: Vec::new(),
    }))
}

fn collect_input_files(
    graph: &ActionGraph,
    action: &crate::graph::Action,
    workspace_root: &str,
) -> Vec<String> {
    action
        .input_dep_set_ids
        .iter()
        .flat_map(|dep_set_id| closure(graph, *dep_set_id))
        .filter_map(|artifact_id| resolve_artifact_path(graph, artifact_id))
        .filter(|relative| has_accepted_extension(relative))
        .filter_map(|relative| {
            let absolute = Path::new(workspace_root).join(&relative);
            if absolute.exists() {
                Some(format!("file://{}", absolute.display()))
            } else {
                None
            }
        })
        .collect()
}

fn has_accepted_extension(path: &str) -> bool {
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|ext| ACCEPTED_EXTENSIONS.contains(&ext))
        .unwrap_or(false)
}

fn dedup_by_value(targets: Vec<BazelTarget>) -> Vec<BazelTarget> {
    let mut seen = HashSet::with_capacity(targets.len());
    let mut out = Vec::with_capacity(targets.len());
    for target in targets {
        if seen.insert(target.clone()) {
            out.push(target);
        }
    }
    out
}

/// Converts a list into the set used for the re-notification diff (§4.8):
/// insensitive to ordering, sensitive to any field difference.
pub fn as_value_set(targets: &[BazelTarget]) -> HashSet<BazelTarget> {
    targets.iter().cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Action, Artifact, DepSetOfFiles, EnvironmentVariable, PathFragment, Target};
    use crate::logging::TracingLogger;
    use std::fs;
    use tempfile_like::TempWorkspace;

    // Minimal ad-hoc temp-dir helper so this module does not need an extra
    // dev-dependency just for a couple of on-disk-existence tests.
    mod tempfile_like {
        use std::path::PathBuf;

        pub struct TempWorkspace {
            pub root: PathBuf,
        }

        impl TempWorkspace {
            pub fn new(name: &str) -> Self {
                let root = std::env::temp_dir().join(format!(
                    "bazel-sourcekit-bsp-test-{}-{}",
                    name,
                    std::process::id()
                ));
                std::fs::create_dir_all(&root).unwrap();
                Self { root }
            }
        }

        impl Drop for TempWorkspace {
            fn drop(&mut self) {
                let _ = std::fs::remove_dir_all(&self.root);
            }
        }
    }

    fn sample_graph(workspace: &TempWorkspace) -> ActionGraph {
        fs::create_dir_all(workspace.root.join("Sources")).unwrap();
        fs::write(workspace.root.join("Sources/Foo.swift"), "").unwrap();

        let mut graph = ActionGraph::default();
        graph.fragments.insert(
            1,
            PathFragment {
                id: 1,
                label: "Sources".into(),
                parent_id: None,
            },
        );
        graph.fragments.insert(
            2,
            PathFragment {
                id: 2,
                label: "Foo.swift".into(),
                parent_id: Some(1),
            },
        );
        graph.artifacts.insert(
            1,
            Artifact {
                id: 1,
                path_fragment_id: 2,
            },
        );
        graph.dep_sets.insert(
            1,
            DepSetOfFiles {
                id: 1,
                direct_artifact_ids: vec![1],
                transitive_dep_set_ids: vec![],
            },
        );
        graph.targets.insert(
            1,
            Target {
                id: 1,
                label: "//app:Lib".into(),
            },
        );
        graph.actions.push(Action {
            target_id: 1,
            arguments: vec!["Sources/Foo.swift".into()],
            environment: vec![EnvironmentVariable {
                key: "APPLE_SDK_PLATFORM".into(),
                value: "MacOSX".into(),
            }],
            input_dep_set_ids: vec![1],
        });
        graph
    }

    #[test]
    fn builds_target_with_existing_input_file() {
        let workspace = TempWorkspace::new("builds-target");
        let graph = sample_graph(&workspace);
        let targets = process_actions(
            &graph,
            &workspace.root.to_string_lossy(),
            "/execroot",
            &TracingLogger,
        );
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].label, "//app:Lib");
        assert_eq!(targets[0].kind, "swift_library");
        assert!(targets[0].dependencies.is_empty());
        assert!(targets[0].tags.is_empty());
        assert_eq!(targets[0].input_files.len(), 1);
        assert!(targets[0].input_files[0].ends_with("Sources/Foo.swift"));
    }

    #[test]
    fn skips_action_with_nonexistent_target() {
        let workspace = TempWorkspace::new("skip-target");
        let mut graph = sample_graph(&workspace);
        graph.actions[0].target_id = 999;
        let targets = process_actions(
            &graph,
            &workspace.root.to_string_lossy(),
            "/execroot",
            &TracingLogger,
        );
        assert!(targets.is_empty());
    }

    #[test]
    fn skips_action_missing_sdk_platform_env() {
        let workspace = TempWorkspace::new("skip-sdk");
        let mut graph = sample_graph(&workspace);
        graph.actions[0].environment.clear();
        let targets = process_actions(
            &graph,
            &workspace.root.to_string_lossy(),
            "/execroot",
            &TracingLogger,
        );
        assert!(targets.is_empty());
    }

    #[test]
    fn excludes_input_files_with_rejected_extensions() {
        let workspace = TempWorkspace::new("reject-ext");
        let mut graph = sample_graph(&workspace);
        fs::write(workspace.root.join("Sources/Foo.txt"), "").unwrap();
        graph.fragments.insert(
            3,
            PathFragment {
                id: 3,
                label: "Foo.txt".into(),
                parent_id: Some(1),
            },
        );
        graph.artifacts.insert(
            2,
            Artifact {
                id: 2,
                path_fragment_id: 3,
            },
        );
        graph.dep_sets.get_mut(&1).unwrap().direct_artifact_ids.push(2);

        let targets = process_actions(
            &graph,
            &workspace.root.to_string_lossy(),
            "/execroot",
            &TracingLogger,
        );
        assert_eq!(targets[0].input_files.len(), 1);
    }

    #[test]
    fn dedup_by_value_removes_byte_identical_records() {
        let a = BazelTarget {
            id: 1,
            uri: "bazel://x#1".into(),
            label: "//x:x".into(),
            kind: "swift_library".into(),
            tags: vec![],
            input_files: vec![],
            compiler_arguments: vec![],
            dependencies: vec![],
        };
        let b = a.clone();
        assert_eq!(dedup_by_value(vec![a, b]).len(), 1);
    }
}
