use std::collections::HashMap;

use serde::Deserialize;

use crate::error::{EngineError, EngineResult};

/// One labeled edge in Bazel's path trie (spec §3).
#[derive(Debug, Clone, Deserialize)]
pub struct PathFragment {
    pub id: u32,
    pub label: String,
    #[serde(rename = "parentId")]
    pub parent_id: Option<u32>,
}

/// One file produced or consumed by an action.
#[derive(Debug, Clone, Deserialize)]
pub struct Artifact {
    pub id: u32,
    #[serde(rename = "pathFragmentId")]
    pub path_fragment_id: u32,
}

/// Bazel's deduplicated, union-friendly collection of files.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct DepSetOfFiles {
    pub id: u32,
    #[serde(rename = "directArtifactIds", default)]
    pub direct_artifact_ids: Vec<u32>,
    #[serde(rename = "transitiveDepSetIds", default)]
    pub transitive_dep_set_ids: Vec<u32>,
}

/// One concrete invocation Bazel would perform.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Action {
    #[serde(rename = "targetId")]
    pub target_id: u32,
    #[serde(default)]
    pub arguments: Vec<String>,
    #[serde(rename = "environmentVariables", default)]
    pub environment: Vec<EnvironmentVariable>,
    #[serde(rename = "inputDepSetIds", default)]
    pub input_dep_set_ids: Vec<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnvironmentVariable {
    pub key: String,
    pub value: String,
}

impl Action {
    pub fn env(&self, key: &str) -> Option<&str> {
        self.environment
            .iter()
            .find(|e| e.key == key)
            .map(|e| e.value.as_str())
    }
}

/// A target as reported by the query, in canonical `//pkg:name` form.
#[derive(Debug, Clone, Deserialize)]
pub struct Target {
    pub id: u32,
    pub label: String,
}

/// Raw document shape of `bazel aquery --output=jsonproto`.
#[derive(Debug, Deserialize, Default)]
struct AqueryDocument {
    #[serde(default)]
    artifacts: Vec<Artifact>,
    #[serde(rename = "depSetOfFiles", default)]
    dep_set_of_files: Vec<DepSetOfFiles>,
    #[serde(rename = "pathFragments", default)]
    path_fragments: Vec<PathFragment>,
    #[serde(default)]
    actions: Vec<Action>,
    #[serde(default)]
    targets: Vec<Target>,
}

/// The in-memory action graph for one query execution (spec §4.2).
#[derive(Debug, Default)]
pub struct ActionGraph {
    pub fragments: HashMap<u32, PathFragment>,
    pub artifacts: HashMap<u32, Artifact>,
    pub dep_sets: HashMap<u32, DepSetOfFiles>,
    pub actions: Vec<Action>,
    pub targets: HashMap<u32, Target>,
}

impl ActionGraph {
    /// Parses the action-query JSON document. Fails if `bytes` is empty,
    /// not UTF-8 (spec §7's `BazelError`), or otherwise not decodable,
    /// surfacing the buffer size in the error.
    pub fn parse(bytes: &[u8]) -> EngineResult<ActionGraph> {
        if bytes.is_empty() {
            return Err(EngineError::custom(
                "empty aquery output (0 bytes): bazel produced no action graph",
            ));
        }

        if let Err(e) = std::str::from_utf8(bytes) {
            return Err(EngineError::Bazel(format!(
                "aquery output ({} bytes) is not UTF-8 decodable: {}",
                bytes.len(),
                e
            )));
        }

        let doc: AqueryDocument = serde_json::from_slice(bytes).map_err(|e| {
            EngineError::custom(format!(
                "failed to decode aquery output ({} bytes): {}",
                bytes.len(),
                e
            ))
        })?;

        let fragments = doc.path_fragments.into_iter().map(|f| (f.id, f)).collect();
        let artifacts = doc.artifacts.into_iter().map(|a| (a.id, a)).collect();
        let dep_sets = doc
            .dep_set_of_files
            .into_iter()
            .map(|d| (d.id, d))
            .collect();
        let targets = doc.targets.into_iter().map(|t| (t.id, t)).collect();

        Ok(ActionGraph {
            fragments,
            artifacts,
            dep_sets,
            actions: doc.actions,
            targets,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_buffer() {
        let err = ActionGraph::parse(&[]).unwrap_err();
        assert!(matches!(err, EngineError::Custom(_)));
    }

    #[test]
    fn rejects_undecodable_buffer() {
        let err = ActionGraph::parse(b"not json").unwrap_err();
        assert!(err.to_string().contains('8')); // buffer size surfaced
    }

    #[test]
    fn rejects_non_utf8_buffer_as_bazel_error() {
        let err = ActionGraph::parse(&[0xff, 0xfe, 0xfd]).unwrap_err();
        assert!(matches!(err, EngineError::Bazel(_)));
    }

    #[test]
    fn parses_minimal_document() {
        let json = br#"{
            "artifacts": [{"id": 1, "pathFragmentId": 10}],
            "depSetOfFiles": [{"id": 1, "directArtifactIds": [1], "transitiveDepSetIds": []}],
            "pathFragments": [{"id": 10, "label": "Foo.swift", "parentId": null}],
            "actions": [{"targetId": 1, "arguments": ["swiftc"], "environmentVariables": [], "inputDepSetIds": [1]}],
            "targets": [{"id": 1, "label": "//app:Lib"}]
        }"#;
        let graph = ActionGraph::parse(json).unwrap();
        assert_eq!(graph.targets.get(&1).unwrap().label, "//app:Lib");
        assert_eq!(graph.actions.len(), 1);
    }
}
