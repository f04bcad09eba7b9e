use crate::graph::ActionGraph;

/// Resolves a path-fragment leaf to a workspace-relative string by walking
/// `parent_id` links, root-most ancestor first. A missing id yields `""`.
pub fn resolve_path(graph: &ActionGraph, leaf_id: u32) -> String {
    let mut labels = Vec::new();
    let mut current = Some(leaf_id);

    while let Some(id) = current {
        match graph.fragments.get(&id) {
            Some(fragment) => {
                labels.push(fragment.label.as_str());
                current = fragment.parent_id;
            }
            None => return String::new(),
        }
    }

    labels.reverse();
    labels.join("/")
}

/// Resolves an artifact id to its reconstructed path.
pub fn resolve_artifact_path(graph: &ActionGraph, artifact_id: u32) -> Option<String> {
    let artifact = graph.artifacts.get(&artifact_id)?;
    Some(resolve_path(graph, artifact.path_fragment_id))
}

/// Depth-first transitive closure of artifact ids under a dep-set: the
/// direct artifacts concatenated with the closures of each transitive
/// dep-set. The graph is assumed acyclic; duplicate ids are preserved.
pub fn closure(graph: &ActionGraph, dep_set_id: u32) -> Vec<u32> {
    let mut out = Vec::new();
    collect_closure(graph, dep_set_id, &mut out);
    out
}

fn collect_closure(graph: &ActionGraph, dep_set_id: u32, out: &mut Vec<u32>) {
    let Some(dep_set) = graph.dep_sets.get(&dep_set_id) else {
        return;
    };
    out.extend(dep_set.direct_artifact_ids.iter().copied());
    for transitive_id in &dep_set.transitive_dep_set_ids {
        collect_closure(graph, *transitive_id, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Artifact, DepSetOfFiles, PathFragment};
    use std::collections::HashMap;

    fn graph_with(
        fragments: Vec<PathFragment>,
        artifacts: Vec<Artifact>,
        dep_sets: Vec<DepSetOfFiles>,
    ) -> ActionGraph {
        let mut g = ActionGraph::default();
        g.fragments = fragments.into_iter().map(|f| (f.id, f)).collect();
        g.artifacts = artifacts.into_iter().map(|a| (a.id, a)).collect();
        g.dep_sets = dep_sets.into_iter().map(|d| (d.id, d)).collect();
        let _: &HashMap<u32, _> = &g.fragments; // keep type annotation honest
        g
    }

    #[test]
    fn resolve_path_joins_parent_chain() {
        let g = graph_with(
            vec![
                PathFragment {
                    id: 1,
                    label: "app".into(),
                    parent_id: None,
                },
                PathFragment {
                    id: 2,
                    label: "Foo.swift".into(),
                    parent_id: Some(1),
                },
            ],
            vec![],
            vec![],
        );
        assert_eq!(resolve_path(&g, 2), "app/Foo.swift");
    }

    #[test]
    fn resolve_path_missing_id_is_empty() {
        let g = ActionGraph::default();
        assert_eq!(resolve_path(&g, 42), "");
    }

    #[test]
    fn closure_unions_direct_and_transitive() {
        let g = graph_with(
            vec![],
            vec![],
            vec![
                DepSetOfFiles {
                    id: 1,
                    direct_artifact_ids: vec![10, 11],
                    transitive_dep_set_ids: vec![2],
                },
                DepSetOfFiles {
                    id: 2,
                    direct_artifact_ids: vec![12],
                    transitive_dep_set_ids: vec![],
                },
            ],
        );
        let mut ids = closure(&g, 1);
        ids.sort();
        assert_eq!(ids, vec![10, 11, 12]);
    }

    #[test]
    fn closure_preserves_duplicates() {
        let g = graph_with(
            vec![],
            vec![],
            vec![
                DepSetOfFiles {
                    id: 1,
                    direct_artifact_ids: vec![10],
                    transitive_dep_set_ids: vec![2],
                },
                DepSetOfFiles {
                    id: 2,
                    direct_artifact_ids: vec![10],
                    transitive_dep_set_ids: vec![],
                },
            ],
        );
        assert_eq!(closure(&g, 1), vec![10, 10]);
    }
}
