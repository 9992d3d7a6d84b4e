//! Build order computation by fixed-point relaxation
//!
//! Artifacts without requirements seed the resolved set. Each following scan
//! walks the artifacts in declaration order and resolves every artifact whose
//! requirements are all resolved, until a scan makes no progress. The result
//! is deterministic for a fixed input order.

use crate::artifact::Artifact;
use crate::error::GraphError;
use std::collections::{HashMap, HashSet};

/// Order `artifacts` so every artifact follows all of its requirements
pub fn topological_order(artifacts: &[Artifact]) -> Result<Vec<&Artifact>, GraphError> {
    let known: HashSet<&str> = artifacts.iter().map(Artifact::id).collect();
    for artifact in artifacts {
        if let Some(missing) = artifact
            .requirements()
            .into_iter()
            .find(|id| !known.contains(id))
        {
            return Err(GraphError::UnknownDependencyId {
                id: missing.to_string(),
                required_by: artifact.id().to_string(),
            });
        }
    }

    let mut resolved: HashSet<&str> = HashSet::new();
    let mut order: Vec<&Artifact> = Vec::with_capacity(artifacts.len());

    for artifact in artifacts {
        if artifact.requirements().is_empty() && resolved.insert(artifact.id()) {
            order.push(artifact);
        }
    }

    if order.is_empty() {
        return match artifacts.first() {
            None => Ok(order),
            Some(first) if is_single_cycle(artifacts) => {
                Err(GraphError::UnsatisfiedDependency(first.id().to_string()))
            }
            Some(_) => Err(GraphError::NoRoot),
        };
    }

    loop {
        let mut progressed = false;
        for artifact in artifacts {
            if resolved.contains(artifact.id()) {
                continue;
            }
            if artifact
                .requirements()
                .iter()
                .all(|id| resolved.contains(id))
            {
                resolved.insert(artifact.id());
                order.push(artifact);
                progressed = true;
            }
        }
        if !progressed {
            break;
        }
    }

    match artifacts
        .iter()
        .find(|artifact| !resolved.contains(artifact.id()))
    {
        Some(stuck) => Err(GraphError::UnsatisfiedDependency(stuck.id().to_string())),
        None => Ok(order),
    }
}

/// Whether every artifact reaches every other one through requirements
fn is_single_cycle(artifacts: &[Artifact]) -> bool {
    let mut forward: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut backward: HashMap<&str, Vec<&str>> = HashMap::new();
    for artifact in artifacts {
        for requirement in artifact.requirements() {
            forward.entry(artifact.id()).or_default().push(requirement);
            backward.entry(requirement).or_default().push(artifact.id());
        }
    }

    let Some(start) = artifacts.first().map(Artifact::id) else {
        return false;
    };
    let total: HashSet<&str> = artifacts.iter().map(Artifact::id).collect();
    reachable(start, &forward) == total && reachable(start, &backward) == total
}

fn reachable<'a>(start: &'a str, edges: &HashMap<&'a str, Vec<&'a str>>) -> HashSet<&'a str> {
    let mut seen = HashSet::from([start]);
    let mut stack = vec![start];
    while let Some(node) = stack.pop() {
        for &next in edges.get(node).into_iter().flatten() {
            if seen.insert(next) {
                stack.push(next);
            }
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn single(id: &str, deps: &[&str]) -> Artifact {
        Artifact::single_archive(id, "", format!("{}.jar", id)).with_dependencies(deps.iter().copied())
    }

    fn ids<'a>(order: &[&'a Artifact]) -> Vec<&'a str> {
        order.iter().map(|artifact| artifact.id()).collect()
    }

    #[test]
    fn test_lib_before_app() {
        let artifacts = vec![
            Artifact::composite_archive("app", "", "app.jar").with_dependencies(["lib"]),
            single("lib", &[]),
        ];
        let order = topological_order(&artifacts).unwrap();
        assert_eq!(ids(&order), vec!["lib", "app"]);
    }

    #[test]
    fn test_empty_set() {
        assert!(topological_order(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_diamond_keeps_declaration_order() {
        let artifacts = vec![
            single("top", &["left", "right"]),
            single("right", &["base"]),
            single("left", &["base"]),
            single("base", &[]),
        ];
        let order = topological_order(&artifacts).unwrap();
        assert_eq!(ids(&order), vec!["base", "right", "left", "top"]);
    }

    #[test]
    fn test_inner_artifacts_are_requirements() {
        let artifacts = vec![
            Artifact::composite_archive("app", "", "app.jar").with_inner(["classes"]),
            Artifact::directory("classes", "classes"),
        ];
        let order = topological_order(&artifacts).unwrap();
        assert_eq!(ids(&order), vec!["classes", "app"]);
    }

    #[test]
    fn test_two_artifact_cycle_is_unsatisfied() {
        let artifacts = vec![single("X", &["Y"]), single("Y", &["X"])];
        assert_eq!(
            topological_order(&artifacts).unwrap_err(),
            GraphError::UnsatisfiedDependency("X".to_string())
        );
    }

    #[test]
    fn test_no_root_without_single_cycle() {
        let artifacts = vec![single("a", &["b"]), single("b", &["a"]), single("c", &["a"])];
        assert_eq!(topological_order(&artifacts).unwrap_err(), GraphError::NoRoot);
    }

    #[test]
    fn test_cycle_behind_a_root_is_unsatisfied() {
        let artifacts = vec![
            single("root", &[]),
            single("p", &["root", "q"]),
            single("q", &["p"]),
        ];
        assert_eq!(
            topological_order(&artifacts).unwrap_err(),
            GraphError::UnsatisfiedDependency("p".to_string())
        );
    }

    #[test]
    fn test_unknown_dependency() {
        let artifacts = vec![single("app", &["ghost"])];
        assert_eq!(
            topological_order(&artifacts).unwrap_err(),
            GraphError::UnknownDependencyId {
                id: "ghost".to_string(),
                required_by: "app".to_string(),
            }
        );
    }

    /// Random DAG: artifact `i` may only depend on artifacts with smaller index
    fn dag() -> impl Strategy<Value = Vec<Artifact>> {
        (1usize..12)
            .prop_flat_map(|n| {
                let edges = (0..n)
                    .map(|i| proptest::collection::vec(any::<bool>(), i))
                    .collect::<Vec<_>>();
                let shuffle = Just((0..n).collect::<Vec<usize>>()).prop_shuffle();
                (Just(n), edges, shuffle)
            })
            .prop_map(|(n, edges, shuffle)| {
                let artifacts: Vec<Artifact> = (0..n)
                    .map(|i| {
                        let deps: Vec<String> = edges[i]
                            .iter()
                            .enumerate()
                            .filter(|(_, edge)| **edge)
                            .map(|(j, _)| format!("a{}", j))
                            .collect();
                        Artifact::single_archive(format!("a{}", i), "", format!("a{}.jar", i))
                            .with_dependencies(deps)
                    })
                    .collect();
                shuffle.into_iter().map(|i| artifacts[i].clone()).collect()
            })
    }

    proptest! {
        #[test]
        fn prop_every_artifact_follows_its_dependencies(artifacts in dag()) {
            let order = topological_order(&artifacts).unwrap();
            prop_assert_eq!(order.len(), artifacts.len());

            let position: HashMap<&str, usize> = order
                .iter()
                .enumerate()
                .map(|(i, artifact)| (artifact.id(), i))
                .collect();
            for artifact in &artifacts {
                for dep in artifact.dependencies() {
                    prop_assert!(position[dep.as_str()] < position[artifact.id()]);
                }
            }
        }
    }
}
