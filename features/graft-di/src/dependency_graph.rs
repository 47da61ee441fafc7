use std::collections::{BTreeMap, BTreeSet};

use crate::{
    closure::{BindingGraph, Edge},
    errors::Diagnostic,
    scope::NodeId,
    types::BindingKey,
};

/// A key as resolved at one scope node
type Vertex = (NodeId, BindingKey);

/// Graph of every resolution, edges staying at the node of their source
/// Used to check for dependency cycles before generation
pub struct DependencyGraph {
    map: BTreeMap<Vertex, DependencyGraphEntry>,
}

impl DependencyGraph {
    pub fn new(graph: &BindingGraph) -> Self {
        let map = graph
            .resolved()
            .map(|(node, key, _)| {
                (
                    (node, key.clone()),
                    DependencyGraphEntry {
                        node,
                        key: key.clone(),
                        edges: graph.edges(node, key),
                    },
                )
            })
            .collect();
        Self { map }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Validate the graph
    ///
    /// Returns every cycle made only of eager edges
    pub fn check(&self) -> Vec<Diagnostic> {
        let mut checked = BTreeSet::new();
        let mut errors = Vec::new();
        for entry in self.map.values() {
            let mut dependency_chain = Vec::new();
            check_recurse(
                self,
                &mut checked,
                &mut errors,
                &mut dependency_chain,
                entry,
            );
        }

        return errors;

        fn check_recurse<'g>(
            graph: &'g DependencyGraph,
            checked: &mut BTreeSet<(NodeId, &'g BindingKey)>,
            errors: &mut Vec<Diagnostic>,
            dependency_chain: &mut Vec<&'g BindingKey>,
            entry: &'g DependencyGraphEntry,
        ) {
            // Cycle check
            if let Some(start) = dependency_chain.iter().position(|key| *key == &entry.key) {
                let mut chain: Vec<BindingKey> = dependency_chain[start..]
                    .iter()
                    .map(|key| (*key).clone())
                    .collect();
                chain.push(entry.key.clone()); // Close the loop

                let cycle = Diagnostic::DependencyCycle {
                    from: chain[0].clone(),
                    to: dependency_chain[dependency_chain.len() - 1].clone(),
                    chain,
                };
                // Ancestors resolving the same keys report the same cycle
                if !errors.contains(&cycle) {
                    errors.push(cycle);
                }
                return;
            }

            // Skip if already checked
            if !checked.insert((entry.node, &entry.key)) {
                return;
            }

            dependency_chain.push(&entry.key);

            for Edge { key, deferred } in &entry.edges {
                if *deferred {
                    // Breaks the cycle, the target is checked by itself
                    continue;
                }
                // Unresolved keys are reported by the closure
                let Some(next_entry) = graph.map.get(&(entry.node, key.clone())) else {
                    continue;
                };
                check_recurse(graph, checked, errors, dependency_chain, next_entry);
            }

            dependency_chain.pop();
        }
    }
}

struct DependencyGraphEntry {
    node: NodeId,
    key: BindingKey,
    edges: Vec<Edge>,
}

#[cfg(test)]
mod tests {
    use graft_config::GraftConfig;

    use super::*;
    use crate::{
        catalog::{input::CatalogInput, BindingCatalog},
        closure::ClosureMode,
        errors::Diagnostics,
        scope::{ScopeAliases, ScopeTree},
    };

    fn check(json: &str) -> Vec<Diagnostic> {
        let input = CatalogInput::from_json(json).unwrap();
        let mut diagnostics = Diagnostics::new();
        let config = GraftConfig::default();
        let catalog = BindingCatalog::build(&input, &config, &mut diagnostics);
        let aliases = ScopeAliases::build(&catalog, &config.scopes);
        let tree = ScopeTree::build(&catalog, &aliases, &mut diagnostics);
        let graph = BindingGraph::close(&catalog, &tree, ClosureMode::Full, &mut diagnostics);
        assert!(!diagnostics.has_errors(), "{:?}", diagnostics.errors());
        DependencyGraph::new(&graph).check()
    }

    #[test]
    fn reports_eager_cycles() {
        let errors = check(
            r#"{
            "classes": [
                {"name": "a.Foo", "boundary": "a", "constructor": {"params": [{"name": "bar", "type": "a.Bar"}]}},
                {"name": "a.Bar", "boundary": "a", "constructor": {"params": [{"name": "foo", "type": "a.Foo"}]}}
            ],
            "scope_graphs": [{"name": "g.App", "boundary": "g", "provisions": [{"name": "foo", "type": "a.Foo"}]}]
        }"#,
        );
        assert_eq!(errors.len(), 1);
        let Diagnostic::DependencyCycle { from, chain, .. } = &errors[0] else {
            panic!("expected a cycle, got {errors:?}");
        };
        assert_eq!(chain.len(), 3);
        assert_eq!(chain.first(), chain.last());
        assert_eq!(chain.first(), Some(from));
    }

    #[test]
    fn provider_breaks_the_cycle() {
        let errors = check(
            r#"{
            "classes": [
                {"name": "a.Foo", "boundary": "a", "constructor": {"params": [{"name": "bar", "type": "a.Bar"}]}},
                {"name": "a.Bar", "boundary": "a", "constructor": {"params": [{"name": "foo", "type": "Provider<a.Foo>"}]}}
            ],
            "scope_graphs": [{"name": "g.App", "boundary": "g", "provisions": [{"name": "foo", "type": "a.Foo"}]}]
        }"#,
        );
        assert!(errors.is_empty(), "{errors:?}");
    }
}
