//! Which generated unit hosts the accessor of a key.

use std::collections::BTreeMap;

use graft_config::GenericFallback;

use crate::{
    binding::SourceKind,
    closure::{BindingGraph, Resolution},
    scope::{NodeId, ScopeAssignment, ScopeTree},
    types::BindingKey,
};

/// Visibility boundary of a generated unit
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum Boundary {
    Package(String),
    /// Scope-wide, hosts collection aggregators
    Global,
}

/// Identity of a generated unit
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct UnitKey {
    pub boundary: Boundary,
    pub node: NodeId,
}

impl UnitKey {
    pub fn package(boundary: impl Into<String>, node: NodeId) -> Self {
        Self {
            boundary: Boundary::Package(boundary.into()),
            node,
        }
    }
}

/// Where an accessor goes
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum Placement {
    Unit(UnitKey),
    /// The top-level unit of the node
    TopLevel(NodeId),
}

impl Placement {
    pub fn node(&self) -> NodeId {
        match self {
            Self::Unit(key) => key.node,
            Self::TopLevel(node) => *node,
        }
    }
}

/// The unit asking for a key
#[derive(Debug, Clone, Copy)]
pub struct Requester<'r> {
    pub boundary: &'r str,
    pub node: NodeId,
}

/// How a key's boundary is decided, independent of who asks
#[derive(Debug, Clone, PartialEq, Eq)]
enum BoundaryRule {
    Declared(Boundary),
    TopLevel,
    Fallback,
}

/// Places keys, memoising every decision
pub struct PlacementPolicy<'g> {
    graph: &'g BindingGraph,
    tree: &'g ScopeTree,
    assignment: &'g ScopeAssignment,
    fallback: GenericFallback,
    rules: BTreeMap<(NodeId, BindingKey), BoundaryRule>,
    fallbacks: BTreeMap<(NodeId, BindingKey, String), Boundary>,
}

impl<'g> PlacementPolicy<'g> {
    pub fn new(
        graph: &'g BindingGraph,
        tree: &'g ScopeTree,
        assignment: &'g ScopeAssignment,
        fallback: GenericFallback,
    ) -> Self {
        Self {
            graph,
            tree,
            assignment,
            fallback,
            rules: BTreeMap::new(),
            fallbacks: BTreeMap::new(),
        }
    }

    pub fn place(&mut self, key: &BindingKey, requester: Requester<'_>) -> Placement {
        let node = self
            .assignment
            .home(requester.node, key)
            .unwrap_or_else(|| self.tree.root_of(requester.node));
        match self.rule(node, key) {
            BoundaryRule::Declared(boundary) => Placement::Unit(UnitKey { boundary, node }),
            BoundaryRule::TopLevel => Placement::TopLevel(node),
            BoundaryRule::Fallback => Placement::Unit(UnitKey {
                boundary: self.fallback_boundary(key, requester, node),
                node,
            }),
        }
    }

    /// Partial collection accessors sit with their contributors, at the collection's node
    pub fn partial(&self, contributor_boundary: &str, collection_node: NodeId) -> UnitKey {
        UnitKey::package(contributor_boundary, collection_node)
    }

    /// Decided on the resolution at the key's own node, which the requester's agrees with
    fn rule(&mut self, node: NodeId, key: &BindingKey) -> BoundaryRule {
        let memo = (node, key.clone());
        if let Some(rule) = self.rules.get(&memo) {
            return rule.clone();
        }
        let graph = self.graph;
        let rule = match graph.resolution(node, key) {
            Some(Resolution::Unique(info)) => match info.source {
                SourceKind::NestedGraphBuilder => BoundaryRule::TopLevel,
                SourceKind::DelegatingInjector => BoundaryRule::Fallback,
                _ => BoundaryRule::Declared(Boundary::Package(info.symbol.boundary.clone())),
            },
            Some(Resolution::Wrapper { inner, .. } | Resolution::Boxed { boxed: inner }) => {
                let inner = inner.clone();
                self.rule(node, &inner)
            }
            Some(Resolution::Collection { .. }) => BoundaryRule::Declared(Boundary::Global),
            Some(Resolution::KeyedView { .. } | Resolution::Optional { .. }) | None => {
                BoundaryRule::Fallback
            }
        };
        self.rules.insert(memo, rule.clone());
        rule
    }

    fn fallback_boundary(&mut self, key: &BindingKey, requester: Requester<'_>, node: NodeId) -> Boundary {
        let memo = (node, key.clone(), requester.boundary.to_string());
        if let Some(boundary) = self.fallbacks.get(&memo) {
            return boundary.clone();
        }
        let boundary = match self.fallback {
            GenericFallback::RequesterBoundary => Boundary::Package(requester.boundary.to_string()),
            GenericFallback::GraphBoundary => Boundary::Package(self.tree.node(node).boundary.clone()),
        };
        self.fallbacks.insert(memo, boundary.clone());
        boundary
    }
}
