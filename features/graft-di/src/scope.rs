//! Scope alias condensation, the scope tree and the node every key lives at.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use graft_config::ScopeConfig;

use crate::{
    binding::{DependencyInfo, SourceKind},
    catalog::BindingCatalog,
    closure::{BindingGraph, Resolution},
    errors::{Diagnostic, Diagnostics},
    types::BindingKey,
};

/// Equivalence classes of scope markers
///
/// Every class is represented by its shortest marker, ties broken lexicographically. The
/// non-caching marker never joins a class.
#[derive(Debug, Clone, Default)]
pub struct ScopeAliases {
    parents: BTreeMap<String, String>,
    non_caching: String,
}

impl ScopeAliases {
    pub fn new(config: &ScopeConfig) -> Self {
        Self {
            parents: BTreeMap::new(),
            non_caching: config.non_caching_scope.clone(),
        }
    }

    pub fn build(catalog: &BindingCatalog, config: &ScopeConfig) -> Self {
        let mut aliases = Self::new(config);
        for marker in catalog.scope_markers() {
            aliases.add(marker);
        }
        for graph in catalog.graphs() {
            aliases.union_all(&graph.scopes);
        }
        for class in catalog.scope_aliases() {
            aliases.union_all(class);
        }
        aliases
    }

    pub fn add(&mut self, marker: &str) {
        if marker != self.non_caching && !self.parents.contains_key(marker) {
            self.parents.insert(marker.to_string(), marker.to_string());
        }
    }

    pub fn union_all(&mut self, markers: &[String]) {
        let markers: Vec<String> = markers
            .iter()
            .filter(|marker| **marker != self.non_caching)
            .cloned()
            .collect();
        let Some((first, rest)) = markers.split_first() else {
            return;
        };
        self.add(first);
        for marker in rest {
            self.add(marker);
            self.union(first, marker);
        }
    }

    fn find(&self, marker: &str) -> Option<String> {
        let mut current = self.parents.get(marker)?;
        while let Some(parent) = self.parents.get(current) {
            if parent == current {
                break;
            }
            current = parent;
        }
        Some(current.clone())
    }

    fn union(&mut self, a: &str, b: &str) {
        let (Some(a), Some(b)) = (self.find(a), self.find(b)) else {
            return;
        };
        if a == b {
            return;
        }
        let (winner, loser) = if (a.len(), &a) <= (b.len(), &b) {
            (a, b)
        } else {
            (b, a)
        };
        self.parents.insert(loser, winner);
    }

    /// Canonical marker, `None` for the non-caching marker and unknown markers
    pub fn canonical(&self, marker: &str) -> Option<String> {
        if marker == self.non_caching {
            return None;
        }
        self.find(marker)
    }

    /// Canonical scope of a binding, `None` if it does not cache
    pub fn scope_of(&self, info: &DependencyInfo) -> Option<String> {
        info.scope.as_deref().and_then(|scope| self.canonical(scope))
    }
}

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// One scope graph in the tree
#[derive(Debug, Clone)]
pub struct ScopeNode {
    pub id: NodeId,
    /// Canonical scope
    pub scope: String,
    pub graph: String,
    pub boundary: String,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub depth: usize,
}

/// Scope nodes, parents before their children
#[derive(Debug, Clone, Default)]
pub struct ScopeTree {
    nodes: Vec<ScopeNode>,
    by_graph: BTreeMap<String, NodeId>,
    by_scope: BTreeMap<String, NodeId>,
}

impl ScopeTree {
    /// One node per scope graph
    ///
    /// A graph's parent is the graph declaring it as nested, else the graph owning the parent
    /// scope in the scope tree. Graphs without either are roots.
    pub fn build(catalog: &BindingCatalog, aliases: &ScopeAliases, diagnostics: &mut Diagnostics) -> Self {
        let mut scope_owner: BTreeMap<String, String> = BTreeMap::new();
        let mut graph_scope: BTreeMap<String, String> = BTreeMap::new();
        for graph in catalog.graphs() {
            let scope = graph
                .scope_markers()
                .iter()
                .find_map(|marker| aliases.canonical(marker))
                .unwrap_or_else(|| graph.name.clone());
            if let Some(other) = scope_owner.insert(scope.clone(), graph.name.clone()) {
                diagnostics.error(Diagnostic::InvalidCatalog(format!(
                    "scope graphs '{other}' and '{}' share scope '{scope}'",
                    graph.name
                )));
            }
            graph_scope.insert(graph.name.clone(), scope);
        }

        let tree = catalog.scope_tree();
        let mut parent_of: BTreeMap<String, String> = BTreeMap::new();
        for graph in catalog.graphs() {
            let from_tree = graph_scope
                .get(&graph.name)
                .and_then(|scope| {
                    tree.parents
                        .iter()
                        .find(|(child, _)| aliases.canonical(child).as_ref() == Some(scope))
                })
                .map(|(_, parent)| aliases.canonical(parent).unwrap_or_else(|| parent.clone()));
            let from_tree = match from_tree {
                Some(parent_scope) => match scope_owner.get(&parent_scope) {
                    Some(owner) => Some(owner.clone()),
                    None => {
                        diagnostics.error(Diagnostic::InvalidCatalog(format!(
                            "parent scope '{parent_scope}' of scope graph '{}' belongs to no scope graph",
                            graph.name
                        )));
                        None
                    }
                },
                None => None,
            };
            let nested = catalog.parent_graph(&graph.name).map(str::to_string);

            let parent = match (nested, from_tree) {
                (Some(nested), Some(declared)) if nested != declared => {
                    diagnostics.error(Diagnostic::InvalidCatalog(format!(
                        "scope graph '{}' is nested in '{nested}' but its scope's parent belongs to '{declared}'",
                        graph.name
                    )));
                    Some(nested)
                }
                (nested, declared) => nested.or(declared),
            };
            if let Some(parent) = parent {
                parent_of.insert(graph.name.clone(), parent);
            }
        }

        let mut children: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        let mut roots = Vec::new();
        for graph in catalog.graphs() {
            match parent_of.get(&graph.name) {
                Some(parent) => children.entry(parent.as_str()).or_default().push(&graph.name),
                None => roots.push(graph.name.as_str()),
            }
        }

        let mut result = ScopeTree::default();
        let mut queue: VecDeque<(&str, Option<NodeId>)> =
            roots.into_iter().map(|root| (root, None)).collect();
        while let Some((name, parent)) = queue.pop_front() {
            let Some(graph) = catalog.graph(name) else {
                continue;
            };
            let id = NodeId(result.nodes.len());
            let depth = parent.map_or(0, |parent| result.nodes[parent.0].depth + 1);
            let scope = graph_scope.get(name).cloned().unwrap_or_else(|| name.to_string());
            result.nodes.push(ScopeNode {
                id,
                scope: scope.clone(),
                graph: name.to_string(),
                boundary: graph.boundary.clone(),
                parent,
                children: Vec::new(),
                depth,
            });
            if let Some(parent) = parent {
                result.nodes[parent.0].children.push(id);
            }
            result.by_graph.insert(name.to_string(), id);
            result.by_scope.entry(scope).or_insert(id);

            // BTreeMap values were pushed in graph-name order already
            for child in children.get(name).into_iter().flatten() {
                queue.push_back((*child, Some(id)));
            }
        }

        for graph in catalog.graphs() {
            if !result.by_graph.contains_key(&graph.name) {
                diagnostics.error(Diagnostic::InvalidCatalog(format!(
                    "scope graph '{}' is its own ancestor",
                    graph.name
                )));
            }
        }

        tracing::debug!("Scope tree has {} node(s)", result.nodes.len());
        result
    }

    pub fn nodes(&self) -> &[ScopeNode] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> &ScopeNode {
        &self.nodes[id.0]
    }

    pub fn node_of_graph(&self, graph: &str) -> Option<NodeId> {
        self.by_graph.get(graph).copied()
    }

    pub fn node_of_scope(&self, scope: &str) -> Option<NodeId> {
        self.by_scope.get(scope).copied()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn depth(&self, id: NodeId) -> usize {
        self.nodes[id.0].depth
    }

    pub fn root_of(&self, mut id: NodeId) -> NodeId {
        while let Some(parent) = self.parent(id) {
            id = parent;
        }
        id
    }

    pub fn is_ancestor_or_self(&self, ancestor: NodeId, mut node: NodeId) -> bool {
        loop {
            if node == ancestor {
                return true;
            }
            match self.parent(node) {
                Some(parent) => node = parent,
                None => return false,
            }
        }
    }

    /// The deeper of two nodes on one branch, `None` for unrelated nodes
    pub fn deeper(&self, a: NodeId, b: NodeId) -> Option<NodeId> {
        if self.is_ancestor_or_self(a, b) {
            Some(b)
        } else if self.is_ancestor_or_self(b, a) {
            Some(a)
        } else {
            None
        }
    }
}

/// A collection contribution: collection key, declaring group and member
type ContributionId = (BindingKey, String, Option<String>);

/// The node every resolution is generated at, per requesting node
///
/// A key requested from a node lives at the shallowest node on the requester's path that still
/// resolves it the same way: the node of its owning graph, its scope's node, or the deepest of
/// its supplying group's nearest node and its dependencies' homes.
#[derive(Debug, Clone, Default)]
pub struct ScopeAssignment {
    homes: BTreeMap<(NodeId, BindingKey), NodeId>,
    cached: BTreeMap<(NodeId, BindingKey), String>,
    contributions: BTreeMap<(NodeId, ContributionId), NodeId>,
    cached_contributions: BTreeSet<ContributionId>,
}

impl ScopeAssignment {
    pub fn assign(
        catalog: &BindingCatalog,
        graph: &BindingGraph,
        tree: &ScopeTree,
        aliases: &ScopeAliases,
        diagnostics: &mut Diagnostics,
    ) -> Self {
        let mut assigner = Assigner {
            catalog,
            graph,
            tree,
            aliases,
            diagnostics,
            assignment: ScopeAssignment::default(),
            in_progress: BTreeSet::new(),
        };
        let resolved: Vec<(NodeId, BindingKey)> = graph
            .resolved()
            .map(|(node, key, _)| (node, key.clone()))
            .collect();
        for (node, key) in &resolved {
            assigner.home(*node, key);
        }
        tracing::debug!("Assigned {} resolution(s) to scope nodes", resolved.len());
        assigner.assignment
    }

    /// Node a key requested from `node` is generated at, `None` if it is not resolved there
    pub fn home(&self, node: NodeId, key: &BindingKey) -> Option<NodeId> {
        self.homes.get(&(node, key.clone())).copied()
    }

    /// Canonical scope of an explicitly cached key
    pub fn cached_scope(&self, node: NodeId, key: &BindingKey) -> Option<&str> {
        self.cached.get(&(node, key.clone())).map(String::as_str)
    }

    pub fn is_cached(&self, node: NodeId, key: &BindingKey) -> bool {
        self.cached.contains_key(&(node, key.clone()))
    }

    /// Node of one collection contribution, as seen from `node`
    pub fn contribution(&self, node: NodeId, key: &BindingKey, info: &DependencyInfo) -> Option<NodeId> {
        self.contributions
            .get(&(node, contribution_id(key, info)))
            .copied()
    }

    pub fn is_cached_contribution(&self, key: &BindingKey, info: &DependencyInfo) -> bool {
        self.cached_contributions
            .contains(&contribution_id(key, info))
    }
}

fn contribution_id(key: &BindingKey, info: &DependencyInfo) -> ContributionId {
    (key.clone(), info.symbol.name.clone(), info.member.clone())
}

struct Assigner<'a> {
    catalog: &'a BindingCatalog,
    graph: &'a BindingGraph,
    tree: &'a ScopeTree,
    aliases: &'a ScopeAliases,
    diagnostics: &'a mut Diagnostics,
    assignment: ScopeAssignment,
    in_progress: BTreeSet<(NodeId, BindingKey)>,
}

impl Assigner<'_> {
    fn home(&mut self, node: NodeId, key: &BindingKey) -> NodeId {
        let entry = (node, key.clone());
        if let Some(home) = self.assignment.homes.get(&entry) {
            return *home;
        }
        // A cycle through a wrapper, the key in progress pins nothing
        if !self.in_progress.insert(entry.clone()) {
            return self.tree.root_of(node);
        }

        let graph = self.graph;
        let home = match graph.resolution(node, key) {
            None => self.tree.root_of(node),
            Some(Resolution::Unique(info)) => {
                let info = info.clone();
                self.unique_home(node, key, &info)
            }
            Some(Resolution::Collection { contributors }) => {
                let contributors = contributors.clone();
                let mut home = self.tree.root_of(node);
                for contributor in &contributors {
                    let contribution = self.binding_home(node, key, contributor);
                    let id = contribution_id(key, contributor);
                    if self.cacheable(contributor).is_some() {
                        self.assignment.cached_contributions.insert(id.clone());
                    }
                    self.assignment.contributions.insert((node, id), contribution);
                    home = self.deeper(home, contribution);
                }
                home
            }
            Some(
                Resolution::Wrapper { inner, .. }
                | Resolution::KeyedView { inner, .. }
                | Resolution::Boxed { boxed: inner },
            ) => {
                let inner = inner.clone();
                self.home(node, &inner)
            }
            Some(Resolution::Optional {
                inner,
                present,
                declaration,
            }) => {
                if *present {
                    let inner = inner.clone();
                    self.home(node, &inner)
                } else {
                    let group = declaration.symbol.name.clone();
                    self.nearest_supplier(node, &group)
                        .unwrap_or_else(|| self.tree.root_of(node))
                }
            }
        };

        self.in_progress.remove(&entry);
        self.assignment.homes.insert(entry, home);
        home
    }

    fn unique_home(&mut self, node: NodeId, key: &BindingKey, info: &DependencyInfo) -> NodeId {
        let Some(scope) = self.cacheable(info) else {
            return self.binding_home(node, key, info);
        };
        let home = self.binding_home(node, key, info);
        self.assignment.cached.insert((node, key.clone()), scope);

        // The scope's node has to see the same binding the requester sees
        if self.tree.is_ancestor_or_self(home, node) && self.graph.info(home, key) != Some(info) {
            self.diagnostics.error(Diagnostic::MissingScope {
                key: key.clone(),
                reason: format!(
                    "its binding {} is not bound in scope graph '{}'",
                    info.describe(),
                    self.tree.node(home).graph
                ),
            });
        }
        home
    }

    /// Scope of a binding that memoises its value, for scopes some graph has
    fn cacheable(&self, info: &DependencyInfo) -> Option<String> {
        self.cacheable_scope(info)
            .filter(|scope| self.tree.node_of_scope(scope).is_some())
    }

    fn cacheable_scope(&self, info: &DependencyInfo) -> Option<String> {
        match info.source {
            SourceKind::ProviderGroup | SourceKind::InjectedClass => self.aliases.scope_of(info),
            _ => None,
        }
    }

    /// Node of one binding requested from `node`, also used per collection contributor
    fn binding_home(&mut self, node: NodeId, key: &BindingKey, info: &DependencyInfo) -> NodeId {
        match info.source {
            SourceKind::ExternalMethod
            | SourceKind::ExternalItself
            | SourceKind::BoundInstance
            | SourceKind::ScopeGraphItself
            | SourceKind::NestedGraph
            | SourceKind::NestedGraphBuilder => {
                return info
                    .owner_graph
                    .as_deref()
                    .and_then(|graph| self.tree.node_of_graph(graph))
                    .unwrap_or_else(|| self.tree.root_of(node));
            }
            _ => {}
        }

        if let Some(scope) = self.cacheable_scope(info) {
            return match self.tree.node_of_scope(&scope) {
                Some(scope_node) => scope_node,
                None => {
                    self.diagnostics.error(Diagnostic::MissingScope {
                        key: key.clone(),
                        reason: format!("no scope graph has scope '{scope}'"),
                    });
                    self.tree.root_of(node)
                }
            };
        }

        let mut home = match info.source {
            SourceKind::ProviderGroup => self.nearest_supplier(node, &info.symbol.name),
            _ => None,
        }
        .unwrap_or_else(|| self.tree.root_of(node));
        if info.contributes_value() {
            for dependency in &info.dependencies {
                let dependency_home = self.home(node, dependency);
                home = self.deeper(home, dependency_home);
            }
        }
        home
    }

    /// Closest node at or above `node` supplied `group`
    fn nearest_supplier(&self, node: NodeId, group: &str) -> Option<NodeId> {
        let mut current = Some(node);
        while let Some(id) = current {
            let graph = &self.tree.node(id).graph;
            if self.catalog.groups_of(graph).iter().any(|supplied| supplied == group) {
                return Some(id);
            }
            current = self.tree.parent(id);
        }
        None
    }

    /// Nodes off the requester's path never win, their use is reported as not visible
    fn deeper(&self, current: NodeId, other: NodeId) -> NodeId {
        self.tree.deeper(current, other).unwrap_or(current)
    }
}

#[cfg(test)]
mod tests {
    use graft_config::GraftConfig;

    use super::*;
    use crate::{catalog::input::CatalogInput, closure::ClosureMode};

    struct Fixture {
        graph: BindingGraph,
        tree: ScopeTree,
        assignment: ScopeAssignment,
        diagnostics: Diagnostics,
    }

    fn assign(json: &str) -> Fixture {
        let input = CatalogInput::from_json(json).unwrap();
        let config = GraftConfig::default();
        let mut diagnostics = Diagnostics::new();
        let catalog = BindingCatalog::build(&input, &config, &mut diagnostics);
        let aliases = ScopeAliases::build(&catalog, &config.scopes);
        let tree = ScopeTree::build(&catalog, &aliases, &mut diagnostics);
        let graph = BindingGraph::close(&catalog, &tree, ClosureMode::Full, &mut diagnostics);
        let assignment = ScopeAssignment::assign(&catalog, &graph, &tree, &aliases, &mut diagnostics);
        Fixture {
            graph,
            tree,
            assignment,
            diagnostics,
        }
    }

    fn key(text: &str) -> BindingKey {
        BindingKey::of(text).unwrap()
    }

    #[test]
    fn condenses_to_shortest_marker() {
        let mut aliases = ScopeAliases::new(&ScopeConfig::default());
        aliases.union_all(&["Singleton".to_string(), "AppScope".to_string()]);
        aliases.union_all(&["AppScope".to_string(), "Root".to_string(), "Transient".to_string()]);
        aliases.add("Session");

        assert_eq!(aliases.canonical("Singleton").as_deref(), Some("Root"));
        assert_eq!(aliases.canonical("AppScope").as_deref(), Some("Root"));
        assert_eq!(aliases.canonical("Session").as_deref(), Some("Session"));
        assert_eq!(aliases.canonical("Transient"), None);
        assert_eq!(aliases.canonical("Unknown"), None);
    }

    #[test]
    fn ties_break_lexicographically() {
        let mut aliases = ScopeAliases::new(&ScopeConfig::default());
        aliases.union_all(&["Beta".to_string(), "Alfa".to_string()]);
        assert_eq!(aliases.canonical("Beta").as_deref(), Some("Alfa"));
    }

    const TREE: &str = r#"{
        "provider_groups": [
            {"name": "a.RootGroup", "boundary": "a", "members": [
                {"name": "clock", "provides": "Clock"},
                {"name": "db", "provides": "Db", "scope": "Singleton"}
            ]},
            {"name": "a.SessionGroup", "boundary": "a", "members": [
                {"name": "user", "provides": "User", "params": [{"name": "db", "type": "Db"}]},
                {"name": "cart", "provides": "Cart", "scope": "Transient"}
            ]}
        ],
        "classes": [
            {"name": "Bar", "boundary": "b", "scope": "SessionScope",
             "constructor": {"params": [{"name": "clock", "type": "Clock"}]}},
            {"name": "Widget", "boundary": "b", "constructor": {}}
        ],
        "scope_tree": {"root": "Singleton", "parents": {"SessionScope": "Singleton"}},
        "scope_graphs": [
            {"name": "a.App", "boundary": "a", "scopes": ["Singleton", "AppScope"],
             "provider_groups": ["a.RootGroup"],
             "provisions": [{"name": "clock", "type": "Clock"}, {"name": "widget", "type": "Widget"}]},
            {"name": "s.Session", "boundary": "s", "scopes": ["SessionScope"],
             "provider_groups": ["a.SessionGroup"],
             "provisions": [
                {"name": "user", "type": "User"},
                {"name": "bar", "type": "Bar"},
                {"name": "cart", "type": "Cart"},
                {"name": "lazyBar", "type": "Lazy<Bar>"}
             ]}
        ]
    }"#;

    #[test]
    fn builds_tree_parent_first() {
        let fixture = assign(TREE);
        assert!(!fixture.diagnostics.has_errors(), "{:?}", fixture.diagnostics.errors());

        let nodes = fixture.tree.nodes();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].graph, "a.App");
        assert_eq!(nodes[0].scope, "AppScope");
        assert_eq!(nodes[1].parent, Some(NodeId(0)));
        assert_eq!(nodes[1].depth, 1);
        assert_eq!(fixture.tree.node_of_scope("SessionScope"), Some(NodeId(1)));
    }

    #[test]
    fn assigns_scoped_and_unscoped_keys() {
        let fixture = assign(TREE);
        assert!(!fixture.diagnostics.has_errors(), "{:?}", fixture.diagnostics.errors());
        let assignment = &fixture.assignment;
        let (root, session) = (NodeId(0), NodeId(1));

        assert_eq!(assignment.home(session, &key("Db")), Some(root));
        assert_eq!(assignment.cached_scope(session, &key("Db")), Some("AppScope"));
        assert_eq!(assignment.home(session, &key("Bar")), Some(session));
        assert!(assignment.is_cached(session, &key("Bar")));

        // Unscoped keys sit at the deepest of their supplier and dependencies
        assert_eq!(assignment.home(session, &key("Clock")), Some(root));
        assert_eq!(assignment.home(session, &key("User")), Some(session));
        assert_eq!(assignment.home(session, &key("Cart")), Some(session));
        assert!(!assignment.is_cached(session, &key("Cart")));

        assert_eq!(assignment.home(root, &key("Widget")), Some(root));
        assert_eq!(assignment.home(session, &key("Widget")), None);
        assert_eq!(assignment.home(session, &key("Lazy<Bar>")), Some(session));
        assert!(fixture.graph.resolution(session, &key("Lazy<Bar>")).is_some());
    }

    #[test]
    fn shared_group_lives_in_each_sibling() {
        let json = r#"{
            "provider_groups": [{"name": "a.Shared", "boundary": "a", "members": [
                {"name": "clock", "provides": "Clock", "is_static": true}
            ]}],
            "scope_graphs": [
                {"name": "g.Root", "boundary": "g", "subgraphs": [
                    {"name": "one", "graph": "g.One"},
                    {"name": "two", "graph": "g.Two"}
                ]},
                {"name": "g.One", "boundary": "g", "provider_groups": ["a.Shared"],
                 "provisions": [{"name": "clock", "type": "Clock"}]},
                {"name": "g.Two", "boundary": "g", "provider_groups": ["a.Shared"],
                 "provisions": [{"name": "clock", "type": "Clock"}]}
            ]
        }"#;
        let fixture = assign(json);
        assert!(!fixture.diagnostics.has_errors(), "{:?}", fixture.diagnostics.errors());

        let one = fixture.tree.node_of_graph("g.One").unwrap();
        let two = fixture.tree.node_of_graph("g.Two").unwrap();
        assert_eq!(fixture.assignment.home(one, &key("Clock")), Some(one));
        assert_eq!(fixture.assignment.home(two, &key("Clock")), Some(two));
    }

    #[test]
    fn unknown_scope_is_missing() {
        let json = TREE.replace(r#""scope": "SessionScope","#, r#""scope": "Request","#);
        let fixture = assign(&json);
        assert!(fixture.diagnostics.errors().iter().any(|error| matches!(
            error,
            Diagnostic::MissingScope { key, .. } if key == &BindingKey::of("Bar").unwrap()
        )));
    }
}
