//! Required-set closure: every key the entry points need, resolved at every node needing it.
//!
//! A key resolved at a node is also tried at the node's ancestors, so the scope assignment can
//! find the shallowest node resolving it the same way.

use std::{
    cmp::Reverse,
    collections::{BTreeMap, BTreeSet, VecDeque},
};

use graft_config::DuplicatePolicy;

use crate::{
    binding::{DependencyInfo, MemberRole, SourceKind},
    catalog::{specialisation, BindingCatalog},
    errors::{Diagnostic, Diagnostics, Warning},
    scope::{NodeId, ScopeTree},
    types::{BindingKey, Symbol, TypeSig, WrapperKind},
};

/// How a required key is satisfied
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A single binding, catalogued or synthesized
    Unique(DependencyInfo),
    /// Every contribution to a `Set` or `Map`, declaration-only markers included
    Collection { contributors: Vec<DependencyInfo> },
    /// `Provider<K>` or `Lazy<K>`
    Wrapper { kind: WrapperKind, inner: BindingKey },
    /// `Map<K, Provider<V>>` or `Map<K, Lazy<V>>` over the plain `Map<K, V>`
    KeyedView { wrapper: WrapperKind, inner: BindingKey },
    /// `Optional<K>`, present if `K` is bound
    Optional {
        inner: BindingKey,
        present: bool,
        declaration: DependencyInfo,
    },
    /// A primitive key forwarding to its boxed form
    Boxed { boxed: BindingKey },
}

/// Which bindings a closure may use
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClosureMode {
    /// Every scope graph, unresolved keys are errors
    Full,
    /// One nested scope graph on its own, unresolved keys are expected from its parent
    Partial { graph: String },
}

/// A dependency edge, deferred edges do not need their target while constructing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub key: BindingKey,
    pub deferred: bool,
}

/// A key nobody could resolve at one node
#[derive(Debug, Clone, Default)]
struct Unresolved {
    requested_by: BTreeSet<BindingKey>,
    /// Needed by an entry point of the node, not only tried for a descendant
    required: bool,
}

/// Scope graphs and provider groups one node sees
#[derive(Debug, Clone, Default)]
struct View {
    graphs: BTreeSet<String>,
    groups: BTreeSet<String>,
}

impl View {
    fn add(&mut self, catalog: &BindingCatalog, graph: &str) {
        self.graphs.insert(graph.to_string());
        self.groups.extend(catalog.groups_of(graph).iter().cloned());
    }

    fn sees(&self, info: &DependencyInfo) -> bool {
        match info.source {
            SourceKind::ProviderGroup => self.groups.contains(&info.symbol.name),
            SourceKind::InjectedClass | SourceKind::DelegatingInjector => true,
            _ => info
                .owner_graph
                .as_ref()
                .is_some_and(|graph| self.graphs.contains(graph)),
        }
    }
}

/// The owned result of a closure, every resolution keyed by the node it was made at
#[derive(Debug, Clone)]
pub struct BindingGraph {
    mode: ClosureMode,
    resolved: BTreeMap<NodeId, BTreeMap<BindingKey, Resolution>>,
    unresolved: BTreeMap<NodeId, BTreeMap<BindingKey, Unresolved>>,
    carve_outs: BTreeSet<BindingKey>,
    /// Keys whose error has been reported already
    rejected: BTreeMap<NodeId, BTreeSet<BindingKey>>,
}

impl BindingGraph {
    /// Expands from the entry points of every scope node the mode covers
    ///
    /// In full mode each node sees its own scope graph and every graph above it, and every key
    /// resolved at a node is also tried at the node's parent. In partial mode the one graph
    /// sees only itself.
    pub fn close(
        catalog: &BindingCatalog,
        tree: &ScopeTree,
        mode: ClosureMode,
        diagnostics: &mut Diagnostics,
    ) -> Self {
        let mut closure = Closure {
            resolver: Resolver { catalog },
            tree,
            views: views(catalog, tree, &mode),
            graph: BindingGraph {
                mode,
                resolved: BTreeMap::new(),
                unresolved: BTreeMap::new(),
                carve_outs: BTreeSet::new(),
                rejected: BTreeMap::new(),
            },
            required: BTreeSet::new(),
            pending: VecDeque::new(),
            diagnostics,
        };

        closure.seed();
        while let Some(request) = closure.pending.pop_front() {
            closure.visit(request);
        }
        closure.finish()
    }

    pub fn mode(&self) -> &ClosureMode {
        &self.mode
    }

    pub fn resolution(&self, node: NodeId, key: &BindingKey) -> Option<&Resolution> {
        self.resolved.get(&node)?.get(key)
    }

    /// Every resolution, node by node
    pub fn resolved(&self) -> impl Iterator<Item = (NodeId, &BindingKey, &Resolution)> {
        self.resolved.iter().flat_map(|(node, keys)| {
            keys.iter()
                .map(move |(key, resolution)| (*node, key, resolution))
        })
    }

    /// Number of distinct keys resolved at any node
    pub fn resolved_keys(&self) -> usize {
        self.resolved
            .values()
            .flat_map(BTreeMap::keys)
            .collect::<BTreeSet<_>>()
            .len()
    }

    pub fn is_unresolved(&self, node: NodeId, key: &BindingKey) -> bool {
        self.unresolved
            .get(&node)
            .is_some_and(|keys| keys.contains_key(key))
    }

    pub fn is_rejected(&self, node: NodeId, key: &BindingKey) -> bool {
        self.rejected
            .get(&node)
            .is_some_and(|keys| keys.contains(key))
    }

    /// Whether the closure already reported an error for the key at `node`
    pub fn is_reported(&self, node: NodeId, key: &BindingKey) -> bool {
        self.is_rejected(node, key)
            || self
                .unresolved
                .get(&node)
                .and_then(|keys| keys.get(key))
                .is_some_and(|unresolved| unresolved.required)
    }

    pub fn carve_outs(&self) -> &BTreeSet<BindingKey> {
        &self.carve_outs
    }

    /// The binding behind a unique key
    pub fn info(&self, node: NodeId, key: &BindingKey) -> Option<&DependencyInfo> {
        match self.resolution(node, key)? {
            Resolution::Unique(info) => Some(info),
            _ => None,
        }
    }

    /// Outgoing edges of a key resolved at `node`, all of them at the same node
    pub fn edges(&self, node: NodeId, key: &BindingKey) -> Vec<Edge> {
        let Some(resolution) = self.resolution(node, key) else {
            return Vec::new();
        };
        let eager = |key: &BindingKey| Edge {
            key: key.clone(),
            deferred: false,
        };
        match resolution {
            Resolution::Unique(info) => {
                let deferred = info.source == SourceKind::DelegatingInjector;
                info.dependencies
                    .iter()
                    .map(|key| Edge {
                        key: key.clone(),
                        deferred,
                    })
                    .collect()
            }
            Resolution::Collection { contributors } => contributors
                .iter()
                .filter(|info| info.contributes_value())
                .flat_map(|info| info.dependencies.iter().map(eager))
                .collect(),
            Resolution::Wrapper { inner, .. } | Resolution::KeyedView { inner, .. } => {
                vec![Edge {
                    key: inner.clone(),
                    deferred: true,
                }]
            }
            Resolution::Optional { inner, present, .. } => {
                if *present {
                    vec![eager(inner)]
                } else {
                    Vec::new()
                }
            }
            Resolution::Boxed { boxed } => vec![eager(boxed)],
        }
    }

    pub fn dependencies(&self, node: NodeId, key: &BindingKey) -> Vec<BindingKey> {
        self.edges(node, key)
            .into_iter()
            .map(|edge| edge.key)
            .collect()
    }
}

/// What every node of the mode sees, parents before children
fn views(catalog: &BindingCatalog, tree: &ScopeTree, mode: &ClosureMode) -> BTreeMap<NodeId, View> {
    let mut views = BTreeMap::new();
    match mode {
        ClosureMode::Full => {
            for node in tree.nodes() {
                let mut view: View = node
                    .parent
                    .and_then(|parent| views.get(&parent))
                    .cloned()
                    .unwrap_or_default();
                view.add(catalog, &node.graph);
                views.insert(node.id, view);
            }
        }
        ClosureMode::Partial { graph } => {
            if let Some(node) = tree.node_of_graph(graph) {
                let mut view = View::default();
                view.add(catalog, graph);
                views.insert(node, view);
            }
        }
    }
    views
}

/// One key asked for at one node
struct Request {
    node: NodeId,
    key: BindingKey,
    requester: Option<BindingKey>,
    required: bool,
}

struct Closure<'a> {
    resolver: Resolver<'a>,
    tree: &'a ScopeTree,
    views: BTreeMap<NodeId, View>,
    graph: BindingGraph,
    /// Resolved keys some entry point of their node needs
    required: BTreeSet<(NodeId, BindingKey)>,
    pending: VecDeque<Request>,
    diagnostics: &'a mut Diagnostics,
}

impl Closure<'_> {
    fn push(&mut self, node: NodeId, key: BindingKey, requester: Option<&BindingKey>, required: bool) {
        self.pending.push_back(Request {
            node,
            key,
            requester: requester.cloned(),
            required,
        });
    }

    fn seed(&mut self) {
        let catalog = self.resolver.catalog;
        let tree = self.tree;
        let nodes: Vec<NodeId> = self.views.keys().copied().collect();

        for node in nodes {
            let Some(graph) = catalog.graph(&tree.node(node).graph) else {
                continue;
            };
            for provision in &graph.provisions {
                self.push(node, provision.key(), None, true);
            }
            for injection in &graph.injections {
                let target = BindingKey::new(injection.target.clone());
                match catalog.injected_member_keys(&injection.target) {
                    Ok(keys) => {
                        for key in keys {
                            self.push(node, key, Some(&target), true);
                        }
                    }
                    Err(diagnostic) => self.diagnostics.error(diagnostic),
                }
            }
            for subgraph in graph.subgraphs.iter().filter(|subgraph| !subgraph.builder) {
                self.push(node, BindingKey::new(TypeSig::named(&subgraph.graph)), None, true);
            }
        }
    }

    fn visit(&mut self, request: Request) {
        let Request {
            node,
            key,
            requester,
            required,
        } = request;
        if self.graph.is_rejected(node, &key) {
            return;
        }
        if let Some(resolution) = self.graph.resolution(node, &key) {
            // Tried for a descendant first, its dependencies now become required too
            if required && !self.required.contains(&(node, key.clone())) {
                let dependencies = pushed_by(resolution);
                self.required.insert((node, key.clone()));
                for dependency in dependencies {
                    self.push(node, dependency, Some(&key), true);
                }
            }
            return;
        }
        if let Some(unresolved) = self
            .graph
            .unresolved
            .get_mut(&node)
            .and_then(|keys| keys.get_mut(&key))
        {
            unresolved.requested_by.extend(requester);
            unresolved.required |= required;
            return;
        }
        let Some(view) = self.views.get(&node) else {
            return;
        };

        match self.resolver.resolve(view, &key, self.diagnostics) {
            Ok(Some(resolution)) => {
                for dependency in pushed_by(&resolution) {
                    self.push(node, dependency, Some(&key), required);
                }
                let parent = self
                    .tree
                    .parent(node)
                    .filter(|parent| self.views.contains_key(parent));
                if let Some(parent) = parent {
                    self.push(parent, key.clone(), None, false);
                }
                if required {
                    self.required.insert((node, key.clone()));
                }
                self.graph
                    .resolved
                    .entry(node)
                    .or_default()
                    .insert(key, resolution);
            }
            Ok(None) => {
                self.graph.unresolved.entry(node).or_default().insert(
                    key,
                    Unresolved {
                        requested_by: requester.into_iter().collect(),
                        required,
                    },
                );
            }
            Err(diagnostic) => {
                self.diagnostics.error(diagnostic);
                self.graph.rejected.entry(node).or_default().insert(key);
            }
        }
    }

    fn finish(self) -> BindingGraph {
        let Closure {
            mut graph,
            diagnostics,
            ..
        } = self;

        match &graph.mode {
            ClosureMode::Full => {
                let mut missing: BTreeMap<&BindingKey, BTreeSet<&BindingKey>> = BTreeMap::new();
                for keys in graph.unresolved.values() {
                    for (key, unresolved) in keys.iter().filter(|(_, unresolved)| unresolved.required) {
                        missing
                            .entry(key)
                            .or_default()
                            .extend(&unresolved.requested_by);
                    }
                }
                for (key, requesters) in missing {
                    diagnostics.error(Diagnostic::UnresolvedKey {
                        key: key.clone(),
                        requested_by: requesters.into_iter().cloned().collect(),
                    });
                }
            }
            ClosureMode::Partial { graph: name } => {
                let carve_outs: BTreeSet<BindingKey> = graph
                    .unresolved
                    .values()
                    .flat_map(BTreeMap::keys)
                    .cloned()
                    .collect();
                tracing::debug!(
                    "Scope graph '{name}' expects {} key(s) from its parent",
                    carve_outs.len()
                );
                graph.carve_outs = carve_outs;
            }
        }

        tracing::debug!(
            "Closure resolved {} key(s) at {} node(s)",
            graph.resolved_keys(),
            graph.resolved.len()
        );
        graph
    }
}

/// Keys a resolution needs resolved in turn
fn pushed_by(resolution: &Resolution) -> Vec<BindingKey> {
    match resolution {
        Resolution::Unique(info) => info.dependencies.clone(),
        Resolution::Collection { contributors } => contributors
            .iter()
            .flat_map(|info| info.dependencies.iter().cloned())
            .collect(),
        Resolution::Wrapper { inner, .. } | Resolution::KeyedView { inner, .. } => {
            vec![inner.clone()]
        }
        Resolution::Optional { inner, present, .. } => {
            if *present {
                vec![inner.clone()]
            } else {
                Vec::new()
            }
        }
        Resolution::Boxed { boxed } => vec![boxed.clone()],
    }
}

/// Resolves one key against what one node sees
struct Resolver<'a> {
    catalog: &'a BindingCatalog,
}

impl<'a> Resolver<'a> {
    fn resolve(
        &self,
        view: &View,
        key: &BindingKey,
        diagnostics: &mut Diagnostics,
    ) -> Result<Option<Resolution>, Diagnostic> {
        if key.ty.is_primitive() {
            return Ok(Some(Resolution::Boxed {
                boxed: key.lookup_form(),
            }));
        }

        match key.wrapper() {
            Some(kind @ (WrapperKind::Provider | WrapperKind::Lazy)) => {
                return Ok(key.element().map(|inner| Resolution::Wrapper {
                    kind,
                    inner: inner.lookup_form(),
                }));
            }
            Some(WrapperKind::MembersInjector) => return self.members_injector(key),
            Some(WrapperKind::Optional) => return Ok(self.optional(view, key)),
            Some(WrapperKind::Map) => {
                if let Some(resolved) = self.keyed_view(view, key) {
                    return Ok(Some(resolved));
                }
            }
            _ => {}
        }

        if let Some(contributors) = self.visible_collection(view, key) {
            return Ok(Some(Resolution::Collection { contributors }));
        }
        let candidates = self.candidates(view, key);
        if let Some((kept, rest)) = candidates.split_first() {
            let info = settle(self.catalog.duplicate_policy(), key, kept, rest, diagnostics)?;
            return Ok(Some(Resolution::Unique(info)));
        }
        Ok(self.synthesize(key)?.map(Resolution::Unique))
    }

    /// Unique bindings the view sees, highest priority first, declaration order within one
    fn candidates(&self, view: &View, key: &BindingKey) -> Vec<&'a DependencyInfo> {
        let mut candidates: Vec<&'a DependencyInfo> = self
            .catalog
            .candidates(key)
            .iter()
            .filter(|info| view.sees(info))
            .collect();
        candidates.sort_by_key(|info| Reverse(info.priority()));
        candidates
    }

    fn visible_collection(&self, view: &View, key: &BindingKey) -> Option<Vec<DependencyInfo>> {
        let contributors: Vec<DependencyInfo> = self
            .catalog
            .collection(key)?
            .iter()
            .filter(|info| view.sees(info))
            .cloned()
            .collect();
        (!contributors.is_empty()).then_some(contributors)
    }

    fn keyed_view(&self, view: &View, key: &BindingKey) -> Option<Resolution> {
        let [map_key, value] = key.ty.args() else {
            return None;
        };
        let wrapper = value.wrapper().filter(|kind| kind.is_deferred())?;
        let inner = key.with_type(TypeSig::map_of(map_key.clone(), value.element()?.clone()));
        // A map bound with wrapped values directly is not a view
        if self.visible_collection(view, key).is_some() {
            return None;
        }
        Some(Resolution::KeyedView {
            wrapper,
            inner: inner.lookup_form(),
        })
    }

    fn optional(&self, view: &View, key: &BindingKey) -> Option<Resolution> {
        let inner = key.element()?.lookup_form();
        let declared = key.with_type(TypeSig::wrap(WrapperKind::Optional, inner.ty.clone()));
        let declaration = self
            .catalog
            .optional_declarations(&declared)
            .iter()
            .find(|info| view.sees(info))?;
        Some(Resolution::Optional {
            present: self.resolvable(view, &inner),
            inner,
            declaration: declaration.clone(),
        })
    }

    /// Whether a key could be bound, without looking at its dependencies
    fn resolvable(&self, view: &View, key: &BindingKey) -> bool {
        if key.ty.is_primitive() {
            return self.resolvable(view, &key.lookup_form());
        }
        match key.wrapper() {
            Some(WrapperKind::Provider | WrapperKind::Lazy) => {
                return key
                    .element()
                    .is_some_and(|inner| self.resolvable(view, &inner));
            }
            Some(WrapperKind::MembersInjector) => {
                return key
                    .element()
                    .is_some_and(|inner| self.catalog.class(inner.ty.raw_name()).is_some());
            }
            Some(WrapperKind::Optional) => return self.optional(view, key).is_some(),
            _ => {}
        }
        self.visible_collection(view, key).is_some()
            || !self.candidates(view, key).is_empty()
            || self.keyed_view(view, key).is_some()
            || (key.qualifier.is_none() && self.catalog.class_binding(key.ty.raw_name()).is_some())
    }

    fn members_injector(&self, key: &BindingKey) -> Result<Option<Resolution>, Diagnostic> {
        let Some(target) = key.element() else {
            return Ok(None);
        };
        let Some(class) = self.catalog.class(target.ty.raw_name()) else {
            return Ok(None);
        };

        let mut info = DependencyInfo::new(
            SourceKind::DelegatingInjector,
            key.clone(),
            Symbol::new(&class.name, &class.boundary),
        );
        info.dependencies = self.catalog.injected_member_keys(&target.ty)?;
        if let Some(dependency) = info.dependencies.iter().find(|dep| dep.ty.has_vars()) {
            return Err(Diagnostic::UnsupportedGeneric {
                key: key.clone(),
                dependency: dependency.ty.clone(),
            });
        }
        Ok(Some(Resolution::Unique(info)))
    }

    /// Specialises the constructor binding of the class named by the key
    fn synthesize(&self, key: &BindingKey) -> Result<Option<DependencyInfo>, Diagnostic> {
        if key.qualifier.is_some() {
            return Ok(None);
        }
        let Some(template) = self.catalog.class_binding(key.ty.raw_name()) else {
            return Ok(None);
        };
        let Some(class) = self.catalog.class(key.ty.raw_name()) else {
            return Ok(None);
        };

        let bindings = specialisation(class, &key.ty);
        let mut info = template.clone();
        info.key = key.clone();
        info.dependencies = template
            .dependencies
            .iter()
            .map(|dependency| dependency.with_type(dependency.ty.substitute(&bindings)))
            .collect();

        if let Some(dependency) = info.dependencies.iter().find(|dep| dep.ty.has_vars()) {
            return Err(Diagnostic::UnsupportedGeneric {
                key: key.clone(),
                dependency: dependency.ty.clone(),
            });
        }
        tracing::trace!("Synthesized constructor binding for '{key}'");
        Ok(Some(info))
    }
}

/// Keeps the first candidate, the duplicate policy deciding over the rest
fn settle(
    policy: DuplicatePolicy,
    key: &BindingKey,
    kept: &DependencyInfo,
    rest: &[&DependencyInfo],
    diagnostics: &mut Diagnostics,
) -> Result<DependencyInfo, Diagnostic> {
    let strict = policy == DuplicatePolicy::Strict;
    if let Some(other) = rest
        .iter()
        .find(|other| strict || other.priority() == kept.priority())
    {
        return Err(Diagnostic::DuplicateBinding {
            key: key.clone(),
            first: kept.describe(),
            second: other.describe(),
        });
    }
    for dropped in rest {
        diagnostics.warn(Warning::DuplicateOrdered {
            key: key.clone(),
            kept: kept.describe(),
            dropped: dropped.describe(),
        });
    }
    Ok(kept.clone())
}

/// Roles that never produce a value on their own
pub fn is_declaration_only(info: &DependencyInfo) -> bool {
    matches!(
        info.role,
        MemberRole::CollectionDeclaration | MemberRole::OptionalDeclaration
    )
}

#[cfg(test)]
mod tests {
    use graft_config::GraftConfig;

    use super::*;
    use crate::{catalog::input::CatalogInput, scope::ScopeAliases};

    const ROOT: NodeId = NodeId(0);

    fn close_with(json: &str, mode: ClosureMode, config: &GraftConfig) -> (BindingGraph, Diagnostics) {
        let input = CatalogInput::from_json(json).unwrap();
        let mut diagnostics = Diagnostics::new();
        let catalog = BindingCatalog::build(&input, config, &mut diagnostics);
        let aliases = ScopeAliases::build(&catalog, &config.scopes);
        let tree = ScopeTree::build(&catalog, &aliases, &mut diagnostics);
        let graph = BindingGraph::close(&catalog, &tree, mode, &mut diagnostics);
        (graph, diagnostics)
    }

    fn close(json: &str, mode: ClosureMode) -> (BindingGraph, Diagnostics) {
        close_with(json, mode, &GraftConfig::default())
    }

    fn key(text: &str) -> BindingKey {
        BindingKey::of(text).unwrap()
    }

    const APP: &str = r#"{
        "provider_groups": [{"name": "a.P", "boundary": "a", "members": [
            {"name": "foo", "provides": "Foo", "params": [{"name": "bar", "type": "Provider<Bar>"}]},
            {"name": "port", "provides": "int", "qualifier": "port"},
            {"name": "maybe", "provides": "Baz", "kind": "binds_optional_of"},
            {"name": "maybeQux", "provides": "Qux", "kind": "binds_optional_of"},
            {"name": "json", "provides": "Codec", "kind": {"into_map": {"map_key": {"ty": "String", "value": "\"json\""}}}}
        ]}],
        "classes": [
            {"name": "Bar", "boundary": "b", "constructor": {"params": [{"name": "port", "type": "int", "qualifier": "port"}]}},
            {"name": "Baz", "boundary": "b", "constructor": {}},
            {"name": "Repo", "boundary": "b", "type_params": ["T"],
             "constructor": {"params": [{"name": "store", "type": "Store<T>"}]}},
            {"name": "Screen", "boundary": "c", "fields": [{"name": "repo", "type": "Repo<User>"}]}
        ],
        "scope_graphs": [{
            "name": "a.App", "boundary": "a",
            "provider_groups": ["a.P"],
            "provisions": [
                {"name": "foo", "type": "Foo"},
                {"name": "baz", "type": "Optional<Baz>"},
                {"name": "qux", "type": "Optional<Qux>"},
                {"name": "codecs", "type": "Map<String, Provider<Codec>>"},
                {"name": "screens", "type": "MembersInjector<Screen>"}
            ]
        }]
    }"#;

    #[test]
    fn peels_wrappers_and_specialises_generics() {
        let (graph, _) = close(APP, ClosureMode::Full);

        assert_eq!(
            graph.resolution(ROOT, &key("Provider<Bar>")),
            Some(&Resolution::Wrapper {
                kind: WrapperKind::Provider,
                inner: key("Bar")
            })
        );
        let port = BindingKey::qualified(TypeSig::parse("int").unwrap(), Some("port".to_string()));
        assert!(matches!(
            graph.resolution(ROOT, &port),
            Some(Resolution::Boxed { boxed }) if boxed.ty == TypeSig::named("Integer")
        ));
        assert!(matches!(
            graph.resolution(ROOT, &key("Optional<Baz>")),
            Some(Resolution::Optional { present: true, .. })
        ));
        assert!(matches!(
            graph.resolution(ROOT, &key("Optional<Qux>")),
            Some(Resolution::Optional { present: false, .. })
        ));
        assert!(graph.resolution(ROOT, &key("Qux")).is_none());
        assert!(matches!(
            graph.resolution(ROOT, &key("Map<String, Provider<Codec>>")),
            Some(Resolution::KeyedView { wrapper: WrapperKind::Provider, .. })
        ));
        assert!(matches!(
            graph.resolution(ROOT, &key("Map<String, Codec>")),
            Some(Resolution::Collection { .. })
        ));

        let repo = graph.info(ROOT, &key("Repo<User>")).unwrap();
        assert_eq!(repo.dependencies, vec![key("Store<User>")]);
        let injector = graph.info(ROOT, &key("MembersInjector<Screen>")).unwrap();
        assert_eq!(injector.source, SourceKind::DelegatingInjector);
    }

    #[test]
    fn unresolved_keys_carry_their_requesters() {
        let (graph, diagnostics) = close(APP, ClosureMode::Full);
        assert!(graph.is_unresolved(ROOT, &key("Store<User>")));
        assert!(diagnostics.errors().contains(&Diagnostic::UnresolvedKey {
            key: key("Store<User>"),
            requested_by: vec![key("Repo<User>")],
        }));
    }

    #[test]
    fn raw_generic_use_is_unsupported() {
        let json = APP.replace("Repo<User>", "Repo");
        let (graph, diagnostics) = close(&json, ClosureMode::Full);
        assert!(graph.is_rejected(ROOT, &key("Repo")));
        assert!(diagnostics
            .errors()
            .iter()
            .any(|error| matches!(error, Diagnostic::UnsupportedGeneric { .. })));
    }

    #[test]
    fn deferred_edges_are_marked() {
        let (graph, _) = close(APP, ClosureMode::Full);
        let edges = graph.edges(ROOT, &key("Provider<Bar>"));
        assert!(edges.iter().all(|edge| edge.deferred));
        let edges = graph.edges(ROOT, &key("Foo"));
        assert_eq!(
            edges,
            vec![Edge {
                key: key("Provider<Bar>"),
                deferred: false
            }]
        );
    }

    #[test]
    fn partial_closure_records_carve_outs() {
        let json = r#"{
            "provider_groups": [
                {"name": "a.Root", "boundary": "a", "members": [{"name": "clock", "provides": "Clock"}]},
                {"name": "a.Child", "boundary": "a", "members": [
                    {"name": "session", "provides": "Session", "params": [{"name": "clock", "type": "Clock"}]}
                ]}
            ],
            "scope_graphs": [
                {"name": "a.App", "boundary": "a", "provider_groups": ["a.Root"],
                 "subgraphs": [{"name": "child", "graph": "a.ChildGraph"}]},
                {"name": "a.ChildGraph", "boundary": "a", "provider_groups": ["a.Child"],
                 "provisions": [{"name": "session", "type": "Session"}]}
            ]
        }"#;
        let (graph, diagnostics) = close(
            json,
            ClosureMode::Partial {
                graph: "a.ChildGraph".to_string(),
            },
        );
        assert!(!diagnostics.has_errors(), "{:?}", diagnostics.errors());
        assert_eq!(graph.carve_outs(), &BTreeSet::from([key("Clock")]));
        assert!(graph.info(NodeId(1), &key("Session")).is_some());
    }

    const SIBLINGS: &str = r#"{
        "scope_graphs": [
            {"name": "g.Root", "boundary": "g", "subgraphs": [
                {"name": "one", "graph": "g.One"},
                {"name": "two", "graph": "g.Two"}
            ]},
            {"name": "g.One", "boundary": "g", "bound_instances": [{"name": "req", "type": "Req"}],
             "provisions": [{"name": "req", "type": "Req"}]},
            {"name": "g.Two", "boundary": "g", "bound_instances": [{"name": "req", "type": "Req"}],
             "provisions": [{"name": "req", "type": "Req"}]}
        ]
    }"#;

    #[test]
    fn sibling_graphs_keep_their_own_bound_instances() {
        let (graph, diagnostics) = close(SIBLINGS, ClosureMode::Full);
        assert!(!diagnostics.has_errors(), "{:?}", diagnostics.errors());
        assert!(diagnostics.warnings().is_empty());

        let one = graph.info(NodeId(1), &key("Req")).unwrap();
        let two = graph.info(NodeId(2), &key("Req")).unwrap();
        assert_eq!(one.owner_graph.as_deref(), Some("g.One"));
        assert_eq!(two.owner_graph.as_deref(), Some("g.Two"));
        assert!(graph.resolution(ROOT, &key("Req")).is_none());
    }

    #[test]
    fn collections_gather_contributions_from_above() {
        let json = r#"{
            "provider_groups": [
                {"name": "a.Core", "boundary": "a", "members": [
                    {"name": "core", "provides": "Plugin", "kind": "into_set"}
                ]},
                {"name": "a.Extra", "boundary": "a", "members": [
                    {"name": "extra", "provides": "Plugin", "kind": "into_set"}
                ]}
            ],
            "scope_graphs": [
                {"name": "a.App", "boundary": "a", "provider_groups": ["a.Core"],
                 "provisions": [{"name": "plugins", "type": "Set<Plugin>"}],
                 "subgraphs": [{"name": "child", "graph": "a.ChildGraph"}]},
                {"name": "a.ChildGraph", "boundary": "a", "provider_groups": ["a.Extra"],
                 "provisions": [{"name": "plugins", "type": "Set<Plugin>"}]}
            ]
        }"#;
        let (graph, diagnostics) = close(json, ClosureMode::Full);
        assert!(!diagnostics.has_errors(), "{:?}", diagnostics.errors());

        let contributors = |node| match graph.resolution(node, &key("Set<Plugin>")) {
            Some(Resolution::Collection { contributors }) => contributors
                .iter()
                .map(|info| info.member.clone().unwrap_or_default())
                .collect::<Vec<_>>(),
            other => panic!("not a collection: {other:?}"),
        };
        assert_eq!(contributors(ROOT), vec!["core"]);
        assert_eq!(contributors(NodeId(1)), vec!["core", "extra"]);
    }

    const DUPLICATES: &str = r#"{
        "provider_groups": [
            {"name": "a.P", "boundary": "a", "members": [{"name": "config", "provides": "Config"}]},
            {"name": "a.Q", "boundary": "a", "members": [{"name": "config", "provides": "Config"}]}
        ],
        "external_types": [{"name": "a.Env", "boundary": "a", "methods": [
            {"name": "config", "returns": "Config"}
        ]}],
        "scope_graphs": [{
            "name": "a.App", "boundary": "a", "provider_groups": ["a.P"],
            "dependencies": ["a.Env"],
            "provisions": [{"name": "config", "type": "Config"}]
        }]
    }"#;

    #[test]
    fn higher_priority_wins_with_a_warning() {
        let (graph, diagnostics) = close(DUPLICATES, ClosureMode::Full);
        assert!(!diagnostics.has_errors(), "{:?}", diagnostics.errors());
        let kept = graph.info(ROOT, &key("Config")).unwrap();
        assert_eq!(kept.source, SourceKind::ProviderGroup);
        assert!(matches!(
            diagnostics.warnings(),
            [Warning::DuplicateOrdered { .. }]
        ));
    }

    #[test]
    fn strict_policy_rejects_the_duplicate() {
        let mut config = GraftConfig::default();
        config.bindings.duplicate_policy = DuplicatePolicy::Strict;
        let (graph, diagnostics) = close_with(DUPLICATES, ClosureMode::Full, &config);
        assert!(graph.is_rejected(ROOT, &key("Config")));
        assert!(matches!(
            diagnostics.errors(),
            [Diagnostic::DuplicateBinding { .. }]
        ));
    }

    #[test]
    fn equal_priorities_conflict_where_both_are_seen() {
        let json = DUPLICATES.replace(r#""provider_groups": ["a.P"]"#, r#""provider_groups": ["a.P", "a.Q"]"#);
        let (_, diagnostics) = close(&json, ClosureMode::Full);
        assert!(matches!(
            diagnostics.errors(),
            [Diagnostic::DuplicateBinding { .. }]
        ));
    }
}
