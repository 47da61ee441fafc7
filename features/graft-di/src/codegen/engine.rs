//! The accessor generation engine.
//!
//! Every generated member is created lazily the first time a consumer asks for it. A unit
//! records each member name before its body is produced, so requests re-entering through a
//! dependency cycle stop at the already recorded name.

use graft_config::GraftConfig;

use super::{
    model::{AnonymousDecl, Declarations, Expr, FieldDecl, MethodDecl, Stmt, Visibility},
    strategy::{self, Strategy},
    unit::{Member, UnitArena, UnitId},
    Names,
};
use crate::{
    binding::DependencyInfo,
    catalog::{BindingCatalog, InjectionLayer},
    closure::{BindingGraph, Resolution},
    errors::{Diagnostic, Diagnostics},
    orchestrator::top_params,
    placement::{Placement, PlacementPolicy, Requester, UnitKey},
    scope::{NodeId, ScopeAssignment, ScopeTree},
    types::{BindingKey, TypeSig, WrapperKind},
};

/// Counters reported with a compilation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub accessors: usize,
    pub cached: usize,
    pub inject_methods: usize,
    pub partials: usize,
    pub contributions: usize,
}

pub struct Engine<'a> {
    pub(crate) catalog: &'a BindingCatalog,
    pub(crate) graph: &'a BindingGraph,
    pub(crate) tree: &'a ScopeTree,
    pub(crate) assignment: &'a ScopeAssignment,
    pub(crate) names: Names<'a>,
    pub(crate) arena: UnitArena,
    pub(crate) stats: EngineStats,
    pub(crate) diagnostics: &'a mut Diagnostics,
    pub(crate) placement: PlacementPolicy<'a>,
}

impl<'a> Engine<'a> {
    pub fn new(
        config: &'a GraftConfig,
        catalog: &'a BindingCatalog,
        graph: &'a BindingGraph,
        tree: &'a ScopeTree,
        assignment: &'a ScopeAssignment,
        diagnostics: &'a mut Diagnostics,
    ) -> Self {
        Self {
            catalog,
            graph,
            tree,
            assignment,
            names: Names::new(&config.naming),
            arena: UnitArena::new(),
            stats: EngineStats::default(),
            diagnostics,
            placement: PlacementPolicy::new(graph, tree, assignment, config.placement.generic_fallback),
        }
    }

    pub fn arena(&self) -> &UnitArena {
        &self.arena
    }

    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    /// Makes sure the accessor of `key` exists and returns a call to it from `from`
    pub fn ensure(&mut self, key: &BindingKey, from: UnitId) -> Expr {
        let (from_node, from_package) = {
            let unit = self.arena.get(from);
            (unit.node(), unit.package.clone())
        };
        if self.graph.resolution(from_node, key).is_none() {
            if !self.graph.is_reported(from_node, key) {
                self.diagnostics.error(Diagnostic::MissingScope {
                    key: key.clone(),
                    reason: format!("it is not bound in scope '{}'", self.tree.node(from_node).scope),
                });
            }
            return self.local_placeholder(key, from);
        }
        let placement = self.placement.place(
            key,
            Requester {
                boundary: &from_package,
                node: from_node,
            },
        );

        let target = placement.node();
        if !self.tree.is_ancestor_or_self(target, from_node) {
            self.diagnostics.error(Diagnostic::NotVisible {
                key: key.clone(),
                scope: self.tree.node(target).scope.clone(),
                from: self.tree.node(from_node).scope.clone(),
            });
            return self.local_placeholder(key, from);
        }
        let Some(unit) = self.arena.resolve(&placement, &self.names) else {
            return self.local_placeholder(key, from);
        };

        let claimed = self
            .arena
            .claim(unit, Member::Accessor(key.clone()), &self.names.accessor(key));
        if claimed.fresh {
            self.generate(key, unit, &claimed.name);
        }
        self.route(from, unit).call(claimed.name, Vec::new())
    }

    /// How code in `from` reaches the unit `to`, which must sit at an ancestor-or-self node
    pub fn route(&self, from: UnitId, to: UnitId) -> Expr {
        if from == to {
            return Expr::This;
        }
        let source = self.arena.get(from);
        let target = self.arena.get(to);

        let mut expr = if source.is_top_level() {
            Expr::This
        } else {
            Expr::This.field("top")
        };
        let hops = self
            .tree
            .depth(source.node())
            .saturating_sub(self.tree.depth(target.node()));
        for _ in 0..hops {
            expr = expr.field("parent");
        }
        match &target.getter {
            Some(getter) => expr.call(&getter.method, Vec::new()),
            None => expr,
        }
    }

    /// Route to the top-level unit of `node`
    fn route_to_top(&self, from: UnitId, node: NodeId) -> Option<Expr> {
        let top = self.arena.top_of(node)?;
        Some(self.route(from, top))
    }

    fn generate(&mut self, key: &BindingKey, unit: UnitId, name: &str) {
        let graph = self.graph;
        let node = self.arena.get(unit).node();
        let resolution = graph.resolution(node, key);
        let strategy = strategy::select(resolution);
        tracing::debug!("Generating '{name}' for '{key}' as {strategy:?}");

        let body = match (strategy, resolution) {
            (Strategy::Factory, Some(Resolution::Unique(info))) => self.factory(info, unit),
            (Strategy::Alias, Some(Resolution::Unique(info))) => match info.dependencies.first() {
                Some(aliased) => vec![Stmt::Return(self.ensure(aliased, unit))],
                None => placeholder_body(key),
            },
            (Strategy::Construct, Some(Resolution::Unique(info))) => self.construct(key, info, unit),
            (Strategy::ReadExternal, Some(Resolution::Unique(info))) => self.read_external(info, unit),
            (Strategy::ReadTopField, Some(Resolution::Unique(info))) => self.read_top_field(info, unit),
            (Strategy::TopItself, Some(Resolution::Unique(_))) => {
                let top = self.arena.get(unit).top;
                vec![Stmt::Return(self.route(unit, top))]
            }
            (Strategy::NestedGraph, Some(Resolution::Unique(info))) => self.nested_graph(info, unit),
            (Strategy::NestedBuilder, Some(Resolution::Unique(info))) => self.nested_builder(info, unit),
            (Strategy::Injector, Some(Resolution::Unique(_))) => self.injector(key, unit),
            (
                Strategy::Deferred | Strategy::Memoized,
                Some(Resolution::Wrapper { kind, inner }),
            ) => {
                let value = self.ensure(inner, unit);
                vec![Stmt::Return(holder(*kind, inner.ty.clone(), value))]
            }
            (Strategy::Optional, Some(Resolution::Optional { inner, present, .. })) => {
                let optional = TypeSig::named(WrapperKind::Optional.name());
                let value = if *present {
                    Expr::StaticCall {
                        owner: optional,
                        method: "of".to_string(),
                        args: vec![self.ensure(inner, unit)],
                    }
                } else {
                    Expr::StaticCall {
                        owner: optional,
                        method: "empty".to_string(),
                        args: Vec::new(),
                    }
                };
                vec![Stmt::Return(value)]
            }
            (Strategy::Unbox, Some(Resolution::Boxed { boxed })) => {
                vec![Stmt::Return(self.ensure(boxed, unit))]
            }
            (Strategy::Aggregate, Some(Resolution::Collection { contributors })) => {
                self.aggregate(key, contributors, unit)
            }
            (Strategy::KeyedView, Some(Resolution::KeyedView { wrapper, inner })) => {
                self.keyed_view(key, *wrapper, inner, unit)
            }
            _ => placeholder_body(key),
        };

        self.stats.accessors += 1;
        let declarations = if self.assignment.is_cached(node, key) {
            self.stats.cached += 1;
            let unscoped = self
                .arena
                .claim(unit, Member::Unscoped(key.clone()), &self.names.unscoped_of(name))
                .name;
            let memo = self
                .arena
                .claim(unit, Member::Memo(key.clone()), &self.names.memo_field(key))
                .name;
            cached(name, &unscoped, &memo, &key.ty, body)
        } else {
            Declarations::method(
                MethodDecl::new(name, Some(key.ty.clone()), Visibility::Public).body(body),
            )
        };
        self.arena.merge(unit, declarations);
    }

    /// A throwing accessor in the requesting unit itself
    fn local_placeholder(&mut self, key: &BindingKey, from: UnitId) -> Expr {
        let claimed = self
            .arena
            .claim(from, Member::Accessor(key.clone()), &self.names.accessor(key));
        if claimed.fresh {
            self.arena.merge(
                from,
                Declarations::method(
                    MethodDecl::new(&claimed.name, Some(key.ty.clone()), Visibility::Public)
                        .body(placeholder_body(key)),
                ),
            );
        }
        Expr::This.call(claimed.name, Vec::new())
    }

    pub(crate) fn factory(&mut self, info: &DependencyInfo, unit: UnitId) -> Vec<Stmt> {
        match self.factory_call(info, unit) {
            Some(call) => vec![Stmt::Return(call)],
            None => placeholder_body(&info.key),
        }
    }

    /// Calls a provider group member with its dependencies ensured from `unit`
    pub(crate) fn factory_call(&mut self, info: &DependencyInfo, unit: UnitId) -> Option<Expr> {
        let args = info
            .dependencies
            .iter()
            .map(|dependency| self.ensure(dependency, unit))
            .collect();
        let member = info.member.clone().unwrap_or_default();
        if info.is_static {
            return Some(Expr::StaticCall {
                owner: TypeSig::named(&info.symbol.name),
                method: member,
                args,
            });
        }
        let instance = self.group_instance(&info.key, &info.symbol.name, unit)?;
        Some(instance.call(member, args))
    }

    /// The group instance held by the nearest node supplied `group`
    fn group_instance(&mut self, key: &BindingKey, group: &str, unit: UnitId) -> Option<Expr> {
        let node = self.arena.get(unit).node();
        let mut current = Some(node);
        while let Some(id) = current {
            let graph = &self.tree.node(id).graph;
            if self.catalog.groups_of(graph).iter().any(|supplied| supplied == group) {
                return Some(self.route_to_top(unit, id)?.field(Names::instance_field(group)));
            }
            current = self.tree.parent(id);
        }
        self.diagnostics.error(Diagnostic::MissingScope {
            key: key.clone(),
            reason: format!(
                "provider group '{group}' is not supplied to scope '{}' or any scope around it",
                self.tree.node(node).scope
            ),
        });
        None
    }

    fn construct(&mut self, key: &BindingKey, info: &DependencyInfo, unit: UnitId) -> Vec<Stmt> {
        let catalog = self.catalog;
        let constructor_params = catalog
            .class(key.ty.raw_name())
            .and_then(|class| class.constructor.as_ref())
            .map_or(0, |constructor| constructor.params.len());

        let args = info
            .dependencies
            .iter()
            .take(constructor_params)
            .map(|dependency| self.ensure(dependency, unit))
            .collect();
        let created = Expr::new_instance(key.ty.clone(), args);

        let instance = Expr::local("instance");
        match self.inject_call(&key.ty, unit, instance.clone()) {
            Some(call) => vec![
                Stmt::Let {
                    name: "instance".to_string(),
                    ty: key.ty.clone(),
                    value: created,
                },
                Stmt::Expr(call),
                Stmt::Return(instance),
            ],
            None => vec![Stmt::Return(created)],
        }
    }

    /// A call injecting the members of `ty` into `instance`, `None` if it has none
    pub fn inject_call(&mut self, ty: &TypeSig, from: UnitId, instance: Expr) -> Option<Expr> {
        let (unit, method) = self.ensure_inject(ty, from)?;
        Some(self.route(from, unit).call(method, vec![instance]))
    }

    /// Makes sure the inject method of `ty` exists at the node of `from`
    pub fn ensure_inject(&mut self, ty: &TypeSig, from: UnitId) -> Option<(UnitId, String)> {
        let catalog = self.catalog;
        let chain = match catalog.injection_chain(ty) {
            Ok(chain) => chain,
            Err(diagnostic) => {
                self.diagnostics.error(diagnostic);
                return None;
            }
        };
        let index = chain
            .iter()
            .rposition(|layer| layer.class.has_injected_members())?;
        self.ensure_layer(&chain, index, from)
    }

    fn ensure_layer(
        &mut self,
        chain: &[InjectionLayer<'_>],
        index: usize,
        from: UnitId,
    ) -> Option<(UnitId, String)> {
        let layer = &chain[index];
        let node = self.arena.get(from).node();
        let placement = Placement::Unit(UnitKey::package(&layer.class.boundary, node));
        let unit = self.arena.resolve(&placement, &self.names)?;
        let claimed = self
            .arena
            .claim(unit, Member::Inject(layer.ty.clone()), &self.names.inject(&layer.ty));
        let name = claimed.name;
        if !claimed.fresh {
            return Some((unit, name));
        }

        let instance = Expr::local("instance");
        let mut body = Vec::new();
        let ancestor = chain[..index]
            .iter()
            .rposition(|layer| layer.class.has_injected_members());
        if let Some(ancestor) = ancestor {
            if let Some((target, method)) = self.ensure_layer(chain, ancestor, unit) {
                let call = self.route(unit, target).call(method, vec![instance.clone()]);
                body.push(Stmt::Expr(call));
            }
        }

        let field_keys: Vec<_> = layer.field_keys().collect();
        for (field, key) in layer.class.fields.iter().zip(&field_keys) {
            let value = self.ensure(key, unit);
            body.push(Stmt::Assign {
                target: instance.clone().field(&field.name),
                value,
            });
        }
        for method in &layer.class.methods {
            let args = method
                .params
                .iter()
                .map(|param| {
                    let key = BindingKey::qualified(layer.specialise(&param.ty), param.qualifier.clone());
                    self.ensure(&key, unit)
                })
                .collect();
            body.push(Stmt::Expr(instance.clone().call(&method.name, args)));
        }

        self.stats.inject_methods += 1;
        self.arena.merge(
            unit,
            Declarations::method(
                MethodDecl::new(&name, None, Visibility::Public)
                    .param("instance", layer.ty.clone())
                    .body(body),
            ),
        );
        Some((unit, name))
    }

    fn owner_top(&mut self, info: &DependencyInfo, unit: UnitId) -> Option<Expr> {
        let owner = info.owner_graph.as_deref()?;
        let Some(node) = self.tree.node_of_graph(owner) else {
            self.diagnostics.error(Diagnostic::MissingScope {
                key: info.key.clone(),
                reason: format!("scope graph '{owner}' has no scope"),
            });
            return None;
        };
        self.route_to_top(unit, node)
    }

    fn read_external(&mut self, info: &DependencyInfo, unit: UnitId) -> Vec<Stmt> {
        let Some(top) = self.owner_top(info, unit) else {
            return placeholder_body(&info.key);
        };
        let method = info.member.clone().unwrap_or_default();
        let value = top
            .field(Names::instance_field(&info.symbol.name))
            .call(method, Vec::new());
        vec![Stmt::Return(value)]
    }

    fn read_top_field(&mut self, info: &DependencyInfo, unit: UnitId) -> Vec<Stmt> {
        let Some(top) = self.owner_top(info, unit) else {
            return placeholder_body(&info.key);
        };
        let field = match &info.member {
            Some(member) => member.clone(),
            None => Names::instance_field(&info.symbol.name),
        };
        vec![Stmt::Return(top.field(field))]
    }

    fn child_top(&self, info: &DependencyInfo) -> Option<(NodeId, TypeSig)> {
        let child = info.member.as_deref()?;
        let node = self.tree.node_of_graph(child)?;
        let top = self.arena.top_of(node)?;
        Some((node, self.arena.get(top).decl.ty()))
    }

    fn nested_graph(&mut self, info: &DependencyInfo, unit: UnitId) -> Vec<Stmt> {
        let Some((child, ty)) = self.child_top(info) else {
            return placeholder_body(&info.key);
        };
        if top_params(self.catalog, self.tree, &self.names, child).len() > 1 {
            self.diagnostics.error(Diagnostic::InvalidCatalog(format!(
                "nested graph '{}' takes constructor arguments and must be created through a builder",
                info.key
            )));
            return placeholder_body(&info.key);
        }
        let node = self.arena.get(unit).node();
        let Some(parent) = self.route_to_top(unit, node) else {
            return placeholder_body(&info.key);
        };
        vec![Stmt::Return(Expr::new_instance(ty, vec![parent]))]
    }

    fn nested_builder(&mut self, info: &DependencyInfo, unit: UnitId) -> Vec<Stmt> {
        let Some((_, ty)) = self.child_top(info) else {
            return placeholder_body(&info.key);
        };
        let node = self.arena.get(unit).node();
        let Some(parent) = self.route_to_top(unit, node) else {
            return placeholder_body(&info.key);
        };
        vec![Stmt::Return(builder_of(&ty, self.names.builder(), parent))]
    }

    fn injector(&mut self, key: &BindingKey, unit: UnitId) -> Vec<Stmt> {
        let Some(target) = key.element() else {
            return placeholder_body(key);
        };
        let instance = Expr::local("instance");
        let body = self
            .inject_call(&target.ty, unit, instance)
            .map(Stmt::Expr)
            .into_iter()
            .collect();

        let inject = MethodDecl::new("injectMembers", None, Visibility::Public)
            .param("instance", target.ty.clone())
            .body(body);
        let holder = AnonymousDecl {
            implements: key.ty.clone(),
            fields: Vec::new(),
            methods: vec![inject],
        };
        vec![Stmt::Return(Expr::Anonymous(Box::new(holder)))]
    }
}

/// `new Child.Builder().parent(parent)`
pub(crate) fn builder_of(top: &TypeSig, builder: &str, parent: Expr) -> Expr {
    let builder = TypeSig::named(format!("{}.{builder}", top.raw_name()));
    Expr::new_instance(builder, Vec::new()).call("parent", vec![parent])
}

/// An anonymous `Provider` or `Lazy` returning `value`, `Lazy` remembering it
pub(crate) fn holder(kind: WrapperKind, value_ty: TypeSig, value: Expr) -> Expr {
    let get = MethodDecl::new("get", Some(value_ty.clone()), Visibility::Public);
    let (fields, body) = if kind == WrapperKind::Lazy {
        let memo = Expr::SelfField("value".to_string());
        (
            vec![FieldDecl::memo("value", value_ty.clone())],
            vec![
                Stmt::IfNull {
                    subject: memo.clone(),
                    then: vec![Stmt::Assign {
                        target: memo.clone(),
                        value,
                    }],
                },
                Stmt::Return(memo),
            ],
        )
    } else {
        (Vec::new(), vec![Stmt::Return(value)])
    };
    Expr::Anonymous(Box::new(AnonymousDecl {
        implements: TypeSig::wrap(kind, value_ty),
        fields,
        methods: vec![get.body(body)],
    }))
}

/// Reads `field`, re-reads it if null and only then computes and stores the value
pub(crate) fn double_checked(field: &str, ty: &TypeSig, compute: Expr) -> Vec<Stmt> {
    let value = Expr::local("value");
    let stored = Expr::This.field(field);
    vec![
        Stmt::Let {
            name: "value".to_string(),
            ty: ty.clone(),
            value: stored.clone(),
        },
        Stmt::IfNull {
            subject: value.clone(),
            then: vec![
                Stmt::Assign {
                    target: value.clone(),
                    value: stored.clone(),
                },
                Stmt::IfNull {
                    subject: value.clone(),
                    then: vec![
                        Stmt::Assign {
                            target: value.clone(),
                            value: compute,
                        },
                        Stmt::Assign {
                            target: stored,
                            value: value.clone(),
                        },
                    ],
                },
            ],
        },
        Stmt::Return(value),
    ]
}

/// Memo field, private computing accessor and public caching accessor
pub(crate) fn cached(
    name: &str,
    unscoped: &str,
    memo: &str,
    ty: &TypeSig,
    body: Vec<Stmt>,
) -> Declarations {
    let compute = Expr::This.call(unscoped, Vec::new());
    Declarations::method(
        MethodDecl::new(name, Some(ty.clone()), Visibility::Public).body(double_checked(memo, ty, compute)),
    )
    .with_method(MethodDecl::new(unscoped, Some(ty.clone()), Visibility::Private).body(body))
    .with_field(FieldDecl::memo(memo, ty.clone()))
}

pub(crate) fn placeholder_body(key: &BindingKey) -> Vec<Stmt> {
    vec![Stmt::Throw {
        ty: TypeSig::named("IllegalStateException"),
        message: format!("Unresolved binding {key}"),
    }]
}
