//! Walks the scope tree parent-first and turns the generated units into finished classes.
//!
//! Entry points of every scope graph are generated first, which pulls every reachable accessor
//! into its unit. Only then is each top-level unit finalised: its constructor, its fields and
//! one lazily created getter per unit of its node.

use std::collections::{BTreeMap, BTreeSet};

use crate::{
    catalog::{input::ScopeGraphDescriptor, BindingCatalog},
    codegen::{
        engine::{builder_of, double_checked, placeholder_body, Engine, EngineStats},
        model::{
            ConstructorDecl, Declarations, Expr, FieldDecl, MethodDecl, Param, Stmt, UnitDecl,
            UnitKind, Visibility,
        },
        unit::{Member, UnitId},
        Names,
    },
    errors::Diagnostic,
    scope::{NodeId, ScopeTree},
    types::TypeSig,
};

/// What a constructor parameter of a top-level unit carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopParamKind {
    Parent,
    External,
    BoundInstance,
    ProviderGroup,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopParam {
    pub kind: TopParamKind,
    pub name: String,
    pub ty: TypeSig,
}

/// Constructor parameters of the top-level unit of `node`, in constructor order
pub fn top_params(catalog: &BindingCatalog, tree: &ScopeTree, names: &Names<'_>, node: NodeId) -> Vec<TopParam> {
    let scope_node = tree.node(node);
    let Some(graph) = catalog.graph(&scope_node.graph) else {
        return Vec::new();
    };
    let mut params = Vec::new();

    let parent = scope_node
        .parent
        .and_then(|parent| catalog.graph(&tree.node(parent).graph));
    if let Some(parent) = parent {
        params.push(TopParam {
            kind: TopParamKind::Parent,
            name: "parent".to_string(),
            ty: top_type(names, parent),
        });
    }

    let mut externals = graph.dependencies.clone();
    externals.sort();
    externals.dedup();
    params.extend(externals.into_iter().map(|external| TopParam {
        kind: TopParamKind::External,
        name: Names::instance_field(&external),
        ty: TypeSig::named(external),
    }));

    let mut instances: Vec<_> = graph.bound_instances.iter().collect();
    instances.sort_by_key(|instance| instance.key());
    params.extend(instances.into_iter().map(|instance| TopParam {
        kind: TopParamKind::BoundInstance,
        name: instance.name.clone(),
        ty: instance.ty.clone(),
    }));

    params.extend(
        instance_groups(catalog, &graph.name, false)
            .into_iter()
            .map(|group| TopParam {
                kind: TopParamKind::ProviderGroup,
                name: Names::instance_field(&group),
                ty: TypeSig::named(group),
            }),
    );
    params
}

/// Sorted provider groups of `graph` called through an instance
fn instance_groups(catalog: &BindingCatalog, graph: &str, default_constructible: bool) -> Vec<String> {
    let mut groups: Vec<String> = catalog
        .groups_of(graph)
        .iter()
        .filter(|name| {
            catalog.group(name).is_some_and(|group| {
                group.needs_instance() && group.default_constructible == default_constructible
            })
        })
        .cloned()
        .collect();
    groups.sort();
    groups.dedup();
    groups
}

fn top_type(names: &Names<'_>, graph: &ScopeGraphDescriptor) -> TypeSig {
    let name = names.top_level(graph.simple_name());
    if graph.boundary.is_empty() {
        TypeSig::named(name)
    } else {
        TypeSig::named(format!("{}.{name}", graph.boundary))
    }
}

fn header(graph: &str) -> Vec<String> {
    vec![
        format!("Generated by graft for `{graph}`. Do not edit."),
        "Not thread-safe: memoised values are read and stored without synchronisation.".to_string(),
    ]
}

pub struct Orchestrator<'a> {
    engine: Engine<'a>,
    tops: BTreeMap<NodeId, UnitId>,
}

impl<'a> Orchestrator<'a> {
    pub fn new(engine: Engine<'a>) -> Self {
        Self {
            engine,
            tops: BTreeMap::new(),
        }
    }

    /// Generates every scope graph and returns the finished units, sorted by name
    pub fn run(mut self) -> (Vec<UnitDecl>, EngineStats) {
        let tree = self.engine.tree;
        for node in tree.nodes() {
            self.create_shell(node.id);
        }
        for node in tree.nodes() {
            self.generate_entry_points(node.id);
        }
        for node in tree.nodes() {
            self.finalize(node.id);
        }

        let stats = self.engine.stats();
        let mut units: Vec<UnitDecl> = self
            .engine
            .arena
            .into_units()
            .into_iter()
            .map(|unit| {
                let mut decl = unit.decl;
                decl.sort();
                decl
            })
            .collect();
        units.sort_by_key(UnitDecl::full_name);
        tracing::debug!("Orchestrated {} unit(s)", units.len());
        (units, stats)
    }

    fn graph_of(&self, node: NodeId) -> Option<&'a ScopeGraphDescriptor> {
        let catalog = self.engine.catalog;
        catalog.graph(&self.engine.tree.node(node).graph)
    }

    fn create_shell(&mut self, node: NodeId) {
        let Some(graph) = self.graph_of(node) else {
            return;
        };
        let ty = top_type(&self.engine.names, graph);
        let name = ty.simple_name().to_string();
        let mut decl = UnitDecl::new(name, &graph.boundary, UnitKind::TopLevel);
        decl.implements = Some(TypeSig::named(&graph.name));
        decl.doc = header(&graph.name);

        tracing::trace!("Creating top-level unit '{}'", decl.full_name());
        let id = self.engine.arena.add_top(node, decl);
        self.tops.insert(node, id);

        // Declared names come first, generated members give way to them
        let entry_points = graph
            .provisions
            .iter()
            .map(|provision| &provision.name)
            .chain(graph.injections.iter().map(|injection| &injection.name))
            .chain(graph.subgraphs.iter().map(|subgraph| &subgraph.name));
        for name in entry_points {
            self.engine
                .arena
                .claim(id, Member::EntryPoint(name.clone()), name);
        }
        let engine = &self.engine;
        let mut fields: Vec<String> = top_params(engine.catalog, engine.tree, &engine.names, node)
            .into_iter()
            .map(|param| param.name)
            .collect();
        fields.extend(
            instance_groups(engine.catalog, &graph.name, true)
                .iter()
                .map(|group| Names::instance_field(group)),
        );
        for field in fields {
            self.engine
                .arena
                .claim(id, Member::Field(field.clone()), &field);
        }
    }

    fn generate_entry_points(&mut self, node: NodeId) {
        let (Some(graph), Some(&top)) = (self.graph_of(node), self.tops.get(&node)) else {
            return;
        };
        tracing::debug!("Generating entry points of '{}'", graph.name);
        let mut seen = BTreeSet::new();

        for provision in &graph.provisions {
            if !seen.insert(&provision.name) {
                continue;
            }
            let value = self.engine.ensure(&provision.key(), top);
            self.add(
                top,
                MethodDecl::new(&provision.name, Some(provision.ty.clone()), Visibility::Public)
                    .body(vec![Stmt::Return(value)]),
            );
        }

        for injection in &graph.injections {
            if !seen.insert(&injection.name) {
                continue;
            }
            let body = self
                .engine
                .inject_call(&injection.target, top, Expr::local("instance"))
                .map(Stmt::Expr)
                .into_iter()
                .collect();
            self.add(
                top,
                MethodDecl::new(&injection.name, None, Visibility::Public)
                    .param("instance", injection.target.clone())
                    .body(body),
            );
        }

        for subgraph in &graph.subgraphs {
            if !seen.insert(&subgraph.name) {
                continue;
            }
            let Some(child) = self.engine.tree.node_of_graph(&subgraph.graph) else {
                continue;
            };
            let Some(child_graph) = self.graph_of(child) else {
                continue;
            };
            let child_top = top_type(&self.engine.names, child_graph);
            let builder = self.engine.names.builder().to_string();

            let method = if subgraph.builder {
                let returns = TypeSig::named(format!("{}.{builder}", subgraph.graph));
                MethodDecl::new(&subgraph.name, Some(returns), Visibility::Public)
                    .body(vec![Stmt::Return(builder_of(&child_top, &builder, Expr::This))])
            } else {
                let engine = &self.engine;
                let body = if top_params(engine.catalog, engine.tree, &engine.names, child).len() > 1 {
                    self.engine.diagnostics.error(Diagnostic::InvalidCatalog(format!(
                        "nested graph '{}' takes constructor arguments and must be created through a builder",
                        subgraph.graph
                    )));
                    placeholder_body(&child_graph.key())
                } else {
                    vec![Stmt::Return(Expr::new_instance(child_top, vec![Expr::This]))]
                };
                MethodDecl::new(&subgraph.name, Some(TypeSig::named(&subgraph.graph)), Visibility::Public)
                    .body(body)
            };
            self.add(top, method);
        }
    }

    fn add(&mut self, unit: UnitId, method: MethodDecl) {
        self.engine.arena.merge(unit, Declarations::method(method));
    }

    fn finalize(&mut self, node: NodeId) {
        let (Some(graph), Some(&top)) = (self.graph_of(node), self.tops.get(&node)) else {
            return;
        };
        let engine = &self.engine;
        let params = top_params(engine.catalog, engine.tree, &engine.names, node);
        let top_ty = engine.arena.get(top).decl.ty();

        let mut fields = Vec::new();
        let mut constructor = ConstructorDecl {
            params: Vec::new(),
            visibility: Visibility::Public,
            body: Vec::new(),
        };
        for param in &params {
            fields.push(FieldDecl::constant(&param.name, param.ty.clone(), Visibility::Public));
            constructor.params.push(Param::new(&param.name, param.ty.clone()));
            constructor.body.push(Stmt::Assign {
                target: Expr::This.field(&param.name),
                value: Expr::local(&param.name),
            });
        }
        for group in instance_groups(engine.catalog, &graph.name, true) {
            let name = Names::instance_field(&group);
            let ty = TypeSig::named(group);
            fields.push(FieldDecl::constant(&name, ty.clone(), Visibility::Public));
            constructor.body.push(Stmt::Assign {
                target: Expr::This.field(name),
                value: Expr::new_instance(ty, Vec::new()),
            });
        }

        let units = engine.arena.units_at(node);
        let mut getters = Declarations::default();
        for unit in &units {
            let Some(getter) = &engine.arena.get(*unit).getter else {
                continue;
            };
            let ty = engine.arena.get(*unit).decl.ty();
            let create = Expr::new_instance(ty.clone(), vec![Expr::This]);
            getters = getters
                .with_field(FieldDecl::memo(&getter.field, ty.clone()))
                .with_method(
                    MethodDecl::new(&getter.method, Some(ty.clone()), Visibility::Public)
                        .body(double_checked(&getter.field, &ty, create)),
                );
        }
        for unit in units {
            self.finalize_unit(unit, &top_ty, &graph.name);
        }

        let builder = self.builder(graph, &top_ty, &params);
        let decl = &mut self.engine.arena.get_mut(top).decl;
        decl.fields.extend(fields);
        decl.constructors.push(constructor);
        decl.nested.push(builder);
        decl.merge(getters);
    }

    /// Gives a unit its reference to the top-level unit
    fn finalize_unit(&mut self, unit: UnitId, top_ty: &TypeSig, graph: &str) {
        let decl = &mut self.engine.arena.get_mut(unit).decl;
        decl.doc = header(graph);
        decl.fields
            .push(FieldDecl::constant("top", top_ty.clone(), Visibility::Private));
        decl.constructors.push(ConstructorDecl {
            params: vec![Param::new("top", top_ty.clone())],
            visibility: Visibility::Public,
            body: vec![Stmt::Assign {
                target: Expr::This.field("top"),
                value: Expr::local("top"),
            }],
        });
    }

    /// `Builder` with one setter per constructor parameter and `build()`
    fn builder(&self, graph: &ScopeGraphDescriptor, top_ty: &TypeSig, params: &[TopParam]) -> UnitDecl {
        let name = self.engine.names.builder();
        let builder_ty = TypeSig::named(format!("{}.{name}", top_ty.raw_name()));

        let mut builder = UnitDecl::new(name, "", UnitKind::Builder);
        let declared_with_builder = self.engine.catalog.graphs().any(|parent| {
            parent
                .subgraphs
                .iter()
                .any(|subgraph| subgraph.graph == graph.name && subgraph.builder)
        });
        if declared_with_builder {
            builder.implements = Some(TypeSig::named(format!("{}.{name}", graph.name)));
        }

        for param in params {
            builder.fields.push(FieldDecl::memo(&param.name, param.ty.clone()));
            builder.methods.push(
                MethodDecl::new(&param.name, Some(builder_ty.clone()), Visibility::Public)
                    .param(&param.name, param.ty.clone())
                    .body(vec![
                        Stmt::Assign {
                            target: Expr::This.field(&param.name),
                            value: Expr::local(&param.name),
                        },
                        Stmt::Return(Expr::This),
                    ]),
            );
        }
        let args = params
            .iter()
            .map(|param| Expr::This.field(&param.name))
            .collect();
        builder.methods.push(
            MethodDecl::new("build", Some(top_ty.clone()), Visibility::Public)
                .body(vec![Stmt::Return(Expr::new_instance(top_ty.clone(), args))]),
        );
        builder
    }
}
