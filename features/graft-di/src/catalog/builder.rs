use std::collections::BTreeSet;

use graft_config::GraftConfig;

use super::{
    input::{
        CatalogInput, ClassDescriptor, ExternalTypeDescriptor, FactoryMemberDescriptor, MemberKind,
        ProviderGroupDescriptor, ScopeGraphDescriptor,
    },
    BindingCatalog,
};
use crate::{
    binding::{DependencyInfo, MemberRole, SourceKind, ValueShape},
    errors::{Diagnostic, Diagnostics},
    types::{BindingKey, Symbol, TypeSig, WrapperKind},
};

impl BindingCatalog {
    /// Walks every descriptor and registers the bindings they declare
    ///
    /// Faults are recorded in `diagnostics`, the returned catalog holds everything that was
    /// consistent.
    pub fn build(input: &CatalogInput, config: &GraftConfig, diagnostics: &mut Diagnostics) -> Self {
        let mut builder = CatalogBuilder {
            catalog: BindingCatalog {
                duplicate_policy: config.bindings.duplicate_policy,
                ..Default::default()
            },
            config,
            diagnostics,
        };

        builder.register_descriptors(input);
        builder.resolve_group_includes(input);
        builder.register_nested_graphs(input);

        let supplied: BTreeSet<String> = builder
            .catalog
            .graph_groups
            .values()
            .flatten()
            .cloned()
            .collect();
        for group in input
            .provider_groups
            .iter()
            .filter(|group| supplied.contains(&group.name))
        {
            builder.add_group(group);
        }
        for class in &input.classes {
            builder.add_class(class);
        }
        for graph in &input.scope_graphs {
            builder.add_graph(graph);
        }
        builder.collect_scope_markers(input);

        tracing::debug!(
            "Catalog holds {} unique, {} collection and {} optional keys",
            builder.catalog.unique.len(),
            builder.catalog.collections.len(),
            builder.catalog.optional_declarations.len()
        );
        builder.catalog
    }
}

struct CatalogBuilder<'a> {
    catalog: BindingCatalog,
    config: &'a GraftConfig,
    diagnostics: &'a mut Diagnostics,
}

impl CatalogBuilder<'_> {
    fn invalid(&mut self, message: String) {
        self.diagnostics.error(Diagnostic::InvalidCatalog(message));
    }

    fn register_descriptors(&mut self, input: &CatalogInput) {
        for group in &input.provider_groups {
            if self
                .catalog
                .groups
                .insert(group.name.clone(), group.clone())
                .is_some()
            {
                self.invalid(format!("provider group '{}' is declared twice", group.name));
            }
        }
        for class in &input.classes {
            if self
                .catalog
                .classes
                .insert(class.name.clone(), class.clone())
                .is_some()
            {
                self.invalid(format!("class '{}' is declared twice", class.name));
            }
        }
        for external in &input.external_types {
            if self
                .catalog
                .external_types
                .insert(external.name.clone(), external.clone())
                .is_some()
            {
                self.invalid(format!("external type '{}' is declared twice", external.name));
            }
        }
        for graph in &input.scope_graphs {
            if self
                .catalog
                .graphs
                .insert(graph.name.clone(), graph.clone())
                .is_some()
            {
                self.invalid(format!("scope graph '{}' is declared twice", graph.name));
            }
        }
        self.catalog.scope_aliases = input.scope_aliases.clone();
        self.catalog.scope_tree = input.scope_tree.clone();
    }

    /// Every group a graph is supplied, each once, in discovery order
    fn resolve_group_includes(&mut self, input: &CatalogInput) {
        for graph in &input.scope_graphs {
            let mut seen = BTreeSet::new();
            let mut ordered = Vec::new();
            let mut pending: Vec<String> = graph.provider_groups.iter().rev().cloned().collect();

            while let Some(name) = pending.pop() {
                if !seen.insert(name.clone()) {
                    continue;
                }
                let Some(group) = self.catalog.groups.get(&name) else {
                    self.invalid(format!(
                        "scope graph '{}' uses unknown provider group '{name}'",
                        graph.name
                    ));
                    continue;
                };
                pending.extend(
                    group
                        .includes
                        .iter()
                        .rev()
                        .filter(|include| !seen.contains(*include))
                        .cloned(),
                );
                ordered.push(name);
            }

            self.catalog.graph_groups.insert(graph.name.clone(), ordered);
        }
    }

    fn register_nested_graphs(&mut self, input: &CatalogInput) {
        for parent in &input.scope_graphs {
            for subgraph in &parent.subgraphs {
                if !self.catalog.graphs.contains_key(&subgraph.graph) {
                    self.invalid(format!(
                        "scope graph '{}' declares unknown nested graph '{}'",
                        parent.name, subgraph.graph
                    ));
                    continue;
                }
                match self.catalog.nested.get(&subgraph.graph) {
                    Some(existing) if existing != &parent.name => {
                        let message = format!(
                            "nested graph '{}' is declared by both '{existing}' and '{}'",
                            subgraph.graph, parent.name
                        );
                        self.invalid(message);
                    }
                    Some(_) => {}
                    None => {
                        self.catalog
                            .nested
                            .insert(subgraph.graph.clone(), parent.name.clone());
                    }
                }
            }
        }
    }

    fn add_group(&mut self, group: &ProviderGroupDescriptor) {
        let symbol = Symbol::new(&group.name, &group.boundary);
        for member in &group.members {
            self.add_member(&symbol, member);
        }
    }

    fn add_member(&mut self, symbol: &Symbol, member: &FactoryMemberDescriptor) {
        let provided = BindingKey::qualified(member.provides.clone(), member.qualifier.clone());
        let (key, shape, role) = match &member.kind {
            MemberKind::Provides => (provided, ValueShape::Unique, MemberRole::Factory),
            MemberKind::Binds => {
                if member.params.len() != 1 {
                    self.invalid(format!(
                        "alias '{symbol}.{}' must have exactly one parameter",
                        member.name
                    ));
                    return;
                }
                (provided, ValueShape::Unique, MemberRole::Alias)
            }
            MemberKind::IntoSet => (
                provided.with_type(TypeSig::wrap(WrapperKind::Set, member.provides.boxed())),
                ValueShape::CollectionElement,
                MemberRole::Factory,
            ),
            MemberKind::ElementsIntoSet => {
                if member.provides.wrapper() != Some(WrapperKind::Set) {
                    self.invalid(format!(
                        "'{symbol}.{}' contributes all elements but does not provide a Set",
                        member.name
                    ));
                    return;
                }
                (provided, ValueShape::CollectionAll, MemberRole::Factory)
            }
            MemberKind::IntoMap { map_key } => (
                provided.with_type(TypeSig::map_of(
                    map_key.ty.boxed(),
                    member.provides.boxed(),
                )),
                ValueShape::KeyedCollectionElement,
                MemberRole::Factory,
            ),
            MemberKind::BindsOptionalOf => (
                provided.with_type(TypeSig::wrap(WrapperKind::Optional, member.provides.boxed())),
                ValueShape::Unique,
                MemberRole::OptionalDeclaration,
            ),
            MemberKind::Multibinds => match member.provides.wrapper() {
                Some(WrapperKind::Set) => (
                    provided,
                    ValueShape::CollectionElement,
                    MemberRole::CollectionDeclaration,
                ),
                Some(WrapperKind::Map) => (
                    provided,
                    ValueShape::KeyedCollectionElement,
                    MemberRole::CollectionDeclaration,
                ),
                _ => {
                    self.invalid(format!(
                        "'{symbol}.{}' declares a collection but provides '{}'",
                        member.name, member.provides
                    ));
                    return;
                }
            },
        };

        let mut info = DependencyInfo::new(SourceKind::ProviderGroup, key.lookup_form(), symbol.clone());
        info.member = Some(member.name.clone());
        info.shape = shape;
        info.role = role;
        info.scope = member.scope.clone();
        info.is_static = member.is_static;
        if let MemberKind::IntoMap { map_key } = &member.kind {
            info.map_key = Some(map_key.clone());
        }
        if role != MemberRole::CollectionDeclaration && role != MemberRole::OptionalDeclaration {
            info.dependencies = member.params.iter().map(|param| param.key()).collect();
        }

        match role {
            MemberRole::OptionalDeclaration => self.add_optional(info),
            _ if shape.is_collection() => self.add_collection(info),
            _ => self.add_unique(info),
        }
    }

    fn add_class(&mut self, class: &ClassDescriptor) {
        let Some(constructor) = &class.constructor else {
            return;
        };

        let template = TypeSig::generic(
            class.name.clone(),
            class
                .type_params
                .iter()
                .map(|param| TypeSig::Var(param.clone()))
                .collect(),
        );
        let member_keys = match self.catalog.injected_member_keys(&template) {
            Ok(keys) => keys,
            Err(diagnostic) => {
                self.diagnostics.error(diagnostic);
                return;
            }
        };

        let mut info = DependencyInfo::new(
            SourceKind::InjectedClass,
            BindingKey::new(template),
            Symbol::new(&class.name, &class.boundary),
        );
        info.scope = class.scope.clone();
        info.dependencies = constructor
            .params
            .iter()
            .map(|param| {
                BindingKey::qualified(
                    param.ty.clone().bind_vars(&class.type_params),
                    param.qualifier.clone(),
                )
            })
            .chain(member_keys)
            .collect();

        self.catalog.class_bindings.insert(class.name.clone(), info);
    }

    fn add_graph(&mut self, graph: &ScopeGraphDescriptor) {
        let graph_symbol = Symbol::new(&graph.name, &graph.boundary);

        if self.catalog.parent_graph(&graph.name).is_none() {
            let mut itself =
                DependencyInfo::new(SourceKind::ScopeGraphItself, graph.key(), graph_symbol.clone());
            itself.owner_graph = Some(graph.name.clone());
            self.add_unique(itself);
        }

        for dependency in &graph.dependencies {
            let Some(external) = self.catalog.external_type(dependency).cloned() else {
                self.invalid(format!(
                    "scope graph '{}' depends on unknown type '{dependency}'",
                    graph.name
                ));
                continue;
            };
            self.add_external(graph, &external);
        }

        for instance in &graph.bound_instances {
            let mut info = DependencyInfo::new(
                SourceKind::BoundInstance,
                instance.key().lookup_form(),
                graph_symbol.clone(),
            );
            info.member = Some(instance.name.clone());
            info.owner_graph = Some(graph.name.clone());
            self.add_unique(info);
        }

        for subgraph in &graph.subgraphs {
            if !self.catalog.graphs.contains_key(&subgraph.graph) {
                continue;
            }
            let (source, ty) = if subgraph.builder {
                (
                    SourceKind::NestedGraphBuilder,
                    TypeSig::named(format!(
                        "{}.{}",
                        subgraph.graph, self.config.naming.builder_name
                    )),
                )
            } else {
                (SourceKind::NestedGraph, TypeSig::named(&subgraph.graph))
            };
            let mut info = DependencyInfo::new(source, BindingKey::new(ty), graph_symbol.clone());
            info.member = Some(subgraph.graph.clone());
            info.owner_graph = Some(graph.name.clone());
            self.add_unique(info);
        }
    }

    fn add_external(&mut self, graph: &ScopeGraphDescriptor, external: &ExternalTypeDescriptor) {
        let symbol = Symbol::new(&external.name, &external.boundary);

        let mut itself = DependencyInfo::new(
            SourceKind::ExternalItself,
            BindingKey::new(TypeSig::named(&external.name)),
            symbol.clone(),
        );
        itself.owner_graph = Some(graph.name.clone());
        self.add_unique(itself);

        for method in external.methods.iter().filter(|method| method.provides_binding()) {
            let Some(returns) = &method.returns else {
                continue;
            };
            let mut info = DependencyInfo::new(
                SourceKind::ExternalMethod,
                BindingKey::qualified(returns.clone(), method.qualifier.clone()).lookup_form(),
                symbol.clone(),
            );
            info.member = Some(method.name.clone());
            info.owner_graph = Some(graph.name.clone());
            self.add_unique(info);
        }
    }

    /// Records a unique-shaped candidate, merging repeated declarations
    ///
    /// Candidates of different scope graphs only compete where one node sees both, the
    /// duplicate policy is applied there.
    fn add_unique(&mut self, info: DependencyInfo) {
        let key = info.key.clone();

        if let Some(contributors) = self.catalog.collections.remove(&key) {
            if let Some(contributor) = contributors.first() {
                self.diagnostics.error(Diagnostic::DuplicateBinding {
                    key: key.clone(),
                    first: info.describe(),
                    second: contributor.describe(),
                });
            }
        }

        let candidates = self.catalog.unique.entry(key).or_default();
        if !candidates.iter().any(|existing| existing.same_declaration(&info)) {
            candidates.push(info);
        }
    }

    fn add_collection(&mut self, info: DependencyInfo) {
        if let Some(existing) = self.catalog.unique.get(&info.key).and_then(|candidates| candidates.first()) {
            self.diagnostics.error(Diagnostic::DuplicateBinding {
                key: info.key.clone(),
                first: existing.describe(),
                second: info.describe(),
            });
            return;
        }

        let contributors = self.catalog.collections.entry(info.key.clone()).or_default();
        if let Some(first) = contributors.first() {
            // Set and Map contributions can never share a key, only the shape kind may differ
            let keyed = |info: &DependencyInfo| info.shape == ValueShape::KeyedCollectionElement;
            if keyed(first) != keyed(&info) {
                let diagnostic = Diagnostic::DuplicateBinding {
                    key: info.key.clone(),
                    first: first.describe(),
                    second: info.describe(),
                };
                self.diagnostics.error(diagnostic);
                return;
            }
        }
        if !contributors.iter().any(|existing| existing.same_declaration(&info)) {
            contributors.push(info);
        }
    }

    fn add_optional(&mut self, info: DependencyInfo) {
        let declarations = self
            .catalog
            .optional_declarations
            .entry(info.key.clone())
            .or_default();
        if !declarations.iter().any(|existing| existing.same_declaration(&info)) {
            declarations.push(info);
        }
    }

    fn collect_scope_markers(&mut self, input: &CatalogInput) {
        let mut markers = BTreeSet::new();
        for graph in &input.scope_graphs {
            markers.extend(graph.scope_markers());
        }
        for group in &input.provider_groups {
            markers.extend(group.members.iter().filter_map(|member| member.scope.clone()));
        }
        for class in &input.classes {
            markers.extend(class.scope.clone());
        }
        for aliases in &input.scope_aliases {
            markers.extend(aliases.iter().cloned());
        }
        if !input.scope_tree.root.is_empty() {
            markers.insert(input.scope_tree.root.clone());
        }
        for (child, parent) in &input.scope_tree.parents {
            markers.insert(child.clone());
            markers.insert(parent.clone());
        }
        self.catalog.scope_markers = markers;
    }
}
