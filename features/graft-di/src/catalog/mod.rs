//! The raw binding catalog: every declared way to satisfy a key, before closure.

use std::collections::{BTreeMap, BTreeSet};

use graft_config::DuplicatePolicy;

use crate::{
    binding::DependencyInfo,
    errors::Diagnostic,
    types::{BindingKey, TypeSig},
};

pub mod builder;
pub mod input;

use input::{
    ClassDescriptor, ExternalTypeDescriptor, ProviderGroupDescriptor, ScopeGraphDescriptor,
    ScopeTreeDescriptor,
};

/// Key to binding multimap plus the descriptors it was built from
///
/// Unique-shaped bindings are kept as candidates. Which candidate a key resolves to depends on
/// the scope node asking, so duplicates are settled by the closure.
#[derive(Debug, Clone, Default)]
pub struct BindingCatalog {
    pub(crate) unique: BTreeMap<BindingKey, Vec<DependencyInfo>>,
    pub(crate) collections: BTreeMap<BindingKey, Vec<DependencyInfo>>,
    /// Keyed by the `Optional<T>` key
    pub(crate) optional_declarations: BTreeMap<BindingKey, Vec<DependencyInfo>>,
    pub(crate) duplicate_policy: DuplicatePolicy,
    /// Constructor bindings by class name, type parameters left as variables
    pub(crate) class_bindings: BTreeMap<String, DependencyInfo>,
    pub(crate) classes: BTreeMap<String, ClassDescriptor>,
    pub(crate) groups: BTreeMap<String, ProviderGroupDescriptor>,
    pub(crate) external_types: BTreeMap<String, ExternalTypeDescriptor>,
    pub(crate) graphs: BTreeMap<String, ScopeGraphDescriptor>,
    /// Graph name to every provider group it is supplied, includes resolved
    pub(crate) graph_groups: BTreeMap<String, Vec<String>>,
    /// Nested graph name to the graph declaring it
    pub(crate) nested: BTreeMap<String, String>,
    pub(crate) scope_markers: BTreeSet<String>,
    pub(crate) scope_aliases: Vec<Vec<String>>,
    pub(crate) scope_tree: ScopeTreeDescriptor,
}

/// One class of an injection chain, specialised
#[derive(Debug, Clone)]
pub struct InjectionLayer<'c> {
    pub class: &'c ClassDescriptor,
    /// The class type with its type arguments
    pub ty: TypeSig,
    pub bindings: BTreeMap<String, TypeSig>,
}

impl InjectionLayer<'_> {
    /// Resolves a declared member type against this layer's specialisation
    pub fn specialise(&self, ty: &TypeSig) -> TypeSig {
        ty.clone()
            .bind_vars(&self.class.type_params)
            .substitute(&self.bindings)
    }

    pub fn field_keys(&self) -> impl Iterator<Item = BindingKey> + '_ {
        self.class
            .fields
            .iter()
            .map(|field| BindingKey::qualified(self.specialise(&field.ty), field.qualifier.clone()))
    }

    pub fn method_keys(&self) -> impl Iterator<Item = BindingKey> + '_ {
        self.class.methods.iter().flat_map(move |method| {
            method
                .params
                .iter()
                .map(|param| BindingKey::qualified(self.specialise(&param.ty), param.qualifier.clone()))
        })
    }

    /// Field keys, then method parameter keys
    pub fn member_keys(&self) -> Vec<BindingKey> {
        self.field_keys().chain(self.method_keys()).collect()
    }
}

impl BindingCatalog {
    /// Every unique-shaped binding of the key, in declaration order
    pub fn candidates(&self, key: &BindingKey) -> &[DependencyInfo] {
        self.unique
            .get(&key.lookup_form())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn collection(&self, key: &BindingKey) -> Option<&[DependencyInfo]> {
        self.collections.get(&key.lookup_form()).map(Vec::as_slice)
    }

    /// Declarations making `Optional<T>` requestable, looked up by the optional key
    pub fn optional_declarations(&self, key: &BindingKey) -> &[DependencyInfo] {
        self.optional_declarations
            .get(key)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn duplicate_policy(&self) -> DuplicatePolicy {
        self.duplicate_policy
    }

    pub fn class(&self, name: &str) -> Option<&ClassDescriptor> {
        self.classes.get(name)
    }

    pub fn class_binding(&self, name: &str) -> Option<&DependencyInfo> {
        self.class_bindings.get(name)
    }

    pub fn group(&self, name: &str) -> Option<&ProviderGroupDescriptor> {
        self.groups.get(name)
    }

    pub fn external_type(&self, name: &str) -> Option<&ExternalTypeDescriptor> {
        self.external_types.get(name)
    }

    pub fn graph(&self, name: &str) -> Option<&ScopeGraphDescriptor> {
        self.graphs.get(name)
    }

    pub fn graphs(&self) -> impl Iterator<Item = &ScopeGraphDescriptor> {
        self.graphs.values()
    }

    pub fn groups_of(&self, graph: &str) -> &[String] {
        self.graph_groups
            .get(graph)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// The graph declaring `graph` as nested, if any
    pub fn parent_graph(&self, graph: &str) -> Option<&str> {
        self.nested.get(graph).map(String::as_str)
    }

    pub fn scope_markers(&self) -> &BTreeSet<String> {
        &self.scope_markers
    }

    pub fn scope_aliases(&self) -> &[Vec<String>] {
        &self.scope_aliases
    }

    pub fn scope_tree(&self) -> &ScopeTreeDescriptor {
        &self.scope_tree
    }

    /// Whether any binding for the key is declared, regardless of shape
    pub fn declares(&self, key: &BindingKey) -> bool {
        let lookup = key.lookup_form();
        self.unique.contains_key(&lookup)
            || self.collections.contains_key(&lookup)
            || self.optional_declarations.contains_key(&lookup)
    }

    /// Class chain of `ty`, ancestors first
    ///
    /// Superclasses without a descriptor end the chain. Type arguments flow down through
    /// each `superclass` declaration, a raw generic type leaves its variables unbound.
    pub fn injection_chain(&self, ty: &TypeSig) -> Result<Vec<InjectionLayer<'_>>, Diagnostic> {
        let mut chain = Vec::new();
        let mut seen = BTreeSet::new();
        let mut current = Some(ty.clone());

        while let Some(ty) = current.take() {
            let Some(class) = self.classes.get(ty.raw_name()) else {
                break;
            };
            if !seen.insert(class.name.clone()) {
                return Err(Diagnostic::InvalidCatalog(format!(
                    "class '{}' inherits from itself",
                    class.name
                )));
            }

            let bindings = specialisation(class, &ty);
            let layer_ty = TypeSig::generic(
                class.name.clone(),
                class
                    .type_params
                    .iter()
                    .map(|param| TypeSig::Var(param.clone()).substitute(&bindings))
                    .collect(),
            );
            current = class.superclass.as_ref().map(|superclass| {
                superclass
                    .clone()
                    .bind_vars(&class.type_params)
                    .substitute(&bindings)
            });
            chain.push(InjectionLayer {
                class,
                ty: layer_ty,
                bindings,
            });
        }

        chain.reverse();
        Ok(chain)
    }

    /// Every member key injected into an existing `ty`, ancestors first
    pub fn injected_member_keys(&self, ty: &TypeSig) -> Result<Vec<BindingKey>, Diagnostic> {
        Ok(self
            .injection_chain(ty)?
            .iter()
            .flat_map(InjectionLayer::member_keys)
            .collect())
    }
}

/// Binds a class's type parameters to the arguments of `ty`
///
/// A raw use of a generic class binds nothing, its parameters stay variables.
pub fn specialisation(class: &ClassDescriptor, ty: &TypeSig) -> BTreeMap<String, TypeSig> {
    if ty.args().len() != class.type_params.len() {
        return BTreeMap::new();
    }
    class
        .type_params
        .iter()
        .cloned()
        .zip(ty.args().iter().cloned())
        .collect()
}
