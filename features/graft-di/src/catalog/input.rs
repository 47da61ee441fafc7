//! Descriptors handed over by the front end.
//!
//! The front end turns source declarations into these typed descriptors; the compiler never
//! looks at source text itself. Everything is serde-deserializable so descriptors can be
//! exchanged as JSON.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    binding::MapKeyLiteral,
    types::{BindingKey, TypeSig},
};

/// Everything the compiler consumes
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogInput {
    pub provider_groups: Vec<ProviderGroupDescriptor>,
    pub classes: Vec<ClassDescriptor>,
    pub external_types: Vec<ExternalTypeDescriptor>,
    pub scope_graphs: Vec<ScopeGraphDescriptor>,
    pub scope_tree: ScopeTreeDescriptor,
    /// Extra sets of scope markers meaning the same scope
    pub scope_aliases: Vec<Vec<String>>,
}

impl CatalogInput {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

fn default_true() -> bool {
    true
}

/// A named collection of factory members
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderGroupDescriptor {
    pub name: String,
    pub boundary: String,
    /// Can be created with a no-argument constructor, otherwise it is a graph constructor parameter
    #[serde(default = "default_true")]
    pub default_constructible: bool,
    /// Other provider groups pulled in by this one
    #[serde(default)]
    pub includes: Vec<String>,
    #[serde(default)]
    pub members: Vec<FactoryMemberDescriptor>,
}

impl ProviderGroupDescriptor {
    /// Members only reachable through an instance of the group
    pub fn needs_instance(&self) -> bool {
        self.members
            .iter()
            .any(|member| !member.is_static && member.kind.produces_call())
    }
}

/// Markers on a factory member deciding the value shape
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberKind {
    /// Plain unique binding
    #[default]
    Provides,
    /// Contributes one element to `Set<T>`
    IntoSet,
    /// Contributes all elements of the returned `Set<T>`
    ElementsIntoSet,
    /// Contributes one entry to `Map<K, T>`
    IntoMap { map_key: MapKeyLiteral },
    /// Aliases the provided key to its single parameter
    Binds,
    /// Declares `Optional<T>` as requestable
    BindsOptionalOf,
    /// Declares a `Set` or `Map` which may have no contributions
    Multibinds,
}

impl MemberKind {
    /// Whether the generated code ever calls the member
    pub fn produces_call(&self) -> bool {
        matches!(
            self,
            Self::Provides | Self::IntoSet | Self::ElementsIntoSet | Self::IntoMap { .. }
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactoryMemberDescriptor {
    pub name: String,
    pub provides: TypeSig,
    #[serde(default)]
    pub qualifier: Option<String>,
    #[serde(default)]
    pub params: Vec<ParamDescriptor>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub kind: MemberKind,
    #[serde(default)]
    pub is_static: bool,
}

/// A parameter, field or method argument requesting a key
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeSig,
    #[serde(default)]
    pub qualifier: Option<String>,
}

impl ParamDescriptor {
    pub fn key(&self) -> BindingKey {
        BindingKey::qualified(self.ty.clone(), self.qualifier.clone())
    }
}

/// A class that may be constructed or member-injected
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassDescriptor {
    pub name: String,
    pub boundary: String,
    #[serde(default)]
    pub type_params: Vec<String>,
    /// Direct superclass, with type arguments expressed in this class's parameters
    #[serde(default)]
    pub superclass: Option<TypeSig>,
    /// The injection-marked constructor, `None` if the class has none
    #[serde(default)]
    pub constructor: Option<ConstructorDescriptor>,
    #[serde(default)]
    pub fields: Vec<ParamDescriptor>,
    #[serde(default)]
    pub methods: Vec<InjectedMethodDescriptor>,
    #[serde(default)]
    pub scope: Option<String>,
}

impl ClassDescriptor {
    pub fn has_injected_members(&self) -> bool {
        !self.fields.is_empty() || !self.methods.is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConstructorDescriptor {
    #[serde(default)]
    pub params: Vec<ParamDescriptor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InjectedMethodDescriptor {
    pub name: String,
    #[serde(default)]
    pub params: Vec<ParamDescriptor>,
}

/// A type whose instance is handed to a scope graph from outside
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalTypeDescriptor {
    pub name: String,
    pub boundary: String,
    #[serde(default)]
    pub methods: Vec<ExternalMethodDescriptor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalMethodDescriptor {
    pub name: String,
    /// `None` for void methods
    #[serde(default)]
    pub returns: Option<TypeSig>,
    #[serde(default)]
    pub qualifier: Option<String>,
    #[serde(default)]
    pub param_count: usize,
    #[serde(default = "default_true")]
    pub accessible: bool,
}

impl ExternalMethodDescriptor {
    /// Only zero-argument, non-void, accessible methods provide bindings
    pub fn provides_binding(&self) -> bool {
        self.returns.is_some() && self.param_count == 0 && self.accessible
    }
}

/// A scope graph interface
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopeGraphDescriptor {
    pub name: String,
    pub boundary: String,
    /// Scope markers, all equivalent to each other
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub provider_groups: Vec<String>,
    /// External dependency type names
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub bound_instances: Vec<ParamDescriptor>,
    #[serde(default)]
    pub provisions: Vec<ProvisionDescriptor>,
    #[serde(default)]
    pub injections: Vec<InjectionSiteDescriptor>,
    #[serde(default)]
    pub subgraphs: Vec<SubgraphDescriptor>,
}

impl ScopeGraphDescriptor {
    pub fn key(&self) -> BindingKey {
        BindingKey::new(TypeSig::named(&self.name))
    }

    pub fn simple_name(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }

    /// Scope markers, falling back to the graph name for graphs without one
    pub fn scope_markers(&self) -> Vec<String> {
        if self.scopes.is_empty() {
            vec![self.name.clone()]
        } else {
            self.scopes.clone()
        }
    }
}

/// `Foo foo();` on a scope graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeSig,
    #[serde(default)]
    pub qualifier: Option<String>,
}

impl ProvisionDescriptor {
    pub fn key(&self) -> BindingKey {
        BindingKey::qualified(self.ty.clone(), self.qualifier.clone())
    }
}

/// `void inject(Foo foo);` on a scope graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InjectionSiteDescriptor {
    pub name: String,
    pub target: TypeSig,
}

/// A nested scope graph (or its builder) created from this graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubgraphDescriptor {
    pub name: String,
    pub graph: String,
    #[serde(default)]
    pub builder: bool,
}

/// Child scope marker to parent scope marker, with one root
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScopeTreeDescriptor {
    pub root: String,
    pub parents: BTreeMap<String, String>,
}
