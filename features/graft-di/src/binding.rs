use std::{collections::BTreeSet, fmt};

use serde::{Deserialize, Serialize};

use crate::types::{BindingKey, Symbol, TypeSig};

/// Where a binding comes from
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SourceKind {
    /// A factory member of a provider group
    ProviderGroup,
    /// A class with an injection-marked constructor
    InjectedClass,
    /// A `MembersInjector<T>` delegating to the inject method of `T`
    DelegatingInjector,
    /// A zero-argument method of an external dependency
    ExternalMethod,
    /// The external dependency instance itself
    ExternalItself,
    /// A value handed to the scope graph builder
    BoundInstance,
    /// A scope graph requesting its own interface
    ScopeGraphItself,
    /// A nested scope graph created from its parent
    NestedGraph,
    /// The builder of a nested scope graph
    NestedGraphBuilder,
}

impl SourceKind {
    /// Priority used to settle duplicate unique bindings, higher wins
    pub fn priority(self) -> u8 {
        match self {
            Self::ProviderGroup => 3,
            Self::ExternalMethod | Self::ExternalItself => 2,
            Self::BoundInstance => 1,
            _ => 0,
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::ProviderGroup => "provider group member",
            Self::InjectedClass => "injected constructor",
            Self::DelegatingInjector => "members injector",
            Self::ExternalMethod => "external dependency method",
            Self::ExternalItself => "external dependency",
            Self::BoundInstance => "bound instance",
            Self::ScopeGraphItself => "scope graph",
            Self::NestedGraph => "nested scope graph",
            Self::NestedGraphBuilder => "nested scope graph builder",
        };
        f.write_str(text)
    }
}

/// How many values a binding contributes to its key
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ValueShape {
    /// The only binding of its key
    Unique,
    /// One element of a `Set`
    CollectionElement,
    /// A whole `Set` merged into the collection
    CollectionAll,
    /// One entry of a `Map`
    KeyedCollectionElement,
}

impl ValueShape {
    pub fn is_collection(self) -> bool {
        !matches!(self, Self::Unique)
    }
}

/// What a provider group member declares besides its shape
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MemberRole {
    /// Computes a value
    Factory,
    /// Forwards to its single dependency
    Alias,
    /// Declares `Optional<T>` as requestable, contributes nothing by itself
    OptionalDeclaration,
    /// Declares a collection as possibly empty, contributes no element
    CollectionDeclaration,
}

/// Literal keying a map contribution
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MapKeyLiteral {
    pub ty: TypeSig,
    /// Source text of the literal, `"json"`, `42`, `Kind.A`
    pub value: String,
}

impl fmt::Display for MapKeyLiteral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

/// One way to satisfy a [BindingKey]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyInfo {
    pub source: SourceKind,
    /// The key this binding satisfies
    pub key: BindingKey,
    /// Keys needed to produce the value, in parameter order
    pub dependencies: Vec<BindingKey>,
    /// Declaring symbol: the provider group, class, external type or scope graph
    pub symbol: Symbol,
    /// Factory member or method name, if any
    pub member: Option<String>,
    pub shape: ValueShape,
    /// Scope marker as declared, not yet condensed
    pub scope: Option<String>,
    pub role: MemberRole,
    pub map_key: Option<MapKeyLiteral>,
    /// Member can be called without a provider group instance
    pub is_static: bool,
    /// Scope graph declaring the binding, for external dependencies, bound instances and graphs
    pub owner_graph: Option<String>,
}

impl DependencyInfo {
    pub fn new(source: SourceKind, key: BindingKey, symbol: Symbol) -> Self {
        Self {
            source,
            key,
            dependencies: Vec::new(),
            symbol,
            member: None,
            shape: ValueShape::Unique,
            scope: None,
            role: MemberRole::Factory,
            map_key: None,
            is_static: false,
            owner_graph: None,
        }
    }

    pub fn priority(&self) -> u8 {
        self.source.priority()
    }

    pub fn dependency_set(&self) -> BTreeSet<&BindingKey> {
        self.dependencies.iter().collect()
    }

    /// Whether this binding produces a value for its collection
    pub fn contributes_value(&self) -> bool {
        self.role != MemberRole::CollectionDeclaration
    }

    /// Same declaration seen twice, e.g. a provider group included by two paths
    pub fn same_declaration(&self, other: &DependencyInfo) -> bool {
        self.source == other.source
            && self.symbol == other.symbol
            && self.member == other.member
            && self.owner_graph == other.owner_graph
    }

    /// `group.member` or the symbol name, for messages
    pub fn describe(&self) -> String {
        match &self.member {
            Some(member) => format!("{} '{}.{}'", self.source, self.symbol, member),
            None => format!("{} '{}'", self.source, self.symbol),
        }
    }
}
