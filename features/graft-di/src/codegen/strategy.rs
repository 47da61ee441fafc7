use crate::{
    binding::{MemberRole, SourceKind},
    closure::Resolution,
    types::WrapperKind,
};

/// How an accessor body is generated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Calls a provider group member
    Factory,
    /// Forwards to the aliased key
    Alias,
    /// Calls the injected constructor, then injects members
    Construct,
    /// Calls a method on an external dependency
    ReadExternal,
    /// Reads a field of the top-level unit
    ReadTopField,
    /// Returns the top-level unit itself
    TopItself,
    /// Creates a nested top-level unit
    NestedGraph,
    /// Creates the builder of a nested top-level unit
    NestedBuilder,
    /// `Provider` holder
    Deferred,
    /// `Lazy` holder, memoised inside the holder
    Memoized,
    /// `MembersInjector` holder
    Injector,
    Optional,
    /// Primitive forwarding to its boxed accessor
    Unbox,
    /// Unions per-boundary partial collections
    Aggregate,
    /// Map of wrapped contributions
    KeyedView,
    /// Throws, for keys that could not be resolved
    Placeholder,
}

/// The strategy table
pub fn select(resolution: Option<&Resolution>) -> Strategy {
    let Some(resolution) = resolution else {
        return Strategy::Placeholder;
    };
    match resolution {
        Resolution::Unique(info) => match info.source {
            SourceKind::ProviderGroup if info.role == MemberRole::Alias => Strategy::Alias,
            SourceKind::ProviderGroup => Strategy::Factory,
            SourceKind::InjectedClass => Strategy::Construct,
            SourceKind::DelegatingInjector => Strategy::Injector,
            SourceKind::ExternalMethod => Strategy::ReadExternal,
            SourceKind::ExternalItself | SourceKind::BoundInstance => Strategy::ReadTopField,
            SourceKind::ScopeGraphItself => Strategy::TopItself,
            SourceKind::NestedGraph => Strategy::NestedGraph,
            SourceKind::NestedGraphBuilder => Strategy::NestedBuilder,
        },
        Resolution::Wrapper {
            kind: WrapperKind::Lazy,
            ..
        } => Strategy::Memoized,
        Resolution::Wrapper { .. } => Strategy::Deferred,
        Resolution::Collection { .. } => Strategy::Aggregate,
        Resolution::KeyedView { .. } => Strategy::KeyedView,
        Resolution::Optional { .. } => Strategy::Optional,
        Resolution::Boxed { .. } => Strategy::Unbox,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        binding::DependencyInfo,
        types::{BindingKey, Symbol},
    };

    fn unique(source: SourceKind, role: MemberRole) -> Resolution {
        let mut info = DependencyInfo::new(source, BindingKey::of("Foo").unwrap(), Symbol::new("a.P", "a"));
        info.role = role;
        Resolution::Unique(info)
    }

    #[test]
    fn selects_by_source_and_role() {
        assert_eq!(
            select(Some(&unique(SourceKind::ProviderGroup, MemberRole::Factory))),
            Strategy::Factory
        );
        assert_eq!(
            select(Some(&unique(SourceKind::ProviderGroup, MemberRole::Alias))),
            Strategy::Alias
        );
        assert_eq!(
            select(Some(&unique(SourceKind::BoundInstance, MemberRole::Factory))),
            Strategy::ReadTopField
        );
        assert_eq!(select(None), Strategy::Placeholder);
    }

    #[test]
    fn wrappers_pick_their_holder() {
        let inner = BindingKey::of("Foo").unwrap();
        assert_eq!(
            select(Some(&Resolution::Wrapper {
                kind: WrapperKind::Lazy,
                inner: inner.clone()
            })),
            Strategy::Memoized
        );
        assert_eq!(
            select(Some(&Resolution::Wrapper {
                kind: WrapperKind::Provider,
                inner
            })),
            Strategy::Deferred
        );
    }
}
