//! Collection accessors.
//!
//! A collection is assembled in two steps. Each boundary contributing to it gets a partial
//! accessor, generated next to its contributors at the collection's node, and the global
//! aggregator unions the partials. Declaration-only contributors add nothing.

use std::collections::{BTreeMap, BTreeSet};

use super::{
    engine::{cached, holder, placeholder_body, Engine},
    model::{Declarations, Expr, MethodDecl, Stmt, Visibility},
    unit::{ContributionRef, Member, UnitId},
};
use crate::{
    binding::{DependencyInfo, ValueShape},
    closure::Resolution,
    errors::Diagnostic,
    placement::{Placement, UnitKey},
    types::{BindingKey, TypeSig, WrapperKind},
};

const RESULT: &str = "result";

impl Engine<'_> {
    /// Body of the aggregator of `key`, unioning one partial per contributing boundary
    pub(crate) fn aggregate(
        &mut self,
        key: &BindingKey,
        contributors: &[DependencyInfo],
        unit: UnitId,
    ) -> Vec<Stmt> {
        let keyed = key.wrapper() == Some(WrapperKind::Map);
        let node = self.arena.get(unit).node();
        let result = Expr::local(RESULT);
        let mut body = vec![new_collection(key, keyed)];

        for (boundary, infos) in self.by_boundary(key, contributors, keyed) {
            let placement = Placement::Unit(self.placement.partial(&boundary, node));
            let Some(partial) = self.arena.resolve(&placement, &self.names) else {
                continue;
            };
            let claimed = self
                .arena
                .claim(partial, Member::Partial(key.clone()), &self.names.partial(key));
            let name = claimed.name;
            if claimed.fresh {
                let partial_body = self.partial_body(key, &infos, partial, keyed);
                self.stats.partials += 1;
                self.arena.merge(
                    partial,
                    Declarations::method(
                        MethodDecl::new(&name, Some(key.ty.clone()), Visibility::Public).body(partial_body),
                    ),
                );
            }
            let call = self.route(unit, partial).call(name, Vec::new());
            let union = if keyed { "putAll" } else { "addAll" };
            body.push(Stmt::Expr(result.clone().call(union, vec![call])));
        }

        body.push(Stmt::Return(result));
        body
    }

    fn partial_body(
        &mut self,
        key: &BindingKey,
        infos: &[&DependencyInfo],
        unit: UnitId,
        keyed: bool,
    ) -> Vec<Stmt> {
        let result = Expr::local(RESULT);
        let mut body = vec![new_collection(key, keyed)];
        for info in infos {
            let value = self.contribution(key, info, unit);
            let added = match (&info.shape, &info.map_key) {
                (ValueShape::CollectionAll, _) => result.clone().call("addAll", vec![value]),
                (ValueShape::KeyedCollectionElement, Some(literal)) => result
                    .clone()
                    .call("put", vec![Expr::Literal(literal.value.clone()), value]),
                _ => result.clone().call("add", vec![value]),
            };
            body.push(Stmt::Expr(added));
        }
        body.push(Stmt::Return(result));
        body
    }

    /// Body of `Map<K, Provider<V>>` or `Map<K, Lazy<V>>` over the contributions of `inner`
    pub(crate) fn keyed_view(
        &mut self,
        key: &BindingKey,
        wrapper: WrapperKind,
        inner: &BindingKey,
        unit: UnitId,
    ) -> Vec<Stmt> {
        let graph = self.graph;
        let node = self.arena.get(unit).node();
        let Some(Resolution::Collection { contributors }) = graph.resolution(node, inner) else {
            return placeholder_body(key);
        };
        let Some(value_ty) = inner.ty.element().cloned() else {
            return placeholder_body(key);
        };

        let result = Expr::local(RESULT);
        let mut body = vec![new_collection(key, true)];
        for infos in self.by_boundary(inner, contributors, true).into_values() {
            for info in infos {
                let Some(literal) = &info.map_key else {
                    continue;
                };
                let value = self.contribution(inner, info, unit);
                let entry = holder(wrapper, value_ty.clone(), value);
                body.push(Stmt::Expr(result.clone().call(
                    "put",
                    vec![Expr::Literal(literal.value.clone()), entry],
                )));
            }
        }
        body.push(Stmt::Return(result));
        body
    }

    /// Makes sure the accessor of one contribution exists and returns a call to it from `from`
    fn contribution(&mut self, key: &BindingKey, info: &DependencyInfo, from: UnitId) -> Expr {
        let preferred = self.names.contribution(info);
        let contribution: ContributionRef = (info.symbol.name.clone(), info.member.clone());
        let from_node = self.arena.get(from).node();
        let node = self
            .assignment
            .contribution(from_node, key, info)
            .unwrap_or(from_node);

        let unit = if self.tree.is_ancestor_or_self(node, from_node) {
            let placement = Placement::Unit(UnitKey::package(&info.symbol.boundary, node));
            self.arena.resolve(&placement, &self.names)
        } else {
            self.diagnostics.error(Diagnostic::NotVisible {
                key: key.clone(),
                scope: self.tree.node(node).scope.clone(),
                from: self.tree.node(from_node).scope.clone(),
            });
            None
        };
        let Some(unit) = unit else {
            let claimed = self
                .arena
                .claim(from, Member::Contribution(contribution), &preferred);
            if claimed.fresh {
                let ty = contributed_type(key, info);
                self.arena.merge(
                    from,
                    Declarations::method(
                        MethodDecl::new(&claimed.name, Some(ty), Visibility::Public)
                            .body(placeholder_body(key)),
                    ),
                );
            }
            return Expr::This.call(claimed.name, Vec::new());
        };

        let claimed = self
            .arena
            .claim(unit, Member::Contribution(contribution.clone()), &preferred);
        let name = claimed.name;
        if claimed.fresh {
            let ty = contributed_type(key, info);
            let body = self.factory(info, unit);
            self.stats.contributions += 1;
            let declarations = if self.assignment.is_cached_contribution(key, info) {
                self.stats.cached += 1;
                let unscoped = self
                    .arena
                    .claim(
                        unit,
                        Member::ContributionUnscoped(contribution.clone()),
                        &self.names.unscoped_of(&name),
                    )
                    .name;
                let memo = self
                    .arena
                    .claim(
                        unit,
                        Member::ContributionMemo(contribution),
                        &self.names.contribution_memo(info),
                    )
                    .name;
                cached(&name, &unscoped, &memo, &ty, body)
            } else {
                Declarations::method(MethodDecl::new(&name, Some(ty), Visibility::Public).body(body))
            };
            self.arena.merge(unit, declarations);
        }
        self.route(from, unit).call(name, Vec::new())
    }

    /// Value contributors per boundary, dropping boundaries whose map keys collide
    fn by_boundary<'i>(
        &mut self,
        key: &BindingKey,
        contributors: &'i [DependencyInfo],
        keyed: bool,
    ) -> BTreeMap<String, Vec<&'i DependencyInfo>> {
        let mut boundaries: BTreeMap<String, Vec<&DependencyInfo>> = BTreeMap::new();
        for info in contributors.iter().filter(|info| info.contributes_value()) {
            boundaries
                .entry(info.symbol.boundary.clone())
                .or_default()
                .push(info);
        }
        for infos in boundaries.values_mut() {
            infos.sort_by(|a, b| (&a.symbol.name, &a.member).cmp(&(&b.symbol.name, &b.member)));
        }
        if !keyed {
            return boundaries;
        }

        let diagnostics = &mut *self.diagnostics;
        boundaries.retain(|boundary, infos| {
            let mut seen = BTreeSet::new();
            for literal in infos.iter().filter_map(|info| info.map_key.as_ref()) {
                if !seen.insert(&literal.value) {
                    diagnostics.error(Diagnostic::KeyedCollision {
                        key: key.clone(),
                        boundary: boundary.clone(),
                        literal: literal.value.clone(),
                    });
                    return false;
                }
            }
            true
        });
        boundaries
    }
}

/// `Set<T>` for whole-set contributions, otherwise the element or map value type
fn contributed_type(key: &BindingKey, info: &DependencyInfo) -> TypeSig {
    match info.shape {
        ValueShape::CollectionAll => key.ty.clone(),
        _ => key.ty.element().cloned().unwrap_or_else(|| key.ty.clone()),
    }
}

/// `result = new LinkedHashSet<..>()` or `new LinkedHashMap<..>()`, keeping contribution order
fn new_collection(key: &BindingKey, keyed: bool) -> Stmt {
    let implementation = if keyed {
        "java.util.LinkedHashMap"
    } else {
        "java.util.LinkedHashSet"
    };
    Stmt::Let {
        name: RESULT.to_string(),
        ty: key.ty.clone(),
        value: Expr::new_instance(TypeSig::generic(implementation, key.ty.args().to_vec()), Vec::new()),
    }
}
