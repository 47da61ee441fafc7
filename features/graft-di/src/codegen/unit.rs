//! Arena of generated units, indexed by [UnitId].

use std::collections::{BTreeMap, BTreeSet};

use super::{
    model::{Declarations, UnitDecl, UnitKind},
    Names,
};
use crate::{
    placement::{Boundary, Placement, UnitKey},
    scope::NodeId,
    types::{BindingKey, TypeSig},
};

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct UnitId(usize);

/// Declaring group and member of a collection contribution
pub type ContributionRef = (String, Option<String>);

/// A generated member, identified by what it is for rather than by its name
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum Member {
    Accessor(BindingKey),
    /// Private accessor computing a cached value
    Unscoped(BindingKey),
    Memo(BindingKey),
    Partial(BindingKey),
    Inject(TypeSig),
    Contribution(ContributionRef),
    ContributionUnscoped(ContributionRef),
    ContributionMemo(ContributionRef),
    /// Declared by the scope graph, named exactly as declared
    EntryPoint(String),
    UnitGetter(Boundary),
    UnitField(Boundary),
    /// A field whose name other code relies on
    Field(String),
}

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
enum Namespace {
    Method,
    Field,
}

impl Member {
    fn namespace(&self) -> Namespace {
        match self {
            Self::Memo(_) | Self::ContributionMemo(_) | Self::UnitField(_) | Self::Field(_) => {
                Namespace::Field
            }
            _ => Namespace::Method,
        }
    }

    fn is_exact(&self) -> bool {
        matches!(self, Self::EntryPoint(_) | Self::Field(_))
    }
}

/// The name of a member, `fresh` the first time it is claimed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claimed {
    pub name: String,
    pub fresh: bool,
}

/// Getter and memo field on the top-level unit returning a unit of its node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Getter {
    pub method: String,
    pub field: String,
}

#[derive(Debug, Clone)]
pub struct Unit {
    pub placement: Placement,
    /// Package the unit is emitted into
    pub package: String,
    /// Top-level unit of the same node
    pub top: UnitId,
    /// `None` for top-level units
    pub getter: Option<Getter>,
    pub decl: UnitDecl,
    members: BTreeMap<Member, String>,
    taken: BTreeSet<(Namespace, String)>,
}

impl Unit {
    fn new(placement: Placement, package: String, top: UnitId, decl: UnitDecl) -> Self {
        Self {
            placement,
            package,
            top,
            getter: None,
            decl,
            members: BTreeMap::new(),
            taken: BTreeSet::new(),
        }
    }

    pub fn node(&self) -> NodeId {
        self.placement.node()
    }

    pub fn is_top_level(&self) -> bool {
        matches!(self.placement, Placement::TopLevel(_))
    }

    /// Name already given to `member`
    pub fn name_of(&self, member: &Member) -> Option<&str> {
        self.members.get(member).map(String::as_str)
    }

    /// Names `member` once, suffixing `_2`, `_3`, .. while `preferred` is taken by another member
    fn claim(&mut self, member: Member, preferred: &str) -> Claimed {
        if let Some(name) = self.members.get(&member) {
            return Claimed {
                name: name.clone(),
                fresh: false,
            };
        }
        let namespace = member.namespace();
        let mut name = preferred.to_string();
        if !member.is_exact() {
            let mut suffix = 2;
            while self.taken.contains(&(namespace, name.clone())) {
                name = format!("{preferred}_{suffix}");
                suffix += 1;
            }
        }
        self.taken.insert((namespace, name.clone()));
        self.members.insert(member, name.clone());
        Claimed { name, fresh: true }
    }
}

/// Units are created once and never recreated, top-level units first
#[derive(Debug, Clone, Default)]
pub struct UnitArena {
    units: Vec<Unit>,
    index: BTreeMap<Placement, UnitId>,
}

impl UnitArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_top(&mut self, node: NodeId, decl: UnitDecl) -> UnitId {
        let placement = Placement::TopLevel(node);
        if let Some(id) = self.index.get(&placement) {
            return *id;
        }
        let id = UnitId(self.units.len());
        let package = decl.package.clone();
        self.units
            .push(Unit::new(placement.clone(), package, id, decl));
        self.index.insert(placement, id);
        id
    }

    pub fn top_of(&self, node: NodeId) -> Option<UnitId> {
        self.index.get(&Placement::TopLevel(node)).copied()
    }

    /// The unit for `placement`, created on first use
    ///
    /// `None` if the node has no top-level unit.
    pub fn resolve(&mut self, placement: &Placement, names: &Names<'_>) -> Option<UnitId> {
        if let Some(id) = self.index.get(placement) {
            return Some(*id);
        }
        let Placement::Unit(key) = placement else {
            return None;
        };
        let top = self.top_of(key.node)?;
        Some(self.create(key, top, names))
    }

    fn create(&mut self, key: &UnitKey, top: UnitId, names: &Names<'_>) -> UnitId {
        let top_unit = &self.units[top.0].decl;
        let (name, package, kind) = match &key.boundary {
            Boundary::Package(package) => (
                names.unit(&top_unit.name),
                package.clone(),
                UnitKind::Boundary,
            ),
            Boundary::Global => (
                names.aggregator(&top_unit.name),
                top_unit.package.clone(),
                UnitKind::Aggregator,
            ),
        };
        tracing::trace!("Creating unit '{package}.{name}'");

        let preferred = names.unit_getter(&key.boundary);
        let getter = Getter {
            method: self
                .claim(top, Member::UnitGetter(key.boundary.clone()), &preferred)
                .name,
            field: self
                .claim(top, Member::UnitField(key.boundary.clone()), &preferred)
                .name,
        };

        let id = UnitId(self.units.len());
        let placement = Placement::Unit(key.clone());
        let mut unit = Unit::new(
            placement.clone(),
            package.clone(),
            top,
            UnitDecl::new(name, package, kind),
        );
        unit.getter = Some(getter);
        unit.claim(Member::Field("top".to_string()), "top");
        self.units.push(unit);
        self.index.insert(placement, id);
        id
    }

    /// Name of `member` in unit `id`, see [Unit::claim]
    pub fn claim(&mut self, id: UnitId, member: Member, preferred: &str) -> Claimed {
        self.units[id.0].claim(member, preferred)
    }

    pub fn merge(&mut self, id: UnitId, declarations: Declarations) {
        self.units[id.0].decl.merge(declarations);
    }

    pub fn get(&self, id: UnitId) -> &Unit {
        &self.units[id.0]
    }

    pub fn get_mut(&mut self, id: UnitId) -> &mut Unit {
        &mut self.units[id.0]
    }

    pub fn ids(&self) -> impl Iterator<Item = UnitId> {
        (0..self.units.len()).map(UnitId)
    }

    /// Units of a node other than its top-level unit, by placement
    pub fn units_at(&self, node: NodeId) -> Vec<UnitId> {
        self.index
            .iter()
            .filter(|(placement, _)| matches!(placement, Placement::Unit(key) if key.node == node))
            .map(|(_, id)| *id)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn into_units(self) -> Vec<Unit> {
        self.units
    }
}
