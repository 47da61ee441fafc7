//! On-demand generation of accessors into units.
//!
//! [engine::Engine::ensure] is the single entry point: it places a key, generates its accessor
//! once per unit through the strategy the key's resolution selects and returns a call to it.

use graft_config::NamingConfig;

use crate::{
    binding::DependencyInfo,
    placement::Boundary,
    types::{lower_first, mangle_name, BindingKey, TypeSig},
};

pub mod engine;
pub mod model;
pub mod multibind;
pub mod strategy;
pub mod unit;

/// Names of generated declarations
#[derive(Debug, Clone, Copy)]
pub struct Names<'c> {
    config: &'c NamingConfig,
}

impl<'c> Names<'c> {
    pub fn new(config: &'c NamingConfig) -> Self {
        Self { config }
    }

    pub fn accessor(&self, key: &BindingKey) -> String {
        format!("{}{}", self.config.accessor_prefix, key.mangled())
    }

    /// Private accessor computing a cached value
    pub fn unscoped(&self, key: &BindingKey) -> String {
        self.unscoped_of(&self.accessor(key))
    }

    pub fn unscoped_of(&self, accessor: &str) -> String {
        format!("{accessor}{}", self.config.unscoped_suffix)
    }

    pub fn memo_field(&self, key: &BindingKey) -> String {
        lower_first(&key.mangled())
    }

    pub fn partial(&self, key: &BindingKey) -> String {
        format!("{}{}", self.accessor(key), self.config.partial_suffix)
    }

    pub fn inject(&self, ty: &TypeSig) -> String {
        format!("{}{}", self.config.inject_prefix, ty.mangled())
    }

    pub fn contribution(&self, info: &DependencyInfo) -> String {
        let member = info.member.as_deref().unwrap_or("value");
        format!(
            "{}{}_{member}",
            self.config.contribution_prefix,
            mangle_name(&info.symbol.name)
        )
    }

    /// Field of a top-level unit holding a provider group or external dependency
    pub fn instance_field(type_name: &str) -> String {
        lower_first(&mangle_name(type_name))
    }

    /// Memo field of a cached contribution
    pub fn contribution_memo(&self, info: &DependencyInfo) -> String {
        let member = info.member.as_deref().unwrap_or("value");
        lower_first(&format!("{}_{member}", mangle_name(info.symbol.simple_name())))
    }

    pub fn top_level(&self, graph_simple_name: &str) -> String {
        format!("{}{graph_simple_name}", self.config.top_level_prefix)
    }

    pub fn unit(&self, top_level: &str) -> String {
        format!("{top_level}{}", self.config.unit_suffix)
    }

    pub fn aggregator(&self, top_level: &str) -> String {
        format!("{top_level}{}", self.config.aggregator_suffix)
    }

    pub fn builder(&self) -> &str {
        &self.config.builder_name
    }

    /// Getter on the top-level unit returning the unit of `boundary`
    pub fn unit_getter(&self, boundary: &Boundary) -> String {
        match boundary {
            Boundary::Package(package) => format!("unit_{}", mangle_name(package)),
            Boundary::Global => "collections".to_string(),
        }
    }
}
