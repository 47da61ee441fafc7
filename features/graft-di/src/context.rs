//! State shared by every compilation of one compiler.

use std::collections::{BTreeMap, BTreeSet};

use graft_config::GraftConfig;

use crate::{errors::Diagnostic, types::BindingKey};

/// What a scope graph needs on its own
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialAnalysis {
    /// Keys the graph expects its parent to supply
    pub carve_outs: BTreeSet<BindingKey>,
    pub errors: Vec<Diagnostic>,
}

impl PartialAnalysis {
    pub fn is_self_contained(&self) -> bool {
        self.carve_outs.is_empty()
    }
}

/// Configuration plus the memoised partial closures, keyed by scope graph name
#[derive(Debug, Clone, Default)]
pub struct CompilerContext {
    config: GraftConfig,
    partials: BTreeMap<String, PartialAnalysis>,
}

impl CompilerContext {
    pub fn new(config: GraftConfig) -> Self {
        Self {
            config,
            partials: BTreeMap::new(),
        }
    }

    pub fn config(&self) -> &GraftConfig {
        &self.config
    }

    pub fn partial(&self, graph: &str) -> Option<&PartialAnalysis> {
        self.partials.get(graph)
    }

    /// Analysis of `graph`, computed on first request
    pub fn partial_or_insert_with(
        &mut self,
        graph: &str,
        analyze: impl FnOnce(&GraftConfig) -> PartialAnalysis,
    ) -> &PartialAnalysis {
        let config = &self.config;
        self.partials
            .entry(graph.to_string())
            .or_insert_with(|| analyze(config))
    }

    /// Forgets every memoised analysis, e.g. after the catalog changed
    pub fn clear(&mut self) {
        self.partials.clear();
    }
}
