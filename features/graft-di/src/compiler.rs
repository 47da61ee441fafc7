use graft_config::GraftConfig;

use crate::{
    catalog::{input::CatalogInput, BindingCatalog},
    closure::{BindingGraph, ClosureMode},
    codegen::{
        engine::{Engine, EngineStats},
        model::UnitDecl,
    },
    context::{CompilerContext, PartialAnalysis},
    dependency_graph::DependencyGraph,
    emitter::{EmitError, Emitter},
    errors::{CompileErrors, Diagnostic, Diagnostics, Warning},
    orchestrator::Orchestrator,
    scope::{ScopeAliases, ScopeAssignment, ScopeTree},
};

/// Counters of one compilation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompileStats {
    pub scope_nodes: usize,
    pub resolved_keys: usize,
    pub units: usize,
    pub generation: EngineStats,
}

/// Units of a successful compilation
#[derive(Debug, Clone)]
pub struct CompileOutput {
    /// Sorted by full name
    pub units: Vec<UnitDecl>,
    pub warnings: Vec<Warning>,
    pub stats: CompileStats,
}

impl CompileOutput {
    pub fn unit(&self, full_name: &str) -> Option<&UnitDecl> {
        self.units.iter().find(|unit| unit.full_name() == full_name)
    }

    /// Hands every unit to `emitter`, in order
    pub fn emit(&self, emitter: &mut impl Emitter) -> Result<(), EmitError> {
        emitter.emit_all(&self.units)
    }
}

/// Compiles catalogs into generated units
#[derive(Debug, Clone, Default)]
pub struct GraftCompiler {
    context: CompilerContext,
}

impl GraftCompiler {
    pub fn new(config: GraftConfig) -> Self {
        Self {
            context: CompilerContext::new(config),
        }
    }

    pub fn context(&self) -> &CompilerContext {
        &self.context
    }

    pub fn config(&self) -> &GraftConfig {
        self.context.config()
    }

    /// Runs the whole pipeline over every scope graph of `input`
    ///
    /// Every phase runs even after errors so one compilation reports every fault.
    pub fn compile(&self, input: &CatalogInput) -> Result<CompileOutput, CompileErrors> {
        let config = self.context.config();
        let mut diagnostics = Diagnostics::new();

        let catalog = BindingCatalog::build(input, config, &mut diagnostics);
        let aliases = ScopeAliases::build(&catalog, &config.scopes);
        let tree = ScopeTree::build(&catalog, &aliases, &mut diagnostics);
        let graph = BindingGraph::close(&catalog, &tree, ClosureMode::Full, &mut diagnostics);
        let assignment = ScopeAssignment::assign(&catalog, &graph, &tree, &aliases, &mut diagnostics);
        tracing::debug!(
            "Resolved {} key(s) over {} scope node(s)",
            graph.resolved_keys(),
            tree.nodes().len()
        );

        let cycles = DependencyGraph::new(&graph).check();
        for cycle in cycles {
            diagnostics.error(cycle);
        }

        let engine = Engine::new(config, &catalog, &graph, &tree, &assignment, &mut diagnostics);
        let (units, generation) = Orchestrator::new(engine).run();

        if diagnostics.has_errors() {
            let (errors, warnings) = diagnostics.into_parts();
            tracing::error!("Compilation failed with {} error(s)", errors.len());
            return Err(CompileErrors { errors, warnings });
        }

        let stats = CompileStats {
            scope_nodes: tree.nodes().len(),
            resolved_keys: graph.resolved_keys(),
            units: units.len(),
            generation,
        };
        tracing::info!(
            "Generated {} unit(s) with {} accessor(s)",
            stats.units,
            stats.generation.accessors
        );
        let (_, warnings) = diagnostics.into_parts();
        Ok(CompileOutput {
            units,
            warnings,
            stats,
        })
    }

    /// Parses a JSON catalog and compiles it
    pub fn compile_json(&self, json: &str) -> Result<CompileOutput, CompileErrors> {
        let input = CatalogInput::from_json(json).map_err(|error| CompileErrors {
            errors: vec![Diagnostic::InvalidCatalog(error.to_string())],
            warnings: Vec::new(),
        })?;
        self.compile(&input)
    }

    /// Closure of one scope graph on its own, memoised per graph name
    pub fn analyze_graph(&mut self, input: &CatalogInput, graph: &str) -> &PartialAnalysis {
        self.context.partial_or_insert_with(graph, |config| {
            tracing::debug!("Analysing scope graph '{graph}' on its own");
            let mut diagnostics = Diagnostics::new();
            let catalog = BindingCatalog::build(input, config, &mut diagnostics);
            if catalog.graph(graph).is_none() {
                diagnostics.error(Diagnostic::InvalidCatalog(format!(
                    "unknown scope graph '{graph}'"
                )));
                let (errors, _) = diagnostics.into_parts();
                return PartialAnalysis {
                    carve_outs: Default::default(),
                    errors,
                };
            }
            let aliases = ScopeAliases::build(&catalog, &config.scopes);
            let tree = ScopeTree::build(&catalog, &aliases, &mut diagnostics);
            let closure = BindingGraph::close(
                &catalog,
                &tree,
                ClosureMode::Partial {
                    graph: graph.to_string(),
                },
                &mut diagnostics,
            );
            let (errors, _) = diagnostics.into_parts();
            PartialAnalysis {
                carve_outs: closure.carve_outs().clone(),
                errors,
            }
        })
    }
}
