//! Graft DI is the core of a compile-time dependency-injection compiler.
//!
//! It turns a catalog of binding declarations into generated classes that wire every dependency
//! without reflection at runtime.
//!
//! Graft DI is split into three major parts:
//! 1. Analysis: the binding catalog, the required-set closure and the scope assignment
//! 2. Generation: the engine placing and generating accessors on demand, driven per scope graph
//! 3. Emission: rendering the abstract code model into source text
//!
//! # Examples
//!
//! ```rust,no_run
//! use graft_config::GraftConfig;
//! use graft_di::{Emitter, GraftCompiler, TextEmitter};
//!
//! fn generate(catalog_json: &str) {
//!     let compiler = GraftCompiler::new(GraftConfig::default());
//!     let output = match compiler.compile_json(catalog_json) {
//!         Ok(output) => output,
//!         Err(e) => {
//!             eprintln!("{e}");
//!             return;
//!         }
//!     };
//!
//!     let mut emitter = TextEmitter::new();
//!     if let Err(e) = output.emit(&mut emitter) {
//!         eprintln!("{e}");
//!         return;
//!     }
//!     for (file, text) in emitter.files() {
//!         println!("// {file}\n{text}");
//!     }
//! }
//! ```
//!
//! Graft DI consists of the following components:
//!
//! 1. Types & Binding - type signatures, binding keys and binding declarations
//! 2. Catalog - every declaration indexed by key
//! 3. Closure - the keys the scope graphs need, resolved per scope node with the duplicate policy applied
//! 4. Scope - scope aliases, the scope tree and the node every key lives at
//! 5. Placement - the generated unit every accessor goes to
//! 6. Codegen - the generation engine and the code model
//! 7. Orchestrator - top-level units, their constructors and entry points
//! 8. Dependency Graph - for detecting dependency cycles
//! 9. Compiler & Context - the pipeline and its memoised analyses
//! 10. Emitter - output of generated units
//! 11. Errors & Logging - diagnostics and log output

pub mod binding;
pub mod catalog;
pub mod closure;
pub mod codegen;
pub mod compiler;
pub mod context;
pub mod dependency_graph;
pub mod emitter;
pub mod errors;
pub mod logging;
pub mod orchestrator;
pub mod placement;
pub mod scope;
pub mod types;

pub use binding::{DependencyInfo, SourceKind, ValueShape};
pub use catalog::{input::CatalogInput, BindingCatalog};
pub use closure::{BindingGraph, ClosureMode, Resolution};
pub use codegen::model::UnitDecl;
pub use compiler::{CompileOutput, CompileStats, GraftCompiler};
pub use context::{CompilerContext, PartialAnalysis};
pub use emitter::{EmitError, Emitter, TextEmitter};
pub use errors::{CompileErrors, Diagnostic, Warning};
pub use logging::init_logging;
pub use types::{BindingKey, TypeSig};
