//! Output of generated units.

use thiserror::Error;

use crate::codegen::model::UnitDecl;

pub mod text;

pub use text::TextEmitter;

/// Receives the finished units of a compilation
pub trait Emitter {
    fn emit(&mut self, unit: &UnitDecl) -> Result<(), EmitError>;

    fn emit_all(&mut self, units: &[UnitDecl]) -> Result<(), EmitError> {
        for unit in units {
            self.emit(unit)?;
        }
        Ok(())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EmitError {
    /// Two units map to the same output
    #[error("Unit '{0}' has already been emitted")]
    DuplicateUnit(String),
}
