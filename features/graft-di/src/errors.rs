use thiserror::Error;

use crate::types::{BindingKey, TypeSig};

/// A fault found while compiling, never aborts the pass
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// Nothing binds the key and nothing could be synthesized
    #[error("'{key}' cannot be resolved, required by {}", join_keys(.requested_by))]
    UnresolvedKey {
        key: BindingKey,
        requested_by: Vec<BindingKey>,
    },
    /// Two unique bindings the priority order cannot settle
    #[error("'{key}' is bound more than once: {first} and {second}")]
    DuplicateBinding {
        key: BindingKey,
        first: String,
        second: String,
    },
    /// A dependency still carries type variables after specialisation
    #[error("'{key}' needs '{dependency}' which still has unspecialised type variables")]
    UnsupportedGeneric { key: BindingKey, dependency: TypeSig },
    /// Two contributions of one boundary use the same map key
    #[error("Map key {literal} of '{key}' is contributed twice in boundary '{boundary}'")]
    KeyedCollision {
        key: BindingKey,
        boundary: String,
        literal: String,
    },
    /// The key cannot be assigned to a scope node
    #[error("'{key}' has no scope to live in: {reason}")]
    MissingScope { key: BindingKey, reason: String },
    /// A consumer uses a key living in a scope it cannot see
    #[error("'{key}' lives in scope '{scope}' which is not visible from scope '{from}'")]
    NotVisible {
        key: BindingKey,
        scope: String,
        from: String,
    },
    /// Eager dependencies form a cycle
    #[error("A dependency cycle exists between '{from}' and '{to}' through [{}] - Consider using `Provider` or `Lazy`", join_keys(.chain))]
    DependencyCycle {
        from: BindingKey,
        to: BindingKey,
        chain: Vec<BindingKey>,
    },
    /// The descriptors contradict themselves
    #[error("Invalid catalog: {0}")]
    InvalidCatalog(String),
}

fn join_keys(keys: &[BindingKey]) -> String {
    if keys.is_empty() {
        return "an entry point".to_string();
    }
    keys.iter()
        .map(|key| format!("'{key}'"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// A fault the compiler settled on its own
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// A duplicate unique binding was dropped in favour of a higher priority one
    #[error("'{key}' is bound more than once, keeping {kept} over {dropped}")]
    DuplicateOrdered {
        key: BindingKey,
        kept: String,
        dropped: String,
    },
}

/// Accumulates diagnostics over one pass
///
/// Identical errors are only recorded once, the order of first occurrence is kept.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    errors: Vec<Diagnostic>,
    warnings: Vec<Warning>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&mut self, diagnostic: Diagnostic) {
        if !self.errors.contains(&diagnostic) {
            tracing::debug!("Recorded error: {diagnostic}");
            self.errors.push(diagnostic);
        }
    }

    pub fn warn(&mut self, warning: Warning) {
        if !self.warnings.contains(&warning) {
            tracing::warn!("{warning}");
            self.warnings.push(warning);
        }
    }

    pub fn errors(&self) -> &[Diagnostic] {
        &self.errors
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn into_parts(self) -> (Vec<Diagnostic>, Vec<Warning>) {
        (self.errors, self.warnings)
    }
}

/// Every error of a failed compilation
#[derive(Error, Debug, Clone)]
pub struct CompileErrors {
    pub errors: Vec<Diagnostic>,
    pub warnings: Vec<Warning>,
}

impl std::fmt::Display for CompileErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut display = Vec::new();
        display.push(format!(
            "The binding graph had {} error(s):",
            self.errors.len()
        ));
        for error in &self.errors {
            display.push(format!("- {error}"));
        }
        f.write_str(&display.join("\n"))
    }
}
