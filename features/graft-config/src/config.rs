use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

/// Settings steering a single compilation
///
/// Every section has defaults, so an empty TOML file (or no file at all) yields a usable config.
///
/// # Example
/// ```toml
/// [naming]
/// accessor_prefix = "get_"
///
/// [scopes]
/// non_caching_scope = "Reusable"
///
/// [placement]
/// generic_fallback = "graph_boundary"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraftConfig {
    pub naming: NamingConfig,
    pub scopes: ScopeConfig,
    pub placement: PlacementConfig,
    pub bindings: BindingConfig,
    pub logging: LoggingConfig,
}

impl GraftConfig {
    /// Checks values serde cannot check on its own
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.naming.validate()?;
        self.scopes.validate()?;
        self.logging.validate()
    }
}

/// Names used for generated declarations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingConfig {
    /// Prefix of every binding accessor, `provide_Foo`
    pub accessor_prefix: String,
    /// Suffix of the private accessor computing a cached value, `provide_Foo_unscoped`
    pub unscoped_suffix: String,
    /// Suffix of a per-boundary collection accessor
    pub partial_suffix: String,
    /// Prefix of member injection methods, `inject_Foo`
    pub inject_prefix: String,
    /// Prefix of a single collection contribution accessor
    pub contribution_prefix: String,
    /// Prefix of the top-level unit generated for a scope graph
    pub top_level_prefix: String,
    /// Suffix of a per-boundary generated unit
    pub unit_suffix: String,
    /// Suffix of the scope-wide collection aggregator unit
    pub aggregator_suffix: String,
    /// Name of the builder type nested in every top-level unit
    pub builder_name: String,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            accessor_prefix: "provide_".to_string(),
            unscoped_suffix: "_unscoped".to_string(),
            partial_suffix: "_partial".to_string(),
            inject_prefix: "inject_".to_string(),
            contribution_prefix: "contribute_".to_string(),
            top_level_prefix: "Graft".to_string(),
            unit_suffix: "Unit".to_string(),
            aggregator_suffix: "Collections".to_string(),
            builder_name: "Builder".to_string(),
        }
    }
}

impl NamingConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let identifiers = [
            ("naming.accessor_prefix", &self.accessor_prefix),
            ("naming.inject_prefix", &self.inject_prefix),
            ("naming.contribution_prefix", &self.contribution_prefix),
            ("naming.top_level_prefix", &self.top_level_prefix),
            ("naming.builder_name", &self.builder_name),
        ];
        for (field, value) in identifiers {
            if value.is_empty() {
                return Err(ConfigError::Invalid {
                    field,
                    reason: "must not be empty".to_string(),
                });
            }
            if !is_identifier_fragment(value) {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("'{value}' is not a valid identifier fragment"),
                });
            }
        }

        // Suffixes may be empty, but a cached accessor and its unscoped twin must not collide
        if self.unscoped_suffix.is_empty() {
            return Err(ConfigError::Invalid {
                field: "naming.unscoped_suffix",
                reason: "must not be empty".to_string(),
            });
        }
        for (field, value) in [
            ("naming.unscoped_suffix", &self.unscoped_suffix),
            ("naming.partial_suffix", &self.partial_suffix),
            ("naming.unit_suffix", &self.unit_suffix),
            ("naming.aggregator_suffix", &self.aggregator_suffix),
        ] {
            if !is_identifier_fragment(value) {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("'{value}' is not a valid identifier fragment"),
                });
            }
        }
        if self.unit_suffix == self.aggregator_suffix {
            return Err(ConfigError::Invalid {
                field: "naming.aggregator_suffix",
                reason: "must differ from naming.unit_suffix".to_string(),
            });
        }
        Ok(())
    }
}

fn is_identifier_fragment(value: &str) -> bool {
    value.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// Scope marker handling
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScopeConfig {
    /// Marker which never caches, bindings carrying it are treated as unscoped
    pub non_caching_scope: String,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            non_caching_scope: "Transient".to_string(),
        }
    }
}

impl ScopeConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.non_caching_scope.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "scopes.non_caching_scope",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

/// Where accessors without a declaring symbol are placed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenericFallback {
    /// Next to whoever requests it, the accessor may be duplicated across boundaries
    #[default]
    RequesterBoundary,
    /// In the boundary of the scope graph owning the binding, generated once
    GraphBoundary,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementConfig {
    pub generic_fallback: GenericFallback,
}

/// How duplicate unique bindings are treated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Higher source priority wins with a warning, equal priorities are an error
    #[default]
    Priority,
    /// Every duplicate is an error
    Strict,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BindingConfig {
    pub duplicate_policy: DuplicatePolicy,
}

/// Log output of the compiler itself
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `trace`, `debug`, `info`, `warn` or `error`
    pub level: String,
    /// Emit JSON lines instead of text
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

impl LoggingConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.level.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "logging.level",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}
