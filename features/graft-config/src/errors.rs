use std::path::PathBuf;

/// Errors when loading the compiler configuration
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// An explicitly requested config file does not exist
    #[error("Config file '{}' does not exist", .0.display())]
    FileMissing(PathBuf),
    /// One of the sources could not be read or deserialized
    #[error("Failed to extract configuration: {0}")]
    Extract(#[from] Box<figment::Error>),
    /// A value was read but is not acceptable
    #[error("Invalid value for '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl From<figment::Error> for ConfigError {
    fn from(error: figment::Error) -> Self {
        Self::Extract(Box::new(error))
    }
}
