//! Config loading failures.

use camino::Utf8PathBuf;
use thiserror::Error;

/// Why the merged configuration could not be produced.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A file was found but its contents do not fit [`crate::Config`].
    #[error("invalid configuration: {0}")]
    Deserialize(#[from] Box<figment::Error>),

    /// A file passed with `--config` does not exist.
    #[error("configuration file {0} does not exist")]
    MissingFile(Utf8PathBuf),
}

/// Shorthand for config results.
pub type ConfigResult<T> = Result<T, ConfigError>;
