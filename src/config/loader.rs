use crate::config::compile::{CompileError, RuleSet};
use crate::config::schema::{RuleFile, ValidationError};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Toml {
        path: Option<PathBuf>,
        source: toml_edit::de::Error,
    },
    Validation {
        path: Option<PathBuf>,
        source: ValidationError,
    },
    Compile {
        path: Option<PathBuf>,
        source: CompileError,
    },
}

impl ConfigError {
    fn with_path(self, path: &Path) -> Self {
        let path = path.to_path_buf();
        match self {
            ConfigError::Io { .. } => self,
            ConfigError::Toml { path: None, source } => ConfigError::Toml {
                path: Some(path),
                source,
            },
            ConfigError::Validation { path: None, source } => ConfigError::Validation {
                path: Some(path),
                source,
            },
            ConfigError::Compile { path: None, source } => ConfigError::Compile {
                path: Some(path),
                source,
            },
            other => other,
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(
                    f,
                    "failed to read rule file {}: {}",
                    path.display(),
                    source
                )
            }
            ConfigError::Toml { path, source } => match path {
                Some(path) => write!(
                    f,
                    "failed to parse rule file TOML ({}): {}",
                    path.display(),
                    source
                ),
                None => write!(f, "failed to parse rule file TOML: {}", source),
            },
            ConfigError::Validation { path, source } => match path {
                Some(path) => write!(f, "invalid rule file ({}):\n{}", path.display(), source),
                None => write!(f, "invalid rule file:\n{}", source),
            },
            ConfigError::Compile { path, source } => match path {
                Some(path) => write!(f, "cannot compile rule file ({}): {}", path.display(), source),
                None => write!(f, "cannot compile rule file: {}", source),
            },
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Toml { source, .. } => Some(source),
            ConfigError::Validation { source, .. } => Some(source),
            ConfigError::Compile { source, .. } => Some(source),
        }
    }
}

/// Parse and validate a rule file.
pub fn load_from_str(input: &str) -> Result<RuleFile, ConfigError> {
    let file: RuleFile = toml_edit::de::from_str(input)
        .map_err(|source| ConfigError::Toml { path: None, source })?;
    file.validate()
        .map_err(|source| ConfigError::Validation { path: None, source })?;
    Ok(file)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<RuleFile, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_from_str(&contents).map_err(|error| error.with_path(path))
}

/// Load, validate and compile a rule file.
pub fn compile_from_str(input: &str) -> Result<RuleSet, ConfigError> {
    load_from_str(input)?
        .compile()
        .map_err(|source| ConfigError::Compile { path: None, source })
}

pub fn compile_from_path(path: impl AsRef<Path>) -> Result<RuleSet, ConfigError> {
    let path = path.as_ref();
    load_from_path(path)?
        .compile()
        .map_err(|source| ConfigError::Compile {
            path: Some(path.to_path_buf()),
            source,
        })
}
