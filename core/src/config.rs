use crate::fixture::TestKind;
use crate::provider::ProviderOverrides;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("scanner command is empty")]
    EmptyScanner,
    #[error("failed to parse scanner command '{command}': {reason}")]
    InvalidScanner { command: String, reason: String },
}

/// Relative paths are resolved against `base_dir`; absolute paths are kept.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HarnessConfig {
    pub base_dir: PathBuf,
    pub dataset: PathBuf,
    pub positive_dir: PathBuf,
    pub negative_dir: PathBuf,
    pub output_dir: PathBuf,
    pub scanner: String,
    pub provider_overrides: ProviderOverrides,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from(".github/workflows/regression_tests"),
            dataset: PathBuf::from("datasets.json"),
            positive_dir: PathBuf::from("datasets/positive_tests"),
            negative_dir: PathBuf::from("datasets/negative_tests"),
            output_dir: PathBuf::from("."),
            scanner: "node lib/scan.js".to_string(),
            provider_overrides: ProviderOverrides::default(),
        }
    }
}

impl HarnessConfig {
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            ..Self::default()
        }
    }

    pub fn dataset_path(&self) -> PathBuf {
        self.resolve(&self.dataset)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.resolve(&self.output_dir)
    }

    pub fn input_dir(&self, kind: TestKind) -> PathBuf {
        match kind {
            TestKind::Positive => self.resolve(&self.positive_dir),
            TestKind::Negative => self.resolve(&self.negative_dir),
        }
    }

    pub fn input_path(&self, kind: TestKind, filename: &str) -> PathBuf {
        self.input_dir(kind).join(filename)
    }

    pub fn scanner_command(&self) -> Result<Vec<String>, ConfigError> {
        let parts =
            shell_words::split(&self.scanner).map_err(|err| ConfigError::InvalidScanner {
                command: self.scanner.clone(),
                reason: err.to_string(),
            })?;
        if parts.is_empty() {
            return Err(ConfigError::EmptyScanner);
        }
        Ok(parts)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }
}
