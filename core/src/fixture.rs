use crate::config::HarnessConfig;
use crate::provider::{balance_check_applies, Provider};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TestKind {
    Positive,
    Negative,
}

impl TestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestKind::Positive => "positive",
            TestKind::Negative => "negative",
        }
    }
}

impl fmt::Display for TestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} test", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Fixture {
    pub product: String,
    pub xpub: String,
    pub coin_ticker: String,
    pub filename: String,
    #[serde(default, deserialize_with = "deserialize_balance")]
    pub balance: Option<String>,
    #[serde(default)]
    pub test_types: Vec<TestKind>,
    #[serde(default)]
    pub simulated_discrepancy: Option<String>,
}

impl Fixture {
    pub fn discrepancy(&self) -> Option<&str> {
        self.simulated_discrepancy
            .as_deref()
            .filter(|text| !text.trim().is_empty())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DatasetEntry {
    Separator {
        #[serde(rename = "_separator_")]
        #[allow(dead_code)]
        separator: serde_json::Value,
    },
    Fixture(Fixture),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BalanceValue {
    Text(String),
    Number(serde_json::Number),
}

fn deserialize_balance<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<BalanceValue>::deserialize(deserializer)?;
    Ok(value.map(|balance| match balance {
        BalanceValue::Text(text) => text,
        BalanceValue::Number(number) => number.to_string(),
    }))
}

#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("failed to read dataset {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse dataset {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Reads the dataset file, dropping separator entries.
pub fn load_dataset(path: &Path) -> Result<Vec<Fixture>, DatasetError> {
    let content = fs::read_to_string(path).map_err(|source| DatasetError::Read {
        path: path.display().to_string(),
        source,
    })?;
    parse_dataset(&content).map_err(|source| DatasetError::Parse {
        path: path.display().to_string(),
        source,
    })
}

pub fn parse_dataset(content: &str) -> Result<Vec<Fixture>, serde_json::Error> {
    let entries: Vec<DatasetEntry> = serde_json::from_str(content)?;
    Ok(entries
        .into_iter()
        .filter_map(|entry| match entry {
            DatasetEntry::Separator { .. } => None,
            DatasetEntry::Fixture(fixture) => Some(fixture),
        })
        .collect())
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FixtureFilter {
    pub product: Option<String>,
    pub currency: Option<String>,
}

impl FixtureFilter {
    pub fn new(product: Option<String>, currency: Option<String>) -> Self {
        Self { product, currency }
    }

    pub fn matches(&self, fixture: &Fixture) -> bool {
        if let Some(product) = &self.product {
            if !normalize_product(&fixture.product).contains(&normalize_product(product)) {
                return false;
            }
        }
        if let Some(currency) = &self.currency {
            if !fixture.coin_ticker.contains(currency.as_str()) {
                return false;
            }
        }
        true
    }

    pub fn apply(&self, fixtures: &[Fixture]) -> Vec<Fixture> {
        fixtures
            .iter()
            .filter(|fixture| self.matches(fixture))
            .cloned()
            .collect()
    }
}

/// Lowercases and turns hyphens into spaces, so `xyz-wallet` equals `XYZ Wallet`.
pub fn normalize_product(name: &str) -> String {
    name.trim().to_lowercase().replace('-', " ")
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticLevel {
    Error,
    Warning,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub location: Option<String>,
    pub message: String,
}

impl Diagnostic {
    fn error(location: String, message: impl Into<String>) -> Self {
        Self {
            level: DiagnosticLevel::Error,
            location: Some(location),
            message: message.into(),
        }
    }

    fn warning(location: String, message: impl Into<String>) -> Self {
        Self {
            level: DiagnosticLevel::Warning,
            location: Some(location),
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.level, DiagnosticLevel::Error)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.level {
            DiagnosticLevel::Error => "error",
            DiagnosticLevel::Warning => "warn",
        };
        match &self.location {
            Some(location) => write!(f, "[{level}] {location}: {}", self.message),
            None => write!(f, "[{level}] {}", self.message),
        }
    }
}

pub fn validate_dataset(fixtures: &[Fixture], config: &HarnessConfig) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    for (index, fixture) in fixtures.iter().enumerate() {
        let location = format!(
            "#{} {} ({})",
            index + 1,
            fixture.product,
            fixture.coin_ticker
        );

        if fixture.test_types.is_empty() {
            diagnostics.push(Diagnostic::warning(
                location.clone(),
                "fixture declares no test types; it will never run",
            ));
        }

        let balance_checked = Provider::ALL
            .iter()
            .any(|provider| balance_check_applies(*provider, &fixture.coin_ticker));

        for kind in &fixture.test_types {
            let input: PathBuf = config.input_path(*kind, &fixture.filename);
            if !input.is_file() {
                diagnostics.push(Diagnostic::error(
                    location.clone(),
                    format!("{kind} input file {} does not exist", input.display()),
                ));
            }

            match kind {
                TestKind::Negative if fixture.discrepancy().is_none() => {
                    diagnostics.push(Diagnostic::error(
                        location.clone(),
                        "negative test requires a non-empty simulated_discrepancy",
                    ));
                }
                TestKind::Positive if fixture.balance.is_none() && balance_checked => {
                    diagnostics.push(Diagnostic::warning(
                        location.clone(),
                        "positive test has no balance; the balance check will be skipped",
                    ));
                }
                _ => {}
            }
        }
    }

    diagnostics
}
