use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Custom,
    Default,
}

impl Provider {
    pub const ALL: [Provider; 2] = [Provider::Custom, Provider::Default];

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Custom => "custom",
            Provider::Default => "default",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// Removed from the scanner child only, never from the harness environment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct ProviderOverrides {
    removed_env: BTreeMap<Provider, Vec<String>>,
}

impl ProviderOverrides {
    pub fn none() -> Self {
        Self {
            removed_env: BTreeMap::new(),
        }
    }

    pub fn remove_env(mut self, provider: Provider, key: impl Into<String>) -> Self {
        self.removed_env
            .entry(provider)
            .or_default()
            .push(key.into());
        self
    }

    pub fn removed_env(&self, provider: Provider) -> &[String] {
        self.removed_env
            .get(&provider)
            .map(|keys| keys.as_slice())
            .unwrap_or(&[])
    }
}

impl Default for ProviderOverrides {
    fn default() -> Self {
        Self::none().remove_env(Provider::Default, "XPUB_SCAN_CUSTOM_API_KEY_V2")
    }
}

struct BalanceExemption {
    provider: Provider,
    currency: &'static str,
    reason: &'static str,
}

// Each row is a known upstream data-source gap, not a harness bug.
const BALANCE_EXEMPTIONS: &[BalanceExemption] = &[BalanceExemption {
    provider: Provider::Default,
    currency: "ETH",
    reason: "default provider rounds ETH balances (imported 1858515270441823, actual 1858515300000000)",
}];

pub fn balance_check_applies(provider: Provider, currency: &str) -> bool {
    balance_exemption_reason(provider, currency).is_none()
}

pub fn balance_exemption_reason(provider: Provider, currency: &str) -> Option<&'static str> {
    BALANCE_EXEMPTIONS
        .iter()
        .find(|row| row.provider == provider && row.currency == currency)
        .map(|row| row.reason)
}
