pub mod campaign;
pub mod config;
pub mod fixture;
pub mod invoker;
pub mod provider;
pub mod report;
pub mod runner;

pub use campaign::{Campaign, CampaignError, CampaignReport, CampaignRequest};
pub use config::{ConfigError, HarnessConfig};
pub use fixture::{
    load_dataset, normalize_product, parse_dataset, validate_dataset, DatasetError, Diagnostic,
    DiagnosticLevel, Fixture, FixtureFilter, TestKind,
};
pub use invoker::{ProcessScanner, ScanError, ScanRequest, Scanner};
pub use provider::{balance_check_applies, Provider, ProviderOverrides};
pub use report::{ReadResult, ReportCheck, ReportValidator};
pub use runner::{CaseOutcome, CaseRunner, StatusBlock};
