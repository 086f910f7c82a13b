use crate::config::HarnessConfig;
use crate::fixture::{load_dataset, DatasetError, FixtureFilter, TestKind};
use crate::invoker::Scanner;
use crate::provider::Provider;
use crate::runner::{CaseOutcome, CaseRunner};
use comfy_table::{presets::ASCII_FULL, Table};
use serde::{Deserialize, Serialize};
use std::fmt;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

#[derive(Debug, thiserror::Error)]
pub enum CampaignError {
    #[error(transparent)]
    Dataset(#[from] DatasetError),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CampaignRequest {
    pub product: Option<String>,
    pub currency: Option<String>,
    pub provider: Option<Provider>,
}

impl CampaignRequest {
    pub fn filter(&self) -> FixtureFilter {
        FixtureFilter::new(self.product.clone(), self.currency.clone())
    }

    pub fn providers(&self) -> Vec<Provider> {
        match self.provider {
            Some(provider) => vec![provider],
            None => Provider::ALL.to_vec(),
        }
    }

    fn describe(&self) -> String {
        let product = self
            .product
            .as_deref()
            .map(str::to_uppercase)
            .unwrap_or_else(|| "ANY PRODUCT".to_string());
        let currency = self.currency.as_deref().unwrap_or("any currency");
        format!("{product} x {currency}")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignReport {
    pub started_at: String,
    pub providers: Vec<Provider>,
    pub cases: Vec<CaseOutcome>,
}

impl CampaignReport {
    /// The failing case is always the last one recorded.
    pub fn failure(&self) -> Option<&CaseOutcome> {
        self.cases.last().filter(|case| !case.passed)
    }

    pub fn passed(&self) -> bool {
        self.failure().is_none()
    }

    pub fn matched_nothing(&self) -> bool {
        self.cases.is_empty()
    }
}

impl fmt::Display for CampaignReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.cases.is_empty() {
            return writeln!(f, "No test cases executed.");
        }

        let mut table = Table::new();
        table.load_preset(ASCII_FULL);
        table.set_header(vec![
            "result", "provider", "product", "currency", "kind", "exit", "reports",
        ]);
        for case in &self.cases {
            table.add_row(vec![
                if case.passed { "PASS" } else { "FAIL" }.to_string(),
                case.provider.to_string(),
                case.product.clone(),
                case.currency.clone(),
                case.kind.as_str().to_string(),
                case.exit_code
                    .map(|code| code.to_string())
                    .unwrap_or_else(|| "-".to_string()),
                case.reason.clone(),
            ]);
        }
        writeln!(f, "{table}")?;

        let passed = self.cases.iter().filter(|case| case.passed).count();
        write!(f, "{passed}/{} test case(s) passed", self.cases.len())?;
        if self.failure().is_some() {
            write!(f, "; stopped at first failure")?;
        }
        writeln!(f)
    }
}

pub struct Campaign<S: Scanner> {
    config: HarnessConfig,
    scanner: S,
}

impl<S: Scanner> Campaign<S> {
    pub fn new(config: HarnessConfig, scanner: S) -> Self {
        Self { config, scanner }
    }

    pub fn run(&self, request: &CampaignRequest) -> Result<CampaignReport, CampaignError> {
        let mut report = CampaignReport {
            started_at: OffsetDateTime::now_utc()
                .format(&Rfc3339)
                .unwrap_or_else(|_| "unknown".to_string()),
            providers: request.providers(),
            cases: Vec::new(),
        };

        let filter = request.filter();
        let runner = CaseRunner::new(&self.config, &self.scanner);

        for provider in request.providers() {
            // the dataset is re-read on every pass
            let fixtures = filter.apply(&load_dataset(&self.config.dataset_path())?);

            for fixture in &fixtures {
                for kind in &fixture.test_types {
                    let outcome = match kind {
                        TestKind::Positive => runner.run_positive(fixture, provider),
                        TestKind::Negative => runner.run_negative(fixture, provider),
                    };
                    let passed = outcome.passed;
                    report.cases.push(outcome);
                    if !passed {
                        return Ok(report);
                    }
                }
            }
        }

        if report.matched_nothing() {
            println!("[info] No {} test [skipped]", request.describe());
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoker::{ScanError, ScanRequest};
    use std::cell::RefCell;
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    const DATASET: &str = r#"
[
  { "_separator_": "--- bitcoin ---" },
  { "product": "Alpha Wallet", "xpub": "xpubA", "coin_ticker": "BTC",
    "filename": "a.csv", "balance": "1", "test_types": ["positive"] },
  { "product": "Beta-Wallet", "xpub": "xpubB", "coin_ticker": "BTC",
    "filename": "b.csv", "balance": "2", "test_types": ["positive", "negative"],
    "simulated_discrepancy": "balance mismatch" },
  { "_separator_": "--- ethereum ---" },
  { "product": "Gamma Wallet", "xpub": "xpubG", "coin_ticker": "ETH",
    "filename": "g.csv", "balance": "3", "test_types": ["positive"] },
  { "product": "Delta Wallet", "xpub": "xpubD", "coin_ticker": "LTC",
    "filename": "d.csv", "balance": "4", "test_types": ["positive"] },
  { "product": "Epsilon Wallet", "xpub": "xpubE", "coin_ticker": "DOGE",
    "filename": "e.csv", "balance": "5", "test_types": ["positive"] }
]
"#;

    struct FakeScanner {
        failing: Vec<&'static str>,
        calls: RefCell<Vec<(String, Provider, Vec<String>)>>,
    }

    impl FakeScanner {
        fn new(failing: Vec<&'static str>) -> Self {
            Self {
                failing,
                calls: RefCell::new(Vec::new()),
            }
        }

        fn xpubs(&self) -> Vec<String> {
            self.calls
                .borrow()
                .iter()
                .map(|(xpub, _, _)| xpub.clone())
                .collect()
        }
    }

    impl Scanner for FakeScanner {
        fn scan(&self, request: &ScanRequest<'_>) -> Result<i32, ScanError> {
            let fixture = request.fixture;
            self.calls.borrow_mut().push((
                fixture.xpub.clone(),
                request.provider,
                request.arguments(),
            ));

            let negative = request
                .operations
                .to_string_lossy()
                .contains("negative_tests");
            let marker = fixture.simulated_discrepancy.clone().unwrap_or_default();
            let base = request.save_dir.join(&fixture.xpub);
            let html = format!("<html><body><p>{marker}</p></body></html>");
            let json = format!("{{\"diff\": \"{marker}\"}}");
            fs::write(base.with_extension("html"), html).map_err(ScanError::Output)?;
            fs::write(base.with_extension("json"), json).map_err(ScanError::Output)?;

            let broken = self.failing.contains(&fixture.xpub.as_str());
            Ok(match (negative, broken) {
                (true, _) => 1,
                (false, true) => 2,
                (false, false) => 0,
            })
        }
    }

    fn setup(temp: &TempDir) -> HarnessConfig {
        let config = HarnessConfig::with_base_dir(temp.path());
        write(&config.dataset_path(), DATASET);
        fs::create_dir_all(config.output_dir()).expect("output dir");
        config
    }

    fn write(path: &Path, content: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("parent dir");
        }
        fs::write(path, content).expect("file should be written");
    }

    #[test]
    fn runs_every_provider_in_order() {
        let temp = TempDir::new().expect("tempdir should be created");
        let campaign = Campaign::new(setup(&temp), FakeScanner::new(vec![]));

        let report = campaign
            .run(&CampaignRequest::default())
            .expect("campaign should run");

        assert!(report.passed());
        assert_eq!(report.cases.len(), 12);
        let providers: Vec<Provider> = report.cases.iter().map(|case| case.provider).collect();
        assert!(providers[..6].iter().all(|p| *p == Provider::Custom));
        assert!(providers[6..].iter().all(|p| *p == Provider::Default));
        assert_eq!(report.cases[2].kind, TestKind::Negative);
    }

    #[test]
    fn stops_at_first_failure() {
        let temp = TempDir::new().expect("tempdir should be created");
        let campaign = Campaign::new(setup(&temp), FakeScanner::new(vec!["xpubB"]));
        let request = CampaignRequest {
            provider: Some(Provider::Custom),
            ..CampaignRequest::default()
        };

        let report = campaign.run(&request).expect("campaign should run");

        assert!(!report.passed());
        assert_eq!(campaign.scanner.xpubs(), vec!["xpubA", "xpubB"]);
        let failure = report.failure().expect("failure recorded");
        assert_eq!(failure.xpub, "xpubB");
        assert_eq!(failure.exit_code, Some(2));
    }

    #[test]
    fn product_and_currency_filters_narrow_the_run() {
        let temp = TempDir::new().expect("tempdir should be created");
        let campaign = Campaign::new(setup(&temp), FakeScanner::new(vec![]));
        let request = CampaignRequest {
            product: Some("beta wallet".to_string()),
            currency: Some("BTC".to_string()),
            provider: Some(Provider::Default),
        };

        let report = campaign.run(&request).expect("campaign should run");

        assert!(report.passed());
        assert_eq!(campaign.scanner.xpubs(), vec!["xpubB", "xpubB"]);
        assert_eq!(report.providers, vec![Provider::Default]);
    }

    #[test]
    fn default_provider_skips_eth_balance_only() {
        let temp = TempDir::new().expect("tempdir should be created");
        let campaign = Campaign::new(setup(&temp), FakeScanner::new(vec![]));
        let request = CampaignRequest {
            provider: Some(Provider::Default),
            ..CampaignRequest::default()
        };

        campaign.run(&request).expect("campaign should run");

        for (xpub, provider, args) in campaign.scanner.calls.borrow().iter() {
            assert_eq!(*provider, Provider::Default);
            assert!(!args.contains(&"--custom-provider".to_string()));
            let checks_balance = args.contains(&"--balance".to_string());
            assert_eq!(checks_balance, xpub != "xpubG", "xpub {xpub}");
        }
    }

    #[test]
    fn unmatched_filter_runs_nothing() {
        let temp = TempDir::new().expect("tempdir should be created");
        let campaign = Campaign::new(setup(&temp), FakeScanner::new(vec![]));
        let request = CampaignRequest {
            product: Some("omega".to_string()),
            ..CampaignRequest::default()
        };

        let report = campaign.run(&request).expect("campaign should run");

        assert!(report.matched_nothing());
        assert!(report.passed());
        assert!(campaign.scanner.xpubs().is_empty());
        assert!(report.to_string().contains("No test cases executed."));
    }

    #[test]
    fn missing_dataset_is_an_error() {
        let temp = TempDir::new().expect("tempdir should be created");
        let mut config = HarnessConfig::with_base_dir(temp.path());
        config.dataset = PathBuf::from("nowhere.json");
        let campaign = Campaign::new(config, FakeScanner::new(vec![]));

        let err = campaign
            .run(&CampaignRequest::default())
            .expect_err("missing dataset should fail");
        assert!(matches!(err, CampaignError::Dataset(DatasetError::Read { .. })));
    }

    #[test]
    fn summary_table_lists_cases() {
        let temp = TempDir::new().expect("tempdir should be created");
        let campaign = Campaign::new(setup(&temp), FakeScanner::new(vec!["xpubA"]));

        let report = campaign
            .run(&CampaignRequest::default())
            .expect("campaign should run");
        let rendered = report.to_string();

        assert!(rendered.contains("FAIL"));
        assert!(rendered.contains("Alpha Wallet"));
        assert!(rendered.contains("0/1 test case(s) passed; stopped at first failure"));
    }
}
