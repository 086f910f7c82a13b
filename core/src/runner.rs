use crate::config::HarnessConfig;
use crate::fixture::{Fixture, TestKind};
use crate::invoker::{ScanRequest, Scanner};
use crate::provider::Provider;
use crate::report::{ReportCheck, ReportValidator};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

const RULE_WIDTH: usize = 40;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CaseOutcome {
    pub product: String,
    pub xpub: String,
    pub currency: String,
    pub kind: TestKind,
    pub provider: Provider,
    pub exit_code: Option<i32>,
    pub reason: String,
    pub simulated_discrepancy: Option<String>,
    pub passed: bool,
    pub started_at: String,
    pub duration_ms: u128,
}

pub struct CaseRunner<'a, S: Scanner + ?Sized> {
    config: &'a HarnessConfig,
    scanner: &'a S,
    validator: ReportValidator,
}

impl<'a, S: Scanner + ?Sized> CaseRunner<'a, S> {
    pub fn new(config: &'a HarnessConfig, scanner: &'a S) -> Self {
        Self {
            config,
            scanner,
            validator: ReportValidator::new(config.output_dir()),
        }
    }

    pub fn run_positive(&self, fixture: &Fixture, provider: Provider) -> CaseOutcome {
        self.run(fixture, TestKind::Positive, provider)
    }

    pub fn run_negative(&self, fixture: &Fixture, provider: Provider) -> CaseOutcome {
        self.run(fixture, TestKind::Negative, provider)
    }

    pub fn run(&self, fixture: &Fixture, kind: TestKind, provider: Provider) -> CaseOutcome {
        println!("{}", StatusBlock::starting(fixture, kind, provider));

        let started_at = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_else(|_| "unknown".to_string());
        let timer = Instant::now();

        let discrepancy = match kind {
            TestKind::Positive => None,
            TestKind::Negative => fixture.discrepancy(),
        };

        let (exit_code, check) = if kind == TestKind::Negative && discrepancy.is_none() {
            (
                None,
                ReportCheck::failed("negative fixture declares no simulated discrepancy"),
            )
        } else {
            self.scan_and_check(fixture, kind, provider, discrepancy)
        };

        let passed = check.success
            && match (kind, exit_code) {
                (TestKind::Positive, Some(code)) => code == 0,
                (TestKind::Negative, Some(code)) => code != 0,
                (_, None) => false,
            };

        let outcome = CaseOutcome {
            product: fixture.product.clone(),
            xpub: fixture.xpub.clone(),
            currency: fixture.coin_ticker.clone(),
            kind,
            provider,
            exit_code,
            reason: check.reason,
            simulated_discrepancy: discrepancy.map(str::to_string),
            passed,
            started_at,
            duration_ms: timer.elapsed().as_millis(),
        };

        println!("{}", StatusBlock::finished(&outcome));
        outcome
    }

    fn scan_and_check(
        &self,
        fixture: &Fixture,
        kind: TestKind,
        provider: Provider,
        discrepancy: Option<&str>,
    ) -> (Option<i32>, ReportCheck) {
        let request = ScanRequest::new(
            fixture,
            self.config.input_path(kind, &fixture.filename),
            provider,
            self.config.output_dir(),
        );

        match self.scanner.scan(&request) {
            Ok(code) => (
                Some(code),
                self.validator.validate(&fixture.xpub, discrepancy),
            ),
            Err(err) => (None, ReportCheck::failed(err.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StatusBlock<'a> {
    product: &'a str,
    kind: TestKind,
    provider: Provider,
    verdict: Option<bool>,
    reason: Option<&'a str>,
    discrepancy: Option<&'a str>,
}

impl<'a> StatusBlock<'a> {
    pub fn starting(fixture: &'a Fixture, kind: TestKind, provider: Provider) -> Self {
        Self {
            product: &fixture.product,
            kind,
            provider,
            verdict: None,
            reason: None,
            discrepancy: None,
        }
    }

    pub fn finished(outcome: &'a CaseOutcome) -> Self {
        Self {
            product: &outcome.product,
            kind: outcome.kind,
            provider: outcome.provider,
            verdict: Some(outcome.passed),
            reason: Some(&outcome.reason),
            discrepancy: outcome.simulated_discrepancy.as_deref(),
        }
    }
}

impl fmt::Display for StatusBlock<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let header = if self.verdict.is_some() {
            "Test result"
        } else {
            "Current test"
        };
        let rule = "=".repeat(RULE_WIDTH);

        writeln!(f)?;
        writeln!(f, "{rule} {header} {rule}")?;
        if let Some(passed) = self.verdict {
            write!(f, "{} — ", if passed { "PASS" } else { "FAIL" })?;
        }
        writeln!(
            f,
            "{} - {} provider - ({})",
            self.product, self.provider, self.kind
        )?;
        if let Some(reason) = self.reason {
            writeln!(f, "Xpub Scan HTML+JSON reports status: {reason}")?;
        }
        if let Some(discrepancy) = self.discrepancy {
            writeln!(f, "Simulated discrepancy: `{discrepancy}`")?;
        }
        writeln!(f, "{}", "=".repeat(2 * RULE_WIDTH + 2 + header.len()))
    }
}
