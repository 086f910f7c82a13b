use anyhow::Context;
use clap::{Parser, ValueEnum};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use xpub_regress_core::{
    load_dataset, validate_dataset, Campaign, CampaignReport, CampaignRequest, Diagnostic,
    HarnessConfig, ProcessScanner, Provider,
};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Run the xpub scanner regression dataset (positive and negative fixtures)"
)]
struct RegressCli {
    /// Only run fixtures whose product contains this text (`xyz-wallet` matches `XYZ Wallet`)
    product: Option<String>,
    /// Only run fixtures whose currency ticker contains this text
    currency: Option<String>,
    /// Only run this provider (both run, custom first, when omitted)
    #[arg(value_enum)]
    provider: Option<ProviderArg>,
    /// YAML harness configuration
    #[arg(long)]
    config: Option<PathBuf>,
    /// Directory holding the dataset, fixture inputs and reports
    #[arg(long)]
    base_dir: Option<PathBuf>,
    /// Scanner command line, e.g. "node lib/scan.js"
    #[arg(long)]
    scanner: Option<String>,
    /// Also write the campaign report as JSON to this file
    #[arg(long, value_name = "PATH")]
    json: Option<PathBuf>,
    /// Validate the dataset without running the scanner
    #[arg(long)]
    check: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ProviderArg {
    Custom,
    Default,
}

impl From<ProviderArg> for Provider {
    fn from(value: ProviderArg) -> Self {
        match value {
            ProviderArg::Custom => Provider::Custom,
            ProviderArg::Default => Provider::Default,
        }
    }
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = RegressCli::parse();
    let config = load_config(&cli)?;

    if cli.check {
        let fixtures = load_dataset(&config.dataset_path())?;
        let diagnostics = validate_dataset(&fixtures, &config);
        print_diagnostics(&diagnostics);
        if diagnostics.iter().any(Diagnostic::is_error) {
            anyhow::bail!("dataset validation failed");
        }
        println!("{} fixture(s) checked", fixtures.len());
        return Ok(ExitCode::SUCCESS);
    }

    let request = CampaignRequest {
        product: cli.product.map(|product| product.trim().to_string()),
        currency: cli.currency.map(|currency| currency.trim().to_uppercase()),
        provider: cli.provider.map(Provider::from),
    };

    let scanner = ProcessScanner::new(
        config.scanner_command()?,
        config.provider_overrides.clone(),
    );
    let campaign = Campaign::new(config, scanner);
    let report = campaign.run(&request)?;

    output_report(&report, cli.json.as_deref())?;

    if report.passed() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

fn load_config(cli: &RegressCli) -> anyhow::Result<HarnessConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let content = fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            serde_yaml::from_str::<HarnessConfig>(&content)
                .with_context(|| format!("invalid config {}", path.display()))?
        }
        None => HarnessConfig::default(),
    };

    if let Some(base_dir) = &cli.base_dir {
        config.base_dir = base_dir.clone();
    }
    if let Some(scanner) = &cli.scanner {
        config.scanner = scanner.clone();
    }

    Ok(config)
}

fn output_report(report: &CampaignReport, json: Option<&Path>) -> anyhow::Result<()> {
    println!();
    print!("{report}");
    if let Some(failure) = report.failure() {
        println!(
            "\n[fail] {} - {} provider - ({}): {}",
            failure.product, failure.provider, failure.kind, failure.reason
        );
    }

    if let Some(path) = json {
        fs::write(path, serde_json::to_string_pretty(report)?)
            .with_context(|| format!("failed to write report {}", path.display()))?;
        println!("Report written to {}", path.display());
    }
    Ok(())
}

fn print_diagnostics(diagnostics: &[Diagnostic]) {
    if diagnostics.is_empty() {
        return;
    }

    println!("Diagnostics:");
    for diagnostic in diagnostics {
        println!("  - {diagnostic}");
    }
    println!();
}
