//! Inspection of the HTML and JSON reports the scanner leaves behind.
//!
//! Every report that could be read is deleted as part of the check, so a
//! later test case can never pick up a stale file.

use quick_xml::events::Event;
use quick_xml::Reader;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub const REPORT_OK: &str = "ok";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadResult {
    Found(String),
    NotFound,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReportCheck {
    pub success: bool,
    pub reason: String,
}

impl ReportCheck {
    pub fn ok() -> Self {
        Self {
            success: true,
            reason: REPORT_OK.to_string(),
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ReportCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.reason)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReportFormat {
    Html,
    Json,
}

impl ReportFormat {
    fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Html => "html",
            ReportFormat::Json => "json",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            ReportFormat::Html => "HTML",
            ReportFormat::Json => "JSON",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReportValidator {
    output_dir: PathBuf,
}

impl ReportValidator {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn html_path(&self, xpub: &str) -> PathBuf {
        self.report_path(xpub, ReportFormat::Html)
    }

    pub fn json_path(&self, xpub: &str) -> PathBuf {
        self.report_path(xpub, ReportFormat::Json)
    }

    fn report_path(&self, xpub: &str, format: ReportFormat) -> PathBuf {
        self.output_dir
            .join(format!("{xpub}.{}", format.extension()))
    }

    /// Stops at the first failure; `discrepancy` must appear in both reports.
    pub fn validate(&self, xpub: &str, discrepancy: Option<&str>) -> ReportCheck {
        let html_path = self.html_path(xpub);
        let html = match read_report(&html_path) {
            ReadResult::Found(content) => content,
            ReadResult::NotFound => return ReportCheck::failed("HTML report not found"),
        };

        if !has_markup_element(&html) {
            println!("{html}");
            return ReportCheck::failed("Invalid HTML report");
        }

        remove_report(&html_path);

        if let Some(check) = missing_discrepancy(&html, discrepancy, ReportFormat::Html) {
            return check;
        }

        let json_path = self.json_path(xpub);
        let json = match read_report(&json_path) {
            ReadResult::Found(content) => content,
            ReadResult::NotFound => return ReportCheck::failed("JSON report not found"),
        };

        let parsed = serde_json::from_str::<serde_json::Value>(&json);
        remove_report(&json_path);
        if parsed.is_err() {
            println!("{json}");
            return ReportCheck::failed("Invalid JSON report");
        }

        if let Some(check) = missing_discrepancy(&json, discrepancy, ReportFormat::Json) {
            return check;
        }

        ReportCheck::ok()
    }
}

pub fn read_report(path: &Path) -> ReadResult {
    match fs::read_to_string(path) {
        Ok(content) => ReadResult::Found(content),
        Err(err) if err.kind() == ErrorKind::NotFound => ReadResult::NotFound,
        Err(err) => {
            eprintln!("[warn] failed to read report {:?}: {err}", path);
            ReadResult::NotFound
        }
    }
}

fn remove_report(path: &Path) {
    if let Err(err) = fs::remove_file(path) {
        eprintln!("[warn] failed to remove report {:?}: {err}", path);
    }
}

fn missing_discrepancy(
    content: &str,
    discrepancy: Option<&str>,
    format: ReportFormat,
) -> Option<ReportCheck> {
    let expected = discrepancy?;
    if content.to_lowercase().contains(&expected.to_lowercase()) {
        None
    } else {
        Some(ReportCheck::failed(format!(
            "Simulated discrepancy `{expected}` not found in the {} report",
            format.label()
        )))
    }
}

/// True once the document yields at least one element.
///
/// HTML is not XML, so end-name checks are off and the scan stops at the
/// first element rather than reading the whole document.
pub fn has_markup_element(document: &str) -> bool {
    let mut reader = Reader::from_str(document);
    reader.config_mut().check_end_names = false;
    reader.config_mut().trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Start(_)) | Ok(Event::Empty(_)) => return true,
            Ok(Event::Eof) => return false,
            Ok(_) => {}
            Err(_) => return false,
        }
    }
}
