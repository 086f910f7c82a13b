use crate::fixture::Fixture;
use crate::provider::{balance_exemption_reason, Provider, ProviderOverrides};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("failed to execute scanner '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("scanner i/o failed: {0}")]
    Output(#[source] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct ScanRequest<'a> {
    pub fixture: &'a Fixture,
    pub operations: PathBuf,
    pub provider: Provider,
    pub save_dir: PathBuf,
}

impl<'a> ScanRequest<'a> {
    pub fn new(
        fixture: &'a Fixture,
        operations: impl Into<PathBuf>,
        provider: Provider,
        save_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            fixture,
            operations: operations.into(),
            provider,
            save_dir: save_dir.into(),
        }
    }

    pub fn arguments(&self) -> Vec<String> {
        let fixture = self.fixture;
        let mut args = vec![
            fixture.xpub.clone(),
            "--currency".to_string(),
            fixture.coin_ticker.clone(),
            "--operations".to_string(),
            path_arg(&self.operations),
            "--diff".to_string(),
            "--quiet".to_string(),
            "--save".to_string(),
            path_arg(&self.save_dir),
        ];

        if self.provider == Provider::Custom {
            args.push("--custom-provider".to_string());
        }

        match (
            balance_exemption_reason(self.provider, &fixture.coin_ticker),
            &fixture.balance,
        ) {
            (Some(reason), _) => println!("[info] balance check skipped: {reason}"),
            (None, Some(balance)) => {
                args.push("--balance".to_string());
                args.push(balance.clone());
            }
            (None, None) => eprintln!(
                "[warn] {} ({}) has no balance; skipping the balance check",
                fixture.product, fixture.coin_ticker
            ),
        }

        args
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

// A non-zero exit code is a regular result, not an error.
pub trait Scanner {
    fn scan(&self, request: &ScanRequest<'_>) -> Result<i32, ScanError>;
}

#[derive(Debug, Clone)]
pub struct ProcessScanner {
    command: Vec<String>,
    overrides: ProviderOverrides,
}

impl ProcessScanner {
    pub fn new(command: Vec<String>, overrides: ProviderOverrides) -> Self {
        Self { command, overrides }
    }

    pub fn invocation(&self, request: &ScanRequest<'_>) -> Vec<String> {
        let mut invocation = self.command.clone();
        invocation.extend(request.arguments());
        invocation
    }
}

impl Scanner for ProcessScanner {
    fn scan(&self, request: &ScanRequest<'_>) -> Result<i32, ScanError> {
        let invocation = self.invocation(request);
        let (program, args) = match invocation.split_first() {
            Some(split) => split,
            None => {
                return Err(ScanError::Spawn {
                    program: String::new(),
                    source: std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        "empty scanner command",
                    ),
                })
            }
        };

        let mut cmd = Command::new(program);
        cmd.args(args).stdout(Stdio::piped());
        for key in self.overrides.removed_env(request.provider) {
            cmd.env_remove(key);
        }

        let mut child = cmd.spawn().map_err(|source| ScanError::Spawn {
            program: program.clone(),
            source,
        })?;

        if let Some(stdout) = child.stdout.take() {
            relay_output(BufReader::new(stdout));
        }

        let status = child.wait().map_err(ScanError::Output)?;
        // killed by a signal: no code, but definitely not a success
        Ok(status.code().unwrap_or(-1))
    }
}

// Lines are relayed as they arrive; bytes that are not UTF-8 are replaced.
fn relay_output<R: BufRead>(mut reader: R) -> usize {
    let mut buf = Vec::new();
    let mut relayed = 0;
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                println!("{}", line.trim_end_matches(['\r', '\n']));
                relayed += 1;
            }
            Err(err) => {
                eprintln!("[warn] stopped relaying scanner output: {err}");
                break;
            }
        }
    }
    relayed
}
