//! Runs the Elite Insights CLI on one combat log and waits for its report.

use super::readiness::wait_for_file;
use super::WaitPolicy;
use crate::error::PipelineError;
use crate::model::WatchConfig;
use crate::report::REPORT_SUFFIX;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// Printed by the .NET host when the runtime the parser needs is absent.
const MISSING_RUNTIME: &str = "You must install .NET to run this application";

#[derive(Debug, Clone)]
pub struct Converter {
    launcher: Option<PathBuf>,
    tool: PathBuf,
    config: PathBuf,
    output_dir: PathBuf,
    wait: WaitPolicy,
}

impl Converter {
    pub fn new(
        tool: impl Into<PathBuf>,
        config: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        wait: WaitPolicy,
    ) -> Self {
        Self {
            launcher: None,
            tool: tool.into(),
            config: config.into(),
            output_dir: output_dir.into(),
            wait,
        }
    }

    pub fn from_config(cfg: &WatchConfig) -> Self {
        Self::new(
            &cfg.parser_path,
            &cfg.parser_config,
            cfg.temp_dir(),
            WaitPolicy {
                interval: cfg.poll_interval,
                timeout: cfg.artifact_timeout,
            },
        )
        .with_launcher(cfg.parser_launcher.clone())
    }

    /// Run the tool through another program, e.g. `dotnet` or `wine`.
    pub fn with_launcher(mut self, launcher: Option<PathBuf>) -> Self {
        self.launcher = launcher;
        self
    }

    pub fn tool(&self) -> &Path {
        &self.tool
    }

    pub fn tool_exists(&self) -> bool {
        self.tool.is_file()
    }

    /// Where the parser writes the JSON report for `input`.
    pub fn expected_report_path(&self, input: &Path) -> PathBuf {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.output_dir.join(format!("{stem}{REPORT_SUFFIX}.json"))
    }

    fn command(&self, input: &Path) -> Command {
        let mut args: Vec<OsString> = Vec::with_capacity(4);
        let program = match &self.launcher {
            Some(launcher) => {
                args.push(self.tool.clone().into_os_string());
                launcher.clone()
            }
            None => self.tool.clone(),
        };
        args.push("-c".into());
        args.push(self.config.clone().into_os_string());
        args.push(input.as_os_str().to_os_string());

        let mut cmd = Command::new(program);
        cmd.args(args).kill_on_drop(true);
        cmd
    }

    /// Convert `input` and return the path of the primary JSON report.
    pub async fn convert(&self, input: &Path) -> Result<PathBuf, PipelineError> {
        if !self.tool_exists() {
            return Err(PipelineError::ExternalToolMissing {
                detail: format!("{} not found", self.tool.display()),
            });
        }

        tracing::info!(input = %input.display(), "running Elite Insights");
        let output = match self.command(input).output().await {
            Ok(output) => output,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(PipelineError::ExternalToolMissing {
                    detail: e.to_string(),
                });
            }
            Err(e) => {
                return Err(PipelineError::ExternalToolFailed {
                    status: "spawn failed".into(),
                    output: e.to_string(),
                });
            }
        };

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        if combined.contains(MISSING_RUNTIME) {
            return Err(PipelineError::ExternalToolMissing {
                detail: ".NET runtime is not installed".into(),
            });
        }
        if !output.status.success() {
            return Err(PipelineError::ExternalToolFailed {
                status: output.status.to_string(),
                output: combined.trim().to_string(),
            });
        }

        let report = self.expected_report_path(input);
        tracing::debug!(report = %report.display(), "waiting for report");
        wait_for_file(&report, self.wait).await
    }
}
