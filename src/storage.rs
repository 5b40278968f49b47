//! On-disk layout of the archive and the parser scratch folder.
//!
//! Run folders are `<archive>/<commander>_<stamp>/` holding
//! `<base>_detailed_wvw_kill.json` reports with optional `.html` siblings.

use crate::error::PipelineError;
use crate::model::WatchConfig;
use crate::session::RunName;
use std::io;
use std::path::{Path, PathBuf};

/// Elite Insights settings; `{out}` is replaced with the temp folder.
const PARSER_CONFIG_TEMPLATE: &str = "LightTheme=False
HtmlExternalScripts=False
SaveOutHTML=True
HtmlExternalScriptsPath=
CompressRaw=False
SaveOutCSV=False
IndentJSON=False
ParseMultipleLogs=False
AutoAddPath=
HtmlExternalScriptsCdn=
Outdated=False
OutLocation={out}
AutoAdd=False
SendSimpleMessageToWebhook=False
RawTimelineArrays=True
UploadToRaidar=False
SaveOutJSON=True
PopulateHourLimit=0
SingleThreaded=False
SkipFailedTries=False
SaveOutXML=False
ParseCombatReplay=True
IndentXML=False
CustomTooShort=2200
AutoDiscordBatch=False
ApplicationTraces=False
Anonymous=False
WebhookURL=
AddPoVProf=False
UploadToWingman=False
AddDuration=False
HtmlCompressJson=False
AutoParse=False
SaveAtOut=False
DetailledWvW=True
SaveOutTrace=True
UploadToDPSReports=False
ComputeDamageModifiers=True
DPSReportUserToken=
SendEmbedToWebhook=False
MemoryLimit=0
ParsePhases=True
";

#[derive(Debug, Clone)]
pub struct ArchiveLayout {
    archive_root: PathBuf,
    temp_dir: PathBuf,
}

impl ArchiveLayout {
    pub fn new(archive_root: impl Into<PathBuf>, temp_dir: impl Into<PathBuf>) -> Self {
        Self {
            archive_root: archive_root.into(),
            temp_dir: temp_dir.into(),
        }
    }

    pub fn from_config(cfg: &WatchConfig) -> Self {
        Self::new(cfg.archive_root(), cfg.temp_dir())
    }

    #[cfg(test)]
    pub fn archive_root(&self) -> &Path {
        &self.archive_root
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    /// Archived run names. Creates the archive root when missing; folders
    /// that are not run names are skipped.
    pub async fn list_runs(&self) -> Result<Vec<RunName>, PipelineError> {
        tokio::fs::create_dir_all(&self.archive_root)
            .await
            .map_err(|e| PipelineError::io("create archive folder", e))?;

        let mut entries = tokio::fs::read_dir(&self.archive_root)
            .await
            .map_err(|e| PipelineError::io("read archive folder", e))?;
        let mut runs = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| PipelineError::io("read archive folder", e))?
        {
            let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
            if !is_dir {
                continue;
            }
            let name = entry.file_name();
            let name = name.to_string_lossy();
            match RunName::parse(&name) {
                Ok(run) => runs.push(run),
                Err(e) => tracing::warn!(folder = %name, error = %e, "skipping folder in archive"),
            }
        }
        Ok(runs)
    }

    /// JSON reports in a run folder, sorted by file name.
    pub async fn list_reports(&self, run_dir: &Path) -> Result<Vec<PathBuf>, PipelineError> {
        let mut entries = tokio::fs::read_dir(run_dir)
            .await
            .map_err(|e| PipelineError::io(format!("read run {}", run_dir.display()), e))?;
        let mut reports = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| PipelineError::io(format!("read run {}", run_dir.display()), e))?
        {
            let path = entry.path();
            let is_json = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
            if is_json {
                reports.push(path);
            }
        }
        reports.sort();
        Ok(reports)
    }

    pub async fn create_run_dir(&self, run_dir: &Path) -> Result<(), PipelineError> {
        tokio::fs::create_dir_all(run_dir)
            .await
            .map_err(|source| PipelineError::DestinationUnwritable {
                path: run_dir.to_path_buf(),
                source,
            })
    }

    /// Recursively delete a run folder. Only direct children of the archive
    /// root are accepted.
    pub async fn delete_run(&self, run_dir: &Path) -> Result<(), PipelineError> {
        if run_dir.parent() != Some(self.archive_root.as_path()) {
            return Err(PipelineError::io(
                format!("delete run {}", run_dir.display()),
                io::Error::new(io::ErrorKind::InvalidInput, "not inside the archive"),
            ));
        }
        tokio::fs::remove_dir_all(run_dir)
            .await
            .map_err(|e| PipelineError::io(format!("delete run {}", run_dir.display()), e))
    }

    /// Delete a report and its `.html` sibling if present.
    pub async fn delete_log(&self, report: &Path) -> Result<(), PipelineError> {
        tokio::fs::remove_file(report)
            .await
            .map_err(|e| PipelineError::io(format!("delete {}", report.display()), e))?;
        let html = report.with_extension("html");
        match tokio::fs::remove_file(&html).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PipelineError::io(format!("delete {}", html.display()), e)),
        }
    }

    /// Empty the parser scratch folder, leaving it in place.
    pub async fn reset_temp_dir(&self) -> Result<(), PipelineError> {
        match tokio::fs::remove_dir_all(&self.temp_dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(PipelineError::io("clear temp folder", e)),
        }
        tokio::fs::create_dir_all(&self.temp_dir)
            .await
            .map_err(|e| PipelineError::io("create temp folder", e))
    }

    /// Write the default parser settings to `path` unless a file exists.
    /// Returns whether a file was written.
    pub async fn ensure_parser_config(&self, path: &Path) -> Result<bool, PipelineError> {
        if tokio::fs::try_exists(path).await.unwrap_or(false) {
            return Ok(false);
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| PipelineError::io("create parser config folder", e))?;
        }
        let body = PARSER_CONFIG_TEMPLATE.replace("{out}", &self.temp_dir.to_string_lossy());
        tokio::fs::write(path, body)
            .await
            .map_err(|e| PipelineError::io(format!("write {}", path.display()), e))?;
        tracing::info!(path = %path.display(), "wrote default parser settings");
        Ok(true)
    }
}
