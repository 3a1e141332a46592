// Log file implementation of ResultPersister
use async_trait::async_trait;
use std::collections::HashSet;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;

use predwrap_core::domain::{DomainError, Finding, FindingKind, RunResult, RunStatus};
use predwrap_core::error::{AppError, Result};
use predwrap_core::port::ResultPersister;

/// Written in the column slot of a finding without a column
pub const NO_COLUMN: &str = "none";

/// On-disk rendering of a run result
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Status token, then one `<row> <column|none> <kind>` line per finding
    #[default]
    Text,
    /// Pretty-printed JSON object
    Json,
}

impl FromStr for LogFormat {
    type Err = AppError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(AppError::Config(format!("unknown log format: {}", other))),
        }
    }
}

/// Writes each result to a file, replacing its previous content
pub struct LogFilePersister {
    path: PathBuf,
    format: LogFormat,
}

impl LogFilePersister {
    pub fn new(path: impl Into<PathBuf>, format: LogFormat) -> Self {
        Self {
            path: path.into(),
            format,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn render(&self, result: &RunResult) -> Result<String> {
        match self.format {
            LogFormat::Text => Ok(render_text(result)),
            LogFormat::Json => {
                let mut json = serde_json::to_string_pretty(result)?;
                json.push('\n');
                Ok(json)
            }
        }
    }
}

#[async_trait]
impl ResultPersister for LogFilePersister {
    async fn persist(&self, result: &RunResult) -> Result<()> {
        let content = self.render(result)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, content).await.map_err(|e| {
            AppError::Persistence(format!("cannot write {}: {}", self.path.display(), e))
        })?;

        info!(
            path = %self.path.display(),
            status = %result.status,
            findings = result.findings.len(),
            "Log file written"
        );
        Ok(())
    }
}

/// Render the text log. Finding order carries no meaning.
pub fn render_text(result: &RunResult) -> String {
    let mut out = format!("{}\n", result.status);
    for finding in &result.findings {
        let column = finding
            .column()
            .map(|c| c.to_string())
            .unwrap_or_else(|| NO_COLUMN.to_string());
        // Writing to a String cannot fail
        let _ = writeln!(out, "{} {} {}", finding.row(), column, finding.kind());
    }
    out
}

/// Parse a text log back into a result
pub fn parse_text_log(content: &str) -> std::result::Result<RunResult, DomainError> {
    let mut lines = content.lines().enumerate();

    let status: RunStatus = match lines.next() {
        Some((_, line)) => line.trim().parse()?,
        None => {
            return Err(DomainError::MalformedLogLine {
                line_no: 1,
                line: String::new(),
            })
        }
    };

    let mut findings = HashSet::new();
    for (index, line) in lines {
        if line.trim().is_empty() {
            continue;
        }
        let malformed = || DomainError::MalformedLogLine {
            line_no: index + 1,
            line: line.to_string(),
        };

        // Only a successful run carries findings
        if status != RunStatus::Ok {
            return Err(malformed());
        }

        let fields: Vec<&str> = line.split_whitespace().collect();
        let [row, column, kind] = fields.as_slice() else {
            return Err(malformed());
        };

        let row: u32 = row.parse().map_err(|_| malformed())?;
        let column = match *column {
            NO_COLUMN => None,
            value => Some(value.parse::<u32>().map_err(|_| malformed())?),
        };
        let kind: FindingKind = kind.parse()?;

        let finding: Finding = Finding::new(row, column, kind).ok_or_else(malformed)?;
        findings.insert(finding);
    }

    Ok(match status {
        RunStatus::Ok => RunResult::ok(findings),
        RunStatus::Timeout => RunResult::timeout(),
        RunStatus::Unknown => RunResult::unknown(),
        RunStatus::Error => RunResult::error(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RunResult {
        RunResult::ok(HashSet::from([
            Finding::new(12, Some(3), FindingKind::InvalidAccess).unwrap(),
            Finding::new(9, None, FindingKind::Leak).unwrap(),
        ]))
    }

    #[test]
    fn test_render_text() {
        let text = render_text(&sample());
        let mut lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.remove(0), "ok");
        lines.sort();
        assert_eq!(lines, vec!["12 3 invalid", "9 none leak"]);
    }

    #[test]
    fn test_render_status_only() {
        assert_eq!(render_text(&RunResult::timeout()), "timeout\n");
        assert_eq!(render_text(&RunResult::unknown()), "unknown\n");
    }

    #[test]
    fn test_parse_text_log_any_order() {
        let parsed = parse_text_log("ok\n9 none leak\n12 3 invalid\n").unwrap();
        assert_eq!(parsed, sample());

        assert_eq!(parse_text_log(&render_text(&sample())).unwrap(), sample());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_text_log("").is_err());
        assert!(parse_text_log("finished\n").is_err());
        assert!(matches!(
            parse_text_log("ok\n1 2\n"),
            Err(DomainError::MalformedLogLine { line_no: 2, .. })
        ));
        assert!(matches!(
            parse_text_log("ok\n1 2 overflow\n"),
            Err(DomainError::UnknownFindingKind(_))
        ));
    }

    #[test]
    fn test_parse_rejects_findings_on_failed_run() {
        assert!(matches!(
            parse_text_log("error\n1 2 leak\n"),
            Err(DomainError::MalformedLogLine { line_no: 2, .. })
        ));
        assert!(parse_text_log("timeout\n9 none leak\n").is_err());
        assert_eq!(parse_text_log("unknown\n\n").unwrap(), RunResult::unknown());
    }

    #[test]
    fn test_log_format_from_str() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("text".parse::<LogFormat>().unwrap(), LogFormat::Text);
        assert!("yaml".parse::<LogFormat>().is_err());
    }

    #[tokio::test]
    async fn test_persist_text_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("predator.log");
        let persister = LogFilePersister::new(&path, LogFormat::Text);

        persister.persist(&sample()).await.unwrap();

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(parse_text_log(&content).unwrap(), sample());
    }

    #[tokio::test]
    async fn test_persist_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("predator.log");
        let persister = LogFilePersister::new(&path, LogFormat::Text);

        persister.persist(&sample()).await.unwrap();
        persister.persist(&RunResult::error()).await.unwrap();

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(content, "error\n");
    }

    #[tokio::test]
    async fn test_persist_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("predator.json");
        let persister = LogFilePersister::new(&path, LogFormat::Json);

        persister.persist(&sample()).await.unwrap();

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(value["status"], "ok");
        assert_eq!(value["findings"][0]["row"], 9);
        assert_eq!(value["findings"][0]["column"], serde_json::Value::Null);
        assert_eq!(value["findings"][1]["kind"], "invalid");
    }
}
