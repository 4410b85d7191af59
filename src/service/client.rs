use anyhow::{Context, Result};
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use tokio_retry::strategy::ExponentialBackoff;
use tokio_retry::RetryIf;
use tracing::{debug, warn};

use crate::config::ServiceConfig;
use crate::error::ContractError;
use crate::history::HistoryKind;

const SPREADSHEET_EXTENSIONS: &[&str] = &["xlsx", "xls"];
const DECK_EXTENSIONS: &[&str] = &["pptx"];

/// Thin HTTP client for the analysis service. Responses come back as
/// untyped JSON; callers pass them through `ingest` before use.
#[derive(Debug, Clone)]
pub struct ServiceClient {
    http: reqwest::Client,
    base_url: String,
    retries: usize,
}

/// One failed attempt, and whether trying again could help.
struct Attempt {
    error: ContractError,
    retryable: bool,
}

impl ServiceClient {
    pub fn new(config: &ServiceConfig) -> Result<Self> {
        let timeout = config
            .effective_timeout()
            .context("Invalid service.timeout in config")?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("pmo-agent/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            base_url: config.effective_base_url().to_string(),
            retries: config.effective_retries(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Cross-check a spreadsheet against a slide deck (`POST /analyze`).
    pub async fn analyze(&self, spreadsheet: &Path, deck: &Path) -> Result<Value> {
        check_extension(spreadsheet, SPREADSHEET_EXTENSIONS, "file_excel")?;
        check_extension(deck, DECK_EXTENSIONS, "file_ppt")?;

        let form = Form::new()
            .part("file_excel", file_part(spreadsheet).await?)
            .part("file_ppt", file_part(deck).await?);

        debug!(
            spreadsheet = %spreadsheet.display(),
            deck = %deck.display(),
            "uploading cross-check"
        );
        let request = self.http.post(self.url("analyze")).multipart(form);
        Ok(send(request).await.map_err(|a| a.error)?)
    }

    /// Score every project in a spreadsheet remotely (`POST /prioritize/batch`).
    pub async fn prioritize_batch(&self, spreadsheet: &Path) -> Result<Value> {
        check_extension(spreadsheet, SPREADSHEET_EXTENSIONS, "file")?;

        let form = Form::new().part("file", file_part(spreadsheet).await?);

        debug!(spreadsheet = %spreadsheet.display(), "uploading batch");
        let request = self.http.post(self.url("prioritize/batch")).multipart(form);
        Ok(send(request).await.map_err(|a| a.error)?)
    }

    /// Most recent history records of one kind, newest first.
    pub async fn list_history(&self, kind: HistoryKind, skip: u32, limit: u32) -> Result<Value> {
        let url = self.url(kind.path());
        let query = [("skip", skip), ("limit", limit)];
        Ok(self
            .get_with_retry(|| self.http.get(&url).query(&query))
            .await?)
    }

    /// Full stored result of one history record.
    pub async fn history_detail(&self, kind: HistoryKind, id: u64) -> Result<Value> {
        let url = self.url(&format!("{}/{}", kind.path(), id));
        Ok(self.get_with_retry(|| self.http.get(&url)).await?)
    }

    /// GETs are idempotent, so connection failures, timeouts and gateway
    /// errors are retried with exponential backoff.
    async fn get_with_retry<F>(&self, build: F) -> Result<Value, ContractError>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let strategy = ExponentialBackoff::from_millis(2)
            .factor(50)
            .max_delay(Duration::from_secs(5))
            .take(self.retries.saturating_sub(1));

        RetryIf::spawn(
            strategy,
            || send(build()),
            |attempt: &Attempt| {
                if attempt.retryable {
                    warn!(error = %attempt.error, "request failed, retrying");
                }
                attempt.retryable
            },
        )
        .await
        .map_err(|a| a.error)
    }
}

async fn send(request: reqwest::RequestBuilder) -> Result<Value, Attempt> {
    let response = request.send().await.map_err(|e| Attempt {
        retryable: e.is_connect() || e.is_timeout(),
        error: ContractError::Transport(e.to_string()),
    })?;

    let status = response.status();
    if !status.is_success() {
        let detail = error_detail(response).await;
        return Err(Attempt {
            retryable: matches!(
                status,
                StatusCode::BAD_GATEWAY
                    | StatusCode::SERVICE_UNAVAILABLE
                    | StatusCode::GATEWAY_TIMEOUT
            ),
            error: ContractError::Transport(format!("{}: {}", status, detail)),
        });
    }

    response.json::<Value>().await.map_err(|e| Attempt {
        retryable: false,
        error: ContractError::Transport(format!("invalid JSON response: {}", e)),
    })
}

/// The service reports failures as `{"detail": ...}`. Validation failures
/// carry a list there, so anything that is not a string is rendered as JSON.
async fn error_detail(response: reqwest::Response) -> String {
    let status = response.status();
    match response.json::<Value>().await {
        Ok(body) => match body.get("detail") {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => body.to_string(),
        },
        Err(_) => status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string(),
    }
}

fn check_extension(path: &Path, allowed: &[&str], field: &str) -> Result<(), ContractError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();
    if allowed.contains(&extension.as_str()) {
        return Ok(());
    }
    let expected = allowed
        .iter()
        .map(|e| format!(".{}", e))
        .collect::<Vec<_>>()
        .join(" or ");
    Err(ContractError::validation(
        field,
        format!("{} must be a {} file", path.display(), expected),
    ))
}

async fn file_part(path: &Path) -> Result<Part> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload")
        .to_string();
    Ok(Part::bytes(bytes).file_name(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_check() {
        assert!(check_extension(Path::new("plan.XLSX"), SPREADSHEET_EXTENSIONS, "file").is_ok());
        assert!(check_extension(Path::new("old.xls"), SPREADSHEET_EXTENSIONS, "file").is_ok());

        let err = check_extension(Path::new("deck.ppt"), DECK_EXTENSIONS, "file_ppt").unwrap_err();
        assert_eq!(
            err,
            ContractError::validation("file_ppt", "deck.ppt must be a .pptx file")
        );

        let err =
            check_extension(Path::new("plan.csv"), SPREADSHEET_EXTENSIONS, "file").unwrap_err();
        assert_eq!(err.to_string(), "file: plan.csv must be a .xlsx or .xls file");
    }

    #[test]
    fn test_url_joining() {
        let config = ServiceConfig {
            base_url: Some("http://localhost:9000/".to_string()),
            ..ServiceConfig::default()
        };
        let client = ServiceClient::new(&config).unwrap();
        assert_eq!(client.base_url(), "http://localhost:9000");
        assert_eq!(client.url("/history/3"), "http://localhost:9000/history/3");
    }

    #[test]
    fn test_bad_timeout_fails_construction() {
        let config = ServiceConfig {
            timeout: Some("whenever".to_string()),
            ..ServiceConfig::default()
        };
        let err = ServiceClient::new(&config).unwrap_err();
        assert!(err.to_string().contains("service.timeout"));
    }
}
