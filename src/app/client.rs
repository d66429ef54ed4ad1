//! HTTP client for the commerce backend
//!
//! This module implements the report fetch side of the transfer core: the
//! bearer-credential lifecycle, the report request, chunked streaming of the
//! response body, archive-integrity validation, and the bounded retry loop
//! around the whole download.

use std::time::Duration;

use chrono::{Days, Local, NaiveDate};
use futures::StreamExt;
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use url::Url;

use crate::config::CommerceConfig;
use crate::constants::{endpoints, http, limits, report};
use crate::errors::{FetchError, FetchResult};

/// Bearer credential with a single mutation point and a single invalidation
/// point.
///
/// The remote gives no expiry information, so staleness is detected
/// reactively: an auth rejection invalidates the cell and the next call
/// re-acquires. The mutex makes the read-modify-write safe if callers ever
/// parallelize across templates.
#[derive(Debug, Default)]
struct TokenCell(Mutex<Option<String>>);

impl TokenCell {
    async fn get(&self) -> Option<String> {
        self.0.lock().await.clone()
    }

    async fn store(&self, token: String) {
        *self.0.lock().await = Some(token);
    }

    async fn invalidate(&self) {
        *self.0.lock().await = None;
    }
}

/// Client for the commerce backend's token and report endpoints
///
/// Owns the bearer credential exclusively. All failure conditions of a
/// download are mapped onto the retryable/terminal split in [`FetchError`];
/// `download_report` wraps the whole operation in a bounded retry.
pub struct ReportClient {
    http: Client,
    base_url: Url,
    client_id: String,
    client_secret: String,
    company_id: i64,
    filial_id: i64,
    period_type: String,
    lag_days: u32,
    window_days: u32,
    report_timeout: Duration,
    retry_delay: Duration,
    max_attempts: u32,
    token: TokenCell,
}

impl std::fmt::Debug for ReportClient {
    // The client secret and any live token stay out of debug output
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportClient")
            .field("base_url", &self.base_url.as_str())
            .field("client_id", &self.client_id)
            .field("company_id", &self.company_id)
            .field("filial_id", &self.filial_id)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    grant_type: &'static str,
    client_id: &'a str,
    client_secret: &'a str,
    scope: &'static str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

#[derive(Debug, Serialize)]
struct ReportRequest<'a> {
    begin_date: String,
    end_date: String,
    period_type: &'a str,
    company_id: i64,
    filial_id: i64,
    template_id: i64,
}

impl ReportClient {
    /// Create a client from tenant configuration
    ///
    /// # Errors
    ///
    /// Returns `FetchError::InvalidUrl` if the configured base URL does not
    /// parse, or `FetchError::Http` if the HTTP client cannot be built.
    pub fn new(config: &CommerceConfig, client_secret: &str) -> FetchResult<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|_| FetchError::InvalidUrl {
            url: config.base_url.clone(),
        })?;

        let http = Client::builder()
            .user_agent(http::USER_AGENT)
            .connect_timeout(http::CONNECT_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            base_url,
            client_id: config.client_id.clone(),
            client_secret: client_secret.to_string(),
            company_id: config.company_id,
            filial_id: config.filial_id,
            period_type: config.period_type.clone(),
            lag_days: config.lag_days,
            window_days: config.window_days,
            report_timeout: config.report_timeout,
            retry_delay: config.download_retry_delay,
            max_attempts: limits::MAX_DOWNLOAD_ATTEMPTS,
            token: TokenCell::default(),
        })
    }

    /// Exchange the configured client credentials for a bearer token
    ///
    /// On success the token is stored for reuse by subsequent downloads.
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Auth` when the endpoint answers with a
    /// non-success status or the response omits `access_token`. This is a
    /// terminal condition: the download retry loop does not retry it.
    pub async fn acquire_credential(&self) -> FetchResult<String> {
        let url = self.endpoint(endpoints::TOKEN_PATH)?;
        tracing::info!("Acquiring access token from {}", url);

        let response = self
            .http
            .post(url)
            .timeout(http::TOKEN_TIMEOUT)
            .json(&TokenRequest {
                grant_type: "client_credentials",
                client_id: &self.client_id,
                client_secret: &self.client_secret,
                scope: endpoints::TOKEN_SCOPE,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.bytes().await.unwrap_or_default();
            return Err(FetchError::Auth {
                reason: format!("HTTP {}: {}", status.as_u16(), snippet(&body)),
            });
        }

        let parsed: TokenResponse = response.json().await?;
        let token = parsed.access_token.ok_or_else(|| FetchError::Auth {
            reason: "token endpoint response omitted access_token".to_string(),
        })?;

        self.token.store(token.clone()).await;
        tracing::info!("Access token acquired");
        Ok(token)
    }

    /// Verify connectivity and credentials by performing a token exchange
    pub async fn verify(&self) -> FetchResult<()> {
        self.acquire_credential().await.map(|_| ())
    }

    /// Download one report archive, retrying transient failures
    ///
    /// At most `MAX_DOWNLOAD_ATTEMPTS` attempts are made with a fixed
    /// configured delay in between. An auth rejection invalidates the stored
    /// credential, so the following attempt re-acquires one before
    /// re-issuing the request. After exhausting attempts the last error is
    /// re-raised.
    ///
    /// # Errors
    ///
    /// Returns the last `FetchError` once retries are exhausted, or
    /// immediately for terminal conditions (`Auth`, `InvalidUrl`).
    pub async fn download_report(&self, template_id: i64) -> FetchResult<Vec<u8>> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.download_attempt(template_id).await {
                Ok(bytes) => return Ok(bytes),
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    tracing::warn!(
                        "Report download failed (attempt {}/{}): {}. Retrying in {:?}",
                        attempt,
                        self.max_attempts,
                        e,
                        self.retry_delay
                    );
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(e) => {
                    tracing::error!(
                        "Report download for template {} failed after {} attempt(s): {}",
                        template_id,
                        attempt,
                        e
                    );
                    return Err(e);
                }
            }
        }
    }

    /// One download attempt: lazy credential, report POST, streamed body,
    /// archive validation
    async fn download_attempt(&self, template_id: i64) -> FetchResult<Vec<u8>> {
        let token = match self.token.get().await {
            Some(token) => token,
            None => self.acquire_credential().await?,
        };

        let url = self.endpoint(endpoints::REPORT_PATH)?;
        let (begin_date, end_date) = self.date_range();
        tracing::info!(
            "Requesting report template {} for {} .. {}",
            template_id,
            begin_date,
            end_date
        );

        let response = self
            .http
            .post(url)
            .timeout(self.report_timeout)
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .json(&ReportRequest {
                begin_date,
                end_date,
                period_type: &self.period_type,
                company_id: self.company_id,
                filial_id: self.filial_id,
                template_id,
            })
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            tracing::warn!("Report endpoint rejected the bearer token (HTTP {status})");
            self.token.invalidate().await;
            return Err(FetchError::AuthExpired);
        }
        if !status.is_success() {
            let body = response.bytes().await.unwrap_or_default();
            return Err(FetchError::Remote {
                status: status.as_u16(),
                snippet: snippet(&body),
            });
        }

        // Stream the body rather than buffering it at the transport layer;
        // report archives can run to hundreds of megabytes.
        let mut buf: Vec<u8> = Vec::new();
        let mut next_progress_log = limits::PROGRESS_LOG_INTERVAL_BYTES;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            buf.extend_from_slice(&chunk);
            if buf.len() as u64 >= next_progress_log {
                tracing::debug!("Report stream progress: {} bytes", buf.len());
                next_progress_log += limits::PROGRESS_LOG_INTERVAL_BYTES;
            }
        }
        tracing::info!("Report stream complete: {} bytes", buf.len());

        // Some backends report authorization failures in the body of a 200.
        if body_signals_auth_failure(&buf) {
            tracing::warn!("Report body signals an authorization failure under a nominal status");
            self.token.invalidate().await;
            return Err(FetchError::AuthExpired);
        }

        if let Err(e) = super::extract::validate_archive(&buf) {
            return Err(FetchError::InvalidPayload {
                snippet: format!("{}; content starts: {}", e, snippet(&buf)),
            });
        }
        tracing::info!("Report payload validated as a well-formed archive");

        Ok(buf)
    }

    /// Compute the request date range from the configured lag and window
    fn date_range(&self) -> (String, String) {
        date_range_from(
            Local::now().date_naive(),
            self.lag_days,
            self.window_days,
        )
    }

    fn endpoint(&self, path: &str) -> FetchResult<Url> {
        self.base_url.join(path).map_err(|_| FetchError::InvalidUrl {
            url: format!("{}{}", self.base_url, path),
        })
    }
}

/// Date range `[today - (lag + window), today - lag]` formatted for the
/// report endpoint
fn date_range_from(today: NaiveDate, lag_days: u32, window_days: u32) -> (String, String) {
    let end = today - Days::new(u64::from(lag_days));
    let begin = end - Days::new(u64::from(window_days));
    (
        begin.format(report::DATE_FORMAT).to_string(),
        end.format(report::DATE_FORMAT).to_string(),
    )
}

/// Truncated, lossily-decoded preview of a response body for diagnostics
pub(crate) fn snippet(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    let trimmed = text.trim();
    if trimmed.chars().count() <= limits::SNIPPET_MAX_CHARS {
        trimmed.to_string()
    } else {
        let cut: String = trimmed.chars().take(limits::SNIPPET_MAX_CHARS).collect();
        format!("{cut}...")
    }
}

/// Detect authorization failures reported in the body of a nominal response
fn body_signals_auth_failure(body: &[u8]) -> bool {
    // A real archive starts with the container magic; only sniff payloads
    // that cannot be one.
    if body.starts_with(b"PK") {
        return false;
    }
    let head = String::from_utf8_lossy(&body[..body.len().min(1024)]).to_lowercase();
    head.contains("invalid_token") || head.contains("unauthorized")
}
