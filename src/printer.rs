use std::collections::HashMap;

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::PrinterConfig;

/// Progress of the current print job as reported by the printer API.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JobProgress {
    /// Percentage (0-100) of the job finished.
    #[serde(default)]
    pub completion: f64,
}

/// Job status envelope returned by a printer's `/api/job` endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JobStatus {
    /// Short state string such as "Printing", "Operational" or "Paused".
    pub state: String,
    pub progress: JobProgress,
}

/// Client for the printer control API.
///
/// All printers share one base URL; the printer name selects both the URL
/// prefix and the API key. The upstream host presents a self-signed
/// certificate, so certificate validation is disabled on this client.
pub struct PrinterClient {
    base_url: String,
    api_keys: HashMap<String, String>,
    client: reqwest::Client,
}

impl PrinterClient {
    /// Create a new PrinterClient for the configured printers.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be constructed.
    pub fn new(base_url: String, printers: &[PrinterConfig]) -> Result<Self> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .build()?;

        Ok(Self {
            base_url,
            api_keys: printers
                .iter()
                .map(|p| (p.name.clone(), p.api_key.clone()))
                .collect(),
            client,
        })
    }

    fn api_key(&self, printer: &str) -> Result<&str> {
        self.api_keys
            .get(printer)
            .map(String::as_str)
            .ok_or_else(|| anyhow!("unknown printer '{}'", printer))
    }

    /// Fetch the current job status of a printer.
    ///
    /// Issues one authenticated GET against the printer's job endpoint; there
    /// is no retry.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The printer name is not configured
    /// - The HTTP request fails
    /// - The printer API returns an error status
    /// - The response body is not the expected JSON envelope
    pub async fn get_job_status(&self, printer: &str) -> Result<JobStatus> {
        let response = self
            .client
            .get(format!("{}/{}/api/job", self.base_url, printer))
            .header("X-Api-Key", self.api_key(printer)?)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "Failed to get job status: HTTP {}",
                response.status()
            ));
        }

        Ok(response.json().await?)
    }

    /// Cancel the current print job.
    ///
    /// Posts the cancel command to the printer's job endpoint and returns the
    /// raw upstream response body.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP request fails or the printer API returns
    /// an error status.
    pub async fn cancel_job(&self, printer: &str) -> Result<String> {
        let response = self
            .client
            .post(format!("{}/{}/api/job", self.base_url, printer))
            .header("X-Api-Key", self.api_key(printer)?)
            .json(&json!({ "command": "cancel" }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!("Failed to cancel job: HTTP {}", response.status()));
        }

        Ok(response.text().await?)
    }

    /// Open the printer's MJPEG webcam stream.
    ///
    /// The upstream webcam endpoint is guarded by the same basic-auth pair the
    /// dashboard itself uses, so the caller passes the encoded `Authorization`
    /// value to forward. The response is returned unread so the caller can
    /// stream the body.
    pub async fn webcam_stream(&self, printer: &str, auth_header: &str) -> Result<reqwest::Response> {
        // Validates the printer name even though the stream uses basic auth
        // rather than the API key.
        self.api_key(printer)?;

        let response = self
            .client
            .get(format!("{}/{}/webcam/?action=stream", self.base_url, printer))
            .header(reqwest::header::AUTHORIZATION, auth_header)
            .send()
            .await?;

        Ok(response)
    }
}
