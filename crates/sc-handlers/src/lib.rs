// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]
//! Request handlers for the VirusTotal supplier.
//!
//! Wire-level constraints are bit-exact with the original system: base URL
//! `https://www.virustotal.com/vtapi/v2/`, credentials passed as
//! `apikey=<passport>` in the query string, and JSON response fields
//! `response_code`/`verbose_msg` mapped onto [`Cargo::status_code`]/
//! [`Cargo::notes`] with the remainder becoming [`Cargo::data`].

use async_trait::async_trait;
use sc_core::Cargo;
use sc_error::{SupplyError, SupplyErrorCode};
use sc_handler_core::{HandlerIdentity, RequestHandler};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, instrument};

const BASE_URL: &str = "https://www.virustotal.com/vtapi/v2/";
const WAIT_TIME_SECONDS: u64 = 60;
const RETRIES: u32 = 6;

fn missing_field(field: &str) -> SupplyError {
    SupplyError::new(
        SupplyErrorCode::ValidationMissingField,
        format!("missing required field '{field}'"),
    )
}

fn value_as_str<'a>(input: &'a Map<String, Value>, field: &str) -> Result<&'a str, SupplyError> {
    input.get(field).and_then(Value::as_str).ok_or_else(|| missing_field(field))
}

fn transport_failed(e: reqwest::Error) -> SupplyError {
    SupplyError::new(SupplyErrorCode::TransportRequestFailed, e.to_string()).with_source(e)
}

fn bad_response(e: reqwest::Error) -> SupplyError {
    SupplyError::new(SupplyErrorCode::TransportBadResponse, e.to_string()).with_source(e)
}

/// Package an HTTP response into a [`Cargo`], per the `response_code`/
/// `verbose_msg` mapping convention shared by every VirusTotal endpoint.
///
/// # Errors
///
/// Returns [`SupplyErrorCode::TransportBadResponse`] if a successful (2xx)
/// response body cannot be parsed as JSON.
async fn package_cargo(response: reqwest::Response) -> Result<Cargo, SupplyError> {
    let status = response.status();
    if status.is_success() {
        let mut body: Map<String, Value> = response.json().await.map_err(bad_response)?;
        let status_code = body
            .remove("response_code")
            .and_then(|v| v.as_i64())
            .unwrap_or(0) as i32;
        let notes = body.remove("verbose_msg").and_then(|v| v.as_str().map(String::from));
        Ok(Cargo {
            status_code,
            notes,
            data: Value::Object(body),
        })
    } else {
        Ok(Cargo::failed(
            i32::from(status.as_u16()),
            status.canonical_reason().unwrap_or("unknown error"),
        ))
    }
}

/// Shared HTTP client and base URL for every VirusTotal handler.
#[derive(Debug, Clone)]
pub struct VirusTotalClient {
    client: reqwest::Client,
    base_url: String,
}

impl Default for VirusTotalClient {
    fn default() -> Self {
        Self::new()
    }
}

impl VirusTotalClient {
    /// Construct a client pointed at the production VirusTotal API.
    #[must_use]
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .user_agent(format!("procurement-pipeline/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            base_url: BASE_URL.to_string(),
        }
    }

    /// Construct a client pointed at an arbitrary base URL, for tests.
    #[must_use]
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    fn endpoint(&self, api: &str) -> String {
        format!("{}{}", self.base_url, api)
    }
}

macro_rules! api_class {
    ($name:literal) => {
        HandlerIdentity::new("virustotal", $name)
    };
}

/// Accesses the VirusTotal endpoint for domain reports.
#[derive(Debug, Clone)]
pub struct DomainReport(pub VirusTotalClient);

#[async_trait]
impl RequestHandler for DomainReport {
    fn identity(&self) -> HandlerIdentity {
        api_class!("domain_report")
    }

    #[instrument(skip(self, api_key, input))]
    async fn process(&self, api_key: Option<&str>, input: &Map<String, Value>) -> Result<Cargo, SupplyError> {
        let domain = value_as_str(input, "domain")?;
        let resp = self
            .0
            .client
            .get(self.0.endpoint("domain/report"))
            .query(&[("apikey", api_key.unwrap_or_default()), ("domain", domain)])
            .send()
            .await
            .map_err(transport_failed)?;
        package_cargo(resp).await
    }
}

/// Accesses the VirusTotal endpoint for IP address reports.
///
/// The query parameter key is `url`, not `ip`, matching the original
/// system's handler — a quirk carried forward for wire compatibility.
#[derive(Debug, Clone)]
pub struct IpAddressReport(pub VirusTotalClient);

#[async_trait]
impl RequestHandler for IpAddressReport {
    fn identity(&self) -> HandlerIdentity {
        api_class!("ip_address_report")
    }

    #[instrument(skip(self, api_key, input))]
    async fn process(&self, api_key: Option<&str>, input: &Map<String, Value>) -> Result<Cargo, SupplyError> {
        let url_param = value_as_str(input, "url")?;
        let resp = self
            .0
            .client
            .get(self.0.endpoint("ip-address/report"))
            .query(&[("apikey", api_key.unwrap_or_default()), ("url", url_param)])
            .send()
            .await
            .map_err(transport_failed)?;
        package_cargo(resp).await
    }
}

/// Accesses the VirusTotal endpoint for file reports.
#[derive(Debug, Clone)]
pub struct FileReport(pub VirusTotalClient);

#[async_trait]
impl RequestHandler for FileReport {
    fn identity(&self) -> HandlerIdentity {
        api_class!("file_report")
    }

    #[instrument(skip(self, api_key, input))]
    async fn process(&self, api_key: Option<&str>, input: &Map<String, Value>) -> Result<Cargo, SupplyError> {
        let resource = value_as_str(input, "resource")?;
        let resp = self
            .0
            .client
            .get(self.0.endpoint("file/report"))
            .query(&[("apikey", api_key.unwrap_or_default()), ("resource", resource)])
            .send()
            .await
            .map_err(transport_failed)?;
        package_cargo(resp).await
    }
}

/// Accesses the VirusTotal endpoint for file rescanning.
#[derive(Debug, Clone)]
pub struct RescanReport(pub VirusTotalClient);

#[async_trait]
impl RequestHandler for RescanReport {
    fn identity(&self) -> HandlerIdentity {
        api_class!("rescan_report")
    }

    #[instrument(skip(self, api_key, input))]
    async fn process(&self, api_key: Option<&str>, input: &Map<String, Value>) -> Result<Cargo, SupplyError> {
        let resource = value_as_str(input, "resource")?;
        let resp = self
            .0
            .client
            .get(self.0.endpoint("file/rescan"))
            .query(&[("apikey", api_key.unwrap_or_default()), ("resource", resource)])
            .send()
            .await
            .map_err(transport_failed)?;
        package_cargo(resp).await
    }
}

/// Accesses the VirusTotal endpoint for file scanning (`multipart/form-data`).
#[derive(Debug, Clone)]
pub struct FileScan(pub VirusTotalClient);

#[async_trait]
impl RequestHandler for FileScan {
    fn identity(&self) -> HandlerIdentity {
        api_class!("file_scan")
    }

    #[instrument(skip(self, api_key, input))]
    async fn process(&self, api_key: Option<&str>, input: &Map<String, Value>) -> Result<Cargo, SupplyError> {
        let file_path = value_as_str(input, "file")?;
        let file_name = std::path::Path::new(file_path)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(file_path)
            .to_string();
        let bytes = tokio::fs::read(file_path)
            .await
            .map_err(|e| SupplyError::new(SupplyErrorCode::TransportRequestFailed, e.to_string()).with_source(e))?;
        let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name);
        let form = reqwest::multipart::Form::new().part("file", part);

        let resp = self
            .0
            .client
            .post(self.0.endpoint("file/scan"))
            .query(&[("apikey", api_key.unwrap_or_default())])
            .multipart(form)
            .send()
            .await
            .map_err(transport_failed)?;
        package_cargo(resp).await
    }
}

/// Accesses the VirusTotal endpoint for URL scanning.
#[derive(Debug, Clone)]
pub struct UrlScan(pub VirusTotalClient);

#[async_trait]
impl RequestHandler for UrlScan {
    fn identity(&self) -> HandlerIdentity {
        api_class!("url_scan")
    }

    #[instrument(skip(self, api_key, input))]
    async fn process(&self, api_key: Option<&str>, input: &Map<String, Value>) -> Result<Cargo, SupplyError> {
        let url_param = value_as_str(input, "url")?;
        let resp = self
            .0
            .client
            .post(self.0.endpoint("url/scan"))
            .form(&[("apikey", api_key.unwrap_or_default()), ("url", url_param)])
            .send()
            .await
            .map_err(transport_failed)?;
        package_cargo(resp).await
    }
}

/// Accesses the VirusTotal endpoint for URL reports.
///
/// Submits for analysis (`scan=1`) if no report is found yet, then polls up
/// to [`RETRIES`] times at [`WAIT_TIME_SECONDS`] intervals until the report
/// contains a `scans` key or retries are exhausted.
#[derive(Debug, Clone)]
pub struct UrlReport(pub VirusTotalClient);

impl UrlReport {
    async fn request_report(&self, api_key: Option<&str>, resource: &str) -> Result<Cargo, SupplyError> {
        let resp = self
            .0
            .client
            .post(self.0.endpoint("url/report"))
            .form(&[
                ("apikey", api_key.unwrap_or_default()),
                ("resource", resource),
                ("scan", "1"),
            ])
            .send()
            .await
            .map_err(transport_failed)?;
        package_cargo(resp).await
    }
}

#[async_trait]
impl RequestHandler for UrlReport {
    fn identity(&self) -> HandlerIdentity {
        api_class!("url_report")
    }

    #[instrument(skip(self, api_key, input))]
    async fn process(&self, api_key: Option<&str>, input: &Map<String, Value>) -> Result<Cargo, SupplyError> {
        let resource = value_as_str(input, "resource")?;
        let mut cargo = self.request_report(api_key, resource).await?;
        let mut tries = 0u32;

        loop {
            let needs_poll = matches!(&cargo.data, Value::Object(m) if !m.contains_key("scans") && m.contains_key("scan_id"));
            if !needs_poll || tries > RETRIES {
                break;
            }
            tokio::time::sleep(Duration::from_secs(WAIT_TIME_SECONDS)).await;
            let Value::Object(m) = &cargo.data else { break };
            let scan_id = m.get("scan_id").and_then(Value::as_str).unwrap_or_default().to_string();
            debug!(tries, %scan_id, "polling url/report for final result");
            cargo = self.request_report(api_key, &scan_id).await?;
            tries += 1;
        }

        Ok(cargo)
    }
}
