// # Cloudflare DNS Provider
//
// This crate provides the Cloudflare implementation of the TXT record
// operations the SPF flattener needs.
//
// ## Behavior
//
// - One HTTP request per trait call (plus zone discovery, at most once);
//   listings follow `result_info.total_pages` one request per page
// - Errors are mapped from HTTP status codes and returned to the caller
// - HTTP timeout of 30 seconds
// - Zone ID taken from configuration, or discovered from the first record
//   name seen and kept for the provider's lifetime
// - No retry, backoff or write planning (owned by the engine)
//
// ## Security Requirements
//
// - API token NEVER appears in logs or Debug output
// - Provider creation fails if the token is empty
//
// ## API Reference
//
// - Cloudflare API v4: https://developers.cloudflare.com/api/
// - List Zones: GET `/zones?name=...`
// - List DNS Records: GET `/zones/:zone_id/dns_records?type=TXT&name=...`
// - DNS Record Details: GET `/zones/:zone_id/dns_records/:record_id`
// - Create DNS Record: POST `/zones/:zone_id/dns_records`
// - Update DNS Record: PUT `/zones/:zone_id/dns_records/:record_id`
// - Delete DNS Record: DELETE `/zones/:zone_id/dns_records/:record_id`

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use spf_core::config::ProviderConfig;
use spf_core::traits::{DnsProvider, DnsProviderFactory, RecordId};
use spf_core::{Error, Result};
use std::time::Duration;
use tokio::sync::OnceCell;

/// Cloudflare API base URL
const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Records requested per page when listing
const LIST_PAGE_SIZE: u32 = 100;

/// TTL value meaning "automatic"
const AUTO_TTL: u32 = 1;

/// Cloudflare API envelope
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(default)]
    errors: Vec<ApiMessage>,
    result: Option<T>,
    #[serde(default)]
    result_info: Option<ResultInfo>,
}

/// Paging metadata of list responses
#[derive(Debug, Deserialize)]
struct ResultInfo {
    #[serde(default)]
    total_pages: u32,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct Zone {
    id: String,
}

#[derive(Debug, Deserialize)]
struct DnsRecord {
    id: String,
    #[serde(default)]
    content: String,
}

/// Cloudflare DNS provider
///
/// The Debug implementation does NOT expose the API token.
pub struct CloudflareProvider {
    /// Cloudflare API token
    /// ⚠️ NEVER log this value
    api_token: String,

    /// Zone ID, configured or discovered
    zone_id: OnceCell<String>,

    /// API endpoint, overridable for testing
    base_url: String,

    /// HTTP client for API requests
    client: reqwest::Client,
}

// Custom Debug implementation that hides the API token
impl std::fmt::Debug for CloudflareProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareProvider")
            .field("api_token", &"<REDACTED>")
            .field("zone_id", &self.zone_id.get())
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl CloudflareProvider {
    /// Create a new Cloudflare provider
    ///
    /// # Parameters
    ///
    /// - `api_token`: Cloudflare API token with Zone:DNS:Edit permissions
    /// - `zone_id`: Optional zone ID (auto-detected when absent)
    pub fn new(api_token: impl Into<String>, zone_id: Option<String>) -> Result<Self> {
        let api_token = api_token.into();
        if api_token.is_empty() {
            return Err(Error::config("Cloudflare API token cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        let zone = match zone_id.filter(|id| !id.is_empty()) {
            Some(id) => OnceCell::new_with(Some(id)),
            None => OnceCell::new(),
        };

        Ok(Self {
            api_token,
            zone_id: zone,
            base_url: CLOUDFLARE_API_BASE.to_string(),
            client,
        })
    }

    /// Point the provider at a different API endpoint
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Zone ID for calls that only carry a record ID
    fn known_zone_id(&self) -> Result<&str> {
        self.zone_id.get().map(String::as_str).ok_or_else(|| {
            Error::config("Cloudflare zone ID unknown: configure it or list records first")
        })
    }

    /// Zone ID containing `record_name`, discovering it on first use
    async fn zone_id_for(&self, record_name: &str) -> Result<&str> {
        let id = self
            .zone_id
            .get_or_try_init(|| self.discover_zone_id(record_name))
            .await?;
        Ok(id.as_str())
    }

    /// Find the most specific zone enclosing `record_name`
    ///
    /// # API Call
    ///
    /// ```http
    /// GET /zones?name=example.com
    /// Authorization: Bearer <token>
    /// ```
    async fn discover_zone_id(&self, record_name: &str) -> Result<String> {
        let name = record_name.trim_end_matches('.');

        for candidate in zone_candidates(name) {
            tracing::debug!("Looking up zone ID for: {}", candidate);

            let url = format!("{}/zones?name={}", self.base_url, candidate);
            let zones: Vec<Zone> = self.send(self.client.get(&url), "Zone lookup").await?;

            if let Some(zone) = zones.into_iter().next() {
                tracing::debug!("Found zone ID: {}", zone.id);
                return Ok(zone.id);
            }
        }

        Err(Error::not_found(format!("No Cloudflare zone encloses {}", name)))
    }

    /// Send an authorized request and unwrap the API envelope
    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        context: &str,
    ) -> Result<T> {
        let envelope = self.fetch(request, context).await?;
        unwrap_envelope(envelope, context)
    }

    /// Send an authorized request and decode the API envelope
    async fn fetch<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        context: &str,
    ) -> Result<ApiResponse<T>> {
        let response = request
            .bearer_auth(&self.api_token)
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(|e| Error::http(format!("{}: request failed: {}", context, e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(status_error(status.as_u16(), &error_text, context));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::http(format!("{}: failed to read response: {}", context, e)))?;
        parse_envelope(&body)
    }

    fn records_url(&self, zone_id: &str) -> String {
        format!("{}/zones/{}/dns_records", self.base_url, zone_id)
    }

    fn record_url(&self, zone_id: &str, id: &RecordId) -> String {
        format!("{}/zones/{}/dns_records/{}", self.base_url, zone_id, id)
    }
}

/// Suffixes of `name` with at least two labels, most specific first
fn zone_candidates(name: &str) -> Vec<&str> {
    let mut candidates = Vec::new();
    let mut rest = name;
    while rest.contains('.') {
        candidates.push(rest);
        match rest.split_once('.') {
            Some((_, tail)) => rest = tail,
            None => break,
        }
    }
    candidates
}

/// Map a non-success HTTP status to an error
fn status_error(status: u16, body: &str, context: &str) -> Error {
    match status {
        401 | 403 => Error::auth(format!(
            "{}: invalid API token or insufficient permissions (status {})",
            context, status
        )),
        404 => Error::not_found(format!("{}: {}", context, body)),
        429 => Error::rate_limited(format!("{}: status {}", context, status)),
        500..=599 => Error::provider(
            "cloudflare",
            format!("{}: server error (transient): {} - {}", context, status, body),
        ),
        _ => Error::provider("cloudflare", format!("{}: {} - {}", context, status, body)),
    }
}

/// Decode a response body into the API envelope
fn parse_envelope<T: DeserializeOwned>(body: &[u8]) -> Result<ApiResponse<T>> {
    Ok(serde_json::from_slice(body)?)
}

/// Page to request after `page`, if the listing has more
fn next_page(info: Option<&ResultInfo>, page: u32) -> Option<u32> {
    info.filter(|info| page < info.total_pages).map(|_| page + 1)
}

/// Check the envelope's success flag and take its result
fn unwrap_envelope<T>(envelope: ApiResponse<T>, context: &str) -> Result<T> {
    if !envelope.success {
        let detail = envelope
            .errors
            .iter()
            .map(|e| format!("{} ({})", e.message, e.code))
            .collect::<Vec<_>>()
            .join("; ");
        return Err(Error::provider("cloudflare", format!("{}: {}", context, detail)));
    }

    envelope
        .result
        .ok_or_else(|| Error::provider("cloudflare", format!("{}: response has no result", context)))
}

/// Decode TXT content as Cloudflare may return it
///
/// Cloudflare can return TXT content as quoted character-strings
/// (`"v=spf1 " "-all"`). Quoted content is unescaped and joined; anything
/// else is returned unchanged.
fn unquote_txt(content: &str) -> String {
    let trimmed = content.trim();
    if !(trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"')) {
        return content.to_string();
    }

    let mut out = String::with_capacity(trimmed.len());
    let mut in_quotes = false;
    let mut chars = trimmed.chars();
    while let Some(c) = chars.next() {
        match c {
            '"' => in_quotes = !in_quotes,
            '\\' if in_quotes => {
                if let Some(escaped) = chars.next() {
                    out.push(escaped);
                }
            }
            _ if in_quotes => out.push(c),
            _ => {}
        }
    }
    out
}

#[async_trait]
impl DnsProvider for CloudflareProvider {
    async fn create_txt_record(&self, name: &str, content: &str) -> Result<RecordId> {
        let zone_id = self.zone_id_for(name).await?;
        let payload = serde_json::json!({
            "type": "TXT",
            "name": name,
            "content": content,
            "ttl": AUTO_TTL,
        });

        let record: DnsRecord = self
            .send(
                self.client.post(self.records_url(zone_id)).json(&payload),
                "Create TXT record",
            )
            .await?;

        tracing::info!("Created TXT record {} ({})", name, record.id);
        Ok(RecordId::new(record.id))
    }

    async fn update_txt_record(&self, id: &RecordId, name: &str, content: &str) -> Result<()> {
        let zone_id = self.zone_id_for(name).await?;
        let payload = serde_json::json!({
            "type": "TXT",
            "name": name,
            "content": content,
            "ttl": AUTO_TTL,
        });

        let _: DnsRecord = self
            .send(
                self.client.put(self.record_url(zone_id, id)).json(&payload),
                "Update TXT record",
            )
            .await?;

        tracing::info!("Updated TXT record {} ({})", name, id);
        Ok(())
    }

    async fn delete_txt_record(&self, id: &RecordId) -> Result<()> {
        let zone_id = self.known_zone_id()?;

        let _: serde_json::Value = self
            .send(
                self.client.delete(self.record_url(zone_id, id)),
                "Delete TXT record",
            )
            .await?;

        tracing::info!("Deleted TXT record {}", id);
        Ok(())
    }

    async fn find_txt_records(&self, name: &str, substring: &str) -> Result<Vec<RecordId>> {
        let zone_id = self.zone_id_for(name).await?;
        let mut ids = Vec::new();
        let mut page: u32 = 1;

        loop {
            let request = self.client.get(self.records_url(zone_id)).query(&[
                ("type", "TXT".to_string()),
                ("name", name.to_string()),
                ("page", page.to_string()),
                ("per_page", LIST_PAGE_SIZE.to_string()),
            ]);

            let envelope: ApiResponse<Vec<DnsRecord>> =
                self.fetch(request, "List TXT records").await?;
            let next = next_page(envelope.result_info.as_ref(), page);
            let records = unwrap_envelope(envelope, "List TXT records")?;

            ids.extend(
                records
                    .into_iter()
                    .filter(|record| unquote_txt(&record.content).contains(substring))
                    .map(|record| RecordId::new(record.id)),
            );

            match next {
                Some(n) => page = n,
                None => break,
            }
        }

        tracing::debug!("Found {} TXT record(s) at {} matching", ids.len(), name);
        Ok(ids)
    }

    async fn get_txt_record_content(&self, id: &RecordId) -> Result<String> {
        let zone_id = self.known_zone_id()?;

        let record: DnsRecord = self
            .send(self.client.get(self.record_url(zone_id, id)), "Get TXT record")
            .await?;

        Ok(unquote_txt(&record.content))
    }

    fn provider_name(&self) -> &'static str {
        "cloudflare"
    }
}

/// Factory for creating Cloudflare providers
pub struct CloudflareFactory;

impl DnsProviderFactory for CloudflareFactory {
    fn create(&self, config: &ProviderConfig) -> Result<Box<dyn DnsProvider>> {
        match config {
            ProviderConfig::Cloudflare { api_token, zone_id } => {
                if api_token.is_empty() {
                    return Err(Error::config("Cloudflare API token is required"));
                }

                Ok(Box::new(CloudflareProvider::new(
                    api_token.clone(),
                    zone_id.clone(),
                )?))
            }
            _ => Err(Error::config("Invalid config for Cloudflare provider")),
        }
    }
}

/// Register the Cloudflare provider with a registry
///
/// # Example
///
/// ```rust
/// use spf_core::ProviderRegistry;
///
/// let registry = ProviderRegistry::new();
/// spf_provider_cloudflare::register(&registry);
/// assert!(registry.has_provider("cloudflare"));
/// ```
pub fn register(registry: &spf_core::ProviderRegistry) {
    registry.register_provider("cloudflare", Box::new(CloudflareFactory));
}
