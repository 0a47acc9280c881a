// # DNS Provider Trait
//
// Defines the interface for reading and writing TXT records via a managed
// DNS provider API.
//
// ## Implementations
//
// - Cloudflare: `spf-provider-cloudflare` crate
// - Future: Route53, DigitalOcean, etc.
//
// ## Usage
//
// ```rust,ignore
// use spf_core::DnsProvider;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let provider = /* DnsProvider implementation */;
//
//     let ids = provider.find_txt_records("example.com", "v=spf1").await?;
//     for id in &ids {
//         println!("{}: {}", id, provider.get_txt_record_content(id).await?);
//     }
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque record identifier assigned by the provider
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId(String);

impl RecordId {
    /// Wrap a provider-issued ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw provider ID
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for RecordId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Trait for DNS provider implementations
///
/// This trait defines the TXT record operations the reconciler and the
/// engine rely on. Implementations handle the specifics of each provider's API.
///
/// # Thread Safety
///
/// Implementations must be thread-safe and usable across async tasks.
///
/// # Trust Level: Untrusted
///
/// Providers are isolated, single-shot integrations:
///
/// - Perform API calls to their own endpoints only
/// - Return success or failure; the caller decides what to do next
/// - No retry or backoff (a failed cycle is retried by the next cycle)
/// - No caching between calls
/// - No decision about whether a change is needed (owned by the reconciler)
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// Create a TXT record and return its new ID
    ///
    /// # Parameters
    ///
    /// - `name`: Fully qualified record name (e.g., "_spfa1b2c3.example.com")
    /// - `content`: TXT value
    async fn create_txt_record(&self, name: &str, content: &str) -> Result<RecordId, crate::Error>;

    /// Replace the content of an existing record, keeping its ID
    async fn update_txt_record(
        &self,
        id: &RecordId,
        name: &str,
        content: &str,
    ) -> Result<(), crate::Error>;

    /// Delete a record
    ///
    /// Returns [`crate::Error::NotFound`] when the ID no longer exists.
    async fn delete_txt_record(&self, id: &RecordId) -> Result<(), crate::Error>;

    /// List IDs of TXT records at `name` whose content contains `substring`
    ///
    /// An empty vector means no match; errors are reserved for failed calls.
    async fn find_txt_records(
        &self,
        name: &str,
        substring: &str,
    ) -> Result<Vec<RecordId>, crate::Error>;

    /// Fetch the content of a record by ID
    async fn get_txt_record_content(&self, id: &RecordId) -> Result<String, crate::Error>;

    /// Get the provider name (for logging/debugging)
    ///
    /// # Returns
    ///
    /// A static string identifying the provider (e.g., "cloudflare")
    fn provider_name(&self) -> &'static str;
}

/// Helper trait for constructing DNS providers from configuration
pub trait DnsProviderFactory: Send + Sync {
    /// Create a DnsProvider instance from configuration
    ///
    /// # Parameters
    ///
    /// - `config`: Configuration specific to this provider
    ///
    /// # Returns
    ///
    /// A boxed DnsProvider trait object
    fn create(
        &self,
        config: &crate::config::ProviderConfig,
    ) -> Result<Box<dyn DnsProvider>, crate::Error>;
}
