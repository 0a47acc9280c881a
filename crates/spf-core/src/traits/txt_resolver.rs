// # TXT Resolver Trait
//
// Defines the interface for querying TXT records of arbitrary domains while
// flattening `include:` mechanisms.
//
// ## Implementations
//
// - hickory-resolver: `spf-resolver-hickory` crate
// - Test doubles with canned answers

use async_trait::async_trait;

/// Trait for TXT resolver implementations
///
/// `query` must return every TXT string published at the name; the caller
/// filters out the ones that are not SPF. A name without TXT records is an
/// empty vector, not an error. Errors mean the lookup itself failed
/// (timeout, SERVFAIL, transport error) and abort the flatten.
///
/// TXT values split into several character-strings on the wire are returned
/// concatenated, without a separator.
#[async_trait]
pub trait TxtResolver: Send + Sync {
    /// Query all TXT strings at `domain`
    async fn query(&self, domain: &str) -> Result<Vec<String>, crate::Error>;

    /// Get the resolver name (for logging/debugging)
    fn resolver_name(&self) -> &'static str;
}

/// Helper trait for constructing TXT resolvers from configuration
pub trait TxtResolverFactory: Send + Sync {
    /// Create a TxtResolver instance from configuration
    fn create(
        &self,
        config: &crate::config::ResolverConfig,
    ) -> Result<Box<dyn TxtResolver>, crate::Error>;
}
