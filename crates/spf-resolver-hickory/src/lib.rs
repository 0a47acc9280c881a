// # hickory TXT Resolver
//
// This crate provides the TXT resolver the SPF flattener uses to follow
// `include:` mechanisms, built on hickory-resolver.
//
// ## Upstreams
//
// - `system`: the host's resolv.conf
// - `cloudflare`, `google`, `quad9`: well-known public resolvers
//
// ## Answer Handling
//
// - NXDOMAIN and empty answers are an empty list, not an error
// - Character-strings of one TXT record are joined without a separator
// - Queries are sent for the fully qualified name, so search domains never
//   apply

use spf_core::ProviderRegistry;
use spf_core::config::ResolverConfig;
use spf_core::traits::{TxtResolver, TxtResolverFactory};
use spf_core::{Error, Result};

use hickory_resolver::Resolver;
use hickory_resolver::config::ResolverConfig as UpstreamConfig;
use hickory_resolver::name_server::TokioConnectionProvider;
use tracing::debug;

/// TXT resolver backed by hickory-resolver
pub struct HickoryTxtResolver {
    resolver: Resolver<TokioConnectionProvider>,
}

impl HickoryTxtResolver {
    /// Resolver using the host's system configuration
    pub fn system() -> Result<Self> {
        let builder = Resolver::builder_tokio().map_err(|e| {
            Error::config(format!("Failed to read system resolver configuration: {}", e))
        })?;
        Ok(Self {
            resolver: builder.build(),
        })
    }

    /// Resolver sending queries to the given upstream configuration
    pub fn with_upstream(config: UpstreamConfig) -> Self {
        let resolver =
            Resolver::builder_with_config(config, TokioConnectionProvider::default()).build();
        Self { resolver }
    }

    /// Build a resolver for one of the built-in upstream choices
    pub fn from_config(config: &ResolverConfig) -> Result<Self> {
        match config {
            ResolverConfig::System => Self::system(),
            ResolverConfig::Cloudflare => Ok(Self::with_upstream(UpstreamConfig::cloudflare())),
            ResolverConfig::Google => Ok(Self::with_upstream(UpstreamConfig::google())),
            ResolverConfig::Quad9 => Ok(Self::with_upstream(UpstreamConfig::quad9())),
            ResolverConfig::Custom { factory, .. } => Err(Error::config(format!(
                "Resolver factory '{}' is not handled by hickory",
                factory
            ))),
        }
    }
}

/// Absolute form of `domain`
fn fully_qualified(domain: &str) -> String {
    if domain.ends_with('.') {
        domain.to_string()
    } else {
        format!("{}.", domain)
    }
}

/// Join the character-strings of one TXT record
fn join_character_strings(chunks: &[Box<[u8]>]) -> String {
    let bytes: Vec<u8> = chunks.iter().flat_map(|chunk| chunk.iter().copied()).collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

#[async_trait::async_trait]
impl TxtResolver for HickoryTxtResolver {
    async fn query(&self, domain: &str) -> Result<Vec<String>> {
        let lookup = match self.resolver.txt_lookup(fully_qualified(domain)).await {
            Ok(lookup) => lookup,
            Err(e) if e.is_no_records_found() => {
                debug!("No TXT records at {}", domain);
                return Ok(Vec::new());
            }
            Err(e) => return Err(Error::resolution(domain, e.to_string())),
        };

        Ok(lookup
            .iter()
            .map(|txt| join_character_strings(txt.txt_data()))
            .collect())
    }

    fn resolver_name(&self) -> &'static str {
        "hickory"
    }
}

/// Factory for creating hickory resolvers
pub struct HickoryResolverFactory;

impl TxtResolverFactory for HickoryResolverFactory {
    fn create(&self, config: &ResolverConfig) -> Result<Box<dyn TxtResolver>> {
        Ok(Box::new(HickoryTxtResolver::from_config(config)?))
    }
}

/// Register the hickory resolver with a registry
pub fn register(registry: &ProviderRegistry) {
    registry.register_resolver("hickory", Box::new(HickoryResolverFactory));
}
