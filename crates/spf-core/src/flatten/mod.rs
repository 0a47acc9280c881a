//! Include flattening
//!
//! Resolves every `include:` of a record into the `ip4`/`ip6` mechanisms it
//! stands for, recursively, through a [`TxtResolver`].
//!
//! ## Rules
//!
//! 1. The input's own ip4/ip6 entries and qualifier seed the result
//! 2. Each include is queried once per occurrence; a successful query counts
//!    as one lookup
//! 3. TXT strings that do not parse as SPF are skipped
//! 4. Parsed sub-records that still include other domains are flattened first,
//!    and their lookups are added to the total
//! 5. A resolver failure aborts the whole flatten; a partial policy is never
//!    returned
//!
//! Include chains are tracked while descending. Re-entering a domain that is
//! already on the chain, or descending past [`MAX_INCLUDE_DEPTH`], fails with
//! [`Error::Cycle`].

use std::future::Future;
use std::pin::Pin;
use tracing::debug;

use crate::error::{Error, Result};
use crate::record::SpfRecord;
use crate::traits::TxtResolver;

/// Deepest include chain followed before giving up
pub const MAX_INCLUDE_DEPTH: usize = 32;

type FlattenFuture<'a> = Pin<Box<dyn Future<Output = Result<SpfRecord>> + Send + 'a>>;

/// Flattens records through a borrowed TXT resolver
pub struct Flattener<'r> {
    resolver: &'r dyn TxtResolver,
}

impl<'r> Flattener<'r> {
    /// Create a flattener backed by `resolver`
    pub fn new(resolver: &'r dyn TxtResolver) -> Self {
        Self { resolver }
    }

    /// Produce an include-free copy of `record`.
    ///
    /// The input is not modified. The result's `lookup_count` is the number
    /// of successful TXT queries performed, nested ones included.
    pub async fn flatten(&self, record: &SpfRecord) -> Result<SpfRecord> {
        let mut chain = Vec::new();
        self.flatten_chain(record, &mut chain).await
    }

    fn flatten_chain<'a>(
        &'a self,
        record: &'a SpfRecord,
        chain: &'a mut Vec<String>,
    ) -> FlattenFuture<'a> {
        Box::pin(async move {
            let mut aggregate = SpfRecord {
                ip4: record.ip4.clone(),
                ip6: record.ip6.clone(),
                include: Vec::new(),
                qualifier: record.qualifier,
                lookup_count: 0,
            };

            for domain in &record.include {
                if chain.iter().any(|seen| seen.eq_ignore_ascii_case(domain)) {
                    return Err(Error::cycle(format!(
                        "{} -> {}",
                        chain.join(" -> "),
                        domain
                    )));
                }
                if chain.len() >= MAX_INCLUDE_DEPTH {
                    return Err(Error::cycle(format!(
                        "include chain deeper than {} at {}",
                        MAX_INCLUDE_DEPTH, domain
                    )));
                }

                let txts = self.resolver.query(domain).await.map_err(|e| match e {
                    Error::Resolution { .. } => e,
                    other => Error::resolution(domain.as_str(), other.to_string()),
                })?;
                aggregate.lookup_count += 1;
                debug!(
                    resolver = self.resolver.resolver_name(),
                    "Resolved include {} ({} TXT record(s))",
                    domain,
                    txts.len()
                );

                chain.push(domain.clone());
                for txt in &txts {
                    let sub = match SpfRecord::parse(txt) {
                        Ok(sub) => sub,
                        Err(e) => {
                            debug!("Ignoring TXT record at {}: {}", domain, e);
                            continue;
                        }
                    };

                    let sub = if sub.has_includes() {
                        self.flatten_chain(&sub, &mut *chain).await?
                    } else {
                        sub
                    };

                    aggregate.merge(&sub);
                    aggregate.lookup_count += sub.lookup_count;
                }
                chain.pop();
            }

            Ok(aggregate)
        })
    }
}

/// Flatten `record` with `resolver`; see [`Flattener::flatten`]
pub async fn flatten(record: &SpfRecord, resolver: &dyn TxtResolver) -> Result<SpfRecord> {
    Flattener::new(resolver).flatten(record).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Qualifier;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MapResolver {
        answers: HashMap<String, Vec<String>>,
        failing: Vec<String>,
        queries: Mutex<Vec<String>>,
    }

    impl MapResolver {
        fn with(mut self, domain: &str, txts: &[&str]) -> Self {
            self.answers
                .insert(domain.to_string(), txts.iter().map(|s| s.to_string()).collect());
            self
        }

        fn failing(mut self, domain: &str) -> Self {
            self.failing.push(domain.to_string());
            self
        }
    }

    #[async_trait]
    impl TxtResolver for MapResolver {
        async fn query(&self, domain: &str) -> Result<Vec<String>> {
            self.queries.lock().unwrap().push(domain.to_string());
            if self.failing.iter().any(|d| d == domain) {
                return Err(Error::resolution(domain, "SERVFAIL"));
            }
            Ok(self.answers.get(domain).cloned().unwrap_or_default())
        }

        fn resolver_name(&self) -> &'static str {
            "map"
        }
    }

    #[tokio::test]
    async fn test_single_include() {
        let resolver = MapResolver::default().with("_spf.vendor.com", &["v=spf1 ip4:9.9.9.9/32 ~all"]);
        let input = SpfRecord::parse("v=spf1 include:_spf.vendor.com ~all").unwrap();

        let flat = flatten(&input, &resolver).await.unwrap();

        assert_eq!(flat.ip4.iter().collect::<Vec<_>>(), vec!["9.9.9.9/32"]);
        assert!(flat.include.is_empty());
        assert_eq!(flat.lookup_count, 1);
        assert_eq!(flat.qualifier, Qualifier::SoftFail);
        // input untouched
        assert_eq!(input.include, vec!["_spf.vendor.com"]);
    }

    #[tokio::test]
    async fn test_nested_includes_count_every_lookup() {
        let resolver = MapResolver::default()
            .with("a.example.com", &["v=spf1 ip4:1.1.1.1 include:b.example.com -all"])
            .with("b.example.com", &["v=spf1 ip6:2001:db8::/32 include:c.example.com -all"])
            .with("c.example.com", &["v=spf1 ip4:3.3.3.3 -all"]);
        let input = SpfRecord::parse("v=spf1 ip4:10.0.0.1 include:a.example.com -all").unwrap();

        let flat = flatten(&input, &resolver).await.unwrap();

        assert_eq!(
            flat.ip4.iter().collect::<Vec<_>>(),
            vec!["10.0.0.1", "1.1.1.1", "3.3.3.3"]
        );
        assert_eq!(flat.ip6.iter().collect::<Vec<_>>(), vec!["2001:db8::/32"]);
        assert_eq!(flat.lookup_count, 3);
        assert_eq!(flat.qualifier, Qualifier::Fail);
    }

    #[tokio::test]
    async fn test_non_spf_txt_is_ignored() {
        let resolver = MapResolver::default().with(
            "vendor.com",
            &["google-site-verification=xyz", "v=spf1 a mx -all", "v=spf1 ip4:4.4.4.4 ?all"],
        );
        let input = SpfRecord::parse("v=spf1 include:vendor.com ?all").unwrap();

        let flat = flatten(&input, &resolver).await.unwrap();

        assert_eq!(flat.ip4.iter().collect::<Vec<_>>(), vec!["4.4.4.4"]);
        assert_eq!(flat.qualifier, Qualifier::Neutral);
        assert_eq!(flat.lookup_count, 1);
    }

    #[tokio::test]
    async fn test_empty_answer_still_counts_lookup() {
        let resolver = MapResolver::default();
        let input = SpfRecord::parse("v=spf1 include:nothing.example.com -all").unwrap();

        let flat = flatten(&input, &resolver).await.unwrap();

        assert_eq!(flat.cidr_count(), 0);
        assert_eq!(flat.lookup_count, 1);
    }

    #[tokio::test]
    async fn test_resolution_failure_aborts() {
        let resolver = MapResolver::default()
            .with("a.example.com", &["v=spf1 include:b.example.com -all"])
            .failing("b.example.com");
        let input = SpfRecord::parse("v=spf1 include:a.example.com -all").unwrap();

        let err = flatten(&input, &resolver).await.unwrap_err();

        assert!(matches!(err, Error::Resolution { ref domain, .. } if domain == "b.example.com"));
    }

    #[tokio::test]
    async fn test_cycle_is_detected() {
        let resolver = MapResolver::default()
            .with("a.example.com", &["v=spf1 include:b.example.com -all"])
            .with("b.example.com", &["v=spf1 include:a.example.com -all"]);
        let input = SpfRecord::parse("v=spf1 include:a.example.com -all").unwrap();

        let err = flatten(&input, &resolver).await.unwrap_err();

        assert!(matches!(err, Error::Cycle(_)));
        assert_eq!(resolver.queries.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_diamond_is_not_a_cycle() {
        let resolver = MapResolver::default()
            .with("a.example.com", &["v=spf1 include:shared.example.com -all"])
            .with("b.example.com", &["v=spf1 include:shared.example.com -all"])
            .with("shared.example.com", &["v=spf1 ip4:5.5.5.5 -all"]);
        let input =
            SpfRecord::parse("v=spf1 include:a.example.com include:b.example.com -all").unwrap();

        let flat = flatten(&input, &resolver).await.unwrap();

        assert_eq!(flat.ip4.iter().collect::<Vec<_>>(), vec!["5.5.5.5"]);
        assert_eq!(flat.lookup_count, 4);
    }

    #[tokio::test]
    async fn test_depth_limit() {
        let mut resolver = MapResolver::default();
        for i in 0..=MAX_INCLUDE_DEPTH {
            let txt = format!("v=spf1 include:d{}.example.com -all", i + 1);
            resolver = resolver.with(&format!("d{}.example.com", i), &[txt.as_str()]);
        }
        let input = SpfRecord::parse("v=spf1 include:d0.example.com -all").unwrap();

        let err = flatten(&input, &resolver).await.unwrap_err();

        assert!(err.to_string().contains("deeper than"));
    }
}
