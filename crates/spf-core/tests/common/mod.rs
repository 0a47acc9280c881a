//! Test doubles and common utilities for contract tests
//!
//! This module provides in-memory stand-ins for the DNS provider and the TXT
//! resolver, with call counters and failure injection.

#![allow(dead_code)]

use spf_core::config::{EngineConfig, ProviderConfig, SpfConfig};
use spf_core::error::{Error, Result};
use spf_core::traits::{DnsProvider, RecordId, TxtResolver};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// A resolver answering from a fixed table
///
/// Unknown names resolve to no TXT records. Names marked as failing return a
/// resolution error.
#[derive(Default)]
pub struct StaticTxtResolver {
    answers: HashMap<String, Vec<String>>,
    failing: Vec<String>,
    query_count: Arc<AtomicUsize>,
}

impl StaticTxtResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish `txts` at `domain`
    pub fn with(mut self, domain: &str, txts: &[&str]) -> Self {
        self.answers.insert(
            domain.to_string(),
            txts.iter().map(|txt| txt.to_string()).collect(),
        );
        self
    }

    /// Make lookups of `domain` fail
    pub fn failing(mut self, domain: &str) -> Self {
        self.failing.push(domain.to_string());
        self
    }

    /// Get the number of times query() was called
    pub fn query_count(&self) -> usize {
        self.query_count.load(Ordering::SeqCst)
    }

    /// Shared handle on the query counter, readable after the resolver moved
    pub fn query_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.query_count)
    }
}

#[async_trait::async_trait]
impl TxtResolver for StaticTxtResolver {
    async fn query(&self, domain: &str) -> Result<Vec<String>> {
        self.query_count.fetch_add(1, Ordering::SeqCst);

        if self.failing.iter().any(|name| name == domain) {
            return Err(Error::resolution(domain, "SERVFAIL"));
        }
        Ok(self.answers.get(domain).cloned().unwrap_or_default())
    }

    fn resolver_name(&self) -> &'static str {
        "static"
    }
}

/// A stored TXT record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    pub id: RecordId,
    pub name: String,
    pub content: String,
}

#[derive(Default)]
struct ZoneState {
    records: Vec<StoredRecord>,
    next_id: usize,
}

#[derive(Default)]
struct Faults {
    /// Creates succeed this many times, then fail
    create_budget: Option<usize>,
    /// get_txt_record_content() fails for every record
    fail_get: bool,
    /// find_txt_records() fails for these names
    fail_find: Vec<String>,
    /// Deletes remove the record but report NotFound
    delete_reports_not_found: bool,
}

/// An in-memory DNS zone that tracks calls
///
/// Clones share the zone, the counters and the fault settings, so a test can
/// keep one handle after moving another into the engine.
#[derive(Clone, Default)]
pub struct InMemoryDnsProvider {
    zone: Arc<Mutex<ZoneState>>,
    faults: Arc<Mutex<Faults>>,
    create_count: Arc<AtomicUsize>,
    update_count: Arc<AtomicUsize>,
    delete_count: Arc<AtomicUsize>,
    find_count: Arc<AtomicUsize>,
    get_count: Arc<AtomicUsize>,
}

impl InMemoryDnsProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new provider that shares zone and counters with `other`
    pub fn sharing_counters_with(other: &Self) -> Self {
        other.clone()
    }

    /// Insert a record directly, bypassing the counters
    pub fn seed(&self, name: &str, content: &str) -> RecordId {
        let mut zone = self.zone.lock().unwrap();
        zone.next_id += 1;
        let id = RecordId::new(format!("rec-{}", zone.next_id));
        zone.records.push(StoredRecord {
            id: id.clone(),
            name: name.to_string(),
            content: content.to_string(),
        });
        id
    }

    /// All stored records, in creation order
    pub fn records(&self) -> Vec<StoredRecord> {
        self.zone.lock().unwrap().records.clone()
    }

    /// Contents stored at `name`
    pub fn contents_at(&self, name: &str) -> Vec<String> {
        self.records()
            .into_iter()
            .filter(|record| record.name == name)
            .map(|record| record.content)
            .collect()
    }

    /// Allow `n` successful creates, then fail every further one
    pub fn fail_creates_after(&self, n: usize) {
        self.faults.lock().unwrap().create_budget = Some(n);
    }

    pub fn fail_content_fetches(&self) {
        self.faults.lock().unwrap().fail_get = true;
    }

    pub fn fail_listing_at(&self, name: &str) {
        self.faults.lock().unwrap().fail_find.push(name.to_string());
    }

    pub fn report_not_found_on_delete(&self) {
        self.faults.lock().unwrap().delete_reports_not_found = true;
    }

    /// Remove every injected fault
    pub fn clear_faults(&self) {
        *self.faults.lock().unwrap() = Faults::default();
    }

    pub fn create_count(&self) -> usize {
        self.create_count.load(Ordering::SeqCst)
    }

    pub fn update_count(&self) -> usize {
        self.update_count.load(Ordering::SeqCst)
    }

    pub fn delete_count(&self) -> usize {
        self.delete_count.load(Ordering::SeqCst)
    }

    pub fn find_count(&self) -> usize {
        self.find_count.load(Ordering::SeqCst)
    }

    pub fn get_count(&self) -> usize {
        self.get_count.load(Ordering::SeqCst)
    }

    /// Number of write calls (create, update, delete)
    pub fn write_count(&self) -> usize {
        self.create_count() + self.update_count() + self.delete_count()
    }
}

#[async_trait::async_trait]
impl DnsProvider for InMemoryDnsProvider {
    async fn create_txt_record(&self, name: &str, content: &str) -> Result<RecordId> {
        let attempt = self.create_count.fetch_add(1, Ordering::SeqCst);

        if let Some(budget) = self.faults.lock().unwrap().create_budget {
            if attempt >= budget {
                return Err(Error::http("injected create failure"));
            }
        }
        Ok(self.seed(name, content))
    }

    async fn update_txt_record(&self, id: &RecordId, name: &str, content: &str) -> Result<()> {
        self.update_count.fetch_add(1, Ordering::SeqCst);

        let mut zone = self.zone.lock().unwrap();
        let record = zone
            .records
            .iter_mut()
            .find(|record| record.id == *id)
            .ok_or_else(|| Error::not_found(format!("record {}", id)))?;
        record.name = name.to_string();
        record.content = content.to_string();
        Ok(())
    }

    async fn delete_txt_record(&self, id: &RecordId) -> Result<()> {
        self.delete_count.fetch_add(1, Ordering::SeqCst);

        let mut zone = self.zone.lock().unwrap();
        let before = zone.records.len();
        zone.records.retain(|record| record.id != *id);

        if zone.records.len() == before || self.faults.lock().unwrap().delete_reports_not_found {
            return Err(Error::not_found(format!("record {}", id)));
        }
        Ok(())
    }

    async fn find_txt_records(&self, name: &str, substring: &str) -> Result<Vec<RecordId>> {
        self.find_count.fetch_add(1, Ordering::SeqCst);

        if self.faults.lock().unwrap().fail_find.iter().any(|n| n == name) {
            return Err(Error::http(format!("injected listing failure at {}", name)));
        }

        let zone = self.zone.lock().unwrap();
        Ok(zone
            .records
            .iter()
            .filter(|record| record.name == name && record.content.contains(substring))
            .map(|record| record.id.clone())
            .collect())
    }

    async fn get_txt_record_content(&self, id: &RecordId) -> Result<String> {
        self.get_count.fetch_add(1, Ordering::SeqCst);

        if self.faults.lock().unwrap().fail_get {
            return Err(Error::http("injected fetch failure"));
        }

        let zone = self.zone.lock().unwrap();
        zone.records
            .iter()
            .find(|record| record.id == *id)
            .map(|record| record.content.clone())
            .ok_or_else(|| Error::not_found(format!("record {}", id)))
    }

    fn provider_name(&self) -> &'static str {
        "memory"
    }
}

/// Create a minimal config for testing
pub fn minimal_config(domain: &str) -> SpfConfig {
    let mut config = SpfConfig::new(domain);
    config.provider = ProviderConfig::Cloudflare {
        api_token: "test-token".to_string(),
        zone_id: Some("test-zone".to_string()),
    };
    config
}

/// Minimal config whose engine always splits (any lookup exceeds the limit)
pub fn always_split_config(domain: &str) -> SpfConfig {
    minimal_config(domain).with_engine(EngineConfig {
        lookup_limit: 0,
        ..EngineConfig::default()
    })
}

/// `v=spf1 ip4:10.0.<n/256>.<n%256> ... <qualifier>all` with `n` addresses
pub fn vendor_policy(n: usize, all: &str) -> String {
    let mut txt = String::from("v=spf1");
    for i in 0..n {
        txt.push_str(&format!(" ip4:10.0.{}.{}", i / 256, i % 256));
    }
    txt.push(' ');
    txt.push_str(all);
    txt
}
