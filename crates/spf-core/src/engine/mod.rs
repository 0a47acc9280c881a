//! Core SPF update engine
//!
//! The SpfEngine is responsible for:
//! - Flattening the desired policy through the TXT resolver
//! - Deciding between an inline record and a split record set
//! - Reconciling against the provider's current records
//! - Applying the plan, and remembering what was applied
//!
//! ## Architecture
//!
//! ```text
//!                    ┌──────────────┐
//!   desired SPF ───▶ │  SpfEngine   │
//!                    └──────────────┘
//!                           │
//!     ┌─────────────────────┼──────────────────────┐
//!     │                     │                      │
//!     ▼                     ▼                      ▼
//! ┌─────────────┐   ┌──────────────┐       ┌─────────────┐
//! │ TxtResolver │   │ DnsProvider  │       │   Events    │
//! │ (flatten)   │   │ (reconcile,  │       │  (notify)   │
//! └─────────────┘   │  apply)      │       └─────────────┘
//!                   └──────────────┘
//! ```
//!
//! ## Cycle Flow
//!
//! 1. Flatten the desired policy
//! 2. Within the lookup limit and the per-record mechanism capacity, publish
//!    the policy text as written; otherwise split the flattened record into
//!    `<prefix><hash>.<domain>` sub-records referenced from a generated top
//!    record
//! 3. Skip if this exact record set was applied recently (memo)
//! 4. Reconcile; stop if already converged
//! 5. Create missing sub-records, create or update the top record, delete
//!    stale ones
//!
//! Any error aborts the rest of the cycle. Writes already made are left in
//! place; the next cycle's reconcile repairs them.

use crate::config::{EngineConfig, SpfConfig};
use crate::error::{Error, Result};
use crate::flatten::Flattener;
use crate::reconcile::{ReconcilePlan, Reconciler};
use crate::record::{NamedRecord, SpfRecord};
use crate::split::split_with_capacity;
use crate::state::{UpdateMemo, desired_state_digest};
use crate::traits::{DnsProvider, TxtResolver};
use sha1::{Digest, Sha1};
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::IntervalStream;
use tracing::{debug, error, info, warn};

/// Events emitted by the SpfEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Long-running mode started
    Started {
        domain: String,
    },

    /// An update cycle began
    CycleStarted {
        domain: String,
    },

    /// The desired policy was flattened
    Flattened {
        lookup_count: usize,
        cidr_count: usize,
        sub_records: usize,
    },

    /// Nothing to write
    UpdateSkipped {
        domain: String,
        reason: String,
    },

    /// The plan was applied
    UpdateApplied {
        domain: String,
        created: usize,
        updated: usize,
        deleted: usize,
        dry_run: bool,
    },

    /// The cycle failed
    UpdateFailed {
        domain: String,
        error: String,
    },

    /// Long-running mode stopped
    Stopped {
        reason: String,
    },
}

/// Result of one update cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Published records already match
    Unchanged,

    /// Same record set was applied recently; provider not consulted
    Skipped,

    /// Writes were made (or logged, in dry-run mode)
    Applied {
        created: usize,
        updated: usize,
        deleted: usize,
        dry_run: bool,
    },
}

/// Records one cycle wants published
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredRecords {
    /// Record at the managed domain
    pub top: NamedRecord,

    /// Generated sub-records, empty when the policy is published inline
    pub subs: Vec<NamedRecord>,
}

/// Name of a generated sub-record: `<prefix><fingerprint>.<domain>`
///
/// The fingerprint is the first three bytes of the SHA-1 of `content` as
/// lowercase hex, so identical content always lands on the same name.
pub fn sub_record_name(prefix: &str, domain: &str, content: &str) -> String {
    let digest = Sha1::digest(content.as_bytes());
    format!("{}{}.{}", prefix, hex::encode(&digest[..3]), domain)
}

/// Core SPF engine
///
/// ## Lifecycle
///
/// 1. Create with [`SpfEngine::new()`]
/// 2. Run one cycle with [`SpfEngine::update()`] (single-shot), or
/// 3. Run cycles on an interval with [`SpfEngine::run()`] until shutdown
///
/// ## Threading
///
/// Cycles run one at a time on the caller's task. The memo of the last
/// applied state is owned by the caller of [`SpfEngine::update_with_memo()`];
/// `run()` keeps one for its own lifetime.
pub struct SpfEngine {
    /// DNS provider for reading and writing records
    provider: Box<dyn DnsProvider>,

    /// TXT resolver used while flattening
    resolver: Box<dyn TxtResolver>,

    /// Managed domain
    domain: String,

    /// Prefix of generated sub-record names
    subdomain_prefix: String,

    /// Engine settings
    settings: EngineConfig,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<EngineEvent>,
}

impl SpfEngine {
    /// Create a new SPF engine
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields engine events
    pub fn new(
        provider: Box<dyn DnsProvider>,
        resolver: Box<dyn TxtResolver>,
        config: SpfConfig,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>)> {
        config.validate_target()?;
        config.engine.validate()?;

        let (tx, rx) = mpsc::channel(config.engine.event_channel_capacity);

        let engine = Self {
            provider,
            resolver,
            domain: config.domain,
            subdomain_prefix: config.subdomain_prefix,
            settings: config.engine,
            event_tx: tx,
        };

        Ok((engine, rx))
    }

    /// Managed domain
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Run a single update cycle without any memo
    pub async fn update(&self, desired: &SpfRecord) -> Result<CycleOutcome> {
        let mut memo = UpdateMemo::new();
        self.update_with_memo(desired, &mut memo).await
    }

    /// Run a single update cycle, consulting and refreshing `memo`
    ///
    /// `memo` is only written after the cycle succeeded.
    pub async fn update_with_memo(
        &self,
        desired: &SpfRecord,
        memo: &mut UpdateMemo,
    ) -> Result<CycleOutcome> {
        self.emit_event(EngineEvent::CycleStarted {
            domain: self.domain.clone(),
        });

        let result = self.run_cycle(desired, memo).await;

        match &result {
            Ok(CycleOutcome::Unchanged) => self.emit_event(EngineEvent::UpdateSkipped {
                domain: self.domain.clone(),
                reason: "Published records are up to date".to_string(),
            }),
            Ok(CycleOutcome::Skipped) => self.emit_event(EngineEvent::UpdateSkipped {
                domain: self.domain.clone(),
                reason: "Record set unchanged since last update".to_string(),
            }),
            Ok(CycleOutcome::Applied {
                created,
                updated,
                deleted,
                dry_run,
            }) => self.emit_event(EngineEvent::UpdateApplied {
                domain: self.domain.clone(),
                created: *created,
                updated: *updated,
                deleted: *deleted,
                dry_run: *dry_run,
            }),
            Err(e) => self.emit_event(EngineEvent::UpdateFailed {
                domain: self.domain.clone(),
                error: e.to_string(),
            }),
        }

        result
    }

    async fn run_cycle(&self, desired: &SpfRecord, memo: &mut UpdateMemo) -> Result<CycleOutcome> {
        let flat = Flattener::new(self.resolver.as_ref()).flatten(desired).await?;
        let records = self.desired_records(desired, &flat)?;

        self.emit_event(EngineEvent::Flattened {
            lookup_count: flat.lookup_count,
            cidr_count: flat.cidr_count(),
            sub_records: records.subs.len(),
        });
        debug!(
            "Flattened {}: {} lookup(s), {} CIDR(s), {} sub-record(s)",
            self.domain,
            flat.lookup_count,
            flat.cidr_count(),
            records.subs.len()
        );

        let digest = desired_state_digest(&records.top, &records.subs);
        let max_age = chrono::Duration::seconds(
            i64::try_from(self.settings.memo_max_age_secs).unwrap_or(i64::MAX),
        );
        if memo.is_fresh(&digest, max_age) {
            debug!("Record set for {} unchanged since last update, skipping", self.domain);
            return Ok(CycleOutcome::Skipped);
        }

        let plan = Reconciler::new(self.provider.as_ref())
            .plan_records(&self.domain, &records.top, &records.subs)
            .await?;

        if !plan.needs_change {
            info!("SPF records for {} are up to date", self.domain);
            memo.record(digest);
            return Ok(CycleOutcome::Unchanged);
        }

        let outcome = self.apply(&records, &plan).await?;

        if !self.settings.dry_run {
            memo.record(digest);
        }
        Ok(outcome)
    }

    /// Compute the records to publish for `desired`, given its flattened form
    ///
    /// Within the lookup limit and the per-record mechanism capacity the top
    /// record is `desired` as written, so user-authored includes survive.
    /// Beyond either, `flat` is split and the top record only includes the
    /// generated sub-records.
    pub fn desired_records(&self, desired: &SpfRecord, flat: &SpfRecord) -> Result<DesiredRecords> {
        if flat.lookup_count <= self.settings.lookup_limit
            && flat.cidr_count() <= self.settings.max_mechanisms_per_record
        {
            return Ok(DesiredRecords {
                top: NamedRecord::new(&self.domain, desired.to_txt()),
                subs: Vec::new(),
            });
        }

        let splits = split_with_capacity(flat, self.settings.max_mechanisms_per_record)?;
        let mut top = SpfRecord {
            qualifier: flat.qualifier,
            ..SpfRecord::default()
        };
        let mut subs = Vec::with_capacity(splits.len());

        for split in &splits {
            let content = split.to_txt();
            let name = sub_record_name(&self.subdomain_prefix, &self.domain, &content);
            top.include.push(name.clone());
            subs.push(NamedRecord::new(name, content));
        }

        Ok(DesiredRecords {
            top: NamedRecord::new(&self.domain, top.to_txt()),
            subs,
        })
    }

    /// Apply `plan`: sub-records, then the top record, then deletions
    async fn apply(&self, records: &DesiredRecords, plan: &ReconcilePlan) -> Result<CycleOutcome> {
        let dry_run = self.settings.dry_run;
        let mode = if dry_run { "[DRY-RUN] Would" } else { "Will" };
        let mut created = 0;
        let mut updated = 0;
        let mut deleted = 0;

        for sub in &records.subs {
            if plan.keeps_sub(sub.name()) {
                debug!("TXT {} already published, keeping it", sub.name());
                continue;
            }
            info!("{} create TXT {} `{}`", mode, sub.name(), sub.content());
            if !dry_run {
                let id = self
                    .provider
                    .create_txt_record(sub.name(), sub.content())
                    .await?;
                debug!("Created {} as {}", sub.name(), id);
            }
            created += 1;
        }

        let top = &records.top;
        match &plan.reuse_id {
            Some(id) => {
                info!("{} update TXT {} ({}) `{}`", mode, top.name(), id, top.content());
                if !dry_run {
                    self.provider
                        .update_txt_record(id, top.name(), top.content())
                        .await?;
                }
                updated += 1;
            }
            None => {
                info!("{} create TXT {} `{}`", mode, top.name(), top.content());
                if !dry_run {
                    self.provider
                        .create_txt_record(top.name(), top.content())
                        .await?;
                }
                created += 1;
            }
        }

        for id in &plan.delete_ids {
            info!("{} delete TXT record {}", mode, id);
            if !dry_run {
                match self.provider.delete_txt_record(id).await {
                    Ok(()) => {}
                    Err(Error::NotFound(_)) => {
                        debug!("Record {} already deleted", id);
                        continue;
                    }
                    Err(e) => return Err(e),
                }
            }
            deleted += 1;
        }

        if !dry_run {
            info!(
                "Updated SPF for {} via {}: {} created, {} updated, {} deleted",
                self.domain,
                self.provider.provider_name(),
                created,
                updated,
                deleted
            );
        }

        Ok(CycleOutcome::Applied {
            created,
            updated,
            deleted,
            dry_run,
        })
    }

    /// Run update cycles every `interval_secs` until shutdown
    ///
    /// A failed cycle is logged and the loop keeps going.
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Clean shutdown
    /// - `Err(Error)`: Fatal error
    pub async fn run(&self, desired: &SpfRecord) -> Result<()> {
        self.run_internal(desired, None).await
    }

    /// Internal run implementation that accepts an optional shutdown signal
    async fn run_internal(
        &self,
        desired: &SpfRecord,
        shutdown_rx: Option<tokio::sync::oneshot::Receiver<()>>,
    ) -> Result<()> {
        self.emit_event(EngineEvent::Started {
            domain: self.domain.clone(),
        });

        let mut interval =
            tokio::time::interval(std::time::Duration::from_secs(self.settings.interval_secs));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut ticks = IntervalStream::new(interval);

        let shutdown = async move {
            match shutdown_rx {
                Some(rx) => {
                    let _ = rx.await;
                }
                None => {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        error!("Failed to listen for shutdown signal: {}", e);
                    }
                }
            }
        };
        tokio::pin!(shutdown);

        // Memo lives exactly as long as this run
        let mut memo = UpdateMemo::new();

        loop {
            tokio::select! {
                Some(_) = ticks.next() => {
                    match self.update_with_memo(desired, &mut memo).await {
                        Ok(outcome) => debug!("Cycle finished: {:?}", outcome),
                        Err(e) if e.is_provider_error() => warn!(
                            "SPF update for {} failed at {}, retrying next cycle: {}",
                            self.domain,
                            self.provider.provider_name(),
                            e
                        ),
                        Err(e) => error!("SPF update for {} failed: {}", self.domain, e),
                    }
                }

                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    self.emit_event(EngineEvent::Stopped {
                        reason: "Shutdown signal".to_string(),
                    });
                    break;
                }
            }
        }

        info!("Engine stopped");
        Ok(())
    }

    /// Emit an engine event
    fn emit_event(&self, event: EngineEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
            }
            // Nobody is listening; single-shot callers often drop the receiver
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }

    /// Run until `shutdown_rx` fires or its sender is dropped
    ///
    /// With `None` this behaves like [`SpfEngine::run()`]. Callers that handle
    /// signals themselves (or tests) pass their own channel.
    pub async fn run_with_shutdown(
        &self,
        desired: &SpfRecord,
        shutdown_rx: Option<tokio::sync::oneshot::Receiver<()>>,
    ) -> Result<()> {
        self.run_internal(desired, shutdown_rx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_event_clone() {
        let event = EngineEvent::UpdateFailed {
            domain: "example.com".to_string(),
            error: "boom".to_string(),
        };
        assert_eq!(event.clone(), event);
    }

    #[test]
    fn test_sub_record_name() {
        let name = sub_record_name("_spf", "example.com", "v=spf1 ip4:1.1.1.1 -all");

        assert!(name.starts_with("_spf"));
        assert!(name.ends_with(".example.com"));
        let fingerprint = &name["_spf".len()..name.len() - ".example.com".len()];
        assert_eq!(fingerprint.len(), 6);
        assert!(fingerprint.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));

        assert_eq!(name, sub_record_name("_spf", "example.com", "v=spf1 ip4:1.1.1.1 -all"));
        assert_ne!(name, sub_record_name("_spf", "example.com", "v=spf1 ip4:1.1.1.2 -all"));
    }
}
