//! Reconciliation of published SPF records
//!
//! Compares the desired record set with what the provider currently holds
//! and decides which records to keep, which to update in place and which to
//! delete.
//!
//! ## Procedure
//!
//! 1. For every desired sub-record, list the SPF records at its name. The
//!    first exact match is kept as published; any other SPF record there is
//!    deleted.
//! 2. List every SPF-signed TXT record at the top domain. None → create.
//! 3. If exactly one exists, its content is the desired text and every
//!    sub-record is already published → no change.
//! 4. Otherwise the first listed top record is reused (updated in place) and
//!    the others are deleted.
//! 5. Every listed top record is inspected; SPF records found at the domains
//!    it includes are stale sub-records from an earlier split and are deleted
//!    too, unless kept in step 1. Failures in this step are logged and
//!    skipped.
//!
//! The provider gives no ordering guarantee, so which duplicate is reused can
//! change between runs.

use indexmap::IndexSet;
use tracing::{debug, warn};

use crate::error::Result;
use crate::record::{NamedRecord, SPF_SIGNATURE, SpfRecord};
use crate::traits::{DnsProvider, RecordId};

/// Outcome of comparing desired and published state
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReconcilePlan {
    /// Whether any write is required
    pub needs_change: bool,

    /// Existing top record to update in place, if any
    pub reuse_id: Option<RecordId>,

    /// Names of desired sub-records already published with the desired text
    pub kept_subs: Vec<String>,

    /// Records to delete, in discovery order, without repeats
    pub delete_ids: Vec<RecordId>,
}

impl ReconcilePlan {
    /// Plan for a zone that already matches
    pub fn converged() -> Self {
        Self::default()
    }

    /// Whether the sub-record `name` is already published and needs no write
    pub fn keeps_sub(&self, name: &str) -> bool {
        self.kept_subs.iter().any(|kept| kept == name)
    }
}

/// Published state at the desired sub-record names
#[derive(Default)]
struct SubScan {
    kept_names: Vec<String>,
    kept_ids: Vec<RecordId>,
    extra_ids: Vec<RecordId>,
}

/// Computes reconcile plans against a borrowed provider
pub struct Reconciler<'p> {
    provider: &'p dyn DnsProvider,
}

impl<'p> Reconciler<'p> {
    /// Create a reconciler reading through `provider`
    pub fn new(provider: &'p dyn DnsProvider) -> Self {
        Self { provider }
    }

    /// Compute the plan converging `top_domain` onto `desired_top` alone
    pub async fn plan(&self, top_domain: &str, desired_top: &NamedRecord) -> Result<ReconcilePlan> {
        self.plan_records(top_domain, desired_top, &[]).await
    }

    /// Compute the plan converging `top_domain` onto `desired_top` and the
    /// sub-records it includes
    ///
    /// # Errors
    ///
    /// Failures of the listing queries at the top domain and at the desired
    /// sub-record names are returned. Failures while scanning for stale
    /// sub-records are not.
    pub async fn plan_records(
        &self,
        top_domain: &str,
        desired_top: &NamedRecord,
        desired_subs: &[NamedRecord],
    ) -> Result<ReconcilePlan> {
        let subs = self.scan_sub_records(desired_subs).await?;
        let subs_published = subs.kept_names.len() == desired_subs.len();

        let all_top_ids = self
            .provider
            .find_txt_records(top_domain, SPF_SIGNATURE)
            .await?;

        if all_top_ids.is_empty() {
            debug!("No SPF record at {}, will create one", top_domain);
            return Ok(ReconcilePlan {
                needs_change: true,
                reuse_id: None,
                kept_subs: subs.kept_names,
                delete_ids: subs.extra_ids,
            });
        }

        let matching_ids = self
            .provider
            .find_txt_records(top_domain, desired_top.content())
            .await?;

        if all_top_ids.len() == 1
            && matching_ids.contains(&all_top_ids[0])
            && subs_published
            && subs.extra_ids.is_empty()
        {
            debug!("SPF records at {} are up to date", top_domain);
            return Ok(ReconcilePlan::converged());
        }

        let reuse_id = all_top_ids[0].clone();
        let mut delete_ids: IndexSet<RecordId> = all_top_ids[1..].iter().cloned().collect();
        delete_ids.extend(subs.extra_ids);

        for top_id in &all_top_ids {
            delete_ids.extend(self.stale_sub_records(top_id, &subs.kept_ids).await);
        }
        delete_ids.retain(|id| *id != reuse_id && !subs.kept_ids.contains(id));

        debug!(
            "Reconcile plan for {}: update {}, keep {} sub-record(s), delete {} record(s)",
            top_domain,
            reuse_id,
            subs.kept_names.len(),
            delete_ids.len()
        );

        Ok(ReconcilePlan {
            needs_change: true,
            reuse_id: Some(reuse_id),
            kept_subs: subs.kept_names,
            delete_ids: delete_ids.into_iter().collect(),
        })
    }

    /// Sort the SPF records at each desired sub-record name into the one to
    /// keep and the ones to delete
    async fn scan_sub_records(&self, desired_subs: &[NamedRecord]) -> Result<SubScan> {
        let mut scan = SubScan::default();

        for sub in desired_subs {
            let all_ids = self
                .provider
                .find_txt_records(sub.name(), SPF_SIGNATURE)
                .await?;
            if all_ids.is_empty() {
                continue;
            }

            let matching_ids = self
                .provider
                .find_txt_records(sub.name(), sub.content())
                .await?;

            let mut kept = None;
            for id in all_ids {
                if kept.is_none() && matching_ids.contains(&id) {
                    kept = Some(id);
                } else {
                    scan.extra_ids.push(id);
                }
            }

            if let Some(id) = kept {
                debug!("Sub-record {} is already published as {}", sub.name(), id);
                scan.kept_names.push(sub.name().to_string());
                scan.kept_ids.push(id);
            }
        }

        Ok(scan)
    }

    /// SPF records at the domains included by the top record `top_id`, other
    /// than the `kept` ones
    async fn stale_sub_records(&self, top_id: &RecordId, kept: &[RecordId]) -> Vec<RecordId> {
        let content = match self.provider.get_txt_record_content(top_id).await {
            Ok(content) => content,
            Err(e) => {
                warn!("Could not fetch record {} during cleanup scan: {}", top_id, e);
                return Vec::new();
            }
        };

        let top = match SpfRecord::parse(&content) {
            Ok(top) => top,
            Err(e) => {
                debug!("Record {} is not a parseable SPF record: {}", top_id, e);
                return Vec::new();
            }
        };

        let mut stale = Vec::new();
        for include in &top.include {
            match self.provider.find_txt_records(include, SPF_SIGNATURE).await {
                Ok(mut ids) => {
                    ids.retain(|id| !kept.contains(id));
                    if ids.is_empty() {
                        continue;
                    }
                    warn!(
                        "Removing {} SPF record(s) at {} included by outdated record {}",
                        ids.len(),
                        include,
                        top_id
                    );
                    stale.extend(ids);
                }
                Err(e) => warn!("Could not list SPF records at {}: {}", include, e),
            }
        }
        stale
    }
}
