//! Contract Test: Reconciliation
//!
//! Constraints verified:
//! - Planning never writes to the provider
//! - An exact single match is left alone
//! - Duplicates and stale sub-records are scheduled for deletion
//! - The reused record is never scheduled for deletion
//! - Failures during the cleanup scan do not fail the plan
//! - Sub-records already published with the desired text are kept

mod common;

use common::*;
use spf_core::{Error, NamedRecord, Reconciler};

const DOMAIN: &str = "example.com";

fn desired() -> NamedRecord {
    NamedRecord::new(DOMAIN, "v=spf1 ip4:5.5.5.5 -all")
}

#[tokio::test]
async fn empty_zone_plans_a_create() {
    let provider = InMemoryDnsProvider::new();

    let plan = Reconciler::new(&provider).plan(DOMAIN, &desired()).await.unwrap();

    assert!(plan.needs_change);
    assert!(plan.reuse_id.is_none());
    assert!(plan.delete_ids.is_empty());
    assert_eq!(provider.write_count(), 0);
}

#[tokio::test]
async fn single_exact_match_needs_no_change() {
    let provider = InMemoryDnsProvider::new();
    provider.seed(DOMAIN, "v=spf1 ip4:5.5.5.5 -all");
    provider.seed(DOMAIN, "google-site-verification=abc123");

    let plan = Reconciler::new(&provider).plan(DOMAIN, &desired()).await.unwrap();

    assert!(!plan.needs_change);
    assert_eq!(provider.write_count(), 0);
}

#[tokio::test]
async fn outdated_record_is_reused() {
    let provider = InMemoryDnsProvider::new();
    let id = provider.seed(DOMAIN, "v=spf1 ip4:4.4.4.4 -all");

    let plan = Reconciler::new(&provider).plan(DOMAIN, &desired()).await.unwrap();

    assert!(plan.needs_change);
    assert_eq!(plan.reuse_id, Some(id));
    assert!(plan.delete_ids.is_empty());
}

#[tokio::test]
async fn duplicates_and_stale_sub_records_are_deleted() {
    let provider = InMemoryDnsProvider::new();
    let first = provider.seed(DOMAIN, "v=spf1 include:_spfaaaaaa.example.com -all");
    let second = provider.seed(DOMAIN, "v=spf1 ip4:9.9.9.9 -all");
    let stale = provider.seed("_spfaaaaaa.example.com", "v=spf1 ip4:1.1.1.1 -all");

    let plan = Reconciler::new(&provider).plan(DOMAIN, &desired()).await.unwrap();

    assert!(plan.needs_change);
    assert_eq!(plan.reuse_id, Some(first.clone()));
    assert_eq!(plan.delete_ids, vec![second, stale]);
    assert!(!plan.delete_ids.contains(&first));
    assert_eq!(provider.write_count(), 0);
}

#[tokio::test]
async fn duplicate_matching_records_still_converge_to_one() {
    let provider = InMemoryDnsProvider::new();
    let first = provider.seed(DOMAIN, "v=spf1 ip4:5.5.5.5 -all");
    let second = provider.seed(DOMAIN, "v=spf1 ip4:5.5.5.5 -all");

    let plan = Reconciler::new(&provider).plan(DOMAIN, &desired()).await.unwrap();

    assert!(plan.needs_change);
    assert_eq!(plan.reuse_id, Some(first));
    assert_eq!(plan.delete_ids, vec![second]);
}

#[tokio::test]
async fn cleanup_scan_failures_are_swallowed() {
    let provider = InMemoryDnsProvider::new();
    provider.seed(DOMAIN, "v=spf1 include:_spfaaaaaa.example.com -all");
    let second = provider.seed(DOMAIN, "v=spf1 ip4:9.9.9.9 -all");
    provider.seed("_spfaaaaaa.example.com", "v=spf1 ip4:1.1.1.1 -all");
    provider.fail_content_fetches();

    let plan = Reconciler::new(&provider).plan(DOMAIN, &desired()).await.unwrap();

    assert!(plan.needs_change);
    assert_eq!(plan.delete_ids, vec![second]);
}

#[tokio::test]
async fn sub_record_listing_failures_are_swallowed() {
    let provider = InMemoryDnsProvider::new();
    let first = provider.seed(DOMAIN, "v=spf1 include:_spfaaaaaa.example.com -all");
    provider.fail_listing_at("_spfaaaaaa.example.com");

    let plan = Reconciler::new(&provider).plan(DOMAIN, &desired()).await.unwrap();

    assert_eq!(plan.reuse_id, Some(first));
    assert!(plan.delete_ids.is_empty());
}

#[tokio::test]
async fn top_listing_failure_is_returned() {
    let provider = InMemoryDnsProvider::new();
    provider.fail_listing_at(DOMAIN);

    let result = Reconciler::new(&provider).plan(DOMAIN, &desired()).await;

    assert!(matches!(result, Err(Error::Http(_))), "got {:?}", result);
}

#[tokio::test]
async fn hand_authored_include_target_is_removed_with_its_top_record() {
    let provider = InMemoryDnsProvider::new();
    let top = provider.seed(DOMAIN, "v=spf1 include:_spf.example.com -all");
    let authored = provider.seed("_spf.example.com", "v=spf1 ip4:7.7.7.7 -all");
    provider.seed("_spf.example.com", "mailer-verification=xyz");

    let plan = Reconciler::new(&provider).plan(DOMAIN, &desired()).await.unwrap();

    assert_eq!(plan.reuse_id, Some(top));
    assert_eq!(plan.delete_ids, vec![authored]);
}

#[tokio::test]
async fn published_sub_records_are_kept() {
    let provider = InMemoryDnsProvider::new();
    let sub = NamedRecord::new("_spfaaaaaa.example.com", "v=spf1 ip4:1.1.1.1 -all");
    let top = NamedRecord::new(DOMAIN, "v=spf1 include:_spfaaaaaa.example.com -all");
    let sub_id = provider.seed(sub.name(), sub.content());

    let plan = Reconciler::new(&provider)
        .plan_records(DOMAIN, &top, std::slice::from_ref(&sub))
        .await
        .unwrap();

    assert!(plan.needs_change);
    assert!(plan.reuse_id.is_none());
    assert!(plan.keeps_sub(sub.name()));
    assert!(plan.delete_ids.is_empty());

    // Once the top record exists too, nothing is left to do
    provider.seed(DOMAIN, top.content());
    let plan = Reconciler::new(&provider)
        .plan_records(DOMAIN, &top, std::slice::from_ref(&sub))
        .await
        .unwrap();

    assert!(!plan.needs_change);
    assert!(!plan.delete_ids.contains(&sub_id));
    assert_eq!(provider.write_count(), 0);
}

#[tokio::test]
async fn duplicate_and_foreign_sub_records_are_deleted() {
    let provider = InMemoryDnsProvider::new();
    let sub = NamedRecord::new("_spfaaaaaa.example.com", "v=spf1 ip4:1.1.1.1 -all");
    let top = NamedRecord::new(DOMAIN, "v=spf1 include:_spfaaaaaa.example.com -all");
    let top_id = provider.seed(DOMAIN, top.content());
    let foreign = provider.seed(sub.name(), "v=spf1 ip4:6.6.6.6 -all");
    let kept = provider.seed(sub.name(), sub.content());
    let duplicate = provider.seed(sub.name(), sub.content());

    let plan = Reconciler::new(&provider)
        .plan_records(DOMAIN, &top, std::slice::from_ref(&sub))
        .await
        .unwrap();

    assert!(plan.needs_change);
    assert_eq!(plan.reuse_id, Some(top_id));
    assert!(plan.keeps_sub(sub.name()));
    assert_eq!(plan.delete_ids, vec![foreign, duplicate]);
    assert!(!plan.delete_ids.contains(&kept));
}

#[tokio::test]
async fn sub_record_name_listing_failure_is_returned() {
    let provider = InMemoryDnsProvider::new();
    let sub = NamedRecord::new("_spfaaaaaa.example.com", "v=spf1 ip4:1.1.1.1 -all");
    let top = NamedRecord::new(DOMAIN, "v=spf1 include:_spfaaaaaa.example.com -all");
    provider.fail_listing_at(sub.name());

    let result = Reconciler::new(&provider)
        .plan_records(DOMAIN, &top, std::slice::from_ref(&sub))
        .await;

    assert!(matches!(result, Err(Error::Http(_))), "got {:?}", result);
}
