//! Core traits for the SPF flattener
//!
//! This module defines the external capabilities the core calls into.
//!
//! - [`TxtResolver`]: Query TXT records while flattening includes
//! - [`DnsProvider`]: Read and write TXT records in the managed zone

pub mod dns_provider;
pub mod txt_resolver;

pub use dns_provider::{DnsProvider, DnsProviderFactory, RecordId};
pub use txt_resolver::{TxtResolver, TxtResolverFactory};
