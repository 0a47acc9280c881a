// # spf-core
//
// Core library for keeping a DNS-size-compliant SPF record published.
//
// ## Architecture Overview
//
// - **SpfRecord**: Parse, serialize and merge SPF policies
// - **Flattener**: Resolve `include:` mechanisms into raw ip4/ip6 entries
// - **split**: Partition an oversized record into size-bounded records
// - **Reconciler**: Diff desired records against the provider's records
// - **SpfEngine**: Run update cycles (flatten → split → reconcile → apply)
// - **TxtResolver / DnsProvider**: External capabilities, injected as traits
// - **ProviderRegistry**: Plugin-based registry for providers and resolvers
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Core logic never performs I/O itself
// 2. **Plugin-Based**: Providers and resolvers are registered dynamically
// 3. **Library-First**: All core functionality can be used as a library
// 4. **Idempotency**: Re-running an update with unchanged input writes nothing

pub mod config;
pub mod engine;
pub mod error;
pub mod flatten;
pub mod reconcile;
pub mod record;
pub mod registry;
pub mod split;
pub mod state;
pub mod traits;

// Re-export core types for convenience
pub use config::{EngineConfig, ProviderConfig, ResolverConfig, SpfConfig, load_policy_file};
pub use engine::{CycleOutcome, DesiredRecords, EngineEvent, SpfEngine, sub_record_name};
pub use error::{Error, Result};
pub use flatten::{Flattener, flatten};
pub use reconcile::{ReconcilePlan, Reconciler};
pub use record::{NamedRecord, Qualifier, SpfRecord};
pub use registry::ProviderRegistry;
pub use split::{MAX_MECHANISMS_PER_RECORD, split, split_with_capacity};
pub use state::UpdateMemo;
pub use traits::{DnsProvider, RecordId, TxtResolver};
