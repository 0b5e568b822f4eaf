// cpmirror-core: Object mirror, reconciliation, and rulebase resolution
// on top of cpmirror-api.

pub mod catalog;
pub mod config;
pub mod error;
pub mod inventory;
pub mod model;
pub mod rulebase;
pub mod session;
pub mod store;
pub mod sync;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{MirrorConfig, PageLimits, RetryPolicy, TlsVerification};
pub use error::CoreError;
pub use inventory::{all_commands, all_layers, all_targets, show_local};
pub use rulebase::{ObjectIndex, fetch_rulebase, resolve_page, resolve_rule};
pub use session::{connect, disconnect};
pub use store::{LocalStore, SqliteStore, StoreError, StoredObject};
pub use sync::{ObjectStatus, Reconciler, SyncReport};

pub use model::{
    DetailLevel, Layer, ObjectCategory, RawRulebasePage, Reference, RemoteObject, ResolvedEntry,
    ResolvedRule,
};
