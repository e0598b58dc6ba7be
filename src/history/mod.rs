//! Deployment history.
//!
//! The executor's ledger lives only for one call. Callers that want an audit
//! trail persist the finished report here:
//! - Record format (`DeploymentRecord`)
//! - Storage backend trait (`HistoryStore`)
//! - Local JSON-file backend with locking

mod local;
mod lock;
mod store;
mod types;

pub use local::LocalHistoryStore;
pub use lock::{holder_id, lease_for, HistoryLock, MIN_LEASE_SECS};
pub use store::HistoryStore;
pub use types::{DeploymentRecord, RECORD_VERSION};
