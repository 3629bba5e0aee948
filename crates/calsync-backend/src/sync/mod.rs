//! Calendar synchronization core: token lifecycle, calendar discovery,
//! incremental event sync and reconciliation.

pub mod discovery;
pub mod engine;
pub mod error;
mod locks;
pub mod reconcile;
pub mod state;
pub mod token;

pub use discovery::CalendarDiscovery;
pub use engine::{SyncEngine, SyncSettings};
pub use error::{SyncError, SyncResult};
pub use token::TokenManager;
