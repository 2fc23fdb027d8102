//! Pulse Counting Store
//!
//! Key-value capabilities the activity tracker depends on: atomic
//! increment-with-expiry, set and sorted-set adds with expiry, multi-key
//! reads and pipelined batches. Two backends:
//! - `MemoryStore`: in-process, DashMap-backed, lazily expiring
//! - `LumaDbStore`: PostgreSQL wire protocol via a deadpool connection pool

mod error;
mod lumadb;
mod memory;
mod pool;
mod store;
mod types;

pub use error::{Result, StoreError};
pub use lumadb::LumaDbStore;
pub use memory::MemoryStore;
pub use pool::{PoolConfig, StorePool};
pub use store::CountingStore;
pub use types::{Batch, BatchOp, BatchReply};
