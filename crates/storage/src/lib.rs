//! Per-tenant storage façade for Functions.do: a uniform interface over
//! function metadata, source/compiled code, and (optionally) API keys,
//! resolved per authenticated user.

pub mod facade;
pub mod kv;
pub mod memory;

pub use facade::{ApiKeyStore, CodeStore, Coordinator, Page, Registry, StorageFacade, StorageResult};
pub use kv::{KvAdapter, KvStore};
pub use memory::MemoryStorage;
