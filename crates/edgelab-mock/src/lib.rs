//! # edgelab-mock
//!
//! Local stand-ins for the edge platform's Cache API and KV namespaces.
//!
//! Both services keep their state in process. User code running inside the
//! sandbox reaches them through the loopback control channel in [`control`],
//! which the generated entry module wires into the globals the user code expects.
//!
//! - [`MockCache`]: lazy-expiry response cache keyed by string
//! - [`MockKv`]: namespaced key-value store, memory-only or file-backed

pub mod cache;
pub mod control;
pub mod error;
pub mod kv;

pub use cache::{CacheEntry, CachePutOptions, CachedResponse, Expiry, Headers, MockCache};
pub use control::{CACHE_MISS_HEADER, KV_GET_EMPTY_HEADER, MockServer, MockServices};
pub use error::{MockError, Result};
pub use kv::{KvGetType, KvOutput, KvPersistence, KvValue, MockKv, ResponseSnapshot};
