//! Tenant-isolated caching for the fairgate platform.
//!
//! Every cache key is prefixed with the owning tenant's id; when the
//! combined `tenant_id:suffix` form exceeds 200 characters, the suffix is
//! replaced with a fixed digest so the prefix survives as a hard isolation
//! boundary. There is no code path that constructs a cache key without a
//! tenant id.

mod cache;
mod key;

pub use cache::{CacheConfig, TenantCache};
