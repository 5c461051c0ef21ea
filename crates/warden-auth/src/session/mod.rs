//! Session records and two-tier session resolution.

pub mod record;
pub mod remote;
pub mod resolver;

pub use record::{SessionRecord, SessionRejection, session_cache_key};
pub use remote::RemoteSessionSource;
pub use resolver::{SessionResolver, cache_ttl_for};
