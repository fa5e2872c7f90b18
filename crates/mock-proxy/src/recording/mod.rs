//! Record/replay storage.
//!
//! Every distinct request shape maps onto one `.mock` file. A hit replays the
//! file; a miss is recorded there after a successful upstream call.
//!
//! # Module Structure
//!
//! - `types` - Request descriptors and the persisted response record
//! - `key` - Cache key derivation (request to file path)
//! - `store` - File-backed response cache

pub mod key;
mod store;
mod types;

pub use key::{derive_cache_key, encode_form, relative_cache_key};
pub use store::ResponseCache;
pub use types::{is_success_status, HttpMethod, RequestDescriptor, ResponseRecord};
