//! Core contract for `tiercache`
//!
//! This crate defines what a cache is, independent of where entries live:
//!
//! - **`traits`**: the [`Cache`] interface plus the optional [`Reset`] and
//!   [`BatchCache`] capabilities, discovered at runtime through
//!   [`Cache::as_reset`] and [`Cache::as_batch`].
//! - **`result`**: per-operation result values carrying an error, a found flag
//!   and, for lookups, a lazily decoded payload.
//! - **`batch`**: per-key aggregates returned by multi-key operations.
//! - **`codec`**: pluggable value encodings for engines that persist bytes.
//! - **`errors`**: the shared [`CacheError`] type.
//!
//! Concrete engines (in-memory LRU, on-disk files) and the combinators built
//! on top of them live in `tiercache-cache`.

pub mod batch;
pub mod codec;
pub mod errors;
pub mod nil;
pub mod result;
pub mod traits;

pub use self::{
    batch::{BatchResult, ItemResult, MDeleteResult, MGetResult, MHasResult, MSetResult},
    codec::{BincodeCodec, Codec, FnCodec, JsonCodec},
    errors::{CacheError, Result},
    nil::NilCache,
    result::{DeleteResult, GetResult, HasResult, Payload, SetResult},
    traits::{BatchCache, Cache, CacheExt, CacheKey, CacheValue, Reset},
};
