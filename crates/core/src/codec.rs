//! Value codecs
//!
//! Engines that persist values outside the process (the file engine) turn
//! them into bytes through a [`Codec`]. The in-memory engine never touches a
//! codec: its hits hand the stored value straight back.

use crate::errors::{CacheError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::marker::PhantomData;

/// Marshal/unmarshal pair for cache values
pub trait Codec<V>: Send + Sync {
    /// Serialize a value into an owned byte buffer
    fn encode(&self, value: &V) -> Result<Vec<u8>>;

    /// Deserialize a value from a payload produced by [`Codec::encode`]
    fn decode(&self, bytes: &[u8]) -> Result<V>;
}

/// Default codec: compact binary encoding via `bincode`
#[derive(Debug, Clone, Copy, Default)]
pub struct BincodeCodec;

impl<V> Codec<V> for BincodeCodec
where
    V: Serialize + DeserializeOwned,
{
    fn encode(&self, value: &V) -> Result<Vec<u8>> {
        bincode::serialize(value).map_err(CacheError::encode)
    }

    fn decode(&self, bytes: &[u8]) -> Result<V> {
        bincode::deserialize(bytes).map_err(CacheError::decode)
    }
}

/// Human-readable JSON codec, handy when cache files are inspected by hand
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl<V> Codec<V> for JsonCodec
where
    V: Serialize + DeserializeOwned,
{
    fn encode(&self, value: &V) -> Result<Vec<u8>> {
        serde_json::to_vec(value).map_err(CacheError::encode)
    }

    fn decode(&self, bytes: &[u8]) -> Result<V> {
        serde_json::from_slice(bytes).map_err(CacheError::decode)
    }
}

type EncodeFn<V> = Box<dyn Fn(&V) -> Result<Vec<u8>> + Send + Sync>;
type DecodeFn<V> = Box<dyn Fn(&[u8]) -> Result<V> + Send + Sync>;

/// Codec assembled from a pair of plain functions
pub struct FnCodec<V> {
    encode: EncodeFn<V>,
    decode: DecodeFn<V>,
    _value: PhantomData<fn() -> V>,
}

impl<V> FnCodec<V> {
    pub fn new<E, D>(encode: E, decode: D) -> Self
    where
        E: Fn(&V) -> Result<Vec<u8>> + Send + Sync + 'static,
        D: Fn(&[u8]) -> Result<V> + Send + Sync + 'static,
    {
        Self {
            encode: Box::new(encode),
            decode: Box::new(decode),
            _value: PhantomData,
        }
    }
}

impl<V> Codec<V> for FnCodec<V> {
    fn encode(&self, value: &V) -> Result<Vec<u8>> {
        (self.encode)(value)
    }

    fn decode(&self, bytes: &[u8]) -> Result<V> {
        (self.decode)(bytes)
    }
}

impl<V> fmt::Debug for FnCodec<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnCodec").finish_non_exhaustive()
    }
}
