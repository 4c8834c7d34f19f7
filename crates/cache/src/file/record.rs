//! On-disk record format
//!
//! ```text
//! etime=<expiry, unix nanoseconds>\n
//! ctime=<creation, unix seconds>\n
//! <encoded payload bytes>
//! ```

use chrono::{DateTime, Utc};
use std::time::Duration;

const EXPIRE_PREFIX: &[u8] = b"etime=";
const CREATE_PREFIX: &[u8] = b"ctime=";

/// Upper bound on the size of both header lines
pub const MAX_HEADER_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    #[error("missing {0} header line")]
    MissingHeader(&'static str),

    #[error("malformed {field} header: {value:?}")]
    MalformedHeader { field: &'static str, value: String },
}

/// Timestamps stored at the head of every entry file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub expire_at_nanos: i64,
    pub created_at_secs: i64,
}

impl Header {
    /// Header for an entry written at `now` that lives for `ttl`
    pub fn new(now: DateTime<Utc>, ttl: Duration) -> Self {
        let now_nanos = unix_nanos(now);
        let ttl_nanos = i64::try_from(ttl.as_nanos()).unwrap_or(i64::MAX);
        Self {
            expire_at_nanos: now_nanos.saturating_add(ttl_nanos),
            created_at_secs: now.timestamp(),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        unix_nanos(now) > self.expire_at_nanos
    }

    pub fn encode(&self) -> Vec<u8> {
        format!(
            "etime={}\nctime={}\n",
            self.expire_at_nanos, self.created_at_secs
        )
        .into_bytes()
    }
}

/// Nanoseconds since the epoch, saturating outside the representable range
pub fn unix_nanos(at: DateTime<Utc>) -> i64 {
    at.timestamp_nanos_opt().unwrap_or(if at.timestamp() < 0 {
        i64::MIN
    } else {
        i64::MAX
    })
}

/// Parse both header lines, returning the header and the payload offset
pub fn decode_header(bytes: &[u8]) -> Result<(Header, usize), RecordError> {
    let (expire_at_nanos, rest) = parse_line(bytes, EXPIRE_PREFIX, "etime")?;
    let (created_at_secs, rest) = parse_line(rest, CREATE_PREFIX, "ctime")?;
    let offset = bytes.len() - rest.len();
    Ok((
        Header {
            expire_at_nanos,
            created_at_secs,
        },
        offset,
    ))
}

fn parse_line<'a>(
    bytes: &'a [u8],
    prefix: &[u8],
    field: &'static str,
) -> Result<(i64, &'a [u8]), RecordError> {
    let newline = bytes
        .iter()
        .position(|&b| b == b'\n')
        .ok_or(RecordError::MissingHeader(field))?;
    let line = &bytes[..newline];
    let malformed = || RecordError::MalformedHeader {
        field,
        value: String::from_utf8_lossy(line).into_owned(),
    };
    let digits = line.strip_prefix(prefix).ok_or_else(malformed)?;
    let value = std::str::from_utf8(digits)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(malformed)?;
    Ok((value, &bytes[newline + 1..]))
}
