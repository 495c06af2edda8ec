mod asset;
mod fingerprint;

use exn::ResultExt;
use time::UtcDateTime;

pub use self::asset::AssetMetadata;
pub(crate) use self::asset::MetadataRow;
pub use self::fingerprint::{ContentFingerprint, Insertion};
pub(crate) use self::fingerprint::FingerprintRow;
use crate::error::{ErrorKind, Result};

const NANOS_PER_MILLI: i128 = 1_000_000;

/// Drop everything below the millisecond, which is the precision timestamps
/// are persisted with. Apply before handing a timestamp to both the store and
/// an in-memory cache so that the two copies compare equal.
pub fn truncate_to_millis(timestamp: UtcDateTime) -> UtcDateTime {
    let nanos = timestamp.nanosecond();
    timestamp.replace_nanosecond(nanos - nanos % 1_000_000).unwrap_or(timestamp)
}

pub(crate) fn to_millis(timestamp: UtcDateTime) -> Result<i64> {
    i64::try_from(timestamp.unix_timestamp_nanos() / NANOS_PER_MILLI).or_raise(|| ErrorKind::InvalidData("timestamp"))
}

pub(crate) fn from_millis(millis: i64) -> Result<UtcDateTime> {
    UtcDateTime::from_unix_timestamp_nanos(i128::from(millis) * NANOS_PER_MILLI)
        .or_raise(|| ErrorKind::InvalidData("timestamp"))
}
