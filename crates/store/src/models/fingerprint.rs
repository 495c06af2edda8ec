use exn::ResultExt;
use time::UtcDateTime;

use super::{from_millis, to_millis};
use crate::error::{Error, ErrorKind};

/// Maps a content hash to the asset registered under it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentFingerprint {
    /// BLAKE3 of the blob, lowercase hex.
    pub hash: String,
    pub asset_id: String,
    pub size: u64,
    pub created_at: UtcDateTime,
}

/// Outcome of [`Store::insert_asset`](crate::Store::insert_asset).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Insertion {
    /// Metadata, blob and fingerprint were all written.
    Inserted,
    /// The hash was already registered; nothing was written.
    Existing(ContentFingerprint),
}

#[derive(sqlx::FromRow)]
pub(crate) struct FingerprintRow {
    pub(crate) hash: String,
    pub(crate) asset_id: String,
    pub(crate) size: i64,
    pub(crate) created_at: i64,
}
impl TryFrom<&ContentFingerprint> for FingerprintRow {
    type Error = Error;
    fn try_from(fingerprint: &ContentFingerprint) -> Result<Self, Self::Error> {
        Ok(Self {
            hash: fingerprint.hash.clone(),
            asset_id: fingerprint.asset_id.clone(),
            size: i64::try_from(fingerprint.size).or_raise(|| ErrorKind::InvalidData("fingerprint size"))?,
            created_at: to_millis(fingerprint.created_at)?,
        })
    }
}
impl TryFrom<FingerprintRow> for ContentFingerprint {
    type Error = Error;
    fn try_from(row: FingerprintRow) -> Result<Self, Self::Error> {
        Ok(Self {
            hash: row.hash,
            asset_id: row.asset_id,
            size: u64::try_from(row.size).or_raise(|| ErrorKind::InvalidData("fingerprint size"))?,
            created_at: from_millis(row.created_at)?,
        })
    }
}
