use exn::ResultExt;
use hoard_import::{AssetType, FormatDetails};
use std::collections::BTreeSet;
use time::UtcDateTime;

use super::{from_millis, to_millis};
use crate::error::{Error, ErrorKind};

/// One record per registered asset.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetMetadata {
    /// Opaque identifier, generated at registration.
    pub id: String,
    /// Display name; not unique.
    pub name: String,
    pub asset_type: AssetType,
    /// Free-form grouping.
    pub category: String,
    pub tags: BTreeSet<String>,
    /// Byte length of the stored blob.
    pub size: u64,
    /// Millisecond precision, see [`truncate_to_millis`](super::truncate_to_millis).
    pub created_at: UtcDateTime,
    /// PNG preview.
    pub thumbnail: Option<Vec<u8>>,
    /// Fingerprint the blob was registered under (BLAKE3, lowercase hex).
    pub content_hash: String,
    pub details: Option<FormatDetails>,
}

#[derive(sqlx::FromRow)]
pub(crate) struct MetadataRow {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) asset_type: String,
    pub(crate) category: String,
    pub(crate) size: i64,
    pub(crate) created_at: i64,
    pub(crate) thumbnail: Option<Vec<u8>>,
    pub(crate) content_hash: String,
    pub(crate) details: Option<String>,
    /// JSON array, aggregated from `metadata_tags`.
    pub(crate) tags: String,
}
impl TryFrom<&AssetMetadata> for MetadataRow {
    type Error = Error;
    fn try_from(metadata: &AssetMetadata) -> Result<Self, Self::Error> {
        Ok(Self {
            id: metadata.id.clone(),
            name: metadata.name.clone(),
            asset_type: metadata.asset_type.to_string(),
            category: metadata.category.clone(),
            size: i64::try_from(metadata.size).or_raise(|| ErrorKind::InvalidData("size"))?,
            created_at: to_millis(metadata.created_at)?,
            thumbnail: metadata.thumbnail.clone(),
            content_hash: metadata.content_hash.clone(),
            details: metadata
                .details
                .as_ref()
                .map(serde_json::to_string)
                .transpose()
                .or_raise(|| ErrorKind::InvalidData("details"))?,
            tags: serde_json::to_string(&metadata.tags).or_raise(|| ErrorKind::InvalidData("tags"))?,
        })
    }
}
impl TryFrom<MetadataRow> for AssetMetadata {
    type Error = Error;
    fn try_from(row: MetadataRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            name: row.name,
            asset_type: row.asset_type.parse::<AssetType>().or_raise(|| ErrorKind::InvalidData("asset_type"))?,
            category: row.category,
            tags: serde_json::from_str(&row.tags).or_raise(|| ErrorKind::InvalidData("tags"))?,
            size: u64::try_from(row.size).or_raise(|| ErrorKind::InvalidData("size"))?,
            created_at: from_millis(row.created_at)?,
            thumbnail: row.thumbnail,
            content_hash: row.content_hash,
            details: row
                .details
                .as_deref()
                .map(serde_json::from_str)
                .transpose()
                .or_raise(|| ErrorKind::InvalidData("details"))?,
        })
    }
}
