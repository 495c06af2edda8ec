use hoard_import::{AssetType, FormatDetails};
use std::collections::BTreeSet;

/// Caller-supplied metadata for [`Registry::register_asset`](crate::Registry::register_asset).
///
/// Identity, size, timestamp and content hash are all derived by the registry.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAsset {
    pub name: String,
    pub asset_type: AssetType,
    pub category: String,
    pub tags: BTreeSet<String>,
    pub thumbnail: Option<Vec<u8>>,
    pub details: Option<FormatDetails>,
}
impl NewAsset {
    pub fn new(name: impl Into<String>, asset_type: AssetType) -> Self {
        Self {
            name: name.into(),
            asset_type,
            category: String::new(),
            tags: BTreeSet::new(),
            thumbnail: None,
            details: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_thumbnail(mut self, thumbnail: Option<Vec<u8>>) -> Self {
        self.thumbnail = thumbnail;
        self
    }

    pub fn with_details(mut self, details: impl Into<FormatDetails>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Outcome of a registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub id: String,
    /// The bytes were already registered; `id` is the earlier asset's and the
    /// supplied name, category and tags were discarded.
    pub deduplicated: bool,
}

/// Result of one of the `Registry::import_*` methods.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportedAsset<M> {
    pub id: String,
    /// Freshly extracted, even when the registration was deduplicated.
    pub metadata: M,
    pub deduplicated: bool,
}
impl<M: Into<FormatDetails>> ImportedAsset<M> {
    /// Erase the concrete metadata type.
    pub fn into_details(self) -> ImportedAsset<FormatDetails> {
        ImportedAsset { id: self.id, metadata: self.metadata.into(), deduplicated: self.deduplicated }
    }
}
