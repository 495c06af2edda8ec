use hoard_import::AssetType;
use hoard_store::AssetMetadata;
use std::collections::BTreeSet;

/// Conjunctive filter for [`Registry::query_assets`](crate::Registry::query_assets).
/// Empty fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryFilter {
    pub asset_type: Option<AssetType>,
    pub category: Option<String>,
    /// The asset must carry every one of these.
    pub tags: BTreeSet<String>,
    /// Case-insensitive substring of the name.
    pub name_pattern: Option<String>,
}
impl QueryFilter {
    pub fn with_type(mut self, asset_type: AssetType) -> Self {
        self.asset_type = Some(asset_type);
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
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

    pub fn with_name(mut self, pattern: impl Into<String>) -> Self {
        self.name_pattern = Some(pattern.into());
        self
    }

    /// Apply the in-memory stages to an index scan: category (when the scan was
    /// by type), then tag intersection, then name substring.
    pub(crate) fn refine(&self, candidates: Vec<AssetMetadata>) -> Vec<AssetMetadata> {
        let needle = self.name_pattern.as_deref().map(str::to_lowercase);
        candidates
            .into_iter()
            .filter(|m| self.category.as_deref().is_none_or(|category| m.category == category))
            .filter(|m| self.tags.is_subset(&m.tags))
            .filter(|m| needle.as_deref().is_none_or(|needle| m.name.to_lowercase().contains(needle)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use time::UtcDateTime;

    fn metadata(id: &str, name: &str, category: &str, tags: &[&str]) -> AssetMetadata {
        AssetMetadata {
            id: id.to_string(),
            name: name.to_string(),
            asset_type: AssetType::Model,
            category: category.to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            size: 0,
            created_at: UtcDateTime::UNIX_EPOCH,
            thumbnail: None,
            content_hash: String::new(),
            details: None,
        }
    }

    #[rstest]
    #[case::nothing(QueryFilter::default(), &["1", "2", "3"])]
    #[case::category(QueryFilter::default().with_category("characters"), &["1", "2"])]
    #[case::single_tag(QueryFilter::default().with_tags(["model"]), &["1", "2", "3"])]
    #[case::all_tags(QueryFilter::default().with_tags(["test", "model"]), &["1", "3"])]
    #[case::missing_tag(QueryFilter::default().with_tags(["test", "rigged"]), &[])]
    #[case::name(QueryFilter::default().with_name("KNIGHT"), &["1"])]
    #[case::combined(QueryFilter::default().with_category("characters").with_tags(["test"]).with_name("k"), &["1"])]
    fn test_refine(#[case] filter: QueryFilter, #[case] expected: &[&str]) {
        let candidates = vec![
            metadata("1", "Knight", "characters", &["test", "model"]),
            metadata("2", "Wizard", "characters", &["model"]),
            metadata("3", "Crate", "props", &["model", "test", "wood"]),
        ];
        let ids: Vec<_> = filter.refine(candidates).into_iter().map(|m| m.id).collect();
        assert_eq!(ids, expected);
    }
}
