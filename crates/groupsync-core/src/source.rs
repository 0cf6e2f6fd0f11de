//! Source directory port and member normalization.

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::error::SyncResult;
use crate::types::{MemberEmail, SourceGroups};

/// Reads groups and raw member identifiers from the source directory.
#[async_trait]
pub trait SourceDirectory: Send + Sync {
    /// Read every group in scope.
    async fn fetch_groups(&self) -> SyncResult<SourceGroups>;
}

/// Trim, lower-case and deduplicate raw members, dropping entries without `@`.
pub fn normalize_members<I, S>(raw: I) -> BTreeSet<MemberEmail>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    raw.into_iter()
        .filter_map(|m| MemberEmail::parse(m.as_ref()))
        .collect()
}

/// A fixed in-memory source, for callers that already hold the groups.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    groups: SourceGroups,
}

impl StaticSource {
    /// Wrap already-read groups.
    #[must_use]
    pub fn new(groups: SourceGroups) -> Self {
        Self { groups }
    }
}

#[async_trait]
impl SourceDirectory for StaticSource {
    async fn fetch_groups(&self) -> SyncResult<SourceGroups> {
        Ok(self.groups.clone())
    }
}
