//! Remote directory port and the retrying client built on top of it.
//!
//! [`DirectoryApi`] is one remote call per method. [`Directory`] wraps it with
//! the retry policy, pagination and conflict handling; its read side lives in
//! `snapshot.rs` and its write side in `provisioning.rs`.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SyncResult;
use crate::observer::{SyncObserver, TracingObserver};
use crate::retry::RetryPolicy;
use crate::types::{GroupEmail, GroupRecord, MemberEmail, MemberRecord, MemberRole};

/// Scope of a group listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupQuery {
    /// Restrict to groups of this domain.
    pub domain: Option<String>,
    /// Restrict to groups of this customer account.
    pub customer: Option<String>,
}

/// One page of groups.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupPage {
    /// Groups on this page.
    #[serde(default)]
    pub groups: Vec<GroupRecord>,
    /// Continuation token, absent on the last page.
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// One page of members.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberPage {
    /// Members on this page.
    #[serde(default)]
    pub members: Vec<MemberRecord>,
    /// Continuation token, absent on the last page.
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Body of a group creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewGroup {
    /// Group email.
    pub email: GroupEmail,
    /// Display name.
    pub name: String,
    /// Description.
    pub description: String,
}

/// Body of a member insertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewMember {
    /// Member email.
    pub email: MemberEmail,
    /// Role in the group.
    pub role: MemberRole,
}

/// Single remote calls against the target directory.
///
/// Implementations map remote failures onto [`SyncError`](crate::SyncError)
/// variants: absent resources to `NotFound`, duplicates to `Conflict`,
/// throttling to `RateLimited` and 5xx to `Transient`.
#[async_trait]
pub trait DirectoryApi: Send + Sync {
    /// List one page of groups.
    async fn list_groups(
        &self,
        query: &GroupQuery,
        page_token: Option<&str>,
    ) -> SyncResult<GroupPage>;

    /// List one page of members of `group`.
    async fn list_members(
        &self,
        group: &GroupEmail,
        page_token: Option<&str>,
    ) -> SyncResult<MemberPage>;

    /// Create a group.
    async fn insert_group(&self, group: &NewGroup) -> SyncResult<GroupRecord>;

    /// Add a member to `group`.
    async fn insert_member(
        &self,
        group: &GroupEmail,
        member: &NewMember,
    ) -> SyncResult<MemberRecord>;

    /// Fetch a single group.
    async fn get_group(&self, group: &GroupEmail) -> SyncResult<GroupRecord>;
}

/// Retrying, paginating client over a [`DirectoryApi`].
#[derive(Clone)]
pub struct Directory {
    api: Arc<dyn DirectoryApi>,
    retry: RetryPolicy,
    observer: Arc<dyn SyncObserver>,
}

impl std::fmt::Debug for Directory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Directory")
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl Directory {
    /// Create a client with the default retry policy and tracing output.
    #[must_use]
    pub fn new(api: Arc<dyn DirectoryApi>) -> Self {
        Self {
            api,
            retry: RetryPolicy::default(),
            observer: Arc::new(TracingObserver),
        }
    }

    /// Replace the retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Replace the observer for directory events and the current retry
    /// policy's events.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn SyncObserver>) -> Self {
        self.retry = self.retry.with_observer(Arc::clone(&observer));
        self.observer = observer;
        self
    }

    pub(crate) fn api(&self) -> &dyn DirectoryApi {
        self.api.as_ref()
    }

    pub(crate) fn retry(&self) -> &RetryPolicy {
        &self.retry
    }

    pub(crate) fn observer(&self) -> &dyn SyncObserver {
        self.observer.as_ref()
    }
}
