//! Outcome of a synchronization run.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::provisioning::MemberFailure;
use crate::types::{GroupEmail, GroupKey};

/// What happened to one source group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupStatus {
    /// The group was missing and has been created.
    Created,
    /// Members were added to an existing group.
    Updated,
    /// Nothing to do.
    Unchanged,
    /// The group could not be processed this run.
    Failed,
}

/// Per-group entry of a [`SyncReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupReport {
    /// Source key.
    pub group_key: GroupKey,
    /// Target email, absent when the key could not be mapped.
    pub group_email: Option<GroupEmail>,
    /// Group-level outcome.
    pub status: GroupStatus,
    /// Members added (planned, on a dry run).
    pub members_added: usize,
    /// Members the target already had at write time.
    pub members_already_present: usize,
    /// Non-fatal per-member failures.
    pub member_errors: Vec<MemberFailure>,
    /// Fatal-for-group error.
    pub error: Option<String>,
}

impl GroupReport {
    pub(crate) fn new(
        group_key: &str,
        group_email: Option<GroupEmail>,
        status: GroupStatus,
    ) -> Self {
        Self {
            group_key: group_key.to_string(),
            group_email,
            status,
            members_added: 0,
            members_already_present: 0,
            member_errors: Vec::new(),
            error: None,
        }
    }

    pub(crate) fn failed(group_key: &str, group_email: Option<GroupEmail>, error: String) -> Self {
        let mut report = Self::new(group_key, group_email, GroupStatus::Failed);
        report.error = Some(error);
        report
    }
}

/// Summary of one synchronization pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished.
    pub finished_at: DateTime<Utc>,
    /// Whether writes were suppressed.
    pub dry_run: bool,
    /// Per-group outcomes, in processing order.
    pub groups: Vec<GroupReport>,
}

impl SyncReport {
    fn count(&self, status: GroupStatus) -> usize {
        self.groups.iter().filter(|g| g.status == status).count()
    }

    /// Groups created.
    #[must_use]
    pub fn created(&self) -> usize {
        self.count(GroupStatus::Created)
    }

    /// Groups updated.
    #[must_use]
    pub fn updated(&self) -> usize {
        self.count(GroupStatus::Updated)
    }

    /// Groups left unchanged.
    #[must_use]
    pub fn unchanged(&self) -> usize {
        self.count(GroupStatus::Unchanged)
    }

    /// Groups that failed.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.count(GroupStatus::Failed)
    }

    /// Total members added across groups.
    #[must_use]
    pub fn members_added(&self) -> usize {
        self.groups.iter().map(|g| g.members_added).sum()
    }

    /// Total per-member failures across groups.
    #[must_use]
    pub fn member_errors(&self) -> usize {
        self.groups.iter().map(|g| g.member_errors.len()).sum()
    }

    /// True when no group failed and no member addition failed.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed() == 0 && self.member_errors() == 0
    }

    /// Report entry for a source key.
    #[must_use]
    pub fn group(&self, group_key: &str) -> Option<&GroupReport> {
        self.groups.iter().find(|g| g.group_key == group_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MemberEmail;

    fn report(groups: Vec<GroupReport>) -> SyncReport {
        let now = Utc::now();
        SyncReport {
            started_at: now,
            finished_at: now,
            dry_run: false,
            groups,
        }
    }

    #[test]
    fn test_counts() {
        let mut updated = GroupReport::new("b", None, GroupStatus::Updated);
        updated.members_added = 3;
        updated.member_errors.push(MemberFailure {
            member: MemberEmail::parse("z@x.com").unwrap(),
            error: "forbidden".into(),
        });
        let report = report(vec![
            GroupReport::new("a", None, GroupStatus::Created),
            updated,
            GroupReport::new("c", None, GroupStatus::Unchanged),
            GroupReport::failed("d", None, "boom".into()),
        ]);

        assert_eq!(report.created(), 1);
        assert_eq!(report.updated(), 1);
        assert_eq!(report.unchanged(), 1);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.members_added(), 3);
        assert_eq!(report.member_errors(), 1);
        assert!(!report.is_clean());
        assert_eq!(report.group("d").unwrap().error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_empty_report_is_clean() {
        assert!(report(Vec::new()).is_clean());
    }

    #[test]
    fn test_status_serialization() {
        let json =
            serde_json::to_value(GroupReport::new("a", None, GroupStatus::Unchanged)).unwrap();
        assert_eq!(json["status"], "unchanged");
    }
}
