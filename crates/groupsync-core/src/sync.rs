//! Union-only merge of source groups into the target directory.
//!
//! For every source group the engine computes the target email, the desired
//! member set and `missing = (current ∪ desired) − current`, then creates the
//! group or adds the missing members. Members are never removed.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, instrument};

use crate::directory::Directory;
use crate::error::{SyncError, SyncResult};
use crate::observer::{SyncEvent, SyncObserver, TracingObserver};
use crate::provisioning::{BulkAddOutcome, GroupCreation};
use crate::report::{GroupReport, GroupStatus, SyncReport};
use crate::source::{normalize_members, SourceDirectory};
use crate::types::{DirectorySnapshot, GroupEmail, MemberEmail, SourceGroups};

/// Settings for a sync run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncSettings {
    /// Domain appended to group keys without `@`; also scopes the group listing.
    pub group_domain: String,
    /// Customer account scoping the group listing.
    pub customer_id: Option<String>,
    /// Only target groups whose display name starts with this prefix are read.
    pub group_name_prefix: Option<String>,
    /// Compute and report the plan without writing.
    pub dry_run: bool,
}

/// What a group needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanAction {
    /// Group is absent: create it, then add `members`.
    Create { members: BTreeSet<MemberEmail> },
    /// Group exists: add `missing`.
    AddMembers { missing: BTreeSet<MemberEmail> },
    /// Group exists and already holds every desired member.
    Unchanged { size: usize },
}

/// Planned change for one source group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupPlan {
    /// Target group.
    pub group_email: GroupEmail,
    /// Change to apply.
    pub action: PlanAction,
}

/// Compute the change for one source group against a snapshot.
pub fn plan_group<S: AsRef<str>>(
    group_key: &str,
    raw_members: &[S],
    snapshot: &DirectorySnapshot,
    group_domain: &str,
) -> SyncResult<GroupPlan> {
    let group_email = GroupEmail::from_key(group_key, group_domain)?;
    let desired = normalize_members(raw_members);

    let action = match snapshot.members(&group_email) {
        None => PlanAction::Create { members: desired },
        Some(current) => {
            let union: BTreeSet<MemberEmail> = current.union(&desired).cloned().collect();
            let missing: BTreeSet<MemberEmail> = union.difference(current).cloned().collect();
            if missing.is_empty() {
                PlanAction::Unchanged {
                    size: current.len(),
                }
            } else {
                PlanAction::AddMembers { missing }
            }
        }
    };

    Ok(GroupPlan {
        group_email,
        action,
    })
}

/// Drives one synchronization pass. Holds no state between runs.
#[derive(Clone)]
pub struct SyncEngine {
    directory: Directory,
    settings: SyncSettings,
    observer: Arc<dyn SyncObserver>,
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("directory", &self.directory)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl SyncEngine {
    /// Create an engine over a directory client.
    #[must_use]
    pub fn new(directory: Directory, settings: SyncSettings) -> Self {
        Self {
            directory,
            settings,
            observer: Arc::new(TracingObserver),
        }
    }

    /// Replace the observer for every event of a run: merge, provisioning,
    /// snapshot and retry.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn SyncObserver>) -> Self {
        self.directory = self.directory.with_observer(Arc::clone(&observer));
        self.observer = observer;
        self
    }

    /// Run settings.
    #[must_use]
    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    /// Read the target snapshot for the configured scope.
    pub async fn fetch_target_state(&self) -> SyncResult<DirectorySnapshot> {
        let domain = Some(self.settings.group_domain.as_str()).filter(|d| !d.is_empty());
        self.directory
            .fetch_all_groups_with_members(
                domain,
                self.settings.customer_id.as_deref(),
                self.settings.group_name_prefix.as_deref(),
            )
            .await
    }

    /// Read the source, then synchronize it.
    pub async fn run(&self, source: &dyn SourceDirectory) -> SyncResult<SyncReport> {
        let groups = source.fetch_groups().await?;
        self.synchronize(&groups).await
    }

    /// Reconcile `source_groups` into the target directory.
    ///
    /// Snapshot read failures abort the run. A group whose creation fails is
    /// reported as failed and the run moves on; member failures are recorded
    /// on the group's report entry.
    #[instrument(
        skip(self, source_groups),
        fields(groups = source_groups.len(), dry_run = self.settings.dry_run)
    )]
    pub async fn synchronize(&self, source_groups: &SourceGroups) -> SyncResult<SyncReport> {
        let started_at = Utc::now();
        info!("Starting update for {} source groups", source_groups.len());

        let snapshot = self.fetch_target_state().await?;

        let mut groups = Vec::with_capacity(source_groups.len());
        for (group_key, raw_members) in source_groups {
            let report = match plan_group(
                group_key,
                raw_members,
                &snapshot,
                &self.settings.group_domain,
            ) {
                Ok(plan) => self.apply(group_key, plan).await?,
                Err(e) => GroupReport::failed(group_key, None, e.to_string()),
            };
            groups.push(report);
        }

        let report = SyncReport {
            started_at,
            finished_at: Utc::now(),
            dry_run: self.settings.dry_run,
            groups,
        };

        info!(
            created = report.created(),
            updated = report.updated(),
            unchanged = report.unchanged(),
            failed = report.failed(),
            members_added = report.members_added(),
            member_errors = report.member_errors(),
            "Union update completed"
        );

        Ok(report)
    }

    /// Apply one plan. Only cancellation is returned as an error.
    async fn apply(&self, group_key: &str, plan: GroupPlan) -> SyncResult<GroupReport> {
        let GroupPlan {
            group_email,
            action,
        } = plan;

        if self.settings.dry_run {
            return Ok(self.dry_run_report(group_key, group_email, &action));
        }

        match action {
            PlanAction::Unchanged { size } => {
                self.observer.on_event(&SyncEvent::GroupUnchanged {
                    group: group_email.to_string(),
                    size,
                });
                Ok(GroupReport::new(
                    group_key,
                    Some(group_email),
                    GroupStatus::Unchanged,
                ))
            }
            PlanAction::AddMembers { missing } => {
                info!(group = %group_email, missing = missing.len(), "Adding missing members");
                debug!(group = %group_email, ?missing, "Missing members");
                let outcome = self.directory.add_members_bulk(&group_email, &missing).await?;
                Ok(Self::membership_report(
                    group_key,
                    group_email,
                    GroupStatus::Updated,
                    outcome,
                ))
            }
            PlanAction::Create { members } => {
                info!(group = %group_email, "Group not found in target, creating");
                let status = match self
                    .directory
                    .create_group(&group_email, group_key.trim(), None)
                    .await
                {
                    Ok(GroupCreation::Created(_)) => GroupStatus::Created,
                    Ok(GroupCreation::AlreadyExists) => GroupStatus::Updated,
                    Err(SyncError::Cancelled) => return Err(SyncError::Cancelled),
                    Err(e) => {
                        self.observer.on_event(&SyncEvent::GroupCreateFailed {
                            group: group_email.to_string(),
                            error: e.to_string(),
                        });
                        return Ok(GroupReport::failed(
                            group_key,
                            Some(group_email),
                            e.to_string(),
                        ));
                    }
                };

                if members.is_empty() {
                    info!(group = %group_email, "No members to add to new group");
                    let status = if status == GroupStatus::Created {
                        status
                    } else {
                        GroupStatus::Unchanged
                    };
                    return Ok(GroupReport::new(group_key, Some(group_email), status));
                }

                let outcome = self.directory.add_members_bulk(&group_email, &members).await?;
                let mut report = Self::membership_report(group_key, group_email, status, outcome);
                if report.status == GroupStatus::Updated && report.members_added == 0 {
                    report.status = GroupStatus::Unchanged;
                }
                Ok(report)
            }
        }
    }

    fn membership_report(
        group_key: &str,
        group_email: GroupEmail,
        status: GroupStatus,
        outcome: BulkAddOutcome,
    ) -> GroupReport {
        info!(
            group = %group_email,
            added = outcome.added.len(),
            already_present = outcome.already_present.len(),
            failed = outcome.failed.len(),
            "Membership update finished"
        );
        let mut report = GroupReport::new(group_key, Some(group_email), status);
        report.members_added = outcome.added.len();
        report.members_already_present = outcome.already_present.len();
        report.member_errors = outcome.failed;
        report
    }

    fn dry_run_report(
        &self,
        group_key: &str,
        group_email: GroupEmail,
        action: &PlanAction,
    ) -> GroupReport {
        let (status, create, count) = match action {
            PlanAction::Create { members } => (GroupStatus::Created, true, members.len()),
            PlanAction::AddMembers { missing } => (GroupStatus::Updated, false, missing.len()),
            PlanAction::Unchanged { .. } => (GroupStatus::Unchanged, false, 0),
        };
        if status != GroupStatus::Unchanged {
            self.observer.on_event(&SyncEvent::DryRunPlanned {
                group: group_email.to_string(),
                create,
                members: count,
            });
        }
        let mut report = GroupReport::new(group_key, Some(group_email), status);
        report.members_added = count;
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(groups: &[(&str, &[&str])]) -> DirectorySnapshot {
        groups
            .iter()
            .map(|(group, members)| {
                (
                    GroupEmail::from_address(group).unwrap(),
                    normalize_members(members.iter()),
                )
            })
            .collect()
    }

    fn emails(members: &BTreeSet<MemberEmail>) -> Vec<&str> {
        members.iter().map(MemberEmail::as_str).collect()
    }

    #[test]
    fn test_plan_absent_group_creates_with_normalized_members() {
        let plan = plan_group(
            "AWS_Admins",
            &["Alice@X.com", "bob@x.com", "not-an-email"],
            &DirectorySnapshot::new(),
            "x.com",
        )
        .unwrap();

        assert_eq!(plan.group_email.as_str(), "aws_admins@x.com");
        match plan.action {
            PlanAction::Create { members } => {
                assert_eq!(emails(&members), vec!["alice@x.com", "bob@x.com"]);
            }
            other => panic!("expected Create, got {other:?}"),
        }
    }

    #[test]
    fn test_plan_present_group_without_missing_is_unchanged() {
        let snapshot = snapshot(&[("eng@x.com", &["a@x.com", "c@x.com"])]);
        let plan = plan_group("eng@x.com", &["c@x.com"], &snapshot, "x.com").unwrap();
        assert_eq!(plan.action, PlanAction::Unchanged { size: 2 });
    }

    #[test]
    fn test_plan_present_group_adds_only_missing() {
        let snapshot = snapshot(&[("eng@x.com", &["a@x.com", "c@x.com"])]);
        let plan = plan_group("ENG", &["C@x.com", "d@x.com"], &snapshot, "x.com").unwrap();
        match plan.action {
            PlanAction::AddMembers { missing } => assert_eq!(emails(&missing), vec!["d@x.com"]),
            other => panic!("expected AddMembers, got {other:?}"),
        }
    }

    #[test]
    fn test_plan_empty_desired_set_on_existing_group_never_removes() {
        let snapshot = snapshot(&[("eng@x.com", &["a@x.com"])]);
        let plan = plan_group::<&str>("eng", &[], &snapshot, "x.com").unwrap();
        assert_eq!(plan.action, PlanAction::Unchanged { size: 1 });
    }

    #[test]
    fn test_plan_invalid_key() {
        let err =
            plan_group("a@b@c", &["a@x.com"], &DirectorySnapshot::new(), "x.com").unwrap_err();
        assert!(matches!(err, SyncError::InvalidGroupKey { .. }));
    }
}
