//! Group creation and membership additions.

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::{info, instrument};

use crate::directory::{Directory, NewGroup, NewMember};
use crate::error::{SyncError, SyncResult};
use crate::observer::SyncEvent;
use crate::types::{GroupEmail, GroupRecord, MemberEmail, MemberRecord, MemberRole};

/// Description used when the caller does not provide one.
pub const DEFAULT_GROUP_DESCRIPTION: &str = "Provisioned by AD - Google sync";

/// Result of a group creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupCreation {
    /// The group was created.
    Created(GroupRecord),
    /// The target reported the group as already existing.
    AlreadyExists,
}

/// Result of a single member addition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberAddition {
    /// The member was added.
    Added(MemberRecord),
    /// The member was already in the group; nothing changed.
    AlreadyMember,
}

/// A member that could not be added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberFailure {
    /// The member address.
    pub member: MemberEmail,
    /// Error text.
    pub error: String,
}

/// Per-member outcome of a bulk addition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkAddOutcome {
    /// Members that were added.
    pub added: Vec<MemberEmail>,
    /// Members the target already had.
    pub already_present: Vec<MemberEmail>,
    /// Members that failed.
    pub failed: Vec<MemberFailure>,
}

impl Directory {
    /// Create a group.
    ///
    /// A conflict is reported as [`GroupCreation::AlreadyExists`]; every other
    /// failure is returned to the caller.
    #[instrument(skip(self, description), fields(group = %group_email))]
    pub async fn create_group(
        &self,
        group_email: &GroupEmail,
        display_name: &str,
        description: Option<&str>,
    ) -> SyncResult<GroupCreation> {
        let body = NewGroup {
            email: group_email.clone(),
            name: display_name.to_string(),
            description: description
                .filter(|d| !d.is_empty())
                .unwrap_or(DEFAULT_GROUP_DESCRIPTION)
                .to_string(),
        };

        info!("Creating group");
        match self
            .retry()
            .run("groups.insert", || self.api().insert_group(&body))
            .await
        {
            Ok(record) => {
                self.observer().on_event(&SyncEvent::GroupCreated {
                    group: group_email.to_string(),
                });
                Ok(GroupCreation::Created(record))
            }
            Err(e) if e.is_conflict() => {
                self.observer().on_event(&SyncEvent::GroupAlreadyExists {
                    group: group_email.to_string(),
                });
                Ok(GroupCreation::AlreadyExists)
            }
            Err(e) => Err(e),
        }
    }

    /// Add one member with the given role.
    ///
    /// "Already a member" is reported as [`MemberAddition::AlreadyMember`].
    pub async fn add_member(
        &self,
        group_email: &GroupEmail,
        member_email: &MemberEmail,
        role: MemberRole,
    ) -> SyncResult<MemberAddition> {
        let body = NewMember {
            email: member_email.clone(),
            role,
        };

        match self
            .retry()
            .run("members.insert", || {
                self.api().insert_member(group_email, &body)
            })
            .await
        {
            Ok(record) => {
                self.observer().on_event(&SyncEvent::MemberAdded {
                    group: group_email.to_string(),
                    member: member_email.to_string(),
                });
                Ok(MemberAddition::Added(record))
            }
            Err(e) if e.is_conflict() => {
                self.observer().on_event(&SyncEvent::MemberAlreadyPresent {
                    group: group_email.to_string(),
                    member: member_email.to_string(),
                });
                Ok(MemberAddition::AlreadyMember)
            }
            Err(e) => Err(e),
        }
    }

    /// Add every member independently as `MEMBER`.
    ///
    /// A failure for one member is recorded and the remaining members are
    /// still attempted. Only cancellation stops the batch early.
    #[instrument(skip(self, members), fields(group = %group_email, count = members.len()))]
    pub async fn add_members_bulk(
        &self,
        group_email: &GroupEmail,
        members: &BTreeSet<MemberEmail>,
    ) -> SyncResult<BulkAddOutcome> {
        let mut outcome = BulkAddOutcome::default();

        for member in members {
            match self.add_member(group_email, member, MemberRole::Member).await {
                Ok(MemberAddition::Added(_)) => outcome.added.push(member.clone()),
                Ok(MemberAddition::AlreadyMember) => outcome.already_present.push(member.clone()),
                Err(SyncError::Cancelled) => return Err(SyncError::Cancelled),
                Err(e) => {
                    self.observer().on_event(&SyncEvent::MemberAddFailed {
                        group: group_email.to_string(),
                        member: member.to_string(),
                        error: e.to_string(),
                    });
                    outcome.failed.push(MemberFailure {
                        member: member.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        Ok(outcome)
    }

    /// Fetch a group by email; `None` when the target does not know it.
    #[instrument(skip(self), fields(group = %group_email))]
    pub async fn get_group_by_email(
        &self,
        group_email: &GroupEmail,
    ) -> SyncResult<Option<GroupRecord>> {
        match self
            .retry()
            .run("groups.get", || self.api().get_group(group_email))
            .await
        {
            Ok(record) => Ok(Some(record)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}
