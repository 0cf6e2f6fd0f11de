//! Structured sync events and the observer interface that receives them.
//!
//! The engine never configures global logging. Everything it wants to say
//! goes through a [`SyncObserver`]; [`TracingObserver`] forwards to `tracing`.

use std::time::Duration;

use tracing::{debug, error, info, warn};

/// An event emitted during a synchronization run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// A full target snapshot was read.
    SnapshotFetched { groups: usize, members: usize },
    /// A group was skipped while reading the snapshot.
    GroupSkipped { name: String, reason: String },
    /// A missing group was created.
    GroupCreated { group: String },
    /// Group creation reported that the group already exists.
    GroupAlreadyExists { group: String },
    /// Group creation failed; the group is skipped for this run.
    GroupCreateFailed { group: String, error: String },
    /// A group already contains every desired member.
    GroupUnchanged { group: String, size: usize },
    /// A member was added.
    MemberAdded { group: String, member: String },
    /// The member was already in the group.
    MemberAlreadyPresent { group: String, member: String },
    /// Adding a member failed; the batch continues.
    MemberAddFailed {
        group: String,
        member: String,
        error: String,
    },
    /// A group was planned but not written (dry run).
    DryRunPlanned {
        group: String,
        create: bool,
        members: usize,
    },
    /// A retryable failure will be retried after `delay`.
    RetryScheduled {
        operation: String,
        attempt: u32,
        delay: Duration,
        error: String,
    },
    /// A retryable failure persisted through every attempt.
    RetriesExhausted {
        operation: String,
        attempts: u32,
        error: String,
    },
}

/// Receives sync events.
pub trait SyncObserver: Send + Sync {
    /// Handle one event.
    fn on_event(&self, event: &SyncEvent);
}

/// Observer that writes every event as a structured `tracing` record.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl SyncObserver for TracingObserver {
    fn on_event(&self, event: &SyncEvent) {
        match event {
            SyncEvent::SnapshotFetched { groups, members } => {
                info!(groups, members, "Fetched target directory snapshot");
            }
            SyncEvent::GroupSkipped { name, reason } => {
                debug!(group = %name, reason = %reason, "Skipping target group");
            }
            SyncEvent::GroupCreated { group } => info!(group = %group, "Created group"),
            SyncEvent::GroupAlreadyExists { group } => {
                info!(group = %group, "Group already exists, continuing with membership");
            }
            SyncEvent::GroupCreateFailed { group, error } => {
                error!(group = %group, error = %error, "Failed to create group, skipping");
            }
            SyncEvent::GroupUnchanged { group, size } => {
                info!(group = %group, size, "Group already up-to-date");
            }
            SyncEvent::MemberAdded { group, member } => {
                debug!(group = %group, member = %member, "Added member");
            }
            SyncEvent::MemberAlreadyPresent { group, member } => {
                debug!(group = %group, member = %member, "Member already in group");
            }
            SyncEvent::MemberAddFailed {
                group,
                member,
                error,
            } => {
                error!(group = %group, member = %member, error = %error, "Failed to add member");
            }
            SyncEvent::DryRunPlanned {
                group,
                create,
                members,
            } => {
                info!(group = %group, create, members, "Dry run: changes not applied");
            }
            SyncEvent::RetryScheduled {
                operation,
                attempt,
                delay,
                error,
            } => {
                debug!(
                    operation = %operation,
                    attempt,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %error,
                    "Retrying after transient error"
                );
            }
            SyncEvent::RetriesExhausted {
                operation,
                attempts,
                error,
            } => {
                warn!(operation = %operation, attempts, error = %error, "Max retries exceeded");
            }
        }
    }
}
