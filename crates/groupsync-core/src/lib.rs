//! Directory synchronization engine for groupsync.
//!
//! Reads a full snapshot of a target group directory, merges source group
//! membership into it as a union and applies the additive delta.
//!
//! # Features
//!
//! - Exponential backoff retry policy with injectable sleeper and cancellation
//! - Paginated snapshot reads that either complete or fail the run
//! - Group creation and member addition that absorb "already exists" conflicts
//! - Partial-failure tolerant bulk membership additions
//! - Idempotent, union-only merge with a per-group report
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use groupsync_core::{Directory, DirectoryApi, SourceGroups, SyncEngine, SyncSettings};
//!
//! # async fn example(api: Arc<dyn DirectoryApi>) -> Result<(), groupsync_core::SyncError> {
//! let engine = SyncEngine::new(
//!     Directory::new(api),
//!     SyncSettings {
//!         group_domain: "example.com".to_string(),
//!         ..Default::default()
//!     },
//! );
//!
//! let mut source = SourceGroups::new();
//! source.insert("AWS_Admins".to_string(), vec!["alice@example.com".to_string()]);
//!
//! let report = engine.synchronize(&source).await?;
//! assert!(report.is_clean());
//! # Ok(())
//! # }
//! ```

mod directory;
mod error;
mod observer;
mod provisioning;
mod report;
mod retry;
mod snapshot;
mod source;
mod sync;
mod types;

// Re-exports
pub use directory::{
    Directory, DirectoryApi, GroupPage, GroupQuery, MemberPage, NewGroup, NewMember,
};
pub use error::{SyncError, SyncResult};
pub use observer::{SyncEvent, SyncObserver, TracingObserver};
pub use provisioning::{
    BulkAddOutcome, GroupCreation, MemberAddition, MemberFailure, DEFAULT_GROUP_DESCRIPTION,
};
pub use report::{GroupReport, GroupStatus, SyncReport};
pub use retry::{RetryPolicy, Sleeper, TokioSleeper};
pub use source::{normalize_members, SourceDirectory, StaticSource};
pub use sync::{plan_group, GroupPlan, PlanAction, SyncEngine, SyncSettings};
pub use tokio_util::sync::CancellationToken;
pub use types::{
    to_group_email, DirectorySnapshot, GroupEmail, GroupKey, GroupRecord, MemberEmail,
    MemberRecord, MemberRole, SourceGroups,
};
