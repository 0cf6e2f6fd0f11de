//! Identifiers, snapshots and remote resource records.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{SyncError, SyncResult};

/// Source-side group identifier (e.g. an AD common name). Not necessarily an email.
pub type GroupKey = String;

/// Canonical target group identifier: lower-cased, exactly one `@`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GroupEmail(String);

impl GroupEmail {
    /// Map a source group key to its target group email.
    ///
    /// Keys that already contain `@` are lower-cased as-is; other keys get
    /// `@{group_domain}` appended.
    pub fn from_key(key: &str, group_domain: &str) -> SyncResult<Self> {
        let key = key.trim();
        if key.is_empty() {
            return Err(SyncError::InvalidGroupKey {
                key: key.to_string(),
                reason: "empty group key".to_string(),
            });
        }

        let candidate = if key.contains('@') {
            key.to_lowercase()
        } else {
            let domain = group_domain.trim();
            if domain.is_empty() {
                return Err(SyncError::InvalidGroupKey {
                    key: key.to_string(),
                    reason: "no group domain configured".to_string(),
                });
            }
            format!("{key}@{domain}").to_lowercase()
        };

        Self::parse(&candidate).map_err(|reason| SyncError::InvalidGroupKey {
            key: key.to_string(),
            reason,
        })
    }

    /// Validate an address reported by the target directory.
    pub fn from_address(address: &str) -> SyncResult<Self> {
        Self::parse(&address.trim().to_lowercase()).map_err(SyncError::InvalidData)
    }

    fn parse(candidate: &str) -> Result<Self, String> {
        let mut parts = candidate.split('@');
        let local = parts.next().unwrap_or_default();
        let domain = parts.next();
        match (domain, parts.next()) {
            (None, _) => Err(format!("'{candidate}' has no '@'")),
            (Some(_), Some(_)) => Err(format!("'{candidate}' has more than one '@'")),
            (Some(domain), None) if local.is_empty() || domain.is_empty() => {
                Err(format!("'{candidate}' has an empty local part or domain"))
            }
            (Some(_), None) => Ok(Self(candidate.to_string())),
        }
    }

    /// The address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupEmail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for GroupEmail {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value.trim().to_lowercase())
    }
}

impl From<GroupEmail> for String {
    fn from(value: GroupEmail) -> Self {
        value.0
    }
}

/// Shorthand for [`GroupEmail::from_key`].
pub fn to_group_email(key: &str, group_domain: &str) -> SyncResult<GroupEmail> {
    GroupEmail::from_key(key, group_domain)
}

/// A normalized member address: trimmed, lower-cased, contains `@`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MemberEmail(String);

impl MemberEmail {
    /// Normalize a raw member identifier; `None` for anything without `@`.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_lowercase();
        if normalized.contains('@') {
            Some(Self(normalized))
        } else {
            None
        }
    }

    /// The address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MemberEmail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Raw source groups: key to member identifiers, before normalization.
pub type SourceGroups = BTreeMap<GroupKey, Vec<String>>;

/// One full read of target group membership.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectorySnapshot {
    groups: BTreeMap<GroupEmail, BTreeSet<MemberEmail>>,
}

impl DirectorySnapshot {
    /// Empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a group with no members. Existing members are kept.
    pub fn register_group(&mut self, group: GroupEmail) -> &mut BTreeSet<MemberEmail> {
        self.groups.entry(group).or_default()
    }

    /// Insert a member, registering the group if needed.
    pub fn insert_member(&mut self, group: GroupEmail, member: MemberEmail) {
        self.register_group(group).insert(member);
    }

    /// Members of `group`, if the group is present.
    #[must_use]
    pub fn members(&self, group: &GroupEmail) -> Option<&BTreeSet<MemberEmail>> {
        self.groups.get(group)
    }

    /// Whether `group` is present.
    #[must_use]
    pub fn contains_group(&self, group: &GroupEmail) -> bool {
        self.groups.contains_key(group)
    }

    /// Number of groups.
    #[must_use]
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Total member entries across groups.
    #[must_use]
    pub fn member_count(&self) -> usize {
        self.groups.values().map(BTreeSet::len).sum()
    }

    /// Iterate groups and their members.
    pub fn iter(&self) -> impl Iterator<Item = (&GroupEmail, &BTreeSet<MemberEmail>)> {
        self.groups.iter()
    }
}

impl FromIterator<(GroupEmail, BTreeSet<MemberEmail>)> for DirectorySnapshot {
    fn from_iter<I: IntoIterator<Item = (GroupEmail, BTreeSet<MemberEmail>)>>(iter: I) -> Self {
        Self {
            groups: iter.into_iter().collect(),
        }
    }
}

/// Membership role in a target group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MemberRole {
    /// Regular member.
    #[default]
    Member,
    /// Group manager.
    Manager,
    /// Group owner.
    Owner,
}

impl MemberRole {
    /// Wire name of the role.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Member => "MEMBER",
            Self::Manager => "MANAGER",
            Self::Owner => "OWNER",
        }
    }
}

/// A group resource as reported by the target directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupRecord {
    /// Remote object ID.
    #[serde(default)]
    pub id: Option<String>,
    /// Group email address.
    #[serde(default)]
    pub email: Option<String>,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
}

/// A member resource as reported by the target directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberRecord {
    /// Remote object ID.
    #[serde(default)]
    pub id: Option<String>,
    /// Member email, absent for some member kinds (e.g. customer-wide members).
    #[serde(default)]
    pub email: Option<String>,
    /// Role name.
    #[serde(default)]
    pub role: Option<String>,
    /// Member kind (USER, GROUP, CUSTOMER, ...).
    #[serde(default, rename = "type")]
    pub member_type: Option<String>,
    /// Membership status.
    #[serde(default)]
    pub status: Option<String>,
}
