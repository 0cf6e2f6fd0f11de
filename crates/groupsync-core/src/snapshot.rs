//! Full snapshot reads of the target directory.

use std::collections::BTreeSet;

use tracing::{debug, error, info, instrument};

use crate::directory::{Directory, GroupQuery};
use crate::error::SyncResult;
use crate::observer::SyncEvent;
use crate::types::{DirectorySnapshot, GroupEmail, MemberEmail};

impl Directory {
    /// Read every visible group and its complete member list.
    ///
    /// Groups whose display name does not start with `prefix` are left out of
    /// the snapshot entirely. A not-found response while listing a group's
    /// members means the group has no members; any other failure aborts the
    /// whole read so a partial snapshot is never returned.
    #[instrument(skip(self))]
    pub async fn fetch_all_groups_with_members(
        &self,
        domain: Option<&str>,
        customer: Option<&str>,
        prefix: Option<&str>,
    ) -> SyncResult<DirectorySnapshot> {
        info!("Fetching target groups");

        let query = GroupQuery {
            domain: domain.map(str::to_string),
            customer: customer.map(str::to_string),
        };
        let prefix = prefix.filter(|p| !p.is_empty());

        let mut snapshot = DirectorySnapshot::new();
        let mut page_token: Option<String> = None;

        loop {
            let page = self
                .retry()
                .run("groups.list", || {
                    self.api().list_groups(&query, page_token.as_deref())
                })
                .await
                .inspect_err(|e| error!(error = %e, "Failed to list groups"))?;

            debug!(groups = page.groups.len(), "Processing group page");

            for record in page.groups {
                let name = record.name.unwrap_or_default();
                if let Some(prefix) = prefix {
                    if !name.starts_with(prefix) {
                        continue;
                    }
                }

                let Some(address) = record.email else {
                    self.observer().on_event(&SyncEvent::GroupSkipped {
                        name,
                        reason: "group has no email".to_string(),
                    });
                    continue;
                };

                let group = match GroupEmail::from_address(&address) {
                    Ok(group) => group,
                    Err(e) => {
                        self.observer().on_event(&SyncEvent::GroupSkipped {
                            name,
                            reason: e.to_string(),
                        });
                        continue;
                    }
                };

                if snapshot.contains_group(&group) {
                    continue;
                }

                let members = self.fetch_group_members(&group).await?;
                *snapshot.register_group(group) = members;
            }

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        self.observer().on_event(&SyncEvent::SnapshotFetched {
            groups: snapshot.group_count(),
            members: snapshot.member_count(),
        });

        Ok(snapshot)
    }

    /// Drain every member page of `group`.
    #[instrument(skip(self), fields(group = %group))]
    pub async fn fetch_group_members(
        &self,
        group: &GroupEmail,
    ) -> SyncResult<BTreeSet<MemberEmail>> {
        let mut members = BTreeSet::new();
        let mut page_token: Option<String> = None;

        loop {
            let result = self
                .retry()
                .run("members.list", || {
                    self.api().list_members(group, page_token.as_deref())
                })
                .await;

            let page = match result {
                Ok(page) => page,
                Err(e) if e.is_not_found() => {
                    debug!("Group has no members");
                    break;
                }
                Err(e) => {
                    error!(error = %e, "Failed to list members");
                    return Err(e);
                }
            };

            members.extend(
                page.members
                    .iter()
                    .filter_map(|m| m.email.as_deref())
                    .filter_map(MemberEmail::parse),
            );

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(members)
    }
}
