//! Active Directory group source.

use std::collections::HashMap;

use async_trait::async_trait;
use groupsync_core::{SourceDirectory, SourceGroups, SyncResult};
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, Scope, SearchEntry};
use secrecy::ExposeSecret;
use tracing::{debug, info, instrument, warn};

use crate::config::LdapConfig;
use crate::entry::{collect_ranged_values, group_search_filter, mail_from_entry, AdGroup};
use crate::error::{LdapResult, LdapSourceError};

/// Reads groups matching a `cn` pattern and resolves member DNs to `mail`.
///
/// Each call to [`fetch_groups`](SourceDirectory::fetch_groups) opens its own
/// connection, binds, reads and unbinds. Members whose entry cannot be read
/// or has no `mail` are dropped.
#[derive(Debug, Clone)]
pub struct AdGroupSource {
    config: LdapConfig,
}

impl AdGroupSource {
    /// Creates a source with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: LdapConfig) -> LdapResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Configuration in use.
    #[must_use]
    pub fn config(&self) -> &LdapConfig {
        &self.config
    }

    async fn connect(&self) -> LdapResult<Ldap> {
        let url = self.config.url();
        debug!(url = %url, "Connecting to LDAP server");

        let settings = LdapConnSettings::new().set_conn_timeout(self.config.connect_timeout);
        let (conn, mut ldap) = LdapConnAsync::with_settings(settings, &url)
            .await
            .map_err(|e| LdapSourceError::Connection {
                url: url.clone(),
                message: e.to_string(),
            })?;

        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                warn!(error = %e, "LDAP connection driver error");
            }
        });

        let bind_dn = self.config.bind_dn.as_deref().unwrap_or("");
        let bind_password = self
            .config
            .bind_password
            .as_ref()
            .map_or("", |p| p.expose_secret());

        debug!(bind_dn = %bind_dn, "Performing LDAP bind");
        let result = ldap
            .simple_bind(bind_dn, bind_password)
            .await
            .map_err(|e| LdapSourceError::Connection {
                url: url.clone(),
                message: e.to_string(),
            })?;

        if result.rc != 0 {
            if result.rc == 49 {
                return Err(LdapSourceError::AuthenticationFailed {
                    bind_dn: bind_dn.to_string(),
                });
            }
            return Err(LdapSourceError::Bind {
                rc: result.rc,
                text: result.text,
            });
        }

        info!(server = %self.config.server, "Connected to AD server");
        Ok(ldap)
    }

    async fn search_groups(&self, ldap: &mut Ldap) -> LdapResult<Vec<AdGroup>> {
        let filter = group_search_filter(&self.config.group_filter);
        debug!(base_dn = %self.config.base_dn, filter = %filter, "Searching AD groups");

        let result = ldap
            .search(&self.config.base_dn, Scope::Subtree, &filter, vec!["cn", "member"])
            .await
            .map_err(|e| LdapSourceError::Search(e.to_string()))?;
        let (entries, _res) = result
            .success()
            .map_err(|e| LdapSourceError::Search(format!("{e}")))?;

        let mut groups = Vec::with_capacity(entries.len());
        for entry in entries {
            let entry = SearchEntry::construct(entry);
            let Some(mut group) = AdGroup::from_entry(&entry) else {
                debug!(dn = %entry.dn, "Skipping group entry without cn");
                continue;
            };
            self.read_remaining_members(ldap, &mut group).await?;
            groups.push(group);
        }
        Ok(groups)
    }

    /// Follow ranged retrieval of `member` for large groups.
    async fn read_remaining_members(&self, ldap: &mut Ldap, group: &mut AdGroup) -> LdapResult<()> {
        while let Some(start) = group.next_range_start.take() {
            let attribute = format!("member;range={start}-*");
            debug!(group = %group.cn, range_start = start, "Reading next member range");

            let result = ldap
                .search(&group.dn, Scope::Base, "(objectClass=*)", vec![attribute.as_str()])
                .await
                .map_err(|e| LdapSourceError::Search(e.to_string()))?;
            let (entries, _res) = result
                .success()
                .map_err(|e| LdapSourceError::Search(format!("{e}")))?;

            let Some(entry) = entries.into_iter().next().map(SearchEntry::construct) else {
                break;
            };
            let (values, next) = collect_ranged_values(&entry, "member");
            if values.is_empty() {
                break;
            }
            group.member_dns.extend(values);
            group.next_range_start = next.filter(|n| *n > start);
        }
        Ok(())
    }

    /// Resolve a member DN to its `mail` attribute. Lookup failures are
    /// logged and yield `None`.
    async fn resolve_mail(&self, ldap: &mut Ldap, dn: &str) -> Option<String> {
        let result = match ldap
            .search(dn, Scope::Base, "(objectClass=person)", vec!["mail"])
            .await
        {
            Ok(result) => result,
            Err(e) => {
                warn!(dn = %dn, error = %e, "LDAP lookup failed");
                return None;
            }
        };

        match result.success() {
            Ok((entries, _)) => entries
                .into_iter()
                .next()
                .map(SearchEntry::construct)
                .and_then(|entry| mail_from_entry(&entry)),
            Err(e) => {
                warn!(dn = %dn, error = %e, "LDAP lookup failed");
                None
            }
        }
    }

    /// Read every matching group and resolve its members.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection, bind or group search fails.
    #[instrument(
        skip(self),
        fields(server = %self.config.server, filter = %self.config.group_filter)
    )]
    pub async fn read_groups(&self) -> LdapResult<SourceGroups> {
        let mut ldap = self.connect().await?;
        let groups = self.search_groups(&mut ldap).await;

        let result = match groups {
            Ok(groups) => {
                let mut mail_cache: HashMap<String, Option<String>> = HashMap::new();
                let mut resolved = SourceGroups::new();
                for group in groups {
                    let mut emails = Vec::with_capacity(group.member_dns.len());
                    for dn in &group.member_dns {
                        let key = dn.to_lowercase();
                        let mail = match mail_cache.get(&key) {
                            Some(cached) => cached.clone(),
                            None => {
                                let mail = self.resolve_mail(&mut ldap, dn).await;
                                mail_cache.insert(key, mail.clone());
                                mail
                            }
                        };
                        match mail {
                            Some(mail) => emails.push(mail),
                            None => {
                                debug!(group = %group.cn, dn = %dn, "Member has no mail, skipping");
                            }
                        }
                    }
                    debug!(group = %group.cn, members = emails.len(), "Resolved AD group");
                    resolved.entry(group.cn).or_default().extend(emails);
                }
                info!(groups = resolved.len(), "Found AD groups");
                Ok(resolved)
            }
            Err(e) => Err(e),
        };

        if let Err(e) = ldap.unbind().await {
            warn!(error = %e, "Error during LDAP unbind");
        }

        result
    }
}

#[async_trait]
impl SourceDirectory for AdGroupSource {
    async fn fetch_groups(&self) -> SyncResult<SourceGroups> {
        Ok(self.read_groups().await?)
    }
}
