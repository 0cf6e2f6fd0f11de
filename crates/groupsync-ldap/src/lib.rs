//! Active Directory group source for groupsync.
//!
//! [`AdGroupSource`] implements [`groupsync_core::SourceDirectory`]: it searches
//! groups whose `cn` matches a pattern (default `AWS_*`) under a base DN and
//! resolves each `member` DN to the person's `mail` attribute.

mod config;
mod entry;
mod error;
mod source;

pub use config::{LdapConfig, DEFAULT_GROUP_FILTER, DEFAULT_LDAPS_PORT};
pub use entry::{
    collect_ranged_values, escape_filter_pattern, group_search_filter, mail_from_entry,
    parse_range, AdGroup, AttributeRange,
};
pub use error::{LdapResult, LdapSourceError};
pub use source::AdGroupSource;
