//! Search filters and search-entry parsing.

use ldap3::SearchEntry;

/// Escape an LDAP filter value (RFC 4515), keeping `*` as a wildcard.
#[must_use]
pub fn escape_filter_pattern(value: &str) -> String {
    value
        .replace('\\', "\\5c")
        .replace('(', "\\28")
        .replace(')', "\\29")
        .replace('\0', "\\00")
}

/// Filter selecting groups whose `cn` matches `pattern`.
#[must_use]
pub fn group_search_filter(pattern: &str) -> String {
    format!(
        "(&(objectClass=group)(cn={}))",
        escape_filter_pattern(pattern.trim())
    )
}

/// Range of a ranged attribute (`member;range=0-1499`); `end` is `None` for `*`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeRange {
    pub start: u32,
    pub end: Option<u32>,
}

/// Parse the range option of an attribute description.
#[must_use]
pub fn parse_range(attribute: &str, name: &str) -> Option<AttributeRange> {
    let (attr, options) = attribute.split_once(';')?;
    if !attr.eq_ignore_ascii_case(name) {
        return None;
    }
    let range = options
        .split(';')
        .find_map(|opt| opt.strip_prefix("range="))?;
    let (start, end) = range.split_once('-')?;
    let start = start.parse().ok()?;
    let end = if end == "*" {
        None
    } else {
        Some(end.parse().ok()?)
    };
    Some(AttributeRange { start, end })
}

/// A group read from the directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdGroup {
    /// Distinguished name.
    pub dn: String,
    /// Common name; the source group key.
    pub cn: String,
    /// Direct member DNs.
    pub member_dns: Vec<String>,
    /// Where to resume when AD returned only part of `member`.
    pub next_range_start: Option<u32>,
}

/// Collect values of `name`, both plain and ranged, and the next range start
/// if the returned range was not the last one.
#[must_use]
pub fn collect_ranged_values(entry: &SearchEntry, name: &str) -> (Vec<String>, Option<u32>) {
    let mut values = Vec::new();
    let mut next = None;
    for (attribute, attr_values) in &entry.attrs {
        if attribute.eq_ignore_ascii_case(name) {
            values.extend(attr_values.iter().cloned());
        } else if let Some(range) = parse_range(attribute, name) {
            values.extend(attr_values.iter().cloned());
            next = range.end.and_then(|end| end.checked_add(1));
        }
    }
    (values, next)
}

fn first_value(entry: &SearchEntry, name: &str) -> Option<String> {
    entry
        .attrs
        .iter()
        .find(|(attribute, _)| attribute.eq_ignore_ascii_case(name))
        .and_then(|(_, values)| values.first().cloned())
}

impl AdGroup {
    /// Build a group from a search entry; `None` when the entry has no `cn`.
    #[must_use]
    pub fn from_entry(entry: &SearchEntry) -> Option<Self> {
        let cn = first_value(entry, "cn").filter(|cn| !cn.trim().is_empty())?;
        let (member_dns, next_range_start) = collect_ranged_values(entry, "member");
        Some(Self {
            dn: entry.dn.clone(),
            cn,
            member_dns,
            next_range_start,
        })
    }
}

/// The `mail` attribute of a person entry.
#[must_use]
pub fn mail_from_entry(entry: &SearchEntry) -> Option<String> {
    first_value(entry, "mail").filter(|mail| !mail.trim().is_empty())
}
