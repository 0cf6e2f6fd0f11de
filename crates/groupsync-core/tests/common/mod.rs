//! Shared fakes for groupsync-core integration tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use groupsync_core::{
    CancellationToken, Directory, DirectoryApi, GroupEmail, GroupPage, GroupQuery, GroupRecord,
    MemberPage, MemberRecord, NewGroup, NewMember, RetryPolicy, Sleeper, SyncError, SyncEvent,
    SyncObserver, SyncResult,
};

/// Counts of remote calls, by operation.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CallCounts {
    pub list_groups: usize,
    pub list_members: usize,
    pub insert_group: usize,
    pub insert_member: usize,
    pub get_group: usize,
}

impl CallCounts {
    pub fn writes(&self) -> usize {
        self.insert_group + self.insert_member
    }
}

#[derive(Debug, Clone)]
struct FakeGroup {
    name: String,
    members: Vec<Option<String>>,
}

#[derive(Default)]
struct FakeState {
    groups: BTreeMap<String, FakeGroup>,
    page_size: usize,
    calls: CallCounts,
    list_groups_failures: VecDeque<SyncError>,
    list_members_failures: HashMap<String, VecDeque<SyncError>>,
    members_not_found: HashSet<String>,
    insert_group_failures: HashMap<String, SyncError>,
    insert_member_failures: HashMap<String, VecDeque<SyncError>>,
    inserted_members: Vec<(String, String, String)>,
    cancel_on_insert_member: Option<CancellationToken>,
}

/// In-memory target directory with token pagination and failure injection.
pub struct FakeDirectory {
    state: Mutex<FakeState>,
}

impl FakeDirectory {
    pub fn new(page_size: usize) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(FakeState {
                page_size,
                ..FakeState::default()
            }),
        })
    }

    /// Add a group with display name `name` and the given member emails.
    pub fn with_group(self: &Arc<Self>, email: &str, name: &str, members: &[&str]) -> Arc<Self> {
        self.state.lock().unwrap().groups.insert(
            email.to_string(),
            FakeGroup {
                name: name.to_string(),
                members: members.iter().map(|m| Some((*m).to_string())).collect(),
            },
        );
        Arc::clone(self)
    }

    /// Add a member entry without an email (e.g. a customer-wide member).
    pub fn with_emailless_member(self: &Arc<Self>, group: &str) -> Arc<Self> {
        if let Some(g) = self.state.lock().unwrap().groups.get_mut(group) {
            g.members.push(None);
        }
        Arc::clone(self)
    }

    pub fn fail_list_groups(&self, error: SyncError) {
        self.state.lock().unwrap().list_groups_failures.push_back(error);
    }

    pub fn fail_list_members(&self, group: &str, error: SyncError) {
        self.state
            .lock()
            .unwrap()
            .list_members_failures
            .entry(group.to_string())
            .or_default()
            .push_back(error);
    }

    /// Cancel `token` once the first member insert has been applied.
    pub fn cancel_on_insert_member(&self, token: CancellationToken) {
        self.state.lock().unwrap().cancel_on_insert_member = Some(token);
    }

    pub fn members_not_found(&self, group: &str) {
        self.state
            .lock()
            .unwrap()
            .members_not_found
            .insert(group.to_string());
    }

    pub fn fail_insert_group(&self, group: &str, error: SyncError) {
        self.state
            .lock()
            .unwrap()
            .insert_group_failures
            .insert(group.to_string(), error);
    }

    pub fn fail_insert_member(&self, member: &str, error: SyncError) {
        self.state
            .lock()
            .unwrap()
            .insert_member_failures
            .entry(member.to_string())
            .or_default()
            .push_back(error);
    }

    pub fn calls(&self) -> CallCounts {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn reset_calls(&self) {
        self.state.lock().unwrap().calls = CallCounts::default();
    }

    /// `(group, member, role)` for every successful insertion, in call order.
    pub fn inserted_members(&self) -> Vec<(String, String, String)> {
        self.state.lock().unwrap().inserted_members.clone()
    }

    pub fn group_names(&self) -> Vec<String> {
        self.state.lock().unwrap().groups.keys().cloned().collect()
    }

    pub fn members_of(&self, group: &str) -> Vec<String> {
        let state = self.state.lock().unwrap();
        let mut members: Vec<String> = state
            .groups
            .get(group)
            .map(|g| g.members.iter().flatten().cloned().collect())
            .unwrap_or_default();
        members.sort();
        members
    }

    fn page<T: Clone>(
        items: &[T],
        page_size: usize,
        token: Option<&str>,
    ) -> (Vec<T>, Option<String>) {
        let start: usize = token.map_or(0, |t| t.trim_start_matches("page-").parse().unwrap());
        let end = (start + page_size).min(items.len());
        let next = (end < items.len()).then(|| format!("page-{end}"));
        (items[start..end].to_vec(), next)
    }
}

#[async_trait]
impl DirectoryApi for FakeDirectory {
    async fn list_groups(
        &self,
        _query: &GroupQuery,
        page_token: Option<&str>,
    ) -> SyncResult<GroupPage> {
        let mut state = self.state.lock().unwrap();
        state.calls.list_groups += 1;
        if let Some(error) = state.list_groups_failures.pop_front() {
            return Err(error);
        }

        let records: Vec<GroupRecord> = state
            .groups
            .iter()
            .map(|(email, g)| GroupRecord {
                id: Some(format!("id-{email}")),
                email: Some(email.clone()),
                name: Some(g.name.clone()),
                description: None,
            })
            .collect();
        let (groups, next_page_token) = Self::page(&records, state.page_size, page_token);
        Ok(GroupPage {
            groups,
            next_page_token,
        })
    }

    async fn list_members(
        &self,
        group: &GroupEmail,
        page_token: Option<&str>,
    ) -> SyncResult<MemberPage> {
        let mut state = self.state.lock().unwrap();
        state.calls.list_members += 1;
        if let Some(error) = state
            .list_members_failures
            .get_mut(group.as_str())
            .and_then(VecDeque::pop_front)
        {
            return Err(error);
        }
        if state.members_not_found.contains(group.as_str()) {
            return Err(SyncError::NotFound(format!("members of {group}")));
        }

        let Some(g) = state.groups.get(group.as_str()) else {
            return Err(SyncError::NotFound(group.to_string()));
        };
        let records: Vec<MemberRecord> = g
            .members
            .iter()
            .map(|m| MemberRecord {
                email: m.clone(),
                role: Some("MEMBER".into()),
                ..MemberRecord::default()
            })
            .collect();
        let (members, next_page_token) = Self::page(&records, state.page_size, page_token);
        Ok(MemberPage {
            members,
            next_page_token,
        })
    }

    async fn insert_group(&self, group: &NewGroup) -> SyncResult<GroupRecord> {
        let mut state = self.state.lock().unwrap();
        state.calls.insert_group += 1;
        let email = group.email.to_string();
        if let Some(error) = state.insert_group_failures.get(&email) {
            return Err(error.clone());
        }
        if state.groups.contains_key(&email) {
            return Err(SyncError::Conflict(format!("Entity already exists: {email}")));
        }
        state.groups.insert(
            email.clone(),
            FakeGroup {
                name: group.name.clone(),
                members: Vec::new(),
            },
        );
        Ok(GroupRecord {
            id: Some(format!("id-{email}")),
            email: Some(email),
            name: Some(group.name.clone()),
            description: Some(group.description.clone()),
        })
    }

    async fn insert_member(
        &self,
        group: &GroupEmail,
        member: &NewMember,
    ) -> SyncResult<MemberRecord> {
        let mut state = self.state.lock().unwrap();
        state.calls.insert_member += 1;
        let email = member.email.to_string();
        if let Some(error) = state
            .insert_member_failures
            .get_mut(&email)
            .and_then(VecDeque::pop_front)
        {
            return Err(error);
        }
        let Some(g) = state.groups.get_mut(group.as_str()) else {
            return Err(SyncError::NotFound(group.to_string()));
        };
        if g.members.iter().flatten().any(|m| m == &email) {
            return Err(SyncError::Conflict("Member already exists.".into()));
        }
        g.members.push(Some(email.clone()));
        state
            .inserted_members
            .push((group.to_string(), email.clone(), member.role.as_str().to_string()));
        if let Some(token) = state.cancel_on_insert_member.take() {
            token.cancel();
        }
        Ok(MemberRecord {
            email: Some(email),
            role: Some(member.role.as_str().to_string()),
            ..MemberRecord::default()
        })
    }

    async fn get_group(&self, group: &GroupEmail) -> SyncResult<GroupRecord> {
        let mut state = self.state.lock().unwrap();
        state.calls.get_group += 1;
        let g = state
            .groups
            .get(group.as_str())
            .ok_or_else(|| SyncError::NotFound(group.to_string()))?;
        Ok(GroupRecord {
            id: Some(format!("id-{group}")),
            email: Some(group.to_string()),
            name: Some(g.name.clone()),
            description: None,
        })
    }
}

/// Sleeper that records requested delays and returns immediately.
#[derive(Default)]
pub struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.delays.lock().unwrap().push(duration);
    }
}

/// Observer that keeps every event.
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<SyncEvent>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<SyncEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, predicate: impl Fn(&SyncEvent) -> bool) -> usize {
        self.events.lock().unwrap().iter().filter(|e| predicate(e)).count()
    }
}

impl SyncObserver for RecordingObserver {
    fn on_event(&self, event: &SyncEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

/// Fast retry policy whose sleeps are recorded instead of awaited.
pub fn recorded_retry(tries: u32) -> (RetryPolicy, Arc<RecordingSleeper>) {
    let sleeper = Arc::new(RecordingSleeper::default());
    let retry = RetryPolicy::new(tries, Duration::from_millis(500), 2.0, Duration::from_secs(8))
        .with_sleeper(sleeper.clone());
    (retry, sleeper)
}

/// Directory over `api` with a fast, recorded retry policy and a recording observer.
pub fn directory(
    api: Arc<FakeDirectory>,
    tries: u32,
) -> (Directory, Arc<RecordingSleeper>, Arc<RecordingObserver>) {
    let (retry, sleeper) = recorded_retry(tries);
    let observer = Arc::new(RecordingObserver::default());
    let directory = Directory::new(api)
        .with_retry_policy(retry)
        .with_observer(observer.clone());
    (directory, sleeper, observer)
}

pub fn unavailable() -> SyncError {
    SyncError::Transient {
        status: 503,
        message: "Backend Error".into(),
    }
}

pub fn rate_limited() -> SyncError {
    SyncError::RateLimited {
        retry_after_secs: None,
        message: "Rate Limit Exceeded".into(),
    }
}
