use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::{
    CheckState,
    ConsulError,
    ElectionSession,
    KvEntry,
    Membership,
    NodeHealth,
    SessionId,
    BASELINE_CHECK,
    PASSING,
};

#[derive(Debug, Clone)]
/// A sequence of scripted responses.
///
/// Each read pops the next response, the final response repeats forever.
pub struct Script<T> {
    responses: VecDeque<T>,
}

impl<T: Clone> Script<T> {
    pub fn new(responses: impl IntoIterator<Item = T>) -> Self {
        Self {
            responses: responses.into_iter().collect(),
        }
    }

    fn next(&mut self) -> Option<T> {
        if self.responses.len() > 1 {
            self.responses.pop_front()
        } else {
            self.responses.front().cloned()
        }
    }
}

impl<T> Default for Script<T> {
    fn default() -> Self {
        Self {
            responses: VecDeque::new(),
        }
    }
}

/// Builds a healthy report for the service on every given node.
pub fn passing_on<'a>(
    service: &str,
    hostnames: impl IntoIterator<Item = &'a str>,
) -> Vec<NodeHealth> {
    hostnames
        .into_iter()
        .map(|hostname| NodeHealth {
            hostname: hostname.to_string(),
            checks: vec![
                CheckState::new(BASELINE_CHECK, PASSING),
                CheckState::new(format!("service:{service}"), PASSING),
            ],
        })
        .collect()
}

#[derive(Default)]
struct MockState {
    leader: Script<Option<String>>,
    roster: Script<BTreeSet<String>>,
    sessions: Script<Option<usize>>,
    health: BTreeMap<String, Script<Vec<NodeHealth>>>,
    fail_import: bool,

    calls: Vec<&'static str>,
    next_session: usize,
    imported: Vec<Vec<KvEntry>>,
    destroyed: Vec<SessionId>,
    triggers: Vec<String>,
}

#[derive(Clone, Default)]
/// A scripted [Membership] implementation recording every call.
///
/// Probes follow the scripts given to the `script_*` methods; an empty
/// script reads as "nothing there yet".
pub struct MockMembership {
    state: Arc<Mutex<MockState>>,
}

impl MockMembership {
    pub fn script_leader(&self, responses: impl IntoIterator<Item = Option<String>>) {
        self.state.lock().leader = Script::new(responses);
    }

    pub fn script_roster<I, S>(&self, responses: impl IntoIterator<Item = I>)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state.lock().roster = Script::new(
            responses
                .into_iter()
                .map(|members| members.into_iter().map(Into::into).collect()),
        );
    }

    /// Scripts the election session as a sequence of bound check counts.
    ///
    /// `None` means no session holds the leader key. Every `Some` yields a
    /// fresh session id.
    pub fn script_sessions(&self, responses: impl IntoIterator<Item = Option<usize>>) {
        self.state.lock().sessions = Script::new(responses);
    }

    pub fn script_health(
        &self,
        service: &str,
        responses: impl IntoIterator<Item = Vec<NodeHealth>>,
    ) {
        self.state
            .lock()
            .health
            .insert(service.to_string(), Script::new(responses));
    }

    pub fn fail_import(&self) {
        self.state.lock().fail_import = true;
    }

    /// The name of every call made, in order.
    pub fn calls(&self) -> Vec<&'static str> {
        self.state.lock().calls.clone()
    }

    pub fn num_calls(&self, name: &str) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|call| **call == name)
            .count()
    }

    pub fn imported(&self) -> Vec<Vec<KvEntry>> {
        self.state.lock().imported.clone()
    }

    pub fn destroyed(&self) -> Vec<SessionId> {
        self.state.lock().destroyed.clone()
    }

    pub fn triggers(&self) -> Vec<String> {
        self.state.lock().triggers.clone()
    }
}

#[async_trait]
impl Membership for MockMembership {
    async fn internal_leader(&self) -> Result<Option<String>, ConsulError> {
        let mut state = self.state.lock();
        state.calls.push("internal_leader");
        Ok(state.leader.next().flatten())
    }

    async fn ready_members(&self) -> Result<BTreeSet<String>, ConsulError> {
        let mut state = self.state.lock();
        state.calls.push("ready_members");
        Ok(state.roster.next().unwrap_or_default())
    }

    async fn kv_import(&self, entries: &[KvEntry]) -> Result<(), ConsulError> {
        let mut state = self.state.lock();
        state.calls.push("kv_import");
        if state.fail_import {
            return Err(ConsulError::Scripted("scripted import failure".to_string()));
        }
        state.imported.push(entries.to_vec());
        Ok(())
    }

    async fn election_session(&self) -> Result<Option<ElectionSession>, ConsulError> {
        let mut state = self.state.lock();
        state.calls.push("election_session");
        let bound_check_count = match state.sessions.next().flatten() {
            Some(count) => count,
            None => return Ok(None),
        };

        state.next_session += 1;
        Ok(Some(ElectionSession {
            id: SessionId(format!("session-{}", state.next_session)),
            bound_check_count,
        }))
    }

    async fn destroy_session(&self, id: &SessionId) -> Result<(), ConsulError> {
        let mut state = self.state.lock();
        state.calls.push("destroy_session");
        state.destroyed.push(id.clone());
        Ok(())
    }

    async fn trigger_election(&self, tag: &str) -> Result<(), ConsulError> {
        let mut state = self.state.lock();
        state.calls.push("trigger_election");
        state.triggers.push(tag.to_string());
        Ok(())
    }

    async fn service_health(&self, service: &str) -> Result<Vec<NodeHealth>, ConsulError> {
        let mut state = self.state.lock();
        state.calls.push("service_health");
        Ok(state
            .health
            .get_mut(service)
            .and_then(|script| script.next())
            .unwrap_or_default())
    }
}
