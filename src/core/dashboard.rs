//! Dashboard aggregation.
//!
//! [`aggregate`] makes a single pass over the (already time-sorted and
//! capped) event set and produces every widget's data at once. Nothing is
//! cached; the aggregate is rebuilt on every request.

use std::collections::HashMap;

use crate::core::event_record::SecurityEvent;
use crate::util::constants::{
    FAILED_LOGIN_EVENT_TYPE, LOGIN_EVENT_TYPES, MAX_RECENT_LOGINS, MAX_TOP_ENTRIES,
    TIMELINE_BUCKETS,
};
use crate::util::time::timeline_hour;

/// Label used when a document lacks hostname, type, severity or source.
/// A key that is present but empty keeps its empty label.
const UNKNOWN: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ActiveAgent {
    pub agent_id: String,
    pub last_activity: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct LoginRecord {
    pub timestamp: String,
    pub user: String,
    pub hostname: String,
    pub success: bool,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct HostSummary {
    pub hostname: String,
    pub event_count: usize,
    pub last_seen: String,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TypeCount {
    pub event_type: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SeverityCount {
    pub severity: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct UserCount {
    pub user: String,
    pub event_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ProcessCount {
    pub process: String,
    pub event_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TimelineBucket {
    pub hour: usize,
    pub event_count: usize,
}

/// Summary statistics for the dashboard.
///
/// Always well-formed: on failure the service returns [`DashboardData::empty`]
/// with `error` set, so the presentation layer can render an empty dashboard
/// with an inline note.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DashboardData {
    /// Hosts by latest activity, newest first.
    pub active_agents: Vec<ActiveAgent>,
    /// Newest login-type events, at most [`MAX_RECENT_LOGINS`].
    pub recent_logins: Vec<LoginRecord>,
    /// Event count per host, highest first.
    pub host_list: Vec<HostSummary>,
    /// Event count per type, highest first.
    pub events_by_type: Vec<TypeCount>,
    /// Event count per severity, in first-seen order.
    pub events_by_severity: Vec<SeverityCount>,
    pub top_users: Vec<UserCount>,
    pub top_processes: Vec<ProcessCount>,
    /// Always [`TIMELINE_BUCKETS`] entries, hour 0 first.
    pub event_timeline: Vec<TimelineBucket>,
    pub total_events: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DashboardData {
    /// The empty shape: no rows, 24 zeroed timeline buckets, and an optional
    /// error note.
    pub fn empty(error: Option<String>) -> Self {
        Self {
            active_agents: Vec::new(),
            recent_logins: Vec::new(),
            host_list: Vec::new(),
            events_by_type: Vec::new(),
            events_by_severity: Vec::new(),
            top_users: Vec::new(),
            top_processes: Vec::new(),
            event_timeline: build_timeline(&[0; TIMELINE_BUCKETS]),
            total_events: 0,
            error,
        }
    }
}

/// Insertion-ordered counter. Sorting by count is stable, so ties keep
/// first-encountered order.
#[derive(Debug, Default)]
struct Tally {
    index: HashMap<String, usize>,
    counts: Vec<(String, usize)>,
}

impl Tally {
    fn add(&mut self, key: &str) {
        match self.index.get(key) {
            Some(&slot) => self.counts[slot].1 += 1,
            None => {
                self.index.insert(key.to_owned(), self.counts.len());
                self.counts.push((key.to_owned(), 1));
            }
        }
    }

    /// Entries in first-seen order.
    fn into_seen_order(self) -> Vec<(String, usize)> {
        self.counts
    }

    /// Entries by descending count, ties in first-seen order.
    fn into_ranked(self) -> Vec<(String, usize)> {
        let mut counts = self.counts;
        counts.sort_by(|a, b| b.1.cmp(&a.1));
        counts
    }
}

fn label(value: &str, absent: bool) -> &str {
    if absent {
        UNKNOWN
    } else {
        value
    }
}

fn build_timeline(counts: &[usize; TIMELINE_BUCKETS]) -> Vec<TimelineBucket> {
    counts
        .iter()
        .enumerate()
        .map(|(hour, &event_count)| TimelineBucket { hour, event_count })
        .collect()
}

/// Compute the full dashboard aggregate over `events`.
pub fn aggregate(events: &[SecurityEvent]) -> DashboardData {
    // Latest string value of agent_last_seen per host, in first-seen order.
    let mut agent_index: HashMap<&str, usize> = HashMap::new();
    let mut agents: Vec<(&str, &str)> = Vec::new();
    let mut logins: Vec<LoginRecord> = Vec::new();
    let mut hosts = Tally::default();
    let mut types = Tally::default();
    let mut severities = Tally::default();
    let mut users = Tally::default();
    let mut processes = Tally::default();
    let mut hourly = [0usize; TIMELINE_BUCKETS];

    for event in events {
        let hostname = label(&event.hostname, event.absent.hostname);
        let event_type = label(&event.event_type, event.absent.event_type);
        let last_seen = event.agent_last_seen();

        // An empty hostname is counted but is not an agent.
        if !hostname.is_empty() {
            match agent_index.get(hostname) {
                Some(&slot) => {
                    if last_seen > agents[slot].1 {
                        agents[slot].1 = last_seen;
                    }
                }
                None => {
                    agent_index.insert(hostname, agents.len());
                    agents.push((hostname, last_seen));
                }
            }
        }

        if LOGIN_EVENT_TYPES.iter().any(|&login| login == event_type) {
            logins.push(LoginRecord {
                timestamp: event.timestamp.clone(),
                user: event
                    .user
                    .as_deref()
                    .filter(|u| !u.is_empty())
                    .unwrap_or(UNKNOWN)
                    .to_owned(),
                hostname: hostname.to_owned(),
                success: event_type != FAILED_LOGIN_EVENT_TYPE,
                source: label(&event.source, event.absent.source).to_owned(),
            });
        }

        hosts.add(hostname);
        types.add(event_type);
        severities.add(label(&event.severity, event.absent.severity));

        if let Some(user) = event.user.as_deref().filter(|u| !u.is_empty()) {
            users.add(user);
        }
        if let Some(process) = event.process.as_deref().filter(|p| !p.is_empty()) {
            processes.add(process);
        }

        if let Some(hour) = timeline_hour(&event.timestamp) {
            hourly[hour] += 1;
        }
    }

    logins.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    logins.truncate(MAX_RECENT_LOGINS);

    let last_seen_by_host: HashMap<&str, &str> = agents.iter().copied().collect();
    agents.sort_by(|a, b| b.1.cmp(a.1));

    let host_list = hosts
        .into_ranked()
        .into_iter()
        .map(|(hostname, event_count)| HostSummary {
            last_seen: last_seen_by_host
                .get(hostname.as_str())
                .copied()
                .unwrap_or_default()
                .to_owned(),
            hostname,
            event_count,
        })
        .collect();

    let mut top_users = users.into_ranked();
    top_users.truncate(MAX_TOP_ENTRIES);
    let mut top_processes = processes.into_ranked();
    top_processes.truncate(MAX_TOP_ENTRIES);

    DashboardData {
        active_agents: agents
            .into_iter()
            .map(|(agent_id, last_activity)| ActiveAgent {
                agent_id: agent_id.to_owned(),
                last_activity: last_activity.to_owned(),
                status: "active".to_owned(),
            })
            .collect(),
        recent_logins: logins,
        host_list,
        events_by_type: types
            .into_ranked()
            .into_iter()
            .map(|(event_type, count)| TypeCount { event_type, count })
            .collect(),
        events_by_severity: severities
            .into_seen_order()
            .into_iter()
            .map(|(severity, count)| SeverityCount { severity, count })
            .collect(),
        top_users: top_users
            .into_iter()
            .map(|(user, event_count)| UserCount { user, event_count })
            .collect(),
        top_processes: top_processes
            .into_iter()
            .map(|(process, event_count)| ProcessCount {
                process,
                event_count,
            })
            .collect(),
        event_timeline: build_timeline(&hourly),
        total_events: events.len(),
        error: None,
    }
}
