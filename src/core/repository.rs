//! Event repository: domain queries over the `security_events` collection.
//!
//! Fetches documents through a [`DocumentStore`], converts them to
//! [`SecurityEvent`]s and applies the filtering the store's own query
//! language cannot express.

use std::cmp::Ordering;

use serde_json::{Map, Value};

use crate::core::client::DocumentStore;
use crate::core::event_record::SecurityEvent;
use crate::core::filter::{FilterChain, SearchFilters};
use crate::util::constants::{DASHBOARD_EVENT_CAP, SECURITY_EVENTS_COLLECTION};
use crate::util::error::DatabaseError;

/// Newest-first ordering by raw timestamp string.
///
/// Lexicographic, so it is only chronological when producers emit
/// zero-padded, consistently formatted UTC timestamps.
pub fn newest_first(a: &SecurityEvent, b: &SecurityEvent) -> Ordering {
    b.timestamp.cmp(&a.timestamp)
}

/// Stable newest-first sort; events with equal timestamps keep their
/// fetched order.
pub fn sort_newest_first(events: &mut [SecurityEvent]) {
    events.sort_by(newest_first);
}

/// Repository over one store.
#[derive(Debug)]
pub struct EventRepository<S> {
    store: S,
}

impl<S: DocumentStore> EventRepository<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Fetch events matching a store-side `filter` (`None` means all),
    /// optionally truncated to the first `limit` results. A `limit` of zero
    /// means no limit.
    pub fn find_all(
        &self,
        filter: Option<&Value>,
        limit: Option<usize>,
    ) -> Result<Vec<SecurityEvent>, DatabaseError> {
        let empty = Value::Object(Map::new());
        let documents = self
            .store
            .find(SECURITY_EVENTS_COLLECTION, filter.unwrap_or(&empty), None)?;

        let mut events: Vec<SecurityEvent> = documents
            .into_iter()
            .map(SecurityEvent::from_document)
            .collect();

        if let Some(limit) = limit.filter(|&limit| limit > 0) {
            events.truncate(limit);
        }
        Ok(events)
    }

    /// The most recent events for dashboard aggregation.
    ///
    /// Fetches the whole collection, sorts newest-first and keeps at most
    /// [`DASHBOARD_EVENT_CAP`] events, so statistics over larger collections
    /// are approximate.
    pub fn find_for_dashboard(&self) -> Result<Vec<SecurityEvent>, DatabaseError> {
        let mut events = self.find_all(None, None)?;
        sort_newest_first(&mut events);
        if events.len() > DASHBOARD_EVENT_CAP {
            tracing::debug!(
                "Dashboard limited to the newest {} of {} events",
                DASHBOARD_EVENT_CAP,
                events.len()
            );
            events.truncate(DASHBOARD_EVENT_CAP);
        }
        Ok(events)
    }

    /// Fetch every event and apply the client-side filter chain.
    pub fn find_filtered(
        &self,
        filters: &SearchFilters,
    ) -> Result<Vec<SecurityEvent>, DatabaseError> {
        let events = self.find_all(None, None)?;
        let fetched = events.len();
        let matched = FilterChain::new(filters).apply(events);
        tracing::debug!("Filter chain kept {} of {} events", matched.len(), fetched);
        Ok(matched)
    }
}
