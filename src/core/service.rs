//! Event service: the orchestration layer consumed by the HTTP boundary.
//!
//! Combines repository fetches into paginated search results, dashboard
//! aggregates and exports. Each operation fetches fresh data; two operations
//! in the same logical request may therefore see different snapshots.

use crate::core::client::DocumentStore;
use crate::core::dashboard::{self, DashboardData};
use crate::core::event_record::SecurityEvent;
use crate::core::filter::SearchFilters;
use crate::core::repository::{sort_newest_first, EventRepository};
use crate::export::ExportFormat;
use crate::util::constants::MAX_PAGE_SIZE;
use crate::util::error::Result;

/// One page of search results.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct SearchPage {
    /// Events on the requested page, newest first.
    pub events: Vec<SecurityEvent>,
    /// Total matching events across all pages.
    pub total: usize,
    /// Page number after clamping (1-based).
    pub page: usize,
    /// Page size after clamping to `1..=100`.
    pub page_size: usize,
    pub total_pages: usize,
}

#[derive(Debug)]
pub struct EventService<S> {
    repository: EventRepository<S>,
}

impl<S: DocumentStore> EventService<S> {
    pub fn new(repository: EventRepository<S>) -> Self {
        Self { repository }
    }

    pub fn repository(&self) -> &EventRepository<S> {
        &self.repository
    }

    /// Filtered, newest-first, paginated search.
    ///
    /// `page` is clamped to at least 1 and `page_size` to `1..=100`. A page
    /// past the end is an empty list with accurate totals, not an error.
    pub fn search(
        &self,
        filters: &SearchFilters,
        page: usize,
        page_size: usize,
    ) -> Result<SearchPage> {
        let page = page.max(1);
        let page_size = page_size.clamp(1, MAX_PAGE_SIZE);

        let events = self.sorted_matches(filters)?;
        let total = events.len();
        let total_pages = total.div_ceil(page_size);

        let start = (page - 1).saturating_mul(page_size);
        let events: Vec<SecurityEvent> = events.into_iter().skip(start).take(page_size).collect();

        tracing::debug!(
            "Search returned {} events, showing page {}/{}",
            total,
            page,
            total_pages
        );

        Ok(SearchPage {
            events,
            total,
            page,
            page_size,
            total_pages,
        })
    }

    /// Dashboard aggregate over the newest events.
    ///
    /// Never fails: a fetch error yields [`DashboardData::empty`] carrying
    /// the error text.
    pub fn get_dashboard_data(&self) -> DashboardData {
        match self.repository.find_for_dashboard() {
            Ok(events) => dashboard::aggregate(&events),
            Err(e) => {
                tracing::error!("Failed to retrieve dashboard data: {}", e);
                DashboardData::empty(Some(e.to_string()))
            }
        }
    }

    /// Every matching event, newest first, rendered as `json` or `csv`
    /// (case-insensitive).
    ///
    /// # Errors
    /// [`crate::util::error::SiemError::InvalidFormat`] for any other format,
    /// checked before the store is contacted.
    pub fn export(&self, filters: &SearchFilters, format: &str) -> Result<String> {
        let format: ExportFormat = format.parse()?;
        let events = self.sorted_matches(filters)?;
        tracing::debug!("Exporting {} events in {:?} format", events.len(), format);
        format.render(&events)
    }

    fn sorted_matches(&self, filters: &SearchFilters) -> Result<Vec<SecurityEvent>> {
        let mut events = self.repository.find_filtered(filters)?;
        sort_newest_first(&mut events);
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::error::{query_failed, DatabaseError, SiemError};
    use serde_json::{json, Value};
    use std::cell::Cell;
    use std::time::Duration;

    struct MemoryStore {
        documents: Vec<Value>,
        fail: bool,
        calls: Cell<usize>,
    }

    impl DocumentStore for MemoryStore {
        fn find(
            &self,
            _collection: &str,
            _filter: &Value,
            _timeout: Option<Duration>,
        ) -> std::result::Result<Vec<Value>, DatabaseError> {
            self.calls.set(self.calls.get() + 1);
            if self.fail {
                return Err(query_failed("find(collection=security_events)", "store down"));
            }
            Ok(self.documents.clone())
        }
    }

    fn service(documents: Vec<Value>) -> EventService<MemoryStore> {
        EventService::new(EventRepository::new(MemoryStore {
            documents,
            fail: false,
            calls: Cell::new(0),
        }))
    }

    fn failing_service() -> EventService<MemoryStore> {
        EventService::new(EventRepository::new(MemoryStore {
            documents: Vec::new(),
            fail: true,
            calls: Cell::new(0),
        }))
    }

    fn numbered(count: usize) -> Vec<Value> {
        (0..count)
            .map(|i| {
                json!({
                    "_id": i,
                    "timestamp": format!("2024-06-15T10:00:{:03}", i),
                    "hostname": "web-01",
                    "event_type": "user_login",
                    "severity": "low"
                })
            })
            .collect()
    }

    #[test]
    fn test_pagination() {
        let svc = service(numbered(125));
        let filters = SearchFilters::default();

        let first = svc.search(&filters, 1, 50).unwrap();
        assert_eq!(first.events.len(), 50);
        assert_eq!(first.total, 125);
        assert_eq!(first.total_pages, 3);
        assert_eq!(first.events[0].id, Some(json!(124)));

        let last = svc.search(&filters, 3, 50).unwrap();
        assert_eq!(last.events.len(), 25);

        let beyond = svc.search(&filters, 4, 50).unwrap();
        assert!(beyond.events.is_empty());
        assert_eq!(beyond.total, 125);
        assert_eq!(beyond.total_pages, 3);
    }

    #[test]
    fn test_page_and_size_clamped() {
        let svc = service(numbered(5));
        let page = svc.search(&SearchFilters::default(), 0, 0).unwrap();
        assert_eq!(page.page, 1);
        assert_eq!(page.page_size, 1);
        assert_eq!(page.total_pages, 5);

        let page = svc.search(&SearchFilters::default(), 1, 500).unwrap();
        assert_eq!(page.page_size, 100);
        assert_eq!(page.total_pages, 1);
    }

    #[test]
    fn test_empty_result() {
        let page = service(Vec::new())
            .search(&SearchFilters::default(), 1, 50)
            .unwrap();
        assert_eq!(page.total, 0);
        assert_eq!(page.total_pages, 0);
    }

    #[test]
    fn test_search_error_propagates_typed() {
        let err = failing_service()
            .search(&SearchFilters::default(), 1, 50)
            .unwrap_err();
        assert!(err.is_upstream());
        assert!(matches!(
            err,
            SiemError::Database(DatabaseError::QueryFailed { .. })
        ));
    }

    #[test]
    fn test_dashboard_degrades_to_empty() {
        let data = failing_service().get_dashboard_data();
        assert_eq!(data.total_events, 0);
        assert_eq!(data.event_timeline.len(), 24);
        assert!(data.error.as_deref().unwrap().contains("store down"));
    }

    #[test]
    fn test_dashboard_ignores_search_filters() {
        let data = service(numbered(3)).get_dashboard_data();
        assert_eq!(data.total_events, 3);
        assert!(data.error.is_none());
    }

    #[test]
    fn test_export_invalid_format_skips_store() {
        let svc = service(numbered(1));
        let err = svc.export(&SearchFilters::default(), "xml").unwrap_err();
        assert!(matches!(err, SiemError::InvalidFormat(_)));
        assert!(!err.is_upstream());
        assert_eq!(svc.repository().store().calls.get(), 0);
    }

    #[test]
    fn test_export_csv_sorted_unpaginated() {
        let svc = service(numbered(120));
        let csv = svc.export(&SearchFilters::default(), "CSV").unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 121);
        assert!(lines[1].starts_with("119,"));
    }

    #[test]
    fn test_export_json_respects_filters() {
        let mut documents = numbered(2);
        documents.push(json!({"hostname": "db-01", "timestamp": "2024-06-15T09:00:00"}));
        let filters = SearchFilters {
            hostname: Some("db".into()),
            ..Default::default()
        };
        let text = service(documents).export(&filters, "json").unwrap();
        let parsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.as_array().unwrap().len(), 1);
        assert_eq!(parsed[0]["hostname"], "db-01");
    }
}
