//! Application-wide constants for siemview.
//!
//! Centralising protocol limits, client defaults and aggregation bounds here
//! keeps the rest of the codebase clean and makes tuning straightforward.

use std::time::Duration;

/// Length of the big-endian `u32` prefix that starts every frame.
pub const FRAME_HEADER_LEN: usize = 4;

/// Largest payload (in bytes) accepted in either direction: 10 MiB.
/// Bounds memory use and stops a corrupt or hostile length field from
/// triggering a huge allocation.
pub const MAX_FRAME_SIZE: usize = 10 * 1024 * 1024;

/// Size of each `read` into the accumulating response buffer.
pub const RECV_BUFFER_SIZE: usize = 4096;

/// Per-attempt timeout applied to connect and to every socket read/write.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Number of attempts for both connecting and exchanging a request.
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;

/// Fixed pause between attempts. Not exponential.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Database name sent in every request envelope unless overridden.
pub const DEFAULT_DATABASE: &str = "siem";

/// Collection holding the security events.
pub const SECURITY_EVENTS_COLLECTION: &str = "security_events";

/// Dashboard statistics are computed over at most this many of the most
/// recent events. Larger collections give approximate statistics.
pub const DASHBOARD_EVENT_CAP: usize = 10_000;

/// Number of login records kept on the dashboard.
pub const MAX_RECENT_LOGINS: usize = 10;

/// Number of entries in the top-users and top-processes lists.
pub const MAX_TOP_ENTRIES: usize = 10;

/// Hourly timeline buckets (hour 0..=23).
pub const TIMELINE_BUCKETS: usize = 24;

/// Event types that produce a login record on the dashboard.
pub const LOGIN_EVENT_TYPES: &[&str] = &["user_login", "authentication_failure", "ssh_connection"];

/// The one login event type that counts as unsuccessful.
pub const FAILED_LOGIN_EVENT_TYPE: &str = "authentication_failure";

/// Default search page size.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Upper bound for a requested page size.
pub const MAX_PAGE_SIZE: usize = 100;

/// Fixed CSV export columns, in order.
pub const EXPORT_FIELDS: &[&str] = &[
    "_id",
    "timestamp",
    "hostname",
    "source",
    "event_type",
    "severity",
    "user",
    "process",
    "command",
    "raw_log",
];

/// Application display name used in log lines and CLI help.
pub const APP_NAME: &str = "siemview";

/// Application version string.
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Environment variable naming the directory for the persistent log file.
pub const LOG_DIR_ENV: &str = "SIEM_LOG_DIR";

/// Log file name for persistent error/debug logging.
pub const LOG_FILE_NAME: &str = "siemview.log";

/// Maximum log file size in bytes before rotation (5 MB).
pub const MAX_LOG_FILE_SIZE: u64 = 5 * 1024 * 1024;
