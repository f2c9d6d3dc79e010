//! Resilient client for the remote document store.
//!
//! Every call opens a fresh connection, sends one framed JSON request, reads
//! one framed JSON response and drops the socket. Transient failures are
//! retried with a fixed delay; the retry loop decides by inspecting the
//! [`DatabaseError`] kind of each attempt.
//!
//! The per-attempt timeout bounds connect and every read/write, not the
//! whole call. Worst case a call takes about
//! `retry_attempts * (timeout + retry_delay)` for the exchange, plus the
//! connection retries inside each attempt.

use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use serde_json::{Map, Value};

use crate::core::framing::{self, FrameError};
use crate::util::config::StoreConfig;
use crate::util::constants::{MAX_FRAME_SIZE, RECV_BUFFER_SIZE, SECURITY_EVENTS_COLLECTION};
use crate::util::error::{query_failed, size_exceeded, DatabaseError};
use crate::util::time::format_duration;

// ── Wire envelopes ──────────────────────────────────────────────────────

/// Operations understood by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Find,
}

/// Request envelope: `{"database", "operation", "collection", "query"}`.
#[derive(Debug, serde::Serialize)]
pub struct StoreRequest<'a> {
    pub database: &'a str,
    pub operation: Operation,
    pub collection: &'a str,
    /// Opaque matcher passed through to the store.
    pub query: &'a Value,
}

impl<'a> StoreRequest<'a> {
    pub fn find(database: &'a str, collection: &'a str, query: &'a Value) -> Self {
        Self {
            database,
            operation: Operation::Find,
            collection,
            query,
        }
    }
}

/// Response envelope: `{"status": "ok", "data": [...]}` or
/// `{"status": "error", "message": "..."}`.
///
/// `status` and `message` stay raw JSON so an unexpected type never turns an
/// otherwise usable response into a decode failure.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct StoreResponse {
    #[serde(default)]
    pub status: Option<Value>,
    #[serde(default)]
    pub data: Option<Vec<Value>>,
    #[serde(default)]
    pub message: Option<Value>,
}

impl StoreResponse {
    /// Only the string `"error"` marks a failure; any other or missing
    /// status is success.
    pub fn is_error(&self) -> bool {
        self.status.as_ref().and_then(Value::as_str) == Some("error")
    }

    /// The store's error text. Non-string messages use their JSON text.
    pub fn error_message(&self) -> String {
        match &self.message {
            Some(Value::String(text)) => text.clone(),
            Some(other) => other.to_string(),
            None => "Unknown error".to_owned(),
        }
    }
}

// ── Seams ───────────────────────────────────────────────────────────────

/// Opens the byte stream for one attempt.
///
/// The returned stream must already enforce `timeout` on reads and writes.
pub trait Connect {
    type Stream: Read + Write;

    fn connect(&self, host: &str, port: u16, timeout: Duration) -> io::Result<Self::Stream>;
}

/// Plain TCP connector used in production.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

impl Connect for TcpConnector {
    type Stream = TcpStream;

    fn connect(&self, host: &str, port: u16, timeout: Duration) -> io::Result<TcpStream> {
        // A zero duration is rejected by the socket timeout setters.
        let timeout = timeout.max(Duration::from_millis(1));
        let mut last_error = None;

        for addr in (host, port).to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(stream) => {
                    stream.set_read_timeout(Some(timeout))?;
                    stream.set_write_timeout(Some(timeout))?;
                    stream.set_nodelay(true)?;
                    return Ok(stream);
                }
                Err(e) => last_error = Some(e),
            }
        }

        Err(last_error.unwrap_or_else(|| {
            io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                format!("{host}:{port} did not resolve to any address"),
            )
        }))
    }
}

/// Anything that can answer a `find` against a named collection.
///
/// [`StoreClient`] is the real implementation; repositories are generic over
/// this trait so they can run against in-memory data.
pub trait DocumentStore {
    fn find(
        &self,
        collection: &str,
        filter: &Value,
        timeout: Option<Duration>,
    ) -> Result<Vec<Value>, DatabaseError>;
}

// ── Client ──────────────────────────────────────────────────────────────

/// Client for one store. Holds no connection between calls.
#[derive(Debug)]
pub struct StoreClient<C: Connect = TcpConnector> {
    config: StoreConfig,
    connector: C,
}

impl StoreClient<TcpConnector> {
    pub fn new(config: StoreConfig) -> Self {
        Self::with_connector(config, TcpConnector)
    }
}

impl<C: Connect> StoreClient<C> {
    pub fn with_connector(config: StoreConfig, connector: C) -> Self {
        Self {
            config,
            connector,
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// `find` against the `security_events` collection.
    pub fn find_security_events(
        &self,
        filter: &Value,
        timeout: Option<Duration>,
    ) -> Result<Vec<Value>, DatabaseError> {
        self.find(SECURITY_EVENTS_COLLECTION, filter, timeout)
    }

    /// Run a `find` and unwrap the response.
    ///
    /// A `null` filter is sent as `{}`. `timeout` overrides the configured
    /// per-attempt timeout for this call only. An `"error"` status becomes
    /// [`DatabaseError::QueryFailed`] carrying the store's message; a missing
    /// `data` array is an empty result.
    pub fn find(
        &self,
        collection: &str,
        filter: &Value,
        timeout: Option<Duration>,
    ) -> Result<Vec<Value>, DatabaseError> {
        let empty = Value::Object(Map::new());
        let query = if filter.is_null() { &empty } else { filter };
        let operation = format!("find(collection={collection}, query={query})");
        let timeout = timeout.unwrap_or(self.config.timeout);

        let request = StoreRequest::find(&self.config.database, collection, query);
        let started = Instant::now();
        let response = self.execute(&request, &operation, timeout)?;

        if response.is_error() {
            let message = response.error_message();
            return Err(query_failed(
                &operation,
                format!("Database returned error: {message}"),
            ));
        }

        let data = response.data.unwrap_or_default();
        tracing::info!(
            "Query successful: {} documents returned in {}. Operation: {}",
            data.len(),
            format_duration(started.elapsed()),
            operation
        );
        Ok(data)
    }

    /// Exchange one request for one response, retrying transient failures.
    ///
    /// Attempts are strictly sequential with `retry_delay` between them. The
    /// error from the final attempt is returned.
    pub fn execute(
        &self,
        request: &StoreRequest<'_>,
        operation: &str,
        timeout: Duration,
    ) -> Result<StoreResponse, DatabaseError> {
        let attempts = self.config.retry_attempts.max(1);
        let mut attempt = 1;

        loop {
            let err = match self.exchange_once(request, operation, timeout) {
                Ok(response) => return Ok(response),
                Err(err) => err,
            };

            if !err.is_retryable() {
                tracing::error!("Non-retryable error: {}", err);
                return Err(err);
            }

            tracing::warn!("Error on attempt {}/{}: {}", attempt, attempts, err);
            if attempt >= attempts {
                return Err(err);
            }

            std::thread::sleep(self.config.retry_delay);
            attempt += 1;
        }
    }

    /// Release the client. Sockets never outlive a single call, so there is
    /// nothing to tear down and the client stays usable. Safe to call any
    /// number of times.
    pub fn close(&self) {
        tracing::debug!("Store client for {} closed", self.config.address());
    }

    /// One attempt. The stream is dropped (and the socket closed) on every
    /// exit path.
    fn exchange_once(
        &self,
        request: &StoreRequest<'_>,
        operation: &str,
        timeout: Duration,
    ) -> Result<StoreResponse, DatabaseError> {
        let mut stream = self.connect(operation, timeout)?;

        let payload = serde_json::to_string(request)
            .map_err(|e| query_failed(operation, format!("Failed to encode request: {e}")))?;
        if payload.len() > MAX_FRAME_SIZE {
            return Err(size_exceeded(
                operation,
                format!(
                    "Request size ({} bytes) exceeds maximum allowed size ({MAX_FRAME_SIZE} bytes)",
                    payload.len()
                ),
            ));
        }

        let framed = framing::frame(&payload).map_err(|e| frame_error(operation, e))?;
        stream
            .write_all(&framed)
            .and_then(|()| stream.flush())
            .map_err(|e| io_error(operation, timeout, e))?;

        let buffer = read_response(&mut stream, operation, timeout)?;
        let (text, _) = framing::try_extract(&buffer)
            .map_err(|e| frame_error(operation, e))?
            .ok_or_else(|| query_failed(operation, "Incomplete response frame"))?;

        let response = serde_json::from_str::<StoreResponse>(&text).map_err(|e| {
            query_failed(operation, format!("Invalid JSON response from database: {e}"))
        })?;

        tracing::debug!(
            "Database operation successful. Operation: {}, Response size: {} bytes",
            operation,
            buffer.len()
        );
        Ok(response)
    }

    /// Open a connection, retrying up to `retry_attempts` times.
    fn connect(&self, operation: &str, timeout: Duration) -> Result<C::Stream, DatabaseError> {
        let address = self.config.address();

        let attempts = self.config.retry_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            match self
                .connector
                .connect(&self.config.host, self.config.port, timeout)
            {
                Ok(stream) => {
                    tracing::debug!("Connected to database at {}", address);
                    return Ok(stream);
                }
                Err(e) => {
                    tracing::warn!("Connection attempt {}/{} failed: {}", attempt, attempts, e);
                    last_error = Some(e);
                    if attempt < attempts {
                        std::thread::sleep(self.config.retry_delay);
                    }
                }
            }
        }

        let last = last_error.map(|e| e.to_string()).unwrap_or_default();
        Err(DatabaseError::ConnectionFailed {
            operation: operation.to_owned(),
            message: format!(
                "Failed to connect to database at {address} after {attempts} attempts: {last}"
            ),
        })
    }
}

impl<C: Connect> DocumentStore for StoreClient<C> {
    fn find(
        &self,
        collection: &str,
        filter: &Value,
        timeout: Option<Duration>,
    ) -> Result<Vec<Value>, DatabaseError> {
        StoreClient::find(self, collection, filter, timeout)
    }
}

/// Read until one complete frame is buffered.
fn read_response<S: Read>(
    stream: &mut S,
    operation: &str,
    timeout: Duration,
) -> Result<Vec<u8>, DatabaseError> {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; RECV_BUFFER_SIZE];

    while !framing::has_complete(&buffer) {
        let read = match stream.read(&mut chunk) {
            Ok(read) => read,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(io_error(operation, timeout, e)),
        };
        if read == 0 {
            return Err(query_failed(
                operation,
                "Connection closed by server before complete response",
            ));
        }
        buffer.extend_from_slice(&chunk[..read]);

        if let Some(declared) = framing::declared_length(&buffer) {
            if declared > MAX_FRAME_SIZE {
                return Err(size_exceeded(
                    operation,
                    format!(
                        "Response declares {declared} bytes, maximum allowed size is {MAX_FRAME_SIZE} bytes"
                    ),
                ));
            }
        }
        // Header bytes count toward the limit.
        if buffer.len() > MAX_FRAME_SIZE {
            return Err(size_exceeded(
                operation,
                format!("Response size exceeds maximum allowed size ({MAX_FRAME_SIZE} bytes)"),
            ));
        }
    }

    Ok(buffer)
}

fn frame_error(operation: &str, err: FrameError) -> DatabaseError {
    match err {
        FrameError::SizeExceeded { .. } => size_exceeded(operation, err.to_string()),
        FrameError::InvalidUtf8(_) => query_failed(operation, format!("Message framing error: {err}")),
    }
}

fn io_error(operation: &str, timeout: Duration, err: io::Error) -> DatabaseError {
    match err.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => DatabaseError::TimedOut {
            operation: operation.to_owned(),
            timeout_secs: timeout.as_secs_f64(),
        },
        _ => query_failed(operation, format!("Database query failed: {err}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::constants::FRAME_HEADER_LEN;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// What the scripted connector does on each successive connect.
    #[derive(Clone)]
    enum Step {
        Refuse,
        Reply(Vec<u8>),
        ReadError(io::ErrorKind),
    }

    struct MockStream {
        input: Cursor<Vec<u8>>,
        read_error: Option<io::ErrorKind>,
        written: Arc<Mutex<Vec<u8>>>,
    }

    impl Read for MockStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.read_error {
                Some(kind) => Err(io::Error::new(kind, "scripted read failure")),
                None => self.input.read(buf),
            }
        }
    }

    impl Write for MockStream {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.written.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Replays `steps` in order, repeating the last one forever.
    struct ScriptedConnector {
        steps: Mutex<VecDeque<Step>>,
        connects: AtomicUsize,
        written: Arc<Mutex<Vec<u8>>>,
    }

    impl ScriptedConnector {
        fn new(steps: Vec<Step>) -> Self {
            Self {
                steps: Mutex::new(steps.into()),
                connects: AtomicUsize::new(0),
                written: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn connects(&self) -> usize {
            self.connects.load(Ordering::SeqCst)
        }
    }

    impl Connect for &ScriptedConnector {
        type Stream = MockStream;

        fn connect(&self, _host: &str, _port: u16, _timeout: Duration) -> io::Result<MockStream> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            let step = {
                let mut steps = self.steps.lock().unwrap();
                if steps.len() > 1 {
                    steps.pop_front().unwrap()
                } else {
                    steps.front().cloned().unwrap()
                }
            };
            let (input, read_error) = match step {
                Step::Refuse => {
                    return Err(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"))
                }
                Step::Reply(bytes) => (bytes, None),
                Step::ReadError(kind) => (Vec::new(), Some(kind)),
            };
            Ok(MockStream {
                input: Cursor::new(input),
                read_error,
                written: Arc::clone(&self.written),
            })
        }
    }

    fn config() -> StoreConfig {
        StoreConfig::new("store.test", 9000).with_retry(3, Duration::ZERO)
    }

    fn reply(body: Value) -> Step {
        Step::Reply(framing::frame(&body.to_string()).unwrap())
    }

    #[test]
    fn test_find_returns_documents_and_sends_envelope() {
        let connector = ScriptedConnector::new(vec![reply(json!({
            "status": "ok",
            "data": [{"hostname": "a"}, {"hostname": "b"}]
        }))]);
        let client = StoreClient::with_connector(config(), &connector);

        let docs = client
            .find_security_events(&json!({"severity": "high"}), None)
            .unwrap();
        assert_eq!(docs.len(), 2);

        let written = connector.written.lock().unwrap().clone();
        let (text, _) = framing::try_extract(&written).unwrap().unwrap();
        let sent: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(
            sent,
            json!({
                "database": "siem",
                "operation": "find",
                "collection": "security_events",
                "query": {"severity": "high"}
            })
        );
    }

    #[test]
    fn test_null_filter_sent_as_empty_object() {
        let connector = ScriptedConnector::new(vec![reply(json!({"status": "ok", "data": []}))]);
        let client = StoreClient::with_connector(config(), &connector);
        client.find("security_events", &Value::Null, None).unwrap();

        let written = connector.written.lock().unwrap().clone();
        let (text, _) = framing::try_extract(&written).unwrap().unwrap();
        let sent: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(sent["query"], json!({}));
    }

    #[test]
    fn test_missing_data_is_empty() {
        let connector = ScriptedConnector::new(vec![reply(json!({"status": "ok"}))]);
        let client = StoreClient::with_connector(config(), &connector);
        assert!(client.find("c", &json!({}), None).unwrap().is_empty());
    }

    #[test]
    fn test_connect_failure_exhausts_attempts_once() {
        let connector = ScriptedConnector::new(vec![Step::Refuse]);
        let client = StoreClient::with_connector(config(), &connector);

        let err = client.find("c", &json!({}), None).unwrap_err();
        assert!(matches!(err, DatabaseError::ConnectionFailed { .. }));
        assert_eq!(connector.connects(), 3);
        assert!(err.to_string().contains("after 3 attempts"));
    }

    #[test]
    fn test_oversized_response_not_retried() {
        let header = ((MAX_FRAME_SIZE + 1) as u32).to_be_bytes().to_vec();
        let connector = ScriptedConnector::new(vec![Step::Reply(header)]);
        let client = StoreClient::with_connector(config(), &connector);

        let err = client.find("c", &json!({}), None).unwrap_err();
        assert!(matches!(err, DatabaseError::SizeExceeded { .. }));
        assert_eq!(connector.connects(), 1);
    }

    #[test]
    fn test_oversized_request_not_retried() {
        let connector = ScriptedConnector::new(vec![reply(json!({"status": "ok"}))]);
        let client = StoreClient::with_connector(config(), &connector);
        let huge = json!({"raw_log": "x".repeat(MAX_FRAME_SIZE)});

        let err = client.find("c", &huge, None).unwrap_err();
        assert!(matches!(err, DatabaseError::SizeExceeded { .. }));
        assert_eq!(connector.connects(), 1);
        assert!(connector.written.lock().unwrap().is_empty());
    }

    #[test]
    fn test_closed_mid_response_is_retried() {
        let framed = framing::frame(r#"{"status":"ok","data":[]}"#).unwrap();
        let truncated = framed[..framed.len() - 3].to_vec();
        let connector = ScriptedConnector::new(vec![Step::Reply(truncated)]);
        let client = StoreClient::with_connector(config(), &connector);

        let err = client.find("c", &json!({}), None).unwrap_err();
        assert!(matches!(err, DatabaseError::QueryFailed { .. }));
        assert!(err.to_string().contains("Connection closed"));
        assert_eq!(connector.connects(), 3);
    }

    #[test]
    fn test_timeout_is_retried_then_raised() {
        let connector = ScriptedConnector::new(vec![Step::ReadError(io::ErrorKind::WouldBlock)]);
        let client = StoreClient::with_connector(config(), &connector);

        let err = client
            .find("c", &json!({}), Some(Duration::from_millis(250)))
            .unwrap_err();
        match err {
            DatabaseError::TimedOut { timeout_secs, .. } => assert_eq!(timeout_secs, 0.25),
            other => panic!("expected TimedOut, got {other:?}"),
        }
        assert_eq!(connector.connects(), 3);
    }

    #[test]
    fn test_bad_json_then_success() {
        let connector = ScriptedConnector::new(vec![
            Step::Reply(framing::frame("{not json").unwrap()),
            reply(json!({"status": "ok", "data": [{"hostname": "a"}]})),
        ]);
        let client = StoreClient::with_connector(config(), &connector);

        let docs = client.find("c", &json!({}), None).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(connector.connects(), 2);
    }

    #[test]
    fn test_error_status_becomes_query_failed_without_retry() {
        let connector = ScriptedConnector::new(vec![reply(json!({
            "status": "error",
            "message": "collection not found"
        }))]);
        let client = StoreClient::with_connector(config(), &connector);

        let err = client.find("missing", &json!({}), None).unwrap_err();
        assert!(matches!(err, DatabaseError::QueryFailed { .. }));
        assert!(err.to_string().contains("collection not found"));
        assert!(err.operation().contains("collection=missing"));
        assert_eq!(connector.connects(), 1);
    }

    #[test]
    fn test_close_is_idempotent_and_client_stays_usable() {
        let connector = ScriptedConnector::new(vec![reply(json!({"status": "ok", "data": [1]}))]);
        let client = StoreClient::with_connector(config(), &connector);
        client.close();
        client.close();

        assert_eq!(client.find("c", &json!({}), None).unwrap().len(), 1);
        assert_eq!(connector.connects(), 1);
    }

    /// Reply whose whole frame (header included) is `frame_len` bytes.
    fn reply_of_frame_len(frame_len: usize) -> Step {
        let envelope = r#"{"status":"ok","data":[""]}"#;
        let padding = "x".repeat(frame_len - FRAME_HEADER_LEN - envelope.len());
        let body = format!(r#"{{"status":"ok","data":["{padding}"]}}"#);
        Step::Reply(framing::frame(&body).unwrap())
    }

    #[test]
    fn test_response_limit_counts_header_bytes() {
        let connector = ScriptedConnector::new(vec![reply_of_frame_len(MAX_FRAME_SIZE)]);
        let client = StoreClient::with_connector(config(), &connector);
        assert_eq!(client.find("c", &json!({}), None).unwrap().len(), 1);

        let connector = ScriptedConnector::new(vec![reply_of_frame_len(MAX_FRAME_SIZE + 1)]);
        let client = StoreClient::with_connector(config(), &connector);
        let err = client.find("c", &json!({}), None).unwrap_err();
        assert!(matches!(err, DatabaseError::SizeExceeded { .. }));
        assert_eq!(connector.connects(), 1);
    }

    #[test]
    fn test_non_string_status_and_message() {
        let connector = ScriptedConnector::new(vec![reply(json!({
            "status": null,
            "data": [{"a": 1}]
        }))]);
        let client = StoreClient::with_connector(config(), &connector);
        assert_eq!(client.find("c", &json!({}), None).unwrap(), vec![json!({"a": 1})]);
        assert_eq!(connector.connects(), 1);

        let connector = ScriptedConnector::new(vec![reply(json!({
            "status": 500,
            "data": []
        }))]);
        let client = StoreClient::with_connector(config(), &connector);
        assert!(client.find("c", &json!({}), None).unwrap().is_empty());

        let connector = ScriptedConnector::new(vec![reply(json!({
            "status": "error",
            "message": {"code": 7}
        }))]);
        let client = StoreClient::with_connector(config(), &connector);
        let err = client.find("c", &json!({}), None).unwrap_err();
        assert!(err.to_string().contains(r#"{"code":7}"#), "{err}");
        assert_eq!(connector.connects(), 1);
    }

    #[test]
    fn test_retries_wait_fixed_delay() {
        let delay = Duration::from_millis(50);
        let connector = ScriptedConnector::new(vec![Step::ReadError(io::ErrorKind::TimedOut)]);
        let client = StoreClient::with_connector(
            StoreConfig::new("store.test", 9000).with_retry(3, delay),
            &connector,
        );

        let started = Instant::now();
        let err = client.find("c", &json!({}), None).unwrap_err();
        assert!(matches!(err, DatabaseError::TimedOut { .. }));
        assert_eq!(connector.connects(), 3);
        assert!(started.elapsed() >= delay * 2);
    }

    #[test]
    fn test_connect_retries_wait_fixed_delay() {
        let delay = Duration::from_millis(50);
        let connector = ScriptedConnector::new(vec![Step::Refuse]);
        let client = StoreClient::with_connector(
            StoreConfig::new("store.test", 9000).with_retry(3, delay),
            &connector,
        );

        let started = Instant::now();
        let err = client.find("c", &json!({}), None).unwrap_err();
        assert!(matches!(err, DatabaseError::ConnectionFailed { .. }));
        assert_eq!(connector.connects(), 3);
        assert!(started.elapsed() >= delay * 2);
    }
}
