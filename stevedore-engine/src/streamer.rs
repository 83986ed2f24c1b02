//! Log streamer
//!
//! Per-subscriber tailing sessions against a remote container. The remote
//! engine offers no event-stream API through the gateway, so each session
//! is a polling loop: one bounded historical fetch, then repeated
//! wall-clock windows of `docker logs --since/--until`. Windows have
//! second granularity, so lines landing on a boundary may duplicate or
//! gap; log tailing is best-effort and this is accepted.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, error};

use stevedore_core::domain::target::InfrastructureConfig;
use stevedore_core::dto::LogSessionRequest;
use stevedore_core::naming::{resource_name, validate_job_name, validate_job_version};
use stevedore_gateway::{GatewayError, RemoteExecutor};

use crate::commands::DockerCli;
use crate::error::Result;

/// Callback receiving (session_id, line) for every streamed log line
pub type LineCallback = Arc<dyn Fn(&str, &str) + Send + Sync>;

/// Historical lines replayed when a session opens without an explicit tail
pub const DEFAULT_LOG_TAIL: u32 = 20;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Window boundaries carry second granularity
const WINDOW_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

type SessionRegistry = Arc<Mutex<HashMap<String, bool>>>;

/// Manages log-tailing sessions for one infrastructure target
///
/// The session registry (id → liveness flag) is the only shared mutable
/// state; each session's loop reads its flag once per iteration, so
/// closing a session stops its remote commands within one poll interval.
pub struct LogStreamer {
    cli: DockerCli,
    executor: Arc<dyn RemoteExecutor>,
    sessions: SessionRegistry,
    poll_interval: Duration,
}

impl LogStreamer {
    pub fn new(infra: &InfrastructureConfig, executor: Arc<dyn RemoteExecutor>) -> Self {
        Self {
            cli: DockerCli::new(infra),
            executor,
            sessions: Arc::new(Mutex::new(HashMap::new())),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Overrides the poll interval (tests use a short one)
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Starts a session transmitting log lines to a subscriber
    pub fn create_session(
        &self,
        session_id: &str,
        request: &LogSessionRequest,
        on_next_line: LineCallback,
    ) -> Result<()> {
        validate_job_name(&request.job_name)?;
        validate_job_version(&request.job_version)?;
        let container = resource_name(&request.job_name, &request.job_version);
        let tail = request.tail.unwrap_or(DEFAULT_LOG_TAIL);

        // Registered before the task starts so a close racing session
        // startup still terminates the loop
        self.sessions
            .lock()
            .unwrap()
            .insert(session_id.to_string(), true);

        let session_id = session_id.to_string();
        let task_session_id = session_id.clone();
        let cli = self.cli.clone();
        let executor = Arc::clone(&self.executor);
        let sessions = Arc::clone(&self.sessions);
        let poll_interval = self.poll_interval;

        tokio::spawn(async move {
            let session_id = task_session_id;
            let result = watch_logs(
                &session_id,
                &container,
                tail,
                &cli,
                executor,
                &sessions,
                poll_interval,
                on_next_line,
            )
            .await;

            match result {
                Ok(()) => {}
                // The tailed process was torn down on purpose
                Err(e) if e.is_termination() => {
                    debug!("Log source of session {} terminated", session_id);
                }
                Err(e) => {
                    error!("Log session {} failed: {}", session_id, e);
                }
            }
            sessions.lock().unwrap().remove(&session_id);
        });

        debug!("Log session {} created", session_id);
        Ok(())
    }

    /// Closes a session; its loop observes the removed liveness flag on
    /// the next iteration boundary
    pub fn close_session(&self, session_id: &str) {
        if self.sessions.lock().unwrap().remove(session_id).is_some() {
            debug!("Log session {} closed", session_id);
        }
    }

    /// Whether a session is still registered as live
    pub fn is_live(&self, session_id: &str) -> bool {
        self.sessions.lock().unwrap().get(session_id) == Some(&true)
    }
}

#[allow(clippy::too_many_arguments)]
async fn watch_logs(
    session_id: &str,
    container: &str,
    tail: u32,
    cli: &DockerCli,
    executor: Arc<dyn RemoteExecutor>,
    sessions: &SessionRegistry,
    poll_interval: Duration,
    on_next_line: LineCallback,
) -> std::result::Result<(), GatewayError> {
    let mut last_time = window_timestamp(Utc::now());

    // Bounded historical replay up to "now"
    let output = executor
        .execute(&cli.logs(container, Some(tail), None, Some(&last_time)), None)
        .await?;
    emit_lines(session_id, &output, &on_next_line);

    loop {
        if !is_session_live(sessions, session_id) {
            break;
        }
        let now_time = window_timestamp(Utc::now());
        let output = executor
            .execute(
                &cli.logs(container, None, Some(&last_time), Some(&now_time)),
                None,
            )
            .await?;
        last_time = now_time;
        emit_lines(session_id, &output, &on_next_line);
        tokio::time::sleep(poll_interval).await;
    }
    Ok(())
}

fn is_session_live(sessions: &SessionRegistry, session_id: &str) -> bool {
    sessions.lock().unwrap().get(session_id) == Some(&true)
}

fn window_timestamp(time: DateTime<Utc>) -> String {
    time.format(WINDOW_TIME_FORMAT).to_string()
}

fn emit_lines(session_id: &str, output: &str, on_next_line: &LineCallback) {
    for line in output.lines().filter(|line| !line.is_empty()) {
        on_next_line(session_id, line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeExecutor, test_infra};
    use stevedore_gateway::TERMINATED_EXIT_CODE;

    fn streamer(executor: Arc<FakeExecutor>) -> LogStreamer {
        LogStreamer::new(&test_infra(), executor)
            .with_poll_interval(Duration::from_millis(25))
    }

    fn request() -> LogSessionRequest {
        LogSessionRequest {
            job_name: "demo".to_string(),
            job_version: "1".to_string(),
            tail: Some(5),
        }
    }

    fn collector() -> (Arc<Mutex<Vec<(String, String)>>>, LineCallback) {
        let lines: Arc<Mutex<Vec<(String, String)>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&lines);
        let callback: LineCallback = Arc::new(move |session_id, line| {
            sink.lock()
                .unwrap()
                .push((session_id.to_string(), line.to_string()));
        });
        (lines, callback)
    }

    #[tokio::test]
    async fn test_streams_lines_in_order_and_skips_empty() {
        let executor = FakeExecutor::new();
        executor.push_stdout("boot line\n\nready line");
        let (lines, callback) = collector();
        let streamer = streamer(Arc::clone(&executor));

        streamer
            .create_session("session-1", &request(), callback)
            .expect("session should start");
        tokio::time::sleep(Duration::from_millis(100)).await;
        streamer.close_session("session-1");

        let collected = lines.lock().unwrap().clone();
        assert_eq!(
            collected,
            vec![
                ("session-1".to_string(), "boot line".to_string()),
                ("session-1".to_string(), "ready line".to_string()),
            ]
        );
        // Historical fetch carries the requested tail
        assert!(executor.commands()[0].contains("--tail 5"));
    }

    #[tokio::test]
    async fn test_close_session_stops_remote_commands() {
        let executor = FakeExecutor::new();
        let (_lines, callback) = collector();
        let streamer = streamer(Arc::clone(&executor));

        streamer
            .create_session("session-1", &request(), callback)
            .expect("session should start");
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(streamer.is_live("session-1"));
        assert!(executor.command_count() > 0);

        streamer.close_session("session-1");
        assert!(!streamer.is_live("session-1"));

        // Let the loop observe the closed flag
        tokio::time::sleep(Duration::from_millis(100)).await;
        let settled = executor.command_count();
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(executor.command_count(), settled);
    }

    #[tokio::test]
    async fn test_termination_exit_code_ends_session_silently() {
        let executor = FakeExecutor::new();
        executor.push_failure(TERMINATED_EXIT_CODE, "");
        let (lines, callback) = collector();
        let streamer = streamer(Arc::clone(&executor));

        streamer
            .create_session("session-1", &request(), callback)
            .expect("session should start");
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(lines.lock().unwrap().is_empty());
        assert_eq!(executor.command_count(), 1);
        // The loop deregistered itself on exit
        assert!(!streamer.is_live("session-1"));
    }

    #[tokio::test]
    async fn test_command_failure_ends_session_without_delivering_errors() {
        let executor = FakeExecutor::new();
        executor.push_stdout("only line");
        executor.push_failure(1, "no such container");
        let (lines, callback) = collector();
        let streamer = streamer(Arc::clone(&executor));

        streamer
            .create_session("session-1", &request(), callback)
            .expect("session should start");
        tokio::time::sleep(Duration::from_millis(100)).await;

        let collected = lines.lock().unwrap().clone();
        assert_eq!(collected.len(), 1);
        assert_eq!(collected[0].1, "only line");
        assert!(!streamer.is_live("session-1"));
    }

    #[tokio::test]
    async fn test_sessions_are_independent() {
        let executor = FakeExecutor::new();
        let (_lines, callback) = collector();
        let streamer = streamer(Arc::clone(&executor));

        streamer
            .create_session("session-1", &request(), Arc::clone(&callback))
            .expect("session should start");
        streamer
            .create_session("session-2", &request(), callback)
            .expect("session should start");
        tokio::time::sleep(Duration::from_millis(50)).await;

        streamer.close_session("session-1");
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!streamer.is_live("session-1"));
        assert!(streamer.is_live("session-2"));
        streamer.close_session("session-2");
    }

    #[tokio::test]
    async fn test_invalid_job_name_is_rejected() {
        let executor = FakeExecutor::new();
        let (_lines, callback) = collector();
        let streamer = streamer(Arc::clone(&executor));

        let mut bad_request = request();
        bad_request.job_name = "demo; cat /etc/passwd".to_string();
        assert!(
            streamer
                .create_session("session-1", &bad_request, callback)
                .is_err()
        );
        assert_eq!(executor.command_count(), 0);
    }
}
