//! Long-poll waiter for asynchronous remote tasks.
//!
//! The poll interval adapts to the task's self-reported progress: from
//! elapsed time and percent complete we estimate the time remaining,
//! damp it, and clamp the result to a fixed band. Slow tasks are
//! polled gently, fast tasks near completion are polled eagerly.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info};

use crate::client::InfrastructureClient;
use crate::error::{RemoteError, Result};
use crate::types::{TaskHandle, TaskState};

/// Polling policy for [`TaskWaiter`].
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Interval used before the task reports usable progress.
    pub initial: Duration,
    /// Lower clamp on the adaptive interval.
    pub min: Duration,
    /// Upper clamp on the adaptive interval.
    pub max: Duration,
    /// Divisor applied to the estimated remaining time.
    pub damping: f64,
    /// Hard ceiling on total wait; exceeding it is a [`RemoteError::TaskTimeout`].
    pub timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(1),
            min: Duration::from_secs(1),
            max: Duration::from_secs(10),
            damping: 10.0,
            timeout: Duration::from_secs(3600),
        }
    }
}

/// Computes how long to sleep before the next poll.
///
/// With `progress` of zero (nothing learned yet) or ≥ 100 (the task is
/// about to finish) the initial interval is used. Otherwise the
/// remaining time is extrapolated linearly from elapsed time and
/// progress, divided by the damping factor, and clamped to
/// `[min, max]`.
#[must_use]
pub fn next_poll_interval(config: &PollConfig, elapsed: Duration, progress: u8) -> Duration {
    if progress == 0 || progress >= 100 {
        return config.initial;
    }
    let fraction = f64::from(progress) / 100.0;
    let estimated_total = elapsed.as_secs_f64() / fraction;
    let remaining = estimated_total - elapsed.as_secs_f64();
    let damped = Duration::from_secs_f64((remaining / config.damping).max(0.0));
    damped.clamp(config.min, config.max)
}

/// Polls a task until it reaches a terminal state.
pub struct TaskWaiter<'a, C> {
    client: &'a C,
    config: PollConfig,
}

impl<'a, C: InfrastructureClient> TaskWaiter<'a, C> {
    /// Creates a waiter with the given policy.
    pub fn new(client: &'a C, config: PollConfig) -> Self {
        Self { client, config }
    }

    /// Waits for the task, returning its result payload on success.
    ///
    /// A timeout leaves the task's outcome unknown and is reported as
    /// [`RemoteError::TaskTimeout`], distinct from a task that the
    /// infrastructure itself marked failed.
    pub async fn wait(&self, task: &TaskHandle) -> Result<Option<serde_json::Value>> {
        self.wait_inner(task, None).await
    }

    /// Waits for the task, answering any question it raises with
    /// `default_choice` so an unattended operation cannot stall.
    pub async fn wait_answering(
        &self,
        task: &TaskHandle,
        default_choice: &str,
    ) -> Result<Option<serde_json::Value>> {
        self.wait_inner(task, Some(default_choice)).await
    }

    async fn wait_inner(
        &self,
        task: &TaskHandle,
        default_choice: Option<&str>,
    ) -> Result<Option<serde_json::Value>> {
        let started = Instant::now();
        loop {
            // The wall-clock budget binds every iteration, including
            // ones spent answering questions.
            let elapsed = started.elapsed();
            if elapsed >= self.config.timeout {
                return Err(RemoteError::TaskTimeout {
                    elapsed_secs: elapsed.as_secs(),
                });
            }
            let info = self.client.task_info(task).await?;
            match info.state {
                TaskState::Success => {
                    debug!(task = %task, "remote task finished");
                    return Ok(info.result);
                }
                TaskState::Error => {
                    let message = info
                        .error_message
                        .unwrap_or_else(|| "task failed without an error message".to_string());
                    return Err(RemoteError::TaskFailed { message });
                }
                TaskState::Queued | TaskState::Running => {
                    if let (Some(choice), Some(question)) = (default_choice, info.question) {
                        info!(task = %task, question = %question.text, choice, "answering blocking question");
                        self.client.answer(task, &question.id, choice).await?;
                    }
                    let interval = next_poll_interval(&self.config, elapsed, info.progress_percent);
                    tokio::time::sleep(interval).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use parking_lot::Mutex;
    use test_case::test_case;
    use trellis_resources::ManagedRef;

    use super::*;
    use crate::client::PropertyMap;
    use crate::types::{DiskGeometry, TaskInfo};

    fn band_config() -> PollConfig {
        PollConfig::default()
    }

    #[test]
    fn zero_progress_uses_initial_interval() {
        let interval = next_poll_interval(&band_config(), Duration::from_secs(30), 0);
        assert_eq!(interval, Duration::from_secs(1));
    }

    #[test]
    fn complete_progress_uses_initial_interval() {
        let interval = next_poll_interval(&band_config(), Duration::from_secs(30), 100);
        assert_eq!(interval, Duration::from_secs(1));
    }

    #[test_case(100, 50, 10; "midway: 100s remaining estimate damped to 10s")]
    #[test_case(1000, 10, 10; "slow task clamped to the max interval")]
    #[test_case(10, 99, 1; "nearly done clamped to the min interval")]
    fn adaptive_interval(elapsed_secs: u64, progress: u8, expected_secs: u64) {
        let interval =
            next_poll_interval(&band_config(), Duration::from_secs(elapsed_secs), progress);
        assert_eq!(interval, Duration::from_secs(expected_secs));
    }

    fn unused<T>(what: &str) -> crate::error::Result<T> {
        Err(crate::error::RemoteError::Client {
            message: format!("{what} is not used by the waiter"),
        })
    }

    /// Client whose task reports a scripted sequence of status
    /// snapshots, one per poll.
    struct ScriptedClient {
        infos: Mutex<Vec<TaskInfo>>,
        answers: AtomicUsize,
    }

    impl ScriptedClient {
        fn new(mut infos: Vec<TaskInfo>) -> Self {
            infos.reverse();
            Self {
                infos: Mutex::new(infos),
                answers: AtomicUsize::new(0),
            }
        }
    }

    impl InfrastructureClient for ScriptedClient {
        async fn properties(
            &self,
            _objects: &[ManagedRef],
            _names: &[&str],
            _ensure_all: bool,
        ) -> crate::error::Result<HashMap<ManagedRef, PropertyMap>> {
            unused("this call")
        }

        async fn task_info(&self, _task: &TaskHandle) -> crate::error::Result<TaskInfo> {
            let mut infos = self.infos.lock();
            match infos.len() {
                0 => unused("polling past the scripted sequence"),
                1 => Ok(infos[0].clone()),
                _ => Ok(infos.pop().expect("non-empty")),
            }
        }

        async fn answer(
            &self,
            _task: &TaskHandle,
            _question_id: &str,
            _choice: &str,
        ) -> crate::error::Result<()> {
            self.answers.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn create_disk(
            &self,
            _datastore: &ManagedRef,
            _path: &str,
            _size_kb: u64,
        ) -> crate::error::Result<TaskHandle> {
            unused("this call")
        }

        async fn move_disk(
            &self,
            _source: &str,
            _destination: &str,
            _copy: bool,
        ) -> crate::error::Result<TaskHandle> {
            unused("this call")
        }

        async fn delete_disk(&self, _path: &str) -> crate::error::Result<TaskHandle> {
            unused("this call")
        }

        async fn query_disk(&self, _path: &str) -> crate::error::Result<Option<DiskGeometry>> {
            unused("this call")
        }

        async fn find_vm(&self, _name: &str) -> crate::error::Result<Option<ManagedRef>> {
            unused("this call")
        }

        async fn clone_vm(
            &self,
            _source: &ManagedRef,
            _name: &str,
            _datastore: &ManagedRef,
        ) -> crate::error::Result<TaskHandle> {
            unused("this call")
        }
    }

    fn fast_config() -> PollConfig {
        PollConfig {
            initial: Duration::from_millis(1),
            min: Duration::from_millis(1),
            max: Duration::from_millis(2),
            damping: 10.0,
            timeout: Duration::from_secs(60),
        }
    }

    #[tokio::test]
    async fn wait_returns_the_result_payload_on_success() {
        let client = ScriptedClient::new(vec![
            TaskInfo::queued(),
            TaskInfo::running(40),
            TaskInfo::success(Some(serde_json::json!("vm-204"))),
        ]);
        let waiter = TaskWaiter::new(&client, fast_config());
        let result = waiter.wait(&TaskHandle::new("task-1")).await.expect("success");
        assert_eq!(result, Some(serde_json::json!("vm-204")));
    }

    #[tokio::test]
    async fn wait_surfaces_task_failure_with_its_message() {
        let client = ScriptedClient::new(vec![
            TaskInfo::running(10),
            TaskInfo::failed("insufficient disk space"),
        ]);
        let waiter = TaskWaiter::new(&client, fast_config());
        let err = waiter
            .wait(&TaskHandle::new("task-2"))
            .await
            .expect_err("task failed");
        assert!(matches!(
            err,
            RemoteError::TaskFailed { ref message } if message == "insufficient disk space"
        ));
    }

    #[tokio::test]
    async fn wait_times_out_on_a_task_that_never_finishes() {
        let client = ScriptedClient::new(vec![TaskInfo::running(50)]);
        let config = PollConfig {
            timeout: Duration::from_millis(10),
            ..fast_config()
        };
        let waiter = TaskWaiter::new(&client, config);
        let err = waiter
            .wait(&TaskHandle::new("task-3"))
            .await
            .expect_err("timeout");
        assert!(matches!(err, RemoteError::TaskTimeout { .. }));
    }

    #[tokio::test]
    async fn wait_answering_answers_blocking_questions() {
        let client = ScriptedClient::new(vec![
            TaskInfo::running(20).with_question("q-1", "msg.cdromdisconnect"),
            TaskInfo::running(60),
            TaskInfo::success(None),
        ]);
        let waiter = TaskWaiter::new(&client, fast_config());
        let result = waiter
            .wait_answering(&TaskHandle::new("task-4"), "yes")
            .await
            .expect("success");
        assert_eq!(result, None);
        assert_eq!(client.answers.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn wait_answering_times_out_when_the_question_never_clears() {
        // The question survives every answer; the wall-clock budget
        // still has to end the wait.
        let client = ScriptedClient::new(vec![
            TaskInfo::running(50).with_question("q-1", "msg.cdromdisconnect"),
        ]);
        let config = PollConfig {
            timeout: Duration::from_millis(10),
            ..fast_config()
        };
        let waiter = TaskWaiter::new(&client, config);
        let err = tokio::time::timeout(
            Duration::from_millis(500),
            waiter.wait_answering(&TaskHandle::new("task-6"), "yes"),
        )
        .await
        .expect("poll loop must terminate on its own")
        .expect_err("timeout");
        assert!(matches!(err, RemoteError::TaskTimeout { .. }));
        assert!(client.answers.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn plain_wait_never_answers_questions() {
        let client = ScriptedClient::new(vec![
            TaskInfo::running(20).with_question("q-1", "msg.cdromdisconnect"),
            TaskInfo::success(None),
        ]);
        let waiter = TaskWaiter::new(&client, fast_config());
        waiter.wait(&TaskHandle::new("task-5")).await.expect("success");
        assert_eq!(client.answers.load(Ordering::SeqCst), 0);
    }
}
