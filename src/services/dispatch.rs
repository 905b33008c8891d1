// SPDX-License-Identifier: MIT
// Copyright 2026 The Futurecard Authors

//! Cloud Tasks dispatcher for deferred handler invocations.
//!
//! The webhook hands over an opaque payload and a schedule; the dispatcher
//! enqueues exactly one future HTTP POST of those bytes to the given
//! handler path. `schedule_time` is a not-before bound only: the queue
//! guarantees neither exact firing time nor ordering between tasks.
//!
//! Uses the official google-cloud-tasks-v2 SDK.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use axum::body::Bytes;
use chrono::{DateTime, Utc};

use crate::error::{AppError, Result};

/// When a scheduled task should fire.
///
/// Both forms are first-class: callers pick a relative delay or an
/// absolute wall-clock time and the dispatcher honors either.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// Fire no earlier than this many seconds from now.
    After(u64),
    /// Fire no earlier than this instant.
    At(DateTime<Utc>),
}

impl Schedule {
    /// Resolve to the absolute not-before instant, relative to `now`.
    pub fn resolve(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Schedule::After(seconds) => now + chrono::Duration::seconds(*seconds as i64),
            Schedule::At(when) => *when,
        }
    }
}

/// One recorded enqueue, kept by the recording dispatcher for inspection.
#[derive(Debug, Clone)]
pub struct ScheduledTask {
    /// Absolute URL the task will POST to
    pub url: String,
    /// Payload bytes, exactly as handed to `dispatch`
    pub payload: Bytes,
    /// Schedule the caller picked
    pub schedule: Schedule,
    /// Resolved not-before instant
    pub scheduled_for: DateTime<Utc>,
    /// When `dispatch` was called
    pub requested_at: DateTime<Utc>,
}

enum DispatchMode {
    Remote,
    Recording(RecordingState),
}

#[derive(Default)]
struct RecordingState {
    buffer: Mutex<Vec<ScheduledTask>>,
    fail_all: AtomicBool,
}

/// Cloud Tasks client wrapper.
pub struct TaskDispatcher {
    project_id: String,
    location: String,
    queue_name: String,
    mode: DispatchMode,
}

impl TaskDispatcher {
    pub fn new(project_id: &str, region: &str) -> Self {
        Self {
            project_id: project_id.to_string(),
            location: region.to_string(),
            queue_name: crate::config::NOTIFICATION_QUEUE_NAME.to_string(),
            mode: DispatchMode::Remote,
        }
    }

    /// Create a dispatcher that records enqueues instead of calling Cloud
    /// Tasks (offline mode for tests and local development).
    pub fn new_recording() -> Self {
        Self {
            project_id: "offline".to_string(),
            location: "offline".to_string(),
            queue_name: crate::config::NOTIFICATION_QUEUE_NAME.to_string(),
            mode: DispatchMode::Recording(RecordingState::default()),
        }
    }

    /// Enqueue one future POST of `payload` to `service_url + handler_path`.
    ///
    /// The payload is carried through untouched; the dispatcher never
    /// parses it. Success means the queue accepted the task, nothing more.
    pub async fn dispatch(
        &self,
        service_url: &str,
        handler_path: &str,
        payload: Bytes,
        schedule: Schedule,
    ) -> Result<()> {
        let requested_at = Utc::now();
        let scheduled_for = schedule.resolve(requested_at);
        let url = format!("{}{}", service_url, handler_path);

        match &self.mode {
            DispatchMode::Recording(state) => {
                if state.fail_all.load(Ordering::Relaxed) {
                    return Err(AppError::Schedule(
                        "mock enqueue failure (recording mode)".to_string(),
                    ));
                }
                let task = ScheduledTask {
                    url,
                    payload,
                    schedule,
                    scheduled_for,
                    requested_at,
                };
                state
                    .buffer
                    .lock()
                    .map_err(|_| AppError::Schedule("recording buffer poisoned".to_string()))?
                    .push(task);
                Ok(())
            }
            DispatchMode::Remote => {
                self.enqueue_remote(service_url, &url, payload, scheduled_for)
                    .await
            }
        }
    }

    async fn enqueue_remote(
        &self,
        service_url: &str,
        url: &str,
        payload: Bytes,
        scheduled_for: DateTime<Utc>,
    ) -> Result<()> {
        use google_cloud_gax::retry_policy::{Aip194Strict, RetryPolicyExt};
        use google_cloud_tasks_v2::client::CloudTasks;
        use google_cloud_tasks_v2::model::{HttpRequest, OidcToken, Task};

        let client = CloudTasks::builder()
            .with_retry_policy(Aip194Strict.with_attempt_limit(3))
            .build()
            .await
            .map_err(|e| AppError::Schedule(format!("Cloud Tasks client error: {}", e)))?;

        let queue_path = format!(
            "projects/{}/locations/{}/queues/{}",
            self.project_id, self.location, self.queue_name
        );

        let http_request = HttpRequest::default()
            .set_url(url.to_string())
            .set_http_method("POST")
            .set_body(payload)
            .set_headers(std::collections::HashMap::from([(
                "Content-Type".to_string(),
                "application/json".to_string(),
            )]))
            .set_oidc_token(
                OidcToken::default()
                    .set_service_account_email(format!(
                        "futurecard-api@{}.iam.gserviceaccount.com",
                        self.project_id
                    ))
                    .set_audience(service_url.to_string()),
            );

        let schedule_time = google_cloud_wkt::Timestamp::clamp(
            scheduled_for.timestamp(),
            scheduled_for.timestamp_subsec_nanos() as i32,
        );

        let task = Task::default()
            .set_http_request(http_request)
            .set_schedule_time(schedule_time);

        let _response = client
            .create_task()
            .set_parent(queue_path)
            .set_task(task)
            .send()
            .await
            .map_err(|e| AppError::Schedule(format!("Cloud Tasks create error: {}", e)))?;

        Ok(())
    }

    /// Tasks recorded so far (recording mode only; empty otherwise).
    pub fn recorded(&self) -> Vec<ScheduledTask> {
        match &self.mode {
            DispatchMode::Recording(state) => {
                state.buffer.lock().map(|b| b.clone()).unwrap_or_default()
            }
            DispatchMode::Remote => Vec::new(),
        }
    }

    /// Make every subsequent dispatch fail (recording mode only).
    pub fn set_mock_failure(&self, fail: bool) {
        if let DispatchMode::Recording(state) = &self.mode {
            state.fail_all.store(fail, Ordering::Relaxed);
        }
    }
}
