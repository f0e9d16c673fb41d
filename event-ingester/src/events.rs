//! Domain events published by the job-orchestration control plane.
//!
//! An `EventSequence` groups the events emitted for one job set of one queue.
//! The routing keys (`queue`, `job_set_name`) are skipped when empty so that a
//! normalized sequence never carries them on the wire.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSequence {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub queue: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub job_set_name: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub events: Vec<Event>,
}

impl EventSequence {
    /// Remove the routing keys, returning `(queue, job_set_name)`.
    pub fn take_keys(&mut self) -> (String, String) {
        (
            std::mem::take(&mut self.queue),
            std::mem::take(&mut self.job_set_name),
        )
    }

    pub fn has_keys(&self) -> bool {
        !self.queue.is_empty() || !self.job_set_name.is_empty()
    }

    /// Set `created` on every event that has none.
    pub fn backfill_created(&mut self, created: OffsetDateTime) {
        for event in self.events.iter_mut().filter(|e| e.created.is_none()) {
            event.created = Some(created);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub created: Option<OffsetDateTime>,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl Event {
    pub fn new(kind: EventKind) -> Self {
        Self {
            created: None,
            kind,
        }
    }

    pub fn created_at(mut self, created: OffsetDateTime) -> Self {
        self.created = Some(created);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    SubmitJob(SubmitJob),
    ReprioritiseJob {
        job_id: String,
        priority: u32,
    },
    CancelJob {
        job_id: String,
        #[serde(default)]
        reason: String,
    },
    CancelledJob {
        job_id: String,
    },
    JobRunLeased {
        run_id: String,
        job_id: String,
        executor_id: String,
        #[serde(default)]
        node_id: String,
    },
    JobRunRunning {
        run_id: String,
        job_id: String,
    },
    JobRunSucceeded {
        run_id: String,
        job_id: String,
    },
    JobRunErrors {
        run_id: String,
        job_id: String,
        errors: Vec<JobError>,
    },
    JobSucceeded {
        job_id: String,
    },
    JobErrors {
        job_id: String,
        errors: Vec<JobError>,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitJob {
    pub job_id: String,
    #[serde(default)]
    pub priority: u32,
    #[serde(default)]
    pub deduplication_id: String,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobError {
    pub terminal: bool,
    pub message: String,
}
