use std::collections::HashMap;
use std::ops::Add;
use std::sync::{Arc, RwLock};

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use time::{Duration, OffsetDateTime};
use tracing::{info, warn};

/// Liveness reporting for the long-running loops of an ingestion process.
///
/// Each loop registers itself as a component and must keep reporting healthy
/// more often than its deadline. The process is healthy only when every
/// registered component is:
///   - a component that never reported is `Starting`, and not healthy yet
///   - a component whose last report expired is `Stalled`
///   - a component can flag itself `Unhealthy` explicitly, e.g. when it keeps
///     failing to produce output
///
/// A registry with no component is unhealthy, so a probe never passes before
/// the loops have started.

#[derive(Default, Debug)]
pub struct HealthStatus {
    /// True when all components are healthy
    pub healthy: bool,
    /// Current status of each registered component, for display
    pub components: HashMap<String, ComponentStatus>,
}

impl IntoResponse for HealthStatus {
    /// 200 when healthy, 500 otherwise, with the component map in the body.
    fn into_response(self) -> Response {
        let body = format!("{self:?}");
        match self.healthy {
            true => (StatusCode::OK, body),
            false => (StatusCode::INTERNAL_SERVER_ERROR, body),
        }
        .into_response()
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ComponentStatus {
    /// Set on registration
    Starting,
    /// Recently reported healthy, must report again before the date
    HealthyUntil(OffsetDateTime),
    /// Reported unhealthy
    Unhealthy,
    /// The HealthyUntil deadline passed without a new report
    Stalled,
}

type Components = Arc<RwLock<HashMap<String, ComponentStatus>>>;

/// Handed to a component so it can report its own status.
#[derive(Clone)]
pub struct HealthHandle {
    component: String,
    deadline: Duration,
    components: Components,
}

impl HealthHandle {
    /// Report healthy until now + deadline.
    pub fn report_healthy(&self) {
        self.report_status(ComponentStatus::HealthyUntil(
            OffsetDateTime::now_utc().add(self.deadline),
        ))
    }

    pub fn report_status(&self, status: ComponentStatus) {
        match self.components.write() {
            Ok(mut map) => {
                _ = map.insert(self.component.clone(), status);
            }
            // Poisoned lock: the probes will fail and the process restart
            Err(_) => warn!("poisoned health registry lock, dropping status update"),
        }
    }

    pub fn component(&self) -> &str {
        &self.component
    }
}

#[derive(Clone)]
pub struct HealthRegistry {
    name: String,
    components: Components,
}

impl HealthRegistry {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            components: Default::default(),
        }
    }

    /// Registers a component in `Starting` state and returns its handle.
    pub fn register(&self, component: String, deadline: Duration) -> HealthHandle {
        let handle = HealthHandle {
            component,
            deadline,
            components: self.components.clone(),
        };
        handle.report_status(ComponentStatus::Starting);
        handle
    }

    /// Combined status of all registered components. Can be used as an axum handler.
    pub fn get_status(&self) -> HealthStatus {
        let now = OffsetDateTime::now_utc();
        let mut result = HealthStatus::default();

        let Ok(components) = self.components.read() else {
            warn!("{} health check failed: poisoned registry lock", self.name);
            return result;
        };

        result.healthy = !components.is_empty();
        for (name, status) in components.iter() {
            let status = match status {
                ComponentStatus::HealthyUntil(until) if *until > now => status.clone(),
                ComponentStatus::HealthyUntil(_) => {
                    result.healthy = false;
                    ComponentStatus::Stalled
                }
                _ => {
                    result.healthy = false;
                    status.clone()
                }
            };
            _ = result.components.insert(name.clone(), status);
        }

        match result.healthy {
            true => info!("{} health check ok", self.name),
            false => warn!("{} health check failed: {:?}", self.name, result.components),
        }
        result
    }
}
