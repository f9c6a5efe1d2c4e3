//! Response types for the wrt-daemon HTTP endpoints. No logic lives here.

use serde::Serialize;

use crate::state::JobStatus;

// ---------------------------------------------------------------------------
// /v1/health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// /v1/jobs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct JobsResponse {
    pub daemon_uptime_secs: u64,
    pub jobs: Vec<JobStatus>,
}
