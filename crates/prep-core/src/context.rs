//! Run Context: identity of the invocation shared by every executor
use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: String,
    pub trace_id: String,
    pub started_at: DateTime<Utc>,
}

impl RunContext {
    pub fn new(run_id: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        Self {
            run_id: run_id.into(),
            trace_id: uuid::Uuid::new_v4().to_string(),
            started_at,
        }
    }
}
