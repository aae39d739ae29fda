//! Application state management

use crate::config::DashboardConfig;
use crate::dashboard::DashboardSession;
use crate::error::Result;
use std::time::Instant;

/// Application state shared across handlers
#[derive(Debug)]
pub struct AppState {
    pub session: DashboardSession,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: DashboardConfig) -> Result<Self> {
        Ok(Self {
            session: DashboardSession::new(config)?,
            started_at: Instant::now(),
        })
    }
}
