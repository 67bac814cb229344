use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnalysisStatus {
    /// Registered, analysis not started
    Pending,
    Processing,
    Completed,
    Failed,
}

impl AnalysisStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AnalysisStatus::Completed | AnalysisStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisStatus::Pending => "PENDING",
            AnalysisStatus::Processing => "PROCESSING",
            AnalysisStatus::Completed => "COMPLETED",
            AnalysisStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for AnalysisStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalysisStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(AnalysisStatus::Pending),
            "PROCESSING" => Ok(AnalysisStatus::Processing),
            "COMPLETED" => Ok(AnalysisStatus::Completed),
            "FAILED" => Ok(AnalysisStatus::Failed),
            other => Err(Error::Validation(format!("unknown analysis status: {}", other))),
        }
    }
}

/// One progress checkpoint as emitted by the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub percent: f32,
    pub message: String,
    pub status: Option<AnalysisStatus>,
}

impl ProgressUpdate {
    pub fn new(percent: f32, message: impl Into<String>) -> Self {
        Self {
            percent,
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(mut self, status: AnalysisStatus) -> Self {
        self.status = Some(status);
        self
    }
}

/// Latest known progress of an article's analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressState {
    pub percent: f32,
    pub message: String,
    pub status: AnalysisStatus,
    pub updated_at: DateTime<Utc>,
}

impl Default for ProgressState {
    fn default() -> Self {
        Self::pending()
    }
}

impl ProgressState {
    pub fn pending() -> Self {
        Self {
            percent: 0.0,
            message: "Not started".to_string(),
            status: AnalysisStatus::Pending,
            updated_at: Utc::now(),
        }
    }

    /// Folds an update into the state. Returns `false` and leaves the state
    /// untouched once it is terminal. Percent never moves backwards.
    pub fn apply(&mut self, update: &ProgressUpdate) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        let percent = if update.percent.is_finite() {
            update.percent.clamp(0.0, 100.0)
        } else {
            self.percent
        };
        self.percent = self.percent.max(percent);
        self.message = update.message.clone();
        if let Some(status) = update.status {
            self.status = status;
        }
        self.updated_at = Utc::now();
        true
    }
}
