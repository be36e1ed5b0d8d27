//! Shared types for the caption-tunes API.
//!
//! These types are used across the application for request/response handling
//! and internal data representation.

pub mod api;
pub mod emotion;

use serde::{Deserialize, Serialize};

pub use api::*;
pub use emotion::EmotionScore;

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    pub caption_model: String,
    pub emotion_model: String,
    pub uptime_s: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
}
