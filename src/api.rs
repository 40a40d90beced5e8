//! API Module
//!
//! Handles HTTP communication with the statement backend.

use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

/// API client for the statement admin backend
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    client: reqwest::Client,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Fetch aggregate dashboard metrics
    pub async fn fetch_dashboard_metrics(&self) -> Result<DashboardMetrics, ApiError> {
        let metrics: DashboardMetrics = self.get_json("/api/admin/metrics").await?;
        debug!(
            "Fetched dashboard metrics: {} accounts, {} pending imports",
            metrics.total_accounts, metrics.pending_imports
        );
        Ok(metrics)
    }

    /// Fetch the list of background import jobs that are still active
    pub async fn fetch_active_imports(&self) -> Result<Vec<ImportJob>, ApiError> {
        let jobs: Vec<ImportJob> = self.get_json("/api/admin/imports?status=active").await?;
        debug!("Fetched {} active import jobs", jobs.len());
        Ok(jobs)
    }

    /// Fetch recent admin notifications
    pub async fn fetch_notifications(&self) -> Result<Vec<NotificationItem>, ApiError> {
        self.get_json("/api/admin/notifications").await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error: ErrorResponse = response
                .json()
                .await
                .unwrap_or_else(|_| ErrorResponse {
                    error: format!("Status: {}", status),
                });
            info!("Request to {} failed: {}", url, error.error);
            return Err(ApiError::Server(error.error));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::Parse(e.to_string()))
    }
}

// Response types

/// Aggregate counters shown on the dashboard cards
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardMetrics {
    pub total_accounts: u64,
    pub movements_today: u64,
    pub statements_imported: u64,
    pub pending_imports: u32,
    pub failed_imports: u32,
    pub last_import_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Lifecycle of a statement import job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportJob {
    pub id: String,
    pub file_name: String,
    pub status: ImportStatus,
    pub progress_pct: f32,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub finished_at: Option<chrono::DateTime<chrono::Utc>>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationItem {
    pub id: String,
    pub severity: Severity,
    pub message: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: String,
}

/// API errors
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Parse error: {0}")]
    Parse(String),
}
