//! HTTP client for end-to-end tests
//!
//! This module provides a high-level HTTP client that wraps reqwest and
//! provides methods for all server endpoints.
//!
//! When API routes or request formats change, update only this file.

use std::time::Duration;

use reqwest::Response;
use serde_json::{json, Value};

const REQUEST_TIMEOUT_SECS: u64 = 30;

/// HTTP test client
pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    /// The base URL of the test server
    pub base_url: String,
}

impl TestClient {
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self { client, base_url }
    }

    // ========================================================================
    // Service Endpoints
    // ========================================================================

    /// GET /api/health
    pub async fn health(&self) -> Response {
        self.client
            .get(format!("{}/api/health", self.base_url))
            .send()
            .await
            .expect("health request failed")
    }

    /// GET /api/naming-templates
    pub async fn get_naming_templates(&self) -> Response {
        self.client
            .get(format!("{}/api/naming-templates", self.base_url))
            .send()
            .await
            .expect("get naming-templates failed")
    }

    /// PUT /api/naming-templates
    pub async fn put_naming_templates(&self, body: Value) -> Response {
        self.client
            .put(format!("{}/api/naming-templates", self.base_url))
            .json(&body)
            .send()
            .await
            .expect("put naming-templates failed")
    }

    /// POST /api/metadata
    pub async fn metadata(&self, url: &str) -> Response {
        self.client
            .post(format!("{}/api/metadata", self.base_url))
            .json(&json!({ "url": url }))
            .send()
            .await
            .expect("metadata request failed")
    }

    /// POST /api/filesize
    pub async fn filesize(&self, body: Value) -> Response {
        self.client
            .post(format!("{}/api/filesize", self.base_url))
            .json(&body)
            .send()
            .await
            .expect("filesize request failed")
    }

    // ========================================================================
    // Download Endpoints
    // ========================================================================

    /// POST /api/download
    pub async fn download(&self, body: Value) -> Response {
        self.client
            .post(format!("{}/api/download", self.base_url))
            .json(&body)
            .send()
            .await
            .expect("download request failed")
    }

    /// GET /api/downloads/active
    pub async fn active_downloads(&self) -> Response {
        self.client
            .get(format!("{}/api/downloads/active", self.base_url))
            .send()
            .await
            .expect("active downloads request failed")
    }

    /// DELETE /api/downloads/completed
    pub async fn clear_finished(&self) -> Response {
        self.client
            .delete(format!("{}/api/downloads/completed", self.base_url))
            .send()
            .await
            .expect("clear finished request failed")
    }

    /// GET /api/download/progress/:job_id
    pub async fn progress(&self, job_id: &str) -> Response {
        self.client
            .get(format!(
                "{}/api/download/progress/{}",
                self.base_url, job_id
            ))
            .send()
            .await
            .expect("progress request failed")
    }

    /// POST /api/download/pause/:job_id
    pub async fn pause(&self, job_id: &str) -> Response {
        self.control("pause", job_id).await
    }

    /// POST /api/download/resume/:job_id
    pub async fn resume(&self, job_id: &str) -> Response {
        self.control("resume", job_id).await
    }

    /// POST /api/download/cancel/:job_id
    pub async fn cancel(&self, job_id: &str) -> Response {
        self.control("cancel", job_id).await
    }

    async fn control(&self, action: &str, job_id: &str) -> Response {
        self.client
            .post(format!(
                "{}/api/download/{}/{}",
                self.base_url, action, job_id
            ))
            .send()
            .await
            .expect("control request failed")
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    /// Progress body for a job, panicking on a non-200 response.
    pub async fn progress_json(&self, job_id: &str) -> Value {
        let response = self.progress(job_id).await;
        assert_eq!(
            response.status(),
            reqwest::StatusCode::OK,
            "progress for {} not available",
            job_id
        );
        response.json().await.expect("progress body was not JSON")
    }

    /// Poll a job until its status matches, or panic after the timeout.
    pub async fn wait_for_status(&self, job_id: &str, status: &str, timeout: Duration) -> Value {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let progress = self.progress_json(job_id).await;
            if progress["status"] == status {
                return progress;
            }
            if tokio::time::Instant::now() >= deadline {
                panic!(
                    "job {} never reached status {:?}; last progress: {}",
                    job_id, status, progress
                );
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    /// Poll a job until its percentage is at least `target`.
    pub async fn wait_for_percentage(&self, job_id: &str, target: f64, timeout: Duration) -> Value {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let progress = self.progress_json(job_id).await;
            if progress["percentage"].as_f64().unwrap_or(0.0) >= target {
                return progress;
            }
            if tokio::time::Instant::now() >= deadline {
                panic!(
                    "job {} never reached {}%; last progress: {}",
                    job_id, target, progress
                );
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    }
}
