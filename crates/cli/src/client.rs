//! API client for the monitor's statistics endpoints

use anyhow::{Context, Result};
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;

/// HTTP client for the monitor API
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid API URL")?;

        Ok(Self { client, base_url })
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("API error ({}): {}", status, body);
        }

        response.json().await.context("Failed to parse response")
    }
}

// API response types

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailySeries {
    pub timestamps: Vec<String>,
    pub unique_students: Vec<usize>,
    pub unique_notebooks: Vec<usize>,
    pub new_students: Vec<usize>,
    pub new_notebooks: Vec<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TotalsSeries {
    pub timestamps: Vec<String>,
    pub total_students: Vec<usize>,
    pub total_notebooks: Vec<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyStats {
    pub daily: DailySeries,
    pub events: TotalsSeries,
}

/// Replayed counters, one series per counter keyed by its pluralized
/// name. Values a line did not record are null.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountsStats {
    pub timestamps: Vec<String>,
    #[serde(flatten)]
    pub series: BTreeMap<String, Vec<Option<u64>>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Heatmap {
    pub x: Vec<String>,
    pub y: Vec<String>,
    pub z: Vec<Vec<Option<u64>>>,
    pub zmin: u64,
    pub zmax: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageStats {
    pub nbnotebooks: usize,
    pub nbstudents: usize,
    pub nbstudents_per_notebook: Vec<(String, usize)>,
    pub nbstudents_per_notebook_animated: BTreeMap<String, Vec<(String, usize)>>,
    pub nbstudents_per_nbnotebooks: Vec<(usize, usize)>,
    pub heatmap: Heatmap,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_parses_daily_stats() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/courses/python-primer/stats/daily")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                    "daily": {
                        "timestamps": ["2024-03-01 23:59:59"],
                        "unique_students": [2],
                        "unique_notebooks": [1],
                        "new_students": [2],
                        "new_notebooks": [1]
                    },
                    "events": {
                        "timestamps": ["2024-03-01T10:00:00"],
                        "total_students": [2],
                        "total_notebooks": [1]
                    }
                }"#,
            )
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let stats: DailyStats = client
            .get("courses/python-primer/stats/daily")
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(stats.daily.unique_students, vec![2]);
        assert_eq!(stats.events.total_notebooks, vec![1]);
    }

    #[tokio::test]
    async fn test_get_parses_flattened_counts() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/courses/python-primer/stats/counts")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                    "timestamps": ["2024-03-01T10:00:00"],
                    "running_containers": [3],
                    "system_kernels": [null]
                }"#,
            )
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let stats: CountsStats = client
            .get("courses/python-primer/stats/counts")
            .await
            .unwrap();

        assert_eq!(stats.timestamps.len(), 1);
        assert_eq!(stats.series["running_containers"], vec![Some(3)]);
        assert_eq!(stats.series["system_kernels"], vec![None]);
    }

    #[tokio::test]
    async fn test_get_surfaces_api_errors() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/courses/python-primer/stats/daily")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let result: Result<DailyStats> = client.get("courses/python-primer/stats/daily").await;

        let error = result.unwrap_err();
        assert!(error.to_string().contains("API error"));
    }
}
