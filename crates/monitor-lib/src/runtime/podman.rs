//! Podman implementation of [`ContainerRuntime`] over the libpod REST API

use super::{ContainerRuntime, RuntimeError};
use crate::models::{ContainerHandle, RunStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

const API_PREFIX: &str = "v4.0.0/libpod";

/// Talks to a `podman system service` endpoint
pub struct PodmanRuntime {
    client: Client,
    base_url: Url,
}

impl PodmanRuntime {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, RuntimeError> {
        let base_url = Url::parse(base_url)?;
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base_url })
    }

    fn endpoint(&self, tail: &str) -> Result<Url, RuntimeError> {
        Ok(self.base_url.join(&format!("{API_PREFIX}/{tail}"))?)
    }
}

#[async_trait]
impl ContainerRuntime for PodmanRuntime {
    async fn list_containers(&self) -> Result<Vec<ContainerHandle>, RuntimeError> {
        let url = self.endpoint("containers/json")?;
        let response = self
            .client
            .get(url)
            .query(&[("all", "true")])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(RuntimeError::Status {
                operation: "list containers",
                status: response.status(),
            });
        }
        let listed: Vec<ListedContainer> = response.json().await?;
        Ok(listed.into_iter().map(ContainerHandle::from).collect())
    }

    async fn kill_container(&self, name: &str) -> Result<(), RuntimeError> {
        let url = self.endpoint(&format!("containers/{name}/kill"))?;
        let response = self.client.post(url).send().await?;
        if !response.status().is_success() {
            return Err(RuntimeError::Status {
                operation: "kill container",
                status: response.status(),
            });
        }
        Ok(())
    }

    async fn remove_container(&self, name: &str) -> Result<(), RuntimeError> {
        let url = self.endpoint(&format!("containers/{name}"))?;
        let response = self
            .client
            .delete(url)
            .query(&[("v", "true")])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(RuntimeError::Status {
                operation: "remove container",
                status: response.status(),
            });
        }
        Ok(())
    }

    async fn resolve_image(&self, reference: &str) -> Result<String, RuntimeError> {
        let url = self.endpoint(&format!("images/{reference}/json"))?;
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(RuntimeError::Status {
                operation: "inspect image",
                status: response.status(),
            });
        }
        let inspected: InspectedImage = response.json().await?;
        Ok(inspected.id)
    }

    async fn storage_root(&self) -> Result<PathBuf, RuntimeError> {
        let url = self.endpoint("info")?;
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(RuntimeError::Status {
                operation: "runtime info",
                status: response.status(),
            });
        }
        let info: RuntimeInfo = response.json().await?;
        Ok(PathBuf::from(info.store.graph_root))
    }
}

#[derive(Debug, Deserialize)]
struct ListedContainer {
    #[serde(rename = "Id")]
    id: String,
    #[serde(rename = "Names", default)]
    names: Vec<String>,
    #[serde(rename = "State", default)]
    state: String,
    #[serde(rename = "ImageID", default)]
    image_id: String,
    #[serde(rename = "Exited", default)]
    exited: bool,
    #[serde(rename = "ExitedAt", default)]
    exited_at: i64,
    #[serde(rename = "Ports", default)]
    ports: Vec<ListedPort>,
}

#[derive(Debug, Deserialize)]
struct ListedPort {
    #[serde(default)]
    host_port: u16,
}

#[derive(Debug, Deserialize)]
struct InspectedImage {
    #[serde(rename = "Id")]
    id: String,
}

#[derive(Debug, Deserialize)]
struct RuntimeInfo {
    store: StoreInfo,
}

#[derive(Debug, Deserialize)]
struct StoreInfo {
    #[serde(rename = "graphRoot")]
    graph_root: String,
}

impl From<ListedContainer> for ContainerHandle {
    fn from(listed: ListedContainer) -> Self {
        // podman reports ExitedAt as 0 on containers that never exited
        let exited_at = if listed.exited && listed.exited_at > 0 {
            DateTime::<Utc>::from_timestamp(listed.exited_at, 0)
        } else {
            None
        };
        let host_port = listed
            .ports
            .iter()
            .map(|port| port.host_port)
            .find(|&port| port != 0);
        ContainerHandle {
            id: listed.id,
            name: listed.names.into_iter().next().unwrap_or_default(),
            status: RunStatus::from_state(&listed.state),
            image_id: listed.image_id,
            exited_at,
            host_port,
        }
    }
}
