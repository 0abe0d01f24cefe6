// src/client.rs
use crate::management_api::{AddUrlRequest, UrlIdRequest};
use crate::store::{Selection, UrlListing, UrlRecord};
use anyhow::{Context, Result};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;

/// Client for a running redirector's management API
pub struct ManagementClient {
    client: Client,
    base_url: String,
}

impl ManagementClient {
    /// Create a new client pointing to the given server
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Get all URLs with their selection flag
    pub async fn list_urls(&self) -> Result<Vec<UrlListing>> {
        let url = format!("{}/urls", self.base_url);
        let response = self.client.get(&url).send().await?;
        decode(response, "list URLs").await
    }

    /// Store a new URL
    pub async fn add_url(&self, url: &str, name: &str) -> Result<UrlRecord> {
        let endpoint = format!("{}/add-url", self.base_url);
        let request = AddUrlRequest {
            url: url.to_string(),
            name: name.to_string(),
        };

        let response = self.client.post(&endpoint).json(&request).send().await?;
        decode(response, "add URL").await
    }

    /// Delete a URL by id
    pub async fn delete_url(&self, id: i64) -> Result<UrlRecord> {
        let url = format!("{}/delete-url", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&UrlIdRequest { id })
            .send()
            .await?;
        decode(response, "delete URL").await
    }

    /// Make a URL the forwarding target
    pub async fn select_url(&self, id: i64) -> Result<Selection> {
        let url = format!("{}/select-url", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&UrlIdRequest { id })
            .send()
            .await?;
        decode(response, "select URL").await
    }

    /// Get the current forwarding target, if any
    pub async fn selected_url(&self) -> Result<Option<UrlRecord>> {
        let url = format!("{}/selected-url", self.base_url);
        let response = self.client.get(&url).send().await?;
        decode(response, "get selected URL").await
    }
}

async fn decode<T: DeserializeOwned>(response: Response, action: &str) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(anyhow::anyhow!("Failed to {} ({}): {}", action, status, message));
    }

    response
        .json()
        .await
        .with_context(|| format!("Failed to {}: unexpected response body", action))
}
