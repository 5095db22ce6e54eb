//! Part descriptions over HTTP

use std::time::Duration;

use anatomyhero_core::description::{description_from_summary, summary_url};
use anatomyhero_core::{Description, DescriptionCatalog, DescriptionError, ViewerConfig};
use anyhow::{Context, Result};
use tracing::{debug, warn};

pub struct Describer {
    client: reqwest::Client,
    catalog: DescriptionCatalog,
    base_url: String,
}

impl Describer {
    pub fn new(config: &ViewerConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .user_agent(concat!("anatomyhero/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        let catalog = if config.descriptions.use_local_catalog {
            DescriptionCatalog::builtin()
        } else {
            DescriptionCatalog::empty()
        };

        Ok(Self {
            client,
            catalog,
            base_url: config.descriptions.wikipedia_summary_url.clone(),
        })
    }

    /// Never fails: anything that goes wrong yields the fallback text
    pub async fn describe(&self, name: &str) -> Description {
        if let Some(local) = self.catalog.lookup(name) {
            debug!(name = %name, "Description from local catalogue");
            return local;
        }
        match self.fetch(name).await {
            Ok(description) => description,
            Err(e) => {
                warn!(name = %name, error = %e, "Description lookup failed");
                Description::fallback(name)
            }
        }
    }

    async fn fetch(&self, name: &str) -> Result<Description, DescriptionError> {
        let url = summary_url(&self.base_url, name);
        debug!(url = %url, "Fetching summary");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| DescriptionError::Transport(e.to_string()))?;
        if !response.status().is_success() {
            return Err(DescriptionError::Status(response.status().as_u16()));
        }
        let body = response
            .text()
            .await
            .map_err(|e| DescriptionError::Transport(e.to_string()))?;
        description_from_summary(&body)
    }
}
