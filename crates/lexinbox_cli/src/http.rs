//! HTTP adapters for the external collaborators.
//!
//! # Responsibility
//! - Probe service reachability before a run.
//! - Call the enrichment endpoint and decode its reply.
//!
//! # Invariants
//! - Every request is bounded by the configured timeout.
//! - Transport problems surface as per-item `EnrichError::Transport`.

use lexinbox_core::{
    parse_enrichment_response, EnrichError, EnrichedCard, Enricher, EnrichmentRequest, Precheck,
};
use reqwest::blocking::Client;
use std::time::Duration;

fn client(timeout: Duration) -> reqwest::Result<Client> {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout)
        .build()
}

/// Treats any HTTP response from `url` as "reachable".
pub struct HttpPrecheck {
    name: String,
    url: String,
    client: Client,
}

impl HttpPrecheck {
    pub fn new(url: impl Into<String>, timeout: Duration) -> reqwest::Result<Self> {
        let url = url.into();
        Ok(Self {
            name: format!("http:{url}"),
            url,
            client: client(timeout)?,
        })
    }
}

impl Precheck for HttpPrecheck {
    fn name(&self) -> &str {
        &self.name
    }

    fn check(&self) -> Result<(), String> {
        self.client
            .get(&self.url)
            .send()
            .map(|_| ())
            .map_err(|err| err.to_string())
    }
}

/// POSTs `{lemma, display_text}` and expects `{front, back, example, gloss}`.
pub struct HttpEnricher {
    url: String,
    client: Client,
}

impl HttpEnricher {
    pub fn new(url: impl Into<String>, timeout: Duration) -> reqwest::Result<Self> {
        Ok(Self {
            url: url.into(),
            client: client(timeout)?,
        })
    }
}

impl Enricher for HttpEnricher {
    fn enrich(&self, request: &EnrichmentRequest) -> Result<EnrichedCard, EnrichError> {
        let response = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .map_err(|err| EnrichError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(EnrichError::Transport(format!("endpoint answered {status}")));
        }
        let body = response
            .text()
            .map_err(|err| EnrichError::Transport(err.to_string()))?;
        parse_enrichment_response(&body)
    }
}

/// Stand-in used when no endpoint is configured; runs are forced to dry-run.
pub struct DisabledEnricher;

impl Enricher for DisabledEnricher {
    fn enrich(&self, _: &EnrichmentRequest) -> Result<EnrichedCard, EnrichError> {
        Err(EnrichError::Transport(
            "no enrichment endpoint configured".to_string(),
        ))
    }
}
