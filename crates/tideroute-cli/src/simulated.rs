//! In-process provider client driven by a `simulated` endpoint definition

use async_trait::async_trait;
use rand::Rng;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tideroute_config_file::{EndpointConfig, SimulatedEndpoint};
use tideroute_core::{ProviderClient, ProviderError, ProviderResponse, RequestOptions};

pub struct SimulatedClient {
    endpoint: SimulatedEndpoint,
}

impl SimulatedClient {
    pub fn new(endpoint: SimulatedEndpoint) -> Self {
        Self { endpoint }
    }

    /// Latency for one call and whether it fails
    fn roll(&self) -> (Duration, bool) {
        let mut rng = rand::rng();
        let jitter = if self.endpoint.jitter_ms > 0 {
            rng.random_range(0..=self.endpoint.jitter_ms)
        } else {
            0
        };
        let fails = rng.random::<f64>() < self.endpoint.failure_rate;
        (Duration::from_millis(self.endpoint.latency_ms + jitter), fails)
    }
}

#[async_trait]
impl ProviderClient for SimulatedClient {
    async fn invoke(
        &self,
        prompt: &str,
        _options: &RequestOptions,
        _timeout: Duration,
    ) -> Result<ProviderResponse, ProviderError> {
        let (latency, fails) = self.roll();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        if fails {
            return Err(self.endpoint.failure());
        }

        let content = self
            .endpoint
            .content
            .clone()
            .unwrap_or_else(|| format!("echo: {}", prompt));
        let response = ProviderResponse::new(content);
        Ok(match self.endpoint.tokens_used {
            Some(tokens) => response.with_tokens(tokens),
            None => response,
        })
    }
}

/// One client per registered endpoint handle
pub fn clients_for(
    endpoints: &BTreeMap<String, EndpointConfig>,
) -> HashMap<String, Arc<dyn ProviderClient>> {
    endpoints
        .iter()
        .map(|(handle, endpoint)| {
            let client: Arc<dyn ProviderClient> = match endpoint {
                EndpointConfig::Simulated(simulated) => {
                    Arc::new(SimulatedClient::new(simulated.clone()))
                }
            };
            (handle.clone(), client)
        })
        .collect()
}
