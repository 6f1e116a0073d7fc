use crate::error::{Result, RuntimeError};
use crate::probes::types::{ProbeExecutorConfig, ProbeOutcome};
use crate::traits::{Notifier, ProbeStore};
use reqwest::header::HeaderMap;
use reqwest::{Client, Method};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, warn};
use vigil_core::{HttpMethod, NewProbeResult, ProbeDefinition};

/// Performs one outbound HTTP check per call, records it, and alerts on
/// any status other than 200
pub struct ProbeExecutor {
    client: Client,
    store: Arc<dyn ProbeStore>,
    notifier: Arc<dyn Notifier>,
}

impl ProbeExecutor {
    pub fn new(
        config: ProbeExecutorConfig,
        store: Arc<dyn ProbeStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent)
            .build()
            .map_err(|e| {
                RuntimeError::invalid_config(
                    format!("failed to build probe HTTP client: {}", e),
                    "Check the user agent string and the TLS configuration of the host",
                )
            })?;

        Ok(Self {
            client,
            store,
            notifier,
        })
    }

    /// Execute `definition` once
    pub async fn execute(&self, definition: &ProbeDefinition) -> ProbeOutcome {
        let (status_code, headers, body) = match self.round_trip(definition).await {
            Ok(response) => response,
            Err(e) => {
                warn!(
                    probe_id = definition.id,
                    url = %definition.url,
                    error = %e,
                    "Probe request failed"
                );
                return ProbeOutcome::RequestFailed(e.to_string());
            }
        };

        let result = NewProbeResult {
            probe_id: definition.id,
            headers,
            body: body.clone(),
            status_code,
        };
        let result_id = match self.store.persist_probe_result(result).await {
            Ok(record) => Some(record.id),
            Err(e) => {
                error!(
                    probe_id = definition.id,
                    status_code,
                    error = %e,
                    "Failed to persist probe result"
                );
                None
            }
        };

        if status_code == 200 {
            debug!(probe_id = definition.id, status_code, "Probe succeeded");
            return ProbeOutcome::Completed {
                status_code,
                result_id,
                notification: None,
            };
        }

        warn!(
            probe_id = definition.id,
            url = %definition.url,
            status_code,
            "Probe returned non-success status"
        );

        let subject = definition.describe();
        let message = format!(
            "request id : {} | status code : {} | response body : {}",
            result_id.map_or_else(|| "unsaved".to_string(), |id| id.to_string()),
            status_code,
            body
        );
        let report = self.notifier.send(&subject, &message).await;

        ProbeOutcome::Completed {
            status_code,
            result_id,
            notification: Some(report),
        }
    }

    async fn round_trip(
        &self,
        definition: &ProbeDefinition,
    ) -> reqwest::Result<(u16, BTreeMap<String, Vec<String>>, String)> {
        let mut request = self
            .client
            .request(to_reqwest_method(definition.method), &definition.url);

        for (name, value) in &definition.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if has_body(&definition.body) {
            request = request.json(&definition.body);
        }

        let response = request.send().await?;
        let status_code = response.status().as_u16();
        let headers = collect_headers(response.headers());
        let body = response.text().await?;

        Ok((status_code, headers, body))
    }
}

fn to_reqwest_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Delete => Method::DELETE,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Head => Method::HEAD,
        HttpMethod::Options => Method::OPTIONS,
    }
}

/// Null and `{}` mean "no body"
fn has_body(body: &serde_json::Value) -> bool {
    match body {
        serde_json::Value::Null => false,
        serde_json::Value::Object(map) => !map.is_empty(),
        _ => true,
    }
}

fn collect_headers(headers: &HeaderMap) -> BTreeMap<String, Vec<String>> {
    let mut collected: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in headers {
        let value = match value.to_str() {
            Ok(v) => v.to_string(),
            Err(_) => String::from_utf8_lossy(value.as_bytes()).into_owned(),
        };
        collected.entry(name.as_str().to_string()).or_default().push(value);
    }
    collected
}
