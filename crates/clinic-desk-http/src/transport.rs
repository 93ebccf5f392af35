//! `Transport` over the clinic records REST service.
//!
//! One resource per collection, json-server style:
//!
//! ```text
//! GET    {base}/{collection}        list
//! POST   {base}/{collection}        create, the service assigns the id
//! PUT    {base}/{collection}/{id}   replace
//! DELETE {base}/{collection}/{id}   delete
//! ```

use std::time::Duration;

use async_trait::async_trait;
use clinic_desk_core::models::EntityId;
use clinic_desk_core::store::{Transport, TransportError, TransportResult};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::Config;

/// Delay before the first list retry; doubles on each further attempt.
const RETRY_BASE_DELAY: Duration = Duration::from_millis(200);
/// Upper bound for a single retry delay.
const RETRY_MAX_DELAY: Duration = Duration::from_secs(30);

/// HTTP client for one service root.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base: Url,
    max_retries: u32,
}

impl HttpTransport {
    /// Create a transport from configuration.
    pub fn from_config(config: &Config) -> TransportResult<Self> {
        Self::new(&config.base_url, config.timeout_secs, config.max_retries)
    }

    /// Create a transport with explicit parameters.
    pub fn new(base_url: &str, timeout_secs: u64, max_retries: u32) -> TransportResult<Self> {
        let base = Url::parse(base_url.trim())
            .map_err(|e| TransportError::Network(format!("Invalid base URL {}: {}", base_url, e)))?;
        if base.cannot_be_a_base() {
            return Err(TransportError::Network(format!(
                "Invalid base URL {}: cannot hold a path",
                base_url
            )));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| TransportError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base,
            max_retries,
        })
    }

    /// Service root.
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// `{base}/{collection}`
    pub fn collection_url(&self, collection: &str) -> Url {
        self.endpoint(&[collection])
    }

    /// `{base}/{collection}/{id}`, with the id percent-encoded.
    pub fn record_url(&self, collection: &str, id: &EntityId) -> Url {
        self.endpoint(&[collection, &id.normalized()])
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Send a request and map failures. `id` names the record for 404s.
    async fn send(
        &self,
        request: RequestBuilder,
        collection: &str,
        id: Option<&EntityId>,
    ) -> TransportResult<Response> {
        let response = request.send().await.map_err(network_error)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(status_error(status, body, collection, id))
    }

    async fn list_once(&self, collection: &str) -> TransportResult<Vec<Value>> {
        let request = self.client.get(self.collection_url(collection));
        let response = self.send(request, collection, None).await?;
        match read_json(response).await? {
            Value::Array(documents) => Ok(documents),
            other => Err(TransportError::InvalidBody(format!(
                "expected a JSON array for {}, got {}",
                collection,
                kind_of(&other)
            ))),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn list(&self, collection: &str) -> TransportResult<Vec<Value>> {
        let mut attempt = 0;
        loop {
            debug!(collection, attempt, "GET collection");
            match self.list_once(collection).await {
                Err(e) if attempt < self.max_retries && is_retryable(&e) => {
                    let delay = retry_delay(attempt);
                    warn!(collection, attempt, error = %e, ?delay, "Retrying collection fetch");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    async fn create(&self, collection: &str, draft: Value) -> TransportResult<Value> {
        debug!(collection, "POST record");
        let request = self.client.post(self.collection_url(collection)).json(&draft);
        let response = self.send(request, collection, None).await?;
        read_json(response).await
    }

    async fn replace(&self, collection: &str, id: &EntityId, record: Value) -> TransportResult<Value> {
        debug!(collection, id = %id, "PUT record");
        let request = self.client.put(self.record_url(collection, id)).json(&record);
        let response = self.send(request, collection, Some(id)).await?;

        // Some services answer 204 with no body; the record sent is then authoritative.
        let text = response.text().await.map_err(network_error)?;
        if text.trim().is_empty() {
            return Ok(record);
        }
        serde_json::from_str(&text).map_err(|e| TransportError::InvalidBody(e.to_string()))
    }

    async fn delete(&self, collection: &str, id: &EntityId) -> TransportResult<()> {
        debug!(collection, id = %id, "DELETE record");
        let request = self.client.delete(self.record_url(collection, id));
        self.send(request, collection, Some(id)).await?;
        Ok(())
    }
}

async fn read_json(response: Response) -> TransportResult<Value> {
    let text = response.text().await.map_err(network_error)?;
    serde_json::from_str(&text).map_err(|e| TransportError::InvalidBody(e.to_string()))
}

fn network_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Network("Request timed out".to_string())
    } else if e.is_connect() {
        TransportError::Network(format!("Connection failed: {}", e))
    } else {
        TransportError::Network(format!("Request failed: {}", e))
    }
}

fn status_error(status: StatusCode, body: String, collection: &str, id: Option<&EntityId>) -> TransportError {
    match (status, id) {
        (StatusCode::NOT_FOUND, Some(id)) => TransportError::NotFound {
            collection: collection.to_string(),
            id: id.normalized(),
        },
        _ => {
            let body = body.trim();
            let message = if body.is_empty() {
                status.canonical_reason().unwrap_or("Unknown error").to_string()
            } else {
                body.to_string()
            };
            TransportError::Status {
                code: status.as_u16(),
                message,
            }
        }
    }
}

/// Backoff before retry number `attempt + 1`, capped at `RETRY_MAX_DELAY`.
fn retry_delay(attempt: u32) -> Duration {
    RETRY_BASE_DELAY
        .saturating_mul(2u32.saturating_pow(attempt))
        .min(RETRY_MAX_DELAY)
}

/// Network failures and server errors; client errors are final.
fn is_retryable(error: &TransportError) -> bool {
    match error {
        TransportError::Network(_) => true,
        TransportError::Status { code, .. } => *code >= 500,
        _ => false,
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport(base: &str) -> HttpTransport {
        HttpTransport::new(base, 5, 0).unwrap()
    }

    #[test]
    fn test_urls() {
        let plain = transport("http://localhost:3000");
        assert_eq!(plain.collection_url("patients").as_str(), "http://localhost:3000/patients");
        assert_eq!(
            plain.record_url("rendezvous", &EntityId::Int(7)).as_str(),
            "http://localhost:3000/rendezvous/7"
        );

        let prefixed = transport("https://clinic.example.org/api/");
        assert_eq!(
            prefixed.collection_url("consultations").as_str(),
            "https://clinic.example.org/api/consultations"
        );
        assert_eq!(
            prefixed.record_url("patients", &EntityId::from("a b/c")).as_str(),
            "https://clinic.example.org/api/patients/a%20b%2Fc"
        );
    }

    #[test]
    fn test_invalid_base_rejected() {
        assert!(HttpTransport::new("not a url", 5, 0).is_err());
        assert!(HttpTransport::new("mailto:desk@example.org", 5, 0).is_err());
    }

    #[test]
    fn test_status_mapping() {
        let id = EntityId::Int(4);

        assert_eq!(
            status_error(StatusCode::NOT_FOUND, String::new(), "patients", Some(&id)),
            TransportError::NotFound {
                collection: "patients".into(),
                id: "4".into()
            }
        );
        assert_eq!(
            status_error(StatusCode::NOT_FOUND, String::new(), "patients", None),
            TransportError::Status {
                code: 404,
                message: "Not Found".into()
            }
        );
        assert_eq!(
            status_error(StatusCode::BAD_REQUEST, " bad date \n".into(), "rendezvous", None),
            TransportError::Status {
                code: 400,
                message: "bad date".into()
            }
        );
    }

    #[test]
    fn test_retryable_errors() {
        assert!(is_retryable(&TransportError::Network("reset".into())));
        assert!(is_retryable(&TransportError::Status {
            code: 503,
            message: String::new()
        }));
        assert!(!is_retryable(&TransportError::Status {
            code: 422,
            message: String::new()
        }));
        assert!(!is_retryable(&TransportError::InvalidBody("eof".into())));
    }

    #[test]
    fn test_retry_delay_doubles_then_caps() {
        assert_eq!(retry_delay(0), Duration::from_millis(200));
        assert_eq!(retry_delay(1), Duration::from_millis(400));
        assert_eq!(retry_delay(3), Duration::from_millis(1600));
        assert_eq!(retry_delay(8), RETRY_MAX_DELAY);
        assert_eq!(retry_delay(32), RETRY_MAX_DELAY);
        assert_eq!(retry_delay(u32::MAX), RETRY_MAX_DELAY);
    }
}
