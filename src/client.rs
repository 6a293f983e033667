use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

use crate::auth::{AuthHeaderProvider, Xsuaa};
use crate::errors::{AnsError, Result};
use crate::types::{Event, ServiceKey};

const EVENTS_PATH: &str = "cf/producer/v1/resource-events";

/// ANS acknowledges accepted events with `202 Accepted` and nothing else
const EXPECTED_STATUS: StatusCode = StatusCode::ACCEPTED;

/// Anything that can deliver an event to ANS
///
/// Implemented by [`AnsClient`]; callers can substitute their own
/// implementation in tests.
#[async_trait]
pub trait EventSender: Send + Sync {
    /// Deliver a single event
    async fn send(&self, event: &Event) -> Result<()>;
}

pub(crate) fn build_http_client(timeout: Duration) -> Result<ClientWithMiddleware> {
    let client = Client::builder()
        .timeout(timeout)
        .build()
        .map_err(AnsError::BuildHttpClient)?;

    Ok(ClientBuilder::new(client).build())
}

/// Client for sending resource events to the SAP Alert Notification Service
///
/// # Example
///
/// ```rust,no_run
/// use alert_notification_api::{AnsClient, Event, LogLevel, ServiceKey};
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let key = ServiceKey::from_json(&std::env::var("ANS_SERVICE_KEY")?)?;
///     let client = AnsClient::from_service_key(&key, Duration::from_secs(10))?;
///
///     let event = Event::new("DeploymentFailed")
///         .with_level(LogLevel::Error)
///         .with_subject("Deployment of my-app failed");
///
///     client.send(&event).await?;
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct AnsClient {
    client: ClientWithMiddleware,
    events_url: Url,
    auth: Arc<dyn AuthHeaderProvider>,
}

impl AnsClient {
    /// Create a new ANS client
    ///
    /// # Arguments
    ///
    /// * `base_url` - Base URL of the ANS instance (the `url` of the service key)
    /// * `auth` - Provider of the `Authorization` header
    /// * `timeout` - Request timeout duration
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built or `base_url`
    /// cannot carry a path.
    pub fn new(
        base_url: Url,
        auth: Arc<dyn AuthHeaderProvider>,
        timeout: Duration,
    ) -> Result<Self> {
        Self::with_client(build_http_client(timeout)?, base_url, auth)
    }

    /// Create a new client with a custom reqwest middleware client
    ///
    /// This allows you to add custom middleware (retry, logging, etc.)
    pub fn with_client(
        client: ClientWithMiddleware,
        base_url: Url,
        auth: Arc<dyn AuthHeaderProvider>,
    ) -> Result<Self> {
        Ok(Self {
            client,
            events_url: events_url(&base_url)?,
            auth,
        })
    }

    /// Create a client authenticating through the XSUAA instance named in the service key
    pub fn from_service_key(key: &ServiceKey, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(&key.url).map_err(|e| AnsError::InvalidUrl {
            url: key.url.clone(),
            reason: e.to_string(),
        })?;
        let auth = Xsuaa::from_service_key(key, timeout)?;

        Self::new(base_url, Arc::new(auth), timeout)
    }

    /// Send an event to ANS
    ///
    /// Exactly one request is issued. Only `202 Accepted` counts as success.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The event cannot be serialized
    /// - The auth header provider fails (no request is sent then)
    /// - The HTTP request fails
    /// - ANS returns any status other than 202
    #[instrument(
        name = "AnsClient::send",
        skip_all,
        fields(event_type = event.event_type.as_deref().unwrap_or_default())
    )]
    pub async fn send(&self, event: &Event) -> Result<()> {
        let body = serde_json::to_vec(event).map_err(AnsError::Serialize)?;

        let mut headers = HeaderMap::new();
        self.auth
            .set_auth_header_if_not_present(&mut headers)
            .await
            .map_err(AnsError::Auth)?;
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        debug!(url = %self.events_url, "Sending event to ANS");

        let response = self
            .client
            .post(self.events_url.clone())
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(AnsError::Request)?;

        let status = response.status();

        if status != EXPECTED_STATUS {
            let url = self.events_url.to_string();
            let expected = EXPECTED_STATUS.as_u16();
            let actual = status.as_u16();

            return Err(match response.text().await {
                Ok(body) => AnsError::UnexpectedStatus {
                    url,
                    expected,
                    actual,
                    body,
                },
                Err(source) => AnsError::UnreadableResponseBody {
                    url,
                    expected,
                    actual,
                    source,
                },
            });
        }

        debug!("Event sent successfully");
        Ok(())
    }

    /// Get the URL events are posted to
    pub fn events_url(&self) -> &Url {
        &self.events_url
    }
}

#[async_trait]
impl EventSender for AnsClient {
    async fn send(&self, event: &Event) -> Result<()> {
        AnsClient::send(self, event).await
    }
}

fn events_url(base_url: &Url) -> Result<Url> {
    let mut url = base_url.clone();
    url.path_segments_mut()
        .map_err(|()| AnsError::InvalidUrl {
            url: base_url.to_string(),
            reason: "cannot be a base URL".to_string(),
        })?
        .pop_if_empty()
        .extend(EVENTS_PATH.split('/'));
    Ok(url)
}
