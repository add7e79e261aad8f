//! Sluice HTTP Client
//!
//! A small, blocking client for the queue service and the stream service,
//! speaking the JSON protocol both services expose (`POST /` with an
//! `X-Amz-Target` header naming the action).
//!
//! Requests are not signed. The client is meant for local service emulators
//! or for endpoints fronted by a signing proxy.
//!
//! The [`source`] module adapts queue receives, stream shard reads and
//! paginated listings into [`sluice_core::BatchSource`]s so they can be
//! drained with a [`sluice_core::CursorPoller`].
//!
//! # Example
//!
//! ```no_run
//! use sluice_client::ServiceClient;
//! use sluice_client::source::QueueSource;
//! use sluice_core::{ContinueSignal, CursorPoller};
//!
//! fn main() -> anyhow::Result<()> {
//!     let client = ServiceClient::new("http://localhost:4566");
//!     let queue_url = client.get_queue_url("First-Queue")?;
//!
//!     let mut source = QueueSource::new(&client, queue_url);
//!     let outcome = CursorPoller::new(5)?.poll(&mut source, |message| {
//!         println!("{}", message.body);
//!         ContinueSignal::Continue
//!     })?;
//!
//!     println!("{:?}", outcome);
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod queue;
pub mod source;
pub mod stream;

// Re-export commonly used types
pub use error::{ClientError, Result};
pub use queue::{BatchSendResult, CreateQueueOptions, QueueMessage, SentMessage};
pub use stream::{ShardPosition, StreamDescription, StreamRecord};

use reqwest::blocking::{Client, Response};
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

/// Remote service a request is addressed to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    /// Message queue service
    Queue,
    /// Record stream service
    Stream,
}

impl Service {
    /// Prefix of the `X-Amz-Target` header
    pub fn target_prefix(&self) -> &'static str {
        match self {
            Service::Queue => "AmazonSQS",
            Service::Stream => "Kinesis_20131202",
        }
    }

    /// JSON protocol flavour the service expects
    pub fn content_type(&self) -> &'static str {
        match self {
            Service::Queue => "application/x-amz-json-1.0",
            Service::Stream => "application/x-amz-json-1.1",
        }
    }
}

/// Error body shared by both services
#[derive(Debug, serde::Deserialize)]
struct ErrorBody {
    #[serde(rename = "__type")]
    kind: Option<String>,
    #[serde(alias = "Message")]
    message: Option<String>,
}

/// Blocking HTTP client for the queue and stream services
///
/// Operations are grouped by service:
/// - Queue management, sending, receiving and deleting messages (`queue`)
/// - Stream management, shard iterators, reading and writing records (`stream`)
#[derive(Debug, Clone)]
pub struct ServiceClient {
    /// Service endpoint (e.g., "http://localhost:4566")
    endpoint: String,
    /// HTTP client instance
    client: Client,
}

impl ServiceClient {
    /// Create a new service client
    ///
    /// # Arguments
    /// * `endpoint` - Base URL of the service endpoint
    ///
    /// # Example
    /// ```
    /// use sluice_client::ServiceClient;
    ///
    /// let client = ServiceClient::new("http://localhost:4566");
    /// ```
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_client(endpoint, Client::new())
    }

    /// Create a new service client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    ///
    /// # Example
    /// ```
    /// use sluice_client::ServiceClient;
    /// use reqwest::blocking::Client;
    /// use std::time::Duration;
    ///
    /// let http_client = Client::builder()
    ///     .timeout(Duration::from_secs(30))
    ///     .build()
    ///     .unwrap();
    ///
    /// let client = ServiceClient::with_client("http://localhost:4566", http_client);
    /// ```
    pub fn with_client(endpoint: impl Into<String>, client: Client) -> Self {
        let endpoint = endpoint.into();
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Get the service endpoint
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    // =============================================================================
    // Transport
    // =============================================================================

    /// Send one action and deserialize the JSON reply
    fn call<Req, Resp>(&self, service: Service, action: &str, request: &Req) -> Result<Resp>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        let response = self.send(service, action, request)?;
        self.handle_response(action, response)
    }

    /// Send one action whose reply carries nothing of interest
    fn call_empty<Req: Serialize>(&self, service: Service, action: &str, request: &Req) -> Result<()> {
        let response = self.send(service, action, request)?;
        self.handle_empty_response(action, response)
    }

    fn send<Req: Serialize>(&self, service: Service, action: &str, request: &Req) -> Result<Response> {
        let target = format!("{}.{}", service.target_prefix(), action);
        let body = serde_json::to_vec(request)
            .map_err(|e| ClientError::InvalidRequest(format!("Failed to encode {}: {}", action, e)))?;

        debug!("{} -> {}", target, self.endpoint);

        let response = self
            .client
            .post(format!("{}/", self.endpoint))
            .header("X-Amz-Target", target)
            .header(CONTENT_TYPE, service.content_type())
            .body(body)
            .send()?;

        Ok(response)
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Handle a service response and deserialize JSON
    fn handle_response<T: DeserializeOwned>(&self, action: &str, response: Response) -> Result<T> {
        let response = self.check_status(action, response)?;
        let bytes = response.bytes()?;

        // Some emulators answer with an empty body where the service sends `{}`
        let bytes: &[u8] = if bytes.is_empty() { b"{}" } else { &bytes };

        serde_json::from_slice(bytes).map_err(|e| {
            ClientError::ParseError(format!("Failed to parse {} response: {}", action, e))
        })
    }

    /// Handle a service response that returns no content
    fn handle_empty_response(&self, action: &str, response: Response) -> Result<()> {
        self.check_status(action, response).map(|_| ())
    }

    fn check_status(&self, action: &str, response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let error_text = response
            .text()
            .unwrap_or_else(|_| "Unknown error".to_string());
        let error = parse_error(status.as_u16(), &error_text);
        warn!("{} failed: {}", action, error);

        Err(error)
    }
}

/// Builds an `ApiError` from an error reply, keeping only the short code
///
/// `__type` looks like `com.amazonaws.sqs#QueueDoesNotExist`; the part after
/// the last `#` is the code.
fn parse_error(status: u16, body: &str) -> ClientError {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => {
            let code = parsed
                .kind
                .as_deref()
                .map(|kind| kind.rsplit('#').next().unwrap_or(kind).to_string())
                .unwrap_or_else(|| "Unknown".to_string());
            let message = parsed.message.unwrap_or_default();
            ClientError::api_error(status, code, message)
        }
        Err(_) => ClientError::api_error(status, "Unknown", body),
    }
}
