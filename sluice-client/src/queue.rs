//! Queue service operations

use crate::error::{ClientError, Result};
use crate::{Service, ServiceClient};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

/// Most messages the queue service hands out per receive
pub const MAX_RECEIVE_BATCH: usize = 10;

/// Most entries accepted by one `SendMessageBatch`
pub const MAX_SEND_BATCH: usize = 10;

/// Most queue URLs returned per `ListQueues` page
pub const MAX_LIST_PAGE: usize = 1000;

/// Receive count after which a message moves to the dead-letter queue
pub const DEFAULT_MAX_RECEIVE_COUNT: u32 = 5;

/// A message received from a queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueMessage {
    #[serde(rename = "MessageId")]
    pub message_id: String,

    /// Token required to delete this message
    #[serde(rename = "ReceiptHandle")]
    pub receipt_handle: String,

    #[serde(rename = "Body", default)]
    pub body: String,

    #[serde(rename = "MD5OfBody", default)]
    pub md5_of_body: Option<String>,

    #[serde(rename = "Attributes", default)]
    pub attributes: HashMap<String, String>,
}

/// Acknowledgement for a sent message
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SentMessage {
    #[serde(rename = "MessageId")]
    pub message_id: String,

    #[serde(rename = "MD5OfMessageBody", default)]
    pub md5_of_body: Option<String>,

    /// Only set for FIFO queues
    #[serde(rename = "SequenceNumber", default)]
    pub sequence_number: Option<String>,
}

/// Per-entry outcome of a batch send
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSendResult {
    /// Message ids of accepted entries, in submission order
    pub successful: Vec<String>,
    /// `(body, reason)` for every rejected entry
    pub failed: Vec<(String, String)>,
}

/// Options for [`ServiceClient::create_queue`]
#[derive(Debug, Clone, Default)]
pub struct CreateQueueOptions {
    /// Create a FIFO queue; the name must end in `.fifo`
    pub fifo: bool,
    /// ARN of the queue that receives messages after repeated failures
    pub dead_letter_arn: Option<String>,
    /// Receives before a message is moved to the dead-letter queue
    pub max_receive_count: Option<u32>,
    /// Additional raw queue attributes
    pub attributes: HashMap<String, String>,
}

impl CreateQueueOptions {
    pub fn fifo() -> Self {
        Self {
            fifo: true,
            ..Self::default()
        }
    }

    pub fn with_dead_letter(mut self, arn: impl Into<String>) -> Self {
        self.dead_letter_arn = Some(arn.into());
        self
    }

    /// Builds the attribute map sent with `CreateQueue`
    pub fn to_attributes(&self, queue_name: &str) -> Result<HashMap<String, String>> {
        if self.fifo != queue_name.ends_with(".fifo") {
            return Err(ClientError::InvalidRequest(format!(
                "FIFO queue names must end in '.fifo' and only FIFO queues may use that suffix: {}",
                queue_name
            )));
        }

        let mut attributes = self.attributes.clone();

        if self.fifo {
            attributes.insert("FifoQueue".to_string(), "true".to_string());
        }

        if let Some(arn) = &self.dead_letter_arn {
            let policy = serde_json::json!({
                "deadLetterTargetArn": arn,
                "maxReceiveCount": self.max_receive_count.unwrap_or(DEFAULT_MAX_RECEIVE_COUNT),
            });
            attributes.insert("RedrivePolicy".to_string(), policy.to_string());
        }

        Ok(attributes)
    }
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct CreateQueueRequest<'a> {
    queue_name: &'a str,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    attributes: HashMap<String, String>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct QueueNameRequest<'a> {
    queue_name: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct QueueUrlRequest<'a> {
    queue_url: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct QueueUrlResponse {
    queue_url: String,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct GetQueueAttributesRequest<'a> {
    queue_url: &'a str,
    attribute_names: &'a [&'a str],
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetQueueAttributesResponse {
    #[serde(default)]
    attributes: HashMap<String, String>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct SetQueueAttributesRequest<'a> {
    queue_url: &'a str,
    attributes: &'a HashMap<String, String>,
}

#[derive(Serialize)]
struct AddPermissionRequest<'a> {
    #[serde(rename = "QueueUrl")]
    queue_url: &'a str,
    #[serde(rename = "Label")]
    label: &'a str,
    #[serde(rename = "AWSAccountIds")]
    account_ids: &'a [String],
    #[serde(rename = "Actions")]
    actions: &'a [String],
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ListQueuesRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    queue_name_prefix: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    next_token: Option<&'a str>,
    max_results: usize,
}

/// One page of queue URLs
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct QueueListPage {
    #[serde(default)]
    pub queue_urls: Vec<String>,
    #[serde(default)]
    pub next_token: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct SendMessageRequest<'a> {
    queue_url: &'a str,
    message_body: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message_group_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message_deduplication_id: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct SendMessageBatchRequest<'a> {
    queue_url: &'a str,
    entries: Vec<BatchEntry<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct BatchEntry<'a> {
    id: String,
    message_body: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message_group_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message_deduplication_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SendMessageBatchResponse {
    #[serde(default)]
    successful: Vec<BatchSuccess>,
    #[serde(default)]
    failed: Vec<BatchFailure>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct BatchSuccess {
    id: String,
    message_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct BatchFailure {
    id: String,
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ReceiveMessageRequest<'a> {
    queue_url: &'a str,
    max_number_of_messages: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    wait_time_seconds: Option<u32>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ReceiveMessageResponse {
    #[serde(default)]
    messages: Vec<QueueMessage>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct DeleteMessageRequest<'a> {
    queue_url: &'a str,
    receipt_handle: &'a str,
}

impl ServiceClient {
    // =============================================================================
    // Queue Management
    // =============================================================================

    /// Create a queue, returning its URL
    pub fn create_queue(&self, name: &str, options: &CreateQueueOptions) -> Result<String> {
        let attributes = options.to_attributes(name)?;
        let response: QueueUrlResponse = self.call(
            Service::Queue,
            "CreateQueue",
            &CreateQueueRequest {
                queue_name: name,
                attributes,
            },
        )?;

        Ok(response.queue_url)
    }

    /// Look up the URL of a queue by name
    pub fn get_queue_url(&self, name: &str) -> Result<String> {
        let response: QueueUrlResponse =
            self.call(Service::Queue, "GetQueueUrl", &QueueNameRequest { queue_name: name })?;

        Ok(response.queue_url)
    }

    /// Fetch selected attributes of a queue (e.g. `QueueArn`)
    pub fn get_queue_attributes(
        &self,
        queue_url: &str,
        names: &[&str],
    ) -> Result<HashMap<String, String>> {
        let response: GetQueueAttributesResponse = self.call(
            Service::Queue,
            "GetQueueAttributes",
            &GetQueueAttributesRequest {
                queue_url,
                attribute_names: names,
            },
        )?;

        Ok(response.attributes)
    }

    /// ARN of a queue, needed to use it as a dead-letter target
    pub fn get_queue_arn(&self, queue_url: &str) -> Result<String> {
        self.get_queue_attributes(queue_url, &["QueueArn"])?
            .remove("QueueArn")
            .ok_or_else(|| ClientError::ParseError("QueueArn missing from attributes".to_string()))
    }

    /// List one page of queue URLs
    ///
    /// # Arguments
    /// * `prefix` - Only return queues whose name starts with this
    /// * `next_token` - Token from the previous page
    /// * `max_results` - Page size, clamped to 1..=1000
    pub fn list_queues(
        &self,
        prefix: Option<&str>,
        next_token: Option<&str>,
        max_results: usize,
    ) -> Result<QueueListPage> {
        self.call(
            Service::Queue,
            "ListQueues",
            &ListQueuesRequest {
                queue_name_prefix: prefix,
                next_token,
                max_results: max_results.clamp(1, MAX_LIST_PAGE),
            },
        )
    }

    /// Delete a queue and every message in it
    pub fn delete_queue(&self, queue_url: &str) -> Result<()> {
        self.call_empty(Service::Queue, "DeleteQueue", &QueueUrlRequest { queue_url })
    }

    /// Overwrite queue attributes such as `DelaySeconds` or `MaximumMessageSize`
    pub fn set_queue_attributes(
        &self,
        queue_url: &str,
        attributes: &HashMap<String, String>,
    ) -> Result<()> {
        if attributes.is_empty() {
            return Err(ClientError::InvalidRequest(
                "at least one attribute is required".to_string(),
            ));
        }

        self.call_empty(
            Service::Queue,
            "SetQueueAttributes",
            &SetQueueAttributesRequest {
                queue_url,
                attributes,
            },
        )
    }

    /// Grant accounts access to queue actions (`*` allows every account or action)
    pub fn add_permission(
        &self,
        queue_url: &str,
        label: &str,
        account_ids: &[String],
        actions: &[String],
    ) -> Result<()> {
        if label.is_empty() || account_ids.is_empty() || actions.is_empty() {
            return Err(ClientError::InvalidRequest(
                "a label, at least one account id and at least one action are required"
                    .to_string(),
            ));
        }

        self.call_empty(
            Service::Queue,
            "AddPermission",
            &AddPermissionRequest {
                queue_url,
                label,
                account_ids,
                actions,
            },
        )
    }

    // =============================================================================
    // Messages
    // =============================================================================

    /// Send a single message
    ///
    /// A `group_id` is required for FIFO queues; each FIFO message gets a
    /// fresh deduplication id.
    pub fn send_message(
        &self,
        queue_url: &str,
        body: &str,
        group_id: Option<&str>,
    ) -> Result<SentMessage> {
        self.call(
            Service::Queue,
            "SendMessage",
            &SendMessageRequest {
                queue_url,
                message_body: body,
                message_group_id: group_id,
                message_deduplication_id: group_id.map(|_| Uuid::new_v4().to_string()),
            },
        )
    }

    /// Send many messages, ten per request
    pub fn send_message_batch(
        &self,
        queue_url: &str,
        bodies: &[String],
        group_id: Option<&str>,
    ) -> Result<BatchSendResult> {
        let mut result = BatchSendResult::default();

        for chunk in bodies.chunks(MAX_SEND_BATCH) {
            let entries: Vec<BatchEntry<'_>> = chunk
                .iter()
                .map(|body| BatchEntry {
                    id: Uuid::new_v4().to_string(),
                    message_body: body,
                    message_group_id: group_id,
                    message_deduplication_id: group_id.map(|_| Uuid::new_v4().to_string()),
                })
                .collect();

            let bodies_by_id: HashMap<String, &str> = entries
                .iter()
                .map(|entry| (entry.id.clone(), entry.message_body))
                .collect();
            let order: Vec<String> = entries.iter().map(|entry| entry.id.clone()).collect();

            let response: SendMessageBatchResponse = self.call(
                Service::Queue,
                "SendMessageBatch",
                &SendMessageBatchRequest { queue_url, entries },
            )?;

            let mut accepted: HashMap<String, String> = response
                .successful
                .into_iter()
                .map(|ok| (ok.id, ok.message_id))
                .collect();
            result
                .successful
                .extend(order.iter().filter_map(|id| accepted.remove(id)));

            for failure in response.failed {
                let body = bodies_by_id
                    .get(&failure.id)
                    .copied()
                    .unwrap_or_default()
                    .to_string();
                let reason = match failure.message {
                    Some(message) => format!("{}: {}", failure.code, message),
                    None => failure.code,
                };
                result.failed.push((body, reason));
            }
        }

        debug!(
            "Batch send to {}: {} accepted, {} rejected",
            queue_url,
            result.successful.len(),
            result.failed.len()
        );

        Ok(result)
    }

    /// Receive up to `max` messages (clamped to 1..=10)
    ///
    /// `wait_seconds` enables long polling; an empty result means the queue
    /// had nothing visible within that time.
    pub fn receive_messages(
        &self,
        queue_url: &str,
        max: usize,
        wait_seconds: Option<u32>,
    ) -> Result<Vec<QueueMessage>> {
        let response: ReceiveMessageResponse = self.call(
            Service::Queue,
            "ReceiveMessage",
            &ReceiveMessageRequest {
                queue_url,
                max_number_of_messages: max.clamp(1, MAX_RECEIVE_BATCH),
                wait_time_seconds: wait_seconds,
            },
        )?;

        Ok(response.messages)
    }

    /// Delete a received message using its receipt handle
    pub fn delete_message(&self, queue_url: &str, receipt_handle: &str) -> Result<()> {
        self.call_empty(
            Service::Queue,
            "DeleteMessage",
            &DeleteMessageRequest {
                queue_url,
                receipt_handle,
            },
        )
    }
}
