//! AWS SQS queue service backed by the AWS SDK.
//!
//! Credentials and region come from the ambient AWS configuration chain
//! (environment, shared profile, container or instance metadata). The chain is
//! resolved once when the service is built so that a missing or broken
//! credential setup fails the run before any scenario starts.
//!
//! ## Example
//!
//! ```no_run
//! use queue_conformance_core::providers::{SqsQueueService, SqsSettings};
//! use queue_conformance_core::ReceiveOptions;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let service = SqsQueueService::connect(&SqsSettings::default(), ReceiveOptions::default()).await?;
//! # Ok(())
//! # }
//! ```

use crate::client::{QueueOperation, QueueService, ReceiveOptions};
use crate::error::QueueServiceError;
use crate::message::{
    CorrelationId, OutgoingMessage, ReceiptHandle, ReceivedMessage, CORRELATION_ATTRIBUTE,
};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::provider::ProvideCredentials;
use aws_sdk_sqs::error::DisplayErrorContext;
use aws_sdk_sqs::types::{MessageAttributeValue, MessageSystemAttributeName};
use aws_sdk_sqs::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

#[cfg(test)]
#[path = "sqs_tests.rs"]
mod tests;

/// Connection settings layered on top of the ambient AWS configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SqsSettings {
    /// Region override; the ambient chain is used when absent
    pub region: Option<String>,
    /// Endpoint override, e.g. a LocalStack URL
    pub endpoint_url: Option<String>,
    /// Named shared-config profile
    pub profile: Option<String>,
}

/// AWS SQS queue service
#[derive(Clone)]
pub struct SqsQueueService {
    client: Client,
    receive: ReceiveOptions,
}

impl SqsQueueService {
    /// Load the ambient AWS configuration, resolve credentials, and build a client.
    ///
    /// # Errors
    ///
    /// Returns [`QueueServiceError::Credentials`] when no credential provider is
    /// configured or the provider fails to produce credentials.
    pub async fn connect(
        settings: &SqsSettings,
        receive: ReceiveOptions,
    ) -> Result<Self, QueueServiceError> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &settings.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let Some(endpoint) = &settings.endpoint_url {
            loader = loader.endpoint_url(endpoint.clone());
        }
        if let Some(profile) = &settings.profile {
            loader = loader.profile_name(profile);
        }
        let shared_config = loader.load().await;

        let provider = shared_config
            .credentials_provider()
            .ok_or_else(|| QueueServiceError::Credentials {
                message: "no credential provider configured".to_string(),
            })?;
        provider
            .provide_credentials()
            .await
            .map_err(|e| QueueServiceError::Credentials {
                message: DisplayErrorContext(&e).to_string(),
            })?;

        info!(
            region = ?shared_config.region().map(|r| r.as_ref().to_string()),
            endpoint = ?settings.endpoint_url,
            "Resolved AWS configuration for SQS"
        );

        Ok(Self::from_client(Client::new(&shared_config), receive))
    }

    /// Wrap an already configured SDK client
    pub fn from_client(client: Client, receive: ReceiveOptions) -> Self {
        Self {
            client,
            receive: receive.normalized(),
        }
    }

    fn transport_error<E>(operation: QueueOperation, queue_url: &str, error: E) -> QueueServiceError
    where
        E: std::error::Error,
    {
        QueueServiceError::Transport {
            operation: operation.to_string(),
            queue_url: queue_url.to_string(),
            message: DisplayErrorContext(&error).to_string(),
        }
    }

    /// Convert an SDK message into a delivery, dropping entries without a
    /// receipt handle since they cannot be acknowledged
    fn to_received(message: &aws_sdk_sqs::types::Message) -> Option<ReceivedMessage> {
        let receipt = message.receipt_handle()?;

        let correlation_id = message
            .message_attributes()
            .and_then(|attributes| attributes.get(CORRELATION_ATTRIBUTE))
            .and_then(|value| value.string_value())
            .and_then(|token| token.parse::<CorrelationId>().ok());

        let receive_count = message
            .attributes()
            .and_then(|attributes| {
                attributes.get(&MessageSystemAttributeName::ApproximateReceiveCount)
            })
            .and_then(|count| count.parse().ok())
            .unwrap_or(1);

        Some(ReceivedMessage {
            message_id: message.message_id().unwrap_or_default().to_string(),
            body: message.body().unwrap_or_default().to_string(),
            correlation_id,
            receive_count,
            receipt_handle: ReceiptHandle::new(receipt),
        })
    }
}

impl fmt::Debug for SqsQueueService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqsQueueService")
            .field("receive", &self.receive)
            .field("client", &"<redacted>")
            .finish()
    }
}

#[async_trait]
impl QueueService for SqsQueueService {
    async fn list_queues(&self, name_prefix: &str) -> Result<Vec<String>, QueueServiceError> {
        let output = self
            .client
            .list_queues()
            .queue_name_prefix(name_prefix)
            .send()
            .await
            .map_err(|e| Self::transport_error(QueueOperation::ListQueues, name_prefix, e))?;

        let urls = output.queue_urls().to_vec();
        debug!(prefix = %name_prefix, count = urls.len(), "Listed SQS queues");
        Ok(urls)
    }

    async fn send_message(
        &self,
        queue_url: &str,
        message: &OutgoingMessage,
    ) -> Result<(), QueueServiceError> {
        let attribute = MessageAttributeValue::builder()
            .data_type("String")
            .string_value(message.correlation_id.as_str())
            .build()
            .map_err(|e| QueueServiceError::Internal {
                message: format!("invalid correlation attribute: {}", e),
            })?;

        let output = self
            .client
            .send_message()
            .queue_url(queue_url)
            .message_body(&message.body)
            .message_attributes(CORRELATION_ATTRIBUTE, attribute)
            .send()
            .await
            .map_err(|e| Self::transport_error(QueueOperation::SendMessage, queue_url, e))?;

        debug!(
            queue_url = %queue_url,
            message_id = ?output.message_id(),
            correlation_id = %message.correlation_id,
            "Sent message"
        );
        Ok(())
    }

    async fn receive_messages(
        &self,
        queue_url: &str,
    ) -> Result<Vec<ReceivedMessage>, QueueServiceError> {
        let mut request = self
            .client
            .receive_message()
            .queue_url(queue_url)
            .max_number_of_messages(self.receive.max_messages as i32)
            .message_attribute_names(CORRELATION_ATTRIBUTE)
            .message_system_attribute_names(MessageSystemAttributeName::ApproximateReceiveCount);
        if self.receive.wait_time_secs > 0 {
            request = request.wait_time_seconds(self.receive.wait_time_secs as i32);
        }

        let output = request
            .send()
            .await
            .map_err(|e| Self::transport_error(QueueOperation::ReceiveMessage, queue_url, e))?;

        let messages: Vec<ReceivedMessage> =
            output.messages().iter().filter_map(Self::to_received).collect();
        debug!(queue_url = %queue_url, count = messages.len(), "Received messages");
        Ok(messages)
    }

    async fn delete_message(
        &self,
        queue_url: &str,
        receipt: ReceiptHandle,
    ) -> Result<(), QueueServiceError> {
        self.client
            .delete_message()
            .queue_url(queue_url)
            .receipt_handle(receipt.into_inner())
            .send()
            .await
            .map_err(|e| Self::transport_error(QueueOperation::DeleteMessage, queue_url, e))?;

        debug!(queue_url = %queue_url, "Deleted message");
        Ok(())
    }
}
