use std::time::Duration;

use dfs_types::Error;
use futures::StreamExt;
use lapin::{
    BasicProperties, Channel, Connection,
    options::{BasicConsumeOptions, BasicPublishOptions, QueueDeclareOptions},
    types::FieldTable,
};
use serde::{Serialize, de::DeserializeOwned};
use uuid::Uuid;

use crate::DEFAULT_TIMEOUT;

/// One RabbitMQ connection shared by every outbound call a service makes.
///
/// Mirrors the Go `RpcClient`: a single AMQP connection, a fresh channel
/// and anonymous exclusive reply queue per call.
pub struct RpcClient {
    connection: Connection,
}

impl RpcClient {
    pub async fn connect(uri: &str) -> Result<Self, Error> {
        Ok(RpcClient {
            connection: crate::connect(uri).await?,
        })
    }

    /// Calls `queue` with the raw bytes of `body` and returns the raw bytes
    /// of the matching reply, or [`Error::RpcTimeout`] after `timeout`.
    pub async fn call_raw_timeout(
        &self,
        queue: &str,
        body: Vec<u8>,
        timeout: Duration,
    ) -> Result<Vec<u8>, Error> {
        tokio::time::timeout(timeout, self.call_raw_inner(queue, body))
            .await
            .map_err(|_| Error::RpcTimeout(timeout))?
    }

    /// [`Self::call_raw_timeout`] with the default 10 second deadline.
    pub async fn call_raw(&self, queue: &str, body: Vec<u8>) -> Result<Vec<u8>, Error> {
        self.call_raw_timeout(queue, body, DEFAULT_TIMEOUT).await
    }

    async fn call_raw_inner(&self, queue: &str, body: Vec<u8>) -> Result<Vec<u8>, Error> {
        let channel = self
            .connection
            .create_channel()
            .await
            .map_err(|e| Error::Transport(format!("failed to open a channel: {e}")))?;

        let reply_queue = declare_reply_queue(&channel).await?;
        let correlation_id = Uuid::new_v4().to_string();

        let mut consumer = channel
            .basic_consume(
                reply_queue.name().as_str(),
                "",
                BasicConsumeOptions {
                    no_ack: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| Error::Transport(format!("failed to register a consumer: {e}")))?;

        channel
            .basic_publish(
                "",
                queue,
                BasicPublishOptions::default(),
                &body,
                BasicProperties::default()
                    .with_content_type("application/octet-stream".into())
                    .with_correlation_id(correlation_id.clone().into())
                    .with_reply_to(reply_queue.name().clone()),
            )
            .await
            .map_err(|e| Error::Transport(format!("failed to publish a message: {e}")))?
            .await
            .map_err(|e| Error::Transport(format!("publisher confirm failed: {e}")))?;

        // Out-of-order replies to earlier, already-timed-out calls can still
        // land on this exclusive queue's predecessor if correlation ids were
        // ever reused; filtering defends against that even though each call
        // gets its own queue.
        while let Some(delivery) = consumer.next().await {
            let delivery =
                delivery.map_err(|e| Error::Transport(format!("consumer error: {e}")))?;
            if delivery.properties.correlation_id().as_ref().map(|c| c.as_str()) == Some(correlation_id.as_str()) {
                return Ok(delivery.data);
            }
        }

        Err(Error::Transport(format!(
            "reply queue for '{queue}' closed before a reply arrived"
        )))
    }

    /// Calls `queue` with `request` serialized as JSON and deserializes the
    /// reply as `Resp`, under the default timeout.
    pub async fn call_json<Req: Serialize, Resp: DeserializeOwned>(
        &self,
        queue: &str,
        request: &Req,
    ) -> Result<Resp, Error> {
        let body = serde_json::to_vec(request)
            .map_err(|e| Error::Transport(format!("failed to serialize request: {e}")))?;
        let reply = self.call_raw_timeout(queue, body, DEFAULT_TIMEOUT).await?;
        serde_json::from_slice(&reply)
            .map_err(|e| Error::Transport(format!("failed to deserialize reply: {e}")))
    }

    /// Publishes a fire-and-forget message with no expected reply, as used
    /// for the node lifecycle `Add`/`Delete` messages on
    /// `rpc_gateway_node_messages`.
    pub async fn publish_fire_and_forget(&self, queue: &str, body: Vec<u8>) -> Result<(), Error> {
        let channel = self
            .connection
            .create_channel()
            .await
            .map_err(|e| Error::Transport(format!("failed to open a channel: {e}")))?;

        declare_queue(&channel, queue).await?;

        channel
            .basic_publish(
                "",
                queue,
                BasicPublishOptions::default(),
                &body,
                BasicProperties::default().with_content_type("application/json".into()),
            )
            .await
            .map_err(|e| Error::Transport(format!("failed to publish a message: {e}")))?
            .await
            .map_err(|e| Error::Transport(format!("publisher confirm failed: {e}")))?;

        Ok(())
    }

    pub async fn publish_json<T: Serialize>(&self, queue: &str, message: &T) -> Result<(), Error> {
        let body = serde_json::to_vec(message)
            .map_err(|e| Error::Transport(format!("failed to serialize message: {e}")))?;
        self.publish_fire_and_forget(queue, body).await
    }
}

async fn declare_reply_queue(channel: &Channel) -> Result<lapin::Queue, Error> {
    channel
        .queue_declare(
            "",
            QueueDeclareOptions {
                exclusive: true,
                auto_delete: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await
        .map_err(|e| Error::Transport(format!("failed to declare a callback queue: {e}")))
}

async fn declare_queue(channel: &Channel, name: &str) -> Result<lapin::Queue, Error> {
    channel
        .queue_declare(name, QueueDeclareOptions::default(), FieldTable::default())
        .await
        .map_err(|e| Error::Transport(format!("failed to declare a queue: {e}")))
}
