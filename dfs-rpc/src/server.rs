use std::future::Future;

use dfs_types::Error;
use futures::StreamExt;
use lapin::{
    BasicProperties, Connection,
    options::{BasicAckOptions, BasicConsumeOptions, BasicPublishOptions, BasicQosOptions, QueueDeclareOptions},
    types::FieldTable,
};
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, error, warn};

/// Serves one AMQP queue at a time, prefetch=1 with manual ack — never more
/// than one in-flight request per queue, mirroring the Go `RpcServer`'s
/// `Qos(1, ...)` + `msg.Ack(false)` pattern.
///
/// Generic over the handler closure and its payload codec, rather than one
/// hand-written loop per queue: each service wires up its queues by handing
/// [`Self::serve`] / [`Self::serve_json`] an async closure.
pub struct RpcServer {
    connection: Connection,
}

impl RpcServer {
    pub async fn connect(uri: &str) -> Result<Self, Error> {
        Ok(RpcServer {
            connection: crate::connect(uri).await?,
        })
    }

    /// Serves `queue` forever, calling `handler` with each request body and
    /// publishing its return value back to `reply_to` with the matching
    /// correlation id. Runs until the connection drops or the process exits;
    /// callers `tokio::spawn` one of these per queue.
    pub async fn serve<F, Fut>(&self, queue: &str, handler: F) -> Result<(), Error>
    where
        F: Fn(Vec<u8>) -> Fut,
        Fut: Future<Output = Vec<u8>>,
    {
        let channel = self
            .connection
            .create_channel()
            .await
            .map_err(|e| Error::Transport(format!("failed to open a channel: {e}")))?;

        channel
            .queue_declare(queue, QueueDeclareOptions::default(), FieldTable::default())
            .await
            .map_err(|e| Error::Transport(format!("failed to declare a queue: {e}")))?;

        channel
            .basic_qos(1, BasicQosOptions::default())
            .await
            .map_err(|e| Error::Transport(format!("failed to set QoS: {e}")))?;

        let mut consumer = channel
            .basic_consume(
                queue,
                "",
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| Error::Transport(format!("failed to register a consumer: {e}")))?;

        debug!(queue, "awaiting rpc requests");

        while let Some(delivery) = consumer.next().await {
            let delivery = match delivery {
                Ok(d) => d,
                Err(e) => {
                    error!(queue, error = %e, "consumer error, continuing");
                    continue;
                }
            };

            let reply = handler(delivery.data.clone()).await;

            if let Some(reply_to) = delivery.properties.reply_to().clone() {
                let props = BasicProperties::default()
                    .with_content_type("application/octet-stream".into());
                let props = match delivery.properties.correlation_id() {
                    Some(id) => props.with_correlation_id(id.clone()),
                    None => props,
                };

                if let Err(e) = channel
                    .basic_publish("", reply_to.as_str(), BasicPublishOptions::default(), &reply, props)
                    .await
                {
                    error!(queue, error = %e, "failed to publish reply");
                }
            }

            if let Err(e) = channel.basic_ack(delivery.delivery_tag, BasicAckOptions::default()).await {
                error!(queue, error = %e, "failed to ack message");
            }
        }

        warn!(queue, "consumer stream ended");
        Ok(())
    }

    /// [`Self::serve`] with a JSON request/response codec and a fallible,
    /// typed handler; handler errors are logged and answered with a JSON
    /// `{"error": ...}` envelope rather than dropping the request.
    pub async fn serve_json<Req, Resp, F, Fut>(&self, queue: &str, handler: F) -> Result<(), Error>
    where
        Req: DeserializeOwned,
        Resp: Serialize,
        F: Fn(Req) -> Fut,
        Fut: Future<Output = Result<Resp, Error>>,
    {
        self.serve(queue, |body| async {
            let reply = match serde_json::from_slice::<Req>(&body) {
                Ok(request) => match handler(request).await {
                    Ok(response) => serde_json::to_vec(&response),
                    Err(e) => {
                        warn!(queue, error = %e, "rpc handler returned an error");
                        serde_json::to_vec(&serde_json::json!({ "error": e.to_string() }))
                    }
                },
                Err(e) => {
                    warn!(queue, error = %e, "failed to deserialize request");
                    serde_json::to_vec(&serde_json::json!({ "error": "bad request" }))
                }
            };
            reply.unwrap_or_default()
        })
        .await
    }

    /// Serves `queue` with no reply expected, acking every message after
    /// `handler` runs. Used for the node lifecycle consumer on
    /// `rpc_gateway_node_messages`, which only ever publishes, never
    /// expects a reply.
    pub async fn consume_json<T, F, Fut>(&self, queue: &str, handler: F) -> Result<(), Error>
    where
        T: DeserializeOwned,
        F: Fn(T) -> Fut,
        Fut: Future<Output = ()>,
    {
        self.serve(queue, |body| async {
            match serde_json::from_slice::<T>(&body) {
                Ok(message) => handler(message).await,
                Err(e) => warn!(queue, error = %e, "failed to deserialize message"),
            }
            Vec::new()
        })
        .await
    }
}
