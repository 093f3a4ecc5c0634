//! Topic administration helpers.

use rdkafka::admin::{AdminClient, AdminOptions, NewTopic, TopicReplication};
use rdkafka::client::DefaultClientContext;
use rdkafka::error::RDKafkaErrorCode;
use rdkafka::ClientConfig;
use tracing::{debug, info};

use crate::error::BridgeError;

/// Creates `topic` with the given partition count and replication factor
/// if it does not already exist.
///
/// An already-existing topic is not an error; its partition count and
/// replication factor are left as they are.
///
/// # Errors
///
/// Returns [`BridgeError::TransportUnavailable`] if the admin client cannot
/// be created or the broker rejects the creation for any reason other than
/// the topic already existing.
pub async fn ensure_topic(
    bootstrap_servers: &str,
    topic: &str,
    partitions: i32,
    replication: i32,
) -> Result<(), BridgeError> {
    let admin: AdminClient<DefaultClientContext> = ClientConfig::new()
        .set("bootstrap.servers", bootstrap_servers)
        .create()
        .map_err(|e| {
            BridgeError::TransportUnavailable(format!("failed to create admin client: {e}"))
        })?;

    let new_topic = NewTopic::new(topic, partitions, TopicReplication::Fixed(replication));
    let results = admin
        .create_topics(&[new_topic], &AdminOptions::new())
        .await
        .map_err(|e| BridgeError::TransportUnavailable(format!("create topics failed: {e}")))?;

    for result in results {
        match result {
            Ok(name) => info!(topic = %name, partitions, replication, "topic created"),
            Err((name, RDKafkaErrorCode::TopicAlreadyExists)) => {
                debug!(topic = %name, "topic already exists");
            }
            Err((name, code)) => {
                return Err(BridgeError::TransportUnavailable(format!(
                    "failed to create topic '{name}': {code}"
                )));
            }
        }
    }

    Ok(())
}
