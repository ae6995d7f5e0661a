// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Command-Line Programs
//!
//! Argument definitions and the run loops shared by the programs under
//! `src/bin`. Arguments are parsed before the configuration is read, so a
//! missing positional argument stops the program before any connection is
//! attempted.

use crate::{
    channel::AmqpTransport,
    configs::{ConnectionEndpoint, DEFAULT_CONFIG_PATH},
    consumer::{Consumer, RabbitMQConsumer},
    dispatcher::callback,
    errors::AmqpError,
    producer::{Producer, RabbitMQProducer},
    topology::Topology,
};
use clap::Parser;
use futures_util::StreamExt;
use rand::Rng;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Arguments of the direct consumer and producer.
#[derive(Parser, Debug, PartialEq, Eq)]
pub struct QueueArgs {
    /// Path to the JSON connection configuration
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Name of an existing queue
    pub queue: String,
}

/// Arguments of the fanout publisher and subscriber.
#[derive(Parser, Debug, PartialEq, Eq)]
pub struct ExchangeArgs {
    /// Path to the JSON connection configuration
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Name of the fanout exchange
    pub exchange: String,
}

/// Arguments of the topic consumer.
#[derive(Parser, Debug, PartialEq, Eq)]
pub struct TopicConsumerArgs {
    /// Path to the JSON connection configuration
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Name of the topic exchange
    pub exchange: String,

    /// Routing-key patterns to bind, e.g. `error.*` or `#.disk`
    #[arg(required = true, num_args = 1..)]
    pub routing_keys: Vec<String>,
}

/// Arguments of the topic producer.
#[derive(Parser, Debug, PartialEq, Eq)]
pub struct TopicProducerArgs {
    /// Path to the JSON connection configuration
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Name of the topic exchange
    pub exchange: String,

    /// Routing key of the published message
    pub routing_key: String,
}

#[derive(Serialize)]
struct TestMessage<'a> {
    msg: &'a str,
    id: u32,
}

/// Payload of the direct producer: `{"msg":"test producer message","id":<id>}`.
pub fn direct_payload(id: u32) -> Result<Vec<u8>, AmqpError> {
    serde_json::to_vec(&TestMessage {
        msg: "test producer message",
        id,
    })
    .map_err(|err| AmqpError::PublishingError(err.to_string()))
}

/// Payload of the fanout publisher.
pub fn pubsub_payload(id: u32) -> Vec<u8> {
    format!("pubsub message {}", id).into_bytes()
}

/// Payload of the topic producer.
pub const TOPIC_PAYLOAD: &[u8] = b"test topic producer message";

pub fn random_id(max: u32) -> u32 {
    rand::thread_rng().gen_range(0..=max)
}

/// Loads the endpoint, prepares `topology` and publishes one message.
pub async fn produce(
    config: &Path,
    topology: &Topology,
    payload: &[u8],
    routing_key: Option<&str>,
) -> Result<(), AmqpError> {
    let endpoint = ConnectionEndpoint::load(config)?;

    let mut producer = RabbitMQProducer::new(AmqpTransport::default());
    producer.login(&endpoint).await?;
    producer.prepare(topology).await?;
    producer.send(topology, payload, routing_key).await?;

    info!(name = topology.name(), bytes = payload.len(), "message sent");
    producer.close().await;

    Ok(())
}

/// Loads the endpoint, prepares `topology` and prints every message until
/// Ctrl-C is received.
pub async fn consume(config: &Path, topology: &Topology) -> Result<(), AmqpError> {
    let endpoint = ConnectionEndpoint::load(config)?;

    let mut consumer = RabbitMQConsumer::new(AmqpTransport::default());
    consumer.login(&endpoint).await?;
    consumer
        .prepare(
            topology,
            callback(|channel, _, delivery| {
                println!(
                    "[{}] {}: {}",
                    channel,
                    delivery.routing_key,
                    String::from_utf8_lossy(&delivery.body)
                );
            }),
        )
        .await?;

    info!(
        queue = consumer.queue_name().unwrap_or_default(),
        "waiting for messages, press Ctrl-C to exit"
    );

    let stop = CancellationToken::new();
    let signal = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal.cancel();
        }
    });

    let mut result = Ok(());
    {
        let deliveries = consumer.deliveries(stop);
        futures_util::pin_mut!(deliveries);

        while let Some(delivery) = deliveries.next().await {
            if let Err(err) = delivery {
                error!(error = err.to_string(), "consume failed");
                result = Err(err);
                break;
            }
        }
    }

    consumer.close().await;
    result
}
