// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Broker Transport
//!
//! The `Transport` trait is the boundary between the topology logic and the
//! AMQP client doing the actual network work. Every operation is scoped to the
//! channel id pinned by the producer or consumer driving it.

use crate::{
    configs::ConnectionEndpoint,
    errors::AmqpError,
    exchange::ExchangeDefinition,
    queue::{QueueBinding, QueueDefinition},
    topology::ChannelId,
};
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Default content type of published payloads
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// A message ready to be handed to the broker.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Publishing {
    /// Target exchange, empty for the default exchange
    pub exchange: String,
    /// Routing key, or the queue name when publishing on the default exchange
    pub routing_key: String,
    pub payload: Vec<u8>,
    pub headers: BTreeMap<String, String>,
}

/// A message received from the broker.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Delivery {
    pub channel: ChannelId,
    pub consumer_tag: String,
    pub delivery_tag: u64,
    pub redelivered: bool,
    pub exchange: String,
    pub routing_key: String,
    pub body: Vec<u8>,
    /// String-valued message headers
    pub headers: BTreeMap<String, String>,
}

/// Channel-scoped operations of an established broker session.
///
/// A transport owns exactly one connection. It is driven by a single producer
/// or consumer and is not meant to be shared between tasks; callers that need
/// to do so must add their own synchronization.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send {
    /// Opens the connection and logs in.
    async fn connect(&mut self, endpoint: &ConnectionEndpoint) -> Result<(), AmqpError>;

    /// Opens the channel identified by `channel`.
    async fn open_channel(&mut self, channel: ChannelId) -> Result<(), AmqpError>;

    /// Declares an exchange. Redeclaring with identical parameters succeeds.
    async fn declare_exchange(
        &mut self,
        channel: ChannelId,
        def: &ExchangeDefinition,
    ) -> Result<(), AmqpError>;

    /// Declares a queue and returns its name, which is broker-assigned when
    /// the definition has an empty name.
    async fn declare_queue(
        &mut self,
        channel: ChannelId,
        def: &QueueDefinition,
    ) -> Result<String, AmqpError>;

    /// Binds a queue to an exchange.
    async fn bind_queue(
        &mut self,
        channel: ChannelId,
        binding: &QueueBinding,
    ) -> Result<(), AmqpError>;

    /// Publishes a message without waiting for a broker confirmation.
    async fn publish(&mut self, channel: ChannelId, msg: &Publishing) -> Result<(), AmqpError>;

    /// Starts a consumer on `queue` and returns its consumer tag.
    async fn basic_consume(
        &mut self,
        channel: ChannelId,
        queue: &str,
        no_ack: bool,
    ) -> Result<String, AmqpError>;

    /// Stops the consumer `consumer_tag` on `channel`. Messages still in its
    /// prefetch buffer are dropped.
    async fn basic_cancel(
        &mut self,
        channel: ChannelId,
        consumer_tag: &str,
    ) -> Result<(), AmqpError>;

    /// Waits until the consumer registered on `channel` receives one message.
    async fn next_delivery(&mut self, channel: ChannelId) -> Result<Delivery, AmqpError>;

    async fn close_channel(&mut self, channel: ChannelId) -> Result<(), AmqpError>;

    async fn close(&mut self) -> Result<(), AmqpError>;
}
