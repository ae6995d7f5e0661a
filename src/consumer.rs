// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # RabbitMQ Message Consumer
//!
//! This module provides the `Consumer` contract and its RabbitMQ implementation.
//! `prepare` runs the setup protocol of the topology and registers a no-ack
//! consumer:
//! 1. Direct: consume the named queue
//! 2. Fanout: declare the exchange, declare a private broker-named queue, bind
//!    it with an empty routing key, consume it
//! 3. Topic: same as fanout but bind once per routing-key pattern, in order
//!
//! No-ack means the broker considers a message delivered as soon as it is
//! sent; there is no application-level acknowledgement.
//!
//! A failed bind aborts `prepare` and leaves the bindings made so far in place.
//!
//! Preparing again with the same topology only swaps the callback. Preparing
//! with another topology cancels the current consumer first; a private queue
//! is auto-deleted by the broker once its consumer is gone.

use crate::{
    configs::ConnectionEndpoint,
    dispatcher::{ConsumerCallback, Dispatcher},
    errors::AmqpError,
    session::Session,
    topology::{ChannelId, Topology},
    transport::{Delivery, Transport},
};
use async_trait::async_trait;
use futures_util::{stream, Stream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// Consuming side of a topology.
#[async_trait]
pub trait Consumer {
    /// Opens the transport session.
    async fn login(&mut self, endpoint: &ConnectionEndpoint) -> Result<(), AmqpError>;

    /// Runs the topology setup protocol and registers `callback`.
    async fn prepare(
        &mut self,
        topology: &Topology,
        callback: ConsumerCallback,
    ) -> Result<(), AmqpError>;

    /// Waits for exactly one message, hands it to the callback and returns it.
    async fn consume_once(&mut self) -> Result<Delivery, AmqpError>;

    /// Replaces the callback; takes effect on the next delivery.
    fn set_callback(&mut self, callback: ConsumerCallback);
}

/// The consume registration made by `prepare`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Subscription {
    topology: Topology,
    channel: ChannelId,
    queue: String,
    consumer_tag: String,
}

/// RabbitMQ implementation of the `Consumer` trait.
///
/// The consumer owns its transport exclusively and dispatches one delivery at a
/// time, in broker order. It is not meant to be shared between tasks without
/// external synchronization.
pub struct RabbitMQConsumer<T: Transport> {
    session: Session<T>,
    dispatcher: Dispatcher,
    subscription: Option<Subscription>,
}

impl<T: Transport> RabbitMQConsumer<T> {
    pub fn new(transport: T) -> RabbitMQConsumer<T> {
        RabbitMQConsumer {
            session: Session::new(transport),
            dispatcher: Dispatcher::default(),
            subscription: None,
        }
    }

    /// Name of the queue being consumed, broker-assigned for fanout and topic
    /// topologies.
    pub fn queue_name(&self) -> Option<&str> {
        self.subscription.as_ref().map(|s| s.queue.as_str())
    }

    pub fn consumer_tag(&self) -> Option<&str> {
        self.subscription.as_ref().map(|s| s.consumer_tag.as_str())
    }

    /// Turns the consumer into a lazy stream of deliveries.
    ///
    /// Each item is one `consume_once` call. The stream ends once `stop` is
    /// cancelled, including while it waits for a message. The consume
    /// registration survives, so a new stream can be started afterwards.
    pub fn deliveries(
        &mut self,
        stop: CancellationToken,
    ) -> impl Stream<Item = Result<Delivery, AmqpError>> + '_ {
        stream::unfold((self, stop), |(consumer, stop)| async move {
            if stop.is_cancelled() {
                return None;
            }

            let next = tokio::select! {
                biased;
                _ = stop.cancelled() => None,
                result = consumer.consume_once() => Some(result),
            };

            next.map(|result| (result, (consumer, stop)))
        })
    }

    /// Closes the channel and the connection, logging any failure.
    pub async fn close(mut self) {
        self.subscription = None;
        self.session.close().await;
    }

    async fn subscribe(&mut self, topology: &Topology) -> Result<Subscription, AmqpError> {
        let channel = topology.channel();
        self.session.open_channel(channel).await?;

        let transport = self.session.transport();

        if let Some(def) = topology.exchange_definition() {
            transport.declare_exchange(channel, &def).await?;
        }

        let queue = match topology.subscriber_queue() {
            Some(def) => transport.declare_queue(channel, &def).await?,
            None => topology.name().to_owned(),
        };

        for binding in topology.bindings(&queue) {
            transport.bind_queue(channel, &binding).await?;
        }

        let consumer_tag = transport.basic_consume(channel, &queue, true).await?;

        Ok(Subscription {
            topology: topology.clone(),
            channel,
            queue,
            consumer_tag,
        })
    }
}

#[async_trait]
impl<T: Transport> Consumer for RabbitMQConsumer<T> {
    async fn login(&mut self, endpoint: &ConnectionEndpoint) -> Result<(), AmqpError> {
        self.session.login(endpoint).await
    }

    async fn prepare(
        &mut self,
        topology: &Topology,
        callback: ConsumerCallback,
    ) -> Result<(), AmqpError> {
        if let Some(current) = &self.subscription {
            if current.topology == *topology {
                debug!(queue = %current.queue, "consumer already prepared, replacing callback");
                self.dispatcher.register(callback);
                return Ok(());
            }

            self.session
                .transport()
                .basic_cancel(current.channel, &current.consumer_tag)
                .await?;
            debug!(consumer_tag = %current.consumer_tag, "previous consumer cancelled");
            self.subscription = None;
        }

        let subscription = self.subscribe(topology).await?;

        debug!(
            queue = %subscription.queue,
            consumer_tag = %subscription.consumer_tag,
            channel = subscription.channel.get(),
            "consumer prepared"
        );

        self.subscription = Some(subscription);
        self.dispatcher.register(callback);

        Ok(())
    }

    async fn consume_once(&mut self) -> Result<Delivery, AmqpError> {
        let Some(subscription) = &self.subscription else {
            error!("consume called before prepare");
            return Err(AmqpError::NotPrepared);
        };
        let channel = subscription.channel;

        let delivery = self.session.transport().next_delivery(channel).await?;

        debug!(
            channel = delivery.channel.get(),
            consumer_tag = %delivery.consumer_tag,
            delivery_tag = delivery.delivery_tag,
            redelivered = delivery.redelivered,
            routing_key = %delivery.routing_key,
            "received"
        );

        self.dispatcher.dispatch(&delivery);

        Ok(delivery)
    }

    fn set_callback(&mut self, callback: ConsumerCallback) {
        self.dispatcher.register(callback);
    }
}
