// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # RabbitMQ Message Producer
//!
//! This module provides the `Producer` contract and its RabbitMQ implementation.
//! A producer moves from unprepared to prepared exactly once per topology:
//! `prepare` opens the pinned channel and, for fanout and topic topologies,
//! declares the exchange. `send` refuses to publish for a topology that was not
//! prepared.
//!
//! Direct topologies never declare anything: the target queue must already
//! exist on the broker.

use crate::{
    configs::ConnectionEndpoint,
    errors::AmqpError,
    otel,
    session::Session,
    topology::{Target, Topology},
    transport::{Publishing, Transport},
};
use async_trait::async_trait;
use tracing::{debug, error};

/// Publishing side of a topology.
#[async_trait]
pub trait Producer {
    /// Opens the transport session.
    async fn login(&mut self, endpoint: &ConnectionEndpoint) -> Result<(), AmqpError>;

    /// Opens the pinned channel and declares the exchange the topology needs.
    async fn prepare(&mut self, topology: &Topology) -> Result<(), AmqpError>;

    /// Publishes `payload`.
    ///
    /// `routing_key` is required for topic topologies and ignored otherwise.
    async fn send(
        &mut self,
        topology: &Topology,
        payload: &[u8],
        routing_key: Option<&str>,
    ) -> Result<(), AmqpError>;
}

/// RabbitMQ implementation of the `Producer` trait.
///
/// The producer owns its transport exclusively. It is not meant to be shared
/// between tasks without external synchronization.
pub struct RabbitMQProducer<T: Transport> {
    session: Session<T>,
    prepared: Option<Target>,
}

impl<T: Transport> RabbitMQProducer<T> {
    pub fn new(transport: T) -> RabbitMQProducer<T> {
        RabbitMQProducer {
            session: Session::new(transport),
            prepared: None,
        }
    }

    pub fn is_prepared(&self) -> bool {
        self.prepared.is_some()
    }

    /// Closes the channel and the connection, logging any failure.
    pub async fn close(mut self) {
        self.session.close().await;
    }
}

#[async_trait]
impl<T: Transport> Producer for RabbitMQProducer<T> {
    async fn login(&mut self, endpoint: &ConnectionEndpoint) -> Result<(), AmqpError> {
        self.session.login(endpoint).await
    }

    async fn prepare(&mut self, topology: &Topology) -> Result<(), AmqpError> {
        let channel = topology.channel();
        self.session.open_channel(channel).await?;

        if let Some(def) = topology.exchange_definition() {
            self.session
                .transport()
                .declare_exchange(channel, &def)
                .await?;
        }

        debug!(name = topology.name(), channel = channel.get(), "producer prepared");
        self.prepared = Some(topology.target());

        Ok(())
    }

    async fn send(
        &mut self,
        topology: &Topology,
        payload: &[u8],
        routing_key: Option<&str>,
    ) -> Result<(), AmqpError> {
        if self.prepared.as_ref() != Some(&topology.target()) {
            error!(name = topology.name(), "send called before prepare");
            return Err(AmqpError::NotPrepared);
        }

        let (exchange, key) = topology.publish_route(routing_key)?;

        let msg = Publishing {
            exchange: exchange.to_owned(),
            routing_key: key.to_owned(),
            payload: payload.to_vec(),
            headers: otel::inject_current(),
        };

        self.session
            .transport()
            .publish(topology.channel(), &msg)
            .await
    }
}
