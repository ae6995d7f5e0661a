// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # AMQP Connection and Channel Management
//!
//! This module implements `Transport` on top of lapin. It owns one AMQP
//! connection and the channels opened on it, keyed by the channel id pinned by
//! the producer or consumer. lapin picks the wire-level channel number itself,
//! so the pinned id is a local handle and the broker-side number is only logged.

use crate::{
    configs::ConnectionEndpoint,
    errors::AmqpError,
    exchange::ExchangeDefinition,
    queue::{QueueBinding, QueueDefinition},
    topology::ChannelId,
    transport::{Delivery, Publishing, Transport, JSON_CONTENT_TYPE},
};
use async_trait::async_trait;
use futures_util::StreamExt;
use lapin::{
    options::{
        BasicCancelOptions, BasicConsumeOptions, BasicPublishOptions, ExchangeDeclareOptions,
        QueueBindOptions, QueueDeclareOptions,
    },
    protocol::{basic::AMQPProperties, AMQPErrorKind, AMQPSoftError},
    types::{AMQPValue, FieldTable, LongString, ShortString},
    BasicProperties, Channel, Connection, ConnectionProperties, Consumer,
};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, error};
use uuid::Uuid;

const REPLY_SUCCESS: u16 = 200;

/// lapin backed `Transport`.
pub struct AmqpTransport {
    name: String,
    connection: Option<Connection>,
    channels: HashMap<ChannelId, Channel>,
    consumers: HashMap<ChannelId, (String, Consumer)>,
}

impl AmqpTransport {
    /// Creates a transport whose connection will be reported to the broker
    /// under `connection_name`.
    pub fn new(connection_name: &str) -> AmqpTransport {
        AmqpTransport {
            name: connection_name.to_owned(),
            connection: None,
            channels: HashMap::default(),
            consumers: HashMap::default(),
        }
    }

    fn channel(&self, id: ChannelId) -> Result<&Channel, AmqpError> {
        match self.channels.get(&id) {
            Some(c) => Ok(c),
            None => {
                error!(channel = id.get(), "channel is not open");
                Err(AmqpError::ChannelError(format!("channel {} is not open", id)))
            }
        }
    }
}

impl Default for AmqpTransport {
    fn default() -> Self {
        AmqpTransport::new(env!("CARGO_PKG_NAME"))
    }
}

#[async_trait]
impl Transport for AmqpTransport {
    async fn connect(&mut self, endpoint: &ConnectionEndpoint) -> Result<(), AmqpError> {
        debug!("creating amqp connection...");
        let options = ConnectionProperties::default()
            .with_connection_name(LongString::from(self.name.clone()));

        let conn = match Connection::connect_uri(endpoint.amqp_uri(), options).await {
            Ok(c) => Ok(c),
            Err(err) if is_access_refused(&err) => {
                error!(error = err.to_string(), user = %endpoint.username, "login failed");
                Err(AmqpError::AuthenticationError)
            }
            Err(err) => {
                error!(error = err.to_string(), "failure to connect");
                Err(AmqpError::ConnectionError(err.to_string()))
            }
        }?;
        debug!("amqp connected");

        self.connection = Some(conn);
        Ok(())
    }

    async fn open_channel(&mut self, channel: ChannelId) -> Result<(), AmqpError> {
        let Some(conn) = &self.connection else {
            error!("channel requested before connecting");
            return Err(AmqpError::ChannelError("not connected".to_owned()));
        };

        debug!("creating amqp channel...");
        match conn.create_channel().await {
            Ok(c) => {
                debug!(channel = channel.get(), wire_id = c.id(), "channel created");
                self.channels.insert(channel, c);
                Ok(())
            }
            Err(err) => {
                error!(error = err.to_string(), "error to create the channel");
                Err(AmqpError::ChannelError(err.to_string()))
            }
        }
    }

    async fn declare_exchange(
        &mut self,
        channel: ChannelId,
        def: &ExchangeDefinition,
    ) -> Result<(), AmqpError> {
        debug!("creating exchange: {}", def.name);
        let kind = lapin::ExchangeKind::from(def.kind);

        match self
            .channel(channel)?
            .exchange_declare(
                &def.name,
                kind,
                ExchangeDeclareOptions {
                    durable: def.durable,
                    ..ExchangeDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await
        {
            Err(err) => {
                error!(
                    error = err.to_string(),
                    name = %def.name,
                    "error to declare the exchange"
                );
                Err(AmqpError::DeclareExchangeError(def.name.clone()))
            }
            _ => {
                debug!("exchange: {} was created", def.name);
                Ok(())
            }
        }
    }

    async fn declare_queue(
        &mut self,
        channel: ChannelId,
        def: &QueueDefinition,
    ) -> Result<String, AmqpError> {
        debug!("creating queue: {:?}", def.name);

        match self
            .channel(channel)?
            .queue_declare(
                &def.name,
                QueueDeclareOptions {
                    exclusive: def.exclusive,
                    auto_delete: def.delete,
                    ..QueueDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await
        {
            Err(err) => {
                error!(error = err.to_string(), "failure to declare queue");
                Err(AmqpError::DeclareQueueError(def.name.clone()))
            }
            Ok(queue) => {
                debug!("queue: {} was created", queue.name());
                Ok(queue.name().to_string())
            }
        }
    }

    async fn bind_queue(
        &mut self,
        channel: ChannelId,
        binding: &QueueBinding,
    ) -> Result<(), AmqpError> {
        debug!(
            "binding queue: {} to the exchange: {} with the key: {}",
            binding.queue_name, binding.exchange_name, binding.routing_key
        );

        match self
            .channel(channel)?
            .queue_bind(
                &binding.queue_name,
                &binding.exchange_name,
                &binding.routing_key,
                QueueBindOptions { nowait: false },
                FieldTable::default(),
            )
            .await
        {
            Err(err) => {
                error!(error = err.to_string(), "error to bind queue to exchange");
                Err(AmqpError::BindingExchangeToQueueError(
                    binding.exchange_name.clone(),
                    binding.queue_name.clone(),
                ))
            }
            _ => Ok(()),
        }
    }

    async fn publish(&mut self, channel: ChannelId, msg: &Publishing) -> Result<(), AmqpError> {
        let mut headers = BTreeMap::<ShortString, AMQPValue>::default();
        for (key, value) in &msg.headers {
            headers.insert(
                ShortString::from(key.clone()),
                AMQPValue::LongString(LongString::from(value.clone())),
            );
        }

        match self
            .channel(channel)?
            .basic_publish(
                &msg.exchange,
                &msg.routing_key,
                BasicPublishOptions {
                    immediate: false,
                    mandatory: false,
                },
                &msg.payload,
                BasicProperties::default()
                    .with_content_type(ShortString::from(JSON_CONTENT_TYPE))
                    .with_message_id(ShortString::from(Uuid::new_v4().to_string()))
                    .with_headers(FieldTable::from(headers)),
            )
            .await
        {
            Err(err) => {
                error!(error = err.to_string(), "error publishing message");
                Err(AmqpError::PublishingError(err.to_string()))
            }
            _ => Ok(()),
        }
    }

    async fn basic_consume(
        &mut self,
        channel: ChannelId,
        queue: &str,
        no_ack: bool,
    ) -> Result<String, AmqpError> {
        let tag = format!("ctag-{}", Uuid::new_v4());

        let consumer = match self
            .channel(channel)?
            .basic_consume(
                queue,
                &tag,
                BasicConsumeOptions {
                    no_local: false,
                    no_ack,
                    exclusive: false,
                    nowait: false,
                },
                FieldTable::default(),
            )
            .await
        {
            Err(err) => {
                error!(error = err.to_string(), "error to create the consumer");
                Err(AmqpError::ConsumerDeclarationError(queue.to_owned()))
            }
            Ok(c) => Ok(c),
        }?;

        debug!(queue, consumer_tag = %tag, "consumer created");
        self.consumers.insert(channel, (tag.clone(), consumer));
        Ok(tag)
    }

    async fn basic_cancel(
        &mut self,
        channel: ChannelId,
        consumer_tag: &str,
    ) -> Result<(), AmqpError> {
        if let Err(err) = self
            .channel(channel)?
            .basic_cancel(consumer_tag, BasicCancelOptions::default())
            .await
        {
            error!(error = err.to_string(), consumer_tag, "error to cancel the consumer");
            return Err(AmqpError::ConsumerError(err.to_string()));
        }

        if matches!(self.consumers.get(&channel), Some((tag, _)) if tag == consumer_tag) {
            self.consumers.remove(&channel);
        }

        debug!(consumer_tag, "consumer cancelled");
        Ok(())
    }

    async fn next_delivery(&mut self, channel: ChannelId) -> Result<Delivery, AmqpError> {
        let Some((tag, consumer)) = self.consumers.get_mut(&channel) else {
            error!(channel = channel.get(), "no consumer registered on channel");
            return Err(AmqpError::ConsumerError(format!(
                "no consumer registered on channel {}",
                channel
            )));
        };

        match consumer.next().await {
            Some(Ok(delivery)) => {
                let headers = string_headers(&delivery.properties);
                Ok(Delivery {
                    channel,
                    consumer_tag: tag.clone(),
                    delivery_tag: delivery.delivery_tag,
                    redelivered: delivery.redelivered,
                    exchange: delivery.exchange.to_string(),
                    routing_key: delivery.routing_key.to_string(),
                    body: delivery.data,
                    headers,
                })
            }
            Some(Err(err)) => {
                error!(error = err.to_string(), "errors consume msg");
                Err(AmqpError::ConsumerError(err.to_string()))
            }
            None => {
                error!(consumer_tag = tag.as_str(), "consumer stream closed");
                Err(AmqpError::ConsumerError("consumer stream closed".to_owned()))
            }
        }
    }

    async fn close_channel(&mut self, channel: ChannelId) -> Result<(), AmqpError> {
        self.consumers.remove(&channel);

        let Some(c) = self.channels.remove(&channel) else {
            return Ok(());
        };

        c.close(REPLY_SUCCESS, "OK")
            .await
            .map_err(|err| AmqpError::ChannelError(err.to_string()))
    }

    async fn close(&mut self) -> Result<(), AmqpError> {
        self.consumers.clear();
        self.channels.clear();

        let Some(conn) = self.connection.take() else {
            return Ok(());
        };

        conn.close(REPLY_SUCCESS, "OK")
            .await
            .map_err(|err| AmqpError::ConnectionError(err.to_string()))
    }
}

fn is_access_refused(err: &lapin::Error) -> bool {
    matches!(
        err,
        lapin::Error::ProtocolError(e)
            if matches!(e.kind(), AMQPErrorKind::Soft(AMQPSoftError::ACCESSREFUSED))
    )
}

/// Collects the string-valued headers of a delivery.
fn string_headers(props: &AMQPProperties) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();

    let Some(headers) = props.headers() else {
        return out;
    };

    for (key, value) in headers.inner() {
        let text = match value {
            AMQPValue::LongString(v) => std::str::from_utf8(v.as_bytes()).ok().map(str::to_owned),
            AMQPValue::ShortString(v) => Some(v.as_str().to_owned()),
            _ => None,
        };

        if let Some(text) = text {
            out.insert(key.as_str().to_owned(), text);
        }
    }

    out
}
