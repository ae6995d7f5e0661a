// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

#![allow(dead_code)]

use async_trait::async_trait;
use rabbitmq_topology::{
    configs::ConnectionEndpoint,
    errors::AmqpError,
    exchange::{ExchangeDefinition, ExchangeKind},
    queue::{QueueBinding, QueueDefinition},
    topology::ChannelId,
    transport::{Delivery, Publishing, Transport},
};
use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::{Arc, Mutex},
};
use tokio::sync::Notify;

#[derive(Default)]
struct State {
    exchanges: HashMap<String, ExchangeKind>,
    queues: HashMap<String, VecDeque<Publishing>>,
    auto_delete: HashSet<String>,
    bindings: Vec<QueueBinding>,
    next_queue: u64,
    connections: u64,
}

/// In-memory broker shared by every `FakeTransport` created from it.
#[derive(Clone, Default)]
pub struct FakeBroker {
    state: Arc<Mutex<State>>,
    notify: Arc<Notify>,
}

impl FakeBroker {
    pub fn new() -> FakeBroker {
        FakeBroker::default()
    }

    /// Creates a queue as an administrator would, outside any topology.
    pub fn add_queue(&self, name: &str) {
        self.state
            .lock()
            .unwrap()
            .queues
            .entry(name.to_owned())
            .or_default();
    }

    pub fn exchange_kind(&self, name: &str) -> Option<ExchangeKind> {
        self.state.lock().unwrap().exchanges.get(name).copied()
    }

    pub fn bindings_of(&self, queue: &str) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .bindings
            .iter()
            .filter(|b| b.queue_name() == queue)
            .map(|b| b.key().to_owned())
            .collect()
    }

    pub fn depth(&self, queue: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .queues
            .get(queue)
            .map(VecDeque::len)
            .unwrap_or_default()
    }

    pub fn has_queue(&self, name: &str) -> bool {
        self.state.lock().unwrap().queues.contains_key(name)
    }

    pub fn connections(&self) -> u64 {
        self.state.lock().unwrap().connections
    }

    pub fn transport(&self) -> FakeTransport {
        FakeTransport {
            broker: self.clone(),
            connected: false,
            channels: HashSet::new(),
            consumers: HashMap::new(),
            delivery_tag: 0,
        }
    }

    fn route(&self, msg: &Publishing) -> Result<(), AmqpError> {
        let mut state = self.state.lock().unwrap();

        let targets: Vec<String> = if msg.exchange.is_empty() {
            vec![msg.routing_key.clone()]
        } else {
            let Some(kind) = state.exchanges.get(&msg.exchange).copied() else {
                return Err(AmqpError::PublishingError(format!(
                    "no exchange `{}`",
                    msg.exchange
                )));
            };

            state
                .bindings
                .iter()
                .filter(|b| b.exchange_name() == msg.exchange)
                .filter(|b| match kind {
                    ExchangeKind::Fanout => true,
                    ExchangeKind::Direct => b.key() == msg.routing_key,
                    ExchangeKind::Topic => topic_matches(b.key(), &msg.routing_key),
                })
                .map(|b| b.queue_name().to_owned())
                .collect::<HashSet<_>>()
                .into_iter()
                .collect()
        };

        for queue in targets {
            if let Some(q) = state.queues.get_mut(&queue) {
                q.push_back(msg.clone());
            }
        }

        drop(state);
        self.notify.notify_waiters();

        Ok(())
    }
}

/// AMQP topic matching: `*` is exactly one word, `#` zero or more words.
pub fn topic_matches(pattern: &str, key: &str) -> bool {
    fn go(pattern: &[&str], key: &[&str]) -> bool {
        match pattern.split_first() {
            None => key.is_empty(),
            Some((&"#", rest)) => (0..=key.len()).any(|i| go(rest, &key[i..])),
            Some((&"*", rest)) => !key.is_empty() && go(rest, &key[1..]),
            Some((word, rest)) => key.first() == Some(word) && go(rest, &key[1..]),
        }
    }

    let pattern: Vec<&str> = pattern.split('.').collect();
    let key: Vec<&str> = key.split('.').collect();
    go(&pattern, &key)
}

pub struct FakeTransport {
    broker: FakeBroker,
    connected: bool,
    channels: HashSet<ChannelId>,
    consumers: HashMap<ChannelId, (String, String)>,
    delivery_tag: u64,
}

impl FakeTransport {
    fn check(&self, channel: ChannelId) -> Result<(), AmqpError> {
        if self.channels.contains(&channel) {
            Ok(())
        } else {
            Err(AmqpError::ChannelError(format!("channel {} is not open", channel)))
        }
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn connect(&mut self, endpoint: &ConnectionEndpoint) -> Result<(), AmqpError> {
        if endpoint.password != "guest" {
            return Err(AmqpError::AuthenticationError);
        }

        self.broker.state.lock().unwrap().connections += 1;
        self.connected = true;
        Ok(())
    }

    async fn open_channel(&mut self, channel: ChannelId) -> Result<(), AmqpError> {
        if !self.connected {
            return Err(AmqpError::ChannelError("not connected".to_owned()));
        }

        self.channels.insert(channel);
        Ok(())
    }

    async fn declare_exchange(
        &mut self,
        channel: ChannelId,
        def: &ExchangeDefinition,
    ) -> Result<(), AmqpError> {
        self.check(channel)?;
        let mut state = self.broker.state.lock().unwrap();

        match state.exchanges.get(def.name()) {
            Some(kind) if *kind != def.exchange_kind() => {
                Err(AmqpError::DeclareExchangeError(def.name().to_owned()))
            }
            Some(_) => Ok(()),
            None => {
                state
                    .exchanges
                    .insert(def.name().to_owned(), def.exchange_kind());
                Ok(())
            }
        }
    }

    async fn declare_queue(
        &mut self,
        channel: ChannelId,
        def: &QueueDefinition,
    ) -> Result<String, AmqpError> {
        self.check(channel)?;
        let mut state = self.broker.state.lock().unwrap();

        let name = if def.is_server_named() {
            state.next_queue += 1;
            format!("amq.gen-{}", state.next_queue)
        } else {
            def.name().to_owned()
        };

        state.queues.entry(name.clone()).or_default();
        if def.is_auto_delete() {
            state.auto_delete.insert(name.clone());
        }
        Ok(name)
    }

    async fn bind_queue(
        &mut self,
        channel: ChannelId,
        binding: &QueueBinding,
    ) -> Result<(), AmqpError> {
        self.check(channel)?;
        let mut state = self.broker.state.lock().unwrap();

        if !state.exchanges.contains_key(binding.exchange_name())
            || !state.queues.contains_key(binding.queue_name())
        {
            return Err(AmqpError::BindingExchangeToQueueError(
                binding.exchange_name().to_owned(),
                binding.queue_name().to_owned(),
            ));
        }

        state.bindings.push(binding.clone());
        Ok(())
    }

    async fn publish(&mut self, channel: ChannelId, msg: &Publishing) -> Result<(), AmqpError> {
        self.check(channel)?;
        self.broker.route(msg)
    }

    async fn basic_consume(
        &mut self,
        channel: ChannelId,
        queue: &str,
        _no_ack: bool,
    ) -> Result<String, AmqpError> {
        self.check(channel)?;

        if !self.broker.state.lock().unwrap().queues.contains_key(queue) {
            return Err(AmqpError::ConsumerDeclarationError(queue.to_owned()));
        }

        let tag = format!("ctag-{}-{}", queue, channel);
        self.consumers
            .insert(channel, (queue.to_owned(), tag.clone()));
        Ok(tag)
    }

    async fn basic_cancel(
        &mut self,
        channel: ChannelId,
        consumer_tag: &str,
    ) -> Result<(), AmqpError> {
        self.check(channel)?;

        let Some((queue, _)) = self
            .consumers
            .get(&channel)
            .filter(|(_, tag)| tag == consumer_tag)
            .cloned()
        else {
            return Err(AmqpError::ConsumerError(format!("no consumer `{}`", consumer_tag)));
        };
        self.consumers.remove(&channel);

        let mut state = self.broker.state.lock().unwrap();
        if state.auto_delete.remove(&queue) {
            state.queues.remove(&queue);
            state.bindings.retain(|b| b.queue_name() != queue);
        }

        Ok(())
    }

    async fn next_delivery(&mut self, channel: ChannelId) -> Result<Delivery, AmqpError> {
        let Some((queue, tag)) = self.consumers.get(&channel).cloned() else {
            return Err(AmqpError::ConsumerError("no consumer".to_owned()));
        };

        loop {
            let notified = self.broker.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let msg = self
                .broker
                .state
                .lock()
                .unwrap()
                .queues
                .get_mut(&queue)
                .and_then(VecDeque::pop_front);

            if let Some(msg) = msg {
                self.delivery_tag += 1;
                return Ok(Delivery {
                    channel,
                    consumer_tag: tag,
                    delivery_tag: self.delivery_tag,
                    redelivered: false,
                    exchange: msg.exchange,
                    routing_key: msg.routing_key,
                    body: msg.payload,
                    headers: msg.headers,
                });
            }

            notified.await;
        }
    }

    async fn close_channel(&mut self, channel: ChannelId) -> Result<(), AmqpError> {
        self.consumers.remove(&channel);
        self.channels.remove(&channel);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), AmqpError> {
        self.connected = false;
        Ok(())
    }
}

pub fn endpoint() -> ConnectionEndpoint {
    ConnectionEndpoint::new("localhost", 5672)
}
