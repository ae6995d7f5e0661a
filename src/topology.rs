// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Messaging Topologies
//!
//! A `Topology` describes how a producer or consumer uses the broker:
//! - `Direct`: a pre-existing named queue reached through the default exchange
//! - `Fanout`: a named fanout exchange; every subscriber gets its own broker-named queue
//! - `Topic`: a named topic exchange plus the routing-key patterns a subscriber binds
//!
//! Every variant pins one channel. The exchange kind, the subscriber queue and
//! the bindings are all derived from the variant, so a topic topology can never
//! be declared as a fanout exchange by mistake.

use crate::{
    errors::AmqpError,
    exchange::{ExchangeDefinition, ExchangeKind},
    queue::{QueueBinding, QueueDefinition},
};
use std::fmt;

/// Identifier of the channel a producer or consumer pins for its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(u16);

impl ChannelId {
    /// Creates a channel id, rejecting zero.
    pub fn new(id: u16) -> Result<ChannelId, AmqpError> {
        if id == 0 {
            return Err(AmqpError::InvalidChannelId);
        }

        Ok(ChannelId(id))
    }

    pub fn get(&self) -> u16 {
        self.0
    }
}

impl Default for ChannelId {
    fn default() -> Self {
        ChannelId(1)
    }
}

impl TryFrom<u16> for ChannelId {
    type Error = AmqpError;

    fn try_from(id: u16) -> Result<Self, Self::Error> {
        ChannelId::new(id)
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Produce to or consume from a queue that already exists on the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectQueue {
    pub(crate) queue: String,
    pub(crate) channel: ChannelId,
}

impl DirectQueue {
    pub fn new(queue: &str) -> DirectQueue {
        DirectQueue {
            queue: queue.to_owned(),
            channel: ChannelId::default(),
        }
    }

    pub fn channel(mut self, channel: ChannelId) -> Self {
        self.channel = channel;
        self
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }
}

/// Publish to every subscriber bound to a fanout exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FanoutTopology {
    pub(crate) exchange: String,
    pub(crate) channel: ChannelId,
}

impl FanoutTopology {
    pub fn new(exchange: &str) -> FanoutTopology {
        FanoutTopology {
            exchange: exchange.to_owned(),
            channel: ChannelId::default(),
        }
    }

    pub fn channel(mut self, channel: ChannelId) -> Self {
        self.channel = channel;
        self
    }

    pub fn exchange(&self) -> &str {
        &self.exchange
    }
}

/// Route messages through a topic exchange by routing-key pattern.
///
/// The routing keys are only used by subscribers, which bind one pattern each
/// in the order given. Producers supply the routing key per message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicTopology {
    pub(crate) exchange: String,
    pub(crate) routing_keys: Vec<String>,
    pub(crate) channel: ChannelId,
}

impl TopicTopology {
    pub fn new(exchange: &str) -> TopicTopology {
        TopicTopology {
            exchange: exchange.to_owned(),
            routing_keys: vec![],
            channel: ChannelId::default(),
        }
    }

    pub fn channel(mut self, channel: ChannelId) -> Self {
        self.channel = channel;
        self
    }

    /// Appends one routing-key pattern.
    pub fn routing_key(mut self, key: &str) -> Self {
        self.routing_keys.push(key.to_owned());
        self
    }

    /// Appends every pattern of `keys`, preserving their order.
    pub fn routing_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.routing_keys.extend(keys.into_iter().map(Into::into));
        self
    }

    pub fn exchange(&self) -> &str {
        &self.exchange
    }

    pub fn keys(&self) -> &[String] {
        &self.routing_keys
    }
}

/// One of the supported messaging patterns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Topology {
    Direct(DirectQueue),
    Fanout(FanoutTopology),
    Topic(TopicTopology),
}

impl From<DirectQueue> for Topology {
    fn from(value: DirectQueue) -> Self {
        Topology::Direct(value)
    }
}

impl From<FanoutTopology> for Topology {
    fn from(value: FanoutTopology) -> Self {
        Topology::Fanout(value)
    }
}

impl From<TopicTopology> for Topology {
    fn from(value: TopicTopology) -> Self {
        Topology::Topic(value)
    }
}

/// The part of a topology a producer keeps after `prepare`: the pattern, the
/// queue or exchange name and the pinned channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Target {
    kind: ExchangeKind,
    name: String,
    channel: ChannelId,
}

impl Topology {
    /// The channel pinned by this topology.
    pub fn channel(&self) -> ChannelId {
        match self {
            Topology::Direct(t) => t.channel,
            Topology::Fanout(t) => t.channel,
            Topology::Topic(t) => t.channel,
        }
    }

    /// Queue name for `Direct`, exchange name otherwise.
    pub fn name(&self) -> &str {
        match self {
            Topology::Direct(t) => &t.queue,
            Topology::Fanout(t) => &t.exchange,
            Topology::Topic(t) => &t.exchange,
        }
    }

    /// The exchange that must exist before this topology is used.
    ///
    /// `Direct` relies on the default exchange and a pre-existing queue, so it
    /// never declares anything. The others declare a durable, non auto-delete
    /// exchange whose kind follows the variant.
    pub fn exchange_definition(&self) -> Option<ExchangeDefinition> {
        match self {
            Topology::Direct(_) => None,
            Topology::Fanout(t) => Some(ExchangeDefinition::new(&t.exchange).fanout().durable()),
            Topology::Topic(t) => Some(ExchangeDefinition::new(&t.exchange).topic().durable()),
        }
    }

    /// The private queue a subscriber declares, if any.
    pub fn subscriber_queue(&self) -> Option<QueueDefinition> {
        match self {
            Topology::Direct(_) => None,
            Topology::Fanout(_) | Topology::Topic(_) => {
                Some(QueueDefinition::server_named().exclusive().delete())
            }
        }
    }

    /// Bindings from `queue` to this topology's exchange, in declaration order.
    pub fn bindings(&self, queue: &str) -> Vec<QueueBinding> {
        match self {
            Topology::Direct(_) => vec![],
            Topology::Fanout(t) => vec![QueueBinding::new(queue).exchange(&t.exchange)],
            Topology::Topic(t) => t
                .routing_keys
                .iter()
                .map(|key| QueueBinding::new(queue).exchange(&t.exchange).routing_key(key))
                .collect(),
        }
    }

    /// Resolves the exchange and routing key a message is published with.
    ///
    /// # Errors
    /// `Topic` requires a routing key, `AmqpError::PublishingError` otherwise.
    pub fn publish_route<'a>(
        &'a self,
        routing_key: Option<&'a str>,
    ) -> Result<(&'a str, &'a str), AmqpError> {
        match self {
            Topology::Direct(t) => Ok(("", &t.queue)),
            Topology::Fanout(t) => Ok((&t.exchange, "")),
            Topology::Topic(t) => match routing_key {
                Some(key) => Ok((&t.exchange, key)),
                None => Err(AmqpError::PublishingError(format!(
                    "a routing key is required to publish on topic exchange `{}`",
                    t.exchange
                ))),
            },
        }
    }

    pub(crate) fn target(&self) -> Target {
        let kind = match self {
            Topology::Direct(_) => ExchangeKind::Direct,
            Topology::Fanout(_) => ExchangeKind::Fanout,
            Topology::Topic(_) => ExchangeKind::Topic,
        };

        Target {
            kind,
            name: self.name().to_owned(),
            channel: self.channel(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_reject_channel_zero() {
        assert_eq!(ChannelId::new(0), Err(AmqpError::InvalidChannelId));
        assert_eq!(ChannelId::try_from(3).unwrap().get(), 3);
        assert_eq!(ChannelId::default().get(), 1);
    }

    #[test]
    fn should_not_declare_exchange_for_direct_queue() {
        let topology = Topology::from(DirectQueue::new("jobs"));

        assert_eq!(topology.exchange_definition(), None);
        assert_eq!(topology.subscriber_queue(), None);
        assert!(topology.bindings("jobs").is_empty());
    }

    #[test]
    fn should_derive_exchange_kind_from_variant() {
        let fanout = Topology::from(FanoutTopology::new("events"));
        let topic = Topology::from(TopicTopology::new("logs"));

        let fanout_def = fanout.exchange_definition().unwrap();
        assert_eq!(fanout_def.exchange_kind(), ExchangeKind::Fanout);
        assert!(fanout_def.is_durable());

        let queue = fanout.subscriber_queue().unwrap();
        assert!(queue.is_server_named());
        assert!(queue.is_exclusive());
        assert!(queue.is_auto_delete());

        assert_eq!(
            topic.exchange_definition().unwrap().exchange_kind(),
            ExchangeKind::Topic
        );
    }

    #[test]
    fn should_bind_every_topic_pattern_in_order() {
        let topology = Topology::from(TopicTopology::new("logs").routing_keys(["error.*", "warn.*"]));

        let keys: Vec<String> = topology
            .bindings("amq.gen-1")
            .iter()
            .map(|b| b.key().to_owned())
            .collect();

        assert_eq!(keys, vec!["error.*", "warn.*"]);
    }

    #[test]
    fn should_bind_fanout_with_empty_key() {
        let topology = Topology::from(FanoutTopology::new("events"));

        let bindings = topology.bindings("amq.gen-1");

        assert_eq!(
            bindings,
            vec![QueueBinding::new("amq.gen-1").exchange("events")]
        );
    }

    #[test]
    fn should_resolve_publish_route() {
        let direct = Topology::from(DirectQueue::new("jobs"));
        let fanout = Topology::from(FanoutTopology::new("events"));
        let topic = Topology::from(TopicTopology::new("logs"));

        assert_eq!(direct.publish_route(None).unwrap(), ("", "jobs"));
        assert_eq!(fanout.publish_route(Some("ignored")).unwrap(), ("events", ""));
        assert_eq!(
            topic.publish_route(Some("error.disk")).unwrap(),
            ("logs", "error.disk")
        );
        assert!(matches!(
            topic.publish_route(None),
            Err(AmqpError::PublishingError(_))
        ));
    }

    #[test]
    fn should_ignore_routing_keys_when_comparing_targets() {
        let a = Topology::from(TopicTopology::new("logs").routing_key("a.*"));
        let b = Topology::from(TopicTopology::new("logs"));
        let c = Topology::from(FanoutTopology::new("logs"));

        assert_eq!(a.target(), b.target());
        assert_ne!(a.target(), c.target());
    }
}
