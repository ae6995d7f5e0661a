// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Queue Management for RabbitMQ
//!
//! This module provides types for defining RabbitMQ queues and the bindings
//! between queues and exchanges. A queue definition with an empty name asks the
//! broker to pick a unique name, which is how fanout and topic subscribers get
//! their private queue.

/// Definition of a RabbitMQ queue with its configuration parameters.
///
/// This struct implements the builder pattern to create and configure queue definitions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueDefinition {
    pub(crate) name: String,
    pub(crate) delete: bool,
    pub(crate) exclusive: bool,
}

impl QueueDefinition {
    /// Creates a non-durable, non-exclusive queue definition with the given name.
    pub fn new(name: &str) -> QueueDefinition {
        QueueDefinition {
            name: name.to_owned(),
            delete: false,
            exclusive: false,
        }
    }

    /// Creates a queue definition whose name is chosen by the broker.
    pub fn server_named() -> QueueDefinition {
        QueueDefinition::new("")
    }

    /// Sets the queue to auto-delete when no longer used.
    pub fn delete(mut self) -> Self {
        self.delete = true;
        self
    }

    /// Makes the queue exclusive to the connection.
    ///
    /// Exclusive queues are deleted when the connection closes.
    pub fn exclusive(mut self) -> Self {
        self.exclusive = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_exclusive(&self) -> bool {
        self.exclusive
    }

    pub fn is_auto_delete(&self) -> bool {
        self.delete
    }

    /// Whether the broker is expected to pick the queue name.
    pub fn is_server_named(&self) -> bool {
        self.name.is_empty()
    }
}

/// Configuration for binding a queue to an exchange.
///
/// Queue bindings define how messages flow from exchanges to queues based on
/// routing keys and exchange types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueBinding {
    pub(crate) queue_name: String,
    pub(crate) exchange_name: String,
    pub(crate) routing_key: String,
}

impl QueueBinding {
    /// Creates a new queue binding for the given queue.
    ///
    /// By default, the exchange name and routing key are empty strings.
    pub fn new(queue: &str) -> QueueBinding {
        QueueBinding {
            queue_name: queue.to_owned(),
            exchange_name: String::new(),
            routing_key: String::new(),
        }
    }

    /// Sets the exchange to bind the queue to.
    pub fn exchange(mut self, exchange: &str) -> Self {
        self.exchange_name = exchange.to_owned();
        self
    }

    /// Sets the routing key for the binding.
    pub fn routing_key(mut self, key: &str) -> Self {
        self.routing_key = key.to_owned();
        self
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    pub fn exchange_name(&self) -> &str {
        &self.exchange_name
    }

    pub fn key(&self) -> &str {
        &self.routing_key
    }
}
