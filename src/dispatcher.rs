// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Delivery Dispatcher
//!
//! Holds the callback registered by a consumer and hands every delivery to it.
//! Callbacks run synchronously on the task that received the delivery.

use crate::{otel, topology::ChannelId, transport::Delivery};
use opentelemetry::{
    global,
    trace::{Span, Status},
};

/// Callback invoked once per consumed message with the channel id, the
/// consumer tag and the delivery itself.
pub type ConsumerCallback = Box<dyn FnMut(ChannelId, &str, &Delivery) + Send>;

/// Boxes a closure into a `ConsumerCallback`.
pub fn callback<F>(f: F) -> ConsumerCallback
where
    F: FnMut(ChannelId, &str, &Delivery) + Send + 'static,
{
    Box::new(f)
}

/// A callback that ignores every delivery.
pub fn noop() -> ConsumerCallback {
    Box::new(|_, _, _| {})
}

pub struct Dispatcher {
    callback: ConsumerCallback,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Dispatcher { callback: noop() }
    }
}

impl Dispatcher {
    /// Replaces the registered callback.
    pub fn register(&mut self, callback: ConsumerCallback) {
        self.callback = callback;
    }

    /// Invokes the registered callback inside a consumer span.
    pub fn dispatch(&mut self, delivery: &Delivery) {
        let tracer = global::tracer("amqp consumer");
        let (_ctx, mut span) = otel::new_span(&delivery.headers, &tracer, &delivery.routing_key);

        (self.callback)(delivery.channel, &delivery.consumer_tag, delivery);

        span.set_status(Status::Ok);
        span.end();
    }
}
