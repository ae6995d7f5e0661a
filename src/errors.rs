// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Error Types for the Topology Client
//!
//! This module provides the error type shared by every layer of the crate.
//! The `AmqpError` enum names the operation that failed (connect, login,
//! channel open, declaration, binding, publishing, consuming) together with the
//! reason reported by the broker or the client library.

use thiserror::Error;

/// Represents errors that can occur while driving a messaging topology.
///
/// Every transport failure is mapped to exactly one variant at the point where
/// it happens and is surfaced to the caller without retries.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum AmqpError {
    /// Error establishing a connection to the RabbitMQ server
    #[error("failure to connect `{0}`")]
    ConnectionError(String),

    /// The broker rejected the supplied credentials
    #[error("failure to authenticate")]
    AuthenticationError,

    /// Error opening or closing a channel
    #[error("failure to open the channel `{0}`")]
    ChannelError(String),

    /// Channel ids must be positive
    #[error("channel id must be a positive integer")]
    InvalidChannelId,

    /// Error declaring an exchange with the given name
    #[error("failure to declare an exchange `{0}`")]
    DeclareExchangeError(String),

    /// Error declaring a queue with the given name
    #[error("failure to declare a queue `{0}`")]
    DeclareQueueError(String),

    /// Error binding a queue to an exchange
    #[error("failure to binding exchange `{0}` to queue `{1}`")]
    BindingExchangeToQueueError(String, String),

    /// Error publishing a message
    #[error("failure to publish `{0}`")]
    PublishingError(String),

    /// Publish or consume precondition: `send` or `consume_once` was called
    /// before a matching `prepare`
    #[error("failure to publish or consume: topology was not prepared")]
    NotPrepared,

    /// Error registering a consumer on a queue
    #[error("failure to declare consumer `{0}`")]
    ConsumerDeclarationError(String),

    /// Error receiving a message
    #[error("failure to consume message `{0}`")]
    ConsumerError(String),

    /// Error loading the connection configuration
    #[error("failure to load configuration `{0}`")]
    ConfigError(String),
}
