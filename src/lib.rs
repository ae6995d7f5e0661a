// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

mod otel;
mod session;

pub mod channel;
pub mod cli;
pub mod configs;
pub mod consumer;
pub mod dispatcher;
pub mod errors;
pub mod exchange;
pub mod logging;
pub mod producer;
pub mod queue;
pub mod topology;
pub mod transport;
