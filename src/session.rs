// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Broker Session
//!
//! Login, channel pinning and teardown shared by producers and consumers.
//! A session owns its transport and pins at most one channel; opening the
//! pinned channel again is a no-op and pinning a different one is an error.

use crate::{
    configs::ConnectionEndpoint, errors::AmqpError, topology::ChannelId, transport::Transport,
};
use tracing::{debug, error, warn};

pub struct Session<T: Transport> {
    transport: T,
    logged_in: bool,
    channel: Option<ChannelId>,
}

impl<T: Transport> Session<T> {
    pub fn new(transport: T) -> Session<T> {
        Session {
            transport,
            logged_in: false,
            channel: None,
        }
    }

    /// Connects and authenticates against `endpoint`.
    pub async fn login(&mut self, endpoint: &ConnectionEndpoint) -> Result<(), AmqpError> {
        debug!(
            host = %endpoint.hostname,
            port = endpoint.port,
            vhost = %endpoint.vhost,
            "logging in"
        );

        self.transport.connect(endpoint).await?;
        self.logged_in = true;

        Ok(())
    }

    /// Opens `channel` once and pins it for the lifetime of the session.
    pub async fn open_channel(&mut self, channel: ChannelId) -> Result<(), AmqpError> {
        match self.channel {
            Some(pinned) if pinned == channel => {
                debug!(channel = channel.get(), "channel already open");
                return Ok(());
            }
            Some(pinned) => {
                error!(
                    pinned = pinned.get(),
                    requested = channel.get(),
                    "session is pinned to another channel"
                );
                return Err(AmqpError::ChannelError(format!(
                    "session is pinned to channel {}, not {}",
                    pinned, channel
                )));
            }
            None => {}
        }

        if !self.logged_in {
            error!("channel requested before login");
            return Err(AmqpError::ChannelError("session is not logged in".to_owned()));
        }

        self.transport.open_channel(channel).await?;
        self.channel = Some(channel);

        Ok(())
    }

    #[cfg(test)]
    pub fn channel(&self) -> Option<ChannelId> {
        self.channel
    }

    pub fn transport(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Closes the pinned channel and the connection.
    ///
    /// Teardown is best effort: failures are logged and swallowed.
    pub async fn close(&mut self) {
        if let Some(channel) = self.channel.take() {
            if let Err(err) = self.transport.close_channel(channel).await {
                warn!(error = err.to_string(), channel = channel.get(), "failure to close channel");
            }
        }

        if self.logged_in {
            self.logged_in = false;
            if let Err(err) = self.transport.close().await {
                warn!(error = err.to_string(), "failure to close connection");
            }
        }
    }
}
