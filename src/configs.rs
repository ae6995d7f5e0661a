// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Connection Configuration
//!
//! The `ConnectionEndpoint` describes where the broker lives and how to log in.
//! It is usually read from a JSON file shaped like:
//!
//! ```json
//! { "hostname": "localhost", "username": "guest", "password": "guest", "vhost": "/", "port": 5672 }
//! ```

use crate::errors::AmqpError;
use lapin::uri::{AMQPAuthority, AMQPScheme, AMQPUri, AMQPUserInfo};
use serde::Deserialize;
use std::{fmt, fs, path::Path};
use tracing::{debug, error};

/// Default location of the connection configuration file used by the programs.
pub const DEFAULT_CONFIG_PATH: &str = "config/config.json";

/// Hostname, credentials, virtual host and port of a broker.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct ConnectionEndpoint {
    pub hostname: String,
    pub username: String,
    pub password: String,
    pub vhost: String,
    pub port: u16,
}

impl ConnectionEndpoint {
    /// Creates an endpoint for the given host and port with the RabbitMQ
    /// default credentials and virtual host.
    pub fn new(hostname: &str, port: u16) -> ConnectionEndpoint {
        ConnectionEndpoint {
            hostname: hostname.to_owned(),
            username: "guest".to_owned(),
            password: "guest".to_owned(),
            vhost: "/".to_owned(),
            port,
        }
    }

    /// Sets the login credentials.
    pub fn credentials(mut self, username: &str, password: &str) -> Self {
        self.username = username.to_owned();
        self.password = password.to_owned();
        self
    }

    /// Sets the virtual host.
    pub fn vhost(mut self, vhost: &str) -> Self {
        self.vhost = vhost.to_owned();
        self
    }

    /// Loads an endpoint from a JSON file.
    ///
    /// # Errors
    /// Returns `AmqpError::ConfigError` when the file can not be read or does
    /// not contain every endpoint field.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<ConnectionEndpoint, AmqpError> {
        let path = path.as_ref();
        debug!(path = %path.display(), "loading connection configuration");

        let raw = match fs::read_to_string(path) {
            Ok(raw) => Ok(raw),
            Err(err) => {
                error!(error = err.to_string(), path = %path.display(), "failure to read configuration");
                Err(AmqpError::ConfigError(format!("{}: {}", path.display(), err)))
            }
        }?;

        Self::from_json(&raw)
    }

    /// Parses an endpoint from a JSON document.
    pub fn from_json(raw: &str) -> Result<ConnectionEndpoint, AmqpError> {
        serde_json::from_str(raw).map_err(|err| {
            error!(error = err.to_string(), "failure to parse configuration");
            AmqpError::ConfigError(err.to_string())
        })
    }

    /// Builds the structured AMQP URI handed to the client library.
    ///
    /// Fields are passed as-is, so credentials and the virtual host need no
    /// escaping.
    pub fn amqp_uri(&self) -> AMQPUri {
        AMQPUri {
            scheme: AMQPScheme::AMQP,
            authority: AMQPAuthority {
                userinfo: AMQPUserInfo {
                    username: self.username.clone(),
                    password: self.password.clone(),
                },
                host: self.hostname.clone(),
                port: self.port,
            },
            vhost: self.vhost.clone(),
            ..AMQPUri::default()
        }
    }
}

impl fmt::Debug for ConnectionEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionEndpoint")
            .field("hostname", &self.hostname)
            .field("username", &self.username)
            .field("password", &"***")
            .field("vhost", &self.vhost)
            .field("port", &self.port)
            .finish()
    }
}
