// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

use clap::Parser;
use rabbitmq_topology::{
    cli::{self, TopicConsumerArgs},
    errors::AmqpError,
    logging,
    topology::{TopicTopology, Topology},
};

#[tokio::main]
async fn main() -> Result<(), AmqpError> {
    let args = TopicConsumerArgs::parse();
    logging::init();

    let topology = Topology::from(TopicTopology::new(&args.exchange).routing_keys(args.routing_keys));
    cli::consume(&args.config, &topology).await
}
