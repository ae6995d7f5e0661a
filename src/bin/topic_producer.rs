// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

use clap::Parser;
use rabbitmq_topology::{
    cli::{self, TopicProducerArgs},
    errors::AmqpError,
    logging,
    topology::{TopicTopology, Topology},
};

#[tokio::main]
async fn main() -> Result<(), AmqpError> {
    let args = TopicProducerArgs::parse();
    logging::init();

    let topology = Topology::from(TopicTopology::new(&args.exchange));
    cli::produce(
        &args.config,
        &topology,
        cli::TOPIC_PAYLOAD,
        Some(&args.routing_key),
    )
    .await
}
