// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

use clap::Parser;
use rabbitmq_topology::{
    cli::{self, ExchangeArgs},
    errors::AmqpError,
    logging,
    topology::{FanoutTopology, Topology},
};

#[tokio::main]
async fn main() -> Result<(), AmqpError> {
    let args = ExchangeArgs::parse();
    logging::init();

    let topology = Topology::from(FanoutTopology::new(&args.exchange));
    let payload = cli::pubsub_payload(cli::random_id(16383));

    cli::produce(&args.config, &topology, &payload, None).await
}
