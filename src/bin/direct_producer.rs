// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

use clap::Parser;
use rabbitmq_topology::{
    cli::{self, QueueArgs},
    errors::AmqpError,
    logging,
    topology::{DirectQueue, Topology},
};

#[tokio::main]
async fn main() -> Result<(), AmqpError> {
    let args = QueueArgs::parse();
    logging::init();

    let topology = Topology::from(DirectQueue::new(&args.queue));
    let payload = cli::direct_payload(cli::random_id((1 << 17) - 1))?;

    cli::produce(&args.config, &topology, &payload, None).await
}
