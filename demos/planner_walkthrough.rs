use kafka_task_planner::*;

use std::collections::HashSet;
use tracing_subscriber::prelude::*;

fn main() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    println!("Kafka Execution Task Planner - Walkthrough\n");

    let cluster = create_sample_cluster();
    let proposals = create_sample_proposals();

    let config = PlannerConfig::postpone_under_replicated()
        .with_leadership_batch_size(2)
        .with_movements_per_broker(1);

    let mut planner = match ExecutionTaskPlanner::from_config(&config, &StrategyRegistry::new()) {
        Ok(planner) => planner,
        Err(e) => {
            eprintln!("Failed to build planner: {}", e);
            return;
        }
    };
    println!("Strategy chain: {:?}", planner.strategy_chain().names());

    if let Err(e) = planner.add_proposals(proposals, &cluster) {
        eprintln!("Proposals rejected: {}", e);
        return;
    }

    println!(
        "Pending: {} replica movements ({} bytes), {} leadership movements\n",
        planner.remaining_replica_movements().len(),
        planner.remaining_data_to_move_bytes(),
        planner.remaining_leadership_movements().len()
    );

    // Every tick hands out what the brokers can take, then drains leadership moves
    let ready = cluster.ready_brokers(config.max_partition_movements_per_broker);
    let mut tick = 1;
    loop {
        let replica_batch = planner.get_replica_movement_tasks(&ready, &HashSet::new());
        let leader_batch = planner.next_leadership_batch();
        if replica_batch.is_empty() && leader_batch.is_empty() {
            break;
        }

        println!("=== Tick {} ===", tick);
        for task in replica_batch.iter().chain(leader_batch.iter()) {
            println!("  {}", task);
        }
        tick += 1;
    }

    println!(
        "\nDone: {} replica and {} leadership movements left",
        planner.remaining_replica_movements().len(),
        planner.remaining_leadership_movements().len()
    );
}

fn create_sample_cluster() -> ClusterModel {
    let mut cluster = ClusterModel::new();
    for id in 0..4 {
        cluster.add_broker(Broker::new(id));
    }
    cluster.add_broker(Broker::dead(4));

    cluster.add_partition(
        TopicPartition::new("orders", 0),
        PartitionState {
            replicas: vec![0, 2],
            in_sync_replicas: vec![0],
            leader: Some(0),
        },
    );
    cluster.add_partition(TopicPartition::new("orders", 1), PartitionState::fully_in_sync(vec![1, 3]));
    cluster.add_partition(TopicPartition::new("orders", 2), PartitionState::fully_in_sync(vec![2, 1]));
    cluster.add_partition(TopicPartition::new("clicks", 0), PartitionState::fully_in_sync(vec![1, 0]));
    cluster.add_partition(TopicPartition::new("clicks", 1), PartitionState::fully_in_sync(vec![3, 2]));
    cluster
}

fn create_sample_proposals() -> Vec<ExecutionProposal> {
    const MB: u64 = 1024 * 1024;
    vec![
        ExecutionProposal::new(TopicPartition::new("orders", 0), 400 * MB, vec![0, 2], vec![2, 1]),
        ExecutionProposal::new(TopicPartition::new("orders", 1), 300 * MB, vec![1, 3], vec![3, 2]),
        ExecutionProposal::new(TopicPartition::new("orders", 2), 200 * MB, vec![2, 1], vec![1, 3]),
        ExecutionProposal::new(TopicPartition::new("clicks", 0), 0, vec![1, 0], vec![0, 1]),
        ExecutionProposal::new(TopicPartition::new("clicks", 1), 0, vec![3, 2], vec![2, 3]),
    ]
}
