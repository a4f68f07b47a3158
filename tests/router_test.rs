use pretty_assertions::assert_eq;

use ratings_partition::{
    build_range_partitions, build_round_robin_partitions, route_range_insert,
    route_round_robin_insert, PartitionConfig, PartitionError, RatingRecord, Store, Strategy,
};

const BASE: &str = "ratings";

fn setup(config: PartitionConfig) -> Store {
    let store = Store::open(config).expect("Failed to open in-memory store");
    let unique = store.config().unique_ratings;
    let schema = store.config().base_schema.clone();
    store.create_rating_table(&schema, BASE, unique, true).unwrap();
    store
}

fn base_count(store: &Store) -> u64 {
    store.count_rows(&store.config().base_schema, BASE).unwrap()
}

#[test]
fn test_range_insert_without_partitions() {
    let store = setup(PartitionConfig::default());
    let err = route_range_insert(&store, BASE, &RatingRecord::new(1, 1, 3.0)).unwrap_err();
    assert!(matches!(
        err,
        PartitionError::NoPartitions {
            strategy: Strategy::Range
        }
    ));
    assert_eq!(base_count(&store), 0);
}

#[test]
fn test_round_robin_insert_without_partitions() {
    let store = setup(PartitionConfig::default());
    // Range partitions do not count for the round-robin router.
    build_range_partitions(&store, BASE, 2).unwrap();

    let err = route_round_robin_insert(&store, BASE, &RatingRecord::new(1, 1, 3.0)).unwrap_err();
    assert!(matches!(
        err,
        PartitionError::NoPartitions {
            strategy: Strategy::RoundRobin
        }
    ));
    assert_eq!(base_count(&store), 0);
}

#[test]
fn test_dual_write_reaches_base_table() {
    let store = setup(PartitionConfig::default());
    build_range_partitions(&store, BASE, 2).unwrap();

    let routed = route_range_insert(&store, BASE, &RatingRecord::new(7, 8, 4.5)).unwrap();
    assert_eq!(routed.partition, 1);
    assert_eq!(routed.table, "range_part1");
    assert!(routed.base_written);
    assert_eq!(base_count(&store), 1);
}

#[test]
fn test_duplicate_key_is_rejected() {
    let store = setup(PartitionConfig::default());
    build_round_robin_partitions(&store, BASE, 2).unwrap();

    route_round_robin_insert(&store, BASE, &RatingRecord::new(3, 4, 1.0)).unwrap();
    let err = route_round_robin_insert(&store, BASE, &RatingRecord::new(3, 4, 2.0)).unwrap_err();
    assert!(matches!(
        err,
        PartitionError::DuplicateRecord {
            user_id: 3,
            item_id: 4
        }
    ));
    assert_eq!(base_count(&store), 1);

    let schema = store.config().partition_schema.clone();
    let in_partitions = store.count_rows(&schema, "rrobin_part0").unwrap()
        + store.count_rows(&schema, "rrobin_part1").unwrap();
    assert_eq!(in_partitions, 1);
}

#[test]
fn test_partitions_only_without_dual_write() {
    let store = setup(PartitionConfig {
        dual_write: false,
        ..Default::default()
    });
    build_range_partitions(&store, BASE, 3).unwrap();

    let record = RatingRecord::new(1, 1, 0.5);
    let first = route_range_insert(&store, BASE, &record).unwrap();
    let second = route_range_insert(&store, BASE, &record).unwrap();
    assert!(!first.base_written);
    assert_eq!(first.partition, second.partition);
    assert_eq!(base_count(&store), 0);
    assert_eq!(
        store
            .count_rows(&store.config().partition_schema, &first.table)
            .unwrap(),
        2
    );
}

#[test]
fn test_partition_count_is_rediscovered() {
    let store = setup(PartitionConfig::default());
    build_range_partitions(&store, BASE, 2).unwrap();
    let routed = route_range_insert(&store, BASE, &RatingRecord::new(1, 1, 4.0)).unwrap();
    assert_eq!(routed.partition, 1);

    build_range_partitions(&store, BASE, 4).unwrap();
    let routed = route_range_insert(&store, BASE, &RatingRecord::new(1, 2, 4.0)).unwrap();
    assert_eq!(routed.partition, 3);
}

#[test]
fn test_invalid_rating_is_rejected() {
    let store = setup(PartitionConfig::default());
    build_range_partitions(&store, BASE, 2).unwrap();

    for rating in [-0.5, 5.5, f64::NAN] {
        let err = route_range_insert(&store, BASE, &RatingRecord::new(1, 1, rating)).unwrap_err();
        assert!(matches!(err, PartitionError::MalformedRecord { .. }), "{err}");
    }
    assert_eq!(base_count(&store), 0);
}
