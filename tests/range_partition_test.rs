use pretty_assertions::assert_eq;

use ratings_partition::interval::{partition_for_rating, RangeBounds};
use ratings_partition::naming::partition_table_name;
use ratings_partition::{
    build_range_partitions, partition_count, route_range_insert, PartitionConfig, PartitionError,
    RatingRecord, Store, Strategy,
};

const BASE: &str = "ratings";

fn setup(config: PartitionConfig) -> Store {
    Store::open(config).expect("Failed to open in-memory store")
}

fn seed(store: &Store, rows: &[RatingRecord]) {
    let config = store.config();
    store
        .create_rating_table(&config.base_schema, BASE, config.unique_ratings, true)
        .unwrap();
    store.bulk_insert(&config.base_schema, BASE, rows).unwrap();
}

/// 220 rows with every half-star rating from 0 to 5, twenty times each.
fn sample_rows() -> Vec<RatingRecord> {
    (0..220)
        .map(|i| RatingRecord::new(i / 10, i, (i % 11) as f64 * 0.5))
        .collect()
}

fn partition_rows(store: &Store, index: usize) -> Vec<RatingRecord> {
    store
        .fetch_records(
            &store.config().partition_schema,
            &partition_table_name(Strategy::Range, index),
        )
        .unwrap()
}

#[test]
fn test_partitions_cover_base_disjointly() {
    let store = setup(PartitionConfig::default());
    seed(&store, &sample_rows());

    let report = build_range_partitions(&store, BASE, 3).unwrap();
    assert_eq!(report.partitions, 3);
    assert_eq!(report.total_rows(), 220);
    assert_eq!(partition_count(&store, Strategy::Range).unwrap(), 3);

    let mut total = 0;
    for index in 0..3 {
        let rows = partition_rows(&store, index);
        assert_eq!(rows.len() as u64, report.rows_per_partition[index]);
        let bounds = RangeBounds::for_partition(index, 3);
        for row in &rows {
            assert!(bounds.contains(row.rating), "{row:?} outside {bounds:?}");
            assert_eq!(partition_for_rating(row.rating, 3), index);
        }
        total += rows.len();
    }
    assert_eq!(total, 220);
}

#[test]
fn test_shared_boundary_goes_to_lower_partition() {
    let store = setup(PartitionConfig::default());
    seed(
        &store,
        &[
            RatingRecord::new(1, 1, 0.0),
            RatingRecord::new(1, 2, 2.5),
            RatingRecord::new(1, 3, 2.6),
            RatingRecord::new(1, 4, 5.0),
        ],
    );

    let report = build_range_partitions(&store, BASE, 2).unwrap();
    assert_eq!(report.rows_per_partition, vec![2, 2]);
    let low: Vec<f64> = partition_rows(&store, 0).iter().map(|r| r.rating).collect();
    assert_eq!(low, vec![0.0, 2.5]);
}

#[test]
fn test_single_partition_takes_everything() {
    let store = setup(PartitionConfig::default());
    seed(&store, &sample_rows());

    let report = build_range_partitions(&store, BASE, 1).unwrap();
    assert_eq!(report.rows_per_partition, vec![220]);
    assert_eq!(report.table_names(), vec!["range_part0".to_string()]);
}

#[test]
fn test_rebuild_is_idempotent() {
    let store = setup(PartitionConfig::default());
    seed(&store, &sample_rows());

    let first = build_range_partitions(&store, BASE, 4).unwrap();
    let second = build_range_partitions(&store, BASE, 4).unwrap();
    assert_eq!(first, second);
    assert_eq!(partition_count(&store, Strategy::Range).unwrap(), 4);
    assert_eq!(
        store.count_rows(&store.config().base_schema, BASE).unwrap(),
        220
    );
}

#[test]
fn test_smaller_rebuild_drops_stale_partitions() {
    let store = setup(PartitionConfig::default());
    seed(&store, &sample_rows());

    build_range_partitions(&store, BASE, 5).unwrap();
    let report = build_range_partitions(&store, BASE, 2).unwrap();
    assert_eq!(report.total_rows(), 220);
    assert_eq!(partition_count(&store, Strategy::Range).unwrap(), 2);
    assert!(!store
        .table_exists(&store.config().partition_schema, "range_part4")
        .unwrap());
}

#[test]
fn test_worker_limit_below_partition_count() {
    let store = setup(PartitionConfig {
        max_workers: Some(1),
        ..Default::default()
    });
    seed(&store, &sample_rows());

    let report = build_range_partitions(&store, BASE, 6).unwrap();
    assert_eq!(report.total_rows(), 220);
    assert_eq!(partition_count(&store, Strategy::Range).unwrap(), 6);
}

#[test]
fn test_rating_index_option() {
    let store = setup(PartitionConfig {
        rating_index: true,
        ..Default::default()
    });
    seed(&store, &sample_rows());

    let report = build_range_partitions(&store, BASE, 3).unwrap();
    assert_eq!(report.total_rows(), 220);
}

#[test]
fn test_router_agrees_with_builder() {
    let store = setup(PartitionConfig::default());
    seed(&store, &sample_rows());
    build_range_partitions(&store, BASE, 4).unwrap();

    for (k, step) in (0..=10).enumerate() {
        let rating = step as f64 * 0.5;
        let record = RatingRecord::new(10_000, k as i32, rating);
        let routed = route_range_insert(&store, BASE, &record).unwrap();
        assert_eq!(routed.partition, partition_for_rating(rating, 4));
        assert!(RangeBounds::for_partition(routed.partition, 4).contains(rating));
        assert!(partition_rows(&store, routed.partition).contains(&record));
    }
}

#[test]
fn test_invalid_requests() {
    let store = setup(PartitionConfig::default());

    let err = build_range_partitions(&store, BASE, 3).unwrap_err();
    assert!(matches!(err, PartitionError::BaseTableMissing { .. }), "{err}");

    seed(&store, &sample_rows());
    let err = build_range_partitions(&store, BASE, 0).unwrap_err();
    assert!(matches!(err, PartitionError::InvalidPartitionCount(0)), "{err}");
    assert_eq!(partition_count(&store, Strategy::Range).unwrap(), 0);
}
