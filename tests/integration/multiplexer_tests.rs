//! Multiplexed read integration tests.
//!
//! Tests verify:
//! - Reads through the multiplexer equal strided full-resolution reads
//! - Only the selected level's chunks are fetched
//! - Invalid steps fail per request without breaking the multiplexer
//! - Reads are clamped at the grid boundary
//! - Steps reaching past the grid return the origin sample

use ngff_streamer::{
    GridSource, OpenOptions, Pyramid, ReadError, DEFAULT_LEVEL_STEP, DEFAULT_MULTIPLEXED_STEP,
};

use super::test_utils::{expected_values, three_level_pyramid, value_at, TrackingStore};

async fn open_three_levels() -> (TrackingStore, Pyramid<TrackingStore>) {
    let store = three_level_pyramid().build();
    let pyramid = Pyramid::open(store.clone(), OpenOptions::default())
        .await
        .unwrap();
    store.reset_tracking();
    (store, pyramid)
}

// =============================================================================
// Exact-Stride Equivalence
// =============================================================================

#[tokio::test]
async fn test_isotropic_steps_match_full_resolution() {
    let (_store, pyramid) = open_three_levels().await;
    let grid = pyramid.multiplexed().unwrap();

    for s in [1, 2, 3, 4, 6, 8, 16] {
        let block = grid
            .read([0, 0, 0], Some([16, 16, 16]), [s, s, s])
            .await
            .unwrap();
        assert_eq!(
            block.values::<u16>().unwrap(),
            expected_values([0, 0, 0], [16, 16, 16], [s, s, s]),
            "step {}",
            s
        );
    }
}

#[tokio::test]
async fn test_anisotropic_step_matches_full_resolution() {
    let (store, pyramid) = open_three_levels().await;
    let grid = pyramid.multiplexed().unwrap();

    // ijk (2, 2, 4) is storage (4, 2, 2); served by level "1" with residual (1, 1, 2)
    let strategy = grid.strategy([2, 2, 4]).unwrap();
    assert_eq!(grid.levels()[strategy.level].array().path(), "1");
    assert_eq!(strategy.residual_step, [1, 1, 2]);

    let block = grid
        .read([0, 0, 0], Some([16, 16, 16]), [2, 2, 4])
        .await
        .unwrap();
    assert_eq!(block.shape(), [4, 8, 8]);
    assert_eq!(
        block.values::<u16>().unwrap(),
        expected_values([0, 0, 0], [16, 16, 16], [4, 2, 2])
    );
    assert!(store.fetched_with_prefix("0/").is_empty());
    assert!(store.fetched_with_prefix("2/").is_empty());
}

#[tokio::test]
async fn test_steep_anisotropic_step_uses_finest_level() {
    let (store, pyramid) = open_three_levels().await;
    let grid = pyramid.multiplexed().unwrap();

    let block = grid
        .read([0, 0, 0], Some([16, 16, 16]), [1, 1, 8])
        .await
        .unwrap();
    assert_eq!(
        block.values::<u16>().unwrap(),
        expected_values([0, 0, 0], [16, 16, 16], [8, 1, 1])
    );
    assert!(store.fetched_with_prefix("1/").is_empty());
    assert!(store.fetched_with_prefix("2/").is_empty());
}

// =============================================================================
// Coordinate Remapping
// =============================================================================

#[tokio::test]
async fn test_coarsest_level_round_trip() {
    let (store, pyramid) = open_three_levels().await;
    let grid = pyramid.multiplexed().unwrap();

    let strategy = grid.strategy([4, 4, 4]).unwrap();
    assert_eq!(strategy.level, 0);
    assert_eq!(strategy.factor, [4, 4, 4]);
    assert_eq!(strategy.residual_step, [1, 1, 1]);

    let block = grid
        .read([8, 8, 8], Some([4, 4, 4]), [4, 4, 4])
        .await
        .unwrap();

    // Origin 8 / 4 = 2 and size 4 / 4 = 1 in the coarsest level
    assert_eq!(block.shape(), [1, 1, 1]);
    assert_eq!(block.values::<u16>().unwrap(), vec![value_at(8, 8, 8)]);
    assert_eq!(store.fetched_with_prefix("2/"), vec!["2/0/0/0".to_string()]);
    assert_eq!(store.fetch_count(), 1);
}

#[tokio::test]
async fn test_size_widened_to_step() {
    let (_store, pyramid) = open_three_levels().await;
    let grid = pyramid.multiplexed().unwrap();

    let block = grid
        .read([4, 4, 4], Some([1, 1, 1]), [4, 4, 4])
        .await
        .unwrap();
    assert_eq!(block.values::<u16>().unwrap(), vec![value_at(4, 4, 4)]);
}

#[tokio::test]
async fn test_step_past_grid_reads_origin_sample() {
    let (store, pyramid) = open_three_levels().await;
    let grid = pyramid.multiplexed().unwrap();

    let block = grid
        .read([1, 0, 0], Some([4, 4, 4]), [u64::MAX; 3])
        .await
        .unwrap();
    assert_eq!(block.shape(), [1, 1, 1]);
    assert_eq!(block.values::<u16>().unwrap(), vec![value_at(0, 0, 1)]);
    assert_eq!(store.fetched_with_prefix("0/"), vec!["0/0/0/0".to_string()]);
}

#[tokio::test]
async fn test_boundary_clamping() {
    let (_store, pyramid) = open_three_levels().await;
    let grid = pyramid.multiplexed().unwrap();

    let block = grid
        .read([15, 0, 0], Some([100, 100, 100]), [1, 1, 1])
        .await
        .unwrap();
    assert_eq!(block.shape(), [16, 16, 1]);
    assert_eq!(
        block.values::<u16>().unwrap(),
        expected_values([0, 0, 15], [16, 16, 16], [1, 1, 1])
    );
}

#[tokio::test]
async fn test_initial_region() {
    let (_store, pyramid) = open_three_levels().await;
    let grid = pyramid.multiplexed().unwrap();

    let region = grid.initial_region(DEFAULT_MULTIPLEXED_STEP);
    assert_eq!(region.origin, [0, 0, 8]);
    assert_eq!(region.size, [16, 16, 1]);

    let block = grid
        .read(region.origin, Some(region.size), region.step)
        .await
        .unwrap();
    assert_eq!(block.shape(), [1, 4, 4]);
    assert_eq!(
        block.values::<u16>().unwrap(),
        expected_values([8, 0, 0], [9, 16, 16], [4, 4, 4])
    );

    let levels = pyramid.level_grids(&["0"]).unwrap();
    let region = levels[0].initial_region(DEFAULT_LEVEL_STEP);
    assert_eq!(region.step, [1, 1, 1]);
    assert_eq!(region.origin, [0, 0, 8]);
}

// =============================================================================
// Errors and Idempotence
// =============================================================================

#[tokio::test]
async fn test_invalid_step_keeps_multiplexer_usable() {
    let (_store, pyramid) = open_three_levels().await;
    let grid = pyramid.multiplexed().unwrap();

    let result = grid.read([0, 0, 0], Some([8, 8, 8]), [2, 3, 2]).await;
    assert!(matches!(result, Err(ReadError::InvalidStep { .. })));

    let result = grid.read([0, 0, 0], Some([8, 8, 8]), [0, 1, 1]).await;
    assert!(matches!(result, Err(ReadError::InvalidStep { .. })));

    let block = grid
        .read([0, 0, 0], Some([8, 8, 8]), [2, 2, 2])
        .await
        .unwrap();
    assert_eq!(block.shape(), [4, 4, 4]);
}

#[tokio::test]
async fn test_repeated_reads_are_identical_and_cached() {
    let (store, pyramid) = open_three_levels().await;
    let grid = pyramid.multiplexed().unwrap();

    let first = grid
        .read([0, 0, 0], Some([16, 16, 16]), [1, 1, 1])
        .await
        .unwrap();
    let fetches = store.fetch_count();
    assert_eq!(fetches, 64);

    let second = grid
        .read([0, 0, 0], Some([16, 16, 16]), [1, 1, 1])
        .await
        .unwrap();
    assert_eq!(first, second);
    assert_eq!(store.fetch_count(), fetches);
}
