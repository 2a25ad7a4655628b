//! Pyramid opening integration tests.
//!
//! Tests verify:
//! - Multiscales attributes and level arrays are loaded and sorted
//! - Invalid pyramids are rejected with the matching error
//! - Separate per-scale grids read their own level
//! - Compressed arrays open and decode
//! - Pyramids open from a directory on disk

use std::collections::HashMap;

use bytes::Bytes;
use serde_json::{json, Value};

use ngff_streamer::{ChunkedArray, FsStore, OpenOptions, Pyramid, PyramidError};

use super::test_utils::{
    expected_values, three_level_pyramid, value_at, PyramidBuilder, TrackingStore,
};

// =============================================================================
// Opening
// =============================================================================

#[tokio::test]
async fn test_open_sorts_levels_coarsest_first() {
    let store = three_level_pyramid().build();
    let pyramid = Pyramid::open(store, OpenOptions::default()).await.unwrap();

    assert_eq!(pyramid.name(), "synthetic");
    assert_eq!(pyramid.scales(), vec!["0", "1", "2"]);

    let paths: Vec<&str> = pyramid.levels().iter().map(|l| l.path()).collect();
    assert_eq!(paths, vec!["2", "1", "0"]);

    // nanometer is 10 angstrom
    assert_eq!(pyramid.levels()[2].pixel_size(), [10.0, 10.0, 10.0]);
    assert_eq!(pyramid.levels()[0].pixel_size(), [40.0, 40.0, 40.0]);
    assert_eq!(pyramid.levels()[0].array().shape(), [4, 4, 4]);
    assert_eq!(pyramid.levels()[0].array().chunk_shape(), Some([4, 4, 4]));
    assert_eq!(pyramid.factors().unwrap(), vec![4, 2, 1]);
}

#[tokio::test]
async fn test_open_with_explicit_name() {
    let store = three_level_pyramid().build();
    let options = OpenOptions {
        name: Some("volume".to_string()),
        ..Default::default()
    };
    let pyramid = Pyramid::open(store, options).await.unwrap();
    assert_eq!(pyramid.name(), "volume");
}

#[tokio::test]
async fn test_open_nested_ome_attributes() {
    let store = three_level_pyramid().nested_under_ome().build();
    let pyramid = Pyramid::open(store, OpenOptions::default()).await.unwrap();
    assert_eq!(pyramid.levels().len(), 3);
}

#[tokio::test]
async fn test_unknown_unit_falls_back_to_base_unit() {
    let store = three_level_pyramid().unit(Some("furlong")).build();
    let pyramid = Pyramid::open(store, OpenOptions::default()).await.unwrap();
    assert_eq!(pyramid.levels()[2].pixel_size(), [1.0, 1.0, 1.0]);
    assert!(pyramid.multiplexed().is_ok());
}

#[tokio::test]
async fn test_missing_attributes() {
    let store = TrackingStore::new(HashMap::new());
    let result = Pyramid::open(store, OpenOptions::default()).await;
    assert!(matches!(result, Err(PyramidError::NoMultiscales(_))));
}

#[tokio::test]
async fn test_attributes_without_multiscales() {
    let mut objects = HashMap::new();
    objects.insert(".zattrs".to_string(), Bytes::from(r#"{"foo": 1}"#));
    let result = Pyramid::open(TrackingStore::new(objects), OpenOptions::default()).await;
    assert!(matches!(result, Err(PyramidError::NoMultiscales(_))));
}

#[tokio::test]
async fn test_malformed_attributes() {
    let mut objects = HashMap::new();
    objects.insert(".zattrs".to_string(), Bytes::from("{not json"));
    let result = Pyramid::open(TrackingStore::new(objects), OpenOptions::default()).await;
    assert!(matches!(result, Err(PyramidError::Metadata(_))));
}

#[tokio::test]
async fn test_channel_axis_rejected() {
    let store = three_level_pyramid().axis_type(0, "channel").build();
    let result = Pyramid::open(store, OpenOptions::default()).await;
    assert!(matches!(result, Err(PyramidError::UnsupportedAxis(_))));
}

#[tokio::test]
async fn test_time_axis_rejected() {
    let store = three_level_pyramid().axis_type(0, "time").build();
    let result = Pyramid::open(store, OpenOptions::default()).await;
    assert!(matches!(result, Err(PyramidError::UnsupportedAxis(_))));
}

#[tokio::test]
async fn test_missing_level_array() {
    let mut objects = three_level_pyramid().objects();
    objects.remove("1/.zarray");
    let result = Pyramid::open(TrackingStore::new(objects), OpenOptions::default()).await;
    assert!(matches!(result, Err(PyramidError::Metadata(_))));
}

// =============================================================================
// Multiplexer Construction
// =============================================================================

#[tokio::test]
async fn test_non_integer_ratio_rejected() {
    let store = PyramidBuilder::new(16)
        .level("0", 1, 4)
        .level_with_scale("1", 2, [2.5, 2.5, 2.5], 4)
        .build();
    let pyramid = Pyramid::open(store, OpenOptions::default()).await.unwrap();

    assert!(matches!(
        pyramid.multiplexed(),
        Err(PyramidError::UnsupportedPyramid { reason: "non-integer ratio", .. })
    ));
    // Levels can still be opened individually
    assert_eq!(pyramid.level_grids(&["0", "1"]).unwrap().len(), 2);
}

#[tokio::test]
async fn test_non_nested_factors_rejected() {
    let store = PyramidBuilder::new(16)
        .level("0", 1, 4)
        .level_with_scale("1", 3, [3.0, 3.0, 3.0], 4)
        .level_with_scale("2", 4, [4.0, 4.0, 4.0], 4)
        .build();
    let pyramid = Pyramid::open(store, OpenOptions::default()).await.unwrap();
    assert!(matches!(
        pyramid.multiplexed(),
        Err(PyramidError::UnsupportedPyramid { .. })
    ));
}

#[tokio::test]
async fn test_anisotropic_ratio_rejected() {
    let store = PyramidBuilder::new(16)
        .level("0", 1, 4)
        .level_with_scale("1", 2, [2.0, 2.0, 4.0], 4)
        .build();
    let pyramid = Pyramid::open(store, OpenOptions::default()).await.unwrap();
    assert!(matches!(
        pyramid.multiplexed(),
        Err(PyramidError::UnsupportedPyramid { reason: "anisotropic", .. })
    ));
}

// =============================================================================
// Separate Level Grids
// =============================================================================

#[tokio::test]
async fn test_level_grids() {
    let store = three_level_pyramid().build();
    let pyramid = Pyramid::open(store, OpenOptions::default()).await.unwrap();

    let grids = pyramid.level_grids(&["0", "1"]).unwrap();
    assert_eq!(grids.len(), 2);
    assert_eq!(grids[0].name(), "synthetic - 1");
    assert_eq!(grids[0].size(), [8, 8, 8]);
    assert_eq!(grids[1].name(), "synthetic - 0");
    assert_eq!(grids[1].size(), [16, 16, 16]);

    // Level "1" sample (z=1, y=2, x=3) is full-resolution (2, 4, 6)
    let block = grids[0]
        .read([3, 2, 1], Some([1, 1, 1]), [1, 1, 1])
        .await
        .unwrap();
    assert_eq!(block.values::<u16>().unwrap(), vec![value_at(2, 4, 6)]);
}

#[tokio::test]
async fn test_unknown_scale() {
    let store = three_level_pyramid().build();
    let pyramid = Pyramid::open(store, OpenOptions::default()).await.unwrap();

    assert!(matches!(
        pyramid.level_grids(&["0", "7"]),
        Err(PyramidError::ScaleNotAvailable(scale)) if scale == "7"
    ));
    assert!(matches!(
        pyramid.level("7"),
        Err(PyramidError::ScaleNotAvailable(_))
    ));
}

#[tokio::test]
async fn test_missing_chunk_reads_fill_value() {
    let store = three_level_pyramid().without_chunk("0/0/0/0").build();
    let pyramid = Pyramid::open(store, OpenOptions::default()).await.unwrap();
    let grids = pyramid.level_grids(&["0"]).unwrap();

    let block = grids[0]
        .read([2, 2, 2], Some([4, 1, 1]), [1, 1, 1])
        .await
        .unwrap();
    // x = 2, 3 fall in the missing chunk, x = 4, 5 in the next one
    assert_eq!(
        block.values::<u16>().unwrap(),
        vec![0, 0, value_at(2, 2, 4), value_at(2, 2, 5)]
    );
}

// =============================================================================
// Compressed Chunks
// =============================================================================

#[tokio::test]
async fn test_zstd_chunks_decode() {
    let store = three_level_pyramid().zstd().build();
    let pyramid = Pyramid::open(store.clone(), OpenOptions::default())
        .await
        .unwrap();
    let grid = pyramid.multiplexed().unwrap();

    for s in [1, 2, 4] {
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
async fn test_blosc_arrays_open() {
    let mut objects = three_level_pyramid().objects();
    objects.retain(|key, _| key == ".zattrs" || key.ends_with("/.zarray"));
    for path in ["0", "1", "2"] {
        let key = format!("{}/.zarray", path);
        let mut zarray: Value = serde_json::from_slice(&objects[&key]).unwrap();
        zarray["compressor"] = json!({
            "id": "blosc",
            "cname": "zstd",
            "clevel": 5,
            "shuffle": 1,
            "blocksize": 0,
        });
        objects.insert(key, Bytes::from(zarray.to_string()));
    }

    let pyramid = Pyramid::open(TrackingStore::new(objects), OpenOptions::default())
        .await
        .unwrap();
    let block = pyramid
        .multiplexed()
        .unwrap()
        .read([0, 0, 0], Some([8, 8, 8]), [2, 2, 2])
        .await
        .unwrap();
    // No chunks were written, so every sample is the fill value
    assert_eq!(block.shape(), [4, 4, 4]);
    assert!(block.values::<u16>().unwrap().iter().all(|&v| v == 0));
}

#[tokio::test]
async fn test_unknown_compressor_rejected() {
    let mut objects = three_level_pyramid().objects();
    let mut zarray: Value = serde_json::from_slice(&objects["1/.zarray"]).unwrap();
    zarray["compressor"] = json!({"id": "no-such-codec"});
    objects.insert("1/.zarray".to_string(), Bytes::from(zarray.to_string()));

    let result = Pyramid::open(TrackingStore::new(objects), OpenOptions::default()).await;
    assert!(matches!(result, Err(PyramidError::Metadata(_))));
}

// =============================================================================
// Filesystem Store
// =============================================================================

#[tokio::test]
async fn test_open_from_directory() {
    let dir = tempfile::tempdir().unwrap();
    three_level_pyramid().write_to(dir.path());

    let pyramid = Pyramid::open(FsStore::new(dir.path()), OpenOptions::default())
        .await
        .unwrap();
    let grid = pyramid.multiplexed().unwrap();

    let block = grid
        .read([0, 0, 0], Some([16, 16, 16]), [2, 2, 2])
        .await
        .unwrap();
    assert_eq!(block.shape(), [8, 8, 8]);
    assert_eq!(
        block.values::<u16>().unwrap(),
        expected_values([0, 0, 0], [16, 16, 16], [2, 2, 2])
    );
}
