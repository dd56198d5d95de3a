use super::*;

fn index_with(rows: &[[f32; 2]]) -> VectorIndex {
    let mut index = VectorIndex::new(2).expect("valid dimension");
    let vectors: Vec<Embedding> = rows.iter().map(|r| r.to_vec()).collect();
    index.add(&vectors).expect("add should succeed");
    index
}

#[test]
fn new_index_is_empty() {
    let index = VectorIndex::new(4).expect("valid dimension");
    assert_eq!(index.size(), 0);
    assert!(index.is_empty());
    assert_eq!(index.dimension(), 4);
}

#[test]
fn zero_dimension_is_rejected() {
    assert!(matches!(
        VectorIndex::new(0),
        Err(RagError::Configuration(_))
    ));
}

#[test]
fn rows_are_numbered_in_insertion_order() {
    let mut index = index_with(&[[0.0, 0.0], [1.0, 1.0]]);
    index
        .add(&[vec![2.0, 2.0]])
        .expect("second add should succeed");

    assert_eq!(index.size(), 3);
    assert_eq!(index.row(0), Some(&[0.0, 0.0][..]));
    assert_eq!(index.row(2), Some(&[2.0, 2.0][..]));
    assert_eq!(index.row(3), None);
}

#[test]
fn rows_far_out_of_range_are_none() {
    let index = index_with(&[[0.0, 0.0], [1.0, 1.0]]);

    // start fits in usize but start + dimension does not
    assert_eq!(index.row(usize::MAX / 2), None);
    assert_eq!(index.row(usize::MAX), None);
}

#[test]
fn add_rejects_wrong_dimension_without_partial_append() {
    let mut index = index_with(&[[0.0, 0.0]]);
    let result = index.add(&[vec![1.0, 1.0], vec![1.0, 2.0, 3.0]]);

    assert!(matches!(
        result,
        Err(RagError::DimensionMismatch {
            expected: 2,
            actual: 3
        })
    ));
    assert_eq!(index.size(), 1);
}

#[test]
fn search_returns_nearest_first_with_squared_distances() {
    let index = index_with(&[[10.0, 0.0], [1.0, 0.0], [3.0, 4.0], [0.0, 2.0]]);
    let neighbors = index.search(&[0.0, 0.0], 3).expect("search should succeed");

    assert_eq!(
        neighbors,
        vec![
            Neighbor {
                row: 1,
                distance: 1.0
            },
            Neighbor {
                row: 3,
                distance: 4.0
            },
            Neighbor {
                row: 2,
                distance: 25.0
            },
        ]
    );
}

#[test]
fn search_returns_at_most_size_results() {
    let index = index_with(&[[1.0, 0.0], [0.0, 1.0]]);
    let neighbors = index.search(&[0.0, 0.0], 10).expect("search should succeed");
    assert_eq!(neighbors.len(), 2);
}

#[test]
fn search_on_empty_index_returns_nothing() {
    let index = VectorIndex::new(2).expect("valid dimension");
    let neighbors = index.search(&[0.0, 0.0], 3).expect("search should succeed");
    assert!(neighbors.is_empty());
}

#[test]
fn search_with_zero_k_returns_nothing() {
    let index = index_with(&[[1.0, 0.0]]);
    assert!(
        index
            .search(&[0.0, 0.0], 0)
            .expect("search should succeed")
            .is_empty()
    );
}

#[test]
fn ties_are_broken_by_row() {
    let index = index_with(&[[1.0, 0.0], [0.0, 1.0], [-1.0, 0.0]]);
    let rows: Vec<usize> = index
        .search(&[0.0, 0.0], 3)
        .expect("search should succeed")
        .iter()
        .map(|n| n.row)
        .collect();
    assert_eq!(rows, vec![0, 1, 2]);
}

#[test]
fn nan_rows_are_excluded() {
    let index = index_with(&[[f32::NAN, 0.0], [1.0, 0.0]]);
    let neighbors = index.search(&[0.0, 0.0], 2).expect("search should succeed");
    assert_eq!(neighbors.len(), 1);
    assert_eq!(neighbors[0].row, 1);
}

#[test]
fn search_rejects_wrong_query_dimension() {
    let index = index_with(&[[1.0, 0.0]]);
    assert!(matches!(
        index.search(&[0.0], 1),
        Err(RagError::DimensionMismatch {
            expected: 2,
            actual: 1
        })
    ));
}

#[test]
fn clear_and_truncate() {
    let mut index = index_with(&[[1.0, 0.0], [0.0, 1.0], [1.0, 1.0]]);
    index.truncate(1);
    assert_eq!(index.size(), 1);

    index.clear();
    assert_eq!(index.size(), 0);
    assert_eq!(index.dimension(), 2);
}

#[test]
fn persisted_index_reloads_identically() {
    let index = index_with(&[[0.5, -1.0], [3.0, 2.0], [0.0, 0.25]]);
    let mut bytes = Vec::new();
    index.write_to(&mut bytes).expect("write should succeed");

    let reloaded = VectorIndex::read_from(bytes.as_slice()).expect("read should succeed");
    assert_eq!(reloaded, index);
    assert_eq!(
        reloaded.search(&[0.0, 0.0], 3).expect("search should succeed"),
        index.search(&[0.0, 0.0], 3).expect("search should succeed")
    );
}

#[test]
fn header_reports_dimension_and_rows() {
    let index = index_with(&[[0.5, -1.0], [3.0, 2.0]]);
    let mut bytes = Vec::new();
    index.write_to(&mut bytes).expect("write should succeed");

    let (dimension, rows) = VectorIndex::read_header(bytes.as_slice()).expect("header");
    assert_eq!((dimension, rows), (2, 2));
}

#[test]
fn truncated_file_fails_to_load() {
    let index = index_with(&[[0.5, -1.0], [3.0, 2.0]]);
    let mut bytes = Vec::new();
    index.write_to(&mut bytes).expect("write should succeed");
    bytes.truncate(bytes.len() - 4);

    assert!(VectorIndex::read_from(bytes.as_slice()).is_err());
}

#[test]
fn row_count_disagreeing_with_payload_is_an_integrity_error() {
    let index = index_with(&[[0.5, -1.0], [3.0, 2.0]]);
    let mut bytes = Vec::new();
    index.write_to(&mut bytes).expect("write should succeed");
    // rows field sits after the u32 version and u64 dimension
    bytes[12] = 3;

    assert!(matches!(
        VectorIndex::read_from(bytes.as_slice()),
        Err(RagError::StorageIntegrity(_))
    ));
}
