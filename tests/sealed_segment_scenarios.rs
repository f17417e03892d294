use segcore::error::SegcoreError;
use segcore::index::{FlatVectorIndex, MetricType, SortedScalarIndex};
use segcore::query::{PlanBuilder, QueryInfo};
use segcore::schema::{DataType, FieldId, FieldOffset, Schema};
use segcore::segment::{
    LoadFieldDataInfo, LoadIndexInfo, ROW_ID_FIELD_ID, SealedSegment, SealedSegmentConfig,
    SegmentInterface, SegmentSealed, SystemFieldType,
};
use segcore::storage::SegOffset;
use segcore::util::bitset::BitsetView;
use serde_json::json;
use std::sync::Arc;

const ROWS: usize = 6;
const DIM: usize = 4;

const EMBEDDING: FieldId = FieldId(100);
const PRICE: FieldId = FieldId(101);
const RATING: FieldId = FieldId(102);
const CATEGORY: FieldId = FieldId(103);

fn product_schema() -> Arc<Schema> {
    let mut schema = Schema::new();
    schema
        .add_vector_field(EMBEDDING, "embedding", DataType::VectorFloat, DIM, MetricType::L2)
        .unwrap();
    schema.add_field(PRICE, "price", DataType::Int64).unwrap();
    schema.add_field(RATING, "rating", DataType::Float).unwrap();
    schema.add_field(CATEGORY, "category", DataType::Int64).unwrap();
    Arc::new(schema)
}

fn embeddings() -> Vec<f32> {
    (0..ROWS)
        .flat_map(|row| {
            let x = row as f32;
            [x, x * 0.5, 1.0, 0.0]
        })
        .collect()
}

fn offsets(raw: &[i64]) -> Vec<SegOffset> {
    raw.iter().copied().map(SegOffset::from).collect()
}

fn ratings_blob(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn fully_loaded() -> SealedSegment {
    let segment = SealedSegment::new(product_schema(), SealedSegmentConfig::new(7)).unwrap();
    segment
        .load_field_data(LoadFieldDataInfo::row_ids(&[1000, 1001, 1002, 1003, 1004, 1005]))
        .unwrap();
    segment
        .load_field_data(LoadFieldDataInfo::from_i64s(
            PRICE,
            &[10, 20, 30, 40, 50, 60],
        ))
        .unwrap();
    segment
        .load_field_data(LoadFieldDataInfo::new(
            RATING,
            ROWS,
            ratings_blob(&[4.5, 3.0, 5.0, 1.5, 2.0, 4.0]),
        ))
        .unwrap();
    segment
        .load_index(LoadIndexInfo::new(
            EMBEDDING,
            FlatVectorIndex::new(DIM, MetricType::L2, embeddings()).unwrap(),
        ))
        .unwrap();
    segment
}

#[test]
fn test_row_count_converges_across_load_order() {
    let segment = SealedSegment::new(product_schema(), SealedSegmentConfig::new(1)).unwrap();
    assert_eq!(segment.get_row_count(), None);

    segment
        .load_index(LoadIndexInfo::new(
            EMBEDDING,
            FlatVectorIndex::new(DIM, MetricType::L2, embeddings()).unwrap(),
        ))
        .unwrap();
    assert_eq!(segment.get_row_count(), Some(ROWS));

    segment
        .load_field_data(LoadFieldDataInfo::from_i64s(PRICE, &[1, 2, 3, 4, 5, 6]))
        .unwrap();
    assert_eq!(segment.get_row_count(), Some(ROWS));
}

#[test]
fn test_mismatched_load_leaves_segment_untouched() {
    let segment = fully_loaded();
    let memory_before = segment.get_memory_usage_in_bytes();
    let stats_before = segment.stats();

    let err = segment
        .load_field_data(LoadFieldDataInfo::from_i64s(CATEGORY, &[1, 2, 3]))
        .unwrap_err();
    match err {
        SegcoreError::InconsistentRowCount { expected, actual } => {
            assert_eq!(expected, ROWS);
            assert_eq!(actual, 3);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(
        err.to_string()
            .contains("load data has different row count from other columns")
    );

    assert!(!segment.is_field_ready(FieldOffset(3)));
    assert_eq!(segment.get_memory_usage_in_bytes(), memory_before);
    assert_eq!(segment.stats(), stats_before);
}

#[test]
fn test_readiness_follows_loads_and_drops() {
    let segment = SealedSegment::new(product_schema(), SealedSegmentConfig::new(2)).unwrap();
    let price = FieldOffset(1);

    assert!(!segment.is_field_ready(price));
    segment
        .load_field_data(LoadFieldDataInfo::from_i64s(PRICE, &[5, 4, 3, 2, 1, 0]))
        .unwrap();
    assert!(segment.is_field_ready(price));

    segment
        .load_index(LoadIndexInfo::new(
            PRICE,
            SortedScalarIndex::build(&[5, 4, 3, 2, 1, 0]).unwrap(),
        ))
        .unwrap();
    assert!(segment.is_field_ready(price));

    assert!(segment.drop_field_data(PRICE).unwrap());
    assert!(segment.is_field_ready(price));
    assert!(segment.chunk_data(price, 0).is_none());

    assert!(segment.drop_index(PRICE).unwrap());
    assert!(!segment.is_field_ready(price));
    assert!(segment.scalar_index(price).is_none());
}

#[test]
fn test_search_gate_reports_row_ids_first() {
    let segment = SealedSegment::new(product_schema(), SealedSegmentConfig::new(3)).unwrap();
    let plan = PlanBuilder::new(segment.get_schema())
        .field("price")
        .unwrap()
        .build();

    let err = segment.check_search(&plan).unwrap_err();
    assert!(matches!(
        err,
        SegcoreError::SystemFieldNotLoaded(SystemFieldType::RowId)
    ));
    assert_eq!(err.to_string(), "System Field RowID is not loaded");
    assert!(err.is_not_loaded());
}

#[test]
fn test_search_gate_names_missing_field() {
    let segment = fully_loaded();
    let plan = PlanBuilder::new(segment.get_schema())
        .field("price")
        .unwrap()
        .field("category")
        .unwrap()
        .build();

    match segment.check_search(&plan) {
        Err(SegcoreError::FieldNotLoaded(name)) => assert_eq!(name, "category"),
        other => panic!("expected FieldNotLoaded, got {other:?}"),
    }

    segment
        .load_field_data(LoadFieldDataInfo::from_i64s(CATEGORY, &[1, 1, 2, 2, 3, 3]))
        .unwrap();
    assert!(segment.check_search(&plan).is_ok());
}

#[test]
fn test_bulk_subscript_typed_columns() {
    let segment = fully_loaded();
    let seg_offsets = offsets(&[-1, 2, -1, 0]);

    let prices: Vec<i64> = segment.bulk_subscript(FieldOffset(1), &seg_offsets);
    assert_eq!(prices, vec![-1, 30, -1, 10]);

    let ratings: Vec<f32> = segment.bulk_subscript(FieldOffset(2), &seg_offsets);
    assert!(ratings[0].is_nan());
    assert_eq!(ratings[1], 5.0);
    assert!(ratings[2].is_nan());
    assert_eq!(ratings[3], 4.5);

    let row_ids = segment.bulk_subscript_system(SystemFieldType::RowId, &seg_offsets);
    assert_eq!(row_ids, vec![-1, 1002, -1, 1000]);

    let empty: Vec<i64> = segment.bulk_subscript(FieldOffset(1), &[]);
    assert!(empty.is_empty());
}

#[test]
fn test_parallel_gather_matches_sequential() {
    let config = SealedSegmentConfig {
        parallel_gather_threshold: 8,
        ..SealedSegmentConfig::new(4)
    };
    let segment = SealedSegment::new(product_schema(), config).unwrap();
    let prices: Vec<i64> = (0..ROWS as i64).map(|i| i * 100).collect();
    segment
        .load_field_data(LoadFieldDataInfo::from_i64s(PRICE, &prices))
        .unwrap();

    let raw: Vec<i64> = (0..64).map(|i| if i % 3 == 0 { -1 } else { i % 6 }).collect();
    let gathered: Vec<i64> = segment.bulk_subscript(FieldOffset(1), &offsets(&raw));
    let expected: Vec<i64> = raw
        .iter()
        .map(|&o| if o < 0 { -1 } else { prices[o as usize] })
        .collect();
    assert_eq!(gathered, expected);
}

#[test]
fn test_index_only_scalar_field_serves_gathers() {
    let segment = SealedSegment::new(product_schema(), SealedSegmentConfig::new(5)).unwrap();
    segment
        .load_index(LoadIndexInfo::new(
            CATEGORY,
            SortedScalarIndex::build(&[3, 1, 2, 1, 3, 2]).unwrap(),
        ))
        .unwrap();

    let values: Vec<i64> = segment.bulk_subscript(FieldOffset(3), &offsets(&[0, 3, -1, 5]));
    assert_eq!(values, vec![3, 1, -1, 2]);
}

#[test]
fn test_memory_usage_moves_with_loads_and_drops() {
    let segment = SealedSegment::new(product_schema(), SealedSegmentConfig::new(6)).unwrap();
    let mut last = segment.get_memory_usage_in_bytes();

    let loads = [
        LoadFieldDataInfo::row_ids(&[1, 2, 3, 4, 5, 6]),
        LoadFieldDataInfo::from_i64s(PRICE, &[1, 2, 3, 4, 5, 6]),
        LoadFieldDataInfo::from_f32s(EMBEDDING, ROWS, &embeddings()),
    ];
    for info in loads {
        segment.load_field_data(info).unwrap();
        let now = segment.get_memory_usage_in_bytes();
        assert!(now > last);
        last = now;
    }

    segment
        .load_index(LoadIndexInfo::new(
            EMBEDDING,
            FlatVectorIndex::new(DIM, MetricType::L2, embeddings()).unwrap(),
        ))
        .unwrap();
    let now = segment.get_memory_usage_in_bytes();
    assert!(now > last);
    last = now;

    for id in [EMBEDDING, PRICE, ROW_ID_FIELD_ID] {
        assert!(segment.drop_field_data(id).unwrap());
        let now = segment.get_memory_usage_in_bytes();
        assert!(now < last);
        last = now;
    }

    assert!(segment.drop_index(EMBEDDING).unwrap());
    assert_eq!(segment.get_memory_usage_in_bytes(), 0);
}

#[test]
fn test_search_with_filter_resolves_row_ids() {
    let segment = fully_loaded();
    let plan = PlanBuilder::new(segment.get_schema())
        .vector_query("embedding", 3)
        .unwrap()
        .field("price")
        .unwrap()
        .search_params(json!({"ef": 64}))
        .unwrap()
        .build();

    // Query near row 2, with row 2 hidden.
    let queries = [2.0, 1.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
    let dataset = segment_dataset(&queries);
    let filter = BitsetView::from_excluded_rows(ROWS, &[2]);

    let result = segment.search(&plan, &dataset, &filter).unwrap();
    assert_eq!(result.num_queries, 2);
    assert_eq!(result.topk, 3);

    let first: Vec<i64> = result.query_hits(0).map(|(o, _)| o.raw()).collect();
    assert_eq!(first, vec![1, 3, 0]);
    assert_eq!(result.query_row_ids(0), &[1001, 1003, 1000]);

    let second: Vec<i64> = result.query_hits(1).map(|(o, _)| o.raw()).collect();
    assert_eq!(second, vec![0, 1, 3]);
    let distances: Vec<f32> = result.query_hits(1).map(|(_, d)| d).collect();
    assert!(distances.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn test_search_pads_when_filter_leaves_few_rows() {
    let segment = fully_loaded();
    let plan = PlanBuilder::new(segment.get_schema())
        .vector_query("embedding", 4)
        .unwrap()
        .build();
    let query = [0.0, 0.0, 1.0, 0.0];
    let dataset = segment_dataset(&query);
    let filter = BitsetView::from_excluded_rows(ROWS, &[0, 1, 2, 3]);

    let result = segment.search(&plan, &dataset, &filter).unwrap();
    assert_eq!(result.seg_offsets.len(), 4);
    assert_eq!(result.seg_offsets[2], SegOffset::NONE);
    assert_eq!(result.distances[3], f32::MAX);
    assert_eq!(result.query_row_ids(0), &[1004, 1005, -1, -1]);
}

#[test]
fn test_search_metric_selection() {
    let segment = fully_loaded();
    segment
        .load_index(LoadIndexInfo::new(
            EMBEDDING,
            FlatVectorIndex::new(DIM, MetricType::IP, embeddings()).unwrap(),
        ))
        .unwrap();
    assert_eq!(segment.stats().vector_indexes, 2);

    let query = [1.0, 0.0, 0.0, 0.0];
    let dataset = segment_dataset(&query);
    let ip = QueryInfo::new(FieldOffset(0), 1).with_metric(MetricType::IP);
    let result = segment
        .vector_search(&ip, &dataset, &BitsetView::empty())
        .unwrap();
    assert_eq!(result.seg_offsets[0].raw(), (ROWS - 1) as i64);

    let cosine = QueryInfo::new(FieldOffset(0), 1).with_metric(MetricType::Cosine);
    assert!(matches!(
        segment.vector_search(&cosine, &dataset, &BitsetView::empty()),
        Err(SegcoreError::Index(_))
    ));
}

#[test]
#[should_panic(expected = "no vector index loaded")]
fn test_vector_search_on_raw_column_panics() {
    let segment = SealedSegment::new(product_schema(), SealedSegmentConfig::new(8)).unwrap();
    segment
        .load_field_data(LoadFieldDataInfo::from_f32s(EMBEDDING, ROWS, &embeddings()))
        .unwrap();
    let query = [0.0; DIM];
    let dataset = segment_dataset(&query);
    let info = QueryInfo::new(FieldOffset(0), 2);
    let _ = segment.vector_search(&info, &dataset, &BitsetView::empty());
}

#[test]
fn test_chunk_accessors() {
    let segment = fully_loaded();
    assert_eq!(segment.num_chunk(), 1);
    assert_eq!(segment.size_per_chunk(), ROWS);
    assert_eq!(segment.num_chunk_index(FieldOffset(0)), 1);
    assert_eq!(segment.num_chunk_index(FieldOffset(1)), 0);

    let index = segment.chunk_index(FieldOffset(0), 0).unwrap();
    assert_eq!(index.dimension(), DIM);
    assert!(segment.chunk_index(FieldOffset(0), 1).is_none());

    let view = segment.chunk_data(FieldOffset(1), 0).unwrap();
    let prices: Vec<i64> = view.span().iter::<i64>().collect();
    assert_eq!(prices, vec![10, 20, 30, 40, 50, 60]);
}

#[test]
fn test_stats_serialize() {
    let segment = fully_loaded();
    let stats = segment.stats();
    assert_eq!(stats.segment_id, 7);
    assert_eq!(stats.ready_fields, 3);
    assert_eq!(stats.loaded_columns, 2);
    assert!(stats.system_field_ready);

    let json = serde_json::to_value(&stats).unwrap();
    assert_eq!(json["row_count"], json!(ROWS));
    assert_eq!(json["memory_bytes"], json!(segment.get_memory_usage_in_bytes()));
}

#[test]
fn test_index_with_foreign_row_count_never_reaches_search() {
    let segment = SealedSegment::new(product_schema(), SealedSegmentConfig::new(9)).unwrap();
    segment
        .load_field_data(LoadFieldDataInfo::row_ids(&[1, 2]))
        .unwrap();
    let oversized = FlatVectorIndex::new(DIM, MetricType::L2, embeddings()).unwrap();
    let err = segment
        .load_index(LoadIndexInfo::new(EMBEDDING, oversized))
        .unwrap_err();
    assert!(matches!(
        err,
        SegcoreError::InconsistentRowCount {
            expected: 2,
            actual: ROWS
        }
    ));
    assert_eq!(segment.get_row_count(), Some(2));

    let plan = PlanBuilder::new(segment.get_schema())
        .vector_query("embedding", 4)
        .unwrap()
        .build();
    let query = [0.0; DIM];
    let dataset = segment_dataset(&query);
    match segment.search(&plan, &dataset, &BitsetView::empty()) {
        Err(SegcoreError::FieldNotLoaded(name)) => assert_eq!(name, "embedding"),
        other => panic!("expected FieldNotLoaded, got {other:?}"),
    }
}

#[test]
fn test_search_ranks_nan_vectors_last() {
    let segment = SealedSegment::new(product_schema(), SealedSegmentConfig::new(10)).unwrap();
    segment
        .load_field_data(LoadFieldDataInfo::row_ids(&[1000, 1001, 1002, 1003, 1004, 1005]))
        .unwrap();
    let mut vectors = embeddings();
    for row in [0, 3] {
        vectors[row * DIM] = f32::NAN;
    }
    segment
        .load_index(LoadIndexInfo::new(
            EMBEDDING,
            FlatVectorIndex::new(DIM, MetricType::L2, vectors).unwrap(),
        ))
        .unwrap();

    let plan = PlanBuilder::new(segment.get_schema())
        .vector_query("embedding", ROWS)
        .unwrap()
        .build();
    let query = [0.0, 0.0, 1.0, 0.0];
    let dataset = segment_dataset(&query);
    let result = segment
        .search(&plan, &dataset, &BitsetView::empty())
        .unwrap();

    let hits: Vec<i64> = result.query_hits(0).map(|(o, _)| o.raw()).collect();
    assert_eq!(hits, vec![1, 2, 4, 5, 0, 3]);
    assert_eq!(result.query_row_ids(0)[0], 1001);
    assert_eq!(result.distances[4], f32::INFINITY);
}

#[test]
fn test_zero_row_column_is_rejected() {
    let segment = SealedSegment::new(product_schema(), SealedSegmentConfig::new(11)).unwrap();
    assert!(
        segment
            .load_field_data(LoadFieldDataInfo::from_i64s(PRICE, &[]))
            .is_err()
    );
    assert!(!segment.is_field_ready(FieldOffset(1)));
    assert_eq!(segment.get_row_count(), None);
    assert_eq!(segment.get_memory_usage_in_bytes(), 0);
}

#[test]
fn test_reloading_a_loaded_column_is_rejected() {
    let segment = fully_loaded();
    let memory = segment.get_memory_usage_in_bytes();
    let err = segment
        .load_field_data(LoadFieldDataInfo::from_i64s(PRICE, &[0; ROWS]))
        .unwrap_err();
    assert!(matches!(err, SegcoreError::Field(_)));
    assert_eq!(segment.get_memory_usage_in_bytes(), memory);

    let prices: Vec<i64> = segment.bulk_subscript(FieldOffset(1), &offsets(&[5]));
    assert_eq!(prices, vec![60]);
}

#[test]
fn test_segment_from_deserialized_schema() {
    let json = serde_json::to_string(product_schema().as_ref()).unwrap();
    let schema: Schema = serde_json::from_str(&json).unwrap();
    let segment = SealedSegment::new(Arc::new(schema), SealedSegmentConfig::new(12)).unwrap();
    segment
        .load_field_data(LoadFieldDataInfo::from_i64s(PRICE, &[1, 2, 3, 4, 5, 6]))
        .unwrap();
    assert!(segment.is_field_ready(FieldOffset(1)));
}

fn segment_dataset(queries: &[f32]) -> segcore::index::SearchDataset<'_> {
    segcore::index::SearchDataset::new(DIM, queries).unwrap()
}
