//! Property tests for in-memory vector store query ordering.

use std::collections::HashSet;

use proptest::prelude::*;
use ragport::{Chunk, Embedding, InMemoryVectorStore, Metadata, VectorStore};

/// Generate a non-zero L2-normalized vector of the given dimension.
fn arb_normalized_vector(dim: usize) -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec(-1.0f32..1.0f32, dim).prop_filter_map("non-zero vector", |mut v| {
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm < 1e-8 {
            return None;
        }
        for val in &mut v {
            *val /= norm;
        }
        Some(v)
    })
}

/// Generate a chunk record with a normalized vector.
fn arb_record(dim: usize) -> impl Strategy<Value = (Chunk, Embedding)> {
    ("[a-z]{3,8}", "[a-z ]{5,30}", arb_normalized_vector(dim)).prop_map(|(id, content, vector)| {
        let chunk = Chunk {
            id,
            document_id: "doc_1".to_string(),
            index: 0,
            content,
            metadata: Metadata::new(),
        };
        let embedding = Embedding::for_chunk(&chunk, vector);
        (chunk, embedding)
    })
}

/// For any stored set, a query returns at most `top_k` distinct chunks in
/// descending score order.
mod prop_inmemory_query_ordering {
    use super::*;

    const DIM: usize = 16;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn results_ordered_descending_and_bounded_by_top_k(
            records in proptest::collection::vec(arb_record(DIM), 1..20),
            query in arb_normalized_vector(DIM),
            top_k in 1usize..25,
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let (results, stored) = rt.block_on(async {
                let store = InMemoryVectorStore::new();
                store.ensure_collection("test", DIM).await.unwrap();
                // Duplicate IDs overwrite, so the store may hold fewer records.
                store.upsert("test", &records).await.unwrap();
                let query = Embedding::for_query("q", query);
                let results = store.query("test", &query, top_k).await.unwrap();
                (results, store.len("test").await)
            });

            let unique: HashSet<&str> = records.iter().map(|(c, _)| c.id.as_str()).collect();
            prop_assert_eq!(stored, unique.len());
            prop_assert_eq!(results.len(), top_k.min(stored));

            let returned: HashSet<&str> = results.iter().map(|r| r.chunk.id.as_str()).collect();
            prop_assert_eq!(returned.len(), results.len());

            for window in results.windows(2) {
                prop_assert!(
                    window[0].score >= window[1].score,
                    "results not in descending order: {} < {}",
                    window[0].score,
                    window[1].score,
                );
            }
        }

        #[test]
        fn repeated_queries_are_deterministic(
            records in proptest::collection::vec(arb_record(DIM), 1..20),
            query in arb_normalized_vector(DIM),
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let (first, second) = rt.block_on(async {
                let store = InMemoryVectorStore::new();
                store.ensure_collection("test", DIM).await.unwrap();
                store.upsert("test", &records).await.unwrap();
                let query = Embedding::for_query("q", query);
                let first = store.query("test", &query, 10).await.unwrap();
                let second = store.query("test", &query, 10).await.unwrap();
                (first, second)
            });
            prop_assert_eq!(first, second);
        }
    }
}
