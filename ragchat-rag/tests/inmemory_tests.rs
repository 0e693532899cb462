//! Property tests for in-memory chunk store search ordering.

use std::collections::HashMap;

use proptest::prelude::*;
use ragchat_rag::{Chunk, ChunkStore, InMemoryChunkStore, MetadataFilter};

/// Generate a non-zero L2-normalized embedding of the given dimension.
fn arb_normalized_embedding(dim: usize) -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec(-1.0f32..1.0f32, dim).prop_filter_map(
        "non-zero embedding",
        |mut v| {
            let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm < 1e-8 {
                return None;
            }
            for val in &mut v {
                *val /= norm;
            }
            Some(v)
        },
    )
}

/// Generate a chunk with a normalized embedding, owned by one of two documents.
fn arb_chunk(dim: usize) -> impl Strategy<Value = Chunk> {
    ("[a-z]{3,8}", "[a-z ]{5,30}", arb_normalized_embedding(dim), prop::bool::ANY).prop_map(
        |(id, text, embedding, first)| Chunk {
            id,
            text,
            embedding: Some(embedding),
            metadata: HashMap::new(),
            document_id: if first { "doc_1" } else { "doc_2" }.to_string(),
        },
    )
}

/// Chunks keyed by id, so re-adding an id does not skew the expected count.
fn unique_by_id(chunks: &[Chunk]) -> Vec<Chunk> {
    let mut deduped: HashMap<String, Chunk> = HashMap::new();
    for chunk in chunks {
        deduped.entry(chunk.id.clone()).or_insert_with(|| chunk.clone());
    }
    deduped.into_values().collect()
}

/// *For any* set of stored chunks, every query SHALL return results ordered by
/// descending cosine similarity, with at most `top_k` results.
mod prop_inmemory_search_ordering {
    use super::*;

    const DIM: usize = 16;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn results_ordered_descending_and_bounded_by_top_k(
            chunks in proptest::collection::vec(arb_chunk(DIM), 1..20),
            queries in proptest::collection::vec(arb_normalized_embedding(DIM), 1..4),
            top_k in 1usize..25,
        ) {
            let unique_chunks = unique_by_id(&chunks);
            let unique_count = unique_chunks.len();

            let rt = tokio::runtime::Runtime::new().unwrap();
            let results = rt.block_on(async {
                let store = InMemoryChunkStore::new();
                store.add(&unique_chunks).await.unwrap();
                store.query(&queries, top_k).await.unwrap()
            });

            prop_assert_eq!(results.len(), queries.len());
            for per_query in &results {
                prop_assert!(per_query.len() <= top_k);
                prop_assert!(per_query.len() <= unique_count);
                for window in per_query.windows(2) {
                    prop_assert!(
                        window[0].score >= window[1].score,
                        "results not in descending order: {} < {}",
                        window[0].score,
                        window[1].score,
                    );
                }
            }
        }
    }
}

/// *For any* stored set, deleting one document SHALL leave exactly the chunks
/// of the other documents.
mod prop_inmemory_document_removal {
    use super::*;

    const DIM: usize = 8;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn removal_keeps_only_other_documents(
            chunks in proptest::collection::vec(arb_chunk(DIM), 1..20),
        ) {
            let unique_chunks = unique_by_id(&chunks);
            let survivors = unique_chunks.iter().filter(|c| c.document_id != "doc_1").count();

            let rt = tokio::runtime::Runtime::new().unwrap();
            let (count, remaining) = rt.block_on(async {
                let store = InMemoryChunkStore::new();
                store.add(&unique_chunks).await.unwrap();
                store.delete_where(&MetadataFilter::document("doc_1")).await.unwrap();
                let probe = vec![1.0; DIM];
                let remaining = store.query(&[probe], 100).await.unwrap().remove(0);
                (store.count().await.unwrap(), remaining)
            });

            prop_assert_eq!(count, survivors);
            prop_assert!(remaining.iter().all(|r| r.chunk.document_id == "doc_2"));
        }
    }
}

#[tokio::test]
async fn re_adding_an_id_replaces_the_chunk() {
    let store = InMemoryChunkStore::new();
    store.add(&[Chunk::new("a_0", "old", "a").with_embedding(vec![1.0, 0.0])]).await.unwrap();
    store.add(&[Chunk::new("a_0", "new", "a").with_embedding(vec![1.0, 0.0])]).await.unwrap();

    assert_eq!(store.count().await.unwrap(), 1);
    let results = store.query(&[vec![1.0, 0.0]], 5).await.unwrap();
    assert_eq!(results[0][0].chunk.text, "new");
}
