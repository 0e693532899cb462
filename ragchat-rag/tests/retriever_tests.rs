//! Tests for fan-out retrieval.

mod common;

use std::sync::Arc;

use common::{FlakyEmbedder, SlowEmbedder, WordHashEmbedder};
use ragchat_rag::{
    Chunk, EmbeddingProvider, InMemoryChunkStore, MultiRetriever, RagError, SimilarityIndex,
};

async fn index_with(embedder: Arc<dyn EmbeddingProvider>) -> SimilarityIndex {
    let index = SimilarityIndex::new(Arc::new(InMemoryChunkStore::new()), embedder);
    index
        .add_chunks(vec![
            Chunk::new("tides_0", "tides follow the moon", "tides"),
            Chunk::new("tides_1", "spring tides are strong", "tides"),
            Chunk::new("bees_0", "bees pollinate flowers", "bees"),
            Chunk::new("bees_1", "bees live in hives", "bees"),
        ])
        .await
        .unwrap();
    index
}

fn queries(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn results_follow_sub_query_order() {
    let index = index_with(Arc::new(WordHashEmbedder)).await;
    let retriever = MultiRetriever::new(index, 2, 4);

    let results = retriever.retrieve_all(&queries(&["bees hives", "tides moon"])).await;

    assert_eq!(results.len(), 2);
    assert!(results[0].iter().all(|c| c.document_id == "bees"));
    assert!(results[1].iter().all(|c| c.document_id == "tides"));
}

#[tokio::test(start_paused = true)]
async fn results_do_not_depend_on_completion_order() {
    let embedder = Arc::new(SlowEmbedder::new([
        ("tides moon", 300),
        ("bees hives", 200),
        ("spring strong", 10),
    ]));
    let index = index_with(embedder.clone()).await;
    let retriever = MultiRetriever::new(index, 1, 4);

    let results =
        retriever.retrieve_all(&queries(&["tides moon", "bees hives", "spring strong"])).await;

    assert_eq!(embedder.completed(), vec!["spring strong", "bees hives", "tides moon"]);
    let top: Vec<&str> = results.iter().map(|list| list[0].id.as_str()).collect();
    assert_eq!(top, vec!["tides_0", "bees_1", "tides_1"]);
}

#[tokio::test]
async fn fetch_k_bounds_each_list() {
    let index = index_with(Arc::new(WordHashEmbedder)).await;
    let retriever = MultiRetriever::new(index, 3, 1);

    for list in retriever.retrieve_all(&queries(&["tides", "bees", "moon"])).await {
        assert!(list.len() <= 3);
    }
}

#[tokio::test]
async fn failing_sub_query_does_not_affect_siblings() {
    let index = index_with(Arc::new(FlakyEmbedder)).await;
    let retriever = MultiRetriever::new(index, 2, 4);

    let results = retriever.retrieve_all(&queries(&["tides moon", "FAIL now", "bees"])).await;

    assert_eq!(results.len(), 3);
    assert!(!results[0].is_empty());
    assert!(results[1].is_empty());
    assert!(!results[2].is_empty());
}

#[tokio::test]
async fn failures_name_their_sub_query() {
    let index = index_with(Arc::new(FlakyEmbedder)).await;
    let retriever = MultiRetriever::new(index, 2, 4);

    let outcomes = retriever.try_retrieve_all(&queries(&["tides", "FAIL here"])).await;

    assert!(outcomes[0].is_ok());
    match &outcomes[1] {
        Err(RagError::RetrievalError { query, .. }) => assert_eq!(query, "FAIL here"),
        other => panic!("expected a retrieval error, got {other:?}"),
    }
}

#[tokio::test]
async fn no_sub_queries_means_no_results() {
    let index = index_with(Arc::new(WordHashEmbedder)).await;
    let retriever = MultiRetriever::new(index, 2, 4);
    assert!(retriever.retrieve_all(&[]).await.is_empty());
}
