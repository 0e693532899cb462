//! Tests for streamed answer generation and its fallback.

use std::sync::Arc;

use futures::StreamExt;
use proptest::prelude::*;
use ragchat_model::MockLlm;
use ragchat_rag::{AnswerGenerator, Chunk, FALLBACK_ANSWER, RagConfig};

fn generator(model: Arc<MockLlm>) -> AnswerGenerator {
    AnswerGenerator::new(model, &RagConfig::default())
}

fn context() -> Vec<Chunk> {
    vec![Chunk::new("tides_0", "Tides follow the moon.", "tides.txt")]
}

#[tokio::test]
async fn fragments_are_forwarded_in_order() {
    let model = Arc::new(MockLlm::new().with_stream(["Tides ", "follow ", "the moon."]));

    let fragments: Vec<String> =
        generator(model).generate("Why tides?", &context(), "").collect().await;

    assert_eq!(fragments, vec!["Tides ", "follow ", "the moon."]);
}

#[tokio::test]
async fn prompt_carries_context_and_history() {
    let model = Arc::new(MockLlm::new().with_stream(["ok"]));
    let history = "Last questions:\n\n --- \nQuestion 1:\nq\n\nAnswer 1:\na\n\n --- \n";

    let _: Vec<String> =
        generator(model.clone()).generate("Why tides?", &context(), history).collect().await;

    let requests = model.requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].prompt.contains("Tides follow the moon."));
    assert!(requests[0].prompt.contains("Question 1:\nq"));
    assert_eq!(requests[0].params.model, RagConfig::default().model);
    assert_eq!(requests[0].params.max_tokens, None);
}

#[tokio::test]
async fn failed_request_yields_only_the_fallback() {
    let model = Arc::new(MockLlm::new().with_failure("connection refused"));

    let fragments: Vec<String> = generator(model).generate("Q?", &context(), "").collect().await;

    assert_eq!(fragments, vec![FALLBACK_ANSWER]);
}

#[tokio::test]
async fn mid_stream_failure_appends_the_fallback() {
    let model = Arc::new(MockLlm::new().with_stream_failure(["Partial "], "stream reset"));

    let fragments: Vec<String> = generator(model).generate("Q?", &context(), "").collect().await;

    assert_eq!(fragments, vec!["Partial ", FALLBACK_ANSWER]);
}

#[tokio::test]
async fn unbuildable_prompt_yields_the_fallback_without_calling_the_model() {
    let model = Arc::new(MockLlm::new().with_stream(["never"]));

    let fragments: Vec<String> =
        generator(model.clone()).generate("   ", &context(), "").collect().await;

    assert_eq!(fragments, vec![FALLBACK_ANSWER]);
    assert!(model.requests().is_empty());
}

#[tokio::test]
async fn generation_is_lazy() {
    let model = Arc::new(MockLlm::new().with_stream(["x"]));
    let stream = generator(model.clone()).generate("Q?", &context(), "");

    assert!(model.requests().is_empty());
    drop(stream);
    assert!(model.requests().is_empty());
}

#[derive(Debug, Clone)]
enum Behaviour {
    Streams(Vec<String>),
    Refuses,
    BreaksAfter(Vec<String>),
}

fn arb_behaviour() -> impl Strategy<Value = Behaviour> {
    let fragments = proptest::collection::vec("[a-z ]{0,6}", 0..5);
    prop_oneof![
        fragments.clone().prop_map(Behaviour::Streams),
        Just(Behaviour::Refuses),
        fragments.prop_map(Behaviour::BreaksAfter),
    ]
}

/// *For any* model behaviour, the answer stream SHALL yield at least one
/// fragment, and when the model fails before producing text the only
/// fragment SHALL be the fallback.
mod prop_answer_never_empty {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn always_yields_a_fragment(behaviour in arb_behaviour()) {
            let model = match &behaviour {
                Behaviour::Streams(f) => MockLlm::new().with_stream(f.clone()),
                Behaviour::Refuses => MockLlm::new().with_failure("down"),
                Behaviour::BreaksAfter(f) => MockLlm::new().with_stream_failure(f.clone(), "reset"),
            };

            let rt = tokio::runtime::Runtime::new().unwrap();
            let fragments: Vec<String> = rt.block_on(
                generator(Arc::new(model)).generate("Q?", &context(), "").collect(),
            );

            prop_assert!(!fragments.is_empty());
            let produced_text = match &behaviour {
                Behaviour::Streams(f) | Behaviour::BreaksAfter(f) => {
                    f.iter().any(|s| !s.is_empty())
                }
                Behaviour::Refuses => false,
            };
            if !produced_text {
                prop_assert_eq!(fragments, vec![FALLBACK_ANSWER.to_string()]);
            }
        }
    }
}
