use super::*;
use crate::chunker::Chunk;
use crate::types::{AnswerStrategy, RetrievalResult, RetrievedChunk};
use tokio::time::Instant;

fn paris() -> RetrievalResult {
    RetrievalResult {
        chunks: vec![
            RetrievedChunk {
                chunk: Chunk {
                    id: 0,
                    source: "capitals.txt".to_string(),
                    char_start: 0,
                    char_end: 33,
                    text: "Paris is the capital of France.\n\n".to_string(),
                },
                score: 0.8,
            },
            RetrievedChunk {
                chunk: Chunk {
                    id: 1,
                    source: "capitals.txt".to_string(),
                    char_start: 33,
                    char_end: 66,
                    text: "Berlin is the capital of Germany.".to_string(),
                },
                score: 0.3,
            },
        ],
    }
}

fn deadline() -> Instant {
    Instant::now() + Duration::from_secs(10)
}

fn chain(candidates: Vec<Candidate>) -> AnswerGenerator {
    AnswerGenerator::new(candidates, settings(), docqa_prompt::grounded_answer())
}

#[tokio::test]
async fn test_all_candidates_failing_falls_back_to_extraction() {
    let unavailable = FakeClient::new(Behavior::Unavailable);
    let crash = FakeClient::new(Behavior::Crash);
    let hang = FakeClient::new(Behavior::Hang);
    let empty = FakeClient::new(Behavior::Empty);
    let generator = chain(vec![
        model("small", 0, unavailable.clone()),
        model("medium", 1, crash.clone()),
        model("large", 2, hang.clone()),
        model("largest", 3, empty.clone()),
    ]);

    let answer = generator
        .answer("What is the capital of France?", &paris(), deadline(), true)
        .await;

    assert_eq!(answer.strategy, AnswerStrategy::Extracted);
    assert_eq!(
        answer.text,
        "[Extracted from capitals.txt] Paris is the capital of France."
    );

    let failures: Vec<Option<&str>> = answer
        .attempts
        .iter()
        .map(|a| a.failure.as_deref())
        .collect();
    assert_eq!(
        failures,
        vec![
            Some("model_unavailable"),
            Some("process_failed"),
            Some("generation_timeout"),
            Some("malformed_output"),
            None,
        ]
    );

    // No candidate is retried
    for client in [&unavailable, &crash, &hang, &empty] {
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);
    }
}

#[tokio::test]
async fn test_first_success_wins() {
    let failing = FakeClient::new(Behavior::Crash);
    let good = FakeClient::new(Behavior::Reply("  Paris.  ".to_string()));
    let unused = FakeClient::new(Behavior::Reply("Lyon".to_string()));
    let generator = chain(vec![
        model("first", 0, failing.clone()),
        model("second", 1, good.clone()),
        model("third", 2, unused.clone()),
    ]);

    let answer = generator
        .answer("What is the capital of France?", &paris(), deadline(), true)
        .await;

    assert_eq!(answer.text, "Paris.");
    assert_eq!(
        answer.strategy,
        AnswerStrategy::Generated {
            candidate: "second".to_string(),
            model: "second".to_string(),
        }
    );
    assert_eq!(answer.attempts.len(), 2);
    assert_eq!(unused.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_candidates_tried_in_rank_order() {
    let low = FakeClient::new(Behavior::Reply("from rank 1".to_string()));
    let high = FakeClient::new(Behavior::Reply("from rank 0".to_string()));
    let generator = chain(vec![model("slow", 1, low.clone()), model("fast", 0, high.clone())]);

    let names: Vec<&str> = generator.candidates().iter().map(|c| c.name()).collect();
    assert_eq!(names, vec!["fast", "slow", "extraction"]);

    let answer = generator.answer("capital?", &paris(), deadline(), true).await;
    assert_eq!(answer.text, "from rank 0");
    assert_eq!(low.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_extraction_runs_from_its_chain_position() {
    let crash = FakeClient::new(Behavior::Crash);
    let unavailable = FakeClient::new(Behavior::Unavailable);
    // A leading extraction entry is moved to the end of the chain
    let generator = chain(vec![
        Candidate::Extraction,
        model("second", 1, crash.clone()),
        model("first", 0, unavailable.clone()),
    ]);

    let names: Vec<&str> = generator.candidates().iter().map(|c| c.name()).collect();
    assert_eq!(names, vec!["first", "second", "extraction"]);

    let answer = generator.answer("capital?", &paris(), deadline(), true).await;
    let attempted: Vec<&str> = answer.attempts.iter().map(|a| a.candidate.as_str()).collect();
    assert_eq!(attempted, names);
    assert_eq!(answer.strategy, AnswerStrategy::Extracted);
    assert!(answer.attempts.last().is_some_and(|a| a.failure.is_none()));
}

#[tokio::test]
async fn test_missing_model_fails_fast_with_single_probe() {
    let runtime = FakeClient::with_installed(
        Behavior::Reply("Paris".to_string()),
        &["mistral:latest"],
    );
    let generator = chain(vec![
        model("llama3.2:1b", 0, runtime.clone()),
        model("mistral", 1, runtime.clone()),
    ]);

    let answer = generator.answer("capital?", &paris(), deadline(), true).await;

    assert_eq!(answer.text, "Paris");
    assert_eq!(answer.attempts[0].failure.as_deref(), Some("model_unavailable"));
    assert_eq!(runtime.probes.load(Ordering::SeqCst), 1);
    assert_eq!(runtime.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_exhausted_deadline_skips_models() {
    let good = FakeClient::new(Behavior::Reply("Paris".to_string()));
    let generator = chain(vec![model("only", 0, good.clone())]);

    let answer = generator
        .answer("capital?", &paris(), Instant::now(), true)
        .await;

    assert_eq!(answer.strategy, AnswerStrategy::Extracted);
    assert_eq!(answer.attempts[0].failure.as_deref(), Some("deadline_exhausted"));
    assert_eq!(good.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_empty_retrieval_never_calls_models() {
    let good = FakeClient::new(Behavior::Reply("invented".to_string()));
    let generator = chain(vec![model("only", 0, good.clone())]);

    let answer = generator
        .answer("capital?", &RetrievalResult::default(), deadline(), true)
        .await;

    assert_eq!(answer.text, crate::answer::NO_RELEVANT_CONTENT);
    assert_eq!(answer.strategy, AnswerStrategy::NoContext);
    assert_eq!(good.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_extraction_only_option_skips_models() {
    let good = FakeClient::new(Behavior::Reply("Paris".to_string()));
    let generator = chain(vec![model("only", 0, good.clone())]);

    let answer = generator.answer("capital?", &paris(), deadline(), false).await;

    assert_eq!(answer.strategy, AnswerStrategy::Extracted);
    assert_eq!(good.calls.load(Ordering::SeqCst), 0);
}

#[cfg(unix)]
#[tokio::test]
async fn test_command_backend_in_chain() {
    use docqa_llm::CommandClient;

    let client: Arc<dyn LlmClient> = Arc::new(CommandClient::new(
        "sh",
        vec!["-c".to_string(), "cat >/dev/null; echo Paris".to_string()],
    ));
    let generator = chain(vec![Candidate::LocalModel {
        name: "script".to_string(),
        rank: 0,
        model: "script".to_string(),
        client,
    }]);

    let answer = generator.answer("capital?", &paris(), deadline(), true).await;
    assert_eq!(answer.text, "Paris");
}
