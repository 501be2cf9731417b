//! End-to-end answer pipeline scenarios with scripted backends.

use super::fakes::{FailingSink, HangingSink, KeywordEmbedder, ScriptedLlm, Step, UnreachableEmbedder};
use crate::embeddings::EmbeddingProvider;
use crate::escalation::{EscalationSink, JsonlLedger, MemorySink};
use crate::index::MemoryIndex;
use crate::rag::guard::GuardPolicy;
use crate::rag::pipeline::{AnswerPipeline, PipelineSettings};
use crate::rag::synthesize::{SynthesisSettings, Synthesizer};
use crate::rag::types::{AnswerResponse, ReasonCode};
use crate::retriever::Retriever;
use crate::session::{SessionStore, TurnOutcome};
use crate::types::Chunk;
use relnotes_core::AppError;
use relnotes_prompt::builtin_prompt;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const KEYWORDS: &[&str] = &["2024.1", "sso", "export", "speed"];

fn chunk(id: &str, text: &str) -> Chunk {
    Chunk {
        id: id.to_string(),
        text: text.to_string(),
        source_id: "https://docs.example.com/2024.1".to_string(),
        source_url: format!("https://docs.example.com/2024.1#{}", id),
        source_title: "Release 2024.1".to_string(),
        position: 0,
        ordinal: 0,
    }
}

async fn release_index(embedder: &dyn EmbeddingProvider) -> MemoryIndex {
    let index = MemoryIndex::new();
    for c in [
        chunk("speed", "Version 2024.1 improves dashboard speed."),
        chunk("sso", "Version 2024.1 adds SSO login."),
        chunk("export", "Version 2024.1 fixes CSV export."),
    ] {
        let vector = embedder.embed(&c.text).await.unwrap();
        index.insert(c, vector).unwrap();
    }
    index
}

struct Harness {
    pipeline: AnswerPipeline,
    llm: Arc<ScriptedLlm>,
    sessions: Arc<SessionStore>,
}

async fn harness_with(
    script: Vec<Step>,
    sink: Arc<dyn EscalationSink>,
    embedder: Arc<dyn EmbeddingProvider>,
) -> Harness {
    let keyword = KeywordEmbedder::new(KEYWORDS);
    let index = release_index(&keyword).await;
    let llm = Arc::new(ScriptedLlm::new(script));
    let sessions = Arc::new(SessionStore::new());

    let synthesizer = Synthesizer::new(
        llm.clone(),
        builtin_prompt(),
        SynthesisSettings {
            model: "test-model".to_string(),
            max_tokens: 300,
            temperature: 0.0,
            timeout: Duration::from_millis(100),
            retry_backoff: Duration::from_millis(5),
            history_window: 4,
        },
    );

    let pipeline = AnswerPipeline::new(
        Retriever::new(Arc::new(index), embedder, 0.35),
        synthesizer,
        GuardPolicy::new(0.5),
        Arc::clone(&sessions),
        sink,
        PipelineSettings {
            top_k: 8,
            context_budget_chars: 6000,
            sink_timeout: Duration::from_millis(50),
        },
    );

    Harness {
        pipeline,
        llm,
        sessions,
    }
}

async fn harness(script: Vec<Step>, sink: Arc<dyn EscalationSink>) -> Harness {
    harness_with(script, sink, Arc::new(KeywordEmbedder::new(KEYWORDS))).await
}

fn escalation_reason(response: &AnswerResponse) -> Option<ReasonCode> {
    match response {
        AnswerResponse::Escalated { reason_code, .. } => Some(*reason_code),
        AnswerResponse::Answered { .. } => None,
    }
}

#[tokio::test]
async fn test_answer_with_citations_for_covered_release() {
    let sink = Arc::new(MemorySink::new());
    let h = harness(
        vec![Step::Reply(
            "Version 2024.1 improves dashboard speed [1]. It adds SSO login [2] and fixes CSV export [3].\nCONFIDENCE: 0.9",
        )],
        sink.clone(),
    )
    .await;

    let response = h
        .pipeline
        .answer_question("s-a", "What changed in version 2024.1?")
        .await
        .unwrap();

    match response {
        AnswerResponse::Answered { text, citations } => {
            assert!(text.contains("[1]"));
            assert!(!text.contains("CONFIDENCE"));
            assert!(!citations.is_empty());
            for citation in &citations {
                assert!((1..=3).contains(&citation.marker));
                assert!(citation.source_url.starts_with("https://docs.example.com/2024.1#"));
            }
        }
        other => panic!("expected an answer, got {:?}", other),
    }

    assert!(sink.records().is_empty());
    assert!(h.llm.prompts()[0].contains("[3] Release 2024.1"));
}

#[tokio::test]
async fn test_topic_outside_corpus_escalates_without_backend_call() {
    let sink = Arc::new(MemorySink::new());
    let h = harness(vec![Step::Reply("unused")], sink.clone()).await;

    let response = h
        .pipeline
        .answer_question("s-b", "How do I configure Kubernetes autoscaling?")
        .await
        .unwrap();

    match &response {
        AnswerResponse::Escalated {
            reason_code,
            prompt_for_contact,
            message,
        } => {
            assert_eq!(*reason_code, ReasonCode::NoRelevantChunks);
            assert!(*prompt_for_contact);
            assert!(message.starts_with("I don't have enough information"));
        }
        other => panic!("expected escalation, got {:?}", other),
    }

    assert_eq!(h.llm.calls(), 0);
    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].reason, ReasonCode::NoRelevantChunks);
    assert_eq!(records[0].conversation_id, "s-b");
}

#[tokio::test]
async fn test_two_backend_timeouts_escalate_low_confidence() {
    let sink = Arc::new(MemorySink::new());
    let h = harness(vec![Step::Hang, Step::Hang], sink.clone()).await;

    let response = h
        .pipeline
        .answer_question("s-c", "What changed in version 2024.1?")
        .await
        .unwrap();

    assert_eq!(escalation_reason(&response), Some(ReasonCode::LowConfidence));
    assert_eq!(h.llm.calls(), 2);

    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].reason, ReasonCode::LowConfidence);
    assert_eq!(records[0].question, "What changed in version 2024.1?");
}

#[tokio::test]
async fn test_citing_absent_passage_escalates() {
    let sink = Arc::new(MemorySink::new());
    let h = harness(
        vec![Step::Reply("Version 2024.1 adds SSO [7].\nCONFIDENCE: 0.95")],
        sink.clone(),
    )
    .await;

    let response = h
        .pipeline
        .answer_question("s", "Does 2024.1 add SSO?")
        .await
        .unwrap();
    assert_eq!(escalation_reason(&response), Some(ReasonCode::UngroundedClaims));
}

#[tokio::test]
async fn test_citing_oversized_marker_escalates() {
    let sink = Arc::new(MemorySink::new());
    let h = harness(
        vec![Step::Reply(
            "Version 2024.1 adds SSO login [1] [99999999999999999999999].\nCONFIDENCE: 0.9",
        )],
        sink.clone(),
    )
    .await;

    let response = h
        .pipeline
        .answer_question("s", "Does 2024.1 add SSO?")
        .await
        .unwrap();
    assert_eq!(escalation_reason(&response), Some(ReasonCode::UngroundedClaims));
    assert_eq!(sink.records().len(), 1);
}

#[tokio::test]
async fn test_model_refusal_escalates() {
    let sink = Arc::new(MemorySink::new());
    let h = harness(vec![Step::Reply("INSUFFICIENT_CONTEXT")], sink.clone()).await;

    let response = h
        .pipeline
        .answer_question("s", "Does 2024.1 change SSO pricing?")
        .await
        .unwrap();
    assert_eq!(escalation_reason(&response), Some(ReasonCode::ModelRefusal));
}

#[tokio::test]
async fn test_sink_failure_still_returns_escalation() {
    let h = harness(vec![Step::Reply("unused")], Arc::new(FailingSink)).await;

    let response = h
        .pipeline
        .answer_question("s", "Tell me about Kubernetes")
        .await
        .unwrap();

    assert!(response.is_escalated());
    assert_eq!(h.sessions.history("s").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_stalled_sink_does_not_block_escalation() {
    let h = harness(vec![Step::Reply("unused")], Arc::new(HangingSink)).await;

    let response = tokio::time::timeout(
        Duration::from_secs(2),
        h.pipeline.answer_question("s", "Tell me about Kubernetes"),
    )
    .await
    .expect("escalation waited on the sink past its deadline")
    .unwrap();

    assert_eq!(escalation_reason(&response), Some(ReasonCode::NoRelevantChunks));
    assert_eq!(h.sessions.history("s").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_abandoned_question_leaves_no_trace() {
    let sink = Arc::new(MemorySink::new());
    let h = harness(vec![Step::Hang], sink.clone()).await;

    // Caller gives up while synthesis is still waiting on the model
    let abandoned = tokio::time::timeout(
        Duration::from_millis(30),
        h.pipeline.answer_question("s", "What changed in version 2024.1?"),
    )
    .await;
    assert!(abandoned.is_err());

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(h.sessions.history("s").await.unwrap().is_empty());
    assert!(sink.records().is_empty());

    // The session is free again for the next question
    let response = tokio::time::timeout(
        Duration::from_secs(2),
        h.pipeline.answer_question("s", "Tell me about Kubernetes"),
    )
    .await
    .unwrap()
    .unwrap();
    assert!(response.is_escalated());
    assert_eq!(h.sessions.history("s").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_escalations_reach_jsonl_ledger() {
    let temp = TempDir::new().unwrap();
    let ledger = Arc::new(JsonlLedger::for_workspace(temp.path()));
    let h = harness(vec![Step::Reply("unused")], ledger.clone()).await;

    h.pipeline
        .answer_question("s", "Tell me about Kubernetes")
        .await
        .unwrap();

    let records = ledger.list().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].reason, ReasonCode::NoRelevantChunks);
}

#[tokio::test]
async fn test_blank_question_is_client_error() {
    let h = harness(vec![Step::Reply("unused")], Arc::new(MemorySink::new())).await;

    let err = h.pipeline.answer_question("s", "   ").await.unwrap_err();
    assert!(err.is_client_error());
    assert!(h.sessions.history("s").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_embedding_outage_escalates_low_confidence() {
    let sink = Arc::new(MemorySink::new());
    let h = harness_with(
        vec![Step::Reply("unused")],
        sink.clone(),
        Arc::new(UnreachableEmbedder),
    )
    .await;

    let response = h
        .pipeline
        .answer_question("s", "What changed in version 2024.1?")
        .await
        .unwrap();

    assert_eq!(escalation_reason(&response), Some(ReasonCode::LowConfidence));
    assert_eq!(h.llm.calls(), 0);
}

#[tokio::test]
async fn test_index_fault_surfaces_as_internal_error() {
    // Query vectors with a different dimension than the stored ones
    let h = harness_with(
        vec![Step::Reply("unused")],
        Arc::new(MemorySink::new()),
        Arc::new(KeywordEmbedder::new(&["2024.1", "sso"])),
    )
    .await;

    let err = h
        .pipeline
        .answer_question("s", "What changed in version 2024.1?")
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Internal { .. }));
    assert!(!err.to_string().contains("dimension"));
}

#[tokio::test]
async fn test_follow_up_sees_escalated_turn_in_history() {
    let h = harness(
        vec![Step::Reply("Version 2024.1 adds SSO login [1].\nCONFIDENCE: 0.9")],
        Arc::new(MemorySink::new()),
    )
    .await;

    h.pipeline
        .answer_question("s", "Tell me about Kubernetes")
        .await
        .unwrap();
    let response = h
        .pipeline
        .answer_question("s", "Does 2024.1 add SSO?")
        .await
        .unwrap();
    assert!(!response.is_escalated());

    let history = h.sessions.history("s").await.unwrap();
    assert_eq!(history.len(), 2);
    assert!(matches!(history[0].outcome, TurnOutcome::Escalated { .. }));
    assert!(matches!(history[1].outcome, TurnOutcome::Answered { .. }));
    assert_eq!(history[1].citations.len(), 1);

    assert!(h.llm.prompts()[0].contains("Tell me about Kubernetes"));
}

#[tokio::test]
async fn test_spanish_question_gets_spanish_notice() {
    let h = harness(vec![Step::Reply("unused")], Arc::new(MemorySink::new())).await;

    let response = h
        .pipeline
        .answer_question("s", "¿Qué novedades hay para Kubernetes?")
        .await
        .unwrap();

    match response {
        AnswerResponse::Escalated { message, .. } => assert!(message.starts_with("No tengo")),
        other => panic!("expected escalation, got {:?}", other),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_questions_in_one_session() {
    let h = Arc::new(
        harness(
            vec![Step::Reply("Version 2024.1 adds SSO login [1].\nCONFIDENCE: 0.9")],
            Arc::new(MemorySink::new()),
        )
        .await,
    );

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let h = Arc::clone(&h);
            tokio::spawn(async move {
                h.pipeline
                    .answer_question("shared", &format!("Does 2024.1 add SSO? ({})", i))
                    .await
            })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let history = h.sessions.history("shared").await.unwrap();
    assert_eq!(history.len(), 8);
    assert_eq!(h.llm.calls(), 8);
}

#[tokio::test]
async fn test_sessions_do_not_share_history() {
    let h = harness(
        vec![Step::Reply("Version 2024.1 adds SSO login [1].\nCONFIDENCE: 0.9")],
        Arc::new(MemorySink::new()),
    )
    .await;

    h.pipeline
        .answer_question("one", "Does 2024.1 add SSO?")
        .await
        .unwrap();
    h.pipeline
        .answer_question("two", "Does 2024.1 fix export?")
        .await
        .unwrap();

    assert_eq!(h.sessions.history("one").await.unwrap().len(), 1);
    assert_eq!(h.sessions.history("two").await.unwrap().len(), 1);
    assert!(!h.llm.prompts()[1].contains("Does 2024.1 add SSO?"));
}
