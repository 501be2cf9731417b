//! Cross-module tests and the fakes they share.

mod pipeline_scenarios;

pub(crate) mod fakes {
    use crate::embeddings::EmbeddingProvider;
    use crate::escalation::EscalationSink;
    use crate::rag::types::EscalationRecord;
    use async_trait::async_trait;
    use relnotes_core::{AppError, AppResult};
    use relnotes_llm::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// One scripted backend reaction.
    #[derive(Debug, Clone, Copy)]
    pub enum Step {
        Reply(&'static str),
        Unavailable,
        Timeout,
        BadRequest,
        /// Never answers; the caller's deadline has to fire
        Hang,
    }

    /// Language model that plays back a script, repeating the last step.
    pub struct ScriptedLlm {
        script: Vec<Step>,
        calls: AtomicU32,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedLlm {
        pub fn new(script: Vec<Step>) -> Self {
            assert!(!script.is_empty());
            Self {
                script,
                calls: AtomicU32::new(0),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }

        pub fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        fn provider_name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) as usize;
            self.prompts.lock().unwrap().push(request.prompt.clone());

            match self.script[n.min(self.script.len() - 1)] {
                Step::Reply(text) => Ok(LlmResponse {
                    content: text.to_string(),
                    model: request.model.clone(),
                    usage: LlmUsage::new(10, 5),
                }),
                Step::Unavailable => Err(AppError::BackendUnavailable("scripted outage".into())),
                Step::Timeout => Err(AppError::BackendTimeout("scripted timeout".into())),
                Step::BadRequest => Err(AppError::Llm("scripted bad request".into())),
                Step::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Err(AppError::Other("hang finished".into()))
                }
            }
        }
    }

    /// One dimension per keyword, set when the lowercased text contains it.
    #[derive(Debug)]
    pub struct KeywordEmbedder {
        keywords: Vec<&'static str>,
    }

    impl KeywordEmbedder {
        pub fn new(keywords: &[&'static str]) -> Self {
            Self {
                keywords: keywords.to_vec(),
            }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for KeywordEmbedder {
        fn provider_name(&self) -> &str {
            "keyword"
        }

        fn model_name(&self) -> &str {
            "keyword-test"
        }

        fn dimensions(&self) -> usize {
            self.keywords.len()
        }

        async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|text| {
                    let lower = text.to_lowercase();
                    self.keywords
                        .iter()
                        .map(|k| if lower.contains(k) { 1.0 } else { 0.0 })
                        .collect()
                })
                .collect())
        }
    }

    /// Embedder whose backend is down.
    #[derive(Debug)]
    pub struct UnreachableEmbedder;

    #[async_trait]
    impl EmbeddingProvider for UnreachableEmbedder {
        fn provider_name(&self) -> &str {
            "unreachable"
        }

        fn model_name(&self) -> &str {
            "none"
        }

        fn dimensions(&self) -> usize {
            4
        }

        async fn embed_batch(&self, _texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
            Err(AppError::BackendUnavailable("embedding service down".into()))
        }
    }

    /// Sink that always fails to record.
    pub struct FailingSink;

    #[async_trait]
    impl EscalationSink for FailingSink {
        async fn record(&self, _record: &EscalationRecord) -> AppResult<()> {
            Err(AppError::Ledger("ledger offline".into()))
        }
    }

    /// Sink whose ledger never answers.
    pub struct HangingSink;

    #[async_trait]
    impl EscalationSink for HangingSink {
        async fn record(&self, _record: &EscalationRecord) -> AppResult<()> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }
    }
}
