//! Confidence and hallucination guard.
//!
//! The guard is the only place an answer can be accepted. It runs an
//! ordered list of rules against the synthesis outcome and its grounding
//! context; the first rule that fires escalates, and an answer is accepted
//! only when none does.

use crate::rag::types::{
    Answer, EscalationRecord, GroundingContext, GuardDecision, ReasonCode, SynthesisOutcome,
};

/// One escalation rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardRule {
    /// Nothing was retrieved to ground an answer on.
    EmptyContext,
    /// The backend could not produce an answer.
    SynthesisFailure,
    /// The model said it cannot answer from the context.
    ModelRefusal,
    /// The answer cites nothing, or cites a passage it was not given.
    CitationIntegrity,
    /// Derived confidence is below the threshold.
    ConfidenceThreshold,
}

impl GuardRule {
    /// The standard rule order.
    pub const ALL: [GuardRule; 5] = [
        GuardRule::EmptyContext,
        GuardRule::SynthesisFailure,
        GuardRule::ModelRefusal,
        GuardRule::CitationIntegrity,
        GuardRule::ConfidenceThreshold,
    ];

    /// Check this rule alone; `Some(reason)` means escalate.
    pub fn check(
        &self,
        outcome: &SynthesisOutcome,
        context: &GroundingContext,
        threshold: f32,
    ) -> Option<ReasonCode> {
        match self {
            GuardRule::EmptyContext => context.is_empty().then_some(ReasonCode::NoRelevantChunks),
            GuardRule::SynthesisFailure => matches!(outcome, SynthesisOutcome::Failed { .. })
                .then_some(ReasonCode::LowConfidence),
            GuardRule::ModelRefusal => answer(outcome)
                .filter(|a| a.refusal)
                .map(|_| ReasonCode::ModelRefusal),
            GuardRule::CitationIntegrity => answer(outcome)
                .filter(|a| !citations_grounded(a, context))
                .map(|_| ReasonCode::UngroundedClaims),
            GuardRule::ConfidenceThreshold => answer(outcome)
                .filter(|a| !(a.confidence >= threshold))
                .map(|_| ReasonCode::LowConfidence),
        }
    }
}

fn answer(outcome: &SynthesisOutcome) -> Option<&Answer> {
    match outcome {
        SynthesisOutcome::Answered(answer) => Some(answer),
        SynthesisOutcome::Failed { .. } => None,
    }
}

/// Every marker resolves into the context and there is at least one.
pub fn citations_grounded(answer: &Answer, context: &GroundingContext) -> bool {
    !answer.citations.is_empty() && answer.citations.iter().all(|m| context.contains_marker(*m))
}

/// Ordered rule list plus the confidence threshold.
#[derive(Debug, Clone)]
pub struct GuardPolicy {
    rules: Vec<GuardRule>,
    confidence_threshold: f32,
}

impl GuardPolicy {
    pub fn new(confidence_threshold: f32) -> Self {
        Self {
            rules: GuardRule::ALL.to_vec(),
            confidence_threshold,
        }
    }

    pub fn with_rules(rules: Vec<GuardRule>, confidence_threshold: f32) -> Self {
        Self {
            rules,
            confidence_threshold,
        }
    }

    pub fn confidence_threshold(&self) -> f32 {
        self.confidence_threshold
    }

    /// Escalate a question whose retrieval backend gave out before any
    /// context could be assembled.
    pub fn backend_exhausted(&self, question: &str, conversation_id: &str) -> GuardDecision {
        tracing::info!(reason = %ReasonCode::LowConfidence, "Guard escalated on backend exhaustion");
        GuardDecision::Escalate(EscalationRecord::new(
            question,
            ReasonCode::LowConfidence,
            conversation_id,
        ))
    }

    /// Accept the answer or escalate with the first failing rule's reason.
    ///
    /// A NaN confidence never passes the threshold.
    pub fn evaluate(
        &self,
        outcome: &SynthesisOutcome,
        context: &GroundingContext,
        question: &str,
        conversation_id: &str,
    ) -> GuardDecision {
        for rule in &self.rules {
            if let Some(reason) = rule.check(outcome, context, self.confidence_threshold) {
                tracing::info!(rule = ?rule, reason = %reason, "Guard escalated");
                return GuardDecision::Escalate(EscalationRecord::new(
                    question,
                    reason,
                    conversation_id,
                ));
            }
        }

        match outcome {
            SynthesisOutcome::Answered(answer) => {
                tracing::info!(confidence = answer.confidence, "Guard accepted answer");
                GuardDecision::Accept(answer.clone())
            }
            // Only reachable with a custom rule list that omits SynthesisFailure
            SynthesisOutcome::Failed { .. } => GuardDecision::Escalate(EscalationRecord::new(
                question,
                ReasonCode::LowConfidence,
                conversation_id,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Chunk;

    fn context(n: usize) -> GroundingContext {
        GroundingContext::from_chunks((0..n).map(|i| {
            (
                Chunk {
                    id: format!("c{}", i),
                    text: format!("passage {}", i),
                    source_id: "s".to_string(),
                    source_url: "https://docs.example.com".to_string(),
                    source_title: "Notes".to_string(),
                    position: 0,
                    ordinal: i as u64,
                },
                0.8,
            )
        }))
    }

    fn answered(citations: Vec<usize>, confidence: f32, refusal: bool) -> SynthesisOutcome {
        SynthesisOutcome::Answered(Answer {
            text: "Adds SSO.".to_string(),
            citations,
            confidence,
            self_reported_confidence: None,
            coverage: confidence,
            refusal,
        })
    }

    fn reason(decision: GuardDecision) -> Option<ReasonCode> {
        match decision {
            GuardDecision::Accept(_) => None,
            GuardDecision::Escalate(record) => Some(record.reason),
        }
    }

    fn evaluate(outcome: SynthesisOutcome, context: &GroundingContext) -> Option<ReasonCode> {
        reason(GuardPolicy::new(0.5).evaluate(&outcome, context, "q", "s"))
    }

    #[test]
    fn test_accepts_grounded_confident_answer() {
        assert_eq!(evaluate(answered(vec![1, 2], 0.9, false), &context(2)), None);
    }

    #[test]
    fn test_empty_context_wins_over_everything() {
        let outcomes = vec![
            answered(vec![1], 1.0, false),
            answered(vec![], 0.0, true),
            SynthesisOutcome::Failed {
                reason: "down".to_string(),
                attempts: 2,
            },
        ];

        for outcome in outcomes {
            assert_eq!(
                evaluate(outcome, &GroundingContext::default()),
                Some(ReasonCode::NoRelevantChunks)
            );
        }
    }

    #[test]
    fn test_synthesis_failure_is_low_confidence() {
        let outcome = SynthesisOutcome::Failed {
            reason: "timeout".to_string(),
            attempts: 2,
        };
        assert_eq!(evaluate(outcome, &context(1)), Some(ReasonCode::LowConfidence));
    }

    #[test]
    fn test_refusal() {
        assert_eq!(
            evaluate(answered(vec![], 0.0, true), &context(1)),
            Some(ReasonCode::ModelRefusal)
        );
    }

    #[test]
    fn test_absent_marker_is_ungrounded() {
        assert_eq!(
            evaluate(answered(vec![3], 0.9, false), &context(2)),
            Some(ReasonCode::UngroundedClaims)
        );
        assert_eq!(
            evaluate(answered(vec![1, 3], 0.9, false), &context(2)),
            Some(ReasonCode::UngroundedClaims)
        );
    }

    #[test]
    fn test_oversized_marker_is_ungrounded() {
        let raw = "Version 2024.1 adds SSO login [1] [99999999999999999999999].\nCONFIDENCE: 0.9";
        let ctx = context(2);
        let outcome = SynthesisOutcome::Answered(crate::rag::parse::parse_answer(raw, &ctx));

        assert_eq!(evaluate(outcome, &ctx), Some(ReasonCode::UngroundedClaims));
    }

    #[test]
    fn test_uncited_answer_is_ungrounded() {
        assert_eq!(
            evaluate(answered(vec![], 0.9, false), &context(2)),
            Some(ReasonCode::UngroundedClaims)
        );
    }

    #[test]
    fn test_threshold_boundary() {
        assert_eq!(
            evaluate(answered(vec![1], 0.49, false), &context(1)),
            Some(ReasonCode::LowConfidence)
        );
        assert_eq!(evaluate(answered(vec![1], 0.5, false), &context(1)), None);
        assert_eq!(
            evaluate(answered(vec![1], f32::NAN, false), &context(1)),
            Some(ReasonCode::LowConfidence)
        );
    }

    #[test]
    fn test_rules_check_in_isolation() {
        let outcome = answered(vec![3], 0.1, false);
        let ctx = context(2);

        assert_eq!(GuardRule::EmptyContext.check(&outcome, &ctx, 0.5), None);
        assert_eq!(GuardRule::ModelRefusal.check(&outcome, &ctx, 0.5), None);
        assert_eq!(
            GuardRule::CitationIntegrity.check(&outcome, &ctx, 0.5),
            Some(ReasonCode::UngroundedClaims)
        );
        assert_eq!(
            GuardRule::ConfidenceThreshold.check(&outcome, &ctx, 0.5),
            Some(ReasonCode::LowConfidence)
        );
    }

    #[test]
    fn test_custom_rule_order() {
        let policy = GuardPolicy::with_rules(
            vec![GuardRule::ConfidenceThreshold, GuardRule::CitationIntegrity],
            0.5,
        );
        let decision = policy.evaluate(&answered(vec![3], 0.1, false), &context(2), "q", "s");
        assert_eq!(reason(decision), Some(ReasonCode::LowConfidence));
    }

    #[test]
    fn test_escalation_record_fields() {
        let decision = GuardPolicy::new(0.5).evaluate(
            &answered(vec![], 0.0, true),
            &GroundingContext::default(),
            "Does 2024.1 support SSO?",
            "session-7",
        );

        match decision {
            GuardDecision::Escalate(record) => {
                assert_eq!(record.question, "Does 2024.1 support SSO?");
                assert_eq!(record.conversation_id, "session-7");
                assert_eq!(record.reason, ReasonCode::NoRelevantChunks);
            }
            other => panic!("expected escalation, got {:?}", other),
        }
    }
}
