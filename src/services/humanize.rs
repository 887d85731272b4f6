// Humanization Loop
// Bounded rewrite-and-rescore protocol: ask the rewrite oracle to transform
// the text, rescore it at document level, stop on target achievement or
// budget exhaustion. Rate and quota failures are hard stops; rescoring noise
// is soft and consumes one round.

use serde::Serialize;
use tracing::{info, warn};

use crate::error::Error;
use crate::models::{DocumentScore, HumanizeRequest, Tone};
use crate::services::detection::score_document;
use crate::services::providers::{BulkHumanizer, Oracle, OracleCall, REWRITE_MODEL};
use crate::services::validation::{validate_text, MAX_TEXT_LENGTH};

/// Per-call knobs for the loop.
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Stop once the rescored `humanWritten` reaches this percentage.
    pub target_score: u32,
    /// Maximum rewrite+rescore rounds.
    pub max_iterations: u32,
    pub max_text_len: usize,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            target_score: 80,
            max_iterations: 3,
            max_text_len: MAX_TEXT_LENGTH,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum LoopStatus {
    /// The target human score was reached within the budget.
    Converged,
    /// The budget ran out; the latest rewrite is returned best-effort.
    BudgetExhausted,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HumanizeOutcome {
    #[serde(rename = "humanizedText")]
    pub text: String,
    pub status: LoopStatus,
    pub rounds: u32,
    pub last_score: Option<DocumentScore>,
}

fn tone_directive(tone: Tone) -> &'static str {
    match tone {
        Tone::Casual => {
            "Favor a relaxed, conversational voice: contractions, everyday vocabulary, the occasional aside."
        }
        Tone::Professional => {
            "Keep a polished, professional register while still sounding like a person wrote it."
        }
        Tone::Preserve => {
            "Preserve the original tone and register; change only what makes the text read as machine-written."
        }
    }
}

fn build_rewrite_prompt(
    tone: Tone,
    current_score: Option<&DocumentScore>,
    round: u32,
    config: &LoopConfig,
) -> String {
    let score_line = match current_score {
        Some(score) => format!("{}% human", score.human_written),
        None => "unknown".to_string(),
    };

    format!(
        r#"You are a master at transforming AI-generated text into authentic, natural human writing.

CRITICAL: The rewritten text must pass AI detection as human-written.

Transformation strategy:
1. Break robotic patterns - vary sentence length dramatically
2. Add human imperfections - informal phrasing, contractions, colloquialisms
3. Inject personality - specific examples, personal perspective, emotional nuance
4. Avoid formulaic transitions like "Furthermore" and "Moreover" - use conversational connectors
5. Mix formal and informal vocabulary; use unexpected but fitting words
6. No overly balanced viewpoints, no formulaic structure
7. Vary paragraph length; allow rhetorical questions and fragments for emphasis

Tone: {}

Current detection score: {}
Iteration: {}/{}
Target: >={}% human detection

Transform the following text into genuinely human writing. Return only the rewritten text:"#,
        tone_directive(tone),
        score_line,
        round,
        config.max_iterations,
        config.target_score,
    )
}

/// Run the humanization loop over one request. The optional bulk humanizer is
/// tried once as a pre-pass; its failure is never fatal. Returns the latest
/// rewritten text, even when the target was never reached.
pub async fn humanize_text<O: Oracle, B: BulkHumanizer>(
    oracle: &O,
    bulk: Option<&B>,
    request: &HumanizeRequest,
    config: &LoopConfig,
) -> Result<HumanizeOutcome, Error> {
    let sanitized = validate_text(&request.text, config.max_text_len)?;

    // Init: best-effort pre-pass through the external bulk humanizer.
    let mut current = sanitized.clone();
    if let Some(bulk) = bulk {
        match bulk.humanize(&sanitized).await {
            Ok(rewritten) if !rewritten.trim().is_empty() => {
                info!("[HUMANIZE] bulk pre-pass applied");
                current = rewritten;
            }
            Ok(_) => warn!("[HUMANIZE] bulk pre-pass returned empty text, keeping original"),
            Err(err) => warn!("[HUMANIZE] bulk pre-pass failed, keeping original: {}", err),
        }
    }

    let mut last_score = request.current_score;

    for round in 1..=config.max_iterations {
        info!("[HUMANIZE] rewrite round {}/{}", round, config.max_iterations);

        // Rewriting: any transport failure here is fatal to the loop.
        let system = build_rewrite_prompt(request.tone, last_score.as_ref(), round, config);
        let rewritten = oracle
            .complete(
                OracleCall::new(&current)
                    .with_system(&system)
                    .with_model(REWRITE_MODEL)
                    .with_temperature(0.9),
            )
            .await?;
        current = rewritten;

        // Rescoring: rate and quota abort; parse noise and other transport
        // failures are inconclusive and consume the round.
        match score_document(oracle, &current).await {
            Ok(score) => {
                info!(
                    "[HUMANIZE] round {} scored {}% human",
                    round, score.human_written
                );
                if score.human_written >= config.target_score {
                    return Ok(HumanizeOutcome {
                        text: current,
                        status: LoopStatus::Converged,
                        rounds: round,
                        last_score: Some(score),
                    });
                }
                last_score = Some(score);
            }
            Err(err) if err.is_resource_limit() => return Err(err),
            Err(err) => {
                warn!("[HUMANIZE] round {} rescore inconclusive: {}", round, err);
            }
        }
    }

    Ok(HumanizeOutcome {
        text: current,
        status: LoopStatus::BudgetExhausted,
        rounds: config.max_iterations,
        last_score,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::providers::testing::{ScriptedBulk, ScriptedOracle};
    use crate::services::providers::OracleError;

    fn score_json(human: u32) -> String {
        format!(
            r#"{{"aiWritten": {}, "aiRefined": 0, "humanWritten": {}}}"#,
            100 - human,
            human
        )
    }

    fn request(text: &str) -> HumanizeRequest {
        HumanizeRequest::new(text)
    }

    fn config(target: u32, max: u32) -> LoopConfig {
        LoopConfig {
            target_score: target,
            max_iterations: max,
            ..LoopConfig::default()
        }
    }

    #[tokio::test]
    async fn test_converges_on_increasing_scores() {
        // Scores 50, 65, 82 against target 80: stop after round 3 with the
        // third rewrite's text.
        let oracle = ScriptedOracle::new(vec![
            Ok("rewrite one".to_string()),
            Ok(score_json(50)),
            Ok("rewrite two".to_string()),
            Ok(score_json(65)),
            Ok("rewrite three".to_string()),
            Ok(score_json(82)),
        ]);

        let outcome = humanize_text(&oracle, None::<&()>, &request("Original text."), &config(80, 5))
            .await
            .unwrap();

        assert_eq!(outcome.status, LoopStatus::Converged);
        assert_eq!(outcome.rounds, 3);
        assert_eq!(outcome.text, "rewrite three");
        assert_eq!(outcome.last_score.unwrap().human_written, 82);
        assert_eq!(oracle.call_count(), 6);
    }

    #[tokio::test]
    async fn test_budget_exhaustion_returns_last_text() {
        let oracle = ScriptedOracle::new(vec![
            Ok("r1".to_string()),
            Ok(score_json(40)),
            Ok("r2".to_string()),
            Ok(score_json(45)),
            Ok("r3".to_string()),
            Ok(score_json(50)),
        ]);

        let outcome = humanize_text(&oracle, None::<&()>, &request("Original."), &config(80, 3))
            .await
            .unwrap();

        assert_eq!(outcome.status, LoopStatus::BudgetExhausted);
        assert_eq!(outcome.rounds, 3);
        assert_eq!(outcome.text, "r3");
        // Exactly 3 rewrite + 3 rescore calls.
        assert_eq!(oracle.call_count(), 6);
    }

    #[tokio::test]
    async fn test_rate_limit_during_rewrite_is_fatal() {
        let oracle = ScriptedOracle::new(vec![
            Ok("r1".to_string()),
            Ok(score_json(40)),
            Err(OracleError::RateLimited),
            Ok("never requested".to_string()),
        ]);

        let err = humanize_text(&oracle, None::<&()>, &request("Original."), &config(80, 5))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::RateLimited));
        // No oracle call happens after the rate-limited one.
        assert_eq!(oracle.call_count(), 3);
    }

    #[tokio::test]
    async fn test_quota_exhausted_during_rescore_is_fatal() {
        let oracle = ScriptedOracle::new(vec![
            Ok("r1".to_string()),
            Err(OracleError::QuotaExhausted),
        ]);

        let err = humanize_text(&oracle, None::<&()>, &request("Original."), &config(80, 5))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::QuotaExhausted));
        assert_eq!(oracle.call_count(), 2);
    }

    #[tokio::test]
    async fn test_rewrite_transport_failure_is_fatal() {
        let oracle = ScriptedOracle::new(vec![Err(OracleError::Unavailable {
            status: 500,
            message: "boom".to_string(),
        })]);

        let err = humanize_text(&oracle, None::<&()>, &request("Original."), &config(80, 3))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::OracleUnavailable(_)));
    }

    #[tokio::test]
    async fn test_rescore_parse_noise_consumes_round_without_stopping() {
        let oracle = ScriptedOracle::new(vec![
            Ok("r1".to_string()),
            Ok("not json".to_string()),
            Ok("r2".to_string()),
            Ok(score_json(90)),
        ]);

        let outcome = humanize_text(&oracle, None::<&()>, &request("Original."), &config(80, 3))
            .await
            .unwrap();

        assert_eq!(outcome.status, LoopStatus::Converged);
        assert_eq!(outcome.rounds, 2);
        assert_eq!(outcome.text, "r2");
    }

    #[tokio::test]
    async fn test_invalid_input_makes_no_oracle_calls() {
        let oracle = ScriptedOracle::new(vec![]);

        let err = humanize_text(&oracle, None::<&()>, &request("   "), &config(80, 3))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        let long = "x".repeat(MAX_TEXT_LENGTH + 1);
        let err = humanize_text(&oracle, None::<&()>, &request(&long), &config(80, 3))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        assert_eq!(oracle.call_count(), 0);
    }

    #[tokio::test]
    async fn test_bulk_prepass_feeds_first_rewrite() {
        let bulk = ScriptedBulk::new(Ok("bulk rewritten".to_string()));
        let oracle = ScriptedOracle::new(vec![
            Ok("r1".to_string()),
            Ok(score_json(95)),
        ]);

        let outcome = humanize_text(&oracle, Some(&bulk), &request("Original."), &config(80, 3))
            .await
            .unwrap();

        assert_eq!(bulk.call_count(), 1);
        assert_eq!(outcome.status, LoopStatus::Converged);
        // The first rewrite call carried the pre-passed text as content.
        assert_eq!(oracle.user_prompts()[0], "bulk rewritten");
    }

    #[tokio::test]
    async fn test_bulk_prepass_failure_falls_back_to_original() {
        let bulk = ScriptedBulk::new(Err(OracleError::Unavailable {
            status: 503,
            message: "down".to_string(),
        }));
        let oracle = ScriptedOracle::new(vec![
            Ok("r1".to_string()),
            Ok(score_json(95)),
        ]);

        let outcome = humanize_text(&oracle, Some(&bulk), &request("Original text."), &config(80, 3))
            .await
            .unwrap();

        assert_eq!(outcome.status, LoopStatus::Converged);
        assert_eq!(oracle.user_prompts()[0], "Original text.");
    }
}
