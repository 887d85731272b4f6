// Aggregation / Synthesis
// Combines per-sentence verdicts into a document-level score and summary.
// Primary path asks the oracle to synthesize; a deterministic count-based
// fallback covers parse failures and non-fatal transport failures.

use serde::Deserialize;
use tracing::warn;

use crate::error::Error;
use crate::models::{Classification, DocumentScore, SentenceVerdict};
use crate::services::providers::{Oracle, OracleCall};

use super::json_extract::parse_payload;

const SYNTHESIS_SYSTEM_PROMPT: &str = r#"You are an expert AI content detector. You will receive per-sentence classification verdicts for one document.

Synthesize them into document-level percentages and a one-sentence summary of the document's authorship character.

Return ONLY a JSON object:
{"aiWritten": <0-100>, "aiRefined": <0-100>, "humanWritten": <0-100>, "summary": "<one sentence>"}

The three scores should sum to 100. No other text."#;

const FALLBACK_SUMMARY: &str =
    "Document-level synthesis was unavailable; scores reflect per-sentence classification counts.";

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct RawSynthesis {
    #[serde(default)]
    ai_written: f64,
    #[serde(default)]
    ai_refined: f64,
    #[serde(default)]
    human_written: f64,
    #[serde(default)]
    summary: Option<String>,
}

fn build_synthesis_prompt(verdicts: &[SentenceVerdict]) -> String {
    let mut prompt = String::from("Per-sentence verdicts, in document order:\n\n");
    for (i, v) in verdicts.iter().enumerate() {
        prompt.push_str(&format!(
            "{}. [{}] (confidence {:.2}) {}\n",
            i + 1,
            v.classification.label(),
            v.confidence,
            v.text
        ));
    }
    prompt
}

/// Synthesize document-level scores and a summary from sentence verdicts.
/// Rate and quota failures propagate; everything else falls back to the
/// deterministic count formula.
pub async fn synthesize<O: Oracle>(
    oracle: &O,
    verdicts: &[SentenceVerdict],
) -> Result<(DocumentScore, String), Error> {
    match try_synthesize(oracle, verdicts).await {
        Ok(result) => Ok(result),
        Err(err) if err.is_resource_limit() => Err(err),
        Err(err) => {
            warn!("[AGGREGATION] synthesis failed, using fallback: {}", err);
            Ok(fallback_synthesis(verdicts))
        }
    }
}

async fn try_synthesize<O: Oracle>(
    oracle: &O,
    verdicts: &[SentenceVerdict],
) -> Result<(DocumentScore, String), Error> {
    let prompt = build_synthesis_prompt(verdicts);
    let content = oracle
        .complete(OracleCall::new(&prompt).with_system(SYNTHESIS_SYSTEM_PROMPT))
        .await?;

    let raw: RawSynthesis = parse_payload(&content)?;
    let score = DocumentScore::normalized(raw.ai_written, raw.ai_refined, raw.human_written);
    let summary = raw
        .summary
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| FALLBACK_SUMMARY.to_string());

    Ok((score, summary))
}

/// Count-based percentage split over the verdict list. Always sums to 100
/// for a non-empty list.
pub fn fallback_synthesis(verdicts: &[SentenceVerdict]) -> (DocumentScore, String) {
    let total = verdicts.len().max(1) as f64;
    let count = |class: Classification| {
        verdicts.iter().filter(|v| v.classification == class).count() as f64
    };

    let score = DocumentScore::normalized(
        100.0 * count(Classification::Ai) / total,
        100.0 * count(Classification::LikelyAi) / total,
        100.0 * count(Classification::Human) / total,
    );

    (score, FALLBACK_SUMMARY.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::providers::testing::ScriptedOracle;
    use crate::services::providers::OracleError;

    fn verdicts(ai: usize, likely: usize, human: usize) -> Vec<SentenceVerdict> {
        let mut out = Vec::new();
        for _ in 0..ai {
            out.push(SentenceVerdict {
                text: "s.".to_string(),
                classification: Classification::Ai,
                confidence: 0.8,
                reasoning: "r".to_string(),
            });
        }
        for _ in 0..likely {
            out.push(SentenceVerdict::unclassified("s."));
        }
        for _ in 0..human {
            out.push(SentenceVerdict {
                text: "s.".to_string(),
                classification: Classification::Human,
                confidence: 0.9,
                reasoning: "r".to_string(),
            });
        }
        out
    }

    #[tokio::test]
    async fn test_synthesis_happy_path() {
        let oracle = ScriptedOracle::new(vec![Ok(
            r#"Here you go: {"aiWritten": 60, "aiRefined": 25, "humanWritten": 15, "summary": "Mostly machine written."}"#
                .to_string(),
        )]);
        let (score, summary) = synthesize(&oracle, &verdicts(3, 1, 1)).await.unwrap();
        assert_eq!(score.ai_written, 60);
        assert_eq!(score.total(), 100);
        assert_eq!(summary, "Mostly machine written.");
    }

    #[tokio::test]
    async fn test_malformed_synthesis_uses_fallback() {
        let oracle = ScriptedOracle::new(vec![Ok("I refuse to answer in JSON".to_string())]);
        let (score, summary) = synthesize(&oracle, &verdicts(2, 1, 1)).await.unwrap();
        assert_eq!(score.total(), 100);
        assert_eq!(score.ai_written, 50);
        assert_eq!(summary, FALLBACK_SUMMARY);
    }

    #[tokio::test]
    async fn test_transport_failure_uses_fallback() {
        let oracle = ScriptedOracle::new(vec![Err(OracleError::Unavailable {
            status: 500,
            message: "boom".to_string(),
        })]);
        let (score, _) = synthesize(&oracle, &verdicts(0, 0, 4)).await.unwrap();
        assert_eq!(score.human_written, 100);
    }

    #[tokio::test]
    async fn test_rate_limit_propagates() {
        let oracle = ScriptedOracle::new(vec![Err(OracleError::RateLimited)]);
        let err = synthesize(&oracle, &verdicts(1, 1, 1)).await.unwrap_err();
        assert!(matches!(err, Error::RateLimited));
    }

    #[test]
    fn test_fallback_sums_to_100_for_any_mix() {
        for ai in 0..6 {
            for likely in 0..6 {
                for human in 0..6 {
                    if ai + likely + human == 0 {
                        continue;
                    }
                    let (score, _) = fallback_synthesis(&verdicts(ai, likely, human));
                    assert_eq!(score.total(), 100, "mix ({ai}, {likely}, {human})");
                }
            }
        }
    }

    #[tokio::test]
    async fn test_synthesis_scores_are_normalized() {
        // Oracle scores that sum to 99 after rounding still come out at 100.
        let oracle = ScriptedOracle::new(vec![Ok(
            r#"{"aiWritten": 33, "aiRefined": 33, "humanWritten": 33, "summary": "Even."}"#.to_string(),
        )]);
        let (score, _) = synthesize(&oracle, &verdicts(1, 1, 1)).await.unwrap();
        assert_eq!(score.total(), 100);
    }
}
