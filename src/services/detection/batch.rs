// Batch Sentence Classifier
// Runs the scoring oracle over sentence units in fixed-size batches,
// zipping per-unit verdicts back positionally. Classification failures
// degrade to default verdicts; rate and quota failures abort outright.

use serde::Deserialize;
use tracing::warn;

use crate::error::Error;
use crate::models::{Classification, SentenceVerdict, TextUnit};
use crate::services::providers::{Oracle, OracleCall};

use super::json_extract::parse_payload;

/// Default number of sentence units per oracle request.
pub const DEFAULT_BATCH_SIZE: usize = 10;

const BATCH_SYSTEM_PROMPT: &str = r#"You are an expert AI content detector. You will receive a numbered list of sentences taken from one document, in order.

Classify each sentence as one of exactly: "Human", "Likely AI", or "AI".

Signals of AI authorship: formulaic transitions ("Furthermore", "Moreover"), uniform sentence rhythm, generic examples, perfectly balanced arguments, absence of contractions. Signals of human authorship: irregular sentence length, personal voice, specific anecdotes, minor imperfections, colloquialisms.

Return ONLY a JSON array with exactly one object per input sentence, in the same order:
[{"classification": "Human" | "Likely AI" | "AI", "confidence": <0.0-1.0>, "reasoning": "<one short sentence>"}, ...]

The array length MUST equal the number of input sentences. No other text."#;

/// Raw per-unit verdict as the oracle writes it. Every field is defaulted so
/// a sloppy reply still zips onto its unit.
#[derive(Debug, Deserialize)]
struct RawVerdict {
    #[serde(default)]
    classification: String,
    #[serde(default = "default_confidence")]
    confidence: f64,
    #[serde(default)]
    reasoning: String,
}

fn default_confidence() -> f64 {
    0.5
}

fn build_batch_prompt(units: &[TextUnit]) -> String {
    let mut prompt = String::from("Classify the following sentences:\n\n");
    for (i, unit) in units.iter().enumerate() {
        prompt.push_str(&format!("{}. {}\n", i + 1, unit.text));
    }
    prompt
}

/// Classify all units, preserving order. Exactly one verdict per input unit.
pub async fn classify_units<O: Oracle>(
    oracle: &O,
    units: &[TextUnit],
    batch_size: usize,
) -> Result<Vec<SentenceVerdict>, Error> {
    let batch_size = batch_size.max(1);
    let mut verdicts = Vec::with_capacity(units.len());

    for batch in units.chunks(batch_size) {
        match classify_batch(oracle, batch).await {
            Ok(mut batch_verdicts) => verdicts.append(&mut batch_verdicts),
            Err(err) if err.is_resource_limit() => return Err(err),
            Err(err) => {
                warn!("[BATCH] batch classification degraded to defaults: {}", err);
                verdicts.extend(batch.iter().map(|u| SentenceVerdict::unclassified(&u.text)));
            }
        }
    }

    Ok(verdicts)
}

async fn classify_batch<O: Oracle>(
    oracle: &O,
    batch: &[TextUnit],
) -> Result<Vec<SentenceVerdict>, Error> {
    let prompt = build_batch_prompt(batch);
    let content = oracle
        .complete(OracleCall::new(&prompt).with_system(BATCH_SYSTEM_PROMPT))
        .await?;

    let raw: Vec<RawVerdict> = parse_payload(&content)?;

    // Positional zip: verdict i belongs to unit i. Short replies are padded
    // with the default verdict, long replies truncated.
    let mut result = Vec::with_capacity(batch.len());
    let mut raw_iter = raw.into_iter();
    for unit in batch {
        match raw_iter.next() {
            Some(v) => result.push(SentenceVerdict {
                text: unit.text.clone(),
                classification: Classification::from_label(&v.classification),
                confidence: v.confidence.clamp(0.0, 1.0),
                reasoning: v.reasoning,
            }),
            None => result.push(SentenceVerdict::unclassified(&unit.text)),
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::providers::testing::ScriptedOracle;
    use crate::services::providers::OracleError;

    fn units(n: usize) -> Vec<TextUnit> {
        (0..n).map(|i| TextUnit::new(format!("Sentence {}.", i))).collect()
    }

    fn verdict_array(n: usize, label: &str) -> String {
        let items: Vec<String> = (0..n)
            .map(|_| {
                format!(
                    r#"{{"classification": "{}", "confidence": 0.9, "reasoning": "r"}}"#,
                    label
                )
            })
            .collect();
        format!("[{}]", items.join(","))
    }

    #[tokio::test]
    async fn test_one_verdict_per_unit_across_batch_sizes() {
        for (n, b) in [(7usize, 3usize), (10, 10), (10, 4), (1, 10), (25, 10)] {
            let batches = n.div_ceil(b);
            let replies = (0..batches)
                .map(|_| Ok(verdict_array(b, "Human")))
                .collect();
            let oracle = ScriptedOracle::new(replies);
            let verdicts = classify_units(&oracle, &units(n), b).await.unwrap();
            assert_eq!(verdicts.len(), n, "n={n} b={b}");
            assert_eq!(oracle.call_count(), batches);
        }
    }

    #[tokio::test]
    async fn test_order_preserved() {
        let oracle = ScriptedOracle::new(vec![Ok(verdict_array(3, "AI"))]);
        let verdicts = classify_units(&oracle, &units(3), 10).await.unwrap();
        for (i, v) in verdicts.iter().enumerate() {
            assert_eq!(v.text, format!("Sentence {}.", i));
            assert_eq!(v.classification, Classification::Ai);
        }
    }

    #[tokio::test]
    async fn test_short_reply_padded_with_defaults() {
        let oracle = ScriptedOracle::new(vec![Ok(verdict_array(2, "Human"))]);
        let verdicts = classify_units(&oracle, &units(4), 10).await.unwrap();
        assert_eq!(verdicts.len(), 4);
        assert_eq!(verdicts[1].classification, Classification::Human);
        assert_eq!(verdicts[2].classification, Classification::LikelyAi);
        assert_eq!(verdicts[2].reasoning, "Unable to classify");
        assert!((verdicts[3].confidence - 0.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_rate_limit_aborts_remaining_batches() {
        let oracle = ScriptedOracle::new(vec![
            Ok(verdict_array(2, "Human")),
            Err(OracleError::RateLimited),
            Ok(verdict_array(2, "Human")),
        ]);
        let err = classify_units(&oracle, &units(6), 2).await.unwrap_err();
        assert!(matches!(err, Error::RateLimited));
        // The third batch was never requested.
        assert_eq!(oracle.call_count(), 2);
    }

    #[tokio::test]
    async fn test_quota_exhausted_aborts() {
        let oracle = ScriptedOracle::new(vec![Err(OracleError::QuotaExhausted)]);
        let err = classify_units(&oracle, &units(3), 10).await.unwrap_err();
        assert!(matches!(err, Error::QuotaExhausted));
    }

    #[tokio::test]
    async fn test_parse_failure_degrades_batch_and_continues() {
        let oracle = ScriptedOracle::new(vec![
            Ok("no json at all".to_string()),
            Ok(verdict_array(2, "Human")),
        ]);
        let verdicts = classify_units(&oracle, &units(4), 2).await.unwrap();
        assert_eq!(verdicts.len(), 4);
        assert_eq!(verdicts[0].classification, Classification::LikelyAi);
        assert_eq!(verdicts[3].classification, Classification::Human);
        assert_eq!(oracle.call_count(), 2);
    }

    #[tokio::test]
    async fn test_transport_failure_degrades_batch() {
        let oracle = ScriptedOracle::new(vec![
            Err(OracleError::Unavailable { status: 503, message: "down".to_string() }),
            Ok(verdict_array(1, "AI")),
        ]);
        let verdicts = classify_units(&oracle, &units(3), 2).await.unwrap();
        assert_eq!(verdicts.len(), 3);
        assert_eq!(verdicts[0].reasoning, "Unable to classify");
        assert_eq!(verdicts[2].classification, Classification::Ai);
    }
}
