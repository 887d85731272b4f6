// Detection Module
// AI authorship detection organized into specialized submodules:
// - json_extract: balanced-JSON-span extraction from free-form completions
// - batch: per-sentence classification in fixed-size batches
// - aggregation: document-level synthesis with deterministic fallback

pub mod aggregation;
pub mod batch;
pub mod json_extract;

use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::error::Error;
use crate::models::DetectionReport;
use crate::services::providers::{Oracle, OracleCall, REWRITE_MODEL};
use crate::services::segmenter::{split_sentences, word_count};
use crate::services::validation::{validate_text, MAX_TEXT_LENGTH};

pub use aggregation::{fallback_synthesis, synthesize};
pub use batch::{classify_units, DEFAULT_BATCH_SIZE};
pub use json_extract::{extract_json, parse_payload, ParseFailure};

const DOCUMENT_SCORE_SYSTEM_PROMPT: &str = r#"You are an elite AI content detector with advanced pattern recognition. Analyze the given text with extreme precision.

Return ONLY a JSON object with three scores that MUST sum to exactly 100:
{"aiWritten": <0-100>, "aiRefined": <0-100>, "humanWritten": <0-100>}

Score aiWritten higher for repetitive structure, formulaic transitions, perfectly balanced arguments, and flawless generic prose. Score aiRefined higher for human ideas with unnaturally polished execution. Score humanWritten higher for irregular rhythm, personal voice, vivid specifics, and natural imperfections. No other text."#;

/// Per-call knobs for the detection pipeline.
#[derive(Debug, Clone)]
pub struct DetectionConfig {
    pub batch_size: usize,
    pub max_text_len: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            max_text_len: MAX_TEXT_LENGTH,
        }
    }
}

/// Full detection pass: validate, segment, classify per sentence in batches,
/// synthesize document-level scores and a summary.
pub async fn run_detection<O: Oracle>(
    oracle: &O,
    text: &str,
    config: &DetectionConfig,
) -> Result<DetectionReport, Error> {
    let sanitized = validate_text(text, config.max_text_len)?;
    let units = split_sentences(&sanitized);
    info!("[DETECTION] analyzing {} sentence units", units.len());

    let sentences = classify_units(oracle, &units, config.batch_size).await?;
    let (overall_scores, summary) = synthesize(oracle, &sentences).await?;

    Ok(DetectionReport {
        overall_scores,
        summary,
        sentences,
        word_count: word_count(&sanitized),
        request_id: Uuid::new_v4().to_string(),
    })
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct RawScores {
    #[serde(default)]
    ai_written: f64,
    #[serde(default)]
    ai_refined: f64,
    #[serde(default)]
    human_written: f64,
}

/// Single-shot whole-document scoring. Used by the humanization loop, which
/// only needs the three aggregate numbers to decide whether to continue.
/// Runs on the cheaper flash tier since it is called once per rewrite round.
/// There is no aggregate to fall back on here, so a parse failure surfaces
/// to the caller.
pub async fn score_document<O: Oracle>(
    oracle: &O,
    text: &str,
) -> Result<crate::models::DocumentScore, Error> {
    let prompt = format!("Text to analyze:\n{}", text);
    let content = oracle
        .complete(
            OracleCall::new(&prompt)
                .with_system(DOCUMENT_SCORE_SYSTEM_PROMPT)
                .with_model(REWRITE_MODEL)
                .with_temperature(0.2),
        )
        .await?;

    let raw: RawScores = parse_payload(&content)?;
    Ok(crate::models::DocumentScore::normalized(
        raw.ai_written,
        raw.ai_refined,
        raw.human_written,
    ))
}
