// Miro Write Data Models
// Wire names follow the camelCase JSON shape consumed by the frontend.

use serde::{Deserialize, Serialize};

// ============ Text Units ============

/// One sentence-granularity segment of the input document.
/// Created by the segmenter, consumed by the batch classifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextUnit {
    pub text: String,
}

impl TextUnit {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

// ============ Sentence Verdicts ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Classification {
    Human,
    #[serde(rename = "Likely AI")]
    LikelyAi,
    #[serde(rename = "AI")]
    Ai,
}

impl Classification {
    /// Lenient label parsing for oracle output. Unknown labels land on
    /// `LikelyAi`, the same default the classifier uses for missing verdicts.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "human" => Classification::Human,
            "ai" => Classification::Ai,
            "likely ai" | "likely-ai" => Classification::LikelyAi,
            _ => Classification::LikelyAi,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Classification::Human => "Human",
            Classification::LikelyAi => "Likely AI",
            Classification::Ai => "AI",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentenceVerdict {
    pub text: String,
    pub classification: Classification,
    pub confidence: f64,
    pub reasoning: String,
}

impl SentenceVerdict {
    /// Substitute verdict for units the oracle could not classify.
    pub fn unclassified(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            classification: Classification::LikelyAi,
            confidence: 0.5,
            reasoning: "Unable to classify".to_string(),
        }
    }
}

// ============ Document Score ============

/// Document-level percentage split. The three buckets always sum to exactly
/// 100; the only way to build one is through `normalized`, which repairs
/// whatever the oracle returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentScore {
    pub ai_written: u32,
    pub ai_refined: u32,
    pub human_written: u32,
}

impl DocumentScore {
    /// Clamp negatives, rescale proportionally to 100, round, and assign the
    /// rounding residual to the largest bucket. An all-zero input carries no
    /// signal and becomes an even split.
    pub fn normalized(ai_written: f64, ai_refined: f64, human_written: f64) -> Self {
        let ai = ai_written.max(0.0);
        let refined = ai_refined.max(0.0);
        let human = human_written.max(0.0);

        let sum = ai + refined + human;
        if sum <= f64::EPSILON {
            return Self {
                ai_written: 34,
                ai_refined: 33,
                human_written: 33,
            };
        }

        let scale = 100.0 / sum;
        let mut a = (ai * scale).round() as i64;
        let mut r = (refined * scale).round() as i64;
        let mut h = (human * scale).round() as i64;

        let residual = 100 - (a + r + h);
        if a >= r && a >= h {
            a += residual;
        } else if r >= h {
            r += residual;
        } else {
            h += residual;
        }

        Self {
            ai_written: a.max(0) as u32,
            ai_refined: r.max(0) as u32,
            human_written: h.max(0) as u32,
        }
    }

    pub fn total(&self) -> u32 {
        self.ai_written + self.ai_refined + self.human_written
    }
}

// ============ Detection Report ============

/// One analysis pass over a document. Superseded, never mutated, on
/// re-analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionReport {
    pub overall_scores: DocumentScore,
    pub summary: String,
    pub sentences: Vec<SentenceVerdict>,
    pub word_count: usize,
    pub request_id: String,
}

// ============ Humanization ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    #[default]
    Casual,
    Professional,
    Preserve,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HumanizeRequest {
    pub text: String,
    #[serde(default)]
    pub current_score: Option<DocumentScore>,
    #[serde(default)]
    pub tone: Tone,
}

impl HumanizeRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            current_score: None,
            tone: Tone::default(),
        }
    }
}

// ============ Session History ============

/// Append-only history entry. Held by the caller; the core only produces the
/// material for the next entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRound {
    pub round: u32,
    pub text: String,
    pub report: DetectionReport,
}
