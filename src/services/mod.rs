// Service modules

pub mod config_store;
pub mod detection;
pub mod humanize;
pub mod providers;
pub mod segmenter;
pub mod validation;

pub use config_store::{AppConfig, ConfigStore};
pub use detection::{run_detection, score_document, DetectionConfig};
pub use humanize::{humanize_text, HumanizeOutcome, LoopConfig, LoopStatus};
pub use providers::{BulkHumanizer, GatewayClient, HumanizeApiClient, Oracle, OracleError};
pub use segmenter::{split_sentences, word_count};
pub use validation::{sanitize_text, validate_text, MAX_TEXT_LENGTH};
