use std::io::Read;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use miro_write::models::{HumanizeRequest, SessionRound, Tone};
use miro_write::services::detection::run_detection;
use miro_write::services::humanize::{humanize_text, LoopConfig};
use miro_write::services::providers::{get_api_key, GatewayClient, HumanizeApiClient};
use miro_write::services::{split_sentences, word_count, ConfigStore};

fn preview(s: &str, max_chars: usize) -> String {
    let mut out: String = s.chars().take(max_chars).collect();
    if s.chars().count() > max_chars {
        out.push_str("...");
    }
    out.replace('\n', " ")
}

fn parse_arg_value(args: &[String], key: &str) -> Option<String> {
    args.iter()
        .position(|a| a == key)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

fn has_flag(args: &[String], key: &str) -> bool {
    args.iter().any(|a| a == key)
}

fn render_report(report: &miro_write::models::DetectionReport) -> String {
    let mut out = String::new();
    out.push_str("AI Detection Report\n");
    out.push_str(&format!(
        "Generated: {}\n",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    ));
    out.push_str(&format!("Request: {}\n\n", report.request_id));
    out.push_str("Overall\n");
    out.push_str(&format!("  AI-written:    {}%\n", report.overall_scores.ai_written));
    out.push_str(&format!("  AI-refined:    {}%\n", report.overall_scores.ai_refined));
    out.push_str(&format!("  Human-written: {}%\n", report.overall_scores.human_written));
    out.push_str(&format!("  Words: {}\n\n", report.word_count));
    out.push_str(&format!("Summary\n  {}\n\n", report.summary));
    out.push_str(&format!("Sentences ({})\n", report.sentences.len()));
    for (i, s) in report.sentences.iter().enumerate() {
        out.push_str(&format!(
            "  [{:04}] {:<9} {:>3.0}%  {}\n         {}\n",
            i + 1,
            s.classification.label(),
            s.confidence * 100.0,
            preview(&s.text, 100),
            preview(&s.reasoning, 120),
        ));
    }
    out
}

#[tokio::main]
async fn main() -> Result<()> {
    miro_write::init_logging();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        eprintln!(
            "Usage:\n  cargo run --bin analyze_text -- <path|-> [--detect] [--humanize] [--tone <casual|professional|preserve>] [--target <pct>] [--iterations <n>] [--timeout-secs <n>] [--out <path>]\n\nWith no mode flag, prints sentence segmentation and word count only.\nReads from stdin when the path is '-'."
        );
        return Ok(());
    }

    let path = args[1].clone();
    let do_detect = has_flag(&args, "--detect");
    let do_humanize = has_flag(&args, "--humanize");
    let tone = match parse_arg_value(&args, "--tone").as_deref() {
        Some("professional") => Tone::Professional,
        Some("preserve") => Tone::Preserve,
        _ => Tone::Casual,
    };
    // Stored per-install defaults; command-line flags win.
    let app_config = ConfigStore::default_config_dir()
        .map(|dir| ConfigStore::new(dir).load().unwrap_or_default())
        .unwrap_or_default();
    let loop_defaults = app_config.loop_config();

    let target: u32 = parse_arg_value(&args, "--target")
        .and_then(|s| s.parse().ok())
        .unwrap_or(loop_defaults.target_score);
    let iterations: u32 = parse_arg_value(&args, "--iterations")
        .and_then(|s| s.parse().ok())
        .unwrap_or(loop_defaults.max_iterations);
    let timeout_secs: u64 = parse_arg_value(&args, "--timeout-secs")
        .and_then(|s| s.parse().ok())
        .unwrap_or(120);
    let out_path = parse_arg_value(&args, "--out");

    let text = if path == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("read stdin failed")?;
        buf
    } else {
        std::fs::read_to_string(&path).with_context(|| format!("read file failed: {}", path))?
    };

    if !do_detect && !do_humanize {
        let units = split_sentences(&text);
        println!("Sentences: {}", units.len());
        println!("Words: {}", word_count(&text));
        println!();
        for (i, u) in units.iter().enumerate() {
            println!("[S{:04}] chars={}  {}", i + 1, u.text.chars().count(), preview(&u.text, 120));
        }
        return Ok(());
    }

    let Some(api_key) = get_api_key("gateway") else {
        bail!("no gateway API key found; set GATEWAY_API_KEY or store one in the config");
    };
    let oracle = GatewayClient::new(api_key).with_timeout(Duration::from_secs(timeout_secs));
    let detection_config = app_config.detection_config();

    if do_detect && !do_humanize {
        let report = run_detection(&oracle, &text, &detection_config).await?;
        let rendered = render_report(&report);
        println!("{}", rendered);
        if let Some(out_path) = out_path {
            std::fs::write(&out_path, serde_json::to_string_pretty(&report)?)
                .with_context(|| format!("write out failed: {}", out_path))?;
            println!("Wrote JSON: {}", out_path);
        }
        return Ok(());
    }

    // Humanize: score first so the loop starts from a known baseline, then
    // rescore the final text for a before/after session history.
    let mut history: Vec<SessionRound> = Vec::new();

    let before = run_detection(&oracle, &text, &detection_config).await?;
    println!(
        "Initial: {}% human ({} words)",
        before.overall_scores.human_written, before.word_count
    );
    history.push(SessionRound {
        round: 0,
        text: text.clone(),
        report: before.clone(),
    });

    let mut request = HumanizeRequest::new(&text);
    request.current_score = Some(before.overall_scores);
    request.tone = tone;
    let loop_config = LoopConfig {
        target_score: target,
        max_iterations: iterations,
        ..loop_defaults
    };

    let bulk = get_api_key("humanizeai").map(HumanizeApiClient::new);
    let outcome = humanize_text(&oracle, bulk.as_ref(), &request, &loop_config).await?;
    println!(
        "Loop finished after {} round(s): {:?}",
        outcome.rounds, outcome.status
    );

    let after = run_detection(&oracle, &outcome.text, &detection_config).await?;
    println!(
        "Final: {}% human ({} words)",
        after.overall_scores.human_written, after.word_count
    );
    history.push(SessionRound {
        round: outcome.rounds,
        text: outcome.text.clone(),
        report: after.clone(),
    });

    println!();
    println!("{}", render_report(&after));
    println!();
    println!("=== Humanized text ===");
    println!("{}", outcome.text);

    if let Some(out_path) = out_path {
        std::fs::write(&out_path, serde_json::to_string_pretty(&history)?)
            .with_context(|| format!("write out failed: {}", out_path))?;
        println!("Wrote JSON: {}", out_path);
    }

    Ok(())
}
