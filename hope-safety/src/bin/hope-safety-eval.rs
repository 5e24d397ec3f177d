//! hope-safety-eval - run one message turn through the safety core
//!
//! Reads a ClinicalAssessment JSON file and a candidate response, then prints
//! the SafetyEvaluation and the Decision as JSON on stdout.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use clinical::ClinicalAssessment;
use hope_safety::{DecisionContext, DecisionEngine, EvaluationRequest, SafetyConfig, SafetyPipeline};

#[derive(Parser, Debug, Clone)]
#[command(name = "hope-safety-eval")]
#[command(about = "Evaluate a candidate response against a clinical assessment")]
struct Args {
    /// Safety configuration file (YAML)
    #[arg(long, env = "HOPE_SAFETY_CONFIG")]
    config: Option<PathBuf>,

    /// ClinicalAssessment JSON file
    #[arg(long)]
    assessment: PathBuf,

    /// Candidate response text
    #[arg(long)]
    response: String,

    /// ISO country code for crisis resources
    #[arg(long, env = "HOPE_COUNTRY")]
    country: Option<String>,

    /// User's message, for the linguistic pre-screen
    #[arg(long)]
    raw_text: Option<String>,

    /// Messages so far in the session
    #[arg(long, default_value = "0")]
    message_count: u32,

    /// Log level
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,
}

fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("hope_safety={},warn", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = match &args.config {
        Some(path) => SafetyConfig::from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => SafetyConfig::default(),
    };

    let text = std::fs::read_to_string(&args.assessment)
        .with_context(|| format!("reading assessment from {}", args.assessment.display()))?;
    let assessment: ClinicalAssessment = serde_json::from_str(&text).context("parsing assessment JSON")?;
    if let Err(e) = assessment.validate() {
        warn!(error = %e, "Assessment out of contract, normalizing");
    }
    let assessment = assessment.sanitized();

    let pipeline = SafetyPipeline::from_config(&config)?;
    info!(
        severity = %assessment.predicted_severity(),
        countries = pipeline.escalation_manager().resolver().supported_countries().len(),
        "Evaluating message"
    );

    let decision = DecisionEngine::new()
        .decide(&DecisionContext::new(&assessment).with_message_count(args.message_count));

    let mut request = EvaluationRequest::new(assessment, args.response);
    request.country_code = args.country;
    request.raw_text = args.raw_text;
    let evaluation = pipeline.evaluate(&request);

    let output = serde_json::json!({
        "evaluation": evaluation,
        "decision": decision,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}
