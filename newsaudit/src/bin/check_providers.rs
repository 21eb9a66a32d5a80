//! Smoke test for the configured analyzer and validator endpoints.
//! Sends one sample article through both roles and prints what came back.

use std::path::PathBuf;

use common::Config;
use newsaudit::analyzer::{Analyzer, ANALYZER_SYSTEM_PROMPT};
use newsaudit::extraction::RetryPolicy;
use newsaudit::extraction_client;
use newsaudit::model::Article;
use newsaudit::validator::{Validator, VALIDATOR_SYSTEM_PROMPT};

const SAMPLE_TEXT: &str = "The Reserve Bank of India kept its benchmark repo rate unchanged on Friday, \
citing easing inflation and steady growth. The governor said the central bank would remain watchful \
of food prices, while opposition leaders criticised the government for slow job creation.";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let override_path = std::env::args().nth(1).map(PathBuf::from);
    let default_path = PathBuf::from("config.default.toml");
    let config = Config::load_with_defaults(Some(default_path.as_path()), override_path.as_deref()).await?;

    let analyzer_settings = config.analyzer.resolve("analyzer")?;
    let validator_settings = config.validator.resolve("validator")?;

    println!("\n{}", "=".repeat(60));
    println!("Checking LLM providers");
    println!("Analyzer:  {} ({})", analyzer_settings.model, analyzer_settings.api_url);
    println!("Validator: {} ({})", validator_settings.model, validator_settings.api_url);
    println!("{}", "=".repeat(60));

    // One attempt each: a failure here should surface immediately
    let retry = RetryPolicy {
        max_attempts: 1,
        ..RetryPolicy::default()
    };
    let analyzer = Analyzer::new(
        extraction_client(&analyzer_settings, ANALYZER_SYSTEM_PROMPT, retry),
        config.pipeline.sentiment_policy.unwrap_or_default(),
    );
    let validator = Validator::new(extraction_client(&validator_settings, VALIDATOR_SYSTEM_PROMPT, retry));

    let article = Article {
        id: 1,
        title: "RBI holds repo rate steady".to_string(),
        text: SAMPLE_TEXT.to_string(),
        url: "https://example.com/rbi".to_string(),
        source: "Sample".to_string(),
        author: None,
        published_at: None,
    };

    println!("\n[1/2] Analyzing sample article...");
    let analysis = match analyzer.analyze(&article).await {
        Ok(a) => {
            println!("✓ Success!");
            println!("  Gist: {}", a.gist);
            println!("  Sentiment: {}", a.sentiment);
            println!("  Tone: {}", a.tone);
            if !a.anomalies.is_empty() {
                println!("  Anomalies: {:?}", a.anomalies);
            }
            a
        }
        Err(e) => {
            eprintln!("✗ Failed: {}", e);
            std::process::exit(1);
        }
    };

    println!("\n[2/2] Validating the analysis...");
    match validator.validate(&article, &analysis).await {
        Ok(v) => {
            println!("✓ Success!");
            println!("  Accurate: {}", v.is_accurate);
            println!("  Notes: {}", v.notes);
            if let Some(corrected) = v.corrected_sentiment {
                println!("  Corrected sentiment: {}", corrected);
            }
        }
        Err(e) => {
            eprintln!("✗ Failed: {}", e);
            std::process::exit(1);
        }
    }

    println!("\n{}", "=".repeat(60));
    println!("Providers OK");
    println!("{}", "=".repeat(60));
    Ok(())
}
