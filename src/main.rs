use anyhow::{Result, bail};
use tracing::info;
use tracing_subscriber::EnvFilter;

use lesson_player::config::Config;
use lesson_player::player::bootstrap::provisioning_plan;
use lesson_player::player::source::SourceClassifier;

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("lesson_player=debug")),
        )
        .init();

    let references: Vec<String> = std::env::args().skip(1).collect();
    if references.is_empty() {
        bail!("usage: lesson-player <reference>...");
    }

    let config = Config::load()?;
    info!("Loaded configuration from {:?}", Config::config_path()?);
    let classifier = SourceClassifier::new(&config.sources);

    for reference in &references {
        let kind = classifier.classify(reference);
        println!("{reference}");
        println!("  backend: {kind}");
        if let Some(id) = classifier.remote_content_id(reference) {
            println!("  content id: {id}");
        }
        for step in provisioning_plan(kind, &config.bootstrap) {
            println!("  - {step}");
        }
    }

    Ok(())
}
