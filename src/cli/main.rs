use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use cloud_vision::config::{self, FeatureConfig};
use cloud_vision::pipeline;
use cloud_vision::vision::FeatureRequest;

#[derive(Parser, Debug)]
#[command(
    name = "cloud-vision",
    version,
    about = "Annotate images with the Cloud Vision API: labels, text, faces, landmarks, logos and more"
)]
struct Cli {
    /// Image files, directories or http(s) URLs to annotate
    #[arg(value_name = "INPUT")]
    inputs: Vec<String>,

    /// Path to config file (default: config.json next to binary)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Initialize a default config.json and exit
    #[arg(long)]
    init: bool,

    /// API key (overrides the config file)
    #[arg(long, env = "VISION_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Feature to request as NAME[:MAX], e.g. `label:10` or `FACE_DETECTION` (repeatable, replaces configured features)
    #[arg(short, long = "feature", value_name = "NAME[:MAX]")]
    features: Vec<FeatureRequest>,

    /// Maximum images per API call (overrides the config file)
    #[arg(short, long)]
    batch_size: Option<usize>,

    /// Output results as JSON
    #[arg(long)]
    json: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Handle --init
    if cli.init {
        let config = config::Config::default();
        let path = cli.config.as_deref();
        config.save(path)?;
        let save_path = match path {
            Some(p) => p.to_path_buf(),
            None => config::Config::config_path()?,
        };
        println!("Default config written to {}", save_path.display());
        return Ok(());
    }

    // Load config, then apply CLI overrides
    let mut config = config::Config::load(cli.config.as_deref())?;
    if let Some(key) = cli.api_key {
        config.api_key = key;
    }
    if let Some(batch_size) = cli.batch_size {
        config.batch_size = batch_size;
    }
    if !cli.features.is_empty() {
        config.features = cli.features.into_iter().map(FeatureConfig::from).collect();
    }

    if cli.inputs.is_empty() {
        anyhow::bail!("No input files, directories or URLs specified. Use --help for usage.");
    }

    let inputs = pipeline::collect_inputs(&cli.inputs);
    if inputs.is_empty() {
        anyhow::bail!("No supported images found in the specified inputs.");
    }
    log::info!(
        "Found {} image(s) to annotate ({} file(s), {} URL(s))",
        inputs.len(),
        inputs.files.len(),
        inputs.urls.len()
    );

    let mut client = pipeline::build_client(&config)?;
    pipeline::register_inputs(&mut client, &inputs)?;

    log::info!(
        "Features: {}",
        client
            .features()
            .iter()
            .map(|f| format!("{}×{}", f.feature, f.max_results))
            .collect::<Vec<_>>()
            .join(", ")
    );

    let annotations = client.request(config.batch_size).await?;

    if cli.json {
        let json_results: Vec<serde_json::Value> = annotations
            .iter()
            .map(|(id, response)| {
                serde_json::json!({
                    "image": id,
                    "response": response,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&json_results)?);
    } else {
        print!("{}", pipeline::render_report(&annotations));
    }

    // Summary
    let failed = annotations.errors().count();
    log::info!(
        "Done: {} annotated, {failed} failed out of {} image(s)",
        annotations.len() - failed,
        annotations.len()
    );

    Ok(())
}
