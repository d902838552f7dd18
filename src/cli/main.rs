use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use retouch_ai::ai::{EditService, GeminiService};
use retouch_ai::config::Config;
use retouch_ai::inline::InlineImage;
use retouch_ai::session::{self, Session};

#[derive(Parser, Debug)]
#[command(
    name = "retouch-ai",
    version,
    about = "AI-powered image retouching — describe an edit in plain language and apply it with a generative vision model"
)]
struct Cli {
    /// Source image file (omit to fetch an image instead)
    #[arg(value_name = "IMAGE")]
    input: Option<PathBuf>,

    /// Fetch the source image from a URL (default: the configured default image)
    #[arg(long, value_name = "URL", conflicts_with = "input")]
    url: Option<String>,

    /// The edit to apply, in plain language
    #[arg(short, long, value_name = "TEXT")]
    prompt: Option<String>,

    /// Where to write the edited image
    #[arg(short, long, value_name = "FILE", default_value = "edited.jpg")]
    output: PathBuf,

    /// Path to config file (default: config.json next to binary)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Initialize a default config.json and exit
    #[arg(long)]
    init: bool,

    /// Output the result as JSON
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
        let config = Config::default();
        let path = cli.config.as_deref();
        config.save(path)?;
        let save_path = match path {
            Some(p) => p.to_path_buf(),
            None => Config::config_path()?,
        };
        println!("Default config written to {}", save_path.display());
        return Ok(());
    }

    let Some(prompt) = cli.prompt else {
        anyhow::bail!("No prompt given. Use --prompt to describe the edit.");
    };

    let config = Config::load(cli.config.as_deref())?;
    let service = GeminiService::from_config(&config.gemini)?;

    let mut session = Session::new();
    session.prompt = prompt;

    // Acquire the source image
    if let Some(ref path) = cli.input {
        log::info!("Reading {}", path.display());
        session::load_source_from_path(&mut session, path).await;
    } else {
        let url = cli.url.clone().unwrap_or_else(|| config.default_image_url.clone());
        log::info!("Fetching {url}");
        let client = reqwest::Client::new();
        session::load_source_from_url(&mut session, &client, &url).await;
    }
    if let Some(err) = session.error.take() {
        anyhow::bail!("{err}");
    }

    // Generate
    log::info!("Requesting edit from {}", service.name());
    session::generate(&mut session, &service).await;
    if let Some(err) = session.error.take() {
        anyhow::bail!("{err}");
    }

    // Save the edited image
    let uri = session
        .edited_image
        .as_deref()
        .context("no edited image produced")?;
    let edited = InlineImage::from_data_uri(uri).context("malformed edited image data URI")?;
    let bytes = edited
        .decode()
        .context("edited image payload is not valid base64")?;
    std::fs::write(&cli.output, &bytes)
        .with_context(|| format!("failed to write {}", cli.output.display()))?;

    if cli.json {
        let summary = serde_json::json!({
            "output": cli.output.display().to_string(),
            "bytes": bytes.len(),
            "response_text": session.response_text,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        log::info!("Edited image written to {} ({} bytes)", cli.output.display(), bytes.len());
        if !session.response_text.is_empty() {
            println!("{}", session.response_text);
        }
    }

    Ok(())
}
