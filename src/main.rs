//! # Notion Clipper CLI (`nclip`)
//!
//! The `nclip` binary drives the clipping pipeline from the command line:
//! fetch the target database's schema, process text and files with an AI
//! backend, refine the structured result, and publish it as a page.
//!
//! ## Usage
//!
//! ```bash
//! nclip --config ./nclip.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `nclip connections` | List configured database connections |
//! | `nclip schema` | Fetch and print the active database's field schema |
//! | `nclip models` | List known model identifiers per AI provider |
//! | `nclip process` | Turn text/files into structured content |
//! | `nclip refine` | Apply a refinement instruction to saved content |
//! | `nclip publish` | Publish saved content as a page |
//! | `nclip run` | Process, optionally refine, then publish in one go |
//!
//! ## Examples
//!
//! ```bash
//! # Inspect the active database
//! nclip schema --config ./nclip.toml
//!
//! # Process meeting notes plus an attachment, keep the result for editing
//! nclip process --text "Meeting notes..." --file slides.pptx --out content.json
//!
//! # Refine the saved result
//! nclip refine --content content.json --instruction "shorten the summary" --out content.json
//!
//! # Publish it
//! nclip publish --content content.json --text "Meeting notes..." --file slides.pptx
//!
//! # Or do everything in one pass
//! nclip run --text "Meeting notes..." --file slides.pptx --refine "shorten the summary"
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use notion_clipper::backend::create_backend;
use notion_clipper::config::{
    load_config, Config, ConnectionConfig, GEMINI_MODELS, OPENROUTER_MODELS,
};
use notion_clipper::input::InputBundle;
use notion_clipper::models::{DatabaseSchema, StructuredContent};
use notion_clipper::notion::{deep_link, NotionClient};
use notion_clipper::page::{build_page_blocks, build_properties, format_file_size};
use notion_clipper::pipeline::{process_content, refine_content};
use notion_clipper::session::{apply, Event, SessionState, Status};
use notion_clipper::upload::UploadClient;

/// Notion Clipper — turn free-form text and files into structured
/// Notion pages with an AI backend.
#[derive(Parser)]
#[command(
    name = "nclip",
    about = "Notion Clipper — turn free-form text and files into structured Notion pages",
    version,
    long_about = "Notion Clipper feeds your text and attached files to an AI model, maps the \
    result onto the target database's field schema, lets you refine it, and publishes the \
    final page. All credentials and connection settings are read from a TOML configuration file."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./nclip.toml")]
    config: PathBuf,

    /// Increase log verbosity (-v: info, -vv: debug).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Shared input flags for commands that take user content.
#[derive(clap::Args, Default)]
struct InputArgs {
    /// Free-form text to process.
    #[arg(long)]
    text: Option<String>,

    /// Read the free-form text from a file instead.
    #[arg(long, conflicts_with = "text")]
    text_file: Option<PathBuf>,

    /// Attach a file (repeatable). Accepted kinds: txt, md, png, jpeg, pdf,
    /// docx, xlsx, pptx.
    #[arg(long = "file")]
    files: Vec<PathBuf>,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// List configured database connections and mark the active one.
    Connections,

    /// Fetch and print the active database's field schema.
    ///
    /// Also serves as a connection check: a bad API key or database id
    /// surfaces the store's own error message.
    Schema,

    /// List known model identifiers per AI provider.
    Models,

    /// Process text and files into structured content.
    ///
    /// Prints the structured content as JSON, or writes it to `--out` so it
    /// can be edited and refined before publishing.
    Process {
        #[command(flatten)]
        input: InputArgs,

        /// Write the structured content to this file instead of stdout.
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Apply a refinement instruction to previously saved content.
    Refine {
        /// Structured content JSON produced by `process`.
        #[arg(long)]
        content: PathBuf,

        /// Natural-language refinement instruction.
        #[arg(long)]
        instruction: String,

        #[command(flatten)]
        input: InputArgs,

        /// Write the refined content to this file instead of stdout.
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Publish previously saved content as a page.
    ///
    /// Re-supplies the original text and files so they can be attached to
    /// the page body; newly uploaded file URLs are embedded where uploads
    /// succeed.
    Publish {
        /// Structured content JSON produced by `process` or `refine`.
        #[arg(long)]
        content: PathBuf,

        #[command(flatten)]
        input: InputArgs,
    },

    /// Process, optionally refine, then publish in one pass.
    Run {
        #[command(flatten)]
        input: InputArgs,

        /// Refinement instruction, applied in order (repeatable).
        #[arg(long = "refine")]
        refinements: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(&cli.config)?;
    if !config.model_is_known() {
        tracing::warn!(
            model = %config.ai.model,
            provider = %config.ai.provider,
            "model is not in the provider's known list; proceeding anyway"
        );
    }

    match cli.command {
        Commands::Connections => cmd_connections(&config),
        Commands::Models => cmd_models(),
        Commands::Schema => cmd_schema(&config).await,
        Commands::Process { input, out } => cmd_process(&config, input, out).await,
        Commands::Refine {
            content,
            instruction,
            input,
            out,
        } => cmd_refine(&config, content, &instruction, input, out).await,
        Commands::Publish { content, input } => cmd_publish(&config, content, input).await,
        Commands::Run { input, refinements } => cmd_run(&config, input, refinements).await,
    }
}

fn init_tracing(verbosity: u8) {
    let default_level = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn active_connection(config: &Config) -> Result<&ConnectionConfig> {
    config.active_connection().context(
        "No active connection. Add a [[connections]] entry and set active_connection in the config.",
    )
}

fn cmd_connections(config: &Config) -> Result<()> {
    if config.connections.is_empty() {
        println!("No connections configured.");
        return Ok(());
    }
    for connection in &config.connections {
        let marker = if Some(connection.name.as_str()) == config.active_connection.as_deref() {
            "*"
        } else {
            " "
        };
        println!("{} {}  (database {})", marker, connection.name, connection.database_id);
    }
    Ok(())
}

fn cmd_models() -> Result<()> {
    println!("gemini:");
    for model in GEMINI_MODELS {
        println!("  {}", model);
    }
    println!("openrouter:");
    for model in OPENROUTER_MODELS {
        println!("  {}", model);
    }
    Ok(())
}

async fn cmd_schema(config: &Config) -> Result<()> {
    let connection = active_connection(config)?;
    let client = NotionClient::new(connection)?;
    let schema = client.fetch_schema().await?;
    println!("Successfully connected to Notion database!");
    for (name, field) in &schema {
        if field.options.is_empty() {
            println!("  {}: {:?}", name, field.kind);
        } else {
            println!("  {}: {:?} [{}]", name, field.kind, field.options.join(", "));
        }
    }
    Ok(())
}

fn resolve_text(text: Option<String>, text_file: Option<PathBuf>) -> Result<String> {
    match (text, text_file) {
        (Some(text), _) => Ok(text),
        (None, Some(path)) => std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display())),
        (None, None) => Ok(String::new()),
    }
}

/// Build an [`InputBundle`] from CLI flags, validating attached files.
fn gather_input(args: InputArgs) -> Result<InputBundle> {
    let mut bundle = InputBundle::default();
    bundle.text = resolve_text(args.text, args.text_file)?;
    bundle.add_paths(&args.files)?;
    Ok(bundle)
}

fn emit_content(content: &StructuredContent, out: Option<PathBuf>) -> Result<()> {
    let json = serde_json::to_string_pretty(content)?;
    match out {
        Some(path) => {
            std::fs::write(&path, json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Structured content written to {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

fn read_content(path: &PathBuf) -> Result<StructuredContent> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("Invalid content file {}", path.display()))
}

async fn cmd_process(config: &Config, input: InputArgs, out: Option<PathBuf>) -> Result<()> {
    let connection = active_connection(config)?;
    let bundle = gather_input(input)?;
    if bundle.text.is_empty() && bundle.files.is_empty() {
        anyhow::bail!("Nothing to process: provide --text, --text-file, or --file.");
    }
    let client = NotionClient::new(connection)?;
    let schema = client.fetch_schema().await?;
    let backend = create_backend(config)?;
    let prompt = config.prompt_for(connection);
    let content = process_content(backend.as_ref(), &prompt, &bundle, &schema).await?;
    emit_content(&content, out)
}

async fn cmd_refine(
    config: &Config,
    content_path: PathBuf,
    instruction: &str,
    input: InputArgs,
    out: Option<PathBuf>,
) -> Result<()> {
    let connection = active_connection(config)?;
    let current = read_content(&content_path)?;
    let bundle = gather_input(input)?;
    let client = NotionClient::new(connection)?;
    let schema = client.fetch_schema().await?;
    let backend = create_backend(config)?;
    let refined = refine_content(backend.as_ref(), &bundle, &schema, &current, instruction).await?;
    emit_content(&refined, out)
}

async fn cmd_publish(config: &Config, content_path: PathBuf, input: InputArgs) -> Result<()> {
    let connection = active_connection(config)?;
    let content = read_content(&content_path)?;
    let mut bundle = gather_input(input)?;

    let client = NotionClient::new(connection)?;
    let schema = client.fetch_schema().await?;
    let url = publish(config, &client, &schema, &content, &mut bundle).await?;
    println!("Page created! View it here: {}", deep_link(&url));
    Ok(())
}

/// Upload any pending files, assemble the page, and create it.
async fn publish(
    config: &Config,
    client: &NotionClient,
    schema: &DatabaseSchema,
    content: &StructuredContent,
    bundle: &mut InputBundle,
) -> Result<String> {
    if let Some(uploader) = UploadClient::from_config(&config.upload)? {
        uploader.upload_all(&mut bundle.files).await;
    }
    for file in &bundle.files {
        if file.public_url.is_none() {
            println!(
                "  note: {} ({}) has no public URL; it will appear as a fallback note",
                file.name,
                format_file_size(file.size() as u64)
            );
        }
    }
    let properties = build_properties(content, schema);
    let children = build_page_blocks(content, &bundle.text, &bundle.files);
    Ok(client.create_page(properties, children).await?)
}

async fn cmd_run(config: &Config, input: InputArgs, refinements: Vec<String>) -> Result<()> {
    let connection = active_connection(config)?;
    let mut bundle = gather_input(input)?;
    if bundle.text.is_empty() && bundle.files.is_empty() {
        anyhow::bail!("Nothing to process: provide --text, --text-file, or --file.");
    }
    let backend = create_backend(config)?;
    let client = NotionClient::new(connection)?;
    let prompt = config.prompt_for(connection);

    let mut state = SessionState::default();
    let step = |state: SessionState, event: Event| {
        let next = apply(state, event);
        if let Some(error) = &next.error {
            eprintln!("error: {}", error);
        } else if let Some(success) = &next.success {
            println!("{}", success);
        } else if next.status != Status::Idle {
            println!("… {}", next.status.label());
        }
        next
    };

    state = step(state, Event::SetStatus(Status::FetchingSchema));
    let schema = match client.fetch_schema().await {
        Ok(schema) => schema,
        Err(e) => {
            step(state, Event::Error(e.to_string()));
            anyhow::bail!("schema fetch failed");
        }
    };

    state = step(state, Event::SetStatus(Status::ProcessingAi));
    let mut content = match process_content(backend.as_ref(), &prompt, &bundle, &schema).await {
        Ok(content) => content,
        Err(e) => {
            step(state, Event::Error(e.to_string()));
            anyhow::bail!("processing failed");
        }
    };

    // Refinements are strictly sequential: each waits for the previous one.
    for instruction in &refinements {
        state = step(state, Event::SetStatus(Status::RefiningAi));
        match refine_content(backend.as_ref(), &bundle, &schema, &content, instruction).await {
            Ok(refined) => content = refined,
            Err(e) => {
                // A failed refinement keeps the prior content usable.
                state = step(state, Event::Error(e.to_string()));
            }
        }
    }

    state = step(state, Event::SetStatus(Status::UploadingPage));
    match publish(config, &client, &schema, &content, &mut bundle).await {
        Ok(url) => {
            step(
                state,
                Event::Success(format!("Page created! View it here: {}", deep_link(&url))),
            );
            bundle.reset();
            Ok(())
        }
        Err(e) => {
            step(state, Event::Error(e.to_string()));
            anyhow::bail!("publish failed");
        }
    }
}
