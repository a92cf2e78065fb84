//! FoodFinder CLI
//!
//! Process the Yelp dataset, build the indices and chat with the
//! restaurant recommendation agent.

mod session;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use foodfinder_agents::tools::{ImageQaArgs, RagImageArgs, RagTextArgs, DEFAULT_K};
use foodfinder_agents::{
    AgentEvent, BuildPlan, ChatClient, ClipEncoder, FoodFinderAgent, Indexer,
    MultimodalRetriever, TeiClient, Toolkit,
};
use foodfinder_core::dataset::{self, DatasetStats};
use foodfinder_core::{Restaurant, TextMode};
use foodfinder_db::{init_memory, init_persistent, IndexKind, Repository, STORE_FILE};
use session::ChatSession;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

const BUSINESS_FILE: &str = "yelp_academic_dataset_business.json";
const PHOTOS_FILE: &str = "photos.json";
const PROCESSED_FILE: &str = "restaurants.json";
const SAMPLE_FILE: &str = "restaurants_sample.json";

/// FoodFinder - restaurant recommendations from text and photos
#[derive(Parser)]
#[command(name = "foodfinder")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding the index store
    #[arg(long, global = true, default_value = "indexes")]
    index_dir: PathBuf,

    /// Directory holding raw/, processed/ and .temp/
    #[arg(long, global = true, default_value = "data")]
    data_dir: PathBuf,

    /// Use an in-memory index store (for testing)
    #[arg(long, global = true)]
    memory: bool,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Filter the raw Yelp dataset into processed restaurants
    ProcessData {
        /// Raw dataset directory (defaults to <data-dir>/raw)
        #[arg(long)]
        raw_dir: Option<PathBuf>,

        /// Output file (defaults to <data-dir>/processed/restaurants.json)
        #[arg(long)]
        out: Option<PathBuf>,

        /// Also write a random sample of N restaurants
        #[arg(long)]
        sample: Option<usize>,
    },

    /// Embed the processed dataset into the text and image indices
    BuildIndices {
        /// Build only the text index
        #[arg(long, conflicts_with = "image_only")]
        text_only: bool,

        /// Build only the image index
        #[arg(long)]
        image_only: bool,

        /// Use the sample dataset
        #[arg(long)]
        sample: bool,

        /// Rebuild even if an index already exists
        #[arg(long)]
        force: bool,

        /// Limit the number of images to embed
        #[arg(long)]
        limit: Option<usize>,

        /// Embed rich restaurant descriptions instead of name and categories
        #[arg(long)]
        rich_text: bool,
    },

    /// Regenerate stored metadata from the dataset without re-embedding
    RebuildMetadata {
        /// Only the text index
        #[arg(long, conflicts_with = "image_only")]
        text_only: bool,

        /// Only the image index
        #[arg(long)]
        image_only: bool,

        /// Print a sample entry afterwards
        #[arg(long)]
        verify: bool,

        /// Use the sample dataset
        #[arg(long)]
        sample: bool,
    },

    /// Search restaurants by text
    SearchText {
        query: String,

        /// Number of results
        #[arg(short, default_value_t = DEFAULT_K)]
        k: usize,

        /// Use HNSW lookups
        #[arg(long)]
        hnsw: bool,
    },

    /// Find restaurants with photos similar to an image
    SearchImage {
        image: PathBuf,

        /// Number of results
        #[arg(short, default_value_t = DEFAULT_K)]
        k: usize,

        /// Use HNSW lookups
        #[arg(long)]
        hnsw: bool,
    },

    /// Ask a question about an image
    DescribeImage { image: PathBuf, question: String },

    /// Ask the agent a single question
    Ask {
        question: String,

        /// Attach an image to the question
        #[arg(long)]
        image: Option<PathBuf>,

        /// Use HNSW lookups
        #[arg(long)]
        hnsw: bool,
    },

    /// Interactive chat with the agent
    Chat {
        /// Use HNSW lookups
        #[arg(long)]
        hnsw: bool,
    },

    /// Show index and dataset statistics
    Stats,

    /// Check that the model services are reachable
    Status,

    /// Delete the index store (fresh start)
    ResetIndices,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env if present.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Setup logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Commands that never open the store
    match &cli.command {
        Commands::ProcessData { raw_dir, out, sample } => {
            return cmd_process_data(&cli.data_dir, raw_dir.clone(), out.clone(), *sample);
        }
        Commands::ResetIndices => {
            return cmd_reset_indices(&cli.index_dir, cli.memory);
        }
        Commands::DescribeImage { image, question } => {
            return cmd_describe_image(image, question).await;
        }
        _ => {}
    }

    let db = if cli.memory {
        info!("Using in-memory index store");
        init_memory().await?
    } else {
        info!("Using index store in: {}", cli.index_dir.display());
        init_persistent(&cli.index_dir)
            .await
            .with_context(|| format!("Failed to open index store in {}", cli.index_dir.display()))?
    };

    let repo = Repository::new(db).with_kind(index_kind(&cli.command));
    let tei = TeiClient::default_local();
    let clip = ClipEncoder::default_local().with_download_progress(true);

    // Check the embeddings service only when needed
    let needs_tei = matches!(
        cli.command,
        Commands::BuildIndices { image_only: false, .. }
            | Commands::SearchText { .. }
            | Commands::Ask { .. }
            | Commands::Chat { .. }
    );
    if needs_tei {
        let tei_ok = tei.health().await.unwrap_or(false);
        if !tei_ok {
            eprintln!("Error: embeddings service is not reachable.");
            eprintln!("  TEI (embeddings): {}", tei.base_url());
            eprintln!("Start a TEI or Ollama server and point TEI_URL (and TEI_PROVIDER) at it");
            anyhow::bail!("Embeddings service unavailable");
        }
    }

    // Execute command
    match cli.command {
        Commands::BuildIndices {
            text_only,
            image_only,
            sample,
            force,
            limit,
            rich_text,
        } => {
            let mode = if rich_text { TextMode::Rich } else { TextMode::Simple };
            let path = processed_path(&cli.data_dir, sample);
            cmd_build_indices(repo, tei, clip, &path, text_only, image_only, force, limit, mode)
                .await?;
        }
        Commands::RebuildMetadata {
            text_only,
            image_only,
            verify,
            sample,
        } => {
            let path = processed_path(&cli.data_dir, sample);
            cmd_rebuild_metadata(repo, tei, clip, &path, !image_only, !text_only, verify).await?;
        }
        Commands::SearchText { query, k, .. } => {
            let toolkit = Toolkit::new(retriever(repo, tei, clip));
            println!("{}", toolkit.rag_text_search(RagTextArgs { query, k }).await);
        }
        Commands::SearchImage { image, k, .. } => {
            let toolkit = Toolkit::new(retriever(repo, tei, clip));
            let args = RagImageArgs {
                image_path: image.display().to_string(),
                k,
            };
            println!("{}", toolkit.rag_image_search(args).await);
        }
        Commands::Ask { question, image, .. } => {
            cmd_ask(repo, tei, clip, &question, image.as_deref()).await?;
        }
        Commands::Chat { .. } => {
            cmd_chat(repo, tei, clip, &cli.data_dir).await?;
        }
        Commands::Stats => {
            cmd_stats(repo, &cli.data_dir).await?;
        }
        Commands::Status => {
            cmd_status(repo, tei, clip).await?;
        }
        Commands::ProcessData { .. } | Commands::ResetIndices | Commands::DescribeImage { .. } => {
            // Handled before the store is opened.
        }
    }

    Ok(())
}

/// Lookup strategy for the commands that query the indices
fn index_kind(command: &Commands) -> IndexKind {
    match command {
        Commands::SearchText { hnsw: true, .. }
        | Commands::SearchImage { hnsw: true, .. }
        | Commands::Ask { hnsw: true, .. }
        | Commands::Chat { hnsw: true } => IndexKind::Hnsw,
        _ => IndexKind::Flat,
    }
}

fn processed_path(data_dir: &Path, sample: bool) -> PathBuf {
    let file = if sample { SAMPLE_FILE } else { PROCESSED_FILE };
    data_dir.join("processed").join(file)
}

fn retriever(repo: Repository, tei: TeiClient, clip: ClipEncoder) -> Arc<MultimodalRetriever> {
    Arc::new(MultimodalRetriever::new(repo, tei, clip))
}

fn load_dataset(path: &Path) -> Result<Vec<Restaurant>> {
    println!("Loading restaurants from {}...", path.display());
    let restaurants = dataset::load_restaurants(path).with_context(|| {
        format!(
            "Failed to load {}. Run `foodfinder process-data` first",
            path.display()
        )
    })?;
    println!("Loaded {} restaurants", restaurants.len());
    Ok(restaurants)
}

fn cmd_process_data(
    data_dir: &Path,
    raw_dir: Option<PathBuf>,
    out: Option<PathBuf>,
    sample: Option<usize>,
) -> Result<()> {
    let raw_dir = raw_dir.unwrap_or_else(|| data_dir.join("raw"));
    let out = out.unwrap_or_else(|| processed_path(data_dir, false));

    println!("Step 1: Loading raw data...");
    let businesses = dataset::load_businesses(raw_dir.join(BUSINESS_FILE))
        .with_context(|| format!("Failed to read businesses from {}", raw_dir.display()))?;
    let photos = dataset::load_photos(raw_dir.join(PHOTOS_FILE))?;
    println!("  - Businesses: {}", businesses.len());
    println!("  - Photos: {}", photos.len());

    println!("\nStep 2: Filtering restaurants...");
    let businesses = dataset::filter_restaurants(businesses);
    println!("  - Open restaurants: {}", businesses.len());

    println!("\nStep 3: Mapping photos to businesses...");
    let photo_map = dataset::map_photos(&photos, &raw_dir.join("photos"));

    println!("\nStep 4: Processing restaurants...");
    let restaurants = dataset::process_restaurants(businesses, photo_map);
    let stats = DatasetStats::from_restaurants(&restaurants);
    println!("  - Restaurants with photos: {}", stats.with_photos);

    println!("\nStep 5: Saving processed data...");
    dataset::save_restaurants(&out, &restaurants)?;

    if let Some(size) = sample {
        println!("\nStep 6: Creating sample dataset ({} restaurants)...", size);
        let sample = dataset::sample_restaurants(&restaurants, size, &mut rand::thread_rng());
        let sample_path = out.with_file_name(SAMPLE_FILE);
        dataset::save_restaurants(&sample_path, &sample)?;
        println!("✓ Created sample dataset with {} restaurants", sample.len());
    }

    println!("\nSummary:");
    println!("  Total restaurants: {}", stats.total);
    println!("  With photos: {}", stats.with_photos);
    println!("  Average rating: {:.2}", stats.average_rating);
    println!("\nOutput: {}", out.display());

    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn cmd_build_indices(
    repo: Repository,
    tei: TeiClient,
    clip: ClipEncoder,
    path: &Path,
    text_only: bool,
    image_only: bool,
    force: bool,
    limit: Option<usize>,
    mode: TextMode,
) -> Result<()> {
    let existing = repo.stats().await?;
    let plan = BuildPlan::decide(text_only, image_only, force, &existing);

    if !force {
        if existing.text_count > 0 && !image_only {
            println!("✓ Text index already exists (use --force to rebuild)");
        }
        if existing.image_count > 0 && !text_only {
            println!("✓ Image index already exists (use --force to rebuild)");
        }
    }
    if plan.is_empty() {
        println!("Nothing to do!");
        return Ok(());
    }

    let restaurants = load_dataset(path)?;
    let indexer = Indexer::new(repo.clone(), tei, clip);
    let report = indexer.run(&plan, &restaurants, mode, limit).await?;

    println!("\nIndex Building Complete!");
    if let Some(count) = report.text {
        println!("  ✓ Text index built with {} restaurants", count);
    }
    match report.image {
        Some(image) => println!(
            "  ✓ Image index built with {} photos ({} skipped)",
            image.built, image.skipped
        ),
        None if plan.build_image => println!("  ⚠ No photos found, image index skipped"),
        None => {}
    }

    let stats = repo.stats().await?;
    println!(
        "  Totals: {} restaurants, {} photos",
        stats.text_count, stats.image_count
    );
    Ok(())
}

async fn cmd_rebuild_metadata(
    repo: Repository,
    tei: TeiClient,
    clip: ClipEncoder,
    path: &Path,
    text: bool,
    image: bool,
    verify: bool,
) -> Result<()> {
    let restaurants = load_dataset(path)?;
    let indexer = Indexer::new(repo.clone(), tei, clip);
    let report = indexer.rebuild_metadata(&restaurants, text, image).await?;

    if text {
        println!(
            "✓ Updated {} text metadata entries ({} not in index)",
            report.text_updated, report.text_missing
        );
        if verify {
            print_sample("text", repo.sample_text_metadata().await?)?;
        }
    }
    if image {
        println!(
            "✓ Updated {} image metadata entries ({} not in index)",
            report.image_updated, report.image_missing
        );
        if verify {
            print_sample("image", repo.sample_image_metadata().await?)?;
        }
    }

    println!("\nNote: only metadata was updated; embeddings are unchanged");
    Ok(())
}

fn print_sample<T: serde::Serialize>(label: &str, sample: Option<T>) -> Result<()> {
    let Some(sample) = sample else {
        println!("\nThe {} index is empty", label);
        return Ok(());
    };

    let value = serde_json::to_value(&sample)?;
    println!("\nSample {} entry:", label);
    println!("{}", serde_json::to_string_pretty(&value)?);
    if let Some(fields) = value.as_object() {
        let names: Vec<&str> = fields.keys().map(String::as_str).collect();
        println!("\nFields in metadata: {}", names.len());
        println!("Field names: {}", names.join(", "));
    }
    Ok(())
}

async fn cmd_describe_image(image: &Path, question: &str) -> Result<()> {
    let toolkit = Toolkit::image_only(ClipEncoder::default_local().with_download_progress(true));
    let args = ImageQaArgs {
        image_path: image.display().to_string(),
        question: question.to_string(),
    };
    println!("{}", toolkit.image_qa(args).await);
    Ok(())
}

fn build_agent(
    repo: Repository,
    tei: TeiClient,
    clip: ClipEncoder,
) -> Result<FoodFinderAgent<ChatClient, Toolkit>> {
    let chat = ChatClient::default_local();
    if !chat.has_api_key() && chat.base_url().contains("api.openai.com") {
        anyhow::bail!("OPENAI_API_KEY is not set. Set it or point LLM_URL at a local server");
    }
    info!("Using chat model {} at {}", chat.model(), chat.base_url());

    let toolkit = Toolkit::new(retriever(repo, tei, clip));
    Ok(FoodFinderAgent::new(chat, toolkit))
}

/// Print agent progress as it happens
fn print_event(event: AgentEvent) {
    match event {
        AgentEvent::Thinking(step) => eprintln!("… thinking (step {})", step),
        AgentEvent::ToolCall { name, arguments } => eprintln!("→ {} {}", name, arguments),
        AgentEvent::ToolResult { name, output } => {
            let preview: String = output.chars().take(200).collect();
            let more = if output.chars().count() > 200 { "..." } else { "" };
            eprintln!("← {}: {}{}", name, preview.replace('\n', " "), more);
        }
        AgentEvent::Message(content) => println!("\n{}\n", content),
    }
}

async fn cmd_ask(
    repo: Repository,
    tei: TeiClient,
    clip: ClipEncoder,
    question: &str,
    image: Option<&Path>,
) -> Result<()> {
    if let Some(image) = image {
        if !image.is_file() {
            anyhow::bail!("Image not found: {}", image.display());
        }
    }

    let agent = build_agent(repo, tei, clip)?;
    let prompt = session::enhance_prompt(question, image);
    agent.run_streaming(&prompt, print_event).await?;
    Ok(())
}

async fn cmd_chat(repo: Repository, tei: TeiClient, clip: ClipEncoder, data_dir: &Path) -> Result<()> {
    let agent = build_agent(repo, tei, clip)?;
    let temp_dir = data_dir.join(".temp");
    let mut session = ChatSession::default();

    println!("FoodFinder - Restaurant Recommendations");
    println!("Ask about restaurants, or attach a photo with /image <path>. Type /help for commands.");
    println!();

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        if let Some(image) = session.attachment() {
            print!("foodfinder [{}]> ", image.display());
        } else {
            print!("foodfinder> ");
        }
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break; // EOF
        }

        let input = line.trim();
        let (cmd, arg) = match input.split_once(' ') {
            Some((cmd, arg)) => (cmd, arg.trim()),
            None => (input, ""),
        };

        match cmd {
            "" => continue,

            "/image" | "/i" => {
                if arg.is_empty() {
                    println!("Usage: /image <path to jpg, jpeg or png>");
                    continue;
                }
                let timestamp = chrono::Utc::now().timestamp();
                match session::stage_upload(Path::new(arg), &temp_dir, timestamp) {
                    Ok(staged) => {
                        println!("Image uploaded! You can now ask questions about it or search for similar restaurants.");
                        println!("Try: 'What type of cuisine is this?' or 'Find similar restaurants'");
                        session.attach(staged);
                    }
                    Err(e) => println!("Error: {}", e),
                }
            }

            "/history" => {
                if session.turns().is_empty() {
                    println!("No messages yet.");
                }
                for turn in session.turns() {
                    println!("You: {}", turn.question);
                    if let Some(image) = &turn.image {
                        println!("     [image: {}]", image.display());
                    }
                    println!("FoodFinder: {}", turn.answer);
                    println!();
                }
            }

            "/clear" => {
                session.clear();
                println!("Conversation cleared.");
            }

            "/help" | "/h" | "/?" => {
                println!("Commands:");
                println!("  <question>       - Ask about restaurants");
                println!("  /image <path>    - Attach a photo to the next question");
                println!("  /history         - Show the conversation");
                println!("  /clear           - Forget the conversation");
                println!("  /quit            - Exit");
                println!();
                println!("Try: \"Find Italian restaurants in Philadelphia\"");
                println!("     \"What are the best pizza places?\"");
            }

            "/quit" | "/q" | "/exit" => {
                println!("Goodbye!");
                break;
            }

            _ if cmd.starts_with('/') => {
                println!("Unknown command: {}. Type /help for available commands.", cmd);
            }

            _ => {
                let history = session.history();
                let (prompt, image) = session.take_prompt(input);
                let outcome = agent
                    .run_conversation(&history, &prompt, print_event)
                    .await
                    .map(|answer| answer.answer);
                let failed = outcome.is_err();
                let shown = session.finish(input, image, outcome);
                if failed {
                    // Successful answers are printed by print_event
                    warn!("Agent failed: {}", shown);
                    println!("{}", shown);
                }
            }
        }
    }

    Ok(())
}

async fn cmd_stats(repo: Repository, data_dir: &Path) -> Result<()> {
    let stats = repo.stats().await?;

    println!("Index Statistics:");
    println!("  • Restaurants (text index): {}", stats.text_count);
    println!("  • Photos (image index): {}", stats.image_count);

    let processed = processed_path(data_dir, false);
    if processed.exists() {
        let restaurants = dataset::load_restaurants(&processed)?;
        let dataset_stats = DatasetStats::from_restaurants(&restaurants);
        println!("\nDataset Statistics ({}):", processed.display());
        println!("  • Restaurants: {}", dataset_stats.total);
        println!("  • With photos: {}", dataset_stats.with_photos);
        println!("  • Average rating: {:.2}", dataset_stats.average_rating);
    }

    Ok(())
}

async fn cmd_status(repo: Repository, tei: TeiClient, clip: ClipEncoder) -> Result<()> {
    let chat = ChatClient::default_local();
    let tei_ok = tei.health().await.unwrap_or(false);
    let chat_ok = chat.health().await.unwrap_or(false);
    let stats = repo.stats().await?;

    let mark = |ok: bool| if ok { "✓" } else { "✗" };
    println!("Services:");
    println!("  {} TEI (embeddings): {}", mark(tei_ok), tei.base_url());
    println!("  {} Chat model {}: {}", mark(chat_ok), chat.model(), chat.base_url());
    println!(
        "  {} CLIP model cache: {}",
        mark(clip.cache_dir().exists()),
        clip.cache_dir().display()
    );
    println!("Indices:");
    println!("  {} Text index: {} restaurants", mark(stats.text_count > 0), stats.text_count);
    println!("  {} Image index: {} photos", mark(stats.image_count > 0), stats.image_count);

    Ok(())
}

fn cmd_reset_indices(index_dir: &Path, memory: bool) -> Result<()> {
    if memory {
        println!("In-memory store, nothing to remove");
        return Ok(());
    }

    let path = index_dir.join(STORE_FILE);
    if path.exists() {
        std::fs::remove_dir_all(&path)
            .with_context(|| format!("Failed to remove index store at {}", path.display()))?;
        println!("✓ Removed index store at {}", path.display());
    } else {
        println!("Index store not found at {}, nothing to remove", path.display());
    }
    Ok(())
}
