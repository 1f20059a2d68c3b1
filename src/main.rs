//! chat-stream CLI
//!
//! Drives the chat core from a terminal: send a message to the scripted
//! source and watch it render, browse stored conversations, or compile a
//! Markdown file to sanitized HTML.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use chat_stream::chat::{ChatSession, HeuristicTitles, ScriptedSource};
use chat_stream::config::{self, Config};
use chat_stream::dom::LiveTree;
use chat_stream::logging;
use chat_stream::markdown::MarkdownCompiler;
use chat_stream::render::{RenderOptions, StreamRenderer};
use chat_stream::{Conversation, ConversationId, SqliteStore};

/// Delay between scripted chunks so the debounce is visible
const SCRIPTED_PACE: Duration = Duration::from_millis(40);
const IDLE_POLL: Duration = Duration::from_millis(50);
const SEND_TIMEOUT: Duration = Duration::from_secs(30);
const TITLE_WAIT: Duration = Duration::from_secs(2);

#[derive(Parser, Debug)]
#[command(name = "chat-stream", version, about = "Streaming chat client core")]
struct Cli {
    /// Config file (defaults to ~/.chat-stream/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Database path, overriding the config
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Model id, overriding the config default
    #[arg(long, global = true)]
    model: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send a message to the scripted assistant and render the reply
    Send {
        text: String,
        /// Continue an existing conversation
        #[arg(long)]
        conversation: Option<String>,
        /// Print plain text instead of HTML
        #[arg(long)]
        text_only: bool,
    },
    /// List recent conversations
    List {
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Print the messages of a conversation
    Show { id: String },
    /// Delete a conversation and its messages
    Delete { id: String },
    /// Pin or unpin a conversation
    Pin {
        id: String,
        #[arg(long)]
        off: bool,
    },
    /// Rename a conversation
    Rename { id: String, title: String },
    /// Search titles and message content
    Search {
        query: String,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Compile a Markdown file (or stdin with "-") to sanitized HTML
    Render { path: PathBuf },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = logging::init();

    let config = match &cli.config {
        Some(path) => config::load_config_from(path),
        None => config::load_config(),
    };

    match cli.command {
        Command::Render { ref path } => render_file(&config, path),
        ref command => {
            let db_path = cli.db.clone().unwrap_or_else(|| config.get_db_path());
            let store = Arc::new(SqliteStore::open(&db_path)?);
            let source = Arc::new(ScriptedSource::mock_reply().paced(SCRIPTED_PACE));
            let mut session = ChatSession::new(store, source).with_title_generator(Arc::new(
                HeuristicTitles::new(config.get_title_max_chars()),
            ));
            run(&mut session, &config, cli.model.as_deref(), command)
        }
    }
}

fn run(
    session: &mut ChatSession,
    config: &Config,
    model: Option<&str>,
    command: &Command,
) -> Result<()> {
    match command {
        Command::Send {
            text,
            conversation,
            text_only,
        } => {
            if let Some(id) = conversation {
                session.select_conversation(&parse_id(id)?)?;
            }
            send(session, config, model, text, *text_only)
        }
        Command::List { limit } => {
            let limit = limit.unwrap_or_else(|| config.get_recent_limit());
            print_conversations(&session.load_recent(limit)?);
            Ok(())
        }
        Command::Show { id } => {
            session.select_conversation(&parse_id(id)?)?;
            for message in session.messages() {
                println!("[{}] {}", message.role.as_str(), message.content);
            }
            Ok(())
        }
        Command::Delete { id } => {
            let id = parse_id(id)?;
            if session.delete_conversation(&id)? {
                println!("Deleted {}", id);
            } else {
                println!("No conversation {}", id);
            }
            Ok(())
        }
        Command::Pin { id, off } => {
            session.set_pinned(&parse_id(id)?, !off)?;
            Ok(())
        }
        Command::Rename { id, title } => {
            session.rename(&parse_id(id)?, title)?;
            Ok(())
        }
        Command::Search { query, limit } => {
            let limit = limit.unwrap_or_else(|| config.get_recent_limit());
            print_conversations(&session.search(query, limit)?);
            Ok(())
        }
        Command::Render { path } => render_file(config, path),
    }
}

/// Send one message and render the reply as it streams
fn send(
    session: &mut ChatSession,
    config: &Config,
    model: Option<&str>,
    text: &str,
    text_only: bool,
) -> Result<()> {
    let model = config.model_info(model);
    let handle = session.send_message(text, &model)?;

    let mut tree = LiveTree::new();
    let mut renderer = StreamRenderer::for_tree(&tree, RenderOptions::from_config(config));
    let started = Instant::now();

    while !session.is_idle() {
        if started.elapsed() > SEND_TIMEOUT {
            if session.cancel().is_some() {
                renderer.reset(Some(&mut tree));
            }
            bail!("No reply within {}s", SEND_TIMEOUT.as_secs());
        }

        let wait = renderer
            .next_deadline()
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
            .unwrap_or(IDLE_POLL)
            .min(IDLE_POLL);
        session.wait_event(wait);
        session.pump();

        let now = Instant::now();
        if let Some(message) = session.message(handle.assistant_message_id) {
            renderer.update(&message.content, now);
        }
        if let Some(report) = renderer.tick(now, &mut tree) {
            info!(
                content_len = report.content_len,
                patches = report.stats.total(),
                rebuilt = report.rebuilt,
                "Render cycle"
            );
        }
    }

    if let Some(message) = session.message(handle.assistant_message_id) {
        renderer.update(&message.content, Instant::now());
    }
    renderer.flush(&mut tree);

    // The title is generated in the background; give it a moment before exit
    let title_deadline = Instant::now() + TITLE_WAIT;
    while session.conversation().is_some_and(Conversation::needs_title)
        && Instant::now() < title_deadline
    {
        session.wait_event(IDLE_POLL);
    }

    if text_only {
        println!("{}", tree.text_content());
    } else {
        println!("{}", tree.to_html());
    }

    if let Some(err) = session.last_error() {
        eprintln!("{}", err.user_message());
    }
    if let Some(conversation) = session.conversation() {
        eprintln!("conversation: {} ({})", conversation.id, conversation.display_title());
    }
    Ok(())
}

fn render_file(config: &Config, path: &Path) -> Result<()> {
    let mut text = String::new();
    if path.as_os_str() == "-" {
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read stdin")?;
    } else {
        text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
    }

    let started = Instant::now();
    let compiler = MarkdownCompiler::new(config.get_max_nesting_depth());
    let html = compiler.compile(&text).to_html();
    logging::log_perf(
        "markdown_compile",
        started.elapsed().as_millis() as u64,
        config.get_debounce().as_millis() as u64,
    );

    println!("{}", html);
    Ok(())
}

fn parse_id(id: &str) -> Result<ConversationId> {
    ConversationId::parse(id).with_context(|| format!("Invalid conversation id: {}", id))
}

fn print_conversations(conversations: &[Conversation]) {
    for conversation in conversations {
        let pin = if conversation.is_pinned { "*" } else { " " };
        println!(
            "{} {} {}  {}",
            pin,
            conversation.id,
            conversation.updated_at.format("%Y-%m-%d %H:%M"),
            conversation.display_title()
        );
    }
}
