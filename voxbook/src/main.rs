//! voxbook - read e-books aloud with Piper TTS

mod config;
mod library;
mod narration;
mod parser;
mod playback;
mod text;
mod tts;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::VoxbookConfig;
use library::Library;
use narration::{Command, NarrationEvent, NarrationScheduler, NarrationSession};
use playback::rodio::RodioSink;
use playback::PlaybackSink;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;
use tts::piper::PiperEngine;
use tts::SynthesisEngine;

#[derive(Parser, Debug)]
#[command(name = "voxbook")]
#[command(about = "Read e-books aloud with Piper TTS", long_about = None)]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Add a book (.txt or .epub) to the library
    Add {
        /// Path to the book file
        file: PathBuf,
    },
    /// List books in the library
    List,
    /// Narrate a book aloud
    Play {
        /// Book id from `voxbook list`
        book_id: u64,
        /// Start at this character offset instead of the saved position
        #[arg(long)]
        from: Option<usize>,
    },
    /// Remove a book and its bookmarks
    Delete {
        /// Book id from `voxbook list`
        book_id: u64,
    },
    /// Manage bookmarks
    Bookmark {
        #[command(subcommand)]
        action: BookmarkAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum BookmarkAction {
    /// Save a bookmark in a book
    Add {
        /// Book id from `voxbook list`
        book_id: u64,
        /// Character offset; defaults to the book's saved position
        #[arg(long)]
        position: Option<usize>,
        /// Optional note
        #[arg(long)]
        note: Option<String>,
    },
    /// List bookmarks in a book
    List {
        /// Book id from `voxbook list`
        book_id: u64,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Set the narration language code
    SetLanguage {
        /// Language code, e.g. "pt-BR"
        value: String,
    },
    /// Set the voice identifier
    SetVoice {
        /// Voice name understood by the engine
        value: String,
    },
    /// Set the speed multiplier
    SetSpeed {
        /// Value (0.25-4.0)
        value: f32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    match args.command {
        Commands::Add { file } => cmd_add(&file),
        Commands::List => cmd_list(),
        Commands::Play { book_id, from } => cmd_play(book_id, from).await,
        Commands::Delete { book_id } => cmd_delete(book_id),
        Commands::Bookmark { action } => cmd_bookmark(action),
        Commands::Config { action } => cmd_config(action),
    }
}

fn cmd_add(file: &std::path::Path) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("book file not found: {}", file.display());
    }

    // Parse up front so broken files are rejected at import time.
    let parsed = parser::parse_book(file).context("failed to parse book")?;

    let mut library = Library::open_default()?;
    let canonical = file.canonicalize().unwrap_or_else(|_| file.to_path_buf());
    let book = library.add_book(&parsed.title, canonical)?;

    eprintln!("Added \"{}\" (id {})", book.title, book.id);
    Ok(())
}

fn cmd_list() -> Result<()> {
    let library = Library::open_default()?;
    let books = library.all_books();

    if books.is_empty() {
        eprintln!("Library is empty. Add a book with `voxbook add <file>`.");
        return Ok(());
    }

    for book in books {
        println!(
            "{:>4}  {}  (position {})",
            book.id, book.title, book.last_position
        );
    }
    Ok(())
}

fn cmd_delete(book_id: u64) -> Result<()> {
    let mut library = Library::open_default()?;
    let title = library
        .get_book(book_id)
        .map(|b| b.title.clone())
        .with_context(|| format!("no book with id {book_id}"))?;
    library.delete_book(book_id)?;
    eprintln!("Deleted \"{title}\"");
    Ok(())
}

fn cmd_bookmark(action: BookmarkAction) -> Result<()> {
    let mut library = Library::open_default()?;

    match action {
        BookmarkAction::Add {
            book_id,
            position,
            note,
        } => {
            let book = library
                .get_book(book_id)
                .with_context(|| format!("no book with id {book_id}"))?;
            let position = position.unwrap_or(book.last_position);

            // Resolve the offset to its paragraph when the source file
            // is still readable, so the confirmation names the block.
            let block = parser::parse_book(&book.path).ok().and_then(|parsed| {
                text::position::block_containing(&text::blocks(&parsed.content), position)
                    .map(|b| b.index)
            });

            let bookmark = library.add_bookmark(book_id, position, note)?;
            match block {
                Some(index) => eprintln!(
                    "Bookmarked position {} (block {index}) in book {book_id}",
                    bookmark.position
                ),
                None => eprintln!("Bookmarked position {} in book {book_id}", bookmark.position),
            }
        }
        BookmarkAction::List { book_id } => {
            let marks = library.bookmarks(book_id);
            if marks.is_empty() {
                eprintln!("No bookmarks for book {book_id}.");
                return Ok(());
            }
            for mark in marks {
                match &mark.note {
                    Some(note) => println!("{:>4}  {:>8}  {note}", mark.id, mark.position),
                    None => println!("{:>4}  {:>8}", mark.id, mark.position),
                }
            }
        }
    }
    Ok(())
}

fn cmd_config(action: ConfigAction) -> Result<()> {
    let mut config = VoxbookConfig::load().context("failed to load configuration")?;

    match action {
        ConfigAction::Show => {
            println!("language           = {}", config.language);
            println!("voice              = {}", config.voice);
            println!("speed              = {}", config.speed);
            println!("segment_budget     = {}", config.segment_budget);
            println!("prefetch_threshold = {}", config.prefetch_threshold);
            match &config.tts_script {
                Some(path) => println!("tts_script         = {}", path.display()),
                None => println!("tts_script         = (next to executable)"),
            }
            return Ok(());
        }
        ConfigAction::SetLanguage { value } => config.language = value,
        ConfigAction::SetVoice { value } => config.voice = value,
        ConfigAction::SetSpeed { value } => {
            if !(0.25..=4.0).contains(&value) {
                anyhow::bail!("speed must be between 0.25 and 4.0");
            }
            config.speed = value;
        }
    }

    config.save().context("failed to save configuration")?;
    eprintln!("Configuration saved.");
    Ok(())
}

/// Locate the TTS service script: explicit config entry, or
/// `tts_service.py` next to the voxbook executable.
fn resolve_tts_script(config: &VoxbookConfig) -> Result<PathBuf> {
    if let Some(path) = &config.tts_script {
        return Ok(path.clone());
    }
    let exe = std::env::current_exe().context("could not locate voxbook executable")?;
    let dir = exe
        .parent()
        .context("voxbook executable has no parent directory")?;
    Ok(dir.join("tts_service.py"))
}

async fn cmd_play(book_id: u64, from: Option<usize>) -> Result<()> {
    let config = VoxbookConfig::load().context("failed to load configuration")?;
    let mut library = Library::open_default()?;

    let book = library
        .get_book(book_id)
        .with_context(|| format!("no book with id {book_id}"))?
        .clone();

    let parsed = parser::parse_book(&book.path)
        .with_context(|| format!("failed to parse {}", book.path.display()))?;
    let blocks = text::blocks(&parsed.content);
    if blocks.is_empty() {
        anyhow::bail!("\"{}\" has no narratable text", book.title);
    }

    let script = resolve_tts_script(&config)?;
    let engine: Arc<dyn SynthesisEngine> = Arc::new(PiperEngine::new(script)?);
    let sink: Arc<dyn PlaybackSink> = Arc::new(RodioSink::new());

    let start = from.unwrap_or(book.last_position);
    eprintln!(
        "Narrating \"{}\" from position {} ({} blocks). Controls: p = pause/resume, s = stop.",
        book.title,
        start,
        blocks.len()
    );

    let (event_tx, mut events) = mpsc::unbounded_channel();
    let session = NarrationSession::new(blocks, config.segment_budget, event_tx);
    let scheduler = NarrationScheduler::new(
        session,
        engine,
        sink,
        config.voice_options(),
        config.prefetch_threshold,
        start,
    );

    let (commands, command_rx) = mpsc::channel(8);
    let driver = tokio::spawn(scheduler.run(command_rx));
    commands.send(Command::Play(start)).await?;

    let mut input = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut paused = false;

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(NarrationEvent::SegmentStarted { start_block, end_block }) => {
                    if start_block == end_block {
                        eprintln!("  block {start_block}");
                    } else {
                        eprintln!("  blocks {start_block}-{end_block}");
                    }
                }
                Some(NarrationEvent::Error(message)) => {
                    eprintln!("error: {message}");
                }
                Some(NarrationEvent::Stopped { position }) => {
                    library.update_position(book_id, position)?;
                    eprintln!("Stopped at position {position}.");
                    break;
                }
                None => break,
            },

            line = input.next_line(), if stdin_open => match line? {
                Some(line) => match line.trim() {
                    "p" => {
                        let cmd = if paused { Command::Resume } else { Command::Pause };
                        paused = !paused;
                        commands.send(cmd).await?;
                    }
                    "s" | "q" => {
                        commands.send(Command::Stop).await?;
                    }
                    "" => {}
                    other => {
                        eprintln!("unknown command '{other}' (p = pause/resume, s = stop)");
                    }
                },
                None => {
                    stdin_open = false;
                    commands.send(Command::Stop).await?;
                }
            },
        }
    }

    drop(commands);
    driver.await??;
    Ok(())
}
