// crates/cli/src/main.rs
//! Parlance interactive shell.
//!
//! Loads a knowledge directory, replays the learned-category store, and
//! runs a read-eval-print loop over stdin. `:stats` prints match-cache
//! health, `:quit` exits.

use std::io::{BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use parlance_core::KnowledgeBase;
use parlance_engine::Interpreter;
use parlance_store::{load_directory, LearnedStore};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "parlance")]
#[command(about = "AIML 2.0 conversational interpreter")]
struct Args {
    /// Knowledge directory (*.aiml, *.set, *.map, *.properties, …).
    #[arg(short, long, default_value = "knowledge")]
    dir: PathBuf,

    /// Learned-category store path. Defaults to
    /// `<data_dir>/parlance/learned.jsonl`.
    #[arg(long)]
    learned: Option<PathBuf>,

    /// Session id; a fresh UUID when omitted.
    #[arg(long)]
    session: Option<String>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut kb = KnowledgeBase::new();
    let report = load_directory(&mut kb, &args.dir)
        .with_context(|| format!("loading knowledge from {}", args.dir.display()))?;
    eprintln!(
        "Loaded {} categories, {} sets, {} maps ({} file(s) failed).",
        report.categories, report.sets, report.maps, report.failed
    );

    let interp = Interpreter::new(kb);

    let learned_path = args.learned.unwrap_or_else(default_learned_path);
    let store = LearnedStore::open(&learned_path)
        .with_context(|| format!("opening learned store at {}", learned_path.display()))?;
    let replayed = store.replay()?;
    for record in &replayed {
        interp.replay_learned(record);
    }
    if !replayed.is_empty() {
        eprintln!("Replayed {} learned categories.", replayed.len());
    }
    interp.set_learned_sink(Box::new(store));

    let session_id = args
        .session
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    interp.create_session(&session_id);
    eprintln!("Session {session_id}. Type :quit to exit, :stats for cache stats.");

    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    loop {
        print!("> ");
        stdout.flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        match input {
            ":quit" | ":q" => break,
            ":stats" => {
                let stats = interp.cache_stats();
                println!(
                    "hits {} misses {} hit-rate {:.1}% | priorities {} wildcards {} set-regexes {} exact-keys {}",
                    stats.hits,
                    stats.misses,
                    stats.hit_rate * 100.0,
                    stats.priority_entries,
                    stats.wildcard_entries,
                    stats.set_regex_entries,
                    stats.exact_key_entries
                );
            }
            _ => match interp.process(input, &session_id) {
                Ok(response) => println!("{response}"),
                Err(err) => eprintln!("error: {err}"),
            },
        }
    }
    Ok(())
}

fn default_learned_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("parlance")
        .join("learned.jsonl")
}
