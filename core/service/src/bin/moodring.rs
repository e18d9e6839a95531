/// moodring CLI - journal influences, link them, and ask for reflections
///
/// Usage:
///   moodring add "Read a chapter of Meditations"
///   moodring link 1 2
///   moodring reflect
///
/// Configuration comes from the same environment variables as moodring-service;
/// the flags below override them.

use anyhow::Result;
use chrono::Local;
use clap::{Parser, Subcommand};
use moodring_journal::{build_graph, timeline, DictationError, JournalError, LineDictation};
use moodring_schemas::{InfluenceId, Reflection, TimelineEntry};
use moodring_service::{telemetry::init_tracing, AppState, ConfigArgs, ServiceConfig};
use std::io::{self, BufRead, Write};
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "moodring")]
#[command(about = "Journal what influences you and reflect on it")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    config: ConfigArgs,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Save a new influence
    Add {
        /// Text of the influence (words are joined with spaces)
        #[arg(required = true)]
        text: Vec<String>,
    },
    /// Dictate an influence line by line; a blank line finishes it
    Dictate,
    /// Show every influence, newest first, with its links
    List,
    /// Delete an influence and its links
    Delete {
        id: i64,

        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },
    /// Link one influence to another ("source leads to target")
    Link { source: i64, target: i64 },
    /// Show the links touching an influence
    Links { id: i64 },
    /// Print the influence graph as JSON
    Graph,
    /// Reflect on the last seven days
    Reflect,
    /// Analyze how an influence relates to the ones linked to it
    Analyze { id: i64 },
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing("warn");

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            match e.downcast_ref::<JournalError>() {
                Some(journal) => eprintln!("{}", journal.user_message()),
                None => eprintln!("Error: {:#}", e),
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = ServiceConfig::load(&cli.config)?;
    let state = AppState::open(&config)?;
    let repository = &state.repository;

    match cli.command {
        Command::Add { text } => {
            let influence = repository.create_influence(&text.join(" "))?;
            println!("Saved influence #{}", influence.id);
        }

        Command::Dictate => {
            println!("Listening... type your thought, then an empty line to finish.");
            let stdin = io::stdin();
            let mut source = LineDictation::new(stdin.lock());

            match repository.create_from_dictation(&mut source) {
                Ok(Some(saved)) => println!("Saved influence #{}", saved?.id),
                Ok(None) => println!("Nothing was dictated."),
                Err(e) => {
                    eprintln!("Dictation failed: {}", e);
                    for hint in dictation_hints(&e) {
                        eprintln!("{}", hint);
                    }
                    return Ok(ExitCode::FAILURE);
                }
            }
        }

        Command::List => {
            let influences = repository.list_influences()?;
            if influences.is_empty() {
                println!("No influences yet. Add one with: moodring add <text>");
                return Ok(ExitCode::SUCCESS);
            }

            let links = repository.list_links()?;
            for entry in timeline(&influences, &links) {
                print_entry(&entry);
            }
        }

        Command::Delete { id, yes } => {
            let id = InfluenceId(id);
            let influence = repository.get_influence(id)?;

            if !yes && !confirm(&format!("Delete \"{}\"?", influence.content))? {
                println!("Kept influence #{}", id);
                return Ok(ExitCode::SUCCESS);
            }

            repository.delete_influence(id)?;
            println!("Deleted influence #{}", id);
        }

        Command::Link { source, target } => {
            let link = repository.create_link(InfluenceId(source), InfluenceId(target))?;
            println!("Linked #{} → #{} (link {})", link.source_id, link.target_id, link.id);
        }

        Command::Links { id } => {
            let id = InfluenceId(id);
            repository.get_influence(id)?;
            let links = repository.list_links_for(id)?;
            if links.is_empty() {
                println!("Influence #{} has no links.", id);
            }
            for link in links {
                if link.source_id == id {
                    println!("#{} → #{}", link.source_id, link.target_id);
                } else {
                    println!("#{} ← #{}", link.target_id, link.source_id);
                }
            }
        }

        Command::Graph => {
            let graph = build_graph(&repository.list_influences()?, &repository.list_links()?);
            println!("{}", serde_json::to_string_pretty(&graph)?);
        }

        Command::Reflect => {
            println!("Generating your weekly reflection...");
            return Ok(print_reflection(&state.weekly_reflection().await));
        }

        Command::Analyze { id } => {
            println!("Analyzing connections...");
            return Ok(print_reflection(&state.analyze_connections(InfluenceId(id)).await));
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn print_entry(entry: &TimelineEntry) {
    let influence = &entry.influence;
    let when = influence.created_at.with_timezone(&Local);

    println!("#{} {}", influence.id, when.format("%b %e, %Y %l:%M %p"));
    println!("  {}", influence.content);
    for linked in &entry.leads_to {
        println!("  → Leads to: {}", linked.content);
    }
    for linked in &entry.from {
        println!("  ← From: {}", linked.content);
    }
    println!();
}

fn dictation_hints(err: &DictationError) -> Vec<&'static str> {
    let mut hints = Vec::new();
    if err.disables_dictation() {
        hints.push("Dictation stays off until microphone access is allowed.");
    }
    if err.suggests_text_input() {
        hints.push("Try typing it instead: moodring add <text>");
    }
    hints
}

fn print_reflection(reflection: &Reflection) -> ExitCode {
    if reflection.is_failure() {
        eprintln!("{}", reflection.text());
        ExitCode::FAILURE
    } else {
        println!("{}", reflection.text());
        ExitCode::SUCCESS
    }
}

fn confirm(question: &str) -> Result<bool> {
    print!("{} Are you sure you want to delete this influence? [y/N] ", question);
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}
