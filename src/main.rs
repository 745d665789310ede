//! lsml - Lecture script compiler

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use serde::Serialize;

use lsml::{
    CachedVoiceRegistry, CompilationResult, CompileError, Config, Error, StaticVoiceRegistry,
    compile_file, read_meta,
};

#[derive(Parser)]
#[command(name = "lsml")]
#[command(version, about = "Compile lecture scripts into production plans", long_about = None)]
#[command(after_help = "EXAMPLES:
    lsml talk.xml                   Print the production plan as JSON
    lsml talk.xml -o plan.json      Write the production plan to a file
    lsml -i talk.xml                Show document information")]
struct Cli {
    /// Input script (XML)
    #[arg(value_name = "SCRIPT")]
    input: PathBuf,

    /// Output file for the plan (JSON); printed to stdout if omitted
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Configuration file (JSON)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Show document information without compiling
    #[arg(short, long)]
    info: bool,

    /// Log progress
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log errors
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Serialize)]
struct PlanOutput<'a> {
    title: &'a str,
    #[serde(flatten)]
    plan: &'a CompilationResult,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose {
        "info"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();

    let result = if cli.info {
        show_info(&cli).await
    } else {
        run(&cli).await
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report(&e);
            ExitCode::FAILURE
        }
    }
}

async fn show_info(cli: &Cli) -> Result<(), Error> {
    let (meta, _) = read_meta(&cli.input).await?;

    println!("File: {}", cli.input.display());
    println!("Title: {}", meta.title());
    for (key, value) in meta.info.iter().filter(|(k, _)| *k != "title") {
        println!("{key}: {value}");
    }
    if !meta.settings.is_empty() {
        let settings: Vec<_> = meta.settings.iter().map(|(k, v)| format!("{k}={v}")).collect();
        println!("Settings: {}", settings.join(", "));
    }
    for deck in meta.decks.values() {
        let active = if deck.id == meta.active_deck { " (active)" } else { "" };
        println!(
            "Deck {}{active}: {} ({} pages, {})",
            deck.id, deck.source, deck.page_count, deck.fit
        );
    }
    for lexicon in &meta.lexicons {
        println!("Lexicon {}: {} lexemes", lexicon.id, lexicon.lexemes.len());
    }
    if let Some(ref start) = meta.marks.startmark {
        println!("Start mark: {start}");
    }
    if let Some(ref end) = meta.marks.endmark {
        println!("End mark: {end}");
    }

    Ok(())
}

async fn run(cli: &Cli) -> Result<(), Error> {
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    let registry = CachedVoiceRegistry::new(StaticVoiceRegistry::from_config(&config));

    let (meta, plan) = compile_file(&cli.input, &config, &registry).await?;

    let json = serde_json::to_string_pretty(&PlanOutput {
        title: meta.title(),
        plan: &plan,
    })?;

    match &cli.output {
        Some(path) => {
            std::fs::write(path, json)?;
            if !cli.quiet {
                eprintln!(
                    "Wrote {} sections to {}",
                    plan.sections.len(),
                    path.display()
                );
            }
        }
        None => println!("{json}"),
    }

    Ok(())
}

fn report(e: &Error) {
    match e {
        Error::Meta(meta) => {
            eprintln!("error: invalid document configuration");
            for issue in &meta.issues {
                eprintln!("  - {issue}");
            }
        }
        Error::Compile(CompileError::BudgetExceeded(violations)) => {
            eprintln!("error: sections are too long for their voices");
            for violation in violations {
                eprintln!("  - {violation}");
            }
            eprintln!(
                "Shorten these sections or split them with <mark name=\"...\"/> tags."
            );
        }
        other => eprintln!("error: {other}"),
    }
}
