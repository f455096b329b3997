//! Chat command - interactive question loop

use std::io::Write;

use anyhow::{Context, Result};
use clap::Args;
use reviewbot_search::{ReviewSearcher, SearchError};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use super::{create_searcher, load_valid_config};
use crate::present::format_results;
use crate::progress::{clear_spinner, finish_spinner, finish_spinner_warn, spinner};
use crate::GlobalOptions;

const EXIT_WORDS: [&str; 3] = ["exit", "quit", "q"];

/// Arguments for the chat command
#[derive(Args, Debug)]
pub struct ChatArgs {
    /// Reviews shown per question (defaults to [retrieval].top_k)
    #[arg(long, short = 'k')]
    top_k: Option<usize>,
}

/// What the loop should do with one line of input
#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Exit,
    Blank,
    Question(&'a str),
}

fn classify(line: &str) -> Input<'_> {
    let trimmed = line.trim();
    if EXIT_WORDS.contains(&trimmed.to_lowercase().as_str()) {
        Input::Exit
    } else if trimmed.is_empty() {
        Input::Blank
    } else {
        Input::Question(trimmed)
    }
}

fn prompt() -> Result<()> {
    print!("\nYour question: ");
    std::io::stdout().flush().context("Failed to write prompt")
}

async fn answer(searcher: &ReviewSearcher, question: &str, top_k: usize, quiet: bool) {
    println!("Searching for relevant reviews...");
    let pb = spinner("Searching...", quiet);
    let result = searcher.search(question, top_k).await;
    clear_spinner(pb);

    match result {
        Ok(results) => print!("{}", format_results(&results)),
        Err(err @ SearchError::Connectivity(_)) => println!("{}", err),
        Err(err) => println!("Error: {}", err),
    }
}

/// Execute the chat command
pub async fn execute(args: ChatArgs, global: GlobalOptions) -> Result<()> {
    let config = load_valid_config(&global)?;
    let top_k = args.top_k.unwrap_or(config.retrieval.top_k);
    let searcher = create_searcher(&config)?;

    let pb = spinner("Connecting to the review store...", global.quiet);
    match searcher.store().ping().await {
        Ok(()) => finish_spinner(pb, "Connected"),
        Err(e) => finish_spinner_warn(pb, &format!("Store did not answer ({}); searches may fail", e)),
    }

    let pb = spinner("Loading the embedding model...", global.quiet);
    searcher
        .provider()
        .warmup()
        .await
        .context("Embedding provider failed to start")?;
    finish_spinner(pb, "Embedding model ready");

    println!("\nWelcome to the Hotel Review Chatbot!");
    println!("Ask questions about hotel experiences, and I'll find the most relevant reviews!");
    println!("Type 'exit' or 'quit' to end the session.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        prompt()?;

        let line = tokio::select! {
            line = lines.next_line() => line.context("Failed to read input")?,
            _ = tokio::signal::ctrl_c() => {
                println!("\nSession terminated by user. Goodbye!");
                return Ok(());
            }
        };

        // End of input behaves like "exit"
        let Some(line) = line else {
            println!();
            break;
        };

        match classify(&line) {
            Input::Exit => {
                println!("Thank you for using the Hotel Review Chatbot. Goodbye!");
                break;
            }
            Input::Blank => {
                println!("Please enter a question or topic about hotel experiences.");
            }
            Input::Question(question) => {
                debug!("Question: {}", question);
                tokio::select! {
                    _ = answer(&searcher, question, top_k, global.quiet) => {}
                    _ = tokio::signal::ctrl_c() => {
                        println!("\nSession terminated by user. Goodbye!");
                        return Ok(());
                    }
                }
            }
        }
    }

    Ok(())
}
