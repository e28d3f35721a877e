//! # Codemate CLI
//!
//! Interactive shell for LLM-assisted Python sessions: each line is sent to
//! the model with the running conversation, generated code is echoed and
//! executed, and every executed round-trip lands in the session history.
//!
//! Usage:
//!   codemate
//!   codemate --model claude-3-opus-20240229
//!   codemate --no-exec
//!
//! Inside the shell:
//!   > plot the first ten squares
//!   > no-exec model=claude-3-5-haiku-20241022 sketch a parser for ini files
//!   > /history

use clap::Parser;
use codemate_session::{Presenter, QueryOptions, SessionController};
use std::io::{self, BufRead, Write};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "codemate")]
#[command(author, version, about = "Codemate - chat with a model, run the code it writes")]
struct Cli {
    /// Default model identifier for queries
    #[arg(short, long)]
    model: Option<String>,

    /// API credential (falls back to ANTHROPIC_API_KEY)
    #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Do not execute generated code
    #[arg(long)]
    no_exec: bool,

    /// Do not render explanations
    #[arg(long)]
    no_explain: bool,

    /// Do not echo generated code
    #[arg(long)]
    no_code: bool,

    /// Enable diagnostic tracing output
    #[arg(short, long)]
    tracing: bool,
}

/// Session-wide defaults, overridable per line
#[derive(Debug, Clone)]
struct SessionDefaults {
    show_code: bool,
    execution: bool,
    display_explanation: bool,
    model: Option<String>,
}

/// Per-line settings parsed from the leading argument tokens
#[derive(Debug, PartialEq)]
struct LineArgs {
    show_code: bool,
    execution: bool,
    display_explanation: bool,
    model: Option<String>,
    prompt: String,
}

/// Split a query line into recognized leading tokens and the prompt body.
///
/// Recognized tokens are `no-code`, `no-exec`, `no-explain`, and
/// `model=<identifier>`; scanning stops at the first token that is none of
/// these, and the remainder of the line is the prompt.
fn parse_query_line(line: &str, defaults: &SessionDefaults) -> LineArgs {
    let mut show_code = defaults.show_code;
    let mut execution = defaults.execution;
    let mut display_explanation = defaults.display_explanation;
    let mut model = defaults.model.clone();

    let mut rest = line.trim_start();
    while let Some(token) = rest.split_whitespace().next() {
        match token {
            "no-code" => show_code = false,
            "no-exec" => execution = false,
            "no-explain" => display_explanation = false,
            _ if token.starts_with("model=") => {
                model = Some(token["model=".len()..].to_string());
            }
            _ => break,
        }
        rest = rest[token.len()..].trim_start();
    }

    LineArgs {
        show_code,
        execution,
        display_explanation,
        model,
        prompt: rest.trim_end().to_string(),
    }
}

/// Renders markdown explanations straight to the terminal
struct StdoutPresenter;

impl Presenter for StdoutPresenter {
    fn markdown(&self, text: &str) {
        println!("{}", text);
        println!();
    }
}

// Slash command parsing
mod commands {
    pub enum Command {
        Quit,
        Help,
        Clear,
        History,
        Last,
    }

    impl Command {
        pub fn parse(input: &str) -> Result<Self, String> {
            let parts: Vec<&str> = input[1..].split_whitespace().collect();
            if parts.is_empty() {
                return Err("Empty command".to_string());
            }

            match parts[0] {
                "quit" | "exit" => Ok(Command::Quit),
                "help" => Ok(Command::Help),
                "clear" => Ok(Command::Clear),
                "history" => Ok(Command::History),
                "last" => Ok(Command::Last),
                other => Err(format!(
                    "Unknown command: /{}. Type /help for available commands.",
                    other
                )),
            }
        }
    }
}

fn print_help() {
    println!("Available commands:");
    println!("  /quit, /exit           - Exit the session");
    println!("  /clear                 - Clear the conversation context");
    println!("  /history               - Show executed queries with their output");
    println!("  /last                  - Show the most recently generated code");
    println!("  /help                  - Show this help message");
    println!();
    println!("Anything else is sent to the model as a prompt. A line may start");
    println!("with per-query tokens before the prompt body:");
    println!("  no-code                - do not echo the generated code");
    println!("  no-exec                - do not execute the generated code");
    println!("  no-explain             - do not render the explanation");
    println!("  model=<identifier>     - override the model for this query");
}

fn setup_tracing(enable: bool) {
    if enable {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(Level::DEBUG)
            .finish();
        tracing::subscriber::set_global_default(subscriber)
            .expect("Setting default subscriber failed");
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    setup_tracing(cli.tracing);

    let mut session = match SessionController::from_env(cli.api_key.clone()) {
        Ok(session) => session.with_presenter(Box::new(StdoutPresenter)),
        Err(e) => {
            eprintln!("Error: {}", e.message());
            std::process::exit(1);
        }
    };

    let defaults = SessionDefaults {
        show_code: !cli.no_code,
        execution: !cli.no_exec,
        display_explanation: !cli.no_explain,
        model: cli.model.clone(),
    };

    let model = defaults
        .model
        .clone()
        .unwrap_or_else(|| session.default_model().to_string());
    println!("Codemate - chat with a model, run the code it writes. ({})", model);
    println!("Type /help for commands, Ctrl+D or /quit to exit.");
    println!();

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print!("> ");
        io::stdout().flush().unwrap();

        let line = match lines.next() {
            Some(Ok(line)) => line,
            Some(Err(e)) => {
                eprintln!("Error reading input: {}", e);
                break;
            }
            None => {
                println!();
                println!("Goodbye!");
                break;
            }
        };

        let input = line.trim();

        if input.is_empty() {
            continue;
        }

        if input.starts_with('/') {
            match commands::Command::parse(input) {
                Ok(commands::Command::Quit) => {
                    println!("Goodbye!");
                    break;
                }
                Ok(commands::Command::Help) => print_help(),
                Ok(commands::Command::Clear) => {
                    session.clear_context();
                    println!("Context cleared.");
                }
                Ok(commands::Command::History) => {
                    if session.history().is_empty() {
                        println!("(no executions recorded)");
                    } else {
                        print!("{}", session.render_history());
                    }
                }
                Ok(commands::Command::Last) => match session.last_code() {
                    Some(code) => {
                        println!("```python");
                        println!("{}", code);
                        println!("```");
                    }
                    None => println!("No code has been generated yet."),
                },
                Err(err) => println!("{}", err),
            }
            println!();
            continue;
        }

        let args = parse_query_line(input, &defaults);
        if args.prompt.is_empty() {
            println!("(empty prompt)");
            println!();
            continue;
        }

        let options = QueryOptions {
            model: args.model.clone(),
            execution: args.execution,
            display_explanation: args.display_explanation,
        };

        match session.query(&args.prompt, &options).await {
            Ok(result) => {
                if args.show_code && !result.code.is_empty() {
                    println!("Generated code:");
                    println!("```python");
                    println!("{}", result.code);
                    println!("```");
                    println!();
                }
                if let Some(output) = &result.output {
                    if !output.is_empty() {
                        println!("Output:");
                        print!("{}", output);
                    }
                }
                if let Some(error) = &result.error {
                    // the generated code failed; the query itself succeeded
                    println!("Error: {}", error);
                }
            }
            Err(e) => {
                eprintln!("Query failed: {}", e.message());
            }
        }

        println!();
    }
}
