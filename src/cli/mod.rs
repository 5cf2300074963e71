//! Command-line host for the two demo flows.
//!
//! `agent-shim menu` runs the structured single-turn agent once and prints
//! the coerced answer. `agent-shim chat` acts as a UI host: one session per
//! process, one user message per stdin line, tokens echoed as they stream.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use futures::StreamExt;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::agent::ChatAgent;
use crate::config::ShimConfig;
use crate::error::ShimError;
use crate::output::{FieldType, OutputSchema};
use crate::session::{ChannelOutbound, OutboundEvent, SessionDriver};
use crate::tools::builtin::{MenuPlugin, WeatherPlugin};
use crate::tools::ToolRegistry;

/// agent-shim CLI
#[derive(Parser, Debug)]
#[command(name = "agent-shim", version, about = "Host tool-calling chat agents")]
pub struct Cli {
    /// Config file (default: ~/.agent-shim/config.toml if present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ask the menu agent one question and print the structured answer
    Menu(MenuArgs),
    /// Interactive streaming chat with the weather agent
    Chat(ChatArgs),
}

#[derive(Parser, Debug)]
pub struct MenuArgs {
    /// Agent instructions
    #[arg(short, long, default_value = "You are a helpful assistant.")]
    pub instructions: String,

    /// Print the raw reply instead of the coerced object
    #[arg(long)]
    pub raw: bool,

    /// The user message
    #[arg(default_value = "What is the price of the soup special?")]
    pub message: String,
}

#[derive(Parser, Debug)]
pub struct ChatArgs {
    /// Agent instructions
    #[arg(short, long, default_value = "You are a helpful assistant")]
    pub instructions: String,
}

impl Cli {
    pub async fn run(self) -> Result<(), ShimError> {
        let config = match self.config {
            Some(ref path) => ShimConfig::load_from(path)?,
            None => ShimConfig::load()?,
        };
        match self.command {
            Commands::Menu(args) => run_menu(&config, args).await,
            Commands::Chat(args) => run_chat(config, args).await,
        }
    }
}

/// `{price: number, name: string}`
pub fn menu_item_schema() -> OutputSchema {
    OutputSchema::new("MenuItem")
        .field("price", FieldType::Number)
        .field("name", FieldType::String)
}

async fn run_menu(config: &ShimConfig, args: MenuArgs) -> Result<(), ShimError> {
    let agent = ChatAgent::from_config(config)?
        .name("SK-Assistant")
        .instructions(args.instructions)
        .tools(ToolRegistry::new().with_plugin(&MenuPlugin)?)
        .output_schema(menu_item_schema())
        .build();

    let response = agent.get_response(args.message, None).await?;
    if args.raw {
        println!("{}", response.text());
    } else if let Some(ref object) = response.structured {
        println!("{}", serde_json::to_string_pretty(object)?);
    }
    Ok(())
}

async fn run_chat(config: ShimConfig, args: ChatArgs) -> Result<(), ShimError> {
    let instructions = args.instructions;
    let policy = config.runtime.turn_policy;
    let driver = Arc::new(
        SessionDriver::new(move |_session: &str| -> Result<ChatAgent, ShimError> {
            Ok(ChatAgent::from_config(&config)?
                .name("Host")
                .instructions(instructions.clone())
                .tools(ToolRegistry::new().with_plugin(&WeatherPlugin)?)
                .build())
        })
        .with_turn_policy(policy),
    );

    let session_id = uuid::Uuid::new_v4().to_string();
    driver.on_session_start(&session_id).await?;
    eprintln!("Chat session started. Ctrl-C or Ctrl-D to end.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };
        let message = line.trim().to_string();
        if message.is_empty() {
            continue;
        }

        let (mut outbound, events) = ChannelOutbound::channel();
        let printer = tokio::spawn(print_events(events));
        let mut turn = {
            let driver = Arc::clone(&driver);
            let session_id = session_id.clone();
            tokio::spawn(async move { driver.on_message(&session_id, &message, &mut outbound).await })
        };

        let (outcome, interrupted) = tokio::select! {
            outcome = &mut turn => (outcome, false),
            _ = tokio::signal::ctrl_c() => {
                driver.on_session_end(&session_id).await?;
                (turn.await, true)
            }
        };
        match outcome {
            Ok(Ok(_)) | Ok(Err(ShimError::Canceled)) => {}
            Ok(Err(err)) => eprintln!("turn failed: {err}"),
            Err(join) => eprintln!("turn task failed: {join}"),
        }
        let _ = printer.await;
        if interrupted {
            eprintln!("\nSession ended.");
            return Ok(());
        }
    }

    driver.on_session_end(&session_id).await
}

async fn print_events(mut events: tokio_stream::wrappers::UnboundedReceiverStream<OutboundEvent>) {
    let mut stdout = std::io::stdout();
    while let Some(event) = events.next().await {
        match event {
            OutboundEvent::Token(token) => {
                print!("{token}");
                let _ = stdout.flush();
            }
            OutboundEvent::Sent(_) => println!(),
            OutboundEvent::Failed { error, .. } => {
                println!();
                eprintln!("[failed: {error}]");
            }
        }
    }
}
