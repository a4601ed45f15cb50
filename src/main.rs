mod cmd;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use model_port::envconfig::PortConfig;
use model_port::fake::FakeModelPort;
use model_port::utils::logging;
use model_port::{LlamaPort, ModelPort, TokenId};
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(name = "model-port")]
#[command(version)]
#[command(about = "Inspect a language model through its access port", long_about = None)]
struct Cli {
    /// JSON or YAML config file; MODEL_PORT_* variables are used otherwise.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use the built-in fake model instead of loading weights.
    #[arg(long, global = true)]
    fake: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Info,
    Tokenize {
        text: String,
        #[arg(short = 'n', long)]
        max_length: Option<usize>,
    },
    Forward {
        text: String,
        #[arg(short = 'n', long)]
        max_length: Option<usize>,
    },
    Decode {
        #[arg(required = true)]
        ids: Vec<TokenId>,
        /// Decode every id on its own.
        #[arg(long)]
        each: bool,
    },
    Tokens {
        #[arg(required = true)]
        ids: Vec<TokenId>,
    },
}

fn open_port(cli: &Cli) -> Result<Box<dyn ModelPort>> {
    let mut port: Box<dyn ModelPort> = if cli.fake {
        Box::new(FakeModelPort::default())
    } else {
        let config = match &cli.config {
            Some(path) => PortConfig::from_file(path)?,
            None => PortConfig::from_env()?,
        };
        Box::new(LlamaPort::new(config).context("model port configuration")?)
    };
    port.load_model()?;
    Ok(port)
}

fn run(cli: Cli) -> Result<()> {
    let mut port = open_port(&cli)?;

    let value = match cli.command {
        Commands::Info => cmd::info(port.as_ref())?,
        Commands::Tokenize { text, max_length } => cmd::tokenize(port.as_ref(), &text, max_length)?,
        Commands::Forward { text, max_length } => cmd::forward(port.as_mut(), &text, max_length)?,
        Commands::Decode { ids, each } => cmd::decode(port.as_ref(), &ids, each)?,
        Commands::Tokens { ids } => cmd::tokens(port.as_ref(), &ids)?,
    };

    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    logging::init_cli_logger(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}
