use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use datachat_core::engine::{build_chat_agent, build_interpreter_agent, EngineContext};
use datachat_core::rag::{create_embedding_generator, IndexBuilder};
use datachat_core::{Agent, EngineConfig, InterpreterSession, Settings};
use log::LevelFilter;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser, Debug)]
#[clap(name = "datachat", author, version = "0.1.0", about = "Chat with your data")]
struct Cli {
    #[clap(subcommand)]
    command: Commands,

    #[clap(long, short, global = true, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Chat with the general agent (query engine over the index plus configured tools)
    Chat {
        #[clap(long, short, help = "Send a single message and print the answer")]
        message: Option<String>,
    },
    /// Upload DATASET_PATH into a code interpreter session and analyse it
    Interpret {
        #[clap(long, short, help = "Send a single message and print the answer")]
        message: Option<String>,
    },
    /// Build the document index from DATA_DIR into STORAGE_DIR
    Generate,
}

enum Session {
    Chat(Agent),
    Interpreter(InterpreterSession),
}

impl Session {
    async fn chat(&mut self, message: &str) -> Result<String> {
        let answer = match self {
            Session::Chat(agent) => agent.chat(message).await?,
            Session::Interpreter(session) => session.agent.chat(message).await?,
        };
        Ok(answer)
    }

    fn reset(&mut self) {
        match self {
            Session::Chat(agent) => agent.reset(),
            Session::Interpreter(session) => session.agent.reset(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level_filter = cli.log_level.parse().unwrap_or(LevelFilter::Info);
    env_logger::Builder::new()
        .filter_level(log_level_filter)
        .init();

    let config = EngineConfig::from_env().context("Failed to read configuration")?;

    match cli.command {
        Commands::Chat { message } => {
            let ctx = EngineContext::from_config(&config)?;
            let agent = build_chat_agent(&config, &ctx).await?;
            run_session(Session::Chat(agent), message).await
        }
        Commands::Interpret { message } => {
            let settings = Settings::from_config(&config)?;
            let session = build_interpreter_agent(&config, &settings).await?;
            for file in &session.uploaded {
                println!("Uploaded {} ({} bytes)", file.full_path(), file.size_in_bytes);
            }
            run_session(Session::Interpreter(session), message).await
        }
        Commands::Generate => generate(&config).await,
    }
}

async fn generate(config: &EngineConfig) -> Result<()> {
    let embed_model = create_embedding_generator(&config.embedding)?;
    let index = IndexBuilder::new(embed_model)
        .generate(&config.data_dir, &config.storage_dir)
        .await
        .with_context(|| format!("Failed to index {}", config.data_dir.display()))?;
    println!(
        "Indexed {} chunks from {} into {}",
        index.len(),
        config.data_dir.display(),
        config.storage_dir.display()
    );
    Ok(())
}

async fn run_session(mut session: Session, message: Option<String>) -> Result<()> {
    if let Some(message) = message {
        let answer = session.chat(&message).await?;
        println!("{}", answer);
        return Ok(());
    }

    println!("Type a message, /reset to clear the conversation, /exit to quit.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        match line {
            "" => continue,
            "/exit" | "/quit" => break,
            "/reset" => {
                session.reset();
                println!("Conversation cleared.");
            }
            _ => match session.chat(line).await {
                Ok(answer) => println!("{}", answer),
                // Keep the REPL alive; the next message may succeed.
                Err(e) => eprintln!("Error: {:#}", e),
            },
        }
    }
    Ok(())
}
