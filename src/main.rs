use anyhow::{Result, anyhow};
use clap::{Args, Parser, Subcommand};
use tokio::sync::mpsc;

use guided_ops::backend::{self, OllamaBackend};
use guided_ops::conversation::ReplyOutcome;
use guided_ops::tui::{self, EventHandler, Tui, TICK_RATE};
use guided_ops::voice::DictationEvent;
use guided_ops::{handler, logging, ui, App, ChatMessage, ChatError, Config};

#[derive(Parser)]
#[command(name = "guided-ops")]
#[command(author, version, about = "Chat shell with a document sidebar and optional voice input")]
struct Cli {
    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Flags that take precedence over the config file
#[derive(Args)]
struct Overrides {
    /// Reply backend: simulated or ollama
    #[arg(long, global = true)]
    backend: Option<String>,

    /// Model name for the Ollama backend
    #[arg(long, global = true)]
    model: Option<String>,

    /// Ollama base URL
    #[arg(long, global = true)]
    ollama_url: Option<String>,

    /// Delay before the simulated reply arrives
    #[arg(long, global = true)]
    reply_delay_ms: Option<u64>,

    /// Give up on a reply after this many seconds
    #[arg(long, global = true)]
    reply_timeout_secs: Option<u64>,

    /// Speech-to-text command; each stdout line is a recognized fragment
    #[arg(long, global = true)]
    dictation_command: Option<String>,
}

impl Overrides {
    fn apply(self, config: &mut Config) {
        if let Some(backend) = self.backend {
            config.backend = backend;
        }
        if let Some(model) = self.model {
            config.model = model;
        }
        if let Some(url) = self.ollama_url {
            config.ollama_url = url;
        }
        if let Some(delay) = self.reply_delay_ms {
            config.reply_delay_ms = delay;
        }
        if let Some(timeout) = self.reply_timeout_secs {
            config.reply_timeout_secs = timeout;
        }
        if let Some(command) = self.dictation_command {
            config.dictation_command = Some(command);
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Open the chat shell (default)
    Run,
    /// Send one question to the configured backend and print the reply
    Ask {
        /// Your question
        question: String,
    },
    /// List models available on the Ollama server
    Models,
    /// Print the effective configuration
    Config {
        /// Write a default config file if none exists
        #[arg(long)]
        init: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load().unwrap_or_else(|e| {
        eprintln!("Ignoring unreadable config: {}", e);
        Config::default()
    });
    cli.overrides.apply(&mut config);

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_tui(config).await,
        Commands::Ask { question } => {
            logging::init_stderr();
            ask(&config, &question).await
        }
        Commands::Models => {
            logging::init_stderr();
            list_models(&config).await
        }
        Commands::Config { init } => show_config(&config, init),
    }
}

async fn run_tui(config: Config) -> Result<()> {
    match logging::init_file() {
        Ok(path) => tracing::info!(log = %path.display(), "starting guided-ops"),
        Err(e) => eprintln!("Logging disabled: {}", e),
    }
    tui::install_panic_hook();

    let (reply_tx, mut reply_rx) = mpsc::unbounded_channel();
    let (dictation_tx, mut dictation_rx) = mpsc::unbounded_channel();
    let mut app = App::new(&config, reply_tx, dictation_tx);

    let mut terminal = tui::init()?;
    let mut events = EventHandler::new(TICK_RATE);

    let result = run_loop(&mut terminal, &mut app, &mut events, &mut reply_rx, &mut dictation_rx).await;

    tui::restore()?;
    tracing::info!("exiting");
    result
}

async fn run_loop(
    terminal: &mut Tui,
    app: &mut App,
    events: &mut EventHandler,
    replies: &mut mpsc::UnboundedReceiver<ReplyOutcome>,
    dictation: &mut mpsc::UnboundedReceiver<DictationEvent>,
) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        tokio::select! {
            Some(event) = events.next() => handler::handle_event(app, event),
            Some(outcome) = replies.recv() => app.apply_reply(outcome),
            Some(event) = dictation.recv() => app.apply_dictation(event),
            else => break,
        }
    }
    Ok(())
}

async fn ask(config: &Config, question: &str) -> Result<()> {
    if question.trim().is_empty() {
        return Err(anyhow!("Question is empty"));
    }

    let backend = backend::from_config(config);
    let history = [ChatMessage::user(question)];
    let timeout = config.reply_timeout();

    let reply = match tokio::time::timeout(timeout, backend.reply(&history)).await {
        Ok(reply) => reply,
        Err(_) => Err(ChatError::ReplyTimeout(timeout)),
    };

    match reply {
        Ok(text) => {
            println!("{}", text);
            Ok(())
        }
        Err(e) => {
            if matches!(config.backend_kind(), Some(backend::BackendKind::Ollama)) {
                eprintln!("Make sure Ollama is running: ollama serve");
            }
            Err(e.into())
        }
    }
}

async fn list_models(config: &Config) -> Result<()> {
    let ollama = OllamaBackend::new(&config.ollama_url, &config.model);

    match ollama.list_models().await {
        Ok(models) if models.is_empty() => {
            println!("No models found. Pull a model with: ollama pull llama3.2");
        }
        Ok(models) => {
            for model in models {
                let marker = if model == config.model { "*" } else { " " };
                println!("{} {}", marker, model);
            }
        }
        Err(e) => {
            eprintln!("Error connecting to Ollama at {}: {}", config.ollama_url, e);
            eprintln!("Make sure Ollama is running: ollama serve");
            return Err(e.into());
        }
    }

    Ok(())
}

fn show_config(config: &Config, init: bool) -> Result<()> {
    if init {
        let path = Config::get_config_path()?;
        if path.exists() {
            println!("Config already exists at {}", path.display());
        } else {
            let path = Config::default().save()?;
            println!("Wrote default config to {}", path.display());
        }
    }

    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}
