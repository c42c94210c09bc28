use clap::{Parser, Subcommand};
use parley::channels::TelegramChannel;
use parley::config::{self, Config, TelegramSettings};
use parley::exchange::{
    challenge_message, render_summary, ChallengeExchange, PromptExchange, QuestionnaireExchange,
};
use parley::session::{SessionEngine, SessionError};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "parley")]
#[command(about = "Ask over Telegram and wait for the reply", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Create the configuration directory and a default config file to fill in.
    Init {
        /// Config file path (default: PARLEY_CONFIG_PATH or ~/.parley/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,
    },

    /// Send one prompt and print the first reply on stdout.
    Prompt {
        /// Config file path (default: PARLEY_CONFIG_PATH or ~/.parley/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,

        /// Overall reply timeout in seconds (default from config or TELEGRAM_REPLY_TIMEOUT)
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,

        /// Prompt text; `\n`, `\t`, `\r` and `\\` are unescaped.
        #[arg(long = "prompt", short = 'p', value_name = "TEXT")]
        prompt: Option<String>,

        /// Prompt text as positional words (alternative to --prompt).
        #[arg(trailing_var_arg = true)]
        text: Vec<String>,
    },

    /// Run the brainstorming questionnaire and print the recap.
    Brainstorm {
        /// Config file path (default: PARLEY_CONFIG_PATH or ~/.parley/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,

        /// Overall timeout for all questions, in seconds
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,

        /// Print the answers as JSON instead of the recap
        #[arg(long)]
        json: bool,
    },

    /// Send a random six-digit code and wait for it to be echoed back unchanged.
    EchoTest {
        /// Config file path (default: PARLEY_CONFIG_PATH or ~/.parley/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,

        /// Reply timeout in seconds
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,
    },
}

/// Failure of a command, split by exit code: usage/configuration (2) vs session (1).
enum CliError {
    Usage(anyhow::Error),
    Session(SessionError),
}

impl CliError {
    fn exit_code(&self) -> i32 {
        match self {
            CliError::Usage(_) | CliError::Session(SessionError::Config(_)) => 2,
            CliError::Session(_) => 1,
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Usage(e) => write!(f, "{:#}", e),
            CliError::Session(SessionError::DeadlineExceeded) => {
                write!(f, "session timed out: no reply within the configured time")
            }
            CliError::Session(e) => write!(f, "session failed: {}", e),
        }
    }
}

impl From<anyhow::Error> for CliError {
    fn from(e: anyhow::Error) -> Self {
        CliError::Usage(e)
    }
}

impl From<SessionError> for CliError {
    fn from(e: SessionError) -> Self {
        CliError::Session(e)
    }
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let result = match cli.command {
        Some(Commands::Version) => {
            println!("parley {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Some(Commands::Init { config }) => run_init(config).map_err(CliError::from),
        Some(Commands::Prompt {
            config,
            timeout,
            prompt,
            text,
        }) => run_prompt(config, timeout, prompt, text).await,
        Some(Commands::Brainstorm {
            config,
            timeout,
            json,
        }) => run_brainstorm(config, timeout, json).await,
        Some(Commands::EchoTest { config, timeout }) => run_echo_test(config, timeout).await,
        None => {
            println!("Run with --help for usage");
            Ok(())
        }
    };

    if let Err(e) = result {
        log::error!("{}", e);
        std::process::exit(e.exit_code());
    }
}

fn run_init(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(config::default_config_path);
    let dir = parley::init::init_config_dir(&path)?;
    println!("initialized configuration at {}", dir.display());
    println!("fill in channels.telegram.botToken and chatId in {}", path.display());
    Ok(())
}

/// Everything a session command needs: loaded config, Telegram client, target chat and timeout.
struct SessionSetup {
    config: Config,
    client: TelegramChannel,
    chat_id: String,
    timeout: Duration,
}

fn prepare(config_path: Option<PathBuf>, timeout: Option<u64>) -> Result<SessionSetup, CliError> {
    let (config, path) = config::load_config(config_path)?;
    log::debug!("using config {}", path.display());
    let settings = TelegramSettings::resolve(&config)?;
    let timeout = match timeout {
        Some(0) => {
            return Err(CliError::Usage(anyhow::anyhow!(
                "--timeout must be greater than 0"
            )))
        }
        Some(secs) => Duration::from_secs(secs),
        None => config::resolve_reply_timeout(&config)?,
    };
    let client = TelegramChannel::new(
        settings.api_base.as_deref(),
        &settings.bot_token,
        settings.proxy_url.as_deref(),
    )
    .map_err(|e| CliError::Usage(anyhow::anyhow!("telegram client setup: {}", e)))?;
    Ok(SessionSetup {
        config,
        client,
        chat_id: settings.chat_id,
        timeout,
    })
}

/// Cancel the returned token on Ctrl-C so the running session stops at its next poll.
fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let t = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("interrupt received, cancelling session");
            t.cancel();
        }
    });
    token
}

async fn run_prompt(
    config_path: Option<PathBuf>,
    timeout: Option<u64>,
    prompt: Option<String>,
    text: Vec<String>,
) -> Result<(), CliError> {
    let prompt = build_prompt_text(prompt.as_deref(), &text).map_err(anyhow::Error::msg)?;
    let setup = prepare(config_path, timeout)?;
    let exchange = PromptExchange::new(&prompt)?;

    eprintln!("waiting for a reply in Telegram (chat {})...", setup.chat_id);
    let reply = SessionEngine::new(&setup.client, setup.chat_id.as_str())
        .with_cancellation(cancel_on_ctrl_c())
        .run(exchange, setup.timeout)
        .await?;

    eprintln!("reply received.");
    println!("{}", reply.normalized);
    Ok(())
}

async fn run_brainstorm(
    config_path: Option<PathBuf>,
    timeout: Option<u64>,
    json: bool,
) -> Result<(), CliError> {
    let setup = prepare(config_path, timeout)?;
    let exchange = QuestionnaireExchange::new(config::resolve_questions(&setup.config))?;

    eprintln!(
        "brainstorming running: answer {} question(s) in Telegram (chat {}).",
        exchange.questions().len(),
        setup.chat_id
    );
    let answers = SessionEngine::new(&setup.client, setup.chat_id.as_str())
        .with_cancellation(cancel_on_ctrl_c())
        .run(exchange, setup.timeout)
        .await?;

    eprintln!("brainstorming complete.");
    if json {
        let out = serde_json::to_string_pretty(&answers)
            .map_err(|e| CliError::Usage(anyhow::anyhow!("serializing answers: {}", e)))?;
        println!("{}", out);
    } else {
        println!("{}", render_summary(&answers));
    }
    Ok(())
}

async fn run_echo_test(config_path: Option<PathBuf>, timeout: Option<u64>) -> Result<(), CliError> {
    let setup = prepare(config_path, timeout)?;
    let exchange = ChallengeExchange::generate()?;

    println!("sending challenge to chat_id={}", setup.chat_id);
    println!("challenge code: {}", exchange.code());
    println!("message: {}", challenge_message(exchange.code()));
    println!("reply in Telegram with exactly the same six digits.");

    SessionEngine::new(&setup.client, setup.chat_id.as_str())
        .with_cancellation(cancel_on_ctrl_c())
        .run(exchange, setup.timeout)
        .await?;

    println!("test passed: matching reply received, the link round-trips unchanged");
    Ok(())
}

/// Prompt from exactly one of `--prompt` or positional words, with escape sequences expanded.
fn build_prompt_text(flag: Option<&str>, positional: &[String]) -> Result<String, String> {
    let from_flag = flag.map(str::trim).unwrap_or("");
    let joined = positional.join(" ");
    let from_positional = joined.trim();

    match (from_flag.is_empty(), from_positional.is_empty()) {
        (false, false) => Err("use either --prompt or positional prompt, not both".to_string()),
        (false, true) => Ok(unescape_prompt_text(from_flag)),
        (true, false) => Ok(unescape_prompt_text(from_positional)),
        (true, true) => Err(
            "prompt is required: pass --prompt \"...\" or provide positional text".to_string(),
        ),
    }
}

/// Expand `\n`, `\r`, `\t` and `\\`; any other backslash sequence is kept as written.
fn unescape_prompt_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let replacement = match chars.peek() {
            Some('n') => Some('\n'),
            Some('r') => Some('\r'),
            Some('t') => Some('\t'),
            Some('\\') => Some('\\'),
            _ => None,
        };
        match replacement {
            Some(r) => {
                out.push(r);
                chars.next();
            }
            None => out.push('\\'),
        }
    }
    out
}
