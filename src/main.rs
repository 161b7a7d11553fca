//! heartline -- command-line front end for the Heartline session client.
//!
//! Wires configuration, storage, the HTTP client and the PKCE sign-in
//! strategy into a [`SessionManager`] and runs one command against it.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use heartline_session::Error;
use heartline_session::auth::{ConsentPrompt, ConsentResult, PkceCodeStrategy, UserProfile};
use heartline_session::config::Config;
use heartline_session::net::ApiClient;
use heartline_session::session::{SessionManager, SignInStatus};
use heartline_session::store::{self, TokenStore};

// ---------------------------------------------------------------------------
// CLI argument parsing (minimal, no clap dependency)
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Status,
    SignIn,
    SignOut,
    Me,
    Get(String),
}

#[derive(Debug)]
struct CliArgs {
    config_path: PathBuf,
    command: Command,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<CliArgs, String> {
    let mut args = args.into_iter();
    let mut config_path = PathBuf::from("heartline.toml");
    let mut command = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => match args.next() {
                Some(path) => config_path = PathBuf::from(path),
                None => return Err("--config requires a path argument".into()),
            },
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("heartline {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "status" if command.is_none() => command = Some(Command::Status),
            "sign-in" if command.is_none() => command = Some(Command::SignIn),
            "sign-out" if command.is_none() => command = Some(Command::SignOut),
            "me" if command.is_none() => command = Some(Command::Me),
            "get" if command.is_none() => match args.next() {
                Some(path) => command = Some(Command::Get(path)),
                None => return Err("get requires a path argument".into()),
            },
            other => return Err(format!("Unknown argument: {other}")),
        }
    }

    Ok(CliArgs {
        config_path,
        command: command.unwrap_or(Command::Status),
    })
}

fn print_usage() {
    println!(
        "\
heartline {version} -- Heartline session client

USAGE:
    heartline [OPTIONS] [COMMAND]

COMMANDS:
    status                 Show the current session [default]
    sign-in                Sign in with Google
    sign-out               Sign out and forget stored tokens
    me                     Fetch the signed-in user's profile
    get <PATH>             Authenticated GET against the backend

OPTIONS:
    -c, --config <PATH>    Path to configuration file [default: heartline.toml]
    -h, --help             Print this help message
    -V, --version          Print version information

ENVIRONMENT:
    RUST_LOG               Override log level (e.g. RUST_LOG=debug)
    HEARTLINE_CONFIG       Alternative to --config flag
    BACKEND_URL            Backend base URL
    GOOGLE_CLIENT_ID       Google OAuth client id
",
        version = env!("CARGO_PKG_VERSION")
    );
}

// ---------------------------------------------------------------------------
// Terminal consent prompt
// ---------------------------------------------------------------------------

/// Prints the authorization URL and reads the redirect URL back from stdin.
///
/// An empty line counts as dismissing the consent screen.
struct TerminalConsentPrompt;

#[async_trait]
impl ConsentPrompt for TerminalConsentPrompt {
    async fn authorize(
        &self,
        authorization_url: &str,
        redirect_uri: &str,
    ) -> heartline_session::Result<ConsentResult> {
        write_prompt(&mut std::io::stdout().lock(), authorization_url, redirect_uri)
            .map_err(|e| Error::Prompt(format!("failed to write prompt: {e}")))?;

        let mut line = String::new();
        BufReader::new(tokio::io::stdin())
            .read_line(&mut line)
            .await
            .map_err(|e| Error::Prompt(format!("failed to read redirect: {e}")))?;

        Ok(parse_consent_line(&line))
    }
}

fn write_prompt(
    out: &mut impl Write,
    authorization_url: &str,
    redirect_uri: &str,
) -> std::io::Result<()> {
    writeln!(out, "Open this URL in a browser and sign in:\n\n  {authorization_url}\n")?;
    write!(out, "Paste the {redirect_uri} URL you were sent to (empty to cancel): ")?;
    out.flush()
}

fn parse_consent_line(line: &str) -> ConsentResult {
    let line = line.trim();
    if line.is_empty() {
        ConsentResult::Dismissed
    } else {
        ConsentResult::Redirect(line.to_string())
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> anyhow::Result<()> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main())
}

async fn async_main() -> anyhow::Result<()> {
    // 1. Parse CLI arguments
    let cli = match parse_args(std::env::args().skip(1)) {
        Ok(cli) => cli,
        Err(message) => {
            eprintln!("Error: {message}");
            eprintln!("Run with --help for usage information.");
            std::process::exit(1);
        }
    };

    // Allow HEARTLINE_CONFIG env var as alternative to --config flag
    let config_path = std::env::var("HEARTLINE_CONFIG")
        .map(PathBuf::from)
        .unwrap_or(cli.config_path);

    // 2. Load configuration
    let config = Config::load(&config_path)?;

    // 3. Initialize tracing/logging
    init_tracing(&config);

    tracing::debug!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_path.display(),
        backend = %config.backend.base_url,
        storage = %config.storage.backend,
        "Starting heartline"
    );

    // 4. Build the session
    let tokens = TokenStore::new(store::from_config(&config.storage));
    let api = ApiClient::new(&config.backend.base_url)?;
    let strategy = Arc::new(PkceCodeStrategy::new(
        api.clone(),
        config.oauth.clone(),
        Arc::new(TerminalConsentPrompt),
    ));
    let session = Arc::new(SessionManager::new(api, tokens, strategy));

    // 5. Restore any stored session
    session.start().await;

    // 6. Run the command
    match cli.command {
        Command::Status => print_status(&session),
        Command::SignIn => match session.sign_in().await {
            SignInStatus::SignedIn => print_status(&session),
            SignInStatus::Cancelled => println!("Sign-in cancelled"),
            SignInStatus::Ignored => println!("A sign-in is already in progress"),
            SignInStatus::Locked | SignInStatus::Failed(_) => std::process::exit(1),
        },
        Command::SignOut => {
            session.sign_out().await;
            println!("Signed out");
        }
        Command::Me => match current_user(&session).await {
            Some(user) => println!("{}", serde_json::to_string_pretty(&user)?),
            None => anyhow::bail!("Not signed in"),
        },
        Command::Get(path) => {
            let value: serde_json::Value = session.queries().fetch(&path).await?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
    }

    Ok(())
}

/// The profile `start` already loaded, fetched again only if it is missing.
async fn current_user(session: &SessionManager) -> Option<UserProfile> {
    if session.snapshot().user().is_none() {
        session.load_user().await;
    }
    session.snapshot().user().cloned()
}

fn print_status(session: &SessionManager) {
    let snapshot = session.snapshot();
    println!("Session: {}", snapshot.phase());
    if let Some(user) = snapshot.user() {
        match &user.name {
            Some(name) => println!("User:    {name} <{}>", user.email),
            None => println!("User:    {}", user.email),
        }
    }
}

// ---------------------------------------------------------------------------
// Tracing initialization
// ---------------------------------------------------------------------------

/// Set up the tracing subscriber based on configuration.
///
/// Logs go to stderr so command output on stdout stays clean.
fn init_tracing(config: &Config) {
    // RUST_LOG env var takes precedence over config file
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = &config.logging.level;
        EnvFilter::new(format!("heartline_session={level},heartline={level},warn"))
    });

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    if config.logging.json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
