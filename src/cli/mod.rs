//! Command-line interface parsing and handling
//!
//! This module parses command-line arguments, wires the stores and the API
//! client together, and executes the requested command.

pub mod chat;
pub mod model_list;
pub mod say;
pub mod sessions;
pub mod settings;
pub mod user_info;


use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::debug;

use crate::api::error::format_api_error;
use crate::api::{ApiError, ChatApiClient, ModelSubType, ModelType, API_TIMEOUT};
use crate::core::config::{ConfigDefaults, ConfigStore};
use crate::core::error_handler::{ErrorHandler, ErrorHost, HandleOptions};
use crate::core::keyring::KeyringStore;
use crate::core::routes::RouteGuard;
use crate::core::session::SessionStore;
use crate::core::storage::{FileStore, KeyValueStore, MemoryStore};
use crate::logging;

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("VERGEN_GIT_DESCRIBE"),
    ")"
);

#[derive(Parser)]
#[command(name = "ichat")]
#[command(version = VERSION)]
#[command(about = "A terminal chat client for OpenAI-compatible APIs")]
#[command(
    long_about = "ichat talks to any OpenAI-compatible chat-completions endpoint, streams \
replies as they arrive and keeps every conversation as a named, pinnable session.\n\n\
Configuration:\n\
  ichat set api-key <KEY>      Store the API key (in the system keyring by default)\n\
  ichat set api-url <URL>      Store the API base URL\n\n\
Environment Variables (used when nothing is stored):\n\
  ICHAT_API_KEY     API key\n\
  ICHAT_API_URL     API base URL\n\
  RUST_LOG          Log filter (defaults to ichat=warn)\n\n\
Controls in chat:\n\
  Enter             Send the message\n\
  Ctrl+C            Stop the reply being streamed\n\
  /quit             Leave the chat"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Append diagnostic logs to this file instead of stderr
    #[arg(short = 'l', long, global = true, value_name = "FILE")]
    pub log: Option<PathBuf>,

    /// Keep the API key in the data file instead of the system keyring
    #[arg(long, global = true)]
    pub no_keyring: bool,

    /// Keep everything in memory for this run only
    #[arg(long, global = true)]
    pub no_persist: bool,

    /// Log debug details
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start an interactive chat (default)
    Chat {
        /// Model to use for a new session
        #[arg(short = 'm', long)]
        model: Option<String>,
        /// Continue an existing session
        #[arg(short = 's', long, value_name = "ID")]
        session: Option<String>,
    },
    /// Send a single prompt and stream the reply to stdout
    Say {
        /// Prompt text; multiple words are joined with spaces
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        prompt: Vec<String>,
        #[arg(short = 'm', long)]
        model: Option<String>,
    },
    /// List available models, newest first
    Models {
        #[arg(long = "type", value_name = "TYPE")]
        model_type: Option<ModelType>,
        #[arg(long, value_name = "SUB_TYPE")]
        sub_type: Option<ModelSubType>,
    },
    /// Show the account behind the configured API key
    User,
    /// Manage saved chat sessions
    Sessions {
        #[command(subcommand)]
        command: SessionCommands,
    },
    /// Set configuration values
    Set {
        /// Configuration key to set
        key: String,
        /// Value to set for the key
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        value: Vec<String>,
    },
    /// Unset configuration values
    Unset {
        /// Configuration key to unset
        key: String,
    },
    /// Show the effective configuration
    Config,
}

#[derive(Subcommand)]
pub enum SessionCommands {
    /// List sessions, pinned first then most recently updated
    List,
    /// Print a session's transcript
    Show { id: String },
    /// Rename a session
    Rename {
        id: String,
        #[arg(trailing_var_arg = true, required = true)]
        name: Vec<String>,
    },
    /// Pin or unpin a session
    Pin { id: String },
    /// Delete a session
    Delete { id: String },
    /// Delete every session
    Clear,
}

/// Stores and services shared by every command.
pub struct CliContext {
    pub config: Arc<ConfigStore>,
    pub storage: Arc<dyn KeyValueStore>,
    pub defaults: ConfigDefaults,
    /// Where entries are persisted; `None` for in-memory runs.
    pub data_file: Option<PathBuf>,
}

impl CliContext {
    pub fn open(no_persist: bool, no_keyring: bool) -> Result<Self, Box<dyn Error>> {
        let defaults = ConfigDefaults::from_env();
        if no_persist {
            return Ok(Self::with_store(Arc::new(MemoryStore::new()), None, defaults));
        }

        let path = FileStore::default_path()?;
        let storage: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(path.clone()));
        let secrets: Option<Arc<dyn KeyValueStore>> = if no_keyring {
            None
        } else {
            Some(Arc::new(KeyringStore::new()))
        };
        let mut context = Self::with_store(storage, secrets, defaults);
        context.data_file = Some(path);
        Ok(context)
    }

    pub fn with_store(
        storage: Arc<dyn KeyValueStore>,
        secrets: Option<Arc<dyn KeyValueStore>>,
        defaults: ConfigDefaults,
    ) -> Self {
        let config = match secrets {
            Some(secrets) => ConfigStore::with_secret_store(Arc::clone(&storage), secrets),
            None => ConfigStore::new(Arc::clone(&storage)),
        };
        Self {
            config: Arc::new(config),
            storage,
            defaults,
            data_file: None,
        }
    }

    pub fn client(&self) -> Result<ChatApiClient, Box<dyn Error>> {
        let http = reqwest::Client::builder()
            .connect_timeout(API_TIMEOUT)
            .build()?;
        Ok(ChatApiClient::new(
            http,
            Arc::clone(&self.config),
            self.defaults.clone(),
        ))
    }

    pub fn sessions(&self) -> Result<SessionStore, Box<dyn Error>> {
        Ok(SessionStore::open(Arc::clone(&self.storage))?)
    }

    pub fn route_guard(&self) -> RouteGuard {
        RouteGuard::new(Arc::clone(&self.config), self.defaults.clone())
    }
}

/// Reports errors on stderr and points at the `set` commands when the
/// credentials need attention.
pub struct TerminalHost;

impl ErrorHost for TerminalHost {
    fn notify(&self, message: &str) {
        eprintln!("❌ {message}");
    }

    fn open_settings(&self) {
        eprintln!();
        eprintln!("💡 Configure the API connection:");
        eprintln!("  • ichat set api-key <KEY>");
        eprintln!("  • ichat set api-url <URL>");
    }
}

pub fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    logging::init(logging::default_filter(args.verbose), args.log.as_deref())?;

    let runtime = tokio::runtime::Runtime::new()?;
    if let Err(err) = runtime.block_on(async_main(args)) {
        report_error(err.as_ref());
        std::process::exit(1);
    }
    Ok(())
}

fn report_error(err: &(dyn Error + 'static)) {
    let Some(api_error) = err.downcast_ref::<ApiError>() else {
        eprintln!("❌ {err}");
        return;
    };
    if let Some(data) = api_error.data() {
        debug!("{}", format_api_error(&data.to_string()));
    }
    ErrorHandler::new(Arc::new(TerminalHost)).handle(
        err,
        HandleOptions {
            silent: false,
            redirect_on_auth: true,
        },
    );
}

async fn async_main(args: Args) -> Result<(), Box<dyn Error>> {
    let context = CliContext::open(args.no_persist, args.no_keyring)?;

    match args.command.unwrap_or(Commands::Chat {
        model: None,
        session: None,
    }) {
        Commands::Chat { model, session } => chat::run_chat(&context, model, session).await,
        Commands::Say { prompt, model } => say::run_say(&context, prompt, model).await,
        Commands::Models {
            model_type,
            sub_type,
        } => model_list::list_models(&context, model_type, sub_type).await,
        Commands::User => user_info::show_user(&context).await,
        Commands::Sessions { command } => sessions::run(&context, command),
        Commands::Set { key, value } => settings::run_set(&context, &key, &value),
        Commands::Unset { key } => settings::run_unset(&context, &key),
        Commands::Config => settings::print_config(&context),
    }
}
