//! Command-line interface for actionform.
//!
//! Provides commands for submitting values to a remote action, managing
//! persisted drafts, and showing the resolved configuration.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::{json, Value};

use crate::adapters::{Encoding, RemoteAction};
use crate::config;
use crate::core::ActionForm;
use crate::domain::ValueBundle;
use crate::persist::{FileStore, Persistence};

/// actionform - Form submission orchestrator
#[derive(Parser, Debug)]
#[command(name = "actionform")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Submit values to a remote action and print the outcome
    Submit {
        /// Endpoint URL (defaults to submit.endpoint from config)
        #[arg(short, long)]
        url: Option<String>,

        /// Request body encoding
        #[arg(short, long, value_enum)]
        encoding: Option<EncodingArg>,

        /// Field assignment (repeatable): name=value, value parsed as JSON when possible
        #[arg(short, long = "set", value_name = "NAME=VALUE")]
        set: Vec<String>,

        /// Restore and clear the draft stored under this key
        #[arg(long)]
        persist_key: Option<String>,

        /// Bearer token sent with the request
        #[arg(long, env = "ACTIONFORM_TOKEN", hide_env_values = true)]
        token: Option<String>,
    },

    /// Manage persisted drafts
    Draft {
        #[command(subcommand)]
        command: DraftCommands,
    },

    /// Show resolved configuration (debug)
    Config,
}

#[derive(Subcommand, Debug)]
pub enum DraftCommands {
    /// Print the draft stored under a key
    Show {
        key: String,
    },

    /// Merge field assignments into a draft
    Save {
        key: String,

        /// Field assignment (repeatable): name=value
        #[arg(short, long = "set", value_name = "NAME=VALUE")]
        set: Vec<String>,
    },

    /// Remove a draft
    Clear {
        key: String,
    },
}

/// Encoding for CLI (maps to Encoding)
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum EncodingArg {
    /// JSON body
    Json,

    /// URL-encoded form pairs
    Form,
}

impl From<EncodingArg> for Encoding {
    fn from(e: EncodingArg) -> Self {
        match e {
            EncodingArg::Json => Encoding::Json,
            EncodingArg::Form => Encoding::Form,
        }
    }
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Submit {
                url,
                encoding,
                set,
                persist_key,
                token,
            } => submit(url, encoding, set, persist_key, token).await,
            Commands::Draft { command } => execute_draft(command),
            Commands::Config => show_config(),
        }
    }
}

/// Parse `name=value`; the value is JSON when it parses, else a string
fn parse_assignment(raw: &str) -> Result<(String, Value)> {
    let (name, value) = raw
        .split_once('=')
        .with_context(|| format!("Invalid assignment '{}' (expected NAME=VALUE)", raw))?;

    let name = name.trim();
    if name.is_empty() {
        anyhow::bail!("Invalid assignment '{}': empty field name", raw);
    }

    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((name.to_string(), value))
}

fn parse_assignments(raw: &[String]) -> Result<ValueBundle> {
    let mut values = ValueBundle::new();
    for assignment in raw {
        let (name, value) = parse_assignment(assignment)?;
        values.insert(name, value);
    }
    Ok(values)
}

/// Run one attempt through the full pipeline against a remote action
async fn submit(
    url: Option<String>,
    encoding: Option<EncodingArg>,
    set: Vec<String>,
    persist_key: Option<String>,
    token: Option<String>,
) -> Result<()> {
    let cfg = config::config()?;

    let mut action = match url {
        Some(url) => RemoteAction::new(url)
            .with_encoding(cfg.submit.encoding)
            .with_timeout(Duration::from_secs(cfg.submit.timeout_seconds)),
        None => RemoteAction::from_config()?,
    };
    if let Some(encoding) = encoding {
        action = action.with_encoding(encoding.into());
    }
    if let Some(token) = token {
        action = action.with_bearer_token(token);
    }

    let endpoint = action.endpoint().to_string();
    let mut builder = ActionForm::builder(action)
        .default_values(parse_assignments(&set)?)
        .persist_debounce(cfg.persist_debounce());

    if let Some(ref key) = persist_key {
        let store = FileStore::from_config()?;
        builder = builder.persist_key(key.clone()).store(Arc::new(store));
    }

    let form = builder.build();

    // Assignments given on the command line win over a restored draft
    for assignment in &set {
        let (name, value) = parse_assignment(assignment)?;
        form.control().set_value(&name, value);
    }

    eprintln!("Submitting to {}", endpoint);
    let outcome = form.execute_submit(form.values()).await;
    let success = outcome.is_success();

    let report = json!({
        "result": outcome,
        "form_state": form.form_state(),
        "history": form.history(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    form.teardown();

    if !success {
        std::process::exit(1);
    }
    Ok(())
}

/// Execute draft subcommands
fn execute_draft(command: DraftCommands) -> Result<()> {
    let store = FileStore::from_config()?;
    let persistence = Persistence::new(Arc::new(store.clone()));

    match command {
        DraftCommands::Show { key } => match persistence.load(&key) {
            Some(values) => {
                println!("{}", serde_json::to_string_pretty(&values)?);
            }
            None => {
                eprintln!("No draft stored under '{}'", key);
            }
        },
        DraftCommands::Save { key, set } => {
            let mut values = persistence.load(&key).unwrap_or_default();
            for (name, value) in parse_assignments(&set)? {
                values.insert(name, value);
            }
            persistence
                .save(&key, &values)
                .with_context(|| format!("Failed to save draft '{}'", key))?;
            eprintln!("Saved draft '{}' -> {}", key, store.path_for(&key).display());
        }
        DraftCommands::Clear { key } => {
            persistence
                .clear(&key)
                .with_context(|| format!("Failed to clear draft '{}'", key))?;
            eprintln!("Cleared draft '{}'", key);
        }
    }

    Ok(())
}

/// Show resolved configuration
fn show_config() -> Result<()> {
    let cfg = config::config()?;

    println!("ActionForm Configuration");
    println!();
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    print!("{}", serde_yaml::to_string(cfg).context("Failed to render configuration")?);

    Ok(())
}
