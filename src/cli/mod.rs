//! Command-line interface.

pub mod doctor;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use crate::config::XTREAMLY_API_KEY;
use crate::settings::Settings;

pub use doctor::run_doctor_command;

#[derive(Parser, Debug)]
#[command(name = "looper")]
#[command(about = "Talk to the Xtreamly loop trading and volatility agent")]
#[command(version)]
pub struct Cli {
    /// Path to config.toml (default: ~/.looper/config.toml)
    #[arg(long, global = true, env = "LOOPER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Path to a character JSON file
    #[arg(long, global = true, env = "LOOPER_CHARACTER")]
    pub character: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true, env = "LOOPER_LOG_JSON")]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Send one message and print the reply
    Run {
        /// Message to send
        #[arg(short, long)]
        message: String,
    },
    /// Interactive session (the default)
    Repl,
    /// Check configuration and service reachability
    Doctor {
        /// Exit non-zero when any check fails
        #[arg(long)]
        strict: bool,
    },
    /// Write a default config file and store API keys
    Init {
        #[arg(long)]
        xtreamly_api_key: Option<String>,

        #[arg(long)]
        openai_api_key: Option<String>,
    },
}

impl Cli {
    /// The subcommand to run, defaulting to the REPL.
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Repl)
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config.as_deref()
    }

    pub fn character_path(&self) -> Option<&Path> {
        self.character.as_deref()
    }
}

/// `looper init`: create the config file if missing and save the given keys.
pub fn run_init_command(
    config_path: Option<&Path>,
    xtreamly_api_key: Option<&str>,
    openai_api_key: Option<&str>,
) -> anyhow::Result<()> {
    let path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(Settings::default_toml_path);

    if path.exists() {
        println!("Config already exists at {}", path.display());
    } else {
        Settings::default()
            .save_toml(&path)
            .map_err(anyhow::Error::msg)?;
        println!("Wrote {}", path.display());
    }

    let vars = init_env_vars(xtreamly_api_key, openai_api_key);
    if vars.is_empty() {
        println!("No keys given; set XTREAMLY_API_KEY and OPENAI_API_KEY before chatting.");
        return Ok(());
    }

    crate::bootstrap::save_bootstrap_env(&vars)?;
    println!(
        "Stored {} in {}",
        vars.iter().map(|(k, _)| *k).collect::<Vec<_>>().join(", "),
        crate::bootstrap::looper_env_path().display()
    );
    Ok(())
}

fn init_env_vars<'a>(
    xtreamly_api_key: Option<&'a str>,
    openai_api_key: Option<&'a str>,
) -> Vec<(&'static str, &'a str)> {
    let mut vars = Vec::new();
    if let Some(key) = xtreamly_api_key.map(str::trim).filter(|k| !k.is_empty()) {
        vars.push((XTREAMLY_API_KEY, key));
    }
    if let Some(key) = openai_api_key.map(str::trim).filter(|k| !k.is_empty()) {
        vars.push(("OPENAI_API_KEY", key));
    }
    vars
}
