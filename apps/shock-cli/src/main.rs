//! Command-line client for a Shock server.

mod commands;
mod config;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use shock_client::{AclType, NodeId};
use tracing_subscriber::EnvFilter;

/// Upload, download and share files on a Shock server.
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (default: ~/.config/shock/cli.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Server URL, overriding the configuration file
    #[arg(long, global = true)]
    pub url: Option<String>,

    /// Token, overriding the configuration file
    #[arg(long, global = true, env = "SHOCK_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// User the token belongs to
    #[arg(long, global = true)]
    pub user: Option<String>,

    /// Transfer chunk size in bytes
    #[arg(long, global = true)]
    pub chunk_size: Option<usize>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show the server version
    Version,

    /// Upload a file (`-` reads stdin) and print the new node
    Upload {
        path: PathBuf,
        /// File format, e.g. JSON or fasta
        #[arg(long)]
        format: Option<String>,
        /// Node attributes as a JSON object
        #[arg(long)]
        attributes: Option<String>,
        /// Filename to declare (default: the file's own name)
        #[arg(long)]
        name: Option<String>,
    },

    /// Download a node's file (`-` writes to stdout)
    Download { id: NodeId, out: PathBuf },

    /// Print a node
    Info { id: NodeId },

    /// Delete a node
    Delete { id: NodeId },

    /// Print a node's ACLs
    Acl {
        id: NodeId,
        /// Only this ACL: read, write, owner, delete or all
        #[arg(long = "type")]
        acl: Option<AclType>,
    },

    /// Add users to an ACL
    Share {
        id: NodeId,
        acl: AclType,
        #[arg(required = true)]
        users: Vec<String>,
    },

    /// Remove users from an ACL
    Unshare {
        id: NodeId,
        acl: AclType,
        #[arg(required = true)]
        users: Vec<String>,
    },

    /// Make a node readable by anyone
    Public {
        id: NodeId,
        /// Take public read access away instead
        #[arg(long)]
        revoke: bool,
    },
}

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so downloads can stream to stdout.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = config::Config::load(cli.config.as_deref())?;
    if let Some(url) = &cli.url {
        config.url = url.clone();
    }
    if let Some(token) = &cli.token {
        config.token = Some(token.clone());
    }
    if let Some(user) = &cli.user {
        config.user = Some(user.clone());
    }
    if let Some(chunk_size) = cli.chunk_size {
        config.chunk_size = chunk_size;
    }

    commands::run(&config, cli.command)
}
