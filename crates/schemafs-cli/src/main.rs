//! schemafs operator CLI.
//!
//! Inspects and seeds the store that backs the engine's schema files.
//! Paths are given the way the engine sees them, under the mount prefix.
//!
//! Usage:
//!   schemafs --db schema.db create-db shop
//!   schemafs --db schema.db put /data/shop/orders.frm --file orders.frm
//!   schemafs --db schema.db ls /data/shop
//!   RUST_LOG=schemafs_kernel=debug schemafs --config schemafs.ron cat /data/shop/db.opt

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt};

use schemafs_kernel::{FileType, Namespace, SchemaFsConfig, StoreBackend, VfsOps};

/// Default contents written to a new database's `db.opt`.
const DEFAULT_DB_OPTIONS: &str = "default-character-set=utf8\ndefault-collation=utf8_general_ci\n";

/// Log filter used when `RUST_LOG` is unset.
const DEFAULT_LOG_FILTER: &str = "info";

/// Inspect and seed a schemafs store.
#[derive(Parser, Debug)]
#[command(name = "schemafs")]
#[command(about = "Inspect and seed a schemafs store")]
struct Args {
    /// RON config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// SQLite store file (overrides the config's store)
    #[arg(long)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List databases, or the tables of one database
    Ls {
        #[arg(default_value = "/data/")]
        path: String,
    },
    /// Print a stored file
    Cat { path: String },
    /// Store a file, replacing any previous contents
    Put {
        path: String,
        /// Read contents from this file instead of stdin
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Create a database with default options
    CreateDb { name: String },
    /// Remove a stored file
    Rm { path: String },
    /// Rename a stored file
    Mv { from: String, to: String },
    /// Show size and type
    Stat { path: String },
}

/// Translate an engine path into a path relative to the data directory.
fn relative(namespace: &Namespace, path: &str) -> Result<PathBuf> {
    let normalized = namespace.normalize(path);
    if normalized == "." {
        return Ok(PathBuf::new());
    }
    match normalized.strip_prefix("./") {
        Some(rest) => Ok(PathBuf::from(rest)),
        None => bail!("{path} is outside {}", namespace.mount_prefix()),
    }
}

async fn put(vfs: &StoreBackend, path: &Path, data: &[u8]) -> Result<()> {
    // No truncate, so replace the entry wholesale
    if vfs.exists(path).await {
        vfs.unlink(path).await?;
    }
    vfs.create(path).await?;
    vfs.write(path, 0, data).await?;
    Ok(())
}

async fn run(vfs: &StoreBackend, command: Command, out: &mut impl Write) -> Result<()> {
    let namespace = vfs.fs().namespace().clone();

    match command {
        Command::Ls { path } => {
            let dir = relative(&namespace, &path)?;
            for entry in vfs.readdir(&dir).await? {
                match entry.kind {
                    FileType::Directory => writeln!(out, "{}/", entry.name)?,
                    FileType::File => writeln!(out, "{}", entry.name)?,
                }
            }
        }
        Command::Cat { path } => {
            let data = vfs.read_all(&relative(&namespace, &path)?).await?;
            out.write_all(&data)?;
        }
        Command::Put { path, file } => {
            let data = match file {
                Some(file) => {
                    std::fs::read(&file).with_context(|| format!("reading {}", file.display()))?
                }
                None => {
                    let mut data = Vec::new();
                    std::io::stdin().read_to_end(&mut data)?;
                    data
                }
            };
            put(vfs, &relative(&namespace, &path)?, &data).await?;
            tracing::info!(%path, len = data.len(), "stored");
        }
        Command::CreateDb { name } => {
            let marker = PathBuf::from(&name).join("db.opt");
            if vfs.exists(&marker).await {
                bail!("database {name} already exists");
            }
            put(vfs, &marker, DEFAULT_DB_OPTIONS.as_bytes())
                .await
                .with_context(|| format!("creating database {name}"))?;
            tracing::info!(%name, "created database");
        }
        Command::Rm { path } => {
            vfs.unlink(&relative(&namespace, &path)?).await?;
        }
        Command::Mv { from, to } => {
            vfs.rename(&relative(&namespace, &from)?, &relative(&namespace, &to)?)
                .await?;
        }
        Command::Stat { path } => {
            let attr = vfs.getattr(&relative(&namespace, &path)?).await?;
            let kind = if attr.is_dir() { "directory" } else { "file" };
            writeln!(out, "{kind} {} bytes {:o}", attr.size, attr.perm)?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries file contents, so logs go to stderr
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => SchemaFsConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => SchemaFsConfig::default(),
    };
    if let Some(db) = args.db {
        config = config.with_sqlite(db);
    }

    let (fs, _handles) = config.build()?;
    let vfs = StoreBackend::new(fs);

    let mut stdout = std::io::stdout().lock();
    run(&vfs, args.command, &mut stdout).await?;
    stdout.flush()?;
    Ok(())
}
