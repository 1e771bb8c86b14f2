use clap::{Parser, Subcommand};
use derive_more::{Display, Error};
use exn::ResultExt;
use futures::{StreamExt, pin_mut};
use quire_catalog::models::{BookId, FileId, Library};
use quire_catalog::{Database, Repository};
use quire_config::{Config, LogConfig, LogFormat};
use quire_library::{Mounts, ScanEvent, ScanOptions, Scanner};
use quire_metadata::ParserRegistry;
use quire_storage::backend::LocalBackend;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

type Result<T> = std::result::Result<T, exn::Exn<ErrorKind>>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
enum ErrorKind {
    #[display("could not load configuration")]
    Config,
    #[display("could not open the catalog")]
    Catalog,
    #[display("could not open library root {}", _0.display())]
    Storage(#[error(not(source))] PathBuf),
    #[display("scan failed")]
    Scan,
}

#[derive(Parser)]
#[command(name = "quire", version, about = "Catalog a personal library of books, comics and audiobooks")]
struct Cli {
    /// Configuration file; defaults to `quire.{toml,yaml,json}` in the platform config directory.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Walk every configured library, then organize the ones that ask for it
    Scan {
        /// Let file metadata overwrite values edited by hand or read from sidecars
        #[arg(long)]
        force: bool,
    },
    /// Resync one cataloged file
    ResyncFile {
        id: FileId,
        #[arg(long)]
        force: bool,
    },
    /// Resync every file of one cataloged book
    ResyncBook {
        id: BookId,
        #[arg(long)]
        force: bool,
    },
}

fn init_logging(config: &LogConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match config.format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr)).init(),
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)).init(),
    }
}

async fn open(config: &Config) -> Result<(Scanner, Vec<Library>)> {
    let db = Database::connect(&config.database).await.or_raise(|| ErrorKind::Catalog)?;
    let repo = Repository::from(&db);
    let mut libraries = Vec::with_capacity(config.libraries.len());
    let mut mounts = Mounts::new();
    for library in &config.libraries {
        let synced = repo
            .sync_library(&library.name, &library.paths, library.organize_file_structure)
            .await
            .or_raise(|| ErrorKind::Catalog)?;
        for root in &synced.paths {
            let backend = LocalBackend::new(&synced.name, root).or_raise(|| ErrorKind::Storage(root.clone()))?;
            mounts.mount(synced.id, root, Arc::new(backend));
        }
        debug!(library = %synced.name, id = synced.id, roots = synced.paths.len(), "library ready");
        libraries.push(synced);
    }
    let scanner = Scanner::new(repo, mounts, Arc::new(ParserRegistry::filename_only()));
    Ok((scanner, libraries))
}

async fn scan(scanner: &Scanner, libraries: &[Library], concurrency: usize, force: bool) -> Result<()> {
    let events = scanner.scan_libraries(libraries, concurrency, force);
    pin_mut!(events);
    let mut failed = false;
    while let Some(event) = events.next().await {
        match event {
            Ok(ScanEvent::Started) => info!(libraries = libraries.len(), "scan started"),
            Ok(ScanEvent::DiscoveryComplete { library_id, files }) => debug!(library_id, files, "library listed"),
            Ok(ScanEvent::Scanned { path, outcome }) => debug!(path = %path.display(), ?outcome, "scanned"),
            Ok(ScanEvent::Organized { book_id, action }) => debug!(book_id, ?action, "organized"),
            Ok(ScanEvent::Complete(summary)) => {
                info!(
                    created_books = summary.created_books,
                    created_files = summary.created_files,
                    updated = summary.updated,
                    unchanged = summary.unchanged,
                    deleted_files = summary.deleted_files,
                    deleted_books = summary.deleted_books,
                    organized = summary.organized,
                    failed = summary.failed,
                    "scan finished",
                );
                failed = summary.failed > 0;
            },
            Err(err) => warn!(error = ?err, "scan error"),
        }
    }
    if failed {
        warn!("some files could not be scanned; see the errors above");
    }
    for library in libraries {
        let counts = scanner.repository().counts(library.id).await.or_raise(|| ErrorKind::Catalog)?;
        info!(
            library = %library.name,
            books = counts.books,
            files = counts.files,
            persons = counts.persons,
            series = counts.series,
            "library totals",
        );
    }
    Ok(())
}

async fn run(cli: Cli, config: Config) -> Result<()> {
    let (scanner, libraries) = open(&config).await?;
    match cli.command {
        Command::Scan { force } => {
            scan(&scanner, &libraries, config.scan.concurrency, force || config.scan.force_refresh).await
        },
        Command::ResyncFile { id, force } => {
            let outcome = scanner
                .scan(&ScanOptions::file(id).force_refresh(force))
                .await
                .or_raise(|| ErrorKind::Scan)?;
            info!(?outcome, "file resynced");
            Ok(())
        },
        Command::ResyncBook { id, force } => {
            let outcome = scanner
                .scan(&ScanOptions::book(id).force_refresh(force))
                .await
                .or_raise(|| ErrorKind::Scan)?;
            info!(?outcome, "book resynced");
            Ok(())
        },
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = match Config::load(cli.config.as_deref()).or_raise(|| ErrorKind::Config) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err:?}");
            return ExitCode::FAILURE;
        },
    };
    init_logging(&config.log);
    match run(cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = ?err, "quire failed");
            ExitCode::FAILURE
        },
    }
}
