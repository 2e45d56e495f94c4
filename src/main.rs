use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tunelink::db::models::DriftedTrack;
use tunelink::server::{FetchResult, HttpServer};

#[derive(Parser)]
#[command(name = "tunelink", version, about = "Reconcile an iTunes library with an OwnTone media server")]
struct Cli {
    /// Path to the SQLite database
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, ValueEnum)]
enum FetchTarget {
    Artists,
    Albums,
    Tracks,
    All,
}

#[derive(Subcommand)]
enum Commands {
    /// Import tracks from an iTunes Library.xml export
    ImportItunes {
        /// Library.xml path (defaults to config itunes_xml)
        path: Option<PathBuf>,
    },

    /// Fetch artists, albums and tracks from the media server
    Fetch {
        #[arg(value_enum, default_value = "all")]
        what: FetchTarget,
    },

    /// Link iTunes tracks to server tracks with matching title and artist
    Link {
        /// Also link unique matches after normalizing case and punctuation
        #[arg(long)]
        normalized: bool,
    },

    /// List server tracks whose tags disagree with their file path
    Drift,

    /// Copy iTunes play counts, ratings and dates into the server's files table
    PushStats {
        /// Media server database (defaults to config server.files_db)
        #[arg(long)]
        files_db: Option<PathBuf>,

        /// Log each change (with -v) and roll back instead of writing
        #[arg(long)]
        dry_run: bool,
    },

    /// Run the review web UI
    Serve {
        /// Address to listen on (defaults to config web.bind)
        #[arg(long)]
        bind: Option<String>,
    },

    /// Show library statistics
    Stats,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load config file (optional, defaults if missing)
    let config = tunelink::config::AppConfig::load();

    // Resolve database path: CLI > config > XDG default
    let db_path = cli.db_path
        .or(config.db_path.clone())
        .unwrap_or_else(tunelink::config::default_db_path);
    log::info!("Database: {}", db_path.display());

    let db = tunelink::db::Database::open(&db_path)
        .context("Failed to open database")?;

    match cli.command {
        Commands::ImportItunes { path } => {
            let Some(path) = path.or(config.itunes_xml.clone()) else {
                anyhow::bail!(
                    "No iTunes library given. Pass a path or set itunes_xml in config."
                );
            };
            let tracks = tunelink::itunes::read_library(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let result = tunelink::itunes::import(&db, &tracks)
                .context("Import failed")?;
            println!(
                "Import complete: {} tracks, {} distinct keys",
                result.tracks, result.keys
            );
        }

        Commands::Fetch { what } => {
            let server = HttpServer::new(&config.server);
            let rate = config.server.rate_limit_ms;

            if matches!(what, FetchTarget::Artists | FetchTarget::All) {
                let r = tunelink::server::fetch_artists(&db, &server)?;
                print_fetch("Artists", &r);
            }
            if matches!(what, FetchTarget::Albums | FetchTarget::All) {
                let r = tunelink::server::fetch_albums(&db, &server, rate)?;
                print_fetch("Albums", &r);
            }
            if matches!(what, FetchTarget::Tracks | FetchTarget::All) {
                let r = tunelink::server::fetch_tracks(&db, &server, rate)?;
                print_fetch("Tracks", &r);
            }
        }

        Commands::Link { normalized } => {
            let result = tunelink::reconcile::auto_link(&db, normalized)
                .context("Linking failed")?;
            if normalized {
                println!(
                    "Link complete: {} exact, {} normalized, {} ambiguous skipped",
                    result.exact, result.normalized, result.ambiguous
                );
            } else {
                println!("Link complete: {} exact matches", result.exact);
            }
        }

        Commands::Drift => {
            let drifted = tunelink::reconcile::find_drift(&db, &config.server.music_root)
                .context("Drift scan failed")?;

            if drifted.is_empty() {
                println!("No tracks differ from their paths.");
                return Ok(());
            }

            println!("{} tracks differ from their paths:", drifted.len());
            println!();
            print_drift_table(&drifted);
        }

        Commands::PushStats { files_db, dry_run } => {
            let Some(files_path) = files_db.or(config.server.files_db.clone()) else {
                anyhow::bail!(
                    "No media server database given. Pass --files-db or set server.files_db in config."
                );
            };
            if dry_run {
                println!("DRY RUN: no changes will be written to {}", files_path.display());
            }

            let stats = tunelink::push::collect_stats(&db)
                .context("Failed to collect play statistics")?;
            let files = rusqlite::Connection::open(&files_path)
                .with_context(|| format!("Failed to open {}", files_path.display()))?;
            let result = tunelink::push::push_stats(&files, &stats, dry_run)
                .context("Push failed")?;
            println!(
                "Push complete: {} tracks updated, {} not found in files table",
                result.updated, result.missing
            );
            if dry_run && result.updated > 0 {
                println!("(dry run: re-run without --dry-run to apply)");
            }
        }

        Commands::Serve { bind } => {
            let bind = bind.unwrap_or_else(|| config.web.bind.clone());
            let state = tunelink::web::AppState::new(db, &config.server.music_root);
            println!("Serving review UI on http://{bind}");

            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("Failed to start async runtime")?;
            runtime.block_on(tunelink::web::serve(state, &bind))?;
        }

        Commands::Stats => {
            let stats = db.stats().context("Failed to get stats")?;
            println!("Library Statistics");
            println!("==================");
            println!("Artists:          {}", stats.artists);
            println!("Albums:           {}", stats.albums);
            println!("Server tracks:    {}", stats.server_tracks);
            println!("iTunes tracks:    {}", stats.itunes_tracks);
            println!("Unlinked iTunes:  {}", stats.unlinked_itunes);
            println!("Fixed tracks:     {}", stats.fixed_tracks);
            println!("Links:            {}", stats.links);
            println!();

            if !stats.links_by_method.is_empty() {
                println!("Links by method:");
                for (method, count) in &stats.links_by_method {
                    println!("  {:<12} {}", method, count);
                }
            }
        }
    }

    Ok(())
}

fn print_fetch(label: &str, r: &FetchResult) {
    println!(
        "{label}: {} stored from {} requests, {} errors",
        r.stored, r.requests, r.errors
    );
}

/// Truncate to `width` chars, marking the cut with "...".
fn clip(s: &str, width: usize) -> String {
    if s.chars().count() > width {
        let head: String = s.chars().take(width.saturating_sub(3)).collect();
        format!("{head}...")
    } else {
        s.to_string()
    }
}

/// Print current tags above the values parsed from each path.
fn print_drift_table(tracks: &[DriftedTrack]) {
    println!("{:>6}  {:<30} {:<25} {:<25}", "Id", "Title", "Artist", "Album");
    println!("{}", "-".repeat(90));

    for t in tracks {
        println!(
            "{:>6}  {:<30} {:<25} {:<25}",
            t.id,
            clip(t.title.as_deref().unwrap_or("-"), 30),
            clip(t.artist.as_deref().unwrap_or("-"), 25),
            clip(t.album.as_deref().unwrap_or("-"), 25),
        );
        println!(
            "{:>6}  {:<30} {:<25} {:<25}",
            "path",
            clip(&t.parsed_title, 30),
            clip(&t.parsed_artist, 25),
            clip(t.parsed_album.as_deref().unwrap_or("-"), 25),
        );
    }
}
