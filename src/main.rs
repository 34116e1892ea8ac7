// TrackHive - command-line front end for the library core
// Every subcommand maps onto one Library operation

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;
use trackhive::{
    library::{SortField, SortOrder},
    playlist::{MatchType, PlaylistPatch, Rule, RuleOperator},
    Config, ExportFormat, Library, ScanOptions, ScanProgress, Track, TrackId,
};

#[derive(Parser)]
#[command(name = "trackhive")]
#[command(about = "Catalog your local music into a searchable library with smart playlists")]
struct Args {
    /// Enable developer logging (stderr + debug output)
    #[arg(long, global = true)]
    dev: bool,

    /// Use this config file instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan directories (default: the configured library paths)
    Scan {
        paths: Vec<PathBuf>,
        /// Re-read tags even for files that haven't changed
        #[arg(long)]
        force: bool,
    },
    /// Search titles, artists, albums and genres
    Search {
        term: String,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// List every track sorted by a field
    List {
        #[arg(long, default_value = "title")]
        sort: SortField,
        #[arg(long)]
        desc: bool,
    },
    Artists,
    Albums,
    Genres,
    Stats,
    /// Remove a track and every reference to it
    Remove { id: String },
    /// Drop tracks whose files no longer exist
    Prune,
    #[command(subcommand)]
    Playlist(PlaylistCommand),
    #[command(subcommand)]
    Smart(SmartCommand),
    #[command(subcommand)]
    Favorite(FavoriteCommand),
    /// Record a play of a track
    Played { id: String },
    /// Recently played tracks (or recently added with --added)
    Recent {
        #[arg(long)]
        added: bool,
    },
}

#[derive(Subcommand)]
enum PlaylistCommand {
    Create {
        name: String,
        #[arg(long)]
        description: Option<String>,
        tracks: Vec<String>,
    },
    List,
    Show { id: String },
    Add { id: String, track: String },
    Remove { id: String, track: String },
    Rename { id: String, name: String },
    Delete { id: String },
    Export {
        id: String,
        #[arg(long, default_value = "m3u")]
        format: String,
    },
}

#[derive(Subcommand)]
enum SmartCommand {
    /// Rules are `field:operator:value`, e.g. `year:greaterThan:1990`
    Create {
        name: String,
        #[arg(long = "rule", required = true)]
        rules: Vec<String>,
        /// Match any rule instead of all of them
        #[arg(long)]
        any: bool,
    },
    List,
    Tracks { id: String },
    Delete { id: String },
}

#[derive(Subcommand)]
enum FavoriteCommand {
    Add { id: String },
    Remove { id: String },
    List,
}

fn init_logging(dev: bool, log_dir: &Path) -> Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("creating log directory {}", log_dir.display()))?;

    // Daily rotating file appender
    let file_appender = tracing_appender::rolling::daily(log_dir, "trackhive.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    // Base filter: info level for general logs, debug for trackhive
    let base_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,trackhive=debug"));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(file_writer)
        .with_target(true)
        .with_level(true)
        .with_ansi(false);
    let stderr_layer = dev.then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(base_filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init()?;

    if dev {
        eprintln!("🔧 Dev mode: debug output enabled to stderr + file");
    }

    Ok(guard)
}

fn parse_rule(raw: &str) -> Result<Rule> {
    let mut parts = raw.splitn(3, ':');
    let (Some(field), Some(operator), Some(value)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(anyhow!("rule '{}' is not field:operator:value", raw));
    };
    let operator: RuleOperator = serde_json::from_value(Value::String(operator.to_string()))
        .with_context(|| format!("unknown operator '{}'", operator))?;
    // Numbers and {"min":..,"max":..} objects come through as JSON, anything else is text
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok(Rule::new(field, operator, value))
}

fn print_tracks(tracks: &[Track]) {
    for track in tracks {
        println!(
            "{}  {} - {} [{}] ({})",
            track.id,
            track.artist,
            track.title,
            track.album,
            track.duration_string()
        );
    }
    println!("{} track(s)", tracks.len());
}

async fn run_scan(library: Arc<Library>, paths: Vec<PathBuf>, force: bool) -> Result<()> {
    let (progress_tx, mut progress_rx) = mpsc::channel(128);
    let options = ScanOptions {
        force_update: force,
        ..Default::default()
    };

    // Scan in the background, print progress as it arrives
    let scanner_task = tokio::spawn(async move {
        if paths.is_empty() {
            library.scan_library(options, Some(progress_tx)).await
        } else {
            library.scan(&paths, options, Some(progress_tx)).await
        }
    });

    while let Some(progress) = progress_rx.recv().await {
        match progress {
            ScanProgress::Started { roots } => println!("🔍 Starting scan of {} directories", roots.len()),
            ScanProgress::Counted { total_files } => println!("   {} audio files found", total_files),
            ScanProgress::Processing { current, total, .. } => {
                if current % 50 == 0 {
                    println!("   📀 {}/{} processed...", current, total);
                }
            }
            ScanProgress::Error { path, error } => eprintln!("   ⚠️  Error scanning {:?}: {}", path, error),
            ScanProgress::Completed { stats } => println!(
                "✅ Scan complete: {} added, {} updated, {} skipped, {} errors",
                stats.added_tracks, stats.updated_tracks, stats.skipped_files, stats.errors
            ),
            ScanProgress::Cancelled { stats } => println!("Scan cancelled after {} files", stats.processed_files),
            _ => {}
        }
    }

    let stats = scanner_task.await??;
    info!("Scan stats: {:?}", stats);
    Ok(())
}

async fn run(args: Args, config: Config) -> Result<()> {
    let library = Arc::new(Library::from_config(&config).await?);

    match args.command {
        Command::Scan { paths, force } => run_scan(library, paths, force).await?,
        Command::Search { term, limit } => {
            let limit = limit.unwrap_or(config.search.max_results_per_category);
            let results = library.search_library_with(&term, limit).await;
            for artist in &results.artists {
                println!("artist  {} ({} tracks)", artist.name, artist.track_count);
            }
            for album in &results.albums {
                println!("album   {} - {} ({} tracks)", album.artist, album.title, album.track_count);
            }
            for genre in &results.genres {
                println!("genre   {} ({} tracks)", genre.name, genre.track_count);
            }
            print_tracks(&results.tracks);
        }
        Command::List { sort, desc } => {
            let order = if desc { SortOrder::Descending } else { SortOrder::Ascending };
            print_tracks(&library.list_tracks(sort, order).await);
        }
        Command::Artists => {
            for artist in library.artists().await {
                println!("{} ({} albums, {} tracks)", artist.name, artist.album_count, artist.track_count);
            }
        }
        Command::Albums => {
            for album in library.albums().await {
                let year = album.year.map(|y| format!(" ({})", y)).unwrap_or_default();
                println!("{} - {}{} [{} tracks]", album.artist, album.title, year, album.track_count);
            }
        }
        Command::Genres => {
            for genre in library.genres().await {
                println!("{} ({} tracks)", genre.name, genre.track_count);
            }
        }
        Command::Stats => println!("{}", serde_json::to_string_pretty(&library.library_stats().await)?),
        Command::Remove { id } => {
            let track = library.remove_track(&TrackId::from(id)).await?;
            println!("Removed {} - {}", track.artist, track.title);
        }
        Command::Prune => {
            let removed = library.prune_missing_files().await?;
            println!("Pruned {} missing file(s)", removed.len());
        }
        Command::Playlist(command) => run_playlist(&library, command).await?,
        Command::Smart(command) => run_smart(&library, command).await?,
        Command::Favorite(FavoriteCommand::Add { id }) => {
            library.add_to_favorites(&TrackId::from(id)).await?;
        }
        Command::Favorite(FavoriteCommand::Remove { id }) => {
            library.remove_from_favorites(&TrackId::from(id)).await?;
        }
        Command::Favorite(FavoriteCommand::List) => print_tracks(&library.get_favorites().await),
        Command::Played { id } => library.add_to_recently_played(&TrackId::from(id)).await?,
        Command::Recent { added } => {
            let tracks = if added {
                library.get_recently_added().await
            } else {
                library.get_recently_played().await
            };
            print_tracks(&tracks);
        }
    }

    Ok(())
}

async fn run_playlist(library: &Library, command: PlaylistCommand) -> Result<()> {
    match command {
        PlaylistCommand::Create { name, description, tracks } => {
            let ids = tracks.into_iter().map(TrackId::from).collect();
            let playlist = library.create_playlist(&name, description, ids).await?;
            println!("Created playlist {} ({})", playlist.name, playlist.id);
        }
        PlaylistCommand::List => {
            for playlist in library.list_playlists().await {
                println!("{}  {} ({} tracks)", playlist.id, playlist.name, playlist.track_ids.len());
            }
        }
        PlaylistCommand::Show { id } => print_tracks(&library.playlist_tracks(&id).await?),
        PlaylistCommand::Add { id, track } => {
            if !library.add_track_to_playlist(&id, &TrackId::from(track)).await? {
                println!("Track already in playlist");
            }
        }
        PlaylistCommand::Remove { id, track } => {
            let removed = library.remove_track_from_playlist(&id, &TrackId::from(track)).await?;
            println!("Removed {} entr{}", removed, if removed == 1 { "y" } else { "ies" });
        }
        PlaylistCommand::Rename { id, name } => {
            let patch = PlaylistPatch {
                name: Some(name),
                ..Default::default()
            };
            library.update_playlist(&id, patch).await?;
        }
        PlaylistCommand::Delete { id } => {
            let playlist = library.delete_playlist(&id).await?;
            println!("Deleted playlist {}", playlist.name);
        }
        PlaylistCommand::Export { id, format } => {
            let format: ExportFormat = format.parse()?;
            let path = library.export_playlist(&id, format).await?;
            println!("Exported to {}", path.display());
        }
    }
    Ok(())
}

async fn run_smart(library: &Library, command: SmartCommand) -> Result<()> {
    match command {
        SmartCommand::Create { name, rules, any } => {
            let rules = rules.iter().map(|r| parse_rule(r)).collect::<Result<Vec<_>>>()?;
            let match_type = if any { MatchType::Any } else { MatchType::All };
            let preview = library.preview_rules(&rules, match_type).await;
            let playlist = library.create_smart_playlist(&name, None, rules, match_type).await?;
            println!("Created smart playlist {} ({}), {} tracks match", playlist.name, playlist.id, preview.len());
        }
        SmartCommand::List => {
            for playlist in library.list_smart_playlists().await {
                println!("{}  {} ({} rules)", playlist.id, playlist.name, playlist.rules.len());
            }
        }
        SmartCommand::Tracks { id } => print_tracks(&library.smart_playlist_tracks(&id).await?),
        SmartCommand::Delete { id } => {
            let playlist = library.delete_smart_playlist(&id).await?;
            println!("Deleted smart playlist {}", playlist.name);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load config - written with defaults on first run
    let config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    let _guard = init_logging(args.dev, &config.logging.log_dir)?;
    info!("TrackHive starting up");

    if let Err(e) = run(args, config).await {
        error!("Command failed: {:#}", e);
        return Err(e);
    }
    Ok(())
}
