use std::{error::Error, fs, io, path::PathBuf, process};

use clap::{command, Parser, Subcommand, ValueHint};
use log::{debug, error, info, LevelFilter};
use serde::Serialize;
use serde_json::json;
use veil::Redact;

use deezl::{
    client::Client,
    config::{Config, Secrets},
    metadata,
    protocol::{
        gateway::{page::Song, SearchKind},
        image::{ImageFormat, Size},
        media::Format,
    },
    tags::{self, ContainerWriter},
};

/// Profile to display when not built in release mode.
#[cfg(debug_assertions)]
const BUILD_PROFILE: &str = "debug";
/// Profile to display when not built release mode.
#[cfg(not(debug_assertions))]
const BUILD_PROFILE: &str = "release";

/// Group name for mutually exclusive logging options.
const ARGS_GROUP_LOGGING: &str = "logging";

/// Command line arguments as parsed by `clap`.
#[derive(Clone, Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Secrets file
    ///
    /// Ensure that this file is kept secure and not shared publicly, as it
    /// contains your account password hash and the track decryption secret.
    #[arg(short, long, value_name = "FILE", value_hint = ValueHint::FilePath, default_value_t = String::from("secrets.toml"))]
    secrets_file: String,

    #[command(flatten)]
    overrides: Overrides,

    /// Print the raw upstream records next to the normalized ones.
    #[arg(long, default_value_t = false, global = true)]
    full: bool,

    /// Suppresses all output except warnings and errors.
    #[arg(short, long, default_value_t = false, group = ARGS_GROUP_LOGGING)]
    quiet: bool,

    /// Enable verbose logging
    ///
    /// Specify twice for trace logging.
    #[arg(short, long, action = clap::ArgAction::Count, group = ARGS_GROUP_LOGGING)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

/// Secrets taken from the environment instead of the secrets file.
#[derive(Clone, clap::Args, Redact)]
struct Overrides {
    /// Account email
    #[arg(long, env = "DEEZL_EMAIL", hide_env_values = true)]
    email: Option<String>,

    /// MD5 of the account password, as 32 hex characters
    #[redact]
    #[arg(long, env = "DEEZL_PASSWORD_MD5", hide_env_values = true)]
    password_md5: Option<String>,

    /// Application id used for login
    #[arg(long, env = "DEEZL_CLIENT_ID", hide_env_values = true)]
    client_id: Option<String>,

    /// Application secret used for login
    #[redact]
    #[arg(long, env = "DEEZL_CLIENT_SECRET", hide_env_values = true)]
    client_secret: Option<String>,

    /// Track decryption secret, 16 bytes
    #[redact]
    #[arg(long, env = "DEEZL_BF_SECRET", hide_env_values = true)]
    bf_secret: Option<String>,
}

#[derive(Clone, Debug, Subcommand)]
enum Command {
    /// Show a track
    Track { id: u64 },

    /// Show an album
    Album { id: u64 },

    /// Show a playlist
    Playlist { id: u64 },

    /// Search the catalog
    Search {
        query: String,

        /// Kind of records to search for: track, album or playlist
        #[arg(long, default_value_t = SearchKind::Track)]
        kind: SearchKind,

        /// Offset of the first result
        #[arg(long, default_value_t = 0)]
        index: u64,

        /// Number of results
        #[arg(long, default_value_t = 10)]
        limit: u64,
    },

    /// Download a decrypted, tagged track and print its tags
    Download {
        id: u64,

        /// Audio format: FLAC, MP3_64, MP3_128, MP3_320 or MP3_MISC
        #[arg(long, default_value_t = Format::MP3_128)]
        format: Format,

        /// Cover size as WIDTHxHEIGHT; no cover is downloaded without it
        #[arg(long)]
        cover_size: Option<Size>,

        /// Cover image format: jpg or png
        #[arg(long, default_value_t = ImageFormat::Jpg)]
        cover_format: ImageFormat,

        /// Output file
        ///
        /// [default: <id>.<extension>]
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        output: Option<PathBuf>,
    },
}

/// Initializes the logger facade.
///
/// The logging level is determined as follows, in order of precedence from
/// highest to lowest:
/// 1. Command line arguments
/// 2. `RUST_LOG` environment variable
/// 3. Hard coded default
///
/// # Panics
///
/// Panics when a logger facade is already initialized.
fn init_logger(config: &Args) {
    let mut logger = env_logger::Builder::from_env(
        // Note: if you change the default logging level here, then you should
        // probably also change the verbosity levels below.
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
    );

    if config.quiet || config.verbose > 0 {
        let level = match config.verbose {
            // Quiet and verbose are mutually exclusive.
            0 => LevelFilter::Warn,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        };

        // Filter log messages of external crates.
        logger.filter_module("deezl", level);
    }

    logger.init();
}

/// Reads the secrets file, with environment overrides taking precedence.
///
/// The file is not needed when every secret is overridden.
fn load_secrets(path: &str, overrides: Overrides) -> deezl::error::Result<Secrets> {
    if let Overrides {
        email: Some(email),
        password_md5: Some(password_md5),
        client_id: Some(client_id),
        client_secret: Some(client_secret),
        bf_secret: Some(bf_secret),
    } = overrides
    {
        return Ok(Secrets {
            email,
            password_md5,
            client_id,
            client_secret,
            bf_secret,
        });
    }

    let mut secrets = Secrets::from_file(path).inspect_err(|e| {
        if e.downcast::<io::Error>()
            .is_some_and(|e| e.kind() == io::ErrorKind::NotFound)
        {
            info!("copy secrets.toml.example to {path} and fill in your account");
        }
    })?;

    if let Some(email) = overrides.email {
        secrets.email = email;
    }
    if let Some(password_md5) = overrides.password_md5 {
        secrets.password_md5 = password_md5;
    }
    if let Some(client_id) = overrides.client_id {
        secrets.client_id = client_id;
    }
    if let Some(client_secret) = overrides.client_secret {
        secrets.client_secret = client_secret;
    }
    if let Some(bf_secret) = overrides.bf_secret {
        secrets.bf_secret = bf_secret;
    }

    Ok(secrets)
}

fn print_json(value: &impl Serialize) -> Result<(), Box<dyn Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Normalizes a track list without public API records.
fn parse_tracks(songs: &[Song]) -> deezl::error::Result<Vec<metadata::Track>> {
    songs
        .iter()
        .map(|song| metadata::parse_track(song, None))
        .collect()
}

async fn execute(client: &Client, command: Command, full: bool) -> Result<(), Box<dyn Error>> {
    match command {
        Command::Track { id } => {
            let details = client.get_track_details(id).await?;
            let track = details.track()?;
            let album = details.album()?;
            if full {
                print_json(&json!({
                    "track": track,
                    "album": album,
                    "gateway": { "track": details.song, "album": details.album_page },
                    "api": details.api_track,
                }))
            } else {
                print_json(&json!({ "track": track, "album": album }))
            }
        }

        Command::Album { id } => {
            let page = client.get_album_page(id).await?;
            let album = metadata::parse_album(&page.data, Some(&page.songs.data))?;
            let tracks = parse_tracks(&page.songs.data)?;
            if full {
                print_json(&json!({ "album": album, "tracks": tracks, "gateway": page }))
            } else {
                print_json(&json!({ "album": album, "tracks": tracks }))
            }
        }

        Command::Playlist { id } => {
            let page = client.get_playlist_page(id).await?;
            let playlist = metadata::parse_playlist(&page.data)?;
            let tracks = parse_tracks(&page.songs.data)?;
            if full {
                print_json(&json!({ "playlist": playlist, "tracks": tracks, "gateway": page }))
            } else {
                print_json(&json!({ "playlist": playlist, "tracks": tracks }))
            }
        }

        Command::Search {
            query,
            kind,
            index,
            limit,
        } => {
            let results = client.search(&query, kind, index, limit).await?;
            let records = metadata::parse_search_results(&results)?;
            if full {
                print_json(&json!({ "results": records, "gateway": results }))
            } else {
                print_json(&records)
            }
        }

        Command::Download {
            id,
            format,
            cover_size,
            cover_format,
            output,
        } => {
            let cover = cover_size.map(|size| (size, cover_format));
            let bundle = client.download_track_bundle(id, format, cover).await?;

            let tags = bundle.tags()?;
            let audio = tags::embed(
                &ContainerWriter,
                format,
                &bundle.audio,
                &tags,
                bundle.cover.as_ref(),
            )?;

            let output =
                output.unwrap_or_else(|| PathBuf::from(format!("{id}.{}", format.extension())));
            fs::write(&output, &audio)?;
            info!("wrote {} bytes to {}", audio.len(), output.display());

            let fields = tags.fields(format.codec());
            if full {
                print_json(&json!({
                    "fields": fields,
                    "gateway": bundle.details.song,
                    "api": bundle.details.api_track,
                }))
            } else {
                print_json(&fields)
            }
        }
    }
}

/// Runs the command until it completes or the user interrupts it.
async fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let secrets = load_secrets(&args.secrets_file, args.overrides)?;
    let config = Config::from_secrets(secrets)?;
    let client = Client::new(config)?;

    tokio::select! {
        // Prioritize shutdown signals.
        biased;

        _ = tokio::signal::ctrl_c() => {
            info!("shutting down gracefully");
            Ok(())
        }

        result = execute(&client, args.command, args.full) => result,
    }
}

/// Main entry point of the application.
///
/// This function initializes the logger facade, parses the command line
/// arguments, and runs the requested command.
#[tokio::main]
async fn main() {
    // `clap` handles our command line arguments and help text.
    let args = Args::parse();
    init_logger(&args);

    // Dump command line arguments before we do anything more.
    // This aids in debugging of whatever comes next.
    debug!("Command {:#?}", args);

    let cmd = command!();
    let name = cmd.get_name().to_string();
    let version = cmd.get_version().unwrap_or("UNKNOWN").to_string();

    info!("starting {name}/{version}; {BUILD_PROFILE}");

    if let Err(e) = run(args).await {
        error!("{e}");
        process::exit(1);
    }
}
