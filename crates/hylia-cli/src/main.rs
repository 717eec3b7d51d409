use anyhow::Result;
use clap::Parser;
use hylia_acquire::download::{self, DownloadOptions};
use hylia_acquire::fetch::DEFAULT_BASE_URL;
use hylia_acquire::{HyliaError, Site, Soundtrack};
use std::path::Path;
use std::process::ExitCode;

const BIN_NAME: &str = "thehylia";
const ISSUES_URL: &str = "https://github.com/obskyr/thehylia";

#[derive(Parser)]
#[command(name = BIN_NAME)]
#[command(about = "Download entire soundtracks from The Hylia")]
#[command(after_help = "Examples:\n  thehylia jumping-flash\n  thehylia katamari-forever \"music/Katamari Forever OST\"\n  thehylia --search persona")]
#[command(version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("BUILD_HASH"), ")"))]
struct Cli {
    /// The ID of the soundtrack, used at the end of its URL (e.g. "jumping-flash").
    /// If it doesn't exist, or --search is given, or too many arguments are
    /// supplied, all positional arguments together are used as a search term.
    soundtrack: Option<String>,

    /// The directory to download the soundtrack to. Defaults to a new
    /// directory named after the soundtrack ID.
    #[arg(value_name = "DOWNLOAD_DIRECTORY")]
    out_path: Option<String>,

    #[arg(hide = true)]
    trailing: Vec<String>,

    /// Always search, regardless of whether the soundtrack ID exists
    #[arg(short, long)]
    search: bool,

    /// Print the soundtrack's file list as JSON instead of downloading
    #[arg(long, conflicts_with = "search")]
    list: bool,

    /// Print search results as a JSON array
    #[arg(long)]
    json: bool,

    /// Base URL of the site
    #[arg(long, env = "HYLIA_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Log level: error, warn, info, debug, trace
    #[arg(long, default_value = "warn", value_enum)]
    log_level: LogLevel,

    /// Use UTC timestamps instead of local time
    #[arg(long)]
    utc: bool,
}

#[derive(Clone, clap::ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(&cli);

    let Some(soundtrack) = cli.soundtrack.clone() else {
        print_usage_hint();
        return Ok(ExitCode::SUCCESS);
    };
    let site = Site::with_base_url(&cli.base_url)?;

    let outcome = tokio::select! {
        outcome = run(&cli, &site, &soundtrack) => outcome,
        _ = tokio::signal::ctrl_c() => {
            println!("Stopped download.");
            return Ok(ExitCode::from(130));
        }
    };

    match outcome {
        Ok(code) => Ok(code),
        Err(err) => match err.downcast_ref::<HyliaError>() {
            Some(hylia_err) if hylia_err.is_connectivity() => {
                tracing::debug!(error = ?err, "Connectivity failure");
                println!("Could not connect to The Hylia.");
                println!("Make sure you have a working internet connection.");
                Ok(ExitCode::FAILURE)
            }
            _ => {
                println!();
                println!("An unexpected error occurred! If it isn't too much to ask, please report to {ISSUES_URL}.");
                println!("Attach the following error message:");
                println!();
                Err(err)
            }
        },
    }
}

fn init_tracing(cli: &Cli) {
    // Map log level, suppressing noisy HTML-parsing crates at debug/trace
    let level = match cli.log_level {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug,selectors=warn,html5ever=warn",
        LogLevel::Trace => "trace,selectors=warn,html5ever=warn",
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    // Timestamp format: 2026-02-14 19:44:09.123 -08:00
    let time_format = "%Y-%m-%d %H:%M:%S%.3f %:z";

    // Logs go to stderr; stdout carries progress and results.
    if cli.utc {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .with_timer(tracing_subscriber::fmt::time::ChronoUtc::new(time_format.to_string()))
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .with_timer(tracing_subscriber::fmt::time::ChronoLocal::new(time_format.to_string()))
            .init();
    }
}

async fn run(cli: &Cli, site: &Site, soundtrack_id: &str) -> Result<ExitCode> {
    let term = search_term(soundtrack_id, cli.out_path.as_deref(), &cli.trailing);

    // Typing a whole album title without quotes should still do something useful.
    let only_search = cli.search || cli.trailing.len() > 1;
    if only_search {
        tracing::info!(term = %term, "Searching");
        let results = hylia_acquire::search(site, &term).await?;
        print_search_results(&results, cli.json)?;
        return Ok(ExitCode::SUCCESS);
    }

    let mut soundtrack = Soundtrack::new(site, soundtrack_id)?;
    let result = if cli.list {
        download::file_list(site, &mut soundtrack)
            .await
            .map(|files| serde_json::to_string_pretty(&files).map(|json| println!("{json}")))
    } else {
        let out_path = cli.out_path.as_deref().unwrap_or(soundtrack_id);
        let options = DownloadOptions {
            make_dirs: true,
            verbose: true,
        };
        download::download(site, &mut soundtrack, Path::new(out_path), options)
            .await
            .map(|report| {
                tracing::info!(
                    downloaded = report.downloaded.len(),
                    already_present = report.already_present.len(),
                    failed = report.failed.len(),
                    "Download finished"
                );
                Ok(())
            })
    };

    match result {
        Ok(printed) => {
            printed?;
            Ok(ExitCode::SUCCESS)
        }
        Err(HyliaError::NonexistentSoundtrack { id }) => suggest_alternatives(site, &id, &term).await,
        Err(err) => Err(err.into()),
    }
}

/// Search for what the user probably meant after an unknown soundtrack id.
async fn suggest_alternatives(site: &Site, id: &str, term: &str) -> Result<ExitCode> {
    let results = hylia_acquire::search(site, term).await?;
    println!();
    println!("The soundtrack \"{id}\" does not seem to exist.");

    if results.is_empty() {
        return Ok(ExitCode::FAILURE);
    }
    println!();
    println!("These exist, though:");
    for name in &results {
        println!("{name}");
    }
    Ok(ExitCode::SUCCESS)
}

fn print_search_results(results: &[String], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(results)?);
    } else if results.is_empty() {
        println!("No soundtracks found.");
    } else {
        println!("Soundtracks found (to download, run \"{BIN_NAME} soundtrack-name\"):");
        for name in results {
            println!("{name}");
        }
    }
    Ok(())
}

fn print_usage_hint() {
    println!("No soundtrack specified! As the first parameter, use the name the soundtrack uses in its URL.");
    println!("If you want to, you can also specify an output directory as the second parameter.");
    println!("You can also search for soundtracks by using your search term as parameter - as long as it's not an existing soundtrack.");
    println!();
    println!("For detailed help and more options, run \"{BIN_NAME} --help\".");
}

/// All positional words joined into one search term, with dashes read as spaces.
fn search_term(soundtrack: &str, out_path: Option<&str>, trailing: &[String]) -> String {
    std::iter::once(soundtrack)
        .chain(out_path)
        .chain(trailing.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ")
        .replace('-', " ")
}
