// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use hangar_core::cache::RegistrationCache;
use hangar_core::config::EngineConfig;
use hangar_core::slots::{FileSlotStore, HttpSyncPush};
use hangar_core::{OvernightEngine, OvernightRecord, RunRequest};
use simplelog::{ColorChoice, ConfigBuilder, LevelFilter, TermLogger, TerminalMode};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config.json (defaults to the per-user config directory)
    #[arg(short, long, env = "HANGAR_CONFIG")]
    config: Option<PathBuf>,

    /// AeroDataBox (RapidAPI) key
    #[arg(long, env = "AERODATABOX_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// GoFlightLabs key; enables the secondary registration source
    #[arg(long, env = "GOFLIGHTLABS_API_KEY", hide_env_values = true)]
    secondary_key: Option<String>,

    /// More log output (-v debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct WindowArgs {
    /// Subject airport (IATA or ICAO)
    #[arg(short, long)]
    airport: String,
    /// Arrival day (YYYY-MM-DD)
    #[arg(long)]
    day1: NaiveDate,
    /// Departure day, the day after day1 (YYYY-MM-DD)
    #[arg(long)]
    day2: NaiveDate,
}

impl WindowArgs {
    fn request(&self) -> RunRequest {
        RunRequest::new(&self.airport, self.day1, self.day2)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Classify overnight stays and reconcile them into the slots
    Run {
        #[command(flatten)]
        window: WindowArgs,
        /// Slot snapshot file to read (and update when no sync URL is set)
        #[arg(long)]
        slots: Option<PathBuf>,
        /// Sync endpoint that receives the field updates instead of the file
        #[arg(long)]
        sync_url: Option<String>,
        /// Compute the diff without writing anything
        #[arg(long)]
        dry_run: bool,
    },
    /// Classify overnight stays and print them
    Classify {
        #[command(flatten)]
        window: WindowArgs,
    },
    /// Resolve the registration for one flight number
    Lookup {
        flight: String,
        #[arg(long)]
        date: NaiveDate,
    },
    /// Registration cache maintenance
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Show entry counts
    Stats,
    /// Remove every entry
    Clear,
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => LevelFilter::Error,
        (false, 0) => LevelFilter::Info,
        (false, 1) => LevelFilter::Debug,
        (false, _) => LevelFilter::Trace,
    };
    let config = ConfigBuilder::new()
        .add_filter_allow_str("hangar")
        .build();
    let _ = TermLogger::init(level, config, TerminalMode::Stderr, ColorChoice::Auto);
}

fn load_config(cli: &Cli) -> Result<EngineConfig> {
    let path = cli.config.clone().unwrap_or_else(EngineConfig::default_path);
    let mut config = EngineConfig::load(&path)?;
    log::debug!("Loaded config — path={}", path.display());
    if let Some(key) = &cli.api_key {
        config.aerodatabox_api_key = Some(key.clone());
    }
    if let Some(key) = &cli.secondary_key {
        config.goflightlabs_api_key = Some(key.clone());
    }
    Ok(config)
}

fn print_records(records: &[OvernightRecord]) {
    if records.is_empty() {
        println!("No overnight aircraft found.");
        return;
    }
    println!(
        "{:<10} {:<9} {:<6} {:<6} {:<14} {}",
        "REG", "TYPE", "ARR", "DEP", "ROUTE", "DURATION"
    );
    for r in records {
        println!(
            "{:<10} {:<9} {:<6} {:<6} {:<14} {}",
            r.registration,
            format!("{:?}", r.overnight_type),
            r.arrival_time_text(),
            r.departure_time_text(),
            r.route,
            r.duration
        );
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);
    let config = load_config(&cli)?;

    match &cli.command {
        Commands::Run {
            window,
            slots,
            sync_url,
            dry_run,
        } => {
            let mut engine = OvernightEngine::from_config(&config)?;
            let request = window.request();

            let Some(slot_path) = slots else {
                bail!("No slot snapshot given. Use --slots FILE (optionally with --sync-url).");
            };
            let store = FileSlotStore::open(slot_path, config.local_edit_guard())
                .with_context(|| format!("Failed to open slots {}", slot_path.display()))?;

            if *dry_run {
                let (summary, updates) = engine.plan(&request, &store)?;
                for u in &updates {
                    println!("{} = {:?}", u.field_id(), u.value);
                }
                println!("{}", summary);
                return Ok(());
            }

            let summary = match sync_url.as_ref().or(config.sync_url.as_ref()) {
                Some(url) => {
                    let push = HttpSyncPush::new(url, "hangar-cli", config.request_timeout())?;
                    engine.run(&request, &store, &store, &push)?
                }
                None => engine.run(&request, &store, &store, &store)?,
            };
            println!("{}", summary);
        }
        Commands::Classify { window } => {
            let mut engine = OvernightEngine::from_config(&config)?;
            let result = engine.classify(&window.request())?;
            print_records(&result.records);
            println!(
                "\n{} flights seen, {} dropped as unresolved, {} outbound calls",
                result.flights_seen, result.flights_dropped, result.calls_made
            );
            if result.quota_exceeded {
                println!("NOTICE: provider quota exceeded; showing partial, possibly stale results");
            }
        }
        Commands::Lookup { flight, date } => {
            let mut engine = OvernightEngine::from_config(&config)?;
            match engine.lookup(flight, *date)? {
                Some((reg, source)) => println!("{} {} -> {} ({:?})", flight, date, reg, source),
                None => println!("{} {}: no registration found", flight, date),
            }
        }
        Commands::Cache { action } => {
            let mut cache = RegistrationCache::load(
                &config.cache_path(),
                config.registration_cache_ttl(),
                config.registration_cache_max_entries,
            );
            match action {
                CacheAction::Stats => {
                    let stats = cache.stats(Utc::now());
                    println!("Cache: {}", cache.path().display());
                    println!("  entries: {}", stats.total);
                    println!("  expired: {}", stats.expired);
                }
                CacheAction::Clear => {
                    let n = cache.len();
                    cache.clear();
                    cache.save()?;
                    println!("Removed {} cached registrations.", n);
                }
            }
        }
    }

    Ok(())
}
