use clap::Parser;
use env_logger::Env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use ferret::cli::Args;
use ferret::dict::Dictionary;
use ferret::errors::{FerretError, FerretResult};
use ferret::fetch::{FetchOptions, HttpFetcher};
use ferret::module::SharedServices;
use ferret::persist::{EventStore, JsonlStore, LogFacade, MemoryStore};
use ferret::registry::builtin_registry;
use ferret::suffix::PublicSuffixTrie;
use ferret::{Scan, ScanConfig, ScanState, ScanStatusRegistry};

fn display_banner() {
    println!();
    println!("  \x1b[38;5;208m███████╗███████╗██████╗ ██████╗ ███████╗████████╗\x1b[0m");
    println!("  \x1b[38;5;208m██╔════╝██╔════╝██╔══██╗██╔══██╗██╔════╝╚══██╔══╝\x1b[0m");
    println!("  \x1b[38;5;214m█████╗  █████╗  ██████╔╝██████╔╝█████╗     ██║\x1b[0m");
    println!("  \x1b[38;5;214m██╔══╝  ██╔══╝  ██╔══██╗██╔══██╗██╔══╝     ██║\x1b[0m");
    println!("  \x1b[38;5;220m██║     ███████╗██║  ██║██║  ██║███████╗   ██║\x1b[0m");
    println!("  \x1b[38;5;220m╚═╝     ╚══════╝╚═╝  ╚═╝╚═╝  ╚═╝╚══════╝   ╚═╝\x1b[0m");
    println!();
    println!("       \x1b[3;38;5;147m\"Follow every thread back to its source\"\x1b[0m");
    println!();
}

fn build_services(args: &Args) -> FerretResult<Arc<SharedServices>> {
    let fetcher = Arc::new(HttpFetcher::new()?);
    let logger = Arc::new(LogFacade);

    let events: Arc<dyn EventStore> = match &args.output {
        Some(path) => Arc::new(JsonlStore::open(path)?),
        None => {
            log::info!("No output file given, events will not be persisted");
            Arc::new(MemoryStore::new())
        }
    };

    let word_files: Vec<&Path> = args.wordlist.iter().map(PathBuf::as_path).collect();
    let name_files: Vec<&Path> = args.namelist.iter().map(PathBuf::as_path).collect();
    let dictionary = Arc::new(Dictionary::from_files(&word_files, &name_files)?);

    let suffixes = match &args.suffix_list {
        Some(path) => {
            let rules = std::fs::read_to_string(path)
                .map_err(|e| FerretError::io(e, Some(path.clone())))?;
            Arc::new(PublicSuffixTrie::from_rules(rules.lines()))
        }
        None => Arc::new(PublicSuffixTrie::default()),
    };

    let mut default_fetch = FetchOptions::default();
    default_fetch.timeout = Duration::from_secs(args.timeout);
    if !args.user_agent.is_empty() {
        default_fetch.user_agents = args.user_agent.clone();
    }

    Ok(Arc::new(SharedServices {
        fetcher,
        logger,
        events,
        dictionary,
        suffixes,
        default_fetch,
    }))
}

#[tokio::main]
async fn main() -> FerretResult<()> {
    let args = Args::parse();

    let log_level = if args.quiet {
        "error"
    } else if args.verbose {
        "debug"
    } else {
        "info"
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_timestamp_millis()
        .init();

    if !args.quiet {
        display_banner();
    }

    log::info!("Ferret starting with args: {:?}", args);

    let mut config = ScanConfig::new(&args.target);
    if let Some(kind) = &args.target_type {
        config.target_kind = Some(kind.parse()?);
    }
    config.modules = args.modules.clone();

    let status = Arc::new(ScanStatusRegistry::new());
    let services = build_services(&args)?;
    let registry = builtin_registry();

    let mut scan = Scan::new(&config, &registry, services, Arc::clone(&status))?;
    let scan_id = scan.id().to_string();

    let mut worker = tokio::task::spawn_blocking(move || scan.run());
    let summary = tokio::select! {
        res = &mut worker => res?,
        _ = tokio::signal::ctrl_c() => {
            log::warn!("Interrupt received, requesting abort of scan {}", scan_id);
            status.set_status(&scan_id, ScanState::AbortRequested);
            (&mut worker).await?
        }
    };

    println!("    \x1b[38;5;46m▶\x1b[0m \x1b[1;37mScan {}\x1b[0m", summary.state.to_lowercase());
    println!("    \x1b[38;5;240m├─\x1b[0m Scan id: \x1b[1;37m{}\x1b[0m", summary.scan_id);
    println!("    \x1b[38;5;240m├─\x1b[0m Target: \x1b[1;37m{}\x1b[0m", summary.target);
    println!("    \x1b[38;5;240m├─\x1b[0m Events dispatched: \x1b[1;37m{}\x1b[0m", summary.events_queued);
    println!("    \x1b[38;5;240m├─\x1b[0m Suppressed as duplicates: \x1b[1;37m{}\x1b[0m", summary.events_suppressed);
    println!("    \x1b[38;5;240m├─\x1b[0m Handler errors: \x1b[1;37m{}\x1b[0m", summary.handler_errors);
    println!("    \x1b[38;5;240m└─\x1b[0m Duration: \x1b[1;37m{:.2}s\x1b[0m", summary.duration_seconds);
    println!();

    for (event_type, count) in &summary.type_counts {
        log::info!("  {}: {}", event_type, count);
    }

    Ok(())
}
