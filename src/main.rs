use anyhow::{Context, Result};
use chrono::{Timelike, Utc};
use clap::Parser;
use std::time::Instant;
use tracing::{error, info};

use dmarc_analyzer::{output, utils, Analyzer, Args, Command, Config, OutputFormat, SenderFilter, SqliteStore};

fn run(args: &Args, config: Config) -> Result<String> {
    let total_start_time = Instant::now();

    if !args.database.exists() {
        anyhow::bail!("Report database not found at {:?}", args.database);
    }
    let store = SqliteStore::open_read_only(&args.database)
        .with_context(|| format!("Failed to open report database {:?}", args.database))?;

    let analyzer = Analyzer::new(&store, config);
    let now = Utc::now().naive_utc();
    let now = now.with_nanosecond(0).unwrap_or(now);
    let json = args.format == OutputFormat::Json;

    let rendered = match &args.command {
        Command::Dashboard { range } => {
            let view = analyzer.dashboard(range.as_deref(), now)?;
            if json {
                output::dashboard_json(&view)?
            } else {
                output::render_dashboard(&view)
            }
        }
        Command::Domain { domain, range } => {
            let view = analyzer.domain(domain, range.as_deref(), now)?;
            if json {
                output::domain_json(&view)?
            } else {
                output::render_domain(&view)
            }
        }
        Command::Report { serial } => {
            let view = analyzer.report(*serial)?;
            if json {
                output::report_json(&view)?
            } else {
                output::render_report(&view)
            }
        }
        Command::Senders { range, domain, ip } => {
            let filter = SenderFilter {
                hfrom_contains: domain.clone(),
                ip_contains: ip.clone(),
            };
            let view = analyzer.senders(range.as_deref(), &filter, now)?;
            if json {
                output::senders_json(&view)?
            } else {
                output::render_senders(&view)
            }
        }
    };

    info!(
        action = "complete",
        component = "request",
        duration_ms = total_start_time.elapsed().as_millis(),
        "Request completed"
    );
    Ok(rendered)
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::from_args(&args)?;
    utils::setup_logging(config.debug);

    match run(&args, config) {
        Ok(rendered) => {
            println!("{}", rendered);
            Ok(())
        }
        Err(e) => {
            error!(action = "fail", component = "request", error = %e, "Request failed");
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}
