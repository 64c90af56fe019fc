//! om-run: run one OM(m) scenario and print the reporter's output.
//!
//! Usage:
//!   om-run <loyalty> [--reporter N] [--commander N] [--order A|R] [--timeout-ms N] [--json]
//!
//! `loyalty` has one letter per general, `L` loyal or `T` traitor:
//!   om-run LLLT --reporter 1 --order R

use std::time::Duration;

use generals_harness::{parse_loyalty, Error, Result, Scenario};
use generals_om::{GeneralId, Order, SessionOptions};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

struct Args {
    scenario: Scenario,
    json: bool,
}

fn print_usage() {
    eprintln!("om-run - Oral Messages OM(m) for the Byzantine Generals Problem");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  om-run <loyalty> [options]");
    eprintln!();
    eprintln!("  <loyalty>           One letter per general: L loyal, T traitor (e.g. LLLT)");
    eprintln!("  --reporter <id>     General whose output is printed (default 1)");
    eprintln!("  --commander <id>    General issuing the order (default 0)");
    eprintln!("  --order <A|R>       Order to broadcast (default A)");
    eprintln!("  --timeout-ms <ms>   Completion timeout, 0 waits forever (default 30000)");
    eprintln!("  --json              Print the outcome as JSON");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  RUST_LOG  Log filter (default: om_run=info,generals_om=info)");
}

fn parse_id(value: Option<String>, flag: &str) -> Result<GeneralId> {
    value
        .and_then(|v| v.parse::<usize>().ok())
        .map(GeneralId)
        .ok_or_else(|| Error::InvalidInput(format!("{flag} needs a general id")))
}

fn parse_args() -> Result<Args> {
    let mut args = std::env::args().skip(1);
    let loyalty = args
        .next()
        .ok_or_else(|| Error::InvalidInput("missing loyalty string".into()))?;
    let loyalty = parse_loyalty(&loyalty)?;

    let mut reporter = GeneralId(1);
    let mut commander = GeneralId(0);
    let mut order = Order::Attack;
    let mut options = SessionOptions::default();
    let mut json = false;

    while let Some(flag) = args.next() {
        match flag.as_str() {
            "--reporter" => reporter = parse_id(args.next(), "--reporter")?,
            "--commander" => commander = parse_id(args.next(), "--commander")?,
            "--order" => {
                order = args
                    .next()
                    .ok_or_else(|| Error::InvalidInput("--order needs A or R".into()))?
                    .parse()?;
            }
            "--timeout-ms" => {
                let ms: u64 = args
                    .next()
                    .and_then(|v| v.parse().ok())
                    .ok_or_else(|| Error::InvalidInput("--timeout-ms needs a number".into()))?;
                options = if ms == 0 {
                    options.without_timeout()
                } else {
                    options.with_timeout(Duration::from_millis(ms))
                };
            }
            "--json" => json = true,
            other => return Err(Error::InvalidInput(format!("unknown argument {other}"))),
        }
    }

    Ok(Args {
        scenario: Scenario::new(loyalty, reporter, commander, order).with_options(options),
        json,
    })
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "om_run=info,generals_om=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("Error: {e}");
            eprintln!();
            print_usage();
            std::process::exit(2);
        }
    };

    tracing::info!(
        generals = args.scenario.loyalty.len(),
        reporter = %args.scenario.reporter,
        commander = %args.scenario.commander,
        order = %args.scenario.order,
        "Starting run"
    );

    let outcome = args.scenario.run().await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        println!("{outcome}");
    }

    Ok(())
}
