use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDate;

use folio_pulse::config::Config;
use folio_pulse::logging::{log_call_failed, Domain};
use folio_pulse::session::{HttpBackend, MetricsBackend, StatsQuery};

fn print_usage() {
    eprintln!("Usage: stats [--day YYYY-MM-DD | --from YYYY-MM-DD --to YYYY-MM-DD]");
}

fn parse_date(flag: &str, value: Option<&String>) -> Result<NaiveDate> {
    let value = value.ok_or_else(|| anyhow!("{} needs a date", flag))?;
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .with_context(|| format!("{} expects YYYY-MM-DD, got {:?}", flag, value))
}

fn parse_query(args: &[String]) -> Result<StatsQuery> {
    let mut day = None;
    let mut from = None;
    let mut to = None;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--day" => day = Some(parse_date("--day", args.get(i + 1))?),
            "--from" => from = Some(parse_date("--from", args.get(i + 1))?),
            "--to" => to = Some(parse_date("--to", args.get(i + 1))?),
            other => bail!("unknown argument: {}", other),
        }
        i += 2;
    }
    match (day, from, to) {
        (None, None, None) => Ok(StatsQuery::Today),
        (Some(d), None, None) => Ok(StatsQuery::Day(d)),
        (None, Some(f), Some(t)) => StatsQuery::range(f, t),
        (None, _, _) => bail!("--from and --to go together"),
        (Some(_), _, _) => bail!("--day cannot be combined with --from/--to"),
    }
}

async fn run(args: &[String]) -> Result<()> {
    let query = parse_query(args)?;
    let cfg = Config::from_env();
    let backend = HttpBackend::new(&cfg)?;
    let report = backend.stats(&query).await.map_err(|err| {
        log_call_failed(Domain::Stats, query.label(), &err);
        err
    })?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.iter().any(|a| a == "-h" || a == "--help") {
        print_usage();
        return;
    }
    if let Err(err) = run(&args).await {
        eprintln!("Error: {:#}", err);
        print_usage();
        std::process::exit(1);
    }
}
