use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use tokio::time::{sleep, Duration};

use folio_pulse::config::Config;
use folio_pulse::env::{HostEnvironment, PageEnvironment};
use folio_pulse::geo::LocationResolver;
use folio_pulse::logging::{info, obj, v_num, v_str, Domain};
use folio_pulse::session::{HttpBackend, SessionClient};
use folio_pulse::visit::open_visit;

async fn wait_for_exit(visit_secs: Option<u64>) -> &'static str {
    match visit_secs {
        Some(secs) => tokio::select! {
            _ = sleep(Duration::from_secs(secs)) => "visit_elapsed",
            _ = tokio::signal::ctrl_c() => "ctrl_c",
        },
        None => match tokio::signal::ctrl_c().await {
            Ok(()) => "ctrl_c",
            Err(_) => "signal_unavailable",
        },
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::from_env();
    let env = Arc::new(HostEnvironment::new(&cfg));
    let backend = Arc::new(HttpBackend::new(&cfg)?);
    let resolver = LocationResolver::from_config(&cfg, &env.hostname())?;
    let client = SessionClient::new(backend, env.clone(), cfg.heartbeat_interval());

    info(
        Domain::System,
        "visit_begin",
        obj(&[
            ("base", v_str(&cfg.metrics_base())),
            ("host", v_str(&cfg.page_host)),
            ("heartbeat_ms", v_num(cfg.heartbeat_ms as f64)),
        ]),
    );

    let outcome = open_visit(&resolver, &client, Utc::now().date_naive()).await;
    println!("{}", serde_json::to_string_pretty(&outcome)?);

    let reason = wait_for_exit(cfg.visit_secs).await;
    info(Domain::System, "visit_closing", obj(&[("reason", v_str(reason))]));
    client.shutdown().await;
    Ok(())
}
