//! Startup sequence for one visit: locate, open the session, then read
//! today's stats. Each step waits for the previous one.

use chrono::NaiveDate;
use serde::Serialize;

use crate::geo::{GeoLocation, LocationResolver};
use crate::logging::{info, obj, v_num, v_str, warn, Domain};
use crate::session::{SessionClient, StatsReport};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitOutcome {
    pub location: Option<GeoLocation>,
    pub session_id: Option<String>,
    pub stats: StatsReport,
    /// True when `stats` is the placeholder, not a backend answer.
    pub stats_placeholder: bool,
}

pub async fn open_visit(
    resolver: &LocationResolver,
    client: &SessionClient,
    today: NaiveDate,
) -> VisitOutcome {
    let location = resolver.resolve().await;
    let session_id = client.start(location.clone()).await;

    let (stats, stats_placeholder) = match client.stats_today().await {
        Ok(report) => (report, false),
        Err(err) => {
            warn(
                Domain::Stats,
                "stats_unavailable",
                obj(&[
                    ("msg", v_str("using placeholder stats")),
                    ("error", v_str(&format!("{:#}", err))),
                ]),
            );
            (StatsReport::placeholder(today), true)
        }
    };

    info(
        Domain::System,
        "visit_opened",
        obj(&[
            ("session_id", v_str(session_id.as_deref().unwrap_or(""))),
            ("located", serde_json::Value::Bool(location.is_some())),
            ("total_visits", v_num(stats.total_visits() as f64)),
            ("placeholder", serde_json::Value::Bool(stats_placeholder)),
        ]),
    );

    VisitOutcome {
        location,
        session_id,
        stats,
        stats_placeholder,
    }
}
