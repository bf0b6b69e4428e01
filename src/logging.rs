//! Structured logging for the visit client and reveal orchestration.
//!
//! Every record is one JSON line on stderr:
//! `{ts, run_id, seq, lvl, component, event, msg, data}`.
//! When `LOG_DIR` is set the same lines are also appended to
//! `LOG_DIR/<run_id>/events.jsonl` (info and above) and `trace.jsonl`
//! (trace/debug).

use chrono::{SecondsFormat, Utc};
use serde_json::{json, Map, Value};
use std::fs::{create_dir_all, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl Level {
    const ALL: [Level; 6] = [
        Level::Trace,
        Level::Debug,
        Level::Info,
        Level::Warn,
        Level::Error,
        Level::Fatal,
    ];

    /// Minimum level from `LOG_LEVEL`, info when unset or unknown.
    pub fn from_env() -> Self {
        std::env::var("LOG_LEVEL")
            .ok()
            .and_then(|raw| Self::ALL.into_iter().find(|l| l.as_str() == raw.trim()))
            .unwrap_or(Level::Info)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::Fatal => "fatal",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Domain {
    Session,
    Geo,
    Stats,
    Reveal,
    Tape,
    System,
    /// request timings
    Profile,
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Session => "session",
            Domain::Geo => "geo",
            Domain::Stats => "stats",
            Domain::Reveal => "reveal",
            Domain::Tape => "tape",
            Domain::System => "system",
            Domain::Profile => "profile",
        }
    }

    /// `LOG_DOMAINS` is a comma list or `all`; unset enables everything.
    pub fn is_enabled(&self) -> bool {
        match std::env::var("LOG_DOMAINS").as_deref() {
            Ok("all") | Err(_) => true,
            Ok(domains) => domains.split(',').any(|d| d.trim() == self.as_str()),
        }
    }
}

const REDACTED_KEYS: [&str; 4] = ["x-api-key", "api_key", "authorization", "Authorization"];
const HOISTED_KEYS: [&str; 3] = ["session_id", "section", "card"];

static SEQ: AtomicU64 = AtomicU64::new(0);
static SINKS: OnceLock<Sinks> = OnceLock::new();

type Sink = Mutex<BufWriter<File>>;

struct Sinks {
    run_id: String,
    /// `(events, trace)` when `LOG_DIR` is set and writable.
    files: Option<(Sink, Sink)>,
}

fn open_sink(path: &Path) -> Option<Sink> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map(|f| Mutex::new(BufWriter::new(f)))
        .map_err(|err| eprintln!("[log] cannot open {}: {}", path.display(), err))
        .ok()
}

fn sinks() -> &'static Sinks {
    SINKS.get_or_init(|| {
        let run_id = std::env::var("RUN_ID").unwrap_or_else(|_| {
            format!("v-{}-{}", Utc::now().timestamp_millis(), std::process::id())
        });
        let files = std::env::var("LOG_DIR").ok().and_then(|base| {
            let dir = PathBuf::from(base).join(&run_id);
            if let Err(err) = create_dir_all(&dir) {
                eprintln!("[log] cannot create {}: {}", dir.display(), err);
                return None;
            }
            Some((open_sink(&dir.join("events.jsonl"))?, open_sink(&dir.join("trace.jsonl"))?))
        });
        Sinks { run_id, files }
    })
}

fn append(sink: &Sink, line: &str) {
    if let Ok(mut w) = sink.lock() {
        let _ = writeln!(w, "{}", line).and_then(|_| w.flush());
    }
}

/// Build one record. Secrets are masked; ids and `msg` sit beside the
/// envelope, everything else goes under `data`.
fn render_record(level: Level, component: &str, event: &str, mut data: Map<String, Value>) -> String {
    for key in REDACTED_KEYS {
        if let Some(v) = data.get_mut(key) {
            *v = json!("[REDACTED]");
        }
    }
    let msg = data.remove("msg").unwrap_or_else(|| json!(""));
    let mut record = json!({
        "ts": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        "run_id": sinks().run_id,
        "seq": SEQ.fetch_add(1, Ordering::SeqCst),
        "lvl": level.as_str().to_uppercase(),
        "component": component,
        "event": event,
        "msg": msg,
    });
    if let Value::Object(top) = &mut record {
        for key in HOISTED_KEYS {
            if let Some(v) = data.remove(key) {
                top.insert(key.to_string(), v);
            }
        }
        top.insert("data".to_string(), Value::Object(data));
    }
    record.to_string()
}

pub fn log(level: Level, domain: Domain, event: &str, fields: Map<String, Value>) {
    if level < Level::from_env() || !domain.is_enabled() {
        return;
    }
    let line = render_record(level, domain.as_str(), event, fields);
    if let Some((events, trace)) = &sinks().files {
        append(if level >= Level::Info { events } else { trace }, &line);
    }
    eprintln!("{}", line);
}

pub fn debug(domain: Domain, event: &str, fields: Map<String, Value>) {
    log(Level::Debug, domain, event, fields);
}

pub fn info(domain: Domain, event: &str, fields: Map<String, Value>) {
    log(Level::Info, domain, event, fields);
}

pub fn warn(domain: Domain, event: &str, fields: Map<String, Value>) {
    log(Level::Warn, domain, event, fields);
}

/// A backend call failed and the caller carries on without it.
pub fn log_call_failed(domain: Domain, call: &str, err: &anyhow::Error) {
    warn(
        domain,
        "call_failed",
        obj(&[("call", v_str(call)), ("error", v_str(&format!("{:#}", err)))]),
    );
}

pub fn obj(pairs: &[(&str, Value)]) -> Map<String, Value> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), v.clone()))
        .collect()
}

pub fn v_str(s: &str) -> Value {
    Value::String(s.to_string())
}

pub fn v_num(n: f64) -> Value {
    json!(n)
}

/// Emits a trace record with the elapsed time on drop.
pub struct ProfileScope {
    label: &'static str,
    fields: Map<String, Value>,
    started: Instant,
}

impl ProfileScope {
    pub fn new(label: &'static str) -> Self {
        Self::with_context(label, &[])
    }

    pub fn with_context(label: &'static str, fields: &[(&str, Value)]) -> Self {
        Self {
            label,
            fields: obj(fields),
            started: Instant::now(),
        }
    }
}

impl Drop for ProfileScope {
    fn drop(&mut self) {
        let mut fields = std::mem::take(&mut self.fields);
        fields.insert("label".to_string(), v_str(self.label));
        fields.insert(
            "elapsed_ms".to_string(),
            v_num(self.started.elapsed().as_secs_f64() * 1000.0),
        );
        log(Level::Trace, Domain::Profile, "profile", fields);
    }
}

/// Counters summarised by `aggregated_stats` every `LOG_FLUSH_SECS`.
struct Counters {
    heartbeats: u64,
    heartbeat_failures: u64,
    stats_fetches: u64,
    since: Instant,
    every_secs: u64,
}

impl Counters {
    fn new(every_secs: u64) -> Self {
        Self {
            heartbeats: 0,
            heartbeat_failures: 0,
            stats_fetches: 0,
            since: Instant::now(),
            every_secs,
        }
    }

    fn bump(&mut self, event: &str) {
        match event {
            "heartbeat" => self.heartbeats += 1,
            "heartbeat_failure" => self.heartbeat_failures += 1,
            "stats_fetch" => self.stats_fetches += 1,
            _ => {}
        }
    }

    /// Snapshot and reset once the window has elapsed.
    fn take_due(&mut self) -> Option<Map<String, Value>> {
        if self.since.elapsed().as_secs() < self.every_secs {
            return None;
        }
        let snapshot = obj(&[
            ("heartbeats", json!(self.heartbeats)),
            ("heartbeat_failures", json!(self.heartbeat_failures)),
            ("stats_fetches", json!(self.stats_fetches)),
        ]);
        *self = Self::new(self.every_secs);
        Some(snapshot)
    }
}

static COUNTERS: OnceLock<Mutex<Counters>> = OnceLock::new();

fn counters() -> &'static Mutex<Counters> {
    COUNTERS.get_or_init(|| {
        let every = std::env::var("LOG_FLUSH_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(300);
        Mutex::new(Counters::new(every))
    })
}

pub fn agg_increment(event: &str) {
    if let Ok(mut c) = counters().lock() {
        c.bump(event);
    }
}

/// Emit the counter summary if its window has elapsed.
pub fn tick_aggregator() {
    let due = counters().lock().ok().and_then(|mut c| c.take_due());
    if let Some(fields) = due {
        info(Domain::System, "aggregated_stats", fields);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordering_and_names() {
        assert!(Level::Trace < Level::Debug && Level::Debug < Level::Info);
        assert!(Level::Warn < Level::Error && Level::Error < Level::Fatal);
        assert_eq!(Level::Warn.as_str(), "warn");
    }

    #[test]
    fn test_api_key_is_redacted() {
        let line = render_record(
            Level::Warn,
            "session",
            "call_failed",
            obj(&[("x-api-key", v_str("secret")), ("call", v_str("start"))]),
        );
        assert!(!line.contains("secret"));
        let v: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(v["data"]["x-api-key"], "[REDACTED]");
        assert_eq!(v["data"]["call"], "start");
    }

    #[test]
    fn test_record_hoists_session_id_and_msg() {
        let line = render_record(
            Level::Info,
            "session",
            "started",
            obj(&[
                ("session_id", v_str("s-1")),
                ("msg", v_str("opened")),
                ("heartbeat_ms", v_num(15000.0)),
            ]),
        );
        let v: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(v["session_id"], "s-1");
        assert_eq!(v["msg"], "opened");
        assert_eq!(v["lvl"], "INFO");
        assert_eq!(v["data"]["heartbeat_ms"], 15000.0);
        assert!(v["data"].get("session_id").is_none());
    }

    #[test]
    fn test_counters_snapshot_and_reset() {
        let mut c = Counters::new(0);
        c.bump("heartbeat");
        c.bump("heartbeat");
        c.bump("stats_fetch");
        c.bump("unknown");
        let snap = c.take_due().unwrap();
        assert_eq!(snap["heartbeats"], 2);
        assert_eq!(snap["stats_fetches"], 1);
        assert_eq!(c.take_due().unwrap()["heartbeats"], 0);

        let mut slow = Counters::new(3_600);
        slow.bump("heartbeat");
        assert!(slow.take_due().is_none());
    }
}
