//! Visit session lifecycle: start, heartbeat, end.
//!
//! At most one session is open per client. The session id is the only
//! mutable shared state and lives behind the client's mutex; handlers and
//! the heartbeat ticker reach it through a weak reference, so dropping the
//! client stops everything.

use anyhow::Result;
use chrono::NaiveDate;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::{MetricsBackend, SessionRef, StartRequest, StatsQuery, StatsReport};
use crate::env::{ListenerId, PageEnvironment, PageEvent, PageEventKind, PageHandler, Visibility};
use crate::geo::GeoLocation;
use crate::logging::{
    agg_increment, debug, info, log_call_failed, obj, tick_aggregator, v_num, v_str, warn, Domain,
};

#[derive(Default)]
struct SessionState {
    session_id: Option<String>,
    ticker: Option<JoinHandle<()>>,
    listeners: Vec<ListenerId>,
}

struct Inner {
    backend: Arc<dyn MetricsBackend>,
    env: Arc<dyn PageEnvironment>,
    heartbeat_every: Duration,
    state: Mutex<SessionState>,
    /// Held across the start request so overlapping starts open one session.
    start_gate: tokio::sync::Mutex<()>,
}

#[derive(Clone)]
pub struct SessionClient {
    inner: Arc<Inner>,
}

impl SessionClient {
    pub fn new(
        backend: Arc<dyn MetricsBackend>,
        env: Arc<dyn PageEnvironment>,
        heartbeat_every: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                backend,
                env,
                heartbeat_every,
                state: Mutex::new(SessionState::default()),
                start_gate: tokio::sync::Mutex::new(()),
            }),
        }
    }

    pub fn session_id(&self) -> Option<String> {
        self.inner.state().session_id.clone()
    }

    pub fn is_open(&self) -> bool {
        self.inner.state().session_id.is_some()
    }

    /// Open a session. Failures are logged and yield `None`; the client then
    /// stays closed and never schedules heartbeats.
    pub async fn start(&self, location: Option<GeoLocation>) -> Option<String> {
        let _gate = self.inner.start_gate.lock().await;
        if let Some(open) = self.session_id() {
            warn(
                Domain::Session,
                "already_open",
                obj(&[("session_id", v_str(&open))]),
            );
            return Some(open);
        }

        let req = StartRequest {
            location,
            device: self.inner.env.device(),
        };
        let resp = match self.inner.backend.start(&req).await {
            Ok(resp) => resp,
            Err(err) => {
                log_call_failed(Domain::Session, "start", &err);
                return None;
            }
        };
        let Some(id) = resp.session_id.filter(|id| !id.is_empty()) else {
            warn(
                Domain::Session,
                "start_without_id",
                obj(&[("msg", v_str("backend answered start without a session id"))]),
            );
            return None;
        };

        let mut state = self.inner.state();
        state.session_id = Some(id.clone());
        state.ticker = Some(spawn_ticker(
            Arc::downgrade(&self.inner),
            self.inner.heartbeat_every,
        ));
        state.listeners = self.register_listeners();
        drop(state);

        info(
            Domain::Session,
            "started",
            obj(&[
                ("session_id", v_str(&id)),
                ("located", serde_json::Value::Bool(req.location.is_some())),
                ("heartbeat_ms", v_num(self.inner.heartbeat_every.as_millis() as f64)),
            ]),
        );
        Some(id)
    }

    /// Keep the open session marked active. No-op without a session;
    /// failures are swallowed until the next tick.
    pub async fn heartbeat(&self) {
        self.inner.heartbeat().await;
    }

    /// Close the session. Idempotent: only the first call after a
    /// successful start sends anything. The request runs on its own task,
    /// so it completes even if the caller is torn down mid-flight.
    pub async fn end(&self) {
        let (id, ticker, listeners) = {
            let mut state = self.inner.state();
            let Some(id) = state.session_id.take() else {
                return;
            };
            (id, state.ticker.take(), std::mem::take(&mut state.listeners))
        };
        if let Some(ticker) = ticker {
            ticker.abort();
        }
        for listener in listeners {
            self.inner.env.unsubscribe(listener);
        }

        let backend = self.inner.backend.clone();
        let session = SessionRef { session_id: id.clone() };
        let delivery = tokio::spawn(async move { backend.end(&session).await });
        match delivery.await {
            Ok(Ok(())) => info(Domain::Session, "ended", obj(&[("session_id", v_str(&id))])),
            Ok(Err(err)) => log_call_failed(Domain::Session, "end", &err),
            Err(err) => warn(
                Domain::Session,
                "end_task_failed",
                obj(&[("session_id", v_str(&id)), ("error", v_str(&err.to_string()))]),
            ),
        }
    }

    /// Host teardown.
    pub async fn shutdown(&self) {
        self.end().await;
    }

    pub async fn stats(&self, query: StatsQuery) -> Result<StatsReport> {
        agg_increment("stats_fetch");
        self.inner.backend.stats(&query).await
    }

    pub async fn stats_today(&self) -> Result<StatsReport> {
        self.stats(StatsQuery::Today).await
    }

    pub async fn stats_day(&self, day: NaiveDate) -> Result<StatsReport> {
        self.stats(StatsQuery::Day(day)).await
    }

    pub async fn stats_range(&self, from: NaiveDate, to: NaiveDate) -> Result<StatsReport> {
        self.stats(StatsQuery::range(from, to)?).await
    }

    fn register_listeners(&self) -> Vec<ListenerId> {
        let weak = Arc::downgrade(&self.inner);
        let on_leave: PageHandler = Arc::new(move |event: &PageEvent| {
            let Some(inner) = weak.upgrade() else { return };
            let client = SessionClient { inner };
            let event = format!("{:?}", event);
            spawn_detached("end", async move {
                debug(Domain::Session, "page_leaving", obj(&[("event", v_str(&event))]));
                client.end().await;
            });
        });

        let weak = Arc::downgrade(&self.inner);
        let on_visibility: PageHandler = Arc::new(move |event: &PageEvent| {
            if *event != PageEvent::VisibilityChange(Visibility::Visible) {
                return;
            }
            let Some(inner) = weak.upgrade() else { return };
            spawn_detached("heartbeat", async move { inner.heartbeat().await });
        });

        let env = &self.inner.env;
        vec![
            env.subscribe(PageEventKind::PageHide, on_leave.clone()),
            env.subscribe(PageEventKind::BeforeUnload, on_leave),
            env.subscribe(PageEventKind::VisibilityChange, on_visibility),
        ]
    }
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn heartbeat(&self) {
        let Some(session_id) = self.state().session_id.clone() else {
            return;
        };
        let session = SessionRef { session_id };
        match self.backend.heartbeat(&session).await {
            Ok(()) => agg_increment("heartbeat"),
            Err(err) => {
                agg_increment("heartbeat_failure");
                debug(
                    Domain::Session,
                    "heartbeat_failed",
                    obj(&[
                        ("session_id", v_str(&session.session_id)),
                        ("error", v_str(&format!("{:#}", err))),
                    ]),
                );
            }
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(|e| e.into_inner());
        if let Some(ticker) = state.ticker.take() {
            ticker.abort();
        }
        for listener in state.listeners.drain(..) {
            self.env.unsubscribe(listener);
        }
    }
}

/// First tick fires immediately. Each heartbeat runs on its own task so
/// aborting the ticker never cancels a request already in flight.
fn spawn_ticker(weak: Weak<Inner>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticks = tokio::time::interval(every);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticks.tick().await;
            let Some(inner) = weak.upgrade() else { break };
            tokio::spawn(async move { inner.heartbeat().await });
            tick_aggregator();
        }
    })
}

fn spawn_detached<F>(what: &'static str, fut: F)
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(fut);
        }
        Err(_) => warn(
            Domain::Session,
            "no_runtime",
            obj(&[("dropped", v_str(what))]),
        ),
    }
}
