//! Page environment capability.
//!
//! The session client never talks to the host directly: page lifecycle
//! events, the device snapshot and the page hostname all come through
//! [`PageEnvironment`], so tests can drive the same client with scripted
//! events.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::config::Config;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Visible,
    Hidden,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageEvent {
    PageHide,
    BeforeUnload,
    VisibilityChange(Visibility),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageEventKind {
    PageHide,
    BeforeUnload,
    VisibilityChange,
}

impl PageEvent {
    pub fn kind(&self) -> PageEventKind {
        match self {
            PageEvent::PageHide => PageEventKind::PageHide,
            PageEvent::BeforeUnload => PageEventKind::BeforeUnload,
            PageEvent::VisibilityChange(_) => PageEventKind::VisibilityChange,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

pub type PageHandler = Arc<dyn Fn(&PageEvent) + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenSize {
    pub width: u32,
    pub height: u32,
}

/// Static snapshot sent with every session start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub user_agent: String,
    pub platform: String,
    pub language: String,
    pub screen: ScreenSize,
    pub timezone: String,
}

pub trait PageEnvironment: Send + Sync {
    fn subscribe(&self, kind: PageEventKind, handler: PageHandler) -> ListenerId;
    /// Returns false when the id was not registered.
    fn unsubscribe(&self, id: ListenerId) -> bool;
    fn device(&self) -> DeviceInfo;
    fn hostname(&self) -> String;
}

// =============================================================================
// Host environment
// =============================================================================

struct Listener {
    id: ListenerId,
    kind: PageEventKind,
    handler: PageHandler,
}

/// Environment for a native host process. Lifecycle events are injected by
/// whoever owns the process (signal handlers, a UI shell, tests) through
/// [`HostEnvironment::dispatch`].
pub struct HostEnvironment {
    device: DeviceInfo,
    hostname: String,
    next_id: AtomicU64,
    listeners: Mutex<Vec<Listener>>,
}

impl HostEnvironment {
    pub fn new(cfg: &Config) -> Self {
        let device = DeviceInfo {
            user_agent: format!(
                "{}/{} ({}; {})",
                env!("CARGO_PKG_NAME"),
                env!("CARGO_PKG_VERSION"),
                std::env::consts::OS,
                std::env::consts::ARCH
            ),
            platform: std::env::consts::OS.to_string(),
            language: language_from_locale(std::env::var("LANG").ok().as_deref()),
            screen: ScreenSize {
                width: cfg.screen_width,
                height: cfg.screen_height,
            },
            timezone: std::env::var("TZ")
                .ok()
                .filter(|tz| !tz.is_empty())
                .unwrap_or_else(|| "UTC".to_string()),
        };
        Self::with_device(&cfg.page_host, device)
    }

    pub fn with_device(hostname: &str, device: DeviceInfo) -> Self {
        Self {
            device,
            hostname: hostname.to_string(),
            next_id: AtomicU64::new(1),
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Invoke every handler subscribed to the event's kind, in
    /// subscription order. Returns how many handlers ran.
    pub fn dispatch(&self, event: PageEvent) -> usize {
        // Handlers may unsubscribe themselves, so run them outside the lock.
        let handlers: Vec<PageHandler> = {
            let listeners = self.listeners.lock().unwrap_or_else(|e| e.into_inner());
            listeners
                .iter()
                .filter(|l| l.kind == event.kind())
                .map(|l| l.handler.clone())
                .collect()
        };
        for handler in &handlers {
            handler(&event);
        }
        handlers.len()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl PageEnvironment for HostEnvironment {
    fn subscribe(&self, kind: PageEventKind, handler: PageHandler) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Listener { id, kind, handler });
        id
    }

    fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock().unwrap_or_else(|e| e.into_inner());
        let before = listeners.len();
        listeners.retain(|l| l.id != id);
        listeners.len() != before
    }

    fn device(&self) -> DeviceInfo {
        self.device.clone()
    }

    fn hostname(&self) -> String {
        self.hostname.clone()
    }
}

/// `en_US.UTF-8` -> `en-US`
fn language_from_locale(locale: Option<&str>) -> String {
    match locale {
        Some(raw) if !raw.is_empty() && raw != "C" && raw != "POSIX" => {
            let base = raw.split(['.', '@']).next().unwrap_or(raw);
            base.replace('_', "-")
        }
        _ => "en-US".to_string(),
    }
}
