//! tests/common/harness.rs
#![allow(dead_code)]

use async_trait::async_trait;
use front_gateway::{
    ConnectivityState, Dialer, Error, Result, RpcChannel, Unsubscribe, channel::DialParams,
};
use std::fmt;
use std::sync::{
    Arc, Mutex, Once,
    atomic::{AtomicUsize, Ordering},
};
use tracing::{
    Event, Subscriber,
    field::{Field, Visit},
};
use tracing_subscriber::{
    Layer,
    layer::{Context, SubscriberExt},
};

/// Initializes tracing for tests, ensuring it's only done once.
pub fn init_tracing() {
    static TRACING_INIT: Once = Once::new();
    TRACING_INIT.call_once(|| {
        let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "front_gateway=debug".to_string());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .init();
    });
}

/// Log lines recorded by [`capture_logs`], formatted as `LEVEL message`.
#[derive(Debug, Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<String>>>);

impl CapturedLogs {
    pub fn lines(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    /// Index of the first line containing `needle`.
    pub fn position(&self, needle: &str) -> Option<usize> {
        self.lines().iter().position(|line| line.contains(needle))
    }

    pub fn count(&self, needle: &str) -> usize {
        self.lines().iter().filter(|line| line.contains(needle)).count()
    }
}

struct CaptureLayer(CapturedLogs);

struct MessageVisitor(String);

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.0 = format!("{value:?}");
        }
    }
}

impl<S: Subscriber> Layer<S> for CaptureLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor(String::new());
        event.record(&mut visitor);
        let line = format!("{} {}", event.metadata().level(), visitor.0);
        (self.0).0.lock().unwrap().push(line);
    }
}

/// Captures every event on the current thread until the guard is dropped.
///
/// Works with the default current-thread test runtime, where spawned tasks
/// are polled on the test's thread.
pub fn capture_logs() -> (CapturedLogs, tracing::subscriber::DefaultGuard) {
    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::registry().with(CaptureLayer(logs.clone()));
    (logs, tracing::subscriber::set_default(subscriber))
}

/// Shared, externally controllable state of a [`MockChannel`].
#[derive(Debug)]
pub struct MockControl {
    pub target: String,
    pub params: DialParams,
    state: Mutex<ConnectivityState>,
    closes: AtomicUsize,
}

impl MockControl {
    pub fn set_state(&self, state: ConnectivityState) {
        *self.state.lock().unwrap() = state;
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

/// A channel whose state the test drives by hand.
#[derive(Debug)]
pub struct MockChannel(Arc<MockControl>);

#[async_trait]
impl RpcChannel for MockChannel {
    fn target(&self) -> &str {
        &self.0.target
    }

    fn state(&self) -> ConnectivityState {
        *self.0.state.lock().unwrap()
    }

    async fn close(&self) -> Result<()> {
        self.0.closes.fetch_add(1, Ordering::SeqCst);
        let mut state = self.0.state.lock().unwrap();
        if *state == ConnectivityState::Shutdown {
            return Err(Error::AlreadyClosed);
        }
        *state = ConnectivityState::Shutdown;
        Ok(())
    }
}

/// Hands out [`MockChannel`]s starting in CONNECTING and remembers them.
#[derive(Debug, Clone, Default)]
pub struct MockDialer {
    dialed: Arc<Mutex<Vec<Arc<MockControl>>>>,
}

impl MockDialer {
    /// The control handle of the channel dialed for `target`.
    pub fn control(&self, target: &str) -> Option<Arc<MockControl>> {
        self.dialed
            .lock()
            .unwrap()
            .iter()
            .find(|control| control.target == target)
            .cloned()
    }

    pub fn dial_count(&self) -> usize {
        self.dialed.lock().unwrap().len()
    }
}

impl Dialer for MockDialer {
    type Channel = MockChannel;

    fn dial(&self, target: &str, params: DialParams) -> Result<MockChannel> {
        let control = Arc::new(MockControl {
            target: target.to_string(),
            params,
            state: Mutex::new(ConnectivityState::Connecting),
            closes: AtomicUsize::new(0),
        });
        self.dialed.lock().unwrap().push(control.clone());
        Ok(MockChannel(control))
    }
}

/// A subscription that can be released exactly once. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct OnceSubscription {
    released: Arc<Mutex<bool>>,
}

#[async_trait]
impl Unsubscribe for OnceSubscription {
    async fn unsubscribe(&self) -> Result<()> {
        let mut released = self.released.lock().unwrap();
        if *released {
            return Err(Error::Unsubscribe("invalid subscription".to_string()));
        }
        *released = true;
        Ok(())
    }
}
