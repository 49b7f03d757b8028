//! In-memory feed transport for supervisor tests.
//!
//! `FakeDialer` hands out `FakeConnection`s according to a script. An
//! accepting connection answers a subscribe request the way the exchange
//! does: one `subscriptions` reply listing every channel with its own pairs
//! followed by the global pairs.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use gdax_stream_subscriber::{
    ChannelSettings, FeedConnection, FeedDialer, FixedClock, NormalizedConfig, Signer,
    SubscriptionBundle, TransportError, plan, validate,
};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub const FEED_URL: &str = "wss://feed.test";

/// What the next dial does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dial {
    /// Connect and acknowledge the subscription.
    Accept,
    /// Connect but never reply.
    Silent,
    /// Connect and reply with a different pair set.
    WrongPairs,
    /// Fail to connect.
    Refuse,
    /// Never finish connecting.
    Hang,
}

pub struct FakeConnection {
    mode: Dial,
    feed: mpsc::UnboundedSender<String>,
    inbound: tokio::sync::Mutex<mpsc::UnboundedReceiver<String>>,
    sent: Mutex<Vec<String>>,
    closed: CancellationToken,
    close_calls: AtomicUsize,
}

impl FakeConnection {
    fn new(mode: Dial) -> Self {
        let (feed, inbound) = mpsc::unbounded_channel();
        Self {
            mode,
            feed,
            inbound: tokio::sync::Mutex::new(inbound),
            sent: Mutex::new(Vec::new()),
            closed: CancellationToken::new(),
            close_calls: AtomicUsize::new(0),
        }
    }

    /// Queue a frame for the client to receive.
    pub fn push(&self, frame: &str) {
        let _ = self.feed.send(frame.to_string());
    }

    /// Frames the client sent, parsed.
    pub fn sent(&self) -> Vec<Value> {
        self.sent
            .lock()
            .iter()
            .map(|s| serde_json::from_str(s).unwrap())
            .collect()
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }
}

/// The reply the exchange gives to `request`.
fn acknowledge(request: &Value, wrong_pairs: bool) -> String {
    let globals: Vec<Value> = request["product_ids"].as_array().cloned().unwrap_or_default();
    let channels: Vec<Value> = request["channels"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| {
            let mut pairs = c["product_ids"].as_array().cloned().unwrap_or_default();
            pairs.extend(globals.iter().cloned());
            if wrong_pairs {
                pairs.push(json!("DOGE-USD"));
            }
            json!({"name": c["name"], "product_ids": pairs})
        })
        .collect();

    json!({"type": "subscriptions", "channels": channels}).to_string()
}

#[async_trait]
impl FeedConnection for FakeConnection {
    async fn send(&self, text: String) -> Result<(), TransportError> {
        if self.closed.is_cancelled() {
            return Err(TransportError::Closed);
        }

        let request: Value = serde_json::from_str(&text).unwrap();
        self.sent.lock().push(text);

        match self.mode {
            Dial::Accept => self.push(&acknowledge(&request, false)),
            Dial::WrongPairs => self.push(&acknowledge(&request, true)),
            _ => {}
        }
        Ok(())
    }

    async fn receive(&self) -> Result<String, TransportError> {
        let mut inbound = tokio::select! {
            () = self.closed.cancelled() => return Err(TransportError::Closed),
            guard = self.inbound.lock() => guard,
        };
        tokio::select! {
            () = self.closed.cancelled() => Err(TransportError::Closed),
            frame = inbound.recv() => frame.ok_or(TransportError::Closed),
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        self.closed.cancel();
        Ok(())
    }
}

/// Dialer that follows a script and remembers every connection it made.
pub struct FakeDialer {
    script: Mutex<VecDeque<Dial>>,
    dials: AtomicUsize,
    connections: Mutex<Vec<Arc<FakeConnection>>>,
}

impl FakeDialer {
    pub fn new(script: &[Dial]) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.iter().copied().collect()),
            dials: AtomicUsize::new(0),
            connections: Mutex::new(Vec::new()),
        })
    }

    pub fn dials(&self) -> usize {
        self.dials.load(Ordering::SeqCst)
    }

    pub fn connection(&self, index: usize) -> Arc<FakeConnection> {
        Arc::clone(&self.connections.lock()[index])
    }

    pub fn connections(&self) -> Vec<Arc<FakeConnection>> {
        self.connections.lock().clone()
    }
}

#[async_trait]
impl FeedDialer for FakeDialer {
    async fn dial(&self, url: &str) -> Result<Arc<dyn FeedConnection>, TransportError> {
        assert_eq!(url, FEED_URL);
        self.dials.fetch_add(1, Ordering::SeqCst);

        let mode = self.script.lock().pop_front().unwrap_or(Dial::Accept);
        match mode {
            Dial::Refuse => Err(TransportError::Connect("connection refused".to_string())),
            Dial::Hang => std::future::pending().await,
            _ => {
                let conn = Arc::new(FakeConnection::new(mode));
                self.connections.lock().push(Arc::clone(&conn));
                Ok(conn as Arc<dyn FeedConnection>)
            }
        }
    }
}

// =============================================================================
// Configurations
// =============================================================================

pub fn john() -> ChannelSettings {
    ChannelSettings::user(
        "John Smith",
        "a531631f192bf4778a19fbfbfae237a5",
        "a4446242132b34778a19fbfbfae237a5",
        "passphrase",
        &["BTC-USD"],
    )
}

pub fn jane() -> ChannelSettings {
    ChannelSettings::user(
        "Jane Smith",
        "b323431f192bf4778a19fbfbfbb237b5",
        "b4446242132b34778a19fbfbfae237b5",
        "passphrase",
        &[],
    )
}

pub fn normalized(global_pairs: &[&str], channels: &[ChannelSettings]) -> NormalizedConfig {
    let globals: Vec<String> = global_pairs.iter().map(ToString::to_string).collect();
    validate(FEED_URL, &globals, channels).unwrap()
}

pub fn bundles(global_pairs: &[&str], channels: &[ChannelSettings]) -> Vec<SubscriptionBundle> {
    plan(
        &normalized(global_pairs, channels),
        &Signer::new(FixedClock(1_500_000_000)),
    )
    .unwrap()
}

/// Poll `condition` until it holds or a second passes.
pub async fn eventually(condition: impl Fn() -> bool) -> bool {
    for _ in 0..100 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
