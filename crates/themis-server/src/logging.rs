use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use tokio::sync::broadcast;

/// Log lines kept for replay to new `/api/logs` subscribers.
pub const RING_CAPACITY: usize = 500;

pub type LogRing = Arc<Mutex<VecDeque<String>>>;

/// Mirrors every event as a JSON line onto a broadcast channel and a
/// bounded history ring.
pub struct BroadcastLayer {
    pub tx: broadcast::Sender<String>,
    pub ring: LogRing,
}

#[derive(Default)]
struct EventVisitor {
    message: String,
    action: Option<String>,
}

impl tracing::field::Visit for EventVisitor {
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        match field.name() {
            "message" => self.message = value.to_string(),
            "action" => self.action = Some(value.to_string()),
            _ => {},
        }
    }

    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        let mut text = format!("{value:?}");
        // Strip surrounding quotes added by Debug on &str
        if text.len() >= 2 && text.starts_with('"') && text.ends_with('"') {
            text = text[1..text.len() - 1].to_string();
        }
        match field.name() {
            "message" => self.message = text,
            "action" => self.action = Some(text),
            _ => {},
        }
    }
}

fn category(target: &str) -> &'static str {
    if target.contains("dispatch") || target.contains("routes") {
        "dispatch"
    } else if target.contains("agent") || target.contains("gemini") {
        "provider"
    } else {
        "system"
    }
}

impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for BroadcastLayer {
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let level = match *event.metadata().level() {
            tracing::Level::ERROR => "err",
            tracing::Level::WARN => "warn",
            tracing::Level::INFO => "info",
            tracing::Level::DEBUG => "debug",
            tracing::Level::TRACE => return,
        };

        let mut visitor = EventVisitor::default();
        event.record(&mut visitor);

        let json = serde_json::json!({
            "ts": chrono::Utc::now().timestamp(),
            "level": level,
            "message": visitor.message,
            "category": category(event.metadata().target()),
            "action": visitor.action,
        })
        .to_string();

        let _ = self.tx.send(json.clone());
        if let Ok(mut ring) = self.ring.lock() {
            ring.push_back(json);
            if ring.len() > RING_CAPACITY {
                ring.pop_front();
            }
        }
    }
}
