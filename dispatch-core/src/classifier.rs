//! Message Classifier & Admission Gate: sits between the broker's
//! decoded-payload stream and `Dispatcher::listen`. Validates payload
//! shape, tells task messages from service messages, and arbitrates
//! pool admission via ack/nack back-pressure.

use std::sync::Arc;

use tracing::warn;

use crate::broker::BrokerFrame;
use crate::dispatcher::Dispatcher;
use crate::model::{Metadata, ServiceMessage, TaskMessage};

const TASK_FIELDS: &[&str] = &["uuid", "type_event"];
const SERVICE_FIELDS: &[&str] = &["uuid", "command"];

fn field_set_matches(
    fields: &serde_json::Map<String, serde_json::Value>,
    required: &[&str],
) -> bool {
    let optional: &[&str] = if required == TASK_FIELDS { &["data"] } else { &[] };
    let keys: std::collections::BTreeSet<&str> = fields.keys().map(String::as_str).collect();
    required.iter().all(|f| keys.contains(f))
        && keys.iter().all(|k| required.contains(k) || optional.contains(k))
}

enum Classified {
    Task(TaskMessage),
    Service(ServiceMessage),
    Unknown,
}

/// Classify a decoded payload by exact field-name set equality,
/// service schema first. `None` means the payload wasn't even a
/// mapping (§4.8 step 1).
fn classify(payload: &serde_json::Value) -> Option<Classified> {
    let map = payload.as_object()?;
    if field_set_matches(map, SERVICE_FIELDS) {
        Some(
            serde_json::from_value::<ServiceMessage>(payload.clone())
                .map(Classified::Service)
                .unwrap_or(Classified::Unknown),
        )
    } else if field_set_matches(map, TASK_FIELDS) {
        Some(
            serde_json::from_value::<TaskMessage>(payload.clone())
                .map(Classified::Task)
                .unwrap_or(Classified::Unknown),
        )
    } else {
        Some(Classified::Unknown)
    }
}

/// Run one decoded frame through the classifier and admission gate,
/// committing it (ack/nack) according to §4.8.
pub async fn classify_and_admit(dispatcher: &Arc<Dispatcher>, frame: Box<dyn BrokerFrame>) {
    let Some(classified) = classify(frame.payload()) else {
        warn!("malformed payload: expected a mapping");
        frame.ack().await;
        return;
    };

    match classified {
        Classified::Service(service) => {
            dispatcher.listen(Metadata::Service(service)).await;
            frame.ack().await;
        }
        Classified::Task(task) if !dispatcher.pool_full().await => {
            dispatcher.listen(Metadata::Task(task)).await;
            frame.ack().await;
        }
        Classified::Task(_) => {
            // Pool is full: withhold the ack so the broker redelivers.
            frame.nack().await;
        }
        Classified::Unknown => {
            warn!("unknown payload shape");
            frame.ack().await;
        }
    }
}
