//! Events pushed to live subscribers.
//!
//! The serialized form is internally tagged on `type`, so a transport can
//! forward `serde_json::to_string(&event)` to a browser unchanged:
//!
//! ```json
//! {"type":"generations","generations":[{"timestamp":1,"value":2}]}
//! {"type":"new-generation","generation":{"timestamp":3,"value":4}}
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::generation::GenerationRecord;

/// A message delivered to a subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "type", rename_all = "kebab-case")]
#[ts(export, export_to = "bindings/")]
pub enum SubscriberEvent {
    /// The recent history window, sent once right after registration.
    Generations {
        /// Most recent records, oldest first.
        generations: Vec<GenerationRecord>,
    },
    /// A record produced by the latest tick.
    NewGeneration {
        /// The freshly appended record.
        generation: GenerationRecord,
    },
}

impl SubscriberEvent {
    /// Build a backlog event from a history window.
    pub fn backlog(generations: &[GenerationRecord]) -> Self {
        Self::Generations {
            generations: generations.to_vec(),
        }
    }

    /// Build a per-tick event.
    pub const fn new_generation(generation: GenerationRecord) -> Self {
        Self::NewGeneration { generation }
    }

    /// The tag value used on the wire.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Generations { .. } => "generations",
            Self::NewGeneration { .. } => "new-generation",
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn new_generation_wire_format() {
        let event = SubscriberEvent::new_generation(GenerationRecord::new(10, 42));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "new-generation",
                "generation": {"timestamp": 10, "value": 42}
            })
        );
        assert_eq!(json["type"], event.kind());
    }

    #[test]
    fn backlog_wire_format() {
        let records = [GenerationRecord::new(1, 2), GenerationRecord::new(3, 4)];
        let event = SubscriberEvent::backlog(&records);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "generations");
        assert_eq!(json["generations"].as_array().unwrap().len(), 2);
        assert_eq!(event.kind(), "generations");
    }
}
