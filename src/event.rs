use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single pipeline event. Produced once, serialized onto the topic,
/// decoded again on the consumer side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Globally unique identifier, also used as the partitioning key.
    pub id: String,
    /// Human-readable label derived from the producing task and its
    /// per-task sequence number.
    pub name: String,
}

impl Event {
    /// Build the next event for a producer task.
    pub fn next(producer_id: &str, sequence: u64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: format!("Event-{}-{}", producer_id, sequence),
        }
    }

    /// Serialize into the wire payload.
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Parse an event back out of a wire payload.
    pub fn decode(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_next_event_name_format() {
        let event = Event::next("producer1", 0);
        assert_eq!(event.name, "Event-producer1-0");

        let event = Event::next("producer2", 41);
        assert_eq!(event.name, "Event-producer2-41");
    }

    #[test]
    fn test_next_event_ids_are_unique() {
        let first = Event::next("producer1", 0);
        let second = Event::next("producer1", 0);
        assert_ne!(first.id, second.id);
    }

    #[test]
    fn test_next_event_id_is_a_uuid() {
        let event = Event::next("producer1", 7);
        assert!(Uuid::parse_str(&event.id).is_ok());
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let event = Event::next("producer1", 3);
        let bytes = event.encode().unwrap();
        let decoded = Event::decode(&bytes).unwrap();
        assert_eq!(decoded, event);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(Event::decode(b"not json at all").is_err());
        assert!(Event::decode(b"").is_err());
    }

    #[test]
    fn test_decode_rejects_missing_fields() {
        assert!(Event::decode(br#"{"id":"only-an-id"}"#).is_err());
    }

    proptest! {
        #[test]
        fn prop_roundtrip_preserves_any_event(id in ".*", name in ".*") {
            let event = Event { id, name };
            let bytes = event.encode().unwrap();
            let decoded = Event::decode(&bytes).unwrap();
            prop_assert_eq!(decoded, event);
        }
    }
}
