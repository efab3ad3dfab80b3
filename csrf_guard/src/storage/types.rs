use serde::{Deserialize, Serialize};

/// Raw payload persisted by a token store backend.
///
/// Token records are serialized to JSON before they reach a backend, so every
/// backend only ever moves opaque strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheData {
    pub value: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_data_round_trip() {
        // Given a CacheData payload
        let data = CacheData {
            value: "{\"current\":\"ABCD\"}".to_string(),
        };

        // When serializing and deserializing it
        let json = serde_json::to_string(&data).expect("Failed to serialize CacheData");
        let back: CacheData = serde_json::from_str(&json).expect("Failed to deserialize CacheData");

        // Then the payload survives unchanged
        assert_eq!(back.value, data.value);
    }

    #[test]
    fn test_cache_data_clone_is_independent() {
        // Given a CacheData payload
        let data = CacheData {
            value: "original".to_string(),
        };

        // When cloning and mutating the clone
        let mut cloned = data.clone();
        cloned.value = "modified".to_string();

        // Then the original is unaffected
        assert_eq!(data.value, "original");
        assert_eq!(cloned.value, "modified");
    }
}
