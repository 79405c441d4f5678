use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 广播给客户端的全量快照，不是增量
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceSnapshot {
    #[serde(alias = "onlineCount")]
    pub online_total: i64,
    #[serde(default)]
    pub song_listeners: BTreeMap<String, i64>,
}

impl PresenceSnapshot {
    pub fn encode(&self) -> Result<String, AppError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode(message: &str) -> Result<Self, AppError> {
        Ok(serde_json::from_str(message)?)
    }

    pub fn listeners_of(&self, song_id: &str) -> i64 {
        self.song_listeners.get(song_id).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_field_names() {
        let snapshot = PresenceSnapshot {
            online_total: 3,
            song_listeners: BTreeMap::from([("A".to_string(), 2), ("B".to_string(), 1)]),
        };
        let json: serde_json::Value = serde_json::from_str(&snapshot.encode().unwrap()).unwrap();
        assert_eq!(json["onlineTotal"], 3);
        assert_eq!(json["songListeners"]["A"], 2);
    }

    #[test]
    fn test_decode_accepts_legacy_online_count() {
        let snapshot = PresenceSnapshot::decode(r#"{"onlineCount":5,"songListeners":{}}"#).unwrap();
        assert_eq!(snapshot.online_total, 5);
        assert_eq!(snapshot.listeners_of("missing"), 0);
    }
}
