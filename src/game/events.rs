//! Events broadcast to every connected client

use serde::{Deserialize, Serialize};

/// Engine events fanned out over the WebSocket, tagged JSON on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum GameEvent {
    /// A round left the betting window and its multiplier started climbing
    #[serde(rename = "round_start")]
    RoundStart {
        round_id: String,
        /// Commitment to the crash point, verifiable once the seed is revealed
        fairness_hash: String,
    },
    /// Periodic multiplier announcement while the round runs
    #[serde(rename = "multiplier_update")]
    MultiplierUpdate { multiplier: f64 },
    /// The round ended; the seed is revealed for verification
    #[serde(rename = "round_crash")]
    RoundCrash { crash_point: f64, seed: String },
    /// A player settled their bet mid-round
    #[serde(rename = "player_cashed_out")]
    PlayerCashedOut {
        username: String,
        cashout_multiplier: f64,
        payout_usd: f64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_round_start_wire_shape() {
        let event = GameEvent::RoundStart {
            round_id: "0a0b0c0d-0000-0000-0000-000000000001".to_string(),
            fairness_hash: "d90dfb84".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({
                "type": "round_start",
                "round_id": "0a0b0c0d-0000-0000-0000-000000000001",
                "fairness_hash": "d90dfb84",
            })
        );
    }

    #[test]
    fn test_multiplier_update_wire_shape() {
        let event = GameEvent::MultiplierUpdate { multiplier: 2.35 };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({ "type": "multiplier_update", "multiplier": 2.35 })
        );
    }

    #[test]
    fn test_round_crash_reveals_seed() {
        let event = GameEvent::RoundCrash {
            crash_point: 6.51,
            seed: "a3f1".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({ "type": "round_crash", "crash_point": 6.51, "seed": "a3f1" })
        );
    }

    #[test]
    fn test_player_cashed_out_wire_shape() {
        let event = GameEvent::PlayerCashedOut {
            username: "satoshi".to_string(),
            cashout_multiplier: 2.35,
            payout_usd: 235.0,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "player_cashed_out");
        assert_eq!(value["username"], "satoshi");
        assert_eq!(value["payout_usd"], 235.0);
    }

    #[test]
    fn test_events_round_trip() {
        let event = GameEvent::RoundCrash {
            crash_point: 1.00,
            seed: "seed-57".to_string(),
        };
        let text = serde_json::to_string(&event).unwrap();
        let parsed: GameEvent = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, event);
    }
}
