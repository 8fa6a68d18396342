//! Request vocabulary shared between the bus codec and the dispatcher
//! contract.

use serde::{Deserialize, Serialize};

/// Direction of a hall call.
///
/// Wire labels are the dispatcher's Spanish vocabulary. `Stopped` is part
/// of the vocabulary but never originates from a hall button.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallDirection {
    #[serde(rename = "SUBIENDO")]
    Up,
    #[serde(rename = "BAJANDO")]
    Down,
    #[serde(rename = "PARADO")]
    Stopped,
}

/// Incident vocabulary for emergency calls.
///
/// The bus carries these as codes 1..=5 in declaration order; the
/// dispatcher contract carries the English labels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmergencyKind {
    #[serde(rename = "EMERGENCY_STOP")]
    EmergencyStop,
    #[serde(rename = "POWER_FAILURE")]
    PowerFailure,
    #[serde(rename = "PEOPLE_TRAPPED")]
    PeopleTrapped,
    #[serde(rename = "MECHANICAL_FAILURE")]
    MechanicalFailure,
    #[serde(rename = "FIRE_ALARM")]
    FireAlarm,
}

impl EmergencyKind {
    /// Convert a bus wire code to an `EmergencyKind`.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::EmergencyStop),
            2 => Some(Self::PowerFailure),
            3 => Some(Self::PeopleTrapped),
            4 => Some(Self::MechanicalFailure),
            5 => Some(Self::FireAlarm),
            _ => None,
        }
    }

    /// The bus wire code of this kind.
    pub fn code(&self) -> u8 {
        match self {
            Self::EmergencyStop => 1,
            Self::PowerFailure => 2,
            Self::PeopleTrapped => 3,
            Self::MechanicalFailure => 4,
            Self::FireAlarm => 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_direction_wire_labels() {
        assert_eq!(
            serde_json::to_string(&CallDirection::Up).expect("serialize"),
            "\"SUBIENDO\""
        );
        assert_eq!(
            serde_json::to_string(&CallDirection::Down).expect("serialize"),
            "\"BAJANDO\""
        );
        assert_eq!(
            serde_json::to_string(&CallDirection::Stopped).expect("serialize"),
            "\"PARADO\""
        );
    }

    #[test]
    fn test_emergency_kind_codes_roundtrip() {
        for code in 1..=5u8 {
            let kind = EmergencyKind::from_code(code).expect("valid code");
            assert_eq!(kind.code(), code);
        }
        assert!(EmergencyKind::from_code(0).is_none());
        assert!(EmergencyKind::from_code(6).is_none());
    }

    #[test]
    fn test_emergency_kind_wire_labels() {
        assert_eq!(
            serde_json::to_string(&EmergencyKind::PeopleTrapped).expect("serialize"),
            "\"PEOPLE_TRAPPED\""
        );
        let parsed: EmergencyKind =
            serde_json::from_str("\"FIRE_ALARM\"").expect("parse");
        assert_eq!(parsed, EmergencyKind::FireAlarm);
    }
}
