use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The wire type that travels between peers and through the relay.
///
/// Crypto fields (`nonce`, `ciphertext`, `signature`) are carried as plain
/// base64 strings rather than as the typed wrappers from the crypto layer —
/// this crate frames and moves bytes, it does not know what a nonce is.
/// Decoding and reconstructing the typed values is the delivery pipeline's
/// job, one layer up.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: EnvelopeKind,
    pub from: String,
    pub to: String,
    #[serde(with = "ts_rfc3339_seconds_z")]
    pub timestamp: DateTime<Utc>,
    pub nonce: String,
    pub ciphertext: String,
    pub signature: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvelopeKind {
    Message,
    Ack,
    Ping,
}

/// ISO-8601 UTC, seconds precision, `Z` suffix — not chrono's default
/// `Serialize` impl, which emits a `+00:00` offset and keeps any fractional
/// seconds.
mod ts_rfc3339_seconds_z {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Secs, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let s = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json() {
        let envelope = Envelope {
            kind: EnvelopeKind::Message,
            from: "alice".into(),
            to: "bob".into(),
            timestamp: Utc::now(),
            nonce: "bm9uY2U=".into(),
            ciphertext: "Y2lwaGVy".into(),
            signature: "c2ln".into(),
        };
        let json = serde_json::to_vec(&envelope).unwrap();
        let decoded: Envelope = serde_json::from_slice(&json).unwrap();
        assert_eq!(decoded.from, "alice");
        assert_eq!(decoded.kind, EnvelopeKind::Message);
    }

    #[test]
    fn wire_field_names_match_the_contract() {
        let envelope = Envelope {
            kind: EnvelopeKind::Ping,
            from: "alice".into(),
            to: "bob".into(),
            timestamp: Utc::now(),
            nonce: String::new(),
            ciphertext: String::new(),
            signature: String::new(),
        };
        let json: serde_json::Value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["type"], "ping");
        assert!(json.get("nonce").is_some());
        assert!(json.get("ciphertext").is_some());
        assert!(json.get("signature").is_some());
    }
}
