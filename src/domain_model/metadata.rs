use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Session-level attributes carried alongside a persistent token and
/// across rotations. Unknown keys land in `extra` and pass through
/// untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_seen_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl SessionMetadata {
    pub fn is_empty(&self) -> bool {
        self.fingerprint.is_none() && self.first_seen_at.is_none() && self.extra.is_empty()
    }

    /// Copy values from `older` into fields that are still unset.
    /// Values already present always win.
    pub fn fill_gaps_from(&mut self, older: &SessionMetadata) {
        if self.fingerprint.is_none() {
            self.fingerprint = older.fingerprint.clone();
        }
        if self.first_seen_at.is_none() {
            self.first_seen_at = older.first_seen_at;
        }
        for (key, value) in &older.extra {
            self.extra
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
    }

    /// Merge `self` over `base`: on conflicts, `self` wins.
    pub fn merged_over(mut self, base: &SessionMetadata) -> SessionMetadata {
        self.fill_gaps_from(base);
        self
    }

    pub fn without_fingerprint(mut self) -> SessionMetadata {
        self.fingerprint = None;
        self
    }
}

/// The metadata envelope stored in a token record. `session_metadata`
/// is the only recognized key today; the flat `fingerprint` is the
/// pre-envelope legacy shape and is never written, only read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_metadata: Option<SessionMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl TokenMetadata {
    pub fn with_session(session: SessionMetadata) -> Self {
        TokenMetadata {
            session_metadata: Some(session),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn fill_gaps_keeps_live_values() {
        let mut live = SessionMetadata {
            first_seen_at: Some(at(100)),
            ..Default::default()
        };
        let older = SessionMetadata {
            fingerprint: Some("f1".into()),
            first_seen_at: Some(at(5)),
            ..Default::default()
        };
        live.fill_gaps_from(&older);

        assert_eq!(live.first_seen_at, Some(at(100)));
        assert_eq!(live.fingerprint, Some("f1".into()));
    }

    #[test]
    fn fill_gaps_fills_empty_bag() {
        let mut live = SessionMetadata::default();
        let older = SessionMetadata {
            first_seen_at: Some(at(5)),
            ..Default::default()
        };
        live.fill_gaps_from(&older);

        assert_eq!(live.first_seen_at, Some(at(5)));
    }

    #[test]
    fn fill_gaps_passes_unknown_keys_through() {
        let mut live = SessionMetadata::default();
        live.extra.insert("theme".into(), "dark".into());
        let mut older = SessionMetadata::default();
        older.extra.insert("theme".into(), "light".into());
        older.extra.insert("locale".into(), "fr".into());
        live.fill_gaps_from(&older);

        assert_eq!(live.extra["theme"], "dark");
        assert_eq!(live.extra["locale"], "fr");
    }

    #[test]
    fn merged_over_prefers_self() {
        let staged = SessionMetadata {
            fingerprint: Some("staged".into()),
            ..Default::default()
        };
        let base = SessionMetadata {
            fingerprint: Some("old".into()),
            first_seen_at: Some(at(5)),
            ..Default::default()
        };
        let merged = staged.merged_over(&base);

        assert_eq!(merged.fingerprint, Some("staged".into()));
        assert_eq!(merged.first_seen_at, Some(at(5)));
    }

    #[test]
    fn unknown_metadata_keys_round_trip() {
        let raw = r#"{"fingerprint":"f1","color_depth":24}"#;
        let parsed: SessionMetadata = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.extra["color_depth"], 24);

        let back = serde_json::to_value(&parsed).unwrap();
        assert_eq!(back["color_depth"], 24);
        assert_eq!(back["fingerprint"], "f1");
    }
}
