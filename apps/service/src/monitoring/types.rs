use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome classification of a single probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Classification {
    Online,
    Secured,
    NotFound,
    ServerError,
    Other,
    Unreachable,
}

impl Classification {
    /// Classify an HTTP status code. First match wins.
    pub fn from_status(code: u16) -> Self {
        match code {
            200 => Self::Online,
            401 | 403 => Self::Secured,
            404 => Self::NotFound,
            500.. => Self::ServerError,
            _ => Self::Other,
        }
    }

    /// CSS class the dashboard uses for this outcome.
    pub fn status_class(self) -> &'static str {
        match self {
            Self::Online => "success",
            Self::Secured => "warning",
            Self::NotFound => "info",
            Self::ServerError | Self::Unreachable => "danger",
            Self::Other => "secondary",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Classification::Online => write!(f, "ONLINE"),
            Classification::Secured => write!(f, "SECURED (UP)"),
            Classification::NotFound => write!(f, "NOT FOUND"),
            Classification::ServerError => write!(f, "SERVER ERROR"),
            Classification::Other => write!(f, "OTHER"),
            Classification::Unreachable => write!(f, "UNREACHABLE"),
        }
    }
}

/// Which endpoint of a jurisdiction was probed. Only the main API is probed today.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProbeKind {
    #[default]
    Main,
}

/// Result of one probe attempt against one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StoredProbeResult", into = "StoredProbeResult")]
pub struct ProbeResult {
    pub target_id: String,
    pub kind: ProbeKind,
    /// HTTP status code, `0` when the target could not be reached.
    pub status_code: u16,
    pub classification: Classification,
    pub latency_ms: u64,
    pub error_note: Option<String>,
}

impl ProbeResult {
    /// A probe that received an HTTP response.
    pub fn from_status(target_id: impl Into<String>, status_code: u16, latency_ms: u64) -> Self {
        Self {
            target_id: target_id.into(),
            kind: ProbeKind::Main,
            status_code,
            classification: Classification::from_status(status_code),
            latency_ms,
            error_note: None,
        }
    }

    /// A probe that never got a response.
    pub fn unreachable(target_id: impl Into<String>, latency_ms: u64, note: impl Into<String>) -> Self {
        Self {
            target_id: target_id.into(),
            kind: ProbeKind::Main,
            status_code: 0,
            classification: Classification::Unreachable,
            latency_ms,
            error_note: Some(note.into()),
        }
    }

    /// Human readable label, e.g. `SECURED (UP)` or `CODE: 302`.
    pub fn label(&self) -> String {
        match self.classification {
            Classification::Other => format!("CODE: {}", self.status_code),
            other => other.to_string(),
        }
    }
}

/// Persisted layout of a probe result: `{state, type, code, statusClass, duration, error?}`.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredProbeResult {
    state: String,
    #[serde(rename = "type", default)]
    kind: ProbeKind,
    code: u16,
    #[serde(default)]
    status_class: String,
    duration: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl From<StoredProbeResult> for ProbeResult {
    fn from(stored: StoredProbeResult) -> Self {
        // Older files never stored the classification; it is derived from the code.
        let classification = if stored.code == 0 {
            Classification::Unreachable
        } else {
            Classification::from_status(stored.code)
        };

        Self {
            target_id: stored.state,
            kind: stored.kind,
            status_code: stored.code,
            classification,
            latency_ms: stored.duration,
            error_note: stored.error,
        }
    }
}

impl From<ProbeResult> for StoredProbeResult {
    fn from(result: ProbeResult) -> Self {
        Self {
            status_class: result.classification.status_class().to_string(),
            state: result.target_id,
            kind: result.kind,
            code: result.status_code,
            duration: result.latency_ms,
            error: result.error_note,
        }
    }
}

/// Per-target slot of a snapshot. `main` is `None` only in legacy files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetEntry {
    pub main: Option<ProbeResult>,
}

/// Results of one round, keyed by target id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(with = "iso_millis")]
    timestamp: DateTime<Utc>,
    #[serde(rename = "states")]
    results: BTreeMap<String, TargetEntry>,
}

impl Snapshot {
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self { timestamp, results: BTreeMap::new() }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Timestamp in the ISO-8601 form used on disk and over HTTP.
    pub fn timestamp_iso(&self) -> String {
        iso_millis::format(&self.timestamp)
    }

    /// Record a result. A second result for the same target replaces the first.
    pub fn insert(&mut self, result: ProbeResult) {
        self.results.insert(result.target_id.clone(), TargetEntry { main: Some(result) });
    }

    pub fn result(&self, target_id: &str) -> Option<&ProbeResult> {
        self.results.get(target_id).and_then(|entry| entry.main.as_ref())
    }

    /// Entries in ascending target id order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, Option<&ProbeResult>)> {
        self.results.iter().map(|(id, entry)| (id.as_str(), entry.main.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn summary(&self) -> RoundSummary {
        let mut summary = RoundSummary::default();
        for (_, result) in self.entries() {
            summary.total += 1;
            match result.map(|r| r.classification) {
                Some(Classification::Online) => summary.online += 1,
                Some(Classification::Secured) => summary.secured += 1,
                Some(Classification::NotFound) => summary.not_found += 1,
                Some(Classification::ServerError) => summary.server_error += 1,
                Some(Classification::Other) => summary.other += 1,
                Some(Classification::Unreachable) | None => summary.unreachable += 1,
            }
        }
        summary
    }
}

/// Counts per classification for one snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoundSummary {
    pub total: usize,
    pub online: usize,
    pub secured: usize,
    pub not_found: usize,
    pub server_error: usize,
    pub other: usize,
    pub unreachable: usize,
}

/// RFC 3339 timestamps with millisecond precision and a `Z` suffix.
mod iso_millis {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn format(timestamp: &DateTime<Utc>) -> String {
        timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    pub fn serialize<S: Serializer>(timestamp: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(timestamp))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|timestamp| timestamp.with_timezone(&Utc))
            .map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_classification_order() {
        assert_eq!(Classification::from_status(200), Classification::Online);
        assert_eq!(Classification::from_status(401), Classification::Secured);
        assert_eq!(Classification::from_status(403), Classification::Secured);
        assert_eq!(Classification::from_status(404), Classification::NotFound);
        assert_eq!(Classification::from_status(500), Classification::ServerError);
        assert_eq!(Classification::from_status(503), Classification::ServerError);
        assert_eq!(Classification::from_status(204), Classification::Other);
        assert_eq!(Classification::from_status(302), Classification::Other);
        assert_eq!(Classification::from_status(418), Classification::Other);
    }

    #[test]
    fn test_labels() {
        assert_eq!(ProbeResult::from_status("ca", 403, 10).label(), "SECURED (UP)");
        assert_eq!(ProbeResult::from_status("ca", 302, 10).label(), "CODE: 302");
        assert_eq!(ProbeResult::unreachable("ca", 10, "Unreachable").label(), "UNREACHABLE");
    }

    #[test]
    fn test_probe_result_wire_layout() {
        let result = ProbeResult::from_status("ca", 403, 120);
        let value = serde_json::to_value(&result).unwrap();

        assert_eq!(
            value,
            serde_json::json!({
                "state": "ca",
                "type": "Main",
                "code": 403,
                "statusClass": "warning",
                "duration": 120
            })
        );
    }

    #[test]
    fn test_unreachable_wire_layout_carries_error() {
        let result = ProbeResult::unreachable("ak", 5000, "Unreachable");
        let value = serde_json::to_value(&result).unwrap();

        assert_eq!(value["code"], 0);
        assert_eq!(value["statusClass"], "danger");
        assert_eq!(value["error"], "Unreachable");
    }

    #[test]
    fn test_legacy_snapshot_parses() {
        let raw = r#"{
            "timestamp": "2024-03-01T09:00:00.123Z",
            "states": {
                "ak": { "main": { "state": "ak", "type": "Main", "code": 0, "statusClass": "danger", "duration": 5003, "error": "Unreachable" } },
                "ca": { "main": { "state": "ca", "type": "Main", "code": 401, "statusClass": "warning", "duration": 87 } },
                "gu": { "main": null }
            }
        }"#;

        let snapshot: Snapshot = serde_json::from_str(raw).unwrap();

        assert_eq!(snapshot.timestamp(), Utc.timestamp_millis_opt(1_709_283_600_123).unwrap());
        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot.result("ak").unwrap().classification, Classification::Unreachable);
        assert_eq!(snapshot.result("ca").unwrap().classification, Classification::Secured);
        assert!(snapshot.result("gu").is_none());
        assert_eq!(snapshot.timestamp_iso(), "2024-03-01T09:00:00.123Z");
    }

    #[test]
    fn test_insert_is_last_writer_wins() {
        let mut snapshot = Snapshot::new(Utc::now());
        snapshot.insert(ProbeResult::from_status("ny", 200, 5));
        snapshot.insert(ProbeResult::from_status("ny", 503, 9));

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.result("ny").unwrap().status_code, 503);
    }

    #[test]
    fn test_entries_sorted_and_summarised() {
        let mut snapshot = Snapshot::new(Utc::now());
        snapshot.insert(ProbeResult::from_status("wv", 200, 5));
        snapshot.insert(ProbeResult::unreachable("ak", 5000, "Unreachable"));
        snapshot.insert(ProbeResult::from_status("mo", 404, 7));

        let ids: Vec<_> = snapshot.entries().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["ak", "mo", "wv"]);

        let summary = snapshot.summary();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.online, 1);
        assert_eq!(summary.not_found, 1);
        assert_eq!(summary.unreachable, 1);
    }
}
