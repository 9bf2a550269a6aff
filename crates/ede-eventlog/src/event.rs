//! Event log model
//!
//! The ingestion collaborator hands over a table with three or four semantic
//! columns. [`EventLog`] keeps the column names ([`ColumnRoles`]) next to the
//! typed events so analysis code can be told which column means what.

use crate::coverage::CoverageProvenance;
use crate::error::{EventLogError, EventLogResult};
use chrono::{DateTime, NaiveDateTime, Utc};
use ede_artifact::ContentHash;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};

/// Column names carrying the case, activity, timestamp and resource roles
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnRoles {
    /// Case identifier column
    pub case_id: String,
    /// Activity label column
    pub activity: String,
    /// Event timestamp column
    pub timestamp: String,
    /// Resource column, if the log has one
    #[serde(default)]
    pub resource: Option<String>,
}

impl ColumnRoles {
    /// Roles with explicit column names and no resource
    #[must_use]
    pub fn new(
        case_id: impl Into<String>,
        activity: impl Into<String>,
        timestamp: impl Into<String>,
    ) -> Self {
        Self {
            case_id: case_id.into(),
            activity: activity.into(),
            timestamp: timestamp.into(),
            resource: None,
        }
    }

    /// Set the resource column
    #[inline]
    #[must_use]
    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    /// XES standard attribute names
    #[must_use]
    pub fn xes() -> Self {
        Self::new("case:concept:name", "concept:name", "time:timestamp")
            .with_resource("org:resource")
    }

    /// Column names of the usual CSV export
    #[must_use]
    pub fn csv() -> Self {
        Self::new("Case ID", "Activity", "Complete Timestamp").with_resource("Resource")
    }
}

impl Default for ColumnRoles {
    fn default() -> Self {
        Self::xes()
    }
}

/// One event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Case identifier
    pub case_id: String,
    /// Activity label
    pub activity: String,
    /// Completion timestamp
    pub timestamp: DateTime<Utc>,
    /// Resource / performer
    #[serde(default)]
    pub resource: Option<String>,
    /// Any further columns
    #[serde(default)]
    pub attributes: BTreeMap<String, Value>,
}

impl Event {
    /// Event without resource or extra attributes
    #[must_use]
    pub fn new(
        case_id: impl Into<String>,
        activity: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            case_id: case_id.into(),
            activity: activity.into(),
            timestamp,
            resource: None,
            attributes: BTreeMap::new(),
        }
    }

    /// Set resource
    #[inline]
    #[must_use]
    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }
}

/// One case: its id and its events in timestamp order
#[derive(Debug, Clone)]
pub struct Case<'a> {
    /// Case identifier
    pub id: &'a str,
    /// Events ordered by timestamp, ties kept in log order
    pub events: Vec<&'a Event>,
}

impl Case<'_> {
    /// Activity sequence of this case
    #[must_use]
    pub fn activities(&self) -> Vec<String> {
        self.events.iter().map(|e| e.activity.clone()).collect()
    }
}

/// Ordered, read-only collection of events
#[derive(Debug, Clone, PartialEq)]
pub struct EventLog {
    roles: ColumnRoles,
    events: Vec<Event>,
    provenance: Option<CoverageProvenance>,
}

impl EventLog {
    /// Create log from typed events
    ///
    /// # Errors
    /// Returns [`EventLogError::MissingField`] if an event has an empty case id
    /// or activity.
    pub fn new(roles: ColumnRoles, events: Vec<Event>) -> EventLogResult<Self> {
        for (index, event) in events.iter().enumerate() {
            if event.case_id.trim().is_empty() {
                return Err(EventLogError::missing_field(index, &roles.case_id));
            }
            if event.activity.trim().is_empty() {
                return Err(EventLogError::missing_field(index, &roles.activity));
            }
        }
        Ok(Self {
            roles,
            events,
            provenance: None,
        })
    }

    pub(crate) fn filtered(
        roles: ColumnRoles,
        events: Vec<Event>,
        provenance: CoverageProvenance,
    ) -> Self {
        Self {
            roles,
            events,
            provenance: Some(provenance),
        }
    }

    /// Parse JSON records as produced by the ingestion step.
    ///
    /// Case id and activity accept strings or numbers. Timestamps accept
    /// RFC 3339 or `YYYY-MM-DD HH:MM:SS[.f]` (read as UTC). Columns other than
    /// the roles become event attributes.
    ///
    /// # Errors
    /// Returns an error for null/missing role columns or unparsable timestamps.
    pub fn from_records(roles: ColumnRoles, records: Vec<Map<String, Value>>) -> EventLogResult<Self> {
        let mut events = Vec::with_capacity(records.len());
        for (index, mut record) in records.into_iter().enumerate() {
            let case_id = take_label(&mut record, &roles.case_id)
                .ok_or_else(|| EventLogError::missing_field(index, &roles.case_id))?;
            let activity = take_label(&mut record, &roles.activity)
                .ok_or_else(|| EventLogError::missing_field(index, &roles.activity))?;
            let raw_ts = take_label(&mut record, &roles.timestamp)
                .ok_or_else(|| EventLogError::missing_field(index, &roles.timestamp))?;
            let timestamp = parse_timestamp(&raw_ts).map_err(|message| {
                EventLogError::InvalidTimestamp {
                    index,
                    value: raw_ts.clone(),
                    message,
                }
            })?;
            let resource = roles
                .resource
                .as_ref()
                .and_then(|column| take_label(&mut record, column));
            events.push(Event {
                case_id,
                activity,
                timestamp,
                resource,
                attributes: record.into_iter().collect(),
            });
        }
        Self::new(roles, events)
    }

    /// Parse a JSON array of records
    ///
    /// # Errors
    /// Returns an error if the text is not an array of objects or a record is invalid.
    pub fn from_json_str(roles: ColumnRoles, json: &str) -> EventLogResult<Self> {
        let value: Value = serde_json::from_str(json)?;
        let Value::Array(items) = value else {
            return Err(EventLogError::Malformed("expected a JSON array".to_string()));
        };
        let records = items
            .into_iter()
            .enumerate()
            .map(|(i, item)| match item {
                Value::Object(map) => Ok(map),
                _ => Err(EventLogError::Malformed(format!("record {i} is not an object"))),
            })
            .collect::<EventLogResult<Vec<_>>>()?;
        Self::from_records(roles, records)
    }

    /// Records keyed by the role column names, timestamps as RFC 3339
    #[must_use]
    pub fn to_records(&self) -> Vec<Value> {
        self.events
            .iter()
            .map(|event| {
                let mut map: Map<String, Value> = event
                    .attributes
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                map.insert(self.roles.case_id.clone(), Value::from(event.case_id.as_str()));
                map.insert(self.roles.activity.clone(), Value::from(event.activity.as_str()));
                map.insert(
                    self.roles.timestamp.clone(),
                    Value::from(event.timestamp.to_rfc3339()),
                );
                if let Some(column) = &self.roles.resource {
                    map.insert(
                        column.clone(),
                        event.resource.as_deref().map_or(Value::Null, Value::from),
                    );
                }
                Value::Object(map)
            })
            .collect()
    }

    /// Column roles
    #[inline]
    #[must_use]
    pub fn roles(&self) -> &ColumnRoles {
        &self.roles
    }

    /// Events in log order
    #[inline]
    #[must_use]
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Number of events
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Check if log has no events
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Coverage filter that produced this log, if any
    #[inline]
    #[must_use]
    pub fn provenance(&self) -> Option<&CoverageProvenance> {
        self.provenance.as_ref()
    }

    /// Cases in order of first appearance
    #[must_use]
    pub fn cases(&self) -> Vec<Case<'_>> {
        let mut index: HashMap<&str, usize> = HashMap::new();
        let mut cases: Vec<Case<'_>> = Vec::new();
        for event in &self.events {
            let slot = *index.entry(event.case_id.as_str()).or_insert_with(|| {
                cases.push(Case {
                    id: event.case_id.as_str(),
                    events: Vec::new(),
                });
                cases.len() - 1
            });
            cases[slot].events.push(event);
        }
        for case in &mut cases {
            // stable: equal timestamps keep log order
            case.events.sort_by_key(|e| e.timestamp);
        }
        cases
    }

    /// Number of distinct cases
    #[must_use]
    pub fn case_count(&self) -> usize {
        self.cases().len()
    }

    /// Content identity of roles, events and coverage provenance
    #[must_use]
    pub fn fingerprint(&self) -> ContentHash {
        let mut parts: Vec<Vec<u8>> = vec![
            self.roles.case_id.clone().into_bytes(),
            self.roles.activity.clone().into_bytes(),
            self.roles.timestamp.clone().into_bytes(),
            self.roles.resource.clone().unwrap_or_default().into_bytes(),
        ];
        if let Some(p) = &self.provenance {
            parts.push(format!("coverage:{}:{}", p.threshold, p.source_cases).into_bytes());
        }
        for event in &self.events {
            parts.push(event.case_id.clone().into_bytes());
            parts.push(event.activity.clone().into_bytes());
            parts.push(event.timestamp.to_rfc3339().into_bytes());
            parts.push(event.resource.clone().unwrap_or_default().into_bytes());
            for (k, v) in &event.attributes {
                parts.push(format!("{k}={v}").into_bytes());
            }
        }
        ContentHash::compute_parts(parts.iter().map(Vec::as_slice))
    }
}

fn take_label(record: &mut Map<String, Value>, column: &str) -> Option<String> {
    match record.remove(column)? {
        Value::String(s) if !s.trim().is_empty() => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y/%m/%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(naive.and_utc());
        }
    }
    Err("expected RFC 3339 or 'YYYY-MM-DD HH:MM:SS'".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn records(value: Value) -> Vec<Map<String, Value>> {
        value
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_object().unwrap().clone())
            .collect()
    }

    #[test]
    fn from_records_maps_roles_and_attributes() {
        let roles = ColumnRoles::csv();
        let log = EventLog::from_records(
            roles,
            records(json!([
                {"Case ID": 1, "Activity": "Register", "Complete Timestamp": "2024-01-02 10:00:00", "Resource": "Ann", "cost": 5},
                {"Case ID": "1", "Activity": "Approve", "Complete Timestamp": "2024-01-02T11:00:00Z"}
            ])),
        )
        .unwrap();

        assert_eq!(log.len(), 2);
        let first = &log.events()[0];
        assert_eq!(first.case_id, "1");
        assert_eq!(first.resource.as_deref(), Some("Ann"));
        assert_eq!(first.attributes.get("cost"), Some(&json!(5)));
        assert_eq!(log.case_count(), 1);
    }

    #[test]
    fn from_records_rejects_null_activity() {
        let err = EventLog::from_records(
            ColumnRoles::csv(),
            records(json!([
                {"Case ID": "c1", "Activity": null, "Complete Timestamp": "2024-01-02 10:00:00"}
            ])),
        )
        .unwrap_err();
        assert!(matches!(err, EventLogError::MissingField { index: 0, ref column } if column == "Activity"));
    }

    #[test]
    fn from_records_rejects_bad_timestamp() {
        let err = EventLog::from_records(
            ColumnRoles::csv(),
            records(json!([
                {"Case ID": "c1", "Activity": "A", "Complete Timestamp": "yesterday"}
            ])),
        )
        .unwrap_err();
        assert!(matches!(err, EventLogError::InvalidTimestamp { index: 0, .. }));
    }

    #[test]
    fn from_json_str_requires_array() {
        let err = EventLog::from_json_str(ColumnRoles::xes(), "{}").unwrap_err();
        assert!(matches!(err, EventLogError::Malformed(_)));
    }

    #[test]
    fn cases_sort_events_by_timestamp() {
        let log = EventLog::new(
            ColumnRoles::xes(),
            vec![
                Event::new("c1", "B", ts(20)),
                Event::new("c2", "A", ts(0)),
                Event::new("c1", "A", ts(10)),
            ],
        )
        .unwrap();

        let cases = log.cases();
        assert_eq!(cases.len(), 2);
        assert_eq!(cases[0].id, "c1");
        assert_eq!(cases[0].activities(), vec!["A", "B"]);
    }

    #[test]
    fn to_records_roundtrips_through_from_records() {
        let roles = ColumnRoles::xes();
        let log = EventLog::new(
            roles.clone(),
            vec![Event::new("c1", "A", ts(0)).with_resource("r1")],
        )
        .unwrap();

        let back = EventLog::from_records(
            roles,
            log.to_records()
                .into_iter()
                .map(|v| v.as_object().unwrap().clone())
                .collect(),
        )
        .unwrap();
        assert_eq!(back, log);
    }

    #[test]
    fn fingerprint_tracks_content() {
        let a = EventLog::new(ColumnRoles::xes(), vec![Event::new("c1", "A", ts(0))]).unwrap();
        let b = EventLog::new(ColumnRoles::xes(), vec![Event::new("c1", "A", ts(0))]).unwrap();
        let c = EventLog::new(ColumnRoles::xes(), vec![Event::new("c1", "B", ts(0))]).unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
    }
}
