// src/gps/state.rs
//! Long-lived session state and the merge rules that fold records into it

use super::{
    convert::assemble_timestamp,
    data::{FieldValue, SatelliteTable, SatelliteView, SentenceKind, SentenceRecord},
};
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// How an incoming field combines with the value already held
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePolicy {
    /// The new value replaces the old one
    Overwrite,
    /// Nested tables are merged entry by entry; untouched entries persist
    MergeByKey,
}

/// Fields that do not simply overwrite; everything else uses [`MergePolicy::Overwrite`]
const MERGE_POLICIES: &[(&str, MergePolicy)] = &[("visible_satellites", MergePolicy::MergeByKey)];

pub fn merge_policy(key: &str) -> MergePolicy {
    MERGE_POLICIES
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, policy)| *policy)
        .unwrap_or(MergePolicy::Overwrite)
}

/// Result of offering a record to the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Merged(SentenceKind),
    /// Nothing usable in the record; read another sentence
    Retry,
}

/// The accumulated GPS picture for one session.
///
/// Keys are namespaced by the sentence kind that reports them (`rmc_latitude`
/// vs. `latitude`) so overlapping sentences do not clobber each other.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SessionState {
    fields: BTreeMap<String, FieldValue>,
}

impl SessionState {
    /// Fresh state, seeded with a 0/0 position
    pub fn new() -> Self {
        let mut fields = BTreeMap::new();
        fields.insert("latitude".to_string(), FieldValue::Decimal(0.0));
        fields.insert("longitude".to_string(), FieldValue::Decimal(0.0));
        Self { fields }
    }

    /// Fold a decoded record into the state
    pub fn merge(&mut self, record: SentenceRecord) -> MergeOutcome {
        if record.is_none() {
            return MergeOutcome::Retry;
        }

        let kind = record.kind;
        for (key, value) in record.into_fields() {
            if value.is_empty_text() {
                continue;
            }
            self.merge_field(key, value);
        }
        self.fields
            .insert("last_nmea".to_string(), FieldValue::Text(kind.code().to_string()));

        MergeOutcome::Merged(kind)
    }

    fn merge_field(&mut self, key: String, value: FieldValue) {
        match (merge_policy(&key), value) {
            (MergePolicy::MergeByKey, FieldValue::Satellites(incoming)) => {
                match self.fields.get_mut(&key) {
                    Some(FieldValue::Satellites(existing)) => existing.extend(incoming),
                    _ => {
                        self.fields.insert(key, FieldValue::Satellites(incoming));
                    }
                }
            }
            (_, value) => {
                self.fields.insert(key, value);
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(FieldValue::as_text)
    }

    pub fn decimal(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(FieldValue::as_decimal)
    }

    pub fn integer(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(FieldValue::as_integer)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.fields.iter()
    }

    /// Kind code of the last merged sentence
    pub fn last_nmea(&self) -> Option<&str> {
        self.text("last_nmea")
    }

    /// Ids of the satellites used in the fix, in GSA slot order
    pub fn active_satellites(&self) -> &[String] {
        self.get("active_satellites")
            .and_then(FieldValue::as_list)
            .unwrap_or_default()
    }

    pub fn visible_satellites(&self) -> Option<&SatelliteTable> {
        self.get("visible_satellites").and_then(FieldValue::as_satellites)
    }

    /// Active satellites that have been seen in a GSV sentence, with their slot index
    pub fn active_satellite_views(&self) -> Vec<(usize, &str, &SatelliteView)> {
        let visible = match self.visible_satellites() {
            Some(visible) => visible,
            None => return Vec::new(),
        };

        self.active_satellites()
            .iter()
            .enumerate()
            .filter_map(|(index, id)| visible.get(id).map(|view| (index, id.as_str(), view)))
            .collect()
    }

    /// UTC instant from the shared `time` and `date` fields (GGA/ZDA)
    pub fn date_time(&self) -> Result<Option<DateTime<Utc>>> {
        assemble_timestamp(self.text("time"), self.text("date"))
    }

    /// UTC instant from the RMC `rmc_time` and `rmc_date` fields
    pub fn rmc_date_time(&self) -> Result<Option<DateTime<Utc>>> {
        assemble_timestamp(self.text("rmc_time"), self.text("rmc_date"))
    }

    /// Position with hemisphere applied: north and east positive
    pub fn signed_position(&self) -> Option<(f64, f64)> {
        let latitude = self.decimal("latitude")?;
        let longitude = self.decimal("longitude")?;

        let lat_sign = if self.text("lat_ref") == Some("N") { 1.0 } else { -1.0 };
        let long_sign = if self.text("long_ref") == Some("E") { 1.0 } else { -1.0 };

        Some((latitude * lat_sign, longitude * long_sign))
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GpsError;
    use crate::gps::nmea::{decode, decode_at};
    use chrono::{Duration, TimeZone};

    fn merge_all(state: &mut SessionState, sentences: &[&str]) {
        for sentence in sentences {
            assert!(matches!(state.merge(decode(sentence)), MergeOutcome::Merged(_)));
        }
    }

    #[test]
    fn test_new_state_is_seeded() {
        let state = SessionState::new();
        assert_eq!(state.decimal("latitude"), Some(0.0));
        assert_eq!(state.decimal("longitude"), Some(0.0));
        assert_eq!(state.len(), 2);
    }

    #[test]
    fn test_merge_policy_table() {
        assert_eq!(merge_policy("visible_satellites"), MergePolicy::MergeByKey);
        assert_eq!(merge_policy("active_satellites"), MergePolicy::Overwrite);
        assert_eq!(merge_policy("latitude"), MergePolicy::Overwrite);
    }

    #[test]
    fn test_none_record_requests_retry() {
        let mut state = SessionState::new();
        assert_eq!(state.merge(decode("$GPXYZ,1,2")), MergeOutcome::Retry);
        assert_eq!(state, SessionState::new());
    }

    #[test]
    fn test_overwrite_and_namespacing() {
        let mut state = SessionState::new();
        merge_all(
            &mut state,
            &[
                "$GPGGA,002909,3659.418,S,17429.240,E,1,06,1.5,165.3,M,28.0,M,,",
                "$GPRMC,002910,A,3700.000,S,17429.240,E,000.0,360.0,201116,019.4,E",
            ],
        );

        assert!((state.decimal("latitude").unwrap() - 36.9903).abs() < 1e-4);
        assert_eq!(state.decimal("rmc_latitude"), Some(37.0));
        assert_eq!(state.text("time"), Some("002909"));
        assert_eq!(state.text("rmc_time"), Some("002910"));
        assert_eq!(state.last_nmea(), Some("RMC"));

        merge_all(&mut state, &["$GPGGA,002911,3701.000,S,17429.240,E,1,07,1.5,165.3,M,28.0,M,,"]);
        assert_eq!(state.integer("num_sat"), Some(7));
        assert_eq!(state.text("time"), Some("002911"));
        assert_eq!(state.last_nmea(), Some("GGA"));
    }

    #[test]
    fn test_absent_fields_leave_previous_values() {
        let mut state = SessionState::new();
        merge_all(&mut state, &["$GPGGA,002909,3659.418,S,17429.240,E,1,06,1.5,165.3,M,28.0,M,,"]);
        merge_all(&mut state, &["$GPGGA,002910,,,,,0,,,,,,,,"]);

        assert_eq!(state.text("time"), Some("002910"));
        assert_eq!(state.text("quality"), Some("0"));
        assert_eq!(state.integer("num_sat"), Some(6));
        assert_eq!(state.text("lat_ref"), Some("S"));
    }

    #[test]
    fn test_gsv_merge_by_key_union() {
        let mut state = SessionState::new();
        merge_all(
            &mut state,
            &[
                "$GPGSV,3,1,11,01,13,040,00,07,78,148,38,08,61,114,30,09,39,342,41",
                "$GPGSV,3,2,11,11,37,050,35,13,02,213,00,16,00,113,00,23,11,009,00",
                "$GPGSV,3,3,11,27,23,137,36,28,30,273,32,30,50,223,45,,,,",
            ],
        );

        let visible = state.visible_satellites().unwrap();
        let ids: Vec<&str> = visible.keys().map(String::as_str).collect();
        assert_eq!(ids, vec!["01", "07", "08", "09", "11", "13", "16", "23", "27", "28", "30"]);
        assert_eq!(visible["09"].azimuth, Some(342.0));
        assert_eq!(visible["30"].snr, Some(45.0));
        assert_eq!(state.integer("msg_num"), Some(2));
        assert_eq!(state.integer("num_sat_in_view"), Some(11));
    }

    #[test]
    fn test_stale_satellite_persists_until_seen_again() {
        let first = Utc.with_ymd_and_hms(2016, 11, 20, 0, 29, 9).unwrap();
        let later = first + Duration::seconds(5);

        let mut state = SessionState::new();
        state.merge(decode_at("$GPGSV,1,1,02,01,13,040,20,07,78,148,38", first));
        state.merge(decode_at("$GPGSV,1,1,01,07,80,150,40", later));

        let visible = state.visible_satellites().unwrap();
        assert_eq!(visible.len(), 2);
        assert_eq!(visible["01"].last_seen, first);
        assert_eq!(visible["01"].snr, Some(20.0));
        assert_eq!(visible["07"].last_seen, later);
        assert_eq!(visible["07"].elevation, Some(80.0));
    }

    #[test]
    fn test_merge_is_idempotent() {
        let now = Utc.with_ymd_and_hms(2016, 11, 20, 0, 29, 9).unwrap();
        let record = decode_at(
            "$GPGSV,3,1,11,01,13,040,00,07,78,148,38,08,61,114,30,09,39,342,41",
            now,
        );

        let mut state = SessionState::new();
        state.merge(record.clone());
        let snapshot = state.clone();
        state.merge(record);

        assert_eq!(state, snapshot);
        assert_eq!(state.visible_satellites().unwrap().len(), 4);
    }

    #[test]
    fn test_active_satellites_replaced() {
        let mut state = SessionState::new();
        merge_all(
            &mut state,
            &[
                "$GPGSA,A,3,,07,,09,11,,,,27,,30,,2.9,1.5,1.2",
                "$GPGSV,1,1,03,07,78,148,38,09,39,342,41,30,50,223,45",
            ],
        );
        assert_eq!(state.active_satellites().len(), 5);

        let views = state.active_satellite_views();
        let found: Vec<(usize, &str)> = views.iter().map(|(i, id, _)| (*i, *id)).collect();
        assert_eq!(found, vec![(0, "07"), (1, "09"), (4, "30")]);

        merge_all(&mut state, &["$GPGSA,A,2,07,,,,,,,,,,,,3.0,2.0,1.0"]);
        assert_eq!(state.active_satellites(), &["07".to_string()][..]);
        assert_eq!(state.text("mode_dimension"), Some("2"));
    }

    #[test]
    fn test_date_time_from_gga_and_zda() {
        let mut state = SessionState::new();
        merge_all(&mut state, &["$GPGGA,002909.00,3659.418,S,17429.240,E,1,06,1.5,165.3,M,28.0,M,,"]);
        assert!(state.date_time().unwrap().is_none());

        merge_all(&mut state, &["$GPZDA,002909.00,20,11,16,13,00"]);
        let ts = state.date_time().unwrap().unwrap();
        assert_eq!(ts.to_rfc3339(), "2016-11-20T00:29:09+00:00");
    }

    #[test]
    fn test_partial_zda_keeps_time_date_pair() {
        let mut state = SessionState::new();
        merge_all(&mut state, &["$GPZDA,235959.00,31,12,16,00,00"]);
        merge_all(&mut state, &["$GPZDA,000001.00,,,,00,00"]);

        assert_eq!(state.text("time"), Some("235959.00"));
        assert_eq!(state.text("date"), Some("311216"));
        let ts = state.date_time().unwrap().unwrap();
        assert_eq!(ts.to_rfc3339(), "2016-12-31T23:59:59+00:00");
    }

    #[test]
    fn test_malformed_date_time() {
        let mut state = SessionState::new();
        merge_all(&mut state, &["$GPZDA,002909,20,13,16,,"]);
        assert!(matches!(state.date_time(), Err(GpsError::MalformedTimestamp(_))));
    }

    #[test]
    fn test_rmc_date_time() {
        let mut state = SessionState::new();
        merge_all(&mut state, &["$GPRMC,002909,A,3659.418,S,17429.240,E,000.0,360.0,201116,019.4,E"]);
        let ts = state.rmc_date_time().unwrap().unwrap();
        assert_eq!(ts.to_rfc3339(), "2016-11-20T00:29:09+00:00");
    }

    #[test]
    fn test_signed_position() {
        let mut state = SessionState::new();
        merge_all(&mut state, &["$GPGGA,002909,3659.418,S,17429.240,E,1,06,1.5,165.3,M,28.0,M,,"]);
        let (lat, lon) = state.signed_position().unwrap();
        assert!((lat + 36.9903).abs() < 1e-4);
        assert!((lon - 174.4873).abs() < 1e-4);

        merge_all(&mut state, &["$GPGGA,002910,4807.038,N,01131.000,W,1,08,0.9,545.4,M,46.9,M,,"]);
        let (lat, lon) = state.signed_position().unwrap();
        assert!(lat > 0.0);
        assert!(lon < 0.0);
    }

    #[test]
    fn test_json_snapshot() {
        let mut state = SessionState::new();
        merge_all(&mut state, &["$GPHDT,274.07,T"]);
        let json: serde_json::Value = serde_json::from_str(&state.to_json().unwrap()).unwrap();
        assert_eq!(json["heading"], "274.07");
        assert_eq!(json["last_nmea"], "HDT");
        assert_eq!(json["latitude"], 0.0);
    }
}
