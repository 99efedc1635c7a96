// src/gps/nmea.rs
//! NMEA sentence decoding

use super::{
    convert::lat_lng_to_decimal,
    data::{FieldValue, SatelliteTable, SatelliteView, SentenceKind, SentenceRecord},
};
use chrono::{DateTime, Utc};

/// Number of satellite-id slots in a GSA sentence
pub const GSA_SATELLITE_SLOTS: usize = 12;

/// Number of satellite groups in a single GSV sentence
pub const GSV_SATELLITE_GROUPS: usize = 4;

type Decoder = fn(&mut Fields<'_>, &mut SentenceRecord, DateTime<Utc>);

/// Left-to-right cursor over the comma-separated fields after the sentence code.
/// Empty and missing fields both come back as `None`.
struct Fields<'a> {
    parts: std::str::Split<'a, char>,
}

impl<'a> Fields<'a> {
    fn next(&mut self) -> Option<&'a str> {
        self.parts.next().filter(|field| !field.is_empty())
    }

    fn skip(&mut self, count: usize) {
        for _ in 0..count {
            self.parts.next();
        }
    }

    fn text(&mut self) -> Option<FieldValue> {
        self.next().map(|field| FieldValue::Text(field.to_string()))
    }

    fn integer(&mut self) -> Option<i64> {
        self.next().and_then(|field| field.trim().parse().ok())
    }

    fn coordinate(&mut self) -> Option<FieldValue> {
        self.next().and_then(lat_lng_to_decimal).map(FieldValue::Decimal)
    }

    fn number(&mut self) -> Option<f32> {
        self.next().and_then(|field| field.trim().parse().ok())
    }
}

/// Decode one checksum-validated sentence (leading `$`, no `*hh`).
///
/// Never fails: unknown or truncated sentences give a record of kind
/// [`SentenceKind::None`].
pub fn decode(raw: &str) -> SentenceRecord {
    decode_at(raw, Utc::now())
}

/// Like [`decode`], stamping satellite sightings with `now`
pub fn decode_at(raw: &str, now: DateTime<Utc>) -> SentenceRecord {
    let mut parts = raw.split(',');
    let head = parts.next().unwrap_or_default();

    if !head.starts_with('$') {
        return SentenceRecord::none();
    }

    // Skip "$" and the 2-letter talker prefix
    let code = match head.get(3..6) {
        Some(code) => code,
        None => return SentenceRecord::none(),
    };

    let kind = SentenceKind::from_code(code);
    let decoder = match decoder_for(kind) {
        Some(decoder) => decoder,
        None => {
            log::debug!("Ignoring unsupported sentence {}", head);
            return SentenceRecord::none();
        }
    };

    let mut record = SentenceRecord::new(kind);
    let mut fields = Fields { parts };
    decoder(&mut fields, &mut record, now);
    record.prune();
    record
}

fn decoder_for(kind: SentenceKind) -> Option<Decoder> {
    let decoder: Decoder = match kind {
        SentenceKind::Gga => decode_gga,
        SentenceKind::Gll => decode_gll,
        SentenceKind::Rma => decode_rma,
        SentenceKind::Rmb => decode_rmb,
        SentenceKind::Rmc => decode_rmc,
        SentenceKind::Rme => decode_rme,
        SentenceKind::Rmm => decode_rmm,
        SentenceKind::Rmz => decode_rmz,
        SentenceKind::Gsa => decode_gsa,
        SentenceKind::Gsv => decode_gsv,
        SentenceKind::Hdt => decode_hdt,
        SentenceKind::Zda => decode_zda,
        SentenceKind::Bod => decode_bod,
        SentenceKind::Rte | SentenceKind::Wpl | SentenceKind::Lib => decode_tag_only,
        SentenceKind::None => return None,
    };
    Some(decoder)
}

/// GGA: Global Positioning System fix data
/// `$GPGGA,002909,3659.418,S,17429.240,E,1,06,1.5,165.3,M,28.0,M,,*5F`
fn decode_gga(fields: &mut Fields<'_>, record: &mut SentenceRecord, _now: DateTime<Utc>) {
    record.set("time", fields.text());
    record.set("latitude", fields.coordinate());
    record.set("lat_ref", fields.text());
    record.set("longitude", fields.coordinate());
    record.set("long_ref", fields.text());
    record.set("quality", fields.text());
    record.set("num_sat", fields.integer().map(FieldValue::Integer));
    record.set("hdop", fields.text());
    record.set("altitude", fields.text());
    record.set("alt_unit", fields.text());
    record.set("height_geoid", fields.text());
    record.set("height_geoid_unit", fields.text());
    record.set("last_dgps", fields.text());
    record.set("dgps", fields.text());
}

/// GLL: geographic position
fn decode_gll(fields: &mut Fields<'_>, record: &mut SentenceRecord, _now: DateTime<Utc>) {
    record.set("gll_latitude", fields.coordinate());
    record.set("gll_lat_ref", fields.text());
    record.set("gll_longitude", fields.coordinate());
    record.set("gll_long_ref", fields.text());
    record.set("gll_time", fields.text());
    record.set("gll_validity", fields.text());
}

/// RMA: recommended minimum Loran-C data
fn decode_rma(fields: &mut Fields<'_>, record: &mut SentenceRecord, _now: DateTime<Utc>) {
    record.set("rma_validity", fields.text());
    record.set("rma_latitude", fields.coordinate());
    record.set("rma_lat_ref", fields.text());
    record.set("rma_longitude", fields.coordinate());
    record.set("rma_long_ref", fields.text());
    fields.skip(2); // Loran time differences
    record.set("rma_speed", fields.text());
    record.set("rma_course", fields.text());
    record.set("rma_variation", fields.text());
    record.set("rma_var_direction", fields.text());
}

/// RMB: recommended minimum navigation information
fn decode_rmb(fields: &mut Fields<'_>, record: &mut SentenceRecord, _now: DateTime<Utc>) {
    record.set("rmb_validity", fields.text());
    record.set("rmb_cross_track_error", fields.text());
    record.set("rmb_steer_to", fields.text());
    record.set("rmb_origin", fields.text());
    record.set("rmb_destination", fields.text());
    record.set("rmb_dest_latitude", fields.coordinate());
    record.set("rmb_dest_lat_ref", fields.text());
    record.set("rmb_dest_longitude", fields.coordinate());
    record.set("rmb_dest_long_ref", fields.text());
    record.set("rmb_dest_distance", fields.text());
    record.set("rmb_dest_bearing", fields.text());
    record.set("rmb_speed", fields.text());
    record.set("rmb_arrived", fields.text());
}

/// RMC: recommended minimum specific GPS/transit data
fn decode_rmc(fields: &mut Fields<'_>, record: &mut SentenceRecord, _now: DateTime<Utc>) {
    record.set("rmc_time", fields.text());
    record.set("rmc_validity", fields.text());
    record.set("rmc_latitude", fields.coordinate());
    record.set("rmc_lat_ref", fields.text());
    record.set("rmc_longitude", fields.coordinate());
    record.set("rmc_long_ref", fields.text());
    record.set("rmc_speed", fields.text());
    record.set("rmc_course", fields.text());
    record.set("rmc_date", fields.text());
    record.set("rmc_variation", fields.text());
    record.set("rmc_var_direction", fields.text());
}

/// PGRME: Garmin estimated position error
fn decode_rme(fields: &mut Fields<'_>, record: &mut SentenceRecord, _now: DateTime<Utc>) {
    record.set("horizontal_error", fields.text());
    record.set("horizontal_error_units", fields.text());
    record.set("altitude_error", fields.text());
    record.set("altitude_error_units", fields.text());
    record.set("sperical_error", fields.text());
    record.set("sperical_error_units", fields.text());
}

/// PGRMM: Garmin map datum
fn decode_rmm(fields: &mut Fields<'_>, record: &mut SentenceRecord, _now: DateTime<Utc>) {
    record.set("coordinate_system", fields.text());
}

/// PGRMZ: Garmin altitude, possibly barometric
fn decode_rmz(fields: &mut Fields<'_>, record: &mut SentenceRecord, _now: DateTime<Utc>) {
    record.set("rmz_altitude", fields.text());
    record.set("rmz_alt_unit", fields.text());
    record.set("rmz_mode_dimension", fields.text());
}

/// GSA: DOP and active satellites
fn decode_gsa(fields: &mut Fields<'_>, record: &mut SentenceRecord, _now: DateTime<Utc>) {
    record.set("mode", fields.text());
    record.set("mode_dimension", fields.text());

    let active: Vec<String> = (0..GSA_SATELLITE_SLOTS)
        .filter_map(|_| fields.next())
        .map(str::to_string)
        .collect();
    record.set("active_satellites", Some(FieldValue::List(active)));

    record.set("pdop", fields.text());
    record.set("hdop", fields.text());
    record.set("vdop", fields.text());
}

/// GSV: satellites in view, one slice of the full table per sentence
fn decode_gsv(fields: &mut Fields<'_>, record: &mut SentenceRecord, now: DateTime<Utc>) {
    record.set("msg_count", fields.text());
    record.set(
        "msg_num",
        fields.integer().and_then(|n| n.checked_sub(1)).map(FieldValue::Integer),
    );
    record.set("num_sat_in_view", fields.integer().map(FieldValue::Integer));

    let mut visible = SatelliteTable::new();
    for _ in 0..GSV_SATELLITE_GROUPS {
        let id = fields.next();
        let mut view = SatelliteView::new(now);
        view.elevation = fields.number();
        view.azimuth = fields.number();
        view.snr = fields.number();

        if let Some(id) = id {
            visible.insert(id.to_string(), view);
        }
    }
    record.set("visible_satellites", Some(FieldValue::Satellites(visible)));
}

/// HDT: true heading
fn decode_hdt(fields: &mut Fields<'_>, record: &mut SentenceRecord, _now: DateTime<Utc>) {
    record.set("heading", fields.text());
}

/// ZDA: UTC date and time with local zone offset
///
/// `time` and `date` are written as a pair so a partial ZDA never leaves a
/// fresh time next to an older date in the session state.
fn decode_zda(fields: &mut Fields<'_>, record: &mut SentenceRecord, _now: DateTime<Utc>) {
    let time = fields.next();
    let day = fields.next();
    let month = fields.next();
    let year = fields.next().map(|year| year.get(..2).unwrap_or(year));
    if let (Some(time), Some(day), Some(month), Some(year)) = (time, day, month, year) {
        record.set_text("time", Some(time));
        record.set("date", Some(FieldValue::Text(format!("{}{}{}", day, month, year))));
    }

    record.set("local_hour_offset", fields.text());
    record.set("local_minute_offset", fields.text());
}

/// BOD: bearing from origin to destination
fn decode_bod(fields: &mut Fields<'_>, record: &mut SentenceRecord, _now: DateTime<Utc>) {
    record.set("bod_true", fields.text());
    fields.skip(1); // T
    record.set("bod_magnetic", fields.text());
    fields.skip(1); // M
    record.set("bod_destination_wp_id", fields.text());
    record.set("bod_origin_wp_id", fields.text());
}

/// RTE, WPL and LIB are recognized but their fields are not decoded
fn decode_tag_only(_fields: &mut Fields<'_>, _record: &mut SentenceRecord, _now: DateTime<Utc>) {}
