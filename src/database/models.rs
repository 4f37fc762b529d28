// src/database/models.rs
use chrono::{DateTime, Utc};

use super::types::Wkt;
use crate::freqmap::FreqMap;
use crate::models::{AudioLevel, DecodedPacket};
use crate::sanitize::{strip_trailing_line_endings, to_safe_text};

/// Longest raw or info text kept
pub const MAX_SAFE: usize = 500;
const MAX_CALLSIGN: usize = 12;
const MAX_NAME: usize = 23;
const MAX_MANUFACTURER: usize = 59;
const MAX_STATUS: usize = 39;
const MAX_TELEMETRY: usize = 255;
const MAX_COMMENT: usize = 255;

const FEET_TO_METERS: f64 = 0.3048;

/// One row of the packets table, ready to insert
#[derive(Debug, Clone, PartialEq)]
pub struct PacketRow {
    pub instance: i32,
    pub channel: i32,
    pub tm: DateTime<Utc>,
    pub sdr: i32,
    pub freq: i32,
    pub callsign: String,
    pub heardfrom: String,
    pub sourcename: String,
    /// Symbol table and code, or empty
    pub source_symbol: String,
    pub speed_mph: f64,
    pub bearing: f64,
    /// Feet
    pub altitude: f64,
    pub manufacturer: String,
    pub status: String,
    pub telemetry: Option<String>,
    pub comment: Option<String>,
    pub location2d: Option<Wkt>,
    pub location3d: Option<Wkt>,
    pub raw: String,
    /// Info field text; the store keeps its md5 as the content hash
    pub info: String,
    pub receive_level: i32,
    pub mark_level: i32,
    pub space_level: i32,
}

impl PacketRow {
    /// Same row with the free-form telemetry and comment fields nulled
    pub fn degraded(self) -> Self {
        Self {
            telemetry: None,
            comment: None,
            ..self
        }
    }
}

/// Map a decoded packet heard on `channel` to a table row
pub fn build_row(
    instance: i32,
    channel: i32,
    packet: &DecodedPacket,
    levels: AudioLevel,
    freq_map: &FreqMap,
) -> PacketRow {
    let aprs = &packet.aprs;
    let (sdr, freq) = freq_map.resolve(channel);
    let source = packet.source();

    let name = aprs
        .name
        .as_deref()
        .filter(|name| !name.is_empty())
        .unwrap_or(&source);
    let altitude_ft = aprs.altitude_ft.unwrap_or(0.0);
    let (location2d, location3d) = locations(packet);

    let info = strip_trailing_line_endings(&packet.frame.info);
    let body = strip_trailing_line_endings(packet.frame.body());
    let mut raw = to_safe_text(packet.frame.format_addrs().as_bytes(), MAX_SAFE);
    raw.push_str(&to_safe_text(body, MAX_SAFE));

    PacketRow {
        instance,
        channel,
        tm: Utc::now(),
        sdr,
        freq,
        callsign: to_safe_text(source.as_bytes(), MAX_CALLSIGN),
        heardfrom: to_safe_text(packet.frame.heard_from().as_bytes(), MAX_CALLSIGN),
        sourcename: to_safe_text(name.as_bytes(), MAX_NAME),
        source_symbol: symbol(aprs.symbol_table, aprs.symbol_code),
        speed_mph: round_to(aprs.speed_mph.unwrap_or(0.0), 1),
        bearing: round_to(aprs.course.unwrap_or(0.0), 1),
        altitude: round_to(altitude_ft, 2),
        manufacturer: safe_field(aprs.manufacturer.as_deref(), MAX_MANUFACTURER),
        status: safe_field(aprs.status.as_deref(), MAX_STATUS),
        telemetry: Some(safe_field(aprs.telemetry.as_deref(), MAX_TELEMETRY)),
        comment: Some(safe_field(aprs.comment.as_deref(), MAX_COMMENT)),
        location2d,
        location3d,
        raw,
        info: to_safe_text(info, MAX_SAFE),
        receive_level: levels.rec,
        mark_level: levels.mark,
        space_level: levels.space,
    }
}

fn safe_field(value: Option<&str>, max_len: usize) -> String {
    to_safe_text(value.unwrap_or_default().as_bytes(), max_len)
}

/// Two printable characters, table then code, or nothing
fn symbol(table: Option<char>, code: Option<char>) -> String {
    match (table, code) {
        (Some(t), Some(c)) if is_printable(t) && is_printable(c) => [t, c].iter().collect(),
        _ => String::new(),
    }
}

fn is_printable(c: char) -> bool {
    (' '..='~').contains(&c)
}

/// 2D and 3D geometry, both None without a usable position
fn locations(packet: &DecodedPacket) -> (Option<Wkt>, Option<Wkt>) {
    let aprs = &packet.aprs;
    let (Some(lat), Some(lon)) = (aprs.latitude, aprs.longitude) else {
        return (None, None);
    };
    if lat == 0.0 && lon == 0.0 {
        return (None, None);
    }
    let point_z = aprs
        .altitude_ft
        .filter(|alt| *alt != 0.0)
        .map(|alt| Wkt::point_z(lon, lat, alt * FEET_TO_METERS));
    (Some(Wkt::point(lon, lat)), point_z)
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::freqmap::FreqMapEntry;
    use crate::models::{Address, AprsFields, Frame, FrameKind};

    fn freq_map() -> FreqMap {
        FreqMap::new(vec![FreqMapEntry {
            channel: 0,
            sdr: 1,
            freq: 144_390_000,
        }])
    }

    fn packet(aprs: AprsFields) -> DecodedPacket {
        DecodedPacket {
            frame: Frame {
                addresses: vec![
                    Address::new("APDW16", 0),
                    Address::new("N0CALL", 9),
                    Address {
                        callsign: "W1ABC".to_string(),
                        ssid: 0,
                        repeated: true,
                    },
                    Address {
                        callsign: "WIDE2".to_string(),
                        ssid: 0,
                        repeated: true,
                    },
                ],
                kind: FrameKind::Aprs,
                info: b"!4500.00N/09300.00W>Test\r\n".to_vec(),
            },
            aprs,
        }
    }

    fn minneapolis() -> AprsFields {
        AprsFields {
            source: Some("N0CALL-9".to_string()),
            symbol_table: Some('/'),
            symbol_code: Some('>'),
            latitude: Some(45.0),
            longitude: Some(-93.0),
            altitude_ft: Some(1000.0),
            ..Default::default()
        }
    }

    #[test]
    fn maps_reference_packet() {
        let levels = AudioLevel {
            rec: 50,
            mark: 49,
            space: 25,
        };
        let row = build_row(3, 0, &packet(minneapolis()), levels, &freq_map());

        assert_eq!(row.instance, 3);
        assert_eq!(row.channel, 0);
        assert_eq!(row.sdr, 1);
        assert_eq!(row.freq, 144_390_000);
        assert_eq!(row.callsign, "N0CALL-9");
        assert_eq!(row.sourcename, "N0CALL-9");
        assert_eq!(row.source_symbol, "/>");
        assert_eq!(row.speed_mph, 0.0);
        assert_eq!(row.bearing, 0.0);
        assert_eq!(row.altitude, 1000.0);
        assert_eq!(row.location2d.unwrap().as_str(), "POINT(-93.000000 45.000000)");
        assert_eq!(
            row.location3d.unwrap().as_str(),
            "POINTZ(-93.000000 45.000000 304.80)"
        );
        assert_eq!((row.receive_level, row.mark_level, row.space_level), (50, 49, 25));
    }

    #[test]
    fn unmapped_channel_has_no_receiver() {
        let row = build_row(0, 5, &packet(minneapolis()), AudioLevel::default(), &freq_map());
        assert_eq!((row.sdr, row.freq), (0, 0));
    }

    #[test]
    fn heard_from_skips_bare_wide_alias() {
        let row = build_row(0, 0, &packet(minneapolis()), AudioLevel::default(), &freq_map());
        assert_eq!(row.heardfrom, "W1ABC");
    }

    #[test]
    fn raw_text_has_header_and_trimmed_info() {
        let row = build_row(0, 0, &packet(minneapolis()), AudioLevel::default(), &freq_map());
        assert_eq!(
            row.raw,
            "N0CALL-9>APDW16,W1ABC,WIDE2*:!4500.00N/09300.00W>Test"
        );
        assert_eq!(row.info, "!4500.00N/09300.00W>Test");
    }

    #[test]
    fn xid_raw_text_uses_summary() {
        let mut p = packet(minneapolis());
        p.frame.kind = FrameKind::Xid {
            summary: "XID p=1 mod8 SREJ".to_string(),
        };
        let row = build_row(0, 0, &p, AudioLevel::default(), &freq_map());
        assert!(row.raw.ends_with(":XID p=1 mod8 SREJ"));
        assert_eq!(row.info, "!4500.00N/09300.00W>Test");
    }

    #[test]
    fn unknown_latitude_means_no_geometry() {
        let aprs = AprsFields {
            latitude: None,
            ..minneapolis()
        };
        let row = build_row(0, 0, &packet(aprs), AudioLevel::default(), &freq_map());
        assert_eq!(row.location2d, None);
        assert_eq!(row.location3d, None);
    }

    #[test]
    fn null_island_means_no_geometry() {
        let aprs = AprsFields {
            latitude: Some(0.0),
            longitude: Some(0.0),
            ..minneapolis()
        };
        let row = build_row(0, 0, &packet(aprs), AudioLevel::default(), &freq_map());
        assert_eq!(row.location2d, None);
        assert_eq!(row.location3d, None);
    }

    #[test]
    fn zero_altitude_has_only_2d_geometry() {
        let aprs = AprsFields {
            altitude_ft: Some(0.0),
            ..minneapolis()
        };
        let row = build_row(0, 0, &packet(aprs), AudioLevel::default(), &freq_map());
        assert!(row.location2d.is_some());
        assert_eq!(row.location3d, None);
        assert_eq!(row.altitude, 0.0);
    }

    #[test]
    fn display_name_prefers_aprs_name() {
        let aprs = AprsFields {
            name: Some("EOC".to_string()),
            ..minneapolis()
        };
        let row = build_row(0, 0, &packet(aprs), AudioLevel::default(), &freq_map());
        assert_eq!(row.sourcename, "EOC");
        assert_eq!(row.callsign, "N0CALL-9");
    }

    #[test]
    fn empty_names_fall_back_to_header_source() {
        let aprs = AprsFields {
            name: Some(String::new()),
            source: Some(String::new()),
            ..minneapolis()
        };
        let row = build_row(0, 0, &packet(aprs), AudioLevel::default(), &freq_map());
        assert_eq!(row.callsign, "N0CALL-9");
        assert_eq!(row.sourcename, "N0CALL-9");
    }

    #[test]
    fn partial_symbol_is_empty() {
        let aprs = AprsFields {
            symbol_code: None,
            ..minneapolis()
        };
        let row = build_row(0, 0, &packet(aprs), AudioLevel::default(), &freq_map());
        assert_eq!(row.source_symbol, "");
        assert_eq!(symbol(Some('/'), Some('\u{7f}')), "");
    }

    #[test]
    fn free_text_is_sanitized_and_bounded() {
        let aprs = AprsFields {
            comment: Some("73 de N0CALL\u{1b}[0m'; DROP TABLE x; --".to_string()),
            telemetry: Some("T#".repeat(200)),
            manufacturer: Some("Kenwood TH-D74\u{e9}".to_string()),
            ..minneapolis()
        };
        let row = build_row(0, 0, &packet(aprs), AudioLevel::default(), &freq_map());

        assert_eq!(
            row.comment.as_deref(),
            Some("73 de N0CALL<0x1b>[0m'; DROP TABLE x; --")
        );
        assert_eq!(row.telemetry.as_ref().map(String::len), Some(MAX_TELEMETRY));
        assert_eq!(row.manufacturer, "Kenwood TH-D74<0xc3><0xa9>");
    }

    #[test]
    fn degraded_row_nulls_only_telemetry_and_comment() {
        let aprs = AprsFields {
            comment: Some("hello".to_string()),
            telemetry: Some("T#001".to_string()),
            ..minneapolis()
        };
        let row = build_row(0, 0, &packet(aprs), AudioLevel::default(), &freq_map());
        let degraded = row.clone().degraded();

        assert_eq!(degraded.telemetry, None);
        assert_eq!(degraded.comment, None);
        assert_eq!(
            PacketRow {
                telemetry: row.telemetry.clone(),
                comment: row.comment.clone(),
                ..degraded
            },
            row
        );
    }

    #[test]
    fn rounds_like_the_display_format() {
        assert_eq!(round_to(12.34, 1), 12.3);
        assert_eq!(round_to(1234.567, 2), 1234.57);
    }
}
