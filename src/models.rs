//! Data models.

use serde::Deserialize;
use serde_with::serde_as;

use serde_helpers::*;

/// Address position of the destination in an AX.25 header
pub const DESTINATION: usize = 0;
/// Address position of the source in an AX.25 header
pub const SOURCE: usize = 1;
/// Address position of the first digipeater
pub const REPEATER_1: usize = 2;
/// Address position of the second digipeater
pub const REPEATER_2: usize = 3;

/// Station address in an AX.25 header
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
pub struct Address {
    pub callsign: String,
    /// Secondary station identifier, 0-15
    #[serde(default)]
    pub ssid: u8,
    /// "Has been repeated" flag, meaningful for digipeaters only
    #[serde(default)]
    pub repeated: bool,
}

impl Address {
    pub fn new(callsign: &str, ssid: u8) -> Self {
        Self {
            callsign: callsign.to_string(),
            ssid,
            repeated: false,
        }
    }

    /// Callsign with `-ssid` suffix, suffix omitted for SSID 0
    pub fn with_ssid(&self) -> String {
        if self.ssid == 0 {
            self.callsign.clone()
        } else {
            format!("{}-{}", self.callsign, self.ssid)
        }
    }
}

/// Kind of AX.25 frame, as far as recording is concerned
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FrameKind {
    /// UI frame carrying APRS data
    #[default]
    Aprs,
    /// Exchange identification frame, with its parameters already decoded
    Xid { summary: String },
    /// Any other connected-mode or non-APRS frame
    Other,
}

/// Received AX.25 frame
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
pub struct Frame {
    /// Destination, source, then up to eight digipeaters
    #[serde(default)]
    pub addresses: Vec<Address>,
    #[serde(default)]
    pub kind: FrameKind,
    /// Information field, as text or as a byte array
    #[serde_as(as = "serde_with::BytesOrString")]
    #[serde(default)]
    pub info: Vec<u8>,
}

impl Frame {
    pub fn source(&self) -> Option<&Address> {
        self.addresses.get(SOURCE)
    }

    /// Position of the station we actually heard.
    ///
    /// This is the last digipeater with its "repeated" flag set, or the
    /// source when nobody repeated the frame. None without any addresses.
    pub fn heard_index(&self) -> Option<usize> {
        if self.addresses.is_empty() {
            return None;
        }
        let last_repeater = self
            .addresses
            .iter()
            .enumerate()
            .skip(REPEATER_1)
            .filter(|(_, address)| address.repeated)
            .map(|(i, _)| i)
            .last();
        Some(last_repeater.unwrap_or(SOURCE))
    }

    /// Station the frame was heard from.
    ///
    /// A bare `WIDEn` alias names no real station, so in that case the
    /// preceding digipeater is reported instead.
    pub fn heard_from(&self) -> String {
        let Some(mut heard) = self.heard_index() else {
            return String::new();
        };
        let name = self.address_text(heard);
        if heard >= REPEATER_2 && is_bare_wide_alias(&name) {
            heard -= 1;
        }
        self.address_text(heard)
    }

    /// Address header in monitor format, e.g. `N0CALL-9>APRS,WIDE1*,WIDE2:`
    ///
    /// The `*` marks the last digipeater that repeated the frame.
    pub fn format_addrs(&self) -> String {
        if self.addresses.is_empty() {
            return String::new();
        }
        let mut text = format!(
            "{}>{}",
            self.address_text(SOURCE),
            self.address_text(DESTINATION)
        );
        for (i, address) in self.addresses.iter().enumerate().skip(REPEATER_1) {
            text.push(',');
            text.push_str(&address.with_ssid());
            let next_repeated = self.addresses.get(i + 1).is_some_and(|a| a.repeated);
            if address.repeated && !next_repeated {
                text.push('*');
            }
        }
        text.push(':');
        text
    }

    /// Text shown as the packet body: the XID summary or the info field
    pub fn body(&self) -> &[u8] {
        match &self.kind {
            FrameKind::Xid { summary } => summary.as_bytes(),
            FrameKind::Aprs | FrameKind::Other => &self.info,
        }
    }

    fn address_text(&self, index: usize) -> String {
        self.addresses
            .get(index)
            .map(Address::with_ssid)
            .unwrap_or_default()
    }
}

/// `WIDE` followed by exactly one digit and nothing else
fn is_bare_wide_alias(name: &str) -> bool {
    let bytes = name.as_bytes();
    bytes.len() == 5 && bytes.starts_with(b"WIDE") && bytes[4].is_ascii_digit()
}

/// Fields the APRS decoder extracted from the information field
///
/// Every field may be missing. Numeric fields also accept the decoder's
/// "unknown" sentinel (-999999) and treat it as missing.
#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
pub struct AprsFields {
    /// Source callsign as reported by the decoder
    #[serde(default, deserialize_with = "deserialize_non_empty")]
    pub source: Option<String>,
    /// Object, item or station name
    #[serde(default, deserialize_with = "deserialize_non_empty")]
    pub name: Option<String>,
    #[serde(default)]
    pub symbol_table: Option<char>,
    #[serde(default)]
    pub symbol_code: Option<char>,
    #[serde(default, deserialize_with = "deserialize_non_empty")]
    pub manufacturer: Option<String>,
    /// Mic-E status text
    #[serde(default, deserialize_with = "deserialize_non_empty")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "deserialize_non_empty")]
    pub telemetry: Option<String>,
    #[serde(default, deserialize_with = "deserialize_non_empty")]
    pub comment: Option<String>,
    /// Latitude in decimal degrees
    #[serde(default, deserialize_with = "deserialize_known")]
    pub latitude: Option<f64>,
    /// Longitude in decimal degrees
    #[serde(default, deserialize_with = "deserialize_known")]
    pub longitude: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_known")]
    pub speed_mph: Option<f64>,
    /// Course in degrees
    #[serde(default, deserialize_with = "deserialize_known")]
    pub course: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_known")]
    pub altitude_ft: Option<f64>,
}

/// Decoded packet handed over by the receive pipeline
#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
pub struct DecodedPacket {
    #[serde(default)]
    pub frame: Frame,
    #[serde(default)]
    pub aprs: AprsFields,
}

impl DecodedPacket {
    /// Source callsign, from the decoder or else from the frame header
    pub fn source(&self) -> String {
        match self.aprs.source.as_deref().filter(|source| !source.is_empty()) {
            Some(source) => source.to_string(),
            None => self
                .frame
                .source()
                .map(Address::with_ssid)
                .unwrap_or_default(),
        }
    }
}

/// Audio levels measured while receiving a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
pub struct AudioLevel {
    #[serde(default)]
    pub rec: i32,
    #[serde(default)]
    pub mark: i32,
    #[serde(default)]
    pub space: i32,
}

/// A packet as delivered by the feed, with the channel it was heard on
#[derive(Debug, Clone, PartialEq)]
pub struct ReceivedPacket {
    pub channel: i32,
    pub packet: DecodedPacket,
    pub levels: AudioLevel,
}

/// Custom deserializers
mod serde_helpers {
    use serde::{self, Deserialize, Deserializer};

    /// Decoder sentinel for "no value"
    const UNKNOWN: f64 = -999999.0;

    pub fn deserialize_known<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<f64>::deserialize(deserializer)?;
        Ok(value.filter(|v| *v != UNKNOWN))
    }

    pub fn deserialize_non_empty<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<String>::deserialize(deserializer)?;
        Ok(value.filter(|s| !s.is_empty()))
    }
}
