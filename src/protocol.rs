//! UECS-CCM protocol codec
//!
//! UECS (Ubiquitous Environment Control System) nodes broadcast XML payloads
//! over UDP multicast (224.0.0.1:16520) carrying greenhouse sensor readings
//! and actuator states:
//!
//! ```xml
//! <UECS ver="1.00-E10">
//!   <DATA type="InAirTemp.mC" room="1" region="1" order="1"
//!         priority="29" lv="S" cast="uni">1.8</DATA>
//! </UECS>
//! ```
//!
//! Parsing is stateless and never fails: malformed multicast traffic yields
//! an empty packet list so the receive loop keeps draining the socket.

use std::collections::HashMap;
use std::fmt;
use std::net::Ipv4Addr;

use chrono::{DateTime, Utc};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::{Deserialize, Serialize};

/// UECS-CCM multicast group
pub const MULTICAST_ADDR: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 1);

/// UECS-CCM multicast port
pub const MULTICAST_PORT: u16 = 16520;

/// Maximum inbound datagram size
pub const RECV_BUFFER_SIZE: usize = 4096;

/// Protocol version string carried in the root element
pub const UECS_VERSION: &str = "1.00-E10";

// Mode suffixes appended by ArSprout controllers, exact and case-sensitive.
const CCM_SUFFIXES: [&str; 3] = [".mC", ".cMC", ".MC"];

/// Remove a trailing `.mC` / `.cMC` / `.MC` suffix from a CCM type string.
///
/// An input without a matching suffix is returned unchanged, so normalized
/// types pass through untouched.
pub fn strip_ccm_suffix(ccm_type: &str) -> &str {
    for suffix in CCM_SUFFIXES {
        if let Some(stripped) = ccm_type.strip_suffix(suffix) {
            return stripped;
        }
    }
    ccm_type
}

/// A CCM element value: numeric when the text body parses as a float,
/// otherwise the trimmed text verbatim. Never silently coerced to zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CcmValue {
    Number(f64),
    Text(String),
}

impl CcmValue {
    /// Parse a raw element text body, falling back to the trimmed string.
    pub fn from_text(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.parse::<f64>() {
            Ok(n) => Self::Number(n),
            Err(_) => Self::Text(trimmed.to_string()),
        }
    }

    /// Numeric view, if this value is a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(_) => None,
        }
    }

    /// Control convention: nonzero numbers are ON, everything else OFF.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Number(n) => *n != 0.0,
            Self::Text(s) => !s.is_empty(),
        }
    }
}

impl fmt::Display for CcmValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

/// Parsed UECS-CCM data packet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CcmPacket {
    /// Suffix-stripped type (e.g. "InAirTemp")
    pub ccm_type: String,
    /// Original type including suffix (e.g. "InAirTemp.mC")
    pub raw_type: String,
    /// Numeric value or raw string
    pub value: CcmValue,
    pub room: u32,
    pub region: u32,
    pub order: u32,
    /// 1 = emergency, 10 = normal control, 29 = default sensor report.
    /// Kept as broadcast even outside the conventional 1-30 range.
    pub priority: u32,
    /// "S" = sensor report, "A" = actuator control
    pub level: String,
    /// "uni" or "bi"
    pub cast: String,
    /// Originating address, empty when unknown
    pub source_ip: String,
    pub timestamp: DateTime<Utc>,
}

impl CcmPacket {
    /// Create a packet with protocol defaults for all optional fields.
    pub fn new(raw_type: &str, value: CcmValue) -> Self {
        Self {
            ccm_type: strip_ccm_suffix(raw_type).to_string(),
            raw_type: raw_type.to_string(),
            value,
            room: 1,
            region: 1,
            order: 1,
            priority: 29,
            level: "S".to_string(),
            cast: "uni".to_string(),
            source_ip: String::new(),
            timestamp: Utc::now(),
        }
    }

    /// House identifier derived from the room number (room N -> "hN").
    pub fn house_id(&self) -> String {
        format!("h{}", self.room)
    }
}

/// Collect an element's attributes into a map.
///
/// Returns `None` on any attribute-level malformation, which fails the
/// whole document per the parse contract.
fn attr_map(elem: &BytesStart<'_>) -> Option<HashMap<String, String>> {
    let mut map = HashMap::new();
    for attr in elem.attributes() {
        let attr = attr.ok()?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value().ok()?.into_owned();
        map.insert(key, value);
    }
    Some(map)
}

fn int_attr<T: std::str::FromStr>(attrs: &HashMap<String, String>, name: &str, default: T) -> T {
    attrs
        .get(name)
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

fn str_attr(attrs: &HashMap<String, String>, name: &str, default: &str) -> String {
    attrs
        .get(name)
        .cloned()
        .unwrap_or_else(|| default.to_string())
}

/// Parse a UECS XML payload into a packet list.
///
/// Decoding is lossy (invalid UTF-8 sequences are dropped) and tolerant:
/// any malformation yields an empty list rather than an error, one packet
/// per `DATA` element otherwise, in document order.
pub fn parse_ccm_xml(xml_bytes: &[u8], source_ip: &str) -> Vec<CcmPacket> {
    let text = String::from_utf8_lossy(xml_bytes);
    let mut reader = Reader::from_str(&text);

    let now = Utc::now();
    let mut packets = Vec::new();
    // Attributes of the DATA element currently open, plus accumulated text.
    let mut open: Option<(HashMap<String, String>, String)> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(elem)) if elem.name().as_ref() == b"DATA" => {
                match attr_map(&elem) {
                    Some(attrs) => open = Some((attrs, String::new())),
                    None => return Vec::new(),
                }
            }
            Ok(Event::Empty(elem)) if elem.name().as_ref() == b"DATA" => {
                match attr_map(&elem) {
                    Some(attrs) => packets.push(packet_from(attrs, "", source_ip, now)),
                    None => return Vec::new(),
                }
            }
            Ok(Event::Text(t)) => {
                if let Some((_, body)) = open.as_mut() {
                    match t.unescape() {
                        Ok(s) => body.push_str(&s),
                        Err(_) => return Vec::new(),
                    }
                }
            }
            Ok(Event::End(elem)) if elem.name().as_ref() == b"DATA" => {
                if let Some((attrs, body)) = open.take() {
                    packets.push(packet_from(attrs, &body, source_ip, now));
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(_) => return Vec::new(),
        }
    }

    packets
}

fn packet_from(
    attrs: HashMap<String, String>,
    body: &str,
    source_ip: &str,
    now: DateTime<Utc>,
) -> CcmPacket {
    let raw_type = str_attr(&attrs, "type", "");
    CcmPacket {
        ccm_type: strip_ccm_suffix(&raw_type).to_string(),
        raw_type,
        value: CcmValue::from_text(body),
        room: int_attr(&attrs, "room", 1),
        region: int_attr(&attrs, "region", 1),
        order: int_attr(&attrs, "order", 1),
        priority: int_attr(&attrs, "priority", 29),
        level: str_attr(&attrs, "lv", "S"),
        cast: str_attr(&attrs, "cast", "uni"),
        source_ip: source_ip.to_string(),
        timestamp: now,
    }
}

/// Attributes of an outbound control packet.
#[derive(Debug, Clone)]
pub struct ControlParams {
    pub room: u32,
    pub region: u32,
    pub order: u32,
    pub priority: u32,
    pub level: String,
    pub cast: String,
}

impl Default for ControlParams {
    fn default() -> Self {
        Self {
            room: 1,
            region: 1,
            order: 1,
            priority: 10,
            level: "A".to_string(),
            cast: "uni".to_string(),
        }
    }
}

/// Build a UECS-CCM control XML packet.
///
/// The control vocabulary is allowlist-checked upstream, so attribute
/// values are rendered as literal text without escaping. The sender's
/// address travels in a trailing `IP` element, auto-detected when not
/// supplied.
pub fn build_ccm_xml(
    ccm_type: &str,
    value: f64,
    params: &ControlParams,
    local_ip: Option<&str>,
) -> Vec<u8> {
    let ip = match local_ip {
        Some(ip) => ip.to_string(),
        None => detect_local_ip(),
    };
    let xml = format!(
        "<?xml version=\"1.0\"?>\n<UECS ver=\"{UECS_VERSION}\">\n  \
         <DATA type=\"{ccm_type}\" room=\"{room}\" region=\"{region}\" \
         order=\"{order}\" priority=\"{priority}\" \
         lv=\"{level}\" cast=\"{cast}\">{value}</DATA>\n  <IP>{ip}</IP>\n</UECS>\n",
        room = params.room,
        region = params.region,
        order = params.order,
        priority = params.priority,
        level = params.level,
        cast = params.cast,
    );
    xml.into_bytes()
}

/// Detect the local address by opening a connected UDP socket toward the
/// multicast target. No traffic is sent.
pub fn detect_local_ip() -> String {
    let probe = || -> std::io::Result<String> {
        let sock = std::net::UdpSocket::bind("0.0.0.0:0")?;
        sock.connect((MULTICAST_ADDR, MULTICAST_PORT))?;
        Ok(sock.local_addr()?.ip().to_string())
    };
    probe().unwrap_or_else(|_| "0.0.0.0".to_string())
}
