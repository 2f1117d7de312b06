//! Parsing of switch and router dumps.
//!
//! Three input styles are recognized:
//!
//! ```text
//! MacList    00:1b:63:aa:bb:cc
//!
//! ArpTable   Protocol  Address      Age (min)  Hardware Addr   Type   Interface
//!            Internet  10.0.59.12          4   001b.63aa.bbcc  ARPA   Vlan59
//!
//! MacTable   Vlan    Mac Address       Type        Ports
//!            ----    -----------       --------    -----
//!              10    001b.63aa.bbcc    DYNAMIC     Gi1/0/1
//! ```
//!
//! Lines that do not fit the detected style are skipped.

use std::collections::HashMap;
use std::io::{self, BufRead};
use std::sync::OnceLock;

use regex::Regex;

use crate::oui::{canonical_mac, is_mac_address};

/// Highest valid 802.1Q VLAN id.
const MAX_VLAN: u16 = 4094;

/// Words in the MAC-table type column that are never ports.
const ENTRY_TYPES: &[&str] = &["dynamic", "static", "secure", "sticky", "learned", "self"];

/// Input style of a dump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DumpFormat {
    /// One MAC per line.
    MacList,
    /// `show ip arp` output.
    ArpTable,
    /// `show mac address-table` output.
    MacTable,
}

/// One device seen in a dump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    /// Lowercase colon-separated MAC.
    pub mac: String,
    pub vlan: Option<String>,
    pub port: Option<String>,
}

/// Result of [`parse_dump`].
#[derive(Debug, Clone)]
pub struct ParsedDump {
    pub format: DumpFormat,
    /// Unique devices in first-seen order.
    pub devices: Vec<Device>,
    /// Non-empty lines read, headers included.
    pub lines_read: usize,
    /// Non-empty lines that yielded no device.
    pub skipped: usize,
}

/// Non-empty lines inspected by [`detect_format`]; device dumps often start
/// with a title and a rule before the column header.
pub const DETECT_LINES: usize = 5;

fn regex_matches(cell: &'static OnceLock<Option<Regex>>, pattern: &str, line: &str) -> bool {
    cell.get_or_init(|| Regex::new(pattern).ok())
        .as_ref()
        .is_some_and(|re| re.is_match(line))
}

fn is_arp_header(line: &str) -> bool {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    regex_matches(&RE, r"Protocol\s+Address.*Hardware\s+Addr", line)
}

fn is_mac_table_header(line: &str) -> bool {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    regex_matches(&RE, r"(?i)\bvlan(\s+id)?\b.*\bmac(\s+address)?\b", line)
}

/// Guess the format from the leading non-empty lines.
///
/// A MAC on the very first line means a plain list. Otherwise the first
/// [`DETECT_LINES`] lines are searched for an ARP header or row, then for a
/// MAC-table header or row. Anything else is treated as a plain list.
#[must_use]
pub fn detect_format(lines: &[&str]) -> DumpFormat {
    let head: Vec<&str> = lines
        .iter()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty())
        .take(DETECT_LINES)
        .collect();

    let Some(first) = head.first() else {
        return DumpFormat::MacList;
    };
    if first.split_whitespace().next().is_some_and(is_mac_address) {
        return DumpFormat::MacList;
    }
    if head.iter().any(|line| is_arp_line(line)) {
        return DumpFormat::ArpTable;
    }
    if head
        .iter()
        .any(|line| is_mac_table_header(line) || parse_mac_table_row(line).is_some())
    {
        return DumpFormat::MacTable;
    }
    DumpFormat::MacList
}

fn is_arp_line(line: &str) -> bool {
    is_arp_header(line) || parse_arp_row(line).is_some()
}

fn parse_vlan(word: &str) -> Option<u16> {
    word.parse::<u16>()
        .ok()
        .filter(|vlan| (1..=MAX_VLAN).contains(vlan))
}

/// `Internet <ip> <age> <mac> ARPA <interface>`
fn parse_arp_row(line: &str) -> Option<Device> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 6 || parts[0] != "Internet" {
        return None;
    }
    let mac = canonical_mac(parts[3]).ok()?;
    let vlan = parts[5]
        .strip_prefix("Vlan")
        .filter(|id| !id.is_empty())
        .map(str::to_string);
    Some(Device {
        mac,
        vlan,
        port: None,
    })
}

/// `<vlan> <mac> <type> <port>`
fn parse_mac_table_row(line: &str) -> Option<Device> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 3 {
        return None;
    }
    let vlan = parse_vlan(parts[0])?;
    let mac = canonical_mac(parts[1]).ok()?;
    let port = parts[2..]
        .iter()
        .find(|word| !ENTRY_TYPES.contains(&word.to_ascii_lowercase().as_str()))
        .map(|word| (*word).to_string());
    Some(Device {
        mac,
        vlan: Some(vlan.to_string()),
        port,
    })
}

fn parse_mac_list_row(line: &str) -> Option<Device> {
    let token = line.split_whitespace().next()?;
    Some(Device {
        mac: canonical_mac(token).ok()?,
        vlan: None,
        port: None,
    })
}

/// Parse a whole dump.
///
/// Devices are unique by MAC; a later row for the same MAC replaces the
/// earlier one's VLAN and port but keeps its position.
///
/// # Errors
///
/// Returns an error only if reading from `reader` fails.
pub fn parse_dump<R: BufRead>(reader: R) -> io::Result<ParsedDump> {
    let lines: Vec<String> = reader
        .lines()
        .collect::<io::Result<Vec<_>>>()?
        .into_iter()
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .collect();

    let head: Vec<&str> = lines.iter().take(DETECT_LINES).map(String::as_str).collect();
    let format = detect_format(&head);

    let mut devices: Vec<Device> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut skipped = 0;

    for line in &lines {
        let device = match format {
            DumpFormat::MacList => parse_mac_list_row(line),
            DumpFormat::ArpTable => parse_arp_row(line),
            DumpFormat::MacTable => parse_mac_table_row(line),
        };
        let Some(device) = device else {
            skipped += 1;
            continue;
        };
        match index.get(&device.mac) {
            Some(&pos) => devices[pos] = device,
            None => {
                index.insert(device.mac.clone(), devices.len());
                devices.push(device);
            }
        }
    }

    log::debug!(
        "Parsed {:?}: {} lines, {} devices, {} skipped",
        format,
        lines.len(),
        devices.len(),
        skipped
    );

    Ok(ParsedDump {
        format,
        devices,
        lines_read: lines.len(),
        skipped,
    })
}
