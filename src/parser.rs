use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationRecord {
    pub mac: String,
    pub connected_time_seconds: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdcKind {
    Current,
    Voltage,
}

impl AdcKind {
    fn from_token(raw: &str) -> Option<Self> {
        match raw {
            "current" => Some(AdcKind::Current),
            "volt" => Some(AdcKind::Voltage),
            _ => None,
        }
    }

    /// Token as it appears in the ADC output, also used as the `type` label.
    pub fn as_label(self) -> &'static str {
        match self {
            AdcKind::Current => "current",
            AdcKind::Voltage => "volt",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdcReading {
    pub name: String,
    pub kind: AdcKind,
    pub value: f64,
}

/// Parses `iw dev <if> station dump` output.
///
/// A `Station <mac>` line opens a block; the block becomes a record only if a
/// `connected time: <N> seconds` line follows before the next header or EOF.
pub fn parse_station_dump(text: &str) -> Vec<StationRecord> {
    let mut stations = Vec::new();
    // None: no block open. Some(None): block with a malformed mac, fields are discarded.
    let mut current: Option<Option<String>> = None;
    let mut connected: Option<u64> = None;

    for line in text.lines() {
        let line = line.trim();
        if let Some(rest) = station_header(line) {
            flush_station(&mut stations, current.take(), connected.take());
            current = Some(parse_mac(rest));
            continue;
        }
        if current.is_some() {
            if let Some(secs) = parse_connected_time(line) {
                connected = Some(secs);
            }
        }
    }
    flush_station(&mut stations, current, connected);

    stations
}

fn flush_station(out: &mut Vec<StationRecord>, block: Option<Option<String>>, secs: Option<u64>) {
    if let (Some(Some(mac)), Some(secs)) = (block, secs) {
        out.push(StationRecord {
            mac,
            connected_time_seconds: secs,
        });
    }
}

fn station_header(line: &str) -> Option<&str> {
    let rest = line.strip_prefix("Station")?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    Some(rest.trim_start())
}

fn parse_mac(rest: &str) -> Option<String> {
    let token = rest.split_whitespace().next()?;
    let pairs: Vec<&str> = token.split(':').collect();
    let valid = token.len() == 17
        && pairs.len() == 6
        && pairs.iter().all(|pair| {
            pair.len() == 2
                && pair
                    .chars()
                    .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
        });
    valid.then(|| token.to_string())
}

fn parse_connected_time(line: &str) -> Option<u64> {
    let rest = line.strip_prefix("connected time:")?;
    let mut tokens = rest.split_whitespace();
    let secs = tokens.next()?;
    if tokens.next()? != "seconds" || !secs.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    secs.parse::<u64>().ok()
}

/// Parses `vcgencmd pmic_read_adc` output, e.g. `VDD_CORE_V volt(15)=0.80000000V`.
pub fn parse_adc_readings(text: &str) -> Vec<AdcReading> {
    text.lines().filter_map(parse_adc_line).collect()
}

fn parse_adc_line(line: &str) -> Option<AdcReading> {
    let (head, tail) = line.trim().split_once(' ')?;

    let name = head.strip_suffix("_V").or_else(|| head.strip_suffix("_A"))?;
    if name.is_empty()
        || !name
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
    {
        return None;
    }

    let (kind_token, rest) = tail.split_once('(')?;
    let kind = AdcKind::from_token(kind_token)?;

    let (channel, rest) = rest.split_once(")=")?;
    if channel.is_empty() || !channel.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let numeric_len = rest
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(rest.len());
    let value = rest[..numeric_len].parse::<f64>().ok()?;

    Some(AdcReading {
        name: name.to_string(),
        kind,
        value,
    })
}
