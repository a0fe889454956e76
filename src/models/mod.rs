use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::fmt;

/// Builds an enumeration whose variants map 1:1 onto the labels the RAVEn
/// puts on the wire.
macro_rules! wire_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $label:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const LEVELS: &'static [&'static str] = &[$($label),+];

            pub fn from_wire(s: &str) -> Option<Self> {
                match s {
                    $($label => Some($name::$variant),)+
                    _ => None,
                }
            }

            pub fn as_wire(&self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_wire())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_wire())
            }
        }
    };
}

wire_enum!(
    /// Network join state reported in ConnectionStatus and NetworkInfo
    ConnectionState {
        Initializing => "Initializing...",
        Network => "Network",
        Joining => "Joining",
        JoinFail => "Join: Fail",
        JoinSuccess => "Join: Success",
        Authenticating => "Authenticating",
        AuthenticatingSuccess => "Authenticating: Success",
        AuthenticatingFail => "Authenticating: Fail",
        Connected => "Connected",
        Disconnected => "Disconnected",
        Rejoining => "Rejoining",
    }
);

wire_enum!(
    /// Scheduler event names used by ScheduleInfo and the schedule commands
    ScheduleEvent {
        Time => "time",
        Price => "price",
        Demand => "demand",
        Summation => "summation",
        Message => "message",
    }
);

wire_enum!(
    MeterKind {
        Electric => "electric",
        Gas => "gas",
        Water => "water",
        Other => "other",
    }
);

wire_enum!(
    MessageQueue {
        Active => "Active",
        CancelPending => "Cancel Pending",
    }
);

wire_enum!(
    /// Profile data channel selector for GET_PROFILE_DATA
    IntervalChannel {
        Delivered => "Delivered",
        Received => "Received",
    }
);

/// Raw identifier bytes (MAC ids, install codes, link keys).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HexId(pub Vec<u8>);

impl HexId {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for HexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(&self.0))
    }
}

impl Serialize for HexId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// ISO 4217 currency, `code` is only known for the numbers in our table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Currency {
    pub number: u16,
    pub code: Option<&'static str>,
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => f.write_str(code),
            None => write!(f, "{:03}", self.number),
        }
    }
}

impl Serialize for Currency {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A single decoded field of a [`Reading`]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Integer(u64),
    Decimal(f64),
    Timestamp(DateTime<Utc>),
    Flag(bool),
    Identifier(HexId),
    Currency(Currency),
    Status(ConnectionState),
    Event(ScheduleEvent),
    MeterType(MeterKind),
    Queue(MessageQueue),
    List(Vec<u64>),
}

impl FieldValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<u64> {
        match self {
            FieldValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Numeric view of the value, integers are widened
    pub fn as_decimal(&self) -> Option<f64> {
        match self {
            FieldValue::Decimal(v) => Some(*v),
            FieldValue::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            FieldValue::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            FieldValue::Flag(b) => Some(*b),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Text(_) => "text",
            FieldValue::Integer(_) => "integer",
            FieldValue::Decimal(_) => "decimal",
            FieldValue::Timestamp(_) => "timestamp",
            FieldValue::Flag(_) => "flag",
            FieldValue::Identifier(_) => "identifier",
            FieldValue::Currency(_) => "currency",
            FieldValue::Status(_) => "status",
            FieldValue::Event(_) => "event",
            FieldValue::MeterType(_) => "meter_type",
            FieldValue::Queue(_) => "queue",
            FieldValue::List(_) => "list",
        }
    }
}

/// One decoded RAVEn notification.
///
/// Fields keep the order in which they appeared in the fragment. A reading is
/// never modified after the decoder hands it out.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    response_type: String,
    fields: Vec<(String, FieldValue)>,
    received_at: DateTime<Utc>,
}

impl Reading {
    pub(crate) fn new(response_type: String, fields: Vec<(String, FieldValue)>) -> Self {
        Reading {
            response_type,
            fields,
            received_at: Utc::now(),
        }
    }

    /// Root tag of the fragment, e.g. `InstantaneousDemand`
    pub fn response_type(&self) -> &str {
        &self.response_type
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get_decimal(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(FieldValue::as_decimal)
    }

    pub fn get_timestamp(&self, name: &str) -> Option<DateTime<Utc>> {
        self.get(name).and_then(FieldValue::as_timestamp)
    }

    pub fn get_flag(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(FieldValue::as_flag)
    }

    pub fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}

impl Serialize for Reading {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len() + 2))?;
        map.serialize_entry("Type", &self.response_type)?;
        for (key, value) in &self.fields {
            map.serialize_entry(key, value)?;
        }
        map.serialize_entry("ReceivedAt", &self.received_at)?;
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_enum_labels() {
        assert_eq!(ConnectionState::from_wire("Join: Fail"), Some(ConnectionState::JoinFail));
        assert_eq!(ConnectionState::Initializing.as_wire(), "Initializing...");
        assert_eq!(ScheduleEvent::from_wire("summation"), Some(ScheduleEvent::Summation));
        assert_eq!(MessageQueue::CancelPending.to_string(), "Cancel Pending");
        assert_eq!(MeterKind::from_wire("Electric"), None);
        assert_eq!(ConnectionState::LEVELS.len(), 11);
    }

    #[test]
    fn test_hex_id_display() {
        let id = HexId(vec![0xd8, 0xd5, 0xb9, 0x00, 0x00, 0x00, 0x12, 0x34]);
        assert_eq!(id.to_string(), "0xd8d5b90000001234");
    }

    #[test]
    fn test_reading_accessors() {
        let reading = Reading::new(
            "InstantaneousDemand".to_string(),
            vec![
                ("Demand".to_string(), FieldValue::Decimal(0.632)),
                ("Multiplier".to_string(), FieldValue::Integer(1)),
                ("SuppressLeadingZero".to_string(), FieldValue::Flag(true)),
            ],
        );

        assert_eq!(reading.response_type(), "InstantaneousDemand");
        assert_eq!(reading.len(), 3);
        assert_eq!(reading.get_decimal("Demand"), Some(0.632));
        assert_eq!(reading.get_decimal("Multiplier"), Some(1.0));
        assert_eq!(reading.get_flag("SuppressLeadingZero"), Some(true));
        assert!(reading.get("Divisor").is_none());

        let names: Vec<&str> = reading.fields().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["Demand", "Multiplier", "SuppressLeadingZero"]);
    }

    #[test]
    fn test_reading_json() {
        let reading = Reading::new(
            "MeterInfo".to_string(),
            vec![
                ("MeterMacId".to_string(), FieldValue::Identifier(HexId(vec![0x00, 0x13]))),
                ("MeterType".to_string(), FieldValue::MeterType(MeterKind::Electric)),
                ("Enabled".to_string(), FieldValue::Flag(false)),
            ],
        );

        let json = reading.to_json().unwrap();
        assert_eq!(json["Type"], "MeterInfo");
        assert_eq!(json["MeterMacId"], "0x0013");
        assert_eq!(json["MeterType"], "electric");
        assert_eq!(json["Enabled"], false);
        assert!(json["ReceivedAt"].is_string());
    }

    #[test]
    fn test_currency_display() {
        let usd = Currency { number: 840, code: Some("USD") };
        let unknown = Currency { number: 7, code: None };
        assert_eq!(usd.to_string(), "USD");
        assert_eq!(unknown.to_string(), "007");
    }
}
