use super::{parser, ParseError};
use crate::models::Reading;

/// How a raw hex numerator becomes a decimal value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scale {
    /// value * multiplier / divisor, zero counts as one
    Ratio {
        multiplier: &'static str,
        divisor: &'static str,
    },
    /// value / 10^digits
    TrailingDigits(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EnumKind {
    Status,
    Event,
    MeterType,
    Queue,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldKind {
    Text,
    Integer { min: u64, max: u64 },
    Hex { min: u64, max: u64 },
    Identifier,
    Timestamp,
    Flag,
    Currency,
    Scaled { max: u64, scale: Scale },
    Enumerated(EnumKind),
    HexList { max: u64 },
}

#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    pub default: Option<&'static str>,
}

impl FieldSpec {
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        FieldSpec {
            name,
            kind,
            required: false,
            default: None,
        }
    }

    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub const fn with_default(mut self, default: &'static str) -> Self {
        self.default = Some(default);
        self
    }
}

#[derive(Debug, Clone)]
pub struct ResponseDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub fields: Vec<FieldSpec>,
}

impl ResponseDefinition {
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn required_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|f| f.required)
    }
}

/// One root element as it came off the serial line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub tag: String,
    pub xml: String,
}

impl Fragment {
    pub fn decode(&self) -> Result<Reading, ParseError> {
        parser::decode_fragment(&self.xml)
    }
}
