use thiserror::Error;

use crate::config::ConfigError;

pub mod utils;
pub mod structs;
pub mod parser;
pub mod response_definitions;
pub mod transport;
pub mod commands;
#[cfg(feature = "monitor")]
pub mod monitor;

pub use commands::{Command, CommandArg, CommandName};
pub use parser::decode_fragment;
pub use structs::Fragment;
pub use transport::{Connection, FragmentReader, Readings};

/// Failures of the serial transport
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("Unable to open serial port {port}: {source}")]
    Open {
        port: String,
        #[source]
        source: serialport::Error,
    },
    #[error("Serial I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serial connection closed")]
    Closed,
}

/// A fragment that can not be turned into a reading
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Malformed XML: {0}")]
    Xml(String),
    #[error("Fragment has no root element")]
    MissingRoot,
    #[error("Fragment has more than one root element")]
    MultipleRoots,
    #[error("Element <{0}> is nested deeper than one level")]
    NestedElement(String),
    #[error("Unexpected text outside of a field: {0}")]
    UnexpectedText(String),
    #[error("Unknown response type: {0}")]
    UnknownResponseType(String),
    #[error("Field {0} appears more than once")]
    DuplicateField(String),
    #[error("Field {0} clashes with a reading key")]
    ReservedField(String),
    #[error("Missing required field {field} in {response}")]
    MissingField { response: String, field: String },
    #[error("Invalid value for {field}: {value:?}")]
    InvalidValue { field: String, value: String },
    #[error("Value {value} for {field} is out of range")]
    OutOfRange { field: String, value: u64 },
}

/// Command arguments rejected before anything is written to the device
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CommandError {
    #[error("Command {command} does not take argument {argument}")]
    UnknownArgument { command: String, argument: String },
    #[error("Command {command} requires argument {argument}")]
    MissingArgument { command: String, argument: String },
    #[error("Value {value} for {argument} is out of range")]
    OutOfRange { argument: String, value: u64 },
    #[error("Invalid value for {argument}: {reason}")]
    InvalidArgument { argument: String, reason: String },
    #[error("Unable to render command: {0}")]
    Xml(String),
}

#[derive(Error, Debug)]
pub enum RavenError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
