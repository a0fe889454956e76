//! Requests understood by the gateway.
//!
//! A command is rendered as a flat `<Command>` element: the `Name` child
//! followed by the arguments in the order the gateway documents them.
//!
//! ```
//! use raven2log::{Command, CommandName};
//!
//! let xml = Command::new(CommandName::SetFastPoll)
//!     .arg("Frequency", 4u64)
//!     .arg("Duration", 900u64)
//!     .to_xml()
//!     .unwrap();
//! assert_eq!(
//!     xml,
//!     "<Command><Name>set_fast_poll</Name><Frequency>0x4</Frequency><Duration>0x384</Duration></Command>"
//! );
//! ```

use super::utils;
use super::CommandError;
use crate::models::{HexId, IntervalChannel, ScheduleEvent};
use chrono::{DateTime, Utc};
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandName {
    Initialize,
    Restart,
    FactoryReset,
    GetConnectionStatus,
    GetDeviceInfo,
    GetSchedule,
    SetSchedule,
    SetScheduleDefault,
    GetMeterList,
    GetMeterInfo,
    GetNetworkInfo,
    SetMeterInfo,
    GetTime,
    GetMessage,
    ConfirmMessage,
    GetCurrentPrice,
    SetCurrentPrice,
    GetInstantaneousDemand,
    GetCurrentSummationDelivered,
    GetCurrentPeriodUsage,
    GetLastPeriodUsage,
    CloseCurrentPeriod,
    SetFastPoll,
    GetProfileData,
}

impl CommandName {
    pub fn as_wire(&self) -> &'static str {
        match self {
            CommandName::Initialize => "initialize",
            CommandName::Restart => "restart",
            CommandName::FactoryReset => "factory_reset",
            CommandName::GetConnectionStatus => "get_connection_status",
            CommandName::GetDeviceInfo => "get_device_info",
            CommandName::GetSchedule => "get_schedule",
            CommandName::SetSchedule => "set_schedule",
            CommandName::SetScheduleDefault => "set_schedule_default",
            CommandName::GetMeterList => "get_meter_list",
            CommandName::GetMeterInfo => "get_meter_info",
            CommandName::GetNetworkInfo => "get_network_info",
            CommandName::SetMeterInfo => "set_meter_info",
            CommandName::GetTime => "get_time",
            CommandName::GetMessage => "get_message",
            CommandName::ConfirmMessage => "confirm_message",
            CommandName::GetCurrentPrice => "get_current_price",
            CommandName::SetCurrentPrice => "set_current_price",
            CommandName::GetInstantaneousDemand => "get_instantaneous_demand",
            CommandName::GetCurrentSummationDelivered => "get_current_summation_delivered",
            CommandName::GetCurrentPeriodUsage => "get_current_period_usage",
            CommandName::GetLastPeriodUsage => "get_last_period_usage",
            CommandName::CloseCurrentPeriod => "close_current_period",
            CommandName::SetFastPoll => "set_fast_poll",
            CommandName::GetProfileData => "get_profile_data",
        }
    }

    /// Arguments in wire order
    pub fn arguments(&self) -> &'static [ArgSpec] {
        match self {
            CommandName::Initialize
            | CommandName::Restart
            | CommandName::FactoryReset
            | CommandName::GetConnectionStatus
            | CommandName::GetDeviceInfo
            | CommandName::GetMeterList
            | CommandName::GetNetworkInfo => &[],
            CommandName::GetSchedule | CommandName::SetScheduleDefault => &[METER, EVENT],
            CommandName::SetSchedule => SET_SCHEDULE_ARGS,
            CommandName::GetMeterInfo
            | CommandName::GetCurrentPeriodUsage
            | CommandName::GetLastPeriodUsage
            | CommandName::CloseCurrentPeriod => &[METER],
            CommandName::SetMeterInfo => SET_METER_INFO_ARGS,
            CommandName::GetTime
            | CommandName::GetMessage
            | CommandName::GetCurrentPrice
            | CommandName::GetInstantaneousDemand
            | CommandName::GetCurrentSummationDelivered => &[METER, REFRESH],
            CommandName::ConfirmMessage => CONFIRM_MESSAGE_ARGS,
            CommandName::SetCurrentPrice => SET_CURRENT_PRICE_ARGS,
            CommandName::SetFastPoll => SET_FAST_POLL_ARGS,
            CommandName::GetProfileData => GET_PROFILE_DATA_ARGS,
        }
    }
}

impl fmt::Display for CommandName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ArgKind {
    Identifier,
    Hex { min: u64, max: u64 },
    Flag,
    Text,
    Event,
    Channel,
    Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArgSpec {
    pub name: &'static str,
    pub kind: ArgKind,
    pub required: bool,
}

impl ArgSpec {
    pub const fn required(name: &'static str, kind: ArgKind) -> Self {
        ArgSpec { name, kind, required: true }
    }

    pub const fn optional(name: &'static str, kind: ArgKind) -> Self {
        ArgSpec { name, kind, required: false }
    }
}

const METER: ArgSpec = ArgSpec::optional("MeterMacId", ArgKind::Identifier);
const REFRESH: ArgSpec = ArgSpec::optional("Refresh", ArgKind::Flag);
const EVENT: ArgSpec = ArgSpec::optional("Event", ArgKind::Event);

const SET_SCHEDULE_ARGS: &[ArgSpec] = &[
    METER,
    ArgSpec::required("Event", ArgKind::Event),
    ArgSpec::required("Frequency", ArgKind::Hex { min: 0, max: 0xffff_fffe }),
    ArgSpec::required("Enabled", ArgKind::Flag),
];

const SET_METER_INFO_ARGS: &[ArgSpec] = &[
    METER,
    ArgSpec::optional("NickName", ArgKind::Text),
    ArgSpec::optional("Account", ArgKind::Text),
    ArgSpec::optional("Auth", ArgKind::Text),
    ArgSpec::optional("Host", ArgKind::Text),
    ArgSpec::optional("Enabled", ArgKind::Flag),
];

const CONFIRM_MESSAGE_ARGS: &[ArgSpec] = &[
    METER,
    ArgSpec::required("Id", ArgKind::Hex { min: 0, max: 0xffff_ffff }),
];

const SET_CURRENT_PRICE_ARGS: &[ArgSpec] = &[
    METER,
    ArgSpec::required("Price", ArgKind::Hex { min: 0, max: 0xffff_ffff }),
    ArgSpec::required("TrailingDigits", ArgKind::Hex { min: 0, max: 0xff }),
];

const SET_FAST_POLL_ARGS: &[ArgSpec] = &[
    METER,
    ArgSpec::required("Frequency", ArgKind::Hex { min: 4, max: 0xffff }),
    ArgSpec::required("Duration", ArgKind::Hex { min: 0, max: 900 }),
];

const GET_PROFILE_DATA_ARGS: &[ArgSpec] = &[
    METER,
    ArgSpec::required("NumberOfPeriods", ArgKind::Hex { min: 0, max: 12 }),
    ArgSpec::required("EndTime", ArgKind::Timestamp),
    ArgSpec::required("IntervalChannel", ArgKind::Channel),
];

#[derive(Debug, Clone, PartialEq)]
pub enum CommandArg {
    Number(u64),
    Text(String),
    Flag(bool),
    Identifier(HexId),
    Event(ScheduleEvent),
    Channel(IntervalChannel),
    Time(DateTime<Utc>),
}

impl From<u64> for CommandArg {
    fn from(value: u64) -> Self {
        CommandArg::Number(value)
    }
}

impl From<bool> for CommandArg {
    fn from(value: bool) -> Self {
        CommandArg::Flag(value)
    }
}

impl From<&str> for CommandArg {
    fn from(value: &str) -> Self {
        CommandArg::Text(value.to_string())
    }
}

impl From<String> for CommandArg {
    fn from(value: String) -> Self {
        CommandArg::Text(value)
    }
}

impl From<HexId> for CommandArg {
    fn from(value: HexId) -> Self {
        CommandArg::Identifier(value)
    }
}

impl From<ScheduleEvent> for CommandArg {
    fn from(value: ScheduleEvent) -> Self {
        CommandArg::Event(value)
    }
}

impl From<IntervalChannel> for CommandArg {
    fn from(value: IntervalChannel) -> Self {
        CommandArg::Channel(value)
    }
}

impl From<DateTime<Utc>> for CommandArg {
    fn from(value: DateTime<Utc>) -> Self {
        CommandArg::Time(value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    name: CommandName,
    args: Vec<(String, CommandArg)>,
}

impl Command {
    pub fn new(name: CommandName) -> Self {
        Command { name, args: Vec::new() }
    }

    pub fn name(&self) -> CommandName {
        self.name
    }

    /// Sets an argument, names match case-insensitively
    pub fn arg(mut self, name: &str, value: impl Into<CommandArg>) -> Self {
        self.args.retain(|(known, _)| !known.eq_ignore_ascii_case(name));
        self.args.push((name.to_string(), value.into()));
        self
    }

    pub fn has_arg(&self, name: &str) -> bool {
        self.args.iter().any(|(known, _)| known.eq_ignore_ascii_case(name))
    }

    pub fn accepts(&self, name: &str) -> bool {
        self.name
            .arguments()
            .iter()
            .any(|spec| spec.name.eq_ignore_ascii_case(name))
    }

    fn lookup(&self, name: &str) -> Option<&CommandArg> {
        self.args
            .iter()
            .find(|(known, _)| known.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    }

    pub fn to_xml(&self) -> Result<String, CommandError> {
        for (name, _) in &self.args {
            if !self.accepts(name) {
                return Err(CommandError::UnknownArgument {
                    command: self.name.to_string(),
                    argument: name.clone(),
                });
            }
        }

        let mut writer = Writer::new(Vec::new());
        write_start(&mut writer, "Command")?;
        write_element(&mut writer, "Name", self.name.as_wire())?;

        for spec in self.name.arguments() {
            match self.lookup(spec.name) {
                Some(value) => {
                    let text = format_argument(spec, value)?;
                    write_element(&mut writer, spec.name, &text)?;
                }
                None if spec.required => {
                    return Err(CommandError::MissingArgument {
                        command: self.name.to_string(),
                        argument: spec.name.to_string(),
                    });
                }
                None => {}
            }
        }

        write_end(&mut writer, "Command")?;
        String::from_utf8(writer.into_inner()).map_err(|e| CommandError::Xml(e.to_string()))
    }
}

fn write_start(writer: &mut Writer<Vec<u8>>, name: &str) -> Result<(), CommandError> {
    writer
        .write_event(Event::Start(BytesStart::new(name)))
        .map_err(|e| CommandError::Xml(e.to_string()))
}

fn write_end(writer: &mut Writer<Vec<u8>>, name: &str) -> Result<(), CommandError> {
    writer
        .write_event(Event::End(BytesEnd::new(name)))
        .map_err(|e| CommandError::Xml(e.to_string()))
}

fn write_element(writer: &mut Writer<Vec<u8>>, name: &str, text: &str) -> Result<(), CommandError> {
    write_start(writer, name)?;
    writer
        .write_event(Event::Text(BytesText::new(text)))
        .map_err(|e| CommandError::Xml(e.to_string()))?;
    write_end(writer, name)
}

fn invalid(spec: &ArgSpec, reason: &str) -> CommandError {
    CommandError::InvalidArgument {
        argument: spec.name.to_string(),
        reason: reason.to_string(),
    }
}

fn format_argument(spec: &ArgSpec, value: &CommandArg) -> Result<String, CommandError> {
    match (spec.kind, value) {
        (ArgKind::Identifier, CommandArg::Identifier(id)) => Ok(id.to_string()),
        (ArgKind::Identifier, CommandArg::Text(text)) => utils::parse_hex_bytes(spec.name, text)
            .map(|id| id.to_string())
            .map_err(|_| invalid(spec, "expected a hexadecimal identifier")),
        (ArgKind::Identifier, CommandArg::Number(n)) => Ok(utils::format_hex(*n)),
        (ArgKind::Hex { min, max }, CommandArg::Number(n)) => {
            if *n < min || *n > max {
                return Err(CommandError::OutOfRange {
                    argument: spec.name.to_string(),
                    value: *n,
                });
            }
            Ok(utils::format_hex(*n))
        }
        (ArgKind::Flag, CommandArg::Flag(b)) => Ok(utils::format_flag(*b).to_string()),
        (ArgKind::Text, CommandArg::Text(text)) => Ok(text.clone()),
        (ArgKind::Event, CommandArg::Event(event)) => Ok(event.as_wire().to_string()),
        (ArgKind::Event, CommandArg::Text(text)) => ScheduleEvent::from_wire(text)
            .map(|event| event.as_wire().to_string())
            .ok_or_else(|| invalid(spec, "unknown event")),
        (ArgKind::Channel, CommandArg::Channel(channel)) => Ok(channel.as_wire().to_string()),
        (ArgKind::Channel, CommandArg::Text(text)) => IntervalChannel::from_wire(text)
            .map(|channel| channel.as_wire().to_string())
            .ok_or_else(|| invalid(spec, "unknown interval channel")),
        (ArgKind::Timestamp, CommandArg::Time(time)) => utils::utc_to_raven_time(time)
            .map(utils::format_hex)
            .ok_or_else(|| invalid(spec, "time outside of the device range")),
        (ArgKind::Timestamp, CommandArg::Number(n)) => {
            if *n > 0xffff_ffff {
                return Err(CommandError::OutOfRange {
                    argument: spec.name.to_string(),
                    value: *n,
                });
            }
            Ok(utils::format_hex(*n))
        }
        (kind, _) => Err(invalid(spec, &format!("wrong value type for {:?}", kind))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_command_without_arguments() {
        let xml = Command::new(CommandName::Initialize).to_xml().unwrap();
        assert_eq!(xml, "<Command><Name>initialize</Name></Command>");
    }

    #[test]
    fn test_arguments_in_wire_order() {
        let xml = Command::new(CommandName::SetSchedule)
            .arg("enabled", true)
            .arg("Frequency", 30u64)
            .arg("Event", ScheduleEvent::Demand)
            .arg("MeterMacId", HexId(vec![0x00, 0x13, 0x50, 0x03]))
            .to_xml()
            .unwrap();

        assert_eq!(
            xml,
            "<Command><Name>set_schedule</Name><MeterMacId>0x00135003</MeterMacId><Event>demand</Event><Frequency>0x1e</Frequency><Enabled>Y</Enabled></Command>"
        );
    }

    #[test]
    fn test_profile_data_command() {
        let end = Utc.with_ymd_and_hms(2015, 1, 1, 0, 0, 0).unwrap();
        let xml = Command::new(CommandName::GetProfileData)
            .arg("NumberOfPeriods", 12u64)
            .arg("EndTime", end)
            .arg("IntervalChannel", IntervalChannel::Delivered)
            .to_xml()
            .unwrap();

        assert!(xml.contains("<NumberOfPeriods>0xc</NumberOfPeriods>"));
        assert!(xml.contains("<EndTime>0x1c374a80</EndTime>"));
        assert!(xml.contains("<IntervalChannel>Delivered</IntervalChannel>"));
    }

    #[test]
    fn test_text_is_escaped() {
        let xml = Command::new(CommandName::SetMeterInfo)
            .arg("NickName", "Shed & Garage")
            .to_xml()
            .unwrap();
        assert!(xml.contains("<NickName>Shed &amp; Garage</NickName>"));
    }

    #[test]
    fn test_missing_required_argument() {
        let result = Command::new(CommandName::ConfirmMessage).to_xml();
        assert_eq!(
            result,
            Err(CommandError::MissingArgument {
                command: "confirm_message".to_string(),
                argument: "Id".to_string(),
            })
        );
    }

    #[test]
    fn test_unknown_argument() {
        let result = Command::new(CommandName::Restart).arg("Refresh", true).to_xml();
        assert!(matches!(result, Err(CommandError::UnknownArgument { .. })));
    }

    #[test]
    fn test_out_of_range_argument() {
        let result = Command::new(CommandName::SetFastPoll)
            .arg("Frequency", 2u64)
            .arg("Duration", 60u64)
            .to_xml();
        assert_eq!(
            result,
            Err(CommandError::OutOfRange { argument: "Frequency".to_string(), value: 2 })
        );

        let result = Command::new(CommandName::GetProfileData)
            .arg("NumberOfPeriods", 13u64)
            .arg("EndTime", 0u64)
            .arg("IntervalChannel", "Received")
            .to_xml();
        assert!(matches!(result, Err(CommandError::OutOfRange { .. })));
    }

    #[test]
    fn test_wrong_argument_type() {
        let result = Command::new(CommandName::GetTime).arg("Refresh", "yes").to_xml();
        assert!(matches!(result, Err(CommandError::InvalidArgument { .. })));

        let result = Command::new(CommandName::GetTime).arg("MeterMacId", "not-hex").to_xml();
        assert!(matches!(result, Err(CommandError::InvalidArgument { .. })));
    }

    #[test]
    fn test_arg_replaces_previous_value() {
        let command = Command::new(CommandName::GetTime)
            .arg("Refresh", true)
            .arg("refresh", false);
        assert!(command.has_arg("REFRESH"));
        assert_eq!(
            command.to_xml().unwrap(),
            "<Command><Name>get_time</Name><Refresh>N</Refresh></Command>"
        );
    }

    #[test]
    fn test_argument_tables() {
        let names: Vec<&str> = CommandName::GetProfileData.arguments().iter().map(|a| a.name).collect();
        assert_eq!(names, vec!["MeterMacId", "NumberOfPeriods", "EndTime", "IntervalChannel"]);

        assert_eq!(CommandName::SetSchedule.arguments().len(), 4);
        assert_eq!(CommandName::SetMeterInfo.arguments().len(), 6);
        assert_eq!(CommandName::ConfirmMessage.arguments()[1].name, "Id");
        assert!(CommandName::SetCurrentPrice.arguments()[2].required);
        assert_eq!(
            CommandName::SetFastPoll.arguments()[1].kind,
            ArgKind::Hex { min: 4, max: 0xffff }
        );
        assert!(CommandName::Restart.arguments().is_empty());
    }

    #[test]
    fn test_every_command_renders() {
        let names = [
            CommandName::Initialize, CommandName::Restart, CommandName::FactoryReset,
            CommandName::GetConnectionStatus, CommandName::GetDeviceInfo, CommandName::GetSchedule,
            CommandName::SetScheduleDefault, CommandName::GetMeterList, CommandName::GetMeterInfo,
            CommandName::GetNetworkInfo, CommandName::SetMeterInfo, CommandName::GetTime,
            CommandName::GetMessage, CommandName::GetCurrentPrice,
            CommandName::GetInstantaneousDemand, CommandName::GetCurrentSummationDelivered,
            CommandName::GetCurrentPeriodUsage, CommandName::GetLastPeriodUsage,
            CommandName::CloseCurrentPeriod,
        ];
        for name in names {
            let xml = Command::new(name).to_xml().unwrap();
            assert_eq!(xml, format!("<Command><Name>{}</Name></Command>", name));
        }
    }
}
