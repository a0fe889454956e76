use super::response_definitions::get_response_definition;
use super::structs::{EnumKind, FieldKind, FieldSpec, ResponseDefinition, Scale};
use super::utils;
use super::ParseError;
use crate::models::{ConnectionState, FieldValue, MessageQueue, MeterKind, Reading, ScheduleEvent};
use log::debug;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// Decodes one fragment into a [`Reading`].
///
/// The root tag selects the response definition. Fragments with a root tag
/// that is not in the table fail with [`ParseError::UnknownResponseType`];
/// it is up to the caller to skip or report them.
pub fn decode_fragment(xml: &str) -> Result<Reading, ParseError> {
    let (root, children) = split_fragment(xml)?;

    let definition = get_response_definition(&root)
        .ok_or_else(|| ParseError::UnknownResponseType(root.clone()))?;

    decode_fields(definition, children)
}

/// Keys a serialized Reading already uses for itself
const RESERVED_KEYS: [&str; 2] = ["Type", "ReceivedAt"];

fn xml_error<E: std::fmt::Display>(e: E) -> ParseError {
    ParseError::Xml(e.to_string())
}

fn element_name(element: &BytesStart) -> Result<String, ParseError> {
    String::from_utf8(element.name().as_ref().to_vec()).map_err(xml_error)
}

/// Splits a fragment into its root tag and the (tag, text) pairs of its
/// children. Anything deeper than one level is rejected.
fn split_fragment(xml: &str) -> Result<(String, Vec<(String, String)>), ParseError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut root: Option<String> = None;
    let mut root_closed = false;
    let mut children: Vec<(String, String)> = Vec::new();
    let mut current: Option<(String, String)> = None;
    let mut depth = 0usize;

    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(e) => {
                let name = element_name(&e)?;
                match depth {
                    0 => {
                        if root.is_some() {
                            return Err(ParseError::MultipleRoots);
                        }
                        root = Some(name);
                    }
                    1 => current = Some((name, String::new())),
                    _ => return Err(ParseError::NestedElement(name)),
                }
                depth += 1;
            }
            Event::Empty(e) => {
                let name = element_name(&e)?;
                match depth {
                    0 => {
                        if root.is_some() {
                            return Err(ParseError::MultipleRoots);
                        }
                        root = Some(name);
                        root_closed = true;
                    }
                    1 => children.push((name, String::new())),
                    _ => return Err(ParseError::NestedElement(name)),
                }
            }
            Event::Text(t) => {
                let text = t.unescape().map_err(xml_error)?;
                match current.as_mut() {
                    Some((_, value)) if depth == 2 => value.push_str(&text),
                    _ => {
                        if !text.trim().is_empty() {
                            return Err(ParseError::UnexpectedText(text.into_owned()));
                        }
                    }
                }
            }
            Event::CData(c) => {
                let raw = c.into_inner();
                let text = String::from_utf8_lossy(&raw);
                match current.as_mut() {
                    Some((_, value)) if depth == 2 => value.push_str(&text),
                    _ => return Err(ParseError::UnexpectedText(text.into_owned())),
                }
            }
            Event::End(_) => {
                depth = depth.checked_sub(1).ok_or_else(|| xml_error("unbalanced closing tag"))?;
                match depth {
                    0 => root_closed = true,
                    1 => {
                        if let Some(child) = current.take() {
                            children.push(child);
                        }
                    }
                    _ => {}
                }
            }
            Event::Eof => break,
            // declarations, comments and processing instructions carry no data
            _ => {}
        }
    }

    let root = root.ok_or(ParseError::MissingRoot)?;
    if depth != 0 || !root_closed {
        return Err(xml_error(format!("fragment <{}> is not closed", root)));
    }

    Ok((root, children))
}

fn decode_fields(
    definition: &ResponseDefinition,
    children: Vec<(String, String)>,
) -> Result<Reading, ParseError> {
    let mut fields: Vec<(String, FieldValue)> = Vec::with_capacity(definition.fields.len());

    for (name, text) in children {
        if fields.iter().any(|(known, _)| *known == name) {
            return Err(ParseError::DuplicateField(name));
        }

        let value = match definition.field(&name) {
            Some(spec) => convert_field(spec, text.trim())?,
            None if RESERVED_KEYS.contains(&name.as_str()) => {
                return Err(ParseError::ReservedField(name));
            }
            None => {
                debug!("Keeping unlisted field {} of {} as text", name, definition.name);
                FieldValue::Text(text)
            }
        };
        fields.push((name, value));
    }

    for spec in &definition.fields {
        if fields.iter().any(|(name, _)| name == spec.name) {
            continue;
        }

        if let Some(default) = spec.default {
            fields.push((spec.name.to_string(), convert_field(spec, default)?));
        } else if spec.required {
            return Err(ParseError::MissingField {
                response: definition.name.to_string(),
                field: spec.name.to_string(),
            });
        }
    }

    apply_scaling(definition, &mut fields);

    debug!("Decoded {} with {} fields", definition.name, fields.len());
    Ok(Reading::new(definition.name.to_string(), fields))
}

pub fn convert_field(spec: &FieldSpec, text: &str) -> Result<FieldValue, ParseError> {
    let field = spec.name;

    let value = match spec.kind {
        FieldKind::Text => FieldValue::Text(text.to_string()),
        FieldKind::Integer { min, max } => {
            let value = utils::parse_decimal_u64(field, text)?;
            FieldValue::Integer(utils::check_range(field, value, min, max)?)
        }
        FieldKind::Hex { min, max } => {
            let value = utils::parse_hex_u64(field, text)?;
            FieldValue::Integer(utils::check_range(field, value, min, max)?)
        }
        // scaling needs the whole fragment, see apply_scaling
        FieldKind::Scaled { max, .. } => {
            let value = utils::parse_hex_u64(field, text)?;
            FieldValue::Integer(utils::check_range(field, value, 0, max)?)
        }
        FieldKind::Identifier => FieldValue::Identifier(utils::parse_hex_bytes(field, text)?),
        FieldKind::Timestamp => {
            let seconds = utils::parse_hex_u64(field, text)?;
            let seconds = utils::check_range(field, seconds, 0, 0xffff_ffff)?;
            let time = utils::raven_time_to_utc(seconds).ok_or_else(|| ParseError::OutOfRange {
                field: field.to_string(),
                value: seconds,
            })?;
            FieldValue::Timestamp(time)
        }
        FieldKind::Flag => FieldValue::Flag(utils::parse_flag(field, text)?),
        FieldKind::Currency => {
            let number = utils::parse_hex_u64(field, text)?;
            let number = utils::check_range(field, number, 0, 999)?;
            FieldValue::Currency(utils::lookup_currency(number as u16))
        }
        FieldKind::Enumerated(kind) => convert_enumeration(field, kind, text)?,
        FieldKind::HexList { max } => {
            let mut values = Vec::new();
            for item in text.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                let value = utils::parse_hex_u64(field, item)?;
                values.push(utils::check_range(field, value, 0, max)?);
            }
            FieldValue::List(values)
        }
    };

    Ok(value)
}

fn convert_enumeration(field: &str, kind: EnumKind, text: &str) -> Result<FieldValue, ParseError> {
    let value = match kind {
        EnumKind::Status => ConnectionState::from_wire(text).map(FieldValue::Status),
        EnumKind::Event => ScheduleEvent::from_wire(text).map(FieldValue::Event),
        EnumKind::MeterType => MeterKind::from_wire(text).map(FieldValue::MeterType),
        EnumKind::Queue => MessageQueue::from_wire(text).map(FieldValue::Queue),
    };

    value.ok_or_else(|| ParseError::InvalidValue {
        field: field.to_string(),
        value: text.to_string(),
    })
}

fn integer_field(fields: &[(String, FieldValue)], name: &str) -> Option<u64> {
    fields
        .iter()
        .find(|(key, _)| key == name)
        .and_then(|(_, value)| value.as_integer())
}

/// Replaces raw numerators with their decimal value
fn apply_scaling(definition: &ResponseDefinition, fields: &mut [(String, FieldValue)]) {
    for spec in &definition.fields {
        let scale = match spec.kind {
            FieldKind::Scaled { scale, .. } => scale,
            _ => continue,
        };

        let raw = match integer_field(fields, spec.name) {
            Some(raw) => raw,
            None => continue,
        };

        let scaled = match scale {
            Scale::Ratio { multiplier, divisor } => utils::apply_ratio(
                raw,
                integer_field(fields, multiplier).unwrap_or(1),
                integer_field(fields, divisor).unwrap_or(1),
            ),
            Scale::TrailingDigits(digits) => {
                utils::apply_trailing_digits(raw, integer_field(fields, digits).unwrap_or(0))
            }
        };

        if let Some(entry) = fields.iter_mut().find(|(key, _)| key == spec.name) {
            entry.1 = FieldValue::Decimal(scaled);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metering_raven::response_definitions::{create_example_fragments, get_supported_responses};
    use crate::models::{Currency, HexId};
    use chrono::{TimeZone, Utc};

    fn example(name: &str) -> String {
        create_example_fragments().remove(name).unwrap()
    }

    #[test]
    fn test_decode_instantaneous_demand() {
        let reading = decode_fragment(&example("InstantaneousDemand")).unwrap();

        assert_eq!(reading.response_type(), "InstantaneousDemand");
        assert_eq!(reading.len(), 9);
        assert_eq!(reading.get_decimal("Demand"), Some(0.632));
        assert_eq!(reading.get("Multiplier"), Some(&FieldValue::Integer(1)));
        assert_eq!(reading.get("Divisor"), Some(&FieldValue::Integer(1000)));
        assert_eq!(reading.get("DigitsLeft"), Some(&FieldValue::Integer(15)));
        assert_eq!(reading.get_flag("SuppressLeadingZero"), Some(true));
        assert_eq!(
            reading.get_timestamp("TimeStamp"),
            Some(Utc.with_ymd_and_hms(2015, 1, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(
            reading.get("DeviceMacId"),
            Some(&FieldValue::Identifier(HexId(vec![0xd8, 0xd5, 0xb9, 0x00, 0x00, 0x00, 0x12, 0x34])))
        );
    }

    #[test]
    fn test_decode_summation() {
        let reading = decode_fragment(&example("CurrentSummationDelivered")).unwrap();
        assert_eq!(reading.get_decimal("SummationDelivered"), Some(16295.361));
        assert_eq!(reading.get_decimal("SummationReceived"), Some(0.0));
    }

    #[test]
    fn test_decode_period_usage() {
        let current = decode_fragment(&example("CurrentPeriodUsage")).unwrap();
        assert_eq!(current.get_decimal("CurrentUsage"), Some(50.0));
        assert_eq!(
            current.get_timestamp("StartDate"),
            Some(Utc.with_ymd_and_hms(2015, 1, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(
            current.get_timestamp("TimeStamp"),
            Some(Utc.with_ymd_and_hms(2015, 1, 4, 6, 0, 0).unwrap())
        );

        let last = decode_fragment(&example("LastPeriodUsage")).unwrap();
        assert_eq!(last.get_decimal("LastUsage"), Some(120.0));
        assert_eq!(
            last.get_timestamp("StartDate"),
            Some(Utc.with_ymd_and_hms(2014, 12, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(
            last.get_timestamp("EndDate"),
            Some(Utc.with_ymd_and_hms(2015, 1, 1, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_decode_device_info() {
        let reading = decode_fragment(&example("DeviceInfo")).unwrap();

        let link_key = match reading.get("LinkKey") {
            Some(FieldValue::Identifier(id)) => id.clone(),
            other => panic!("unexpected LinkKey {:?}", other),
        };
        assert_eq!(link_key.as_bytes().len(), 16);
        assert_eq!(link_key.to_string(), "0x2b6f4e5fd2d3dd4a9e6c1f2a3b4c5d6e");
        assert_eq!(
            reading.get("Manufacturer").and_then(FieldValue::as_str),
            Some("Rainforest Automation, Inc.")
        );
    }

    #[test]
    fn test_decode_network_and_schedule() {
        let network = decode_fragment(&example("NetworkInfo")).unwrap();
        assert_eq!(network.get("Status"), Some(&FieldValue::Status(ConnectionState::Connected)));
        assert_eq!(network.get("Channel"), Some(&FieldValue::Integer(20)));

        let schedule = decode_fragment(&example("ScheduleInfo")).unwrap();
        assert_eq!(schedule.get("Event"), Some(&FieldValue::Event(ScheduleEvent::Demand)));
        assert_eq!(schedule.get("Frequency"), Some(&FieldValue::Integer(10)));
        assert_eq!(schedule.get_flag("Enabled"), Some(true));
    }

    #[test]
    fn test_decode_price() {
        let reading = decode_fragment(&example("PriceCluster")).unwrap();
        assert_eq!(reading.get_decimal("Price"), Some(0.1181));
        assert_eq!(
            reading.get("Currency"),
            Some(&FieldValue::Currency(Currency { number: 840, code: Some("USD") }))
        );
        assert_eq!(reading.get("RateLabel").and_then(FieldValue::as_str), Some("Off Peak"));
        assert!(reading.get("TierLabel").is_none());
    }

    #[test]
    fn test_decode_time_cluster() {
        let reading = decode_fragment(&example("TimeCluster")).unwrap();
        assert_eq!(
            reading.get_timestamp("UTCTime"),
            Some(Utc.with_ymd_and_hms(2014, 6, 15, 12, 30, 0).unwrap())
        );
        assert_eq!(
            reading.get_timestamp("LocalTime"),
            Some(Utc.with_ymd_and_hms(2014, 6, 15, 5, 30, 0).unwrap())
        );
    }

    #[test]
    fn test_decode_enumerations_and_text() {
        let status = decode_fragment(&example("ConnectionStatus")).unwrap();
        assert_eq!(status.get("Status"), Some(&FieldValue::Status(ConnectionState::JoinSuccess)));
        assert_eq!(status.get("Channel"), Some(&FieldValue::Integer(20)));

        let message = decode_fragment(&example("MessageCluster")).unwrap();
        assert_eq!(
            message.get("Text").and_then(FieldValue::as_str),
            Some("Peak pricing & demand response today")
        );
        assert_eq!(message.get("Queue"), Some(&FieldValue::Queue(MessageQueue::Active)));
        assert_eq!(message.get_flag("Confirmed"), Some(false));
    }

    #[test]
    fn test_decode_meter_info_defaults() {
        let reading = decode_fragment(&example("MeterInfo")).unwrap();
        assert_eq!(reading.get("MeterType"), Some(&FieldValue::MeterType(MeterKind::Electric)));
        assert_eq!(reading.get("Account"), Some(&FieldValue::Text(String::new())));
        assert_eq!(reading.get("Host"), Some(&FieldValue::Text(String::new())));
        assert_eq!(reading.len(), 8);
    }

    #[test]
    fn test_decode_profile_data() {
        let reading = decode_fragment(&example("ProfileData")).unwrap();
        assert_eq!(reading.get("IntervalData"), Some(&FieldValue::List(vec![0x120, 0xff, 0])));
        assert_eq!(reading.get("ProfileIntervalPeriod"), Some(&FieldValue::Integer(3)));
    }

    #[test]
    fn test_decode_single_line_warning() {
        let reading = decode_fragment(&example("Warning")).unwrap();
        assert_eq!(reading.get("Text").and_then(FieldValue::as_str), Some("Unknown command"));
    }

    #[test]
    fn test_examples_match_table_types() {
        let definitions = get_supported_responses();
        for (name, xml) in create_example_fragments() {
            let reading = decode_fragment(&xml).unwrap();
            let definition = &definitions[name.as_str()];

            for (field, value) in reading.fields() {
                let spec = definition.field(field).unwrap();
                let expected = match spec.kind {
                    FieldKind::Text => "text",
                    FieldKind::Integer { .. } | FieldKind::Hex { .. } => "integer",
                    FieldKind::Scaled { .. } => "decimal",
                    FieldKind::Identifier => "identifier",
                    FieldKind::Timestamp => "timestamp",
                    FieldKind::Flag => "flag",
                    FieldKind::Currency => "currency",
                    FieldKind::Enumerated(EnumKind::Status) => "status",
                    FieldKind::Enumerated(EnumKind::Event) => "event",
                    FieldKind::Enumerated(EnumKind::MeterType) => "meter_type",
                    FieldKind::Enumerated(EnumKind::Queue) => "queue",
                    FieldKind::HexList { .. } => "list",
                };
                assert_eq!(value.type_name(), expected, "{}.{}", name, field);
            }
        }
    }

    #[test]
    fn test_unknown_response_type() {
        let result = decode_fragment("<FastPollStatus><Frequency>0x04</Frequency></FastPollStatus>");
        assert_eq!(result, Err(ParseError::UnknownResponseType("FastPollStatus".to_string())));
    }

    #[test]
    fn test_unlisted_field_kept_as_text() {
        let reading = decode_fragment("<Warning><Text>oops</Text><Extra>0x01</Extra></Warning>").unwrap();
        assert_eq!(reading.get("Extra").and_then(FieldValue::as_str), Some("0x01"));
    }

    #[test]
    fn test_reserved_keys_rejected() {
        assert_eq!(
            decode_fragment("<Warning><Text>x</Text><Type>Bogus</Type></Warning>"),
            Err(ParseError::ReservedField("Type".to_string()))
        );
        assert_eq!(
            decode_fragment("<Warning><Text>x</Text><ReceivedAt>0</ReceivedAt></Warning>"),
            Err(ParseError::ReservedField("ReceivedAt".to_string()))
        );
    }

    #[test]
    fn test_malformed_fragments() {
        assert!(matches!(decode_fragment("<Warning><Text>oops</Warning>"), Err(ParseError::Xml(_))));
        assert!(matches!(decode_fragment("<Warning><Text>oops</Text>"), Err(ParseError::Xml(_))));
        assert_eq!(decode_fragment(""), Err(ParseError::MissingRoot));
        assert_eq!(
            decode_fragment("<Warning><Text>a</Text></Warning><Warning><Text>b</Text></Warning>"),
            Err(ParseError::MultipleRoots)
        );
        assert_eq!(
            decode_fragment("<Warning><Text><b>a</b></Text></Warning>"),
            Err(ParseError::NestedElement("b".to_string()))
        );
        assert_eq!(
            decode_fragment("<Warning>loose<Text>a</Text></Warning>"),
            Err(ParseError::UnexpectedText("loose".to_string()))
        );
        assert_eq!(
            decode_fragment("<Warning><Text>a</Text><Text>b</Text></Warning>"),
            Err(ParseError::DuplicateField("Text".to_string()))
        );
    }

    #[test]
    fn test_invalid_values_fail_whole_fragment() {
        let bad_flag = example("InstantaneousDemand").replace(
            "<SuppressLeadingZero>Y</SuppressLeadingZero>",
            "<SuppressLeadingZero>maybe</SuppressLeadingZero>",
        );
        assert!(matches!(decode_fragment(&bad_flag), Err(ParseError::InvalidValue { .. })));

        let too_big = example("InstantaneousDemand")
            .replace("<Demand>0x000278</Demand>", "<Demand>0x1000000</Demand>");
        assert_eq!(
            decode_fragment(&too_big),
            Err(ParseError::OutOfRange { field: "Demand".to_string(), value: 0x100_0000 })
        );

        let signed = example("InstantaneousDemand")
            .replace("<Demand>0x000278</Demand>", "<Demand>0x+278</Demand>");
        assert!(matches!(decode_fragment(&signed), Err(ParseError::InvalidValue { .. })));

        let bad_status = example("ConnectionStatus").replace("Join: Success", "Sleeping");
        assert!(matches!(decode_fragment(&bad_status), Err(ParseError::InvalidValue { .. })));
    }

    #[test]
    fn test_missing_required_field() {
        let missing = example("InstantaneousDemand")
            .replace("  <Divisor>0x000003e8</Divisor>\n", "");
        assert_eq!(
            decode_fragment(&missing),
            Err(ParseError::MissingField {
                response: "InstantaneousDemand".to_string(),
                field: "Divisor".to_string(),
            })
        );
    }

    #[test]
    fn test_zero_divisor_counts_as_one() {
        let fragment = example("InstantaneousDemand")
            .replace("<Divisor>0x000003e8</Divisor>", "<Divisor>0x00000000</Divisor>")
            .replace("<Multiplier>0x00000001</Multiplier>", "<Multiplier>0x00000000</Multiplier>");
        let reading = decode_fragment(&fragment).unwrap();
        assert_eq!(reading.get_decimal("Demand"), Some(632.0));
    }
}
