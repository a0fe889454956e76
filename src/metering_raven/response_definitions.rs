use super::structs::{EnumKind, FieldKind, FieldSpec, ResponseDefinition, Scale};
use lazy_static::lazy_static;
use std::collections::HashMap;

const HEX_ANY: FieldKind = FieldKind::Hex { min: 0, max: u64::MAX };
const HEX_U8: FieldKind = FieldKind::Hex { min: 0, max: 0xff };
const HEX_U32: FieldKind = FieldKind::Hex { min: 0, max: 0xffff_ffff };
const LINK_STRENGTH: FieldKind = FieldKind::Hex { min: 0, max: 0x64 };
const ZIGBEE_CHANNEL: FieldKind = FieldKind::Integer { min: 11, max: 26 };
const METER_RATIO: Scale = Scale::Ratio {
    multiplier: "Multiplier",
    divisor: "Divisor",
};

lazy_static! {
    static ref RESPONSE_DEFINITIONS: HashMap<&'static str, ResponseDefinition> = get_supported_responses();
}

pub fn get_response_definition(response_type: &str) -> Option<&'static ResponseDefinition> {
    RESPONSE_DEFINITIONS.get(response_type)
}

pub fn get_supported_responses() -> HashMap<&'static str, ResponseDefinition> {
    let definitions = vec![
        get_warning_definition(),
        get_connection_status_definition(),
        get_device_info_definition(),
        get_schedule_info_definition(),
        get_meter_list_definition(),
        get_meter_info_definition(),
        get_network_info_definition(),
        get_time_cluster_definition(),
        get_message_cluster_definition(),
        get_price_cluster_definition(),
        get_instantaneous_demand_definition(),
        get_current_summation_definition(),
        get_current_period_usage_definition(),
        get_last_period_usage_definition(),
        get_profile_data_definition(),
    ];

    definitions.into_iter().map(|d| (d.name, d)).collect()
}

/// Every metering notification starts with the gateway and meter MAC ids
fn mac_ids() -> Vec<FieldSpec> {
    vec![
        FieldSpec::new("DeviceMacId", FieldKind::Identifier).required(),
        FieldSpec::new("MeterMacId", FieldKind::Identifier).required(),
    ]
}

/// Formatting hints shared by all consumption notifications
fn formatting_hints() -> Vec<FieldSpec> {
    vec![
        FieldSpec::new("Multiplier", HEX_U32).required(),
        FieldSpec::new("Divisor", HEX_U32).required(),
        FieldSpec::new("DigitsRight", HEX_U8).required(),
        FieldSpec::new("DigitsLeft", HEX_U8).required(),
        FieldSpec::new("SuppressLeadingZero", FieldKind::Flag).required(),
    ]
}

pub fn get_warning_definition() -> ResponseDefinition {
    ResponseDefinition {
        name: "Warning",
        description: "Sent when a command has not been understood",
        fields: vec![FieldSpec::new("Text", FieldKind::Text).required()],
    }
}

pub fn get_connection_status_definition() -> ResponseDefinition {
    let mut fields = mac_ids();
    fields.extend(vec![
        FieldSpec::new("Status", FieldKind::Enumerated(EnumKind::Status)).required(),
        FieldSpec::new("Description", FieldKind::Text),
        FieldSpec::new("StatusCode", HEX_U8),
        FieldSpec::new("ExtPanId", HEX_ANY),
        FieldSpec::new("Channel", ZIGBEE_CHANNEL),
        FieldSpec::new("ShortAddr", FieldKind::Hex { min: 0, max: 0xffff }),
        FieldSpec::new("LinkStrength", LINK_STRENGTH).required(),
    ]);

    ResponseDefinition {
        name: "ConnectionStatus",
        description: "Start-up and join/re-join progress notifications",
        fields,
    }
}

pub fn get_device_info_definition() -> ResponseDefinition {
    ResponseDefinition {
        name: "DeviceInfo",
        description: "Basic information about the gateway",
        fields: vec![
            FieldSpec::new("DeviceMacId", FieldKind::Identifier).required(),
            FieldSpec::new("InstallCode", FieldKind::Identifier).required(),
            FieldSpec::new("LinkKey", FieldKind::Identifier).required(),
            FieldSpec::new("FWVersion", FieldKind::Text).required(),
            FieldSpec::new("HWVersion", FieldKind::Text).required(),
            FieldSpec::new("ImageType", FieldKind::Text).required(),
            FieldSpec::new("Manufacturer", FieldKind::Text).required(),
            FieldSpec::new("ModelId", FieldKind::Text).required(),
            FieldSpec::new("DateCode", FieldKind::Text).required(),
        ],
    }
}

pub fn get_schedule_info_definition() -> ResponseDefinition {
    let mut fields = mac_ids();
    fields.extend(vec![
        FieldSpec::new("Event", FieldKind::Enumerated(EnumKind::Event)),
        FieldSpec::new("Frequency", FieldKind::Hex { min: 0, max: 0xffff_fffe }).required(),
        FieldSpec::new("Enabled", FieldKind::Flag).required(),
    ]);

    ResponseDefinition {
        name: "ScheduleInfo",
        description: "Read frequency of a scheduled event and whether it is enabled",
        fields,
    }
}

pub fn get_meter_list_definition() -> ResponseDefinition {
    ResponseDefinition {
        name: "MeterList",
        description: "Meters the gateway is connected to",
        fields: mac_ids(),
    }
}

pub fn get_meter_info_definition() -> ResponseDefinition {
    let mut fields = mac_ids();
    fields.extend(vec![
        FieldSpec::new("MeterType", FieldKind::Enumerated(EnumKind::MeterType)).required(),
        FieldSpec::new("NickName", FieldKind::Text).required(),
        FieldSpec::new("Account", FieldKind::Text).with_default(""),
        FieldSpec::new("Auth", FieldKind::Text).with_default(""),
        FieldSpec::new("Host", FieldKind::Text).with_default(""),
        FieldSpec::new("Enabled", FieldKind::Flag),
    ]);

    ResponseDefinition {
        name: "MeterInfo",
        description: "Information about a meter on the network",
        fields,
    }
}

pub fn get_network_info_definition() -> ResponseDefinition {
    ResponseDefinition {
        name: "NetworkInfo",
        description: "State of the gateway on the ZigBee network",
        fields: vec![
            FieldSpec::new("DeviceMacId", FieldKind::Identifier).required(),
            FieldSpec::new("CoordMacId", FieldKind::Identifier).required(),
            FieldSpec::new("Status", FieldKind::Enumerated(EnumKind::Status)).required(),
            FieldSpec::new("Description", FieldKind::Text),
            FieldSpec::new("StatusCode", HEX_U8).required(),
            FieldSpec::new("ExtPanId", HEX_ANY).required(),
            FieldSpec::new("Channel", ZIGBEE_CHANNEL).required(),
            FieldSpec::new("ShortAddr", FieldKind::Hex { min: 0, max: 0xffff }).required(),
            FieldSpec::new("LinkStrength", LINK_STRENGTH).required(),
        ],
    }
}

pub fn get_time_cluster_definition() -> ResponseDefinition {
    let mut fields = mac_ids();
    fields.extend(vec![
        FieldSpec::new("UTCTime", FieldKind::Timestamp).required(),
        FieldSpec::new("LocalTime", FieldKind::Timestamp).required(),
    ]);

    ResponseDefinition {
        name: "TimeCluster",
        description: "Current meter time in UTC and local time",
        fields,
    }
}

pub fn get_message_cluster_definition() -> ResponseDefinition {
    let mut fields = mac_ids();
    fields.extend(vec![
        FieldSpec::new("TimeStamp", FieldKind::Timestamp).required(),
        FieldSpec::new("Id", HEX_U32).required(),
        FieldSpec::new("Text", FieldKind::Text).required(),
        FieldSpec::new("ConfirmationRequired", FieldKind::Flag).required(),
        FieldSpec::new("Confirmed", FieldKind::Flag).required(),
        FieldSpec::new("Queue", FieldKind::Enumerated(EnumKind::Queue)).required(),
    ]);

    ResponseDefinition {
        name: "MessageCluster",
        description: "Current text message from the meter",
        fields,
    }
}

pub fn get_price_cluster_definition() -> ResponseDefinition {
    let mut fields = mac_ids();
    fields.extend(vec![
        FieldSpec::new("TimeStamp", FieldKind::Timestamp).required(),
        FieldSpec::new(
            "Price",
            FieldKind::Scaled {
                max: 0xffff_ffff,
                scale: Scale::TrailingDigits("TrailingDigits"),
            },
        )
        .required(),
        FieldSpec::new("Currency", FieldKind::Currency).required(),
        FieldSpec::new("TrailingDigits", HEX_U8).required(),
        FieldSpec::new("Tier", HEX_U8).required(),
        // only one of the two labels is sent, depending on the firmware build
        FieldSpec::new("TierLabel", FieldKind::Text),
        FieldSpec::new("RateLabel", FieldKind::Text),
    ]);

    ResponseDefinition {
        name: "PriceCluster",
        description: "Price currently in effect on the meter or set by the user",
        fields,
    }
}

pub fn get_instantaneous_demand_definition() -> ResponseDefinition {
    let mut fields = mac_ids();
    fields.extend(vec![
        FieldSpec::new("TimeStamp", FieldKind::Timestamp).required(),
        FieldSpec::new(
            "Demand",
            FieldKind::Scaled {
                max: 0xff_ffff,
                scale: METER_RATIO,
            },
        )
        .required(),
    ]);
    fields.extend(formatting_hints());

    ResponseDefinition {
        name: "InstantaneousDemand",
        description: "Current consumption rate as recorded by the meter",
        fields,
    }
}

pub fn get_current_summation_definition() -> ResponseDefinition {
    let summation = FieldKind::Scaled {
        max: 0xffff_ffff,
        scale: METER_RATIO,
    };

    let mut fields = mac_ids();
    fields.extend(vec![
        FieldSpec::new("TimeStamp", FieldKind::Timestamp).required(),
        FieldSpec::new("SummationDelivered", summation).required(),
        FieldSpec::new("SummationReceived", summation).required(),
    ]);
    fields.extend(formatting_hints());

    ResponseDefinition {
        name: "CurrentSummationDelivered",
        description: "Total consumption to date as recorded by the meter",
        fields,
    }
}

pub fn get_current_period_usage_definition() -> ResponseDefinition {
    let mut fields = mac_ids();
    fields.extend(vec![
        FieldSpec::new("TimeStamp", FieldKind::Timestamp).required(),
        FieldSpec::new(
            "CurrentUsage",
            FieldKind::Scaled {
                max: 0xffff_ffff,
                scale: METER_RATIO,
            },
        )
        .required(),
    ]);
    fields.extend(formatting_hints());
    fields.push(FieldSpec::new("StartDate", FieldKind::Timestamp).required());

    ResponseDefinition {
        name: "CurrentPeriodUsage",
        description: "Consumption for the current accumulation period",
        fields,
    }
}

pub fn get_last_period_usage_definition() -> ResponseDefinition {
    let mut fields = mac_ids();
    fields.push(
        FieldSpec::new(
            "LastUsage",
            FieldKind::Scaled {
                max: 0xffff_ffff,
                scale: METER_RATIO,
            },
        )
        .required(),
    );
    fields.extend(formatting_hints());
    fields.extend(vec![
        FieldSpec::new("StartDate", FieldKind::Timestamp).required(),
        FieldSpec::new("EndDate", FieldKind::Timestamp).required(),
    ]);

    ResponseDefinition {
        name: "LastPeriodUsage",
        description: "Consumption for the previous accumulation period",
        fields,
    }
}

pub fn get_profile_data_definition() -> ResponseDefinition {
    let mut fields = mac_ids();
    fields.extend(vec![
        FieldSpec::new("EndTime", FieldKind::Timestamp).required(),
        FieldSpec::new("Status", FieldKind::Hex { min: 0, max: 0x05 }).required(),
        FieldSpec::new("ProfileIntervalPeriod", FieldKind::Integer { min: 0, max: 7 }).required(),
        FieldSpec::new("NumberOfPeriodsDelivered", HEX_U8).required(),
        // most recent interval first
        FieldSpec::new("IntervalData", FieldKind::HexList { max: 0xff_ffff }).required(),
    ]);

    ResponseDefinition {
        name: "ProfileData",
        description: "Interval data answering GET_PROFILE_DATA",
        fields,
    }
}

pub fn create_example_fragments() -> HashMap<String, String> {
    let mut examples = HashMap::new();

    examples.insert(
        "InstantaneousDemand".to_string(),
        r"<InstantaneousDemand>
  <DeviceMacId>0xd8d5b90000001234</DeviceMacId>
  <MeterMacId>0x00135003001a2b3c</MeterMacId>
  <TimeStamp>0x1c374a80</TimeStamp>
  <Demand>0x000278</Demand>
  <Multiplier>0x00000001</Multiplier>
  <Divisor>0x000003e8</Divisor>
  <DigitsRight>0x03</DigitsRight>
  <DigitsLeft>0x0f</DigitsLeft>
  <SuppressLeadingZero>Y</SuppressLeadingZero>
</InstantaneousDemand>"
            .to_string(),
    );

    examples.insert(
        "CurrentSummationDelivered".to_string(),
        r"<CurrentSummationDelivered>
  <DeviceMacId>0xd8d5b90000001234</DeviceMacId>
  <MeterMacId>0x00135003001a2b3c</MeterMacId>
  <TimeStamp>0x1c374a80</TimeStamp>
  <SummationDelivered>0x00f8a5c1</SummationDelivered>
  <SummationReceived>0x00000000</SummationReceived>
  <Multiplier>0x00000001</Multiplier>
  <Divisor>0x000003e8</Divisor>
  <DigitsRight>0x01</DigitsRight>
  <DigitsLeft>0x06</DigitsLeft>
  <SuppressLeadingZero>Y</SuppressLeadingZero>
</CurrentSummationDelivered>"
            .to_string(),
    );

    examples.insert(
        "PriceCluster".to_string(),
        r"<PriceCluster>
  <DeviceMacId>0xd8d5b90000001234</DeviceMacId>
  <MeterMacId>0x00135003001a2b3c</MeterMacId>
  <TimeStamp>0x1c374a80</TimeStamp>
  <Price>0x0000049d</Price>
  <Currency>0x0348</Currency>
  <TrailingDigits>0x04</TrailingDigits>
  <Tier>0x01</Tier>
  <RateLabel>Off Peak</RateLabel>
</PriceCluster>"
            .to_string(),
    );

    examples.insert(
        "TimeCluster".to_string(),
        r"<TimeCluster>
  <DeviceMacId>0xd8d5b90000001234</DeviceMacId>
  <MeterMacId>0x00135003001a2b3c</MeterMacId>
  <UTCTime>0x1b304e48</UTCTime>
  <LocalTime>0x1b2febd8</LocalTime>
</TimeCluster>"
            .to_string(),
    );

    examples.insert(
        "ConnectionStatus".to_string(),
        r"<ConnectionStatus>
  <DeviceMacId>0xd8d5b90000001234</DeviceMacId>
  <MeterMacId>0x00135003001a2b3c</MeterMacId>
  <Status>Join: Success</Status>
  <Description>Successfully Joined</Description>
  <StatusCode>0x00</StatusCode>
  <ExtPanId>0x00135003001a2b3c</ExtPanId>
  <Channel>20</Channel>
  <ShortAddr>0xe1d2</ShortAddr>
  <LinkStrength>0x64</LinkStrength>
</ConnectionStatus>"
            .to_string(),
    );

    examples.insert(
        "MessageCluster".to_string(),
        r"<MessageCluster>
  <DeviceMacId>0xd8d5b90000001234</DeviceMacId>
  <MeterMacId>0x00135003001a2b3c</MeterMacId>
  <TimeStamp>0x1c374a80</TimeStamp>
  <Id>0x0000002a</Id>
  <Text>Peak pricing &amp; demand response today</Text>
  <ConfirmationRequired>N</ConfirmationRequired>
  <Confirmed>N</Confirmed>
  <Queue>Active</Queue>
</MessageCluster>"
            .to_string(),
    );

    examples.insert(
        "MeterInfo".to_string(),
        r"<MeterInfo>
  <DeviceMacId>0xd8d5b90000001234</DeviceMacId>
  <MeterMacId>0x00135003001a2b3c</MeterMacId>
  <MeterType>electric</MeterType>
  <NickName>House</NickName>
  <Enabled>Y</Enabled>
</MeterInfo>"
            .to_string(),
    );

    examples.insert(
        "ProfileData".to_string(),
        r"<ProfileData>
  <DeviceMacId>0xd8d5b90000001234</DeviceMacId>
  <MeterMacId>0x00135003001a2b3c</MeterMacId>
  <EndTime>0x1c374a80</EndTime>
  <Status>0x00</Status>
  <ProfileIntervalPeriod>3</ProfileIntervalPeriod>
  <NumberOfPeriodsDelivered>0x03</NumberOfPeriodsDelivered>
  <IntervalData>0x000120,0x0000ff,0x000000</IntervalData>
</ProfileData>"
            .to_string(),
    );

    examples.insert(
        "CurrentPeriodUsage".to_string(),
        r"<CurrentPeriodUsage>
  <DeviceMacId>0xd8d5b90000001234</DeviceMacId>
  <MeterMacId>0x00135003001a2b3c</MeterMacId>
  <TimeStamp>0x1c3b9360</TimeStamp>
  <CurrentUsage>0x0000c350</CurrentUsage>
  <Multiplier>0x00000001</Multiplier>
  <Divisor>0x000003e8</Divisor>
  <DigitsRight>0x02</DigitsRight>
  <DigitsLeft>0x06</DigitsLeft>
  <SuppressLeadingZero>Y</SuppressLeadingZero>
  <StartDate>0x1c374a80</StartDate>
</CurrentPeriodUsage>"
            .to_string(),
    );

    examples.insert(
        "LastPeriodUsage".to_string(),
        r"<LastPeriodUsage>
  <DeviceMacId>0xd8d5b90000001234</DeviceMacId>
  <MeterMacId>0x00135003001a2b3c</MeterMacId>
  <LastUsage>0x0001d4c0</LastUsage>
  <Multiplier>0x00000001</Multiplier>
  <Divisor>0x000003e8</Divisor>
  <DigitsRight>0x02</DigitsRight>
  <DigitsLeft>0x06</DigitsLeft>
  <SuppressLeadingZero>Y</SuppressLeadingZero>
  <StartDate>0x1c0e6c00</StartDate>
  <EndDate>0x1c374a80</EndDate>
</LastPeriodUsage>"
            .to_string(),
    );

    examples.insert(
        "DeviceInfo".to_string(),
        r"<DeviceInfo>
  <DeviceMacId>0xd8d5b90000001234</DeviceMacId>
  <InstallCode>0x8ba7f1dee6c4f5cc</InstallCode>
  <LinkKey>0x2b6f4e5fd2d3dd4a9e6c1f2a3b4c5d6e</LinkKey>
  <FWVersion>2.0.0 (7400)</FWVersion>
  <HWVersion>1.2.3</HWVersion>
  <ImageType>0x1301</ImageType>
  <Manufacturer>Rainforest Automation, Inc.</Manufacturer>
  <ModelId>Z105-2-EMU2-LEDD_JM</ModelId>
  <DateCode>2013103023220630</DateCode>
</DeviceInfo>"
            .to_string(),
    );

    examples.insert(
        "ScheduleInfo".to_string(),
        r"<ScheduleInfo>
  <DeviceMacId>0xd8d5b90000001234</DeviceMacId>
  <MeterMacId>0x00135003001a2b3c</MeterMacId>
  <Event>demand</Event>
  <Frequency>0x0000000a</Frequency>
  <Enabled>Y</Enabled>
</ScheduleInfo>"
            .to_string(),
    );

    examples.insert(
        "MeterList".to_string(),
        r"<MeterList>
  <DeviceMacId>0xd8d5b90000001234</DeviceMacId>
  <MeterMacId>0x00135003001a2b3c</MeterMacId>
</MeterList>"
            .to_string(),
    );

    examples.insert(
        "NetworkInfo".to_string(),
        r"<NetworkInfo>
  <DeviceMacId>0xd8d5b90000001234</DeviceMacId>
  <CoordMacId>0x00135003001a2b3c</CoordMacId>
  <Status>Connected</Status>
  <Description>Successfully Joined</Description>
  <StatusCode>0x00</StatusCode>
  <ExtPanId>0x00135003001a2b3c</ExtPanId>
  <Channel>20</Channel>
  <ShortAddr>0xe1d2</ShortAddr>
  <LinkStrength>0x64</LinkStrength>
</NetworkInfo>"
            .to_string(),
    );

    examples.insert(
        "Warning".to_string(),
        "<Warning><Text>Unknown command</Text></Warning>".to_string(),
    );

    examples
}
