//! AT command catalog for the Sigfox module

pub const CMD_ALIVE: &str = "AT";
pub const CMD_RADIO_INFO: &str = "AT$GI?";
pub const CMD_RESET_CHANNEL: &str = "AT$RC";
pub const CMD_TEMPERATURE: &str = "AT$T?";
pub const CMD_VOLTAGES: &str = "AT$V?";

pub const MAX_PAYLOAD_LEN: usize = 12;

/// `AT$I=<code>` information queries, in catalog order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InfoCode {
    SoftwareNameAndVersion,
    ContactDetail,
    SiliconRevisionLowerByte,
    SiliconRevisionUpperByte,
    MajorFirmwareVersion,
    MinorFirmwareVersion,
    FirmwareVariant,
    FirmwareVcsVersion,
    SigfoxLibraryVersion,
    DeviceId,
}

impl InfoCode {
    pub const ALL: [InfoCode; 10] = [
        InfoCode::SoftwareNameAndVersion,
        InfoCode::ContactDetail,
        InfoCode::SiliconRevisionLowerByte,
        InfoCode::SiliconRevisionUpperByte,
        InfoCode::MajorFirmwareVersion,
        InfoCode::MinorFirmwareVersion,
        InfoCode::FirmwareVariant,
        InfoCode::FirmwareVcsVersion,
        InfoCode::SigfoxLibraryVersion,
        InfoCode::DeviceId,
    ];

    pub fn code(self) -> u8 {
        match self {
            InfoCode::SoftwareNameAndVersion => 0,
            InfoCode::ContactDetail => 1,
            InfoCode::SiliconRevisionLowerByte => 2,
            InfoCode::SiliconRevisionUpperByte => 3,
            InfoCode::MajorFirmwareVersion => 4,
            InfoCode::MinorFirmwareVersion => 5,
            InfoCode::FirmwareVariant => 7,
            InfoCode::FirmwareVcsVersion => 8,
            InfoCode::SigfoxLibraryVersion => 9,
            InfoCode::DeviceId => 10,
        }
    }

    /// Key used in the metadata record
    pub fn field_name(self) -> &'static str {
        match self {
            InfoCode::SoftwareNameAndVersion => "softwareNameAndVersion",
            InfoCode::ContactDetail => "contactDetail",
            InfoCode::SiliconRevisionLowerByte => "siliconRevisionLowerByte",
            InfoCode::SiliconRevisionUpperByte => "siliconRevisionUpperByte",
            InfoCode::MajorFirmwareVersion => "majorFirmwareVersion",
            InfoCode::MinorFirmwareVersion => "minorFirmwareVersion",
            InfoCode::FirmwareVariant => "firmwareVariant",
            InfoCode::FirmwareVcsVersion => "firmwareVcsVersion",
            InfoCode::SigfoxLibraryVersion => "sigfoxLibraryVersion",
            InfoCode::DeviceId => "deviceId",
        }
    }

    pub fn command(self) -> String {
        format!("AT$I={}", self.code())
    }
}

pub fn send_frame_command(payload: &[u8]) -> String {
    format!("AT$SF={}", hex::encode(payload))
}
