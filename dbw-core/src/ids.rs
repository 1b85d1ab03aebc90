//! Bus identifiers and message names of the by-wire kit

/// Brake command (outbound; foreign if received)
pub const BRAKE_CMD: u32 = 0x060;
/// Brake report
pub const BRAKE_REPORT: u32 = 0x061;
/// Accelerator pedal command (outbound; foreign if received)
pub const ACCEL_PEDAL_CMD: u32 = 0x062;
/// Accelerator pedal report
pub const ACCEL_PEDAL_REPORT: u32 = 0x063;
/// Steering command (outbound; foreign if received)
pub const STEERING_CMD: u32 = 0x064;
/// Steering report
pub const STEERING_REPORT: u32 = 0x065;
/// Gear command (outbound; foreign if received)
pub const GEAR_CMD: u32 = 0x066;
/// Gear report
pub const GEAR_REPORT: u32 = 0x067;
/// Turn signal / door command (outbound)
pub const MISC_CMD: u32 = 0x068;
/// Miscellaneous report
pub const MISC_REPORT: u32 = 0x069;
pub const WHEEL_SPEED_REPORT: u32 = 0x06A;
pub const WHEEL_POSITION_REPORT: u32 = 0x072;
pub const TIRE_PRESSURE_REPORT: u32 = 0x073;
pub const SURROUND_REPORT: u32 = 0x074;
pub const IMU_REPORT: u32 = 0x075;
pub const DRIVER_INPUT_REPORT: u32 = 0x076;
pub const LOW_VOLTAGE_REPORT: u32 = 0x077;
/// Vehicle identification, three multiplexed fragments
pub const VIN_REPORT: u32 = 0x07E;

pub const BRAKE_CMD_NAME: &str = "AKit_BrakeCommand";
pub const ACCEL_PEDAL_CMD_NAME: &str = "AKit_AccelPdlCommand";
pub const STEERING_CMD_NAME: &str = "AKit_SteeringCommand";
pub const GEAR_CMD_NAME: &str = "AKit_GearCommand";
pub const MISC_CMD_NAME: &str = "AKit_Misc";

/// Wheel speed multiplexer: wheel rpm
pub const WHEEL_SPEED_MUX_RPM: u64 = 0;
/// Wheel speed multiplexer: wheel angular speed
pub const WHEEL_SPEED_MUX_RAD_S: u64 = 1;

pub const VIN_MUX_FIRST: u64 = 0;
pub const VIN_MUX_MIDDLE: u64 = 1;
pub const VIN_MUX_LAST: u64 = 2;

/// Every inbound report identifier the node decodes
pub const REPORT_IDS: [u32; 13] = [
    BRAKE_REPORT,
    ACCEL_PEDAL_REPORT,
    STEERING_REPORT,
    GEAR_REPORT,
    MISC_REPORT,
    WHEEL_SPEED_REPORT,
    WHEEL_POSITION_REPORT,
    TIRE_PRESSURE_REPORT,
    SURROUND_REPORT,
    IMU_REPORT,
    DRIVER_INPUT_REPORT,
    LOW_VOLTAGE_REPORT,
    VIN_REPORT,
];

/// Command identifiers that must only ever be sent by this node
pub const FOREIGN_COMMAND_IDS: [u32; 4] = [BRAKE_CMD, ACCEL_PEDAL_CMD, STEERING_CMD, GEAR_CMD];

/// Every outbound command message name the node encodes
pub const COMMAND_NAMES: [&str; 5] = [
    BRAKE_CMD_NAME,
    ACCEL_PEDAL_CMD_NAME,
    STEERING_CMD_NAME,
    GEAR_CMD_NAME,
    MISC_CMD_NAME,
];
