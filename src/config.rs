// Timings, topics, drive vectors, servo channels
use std::time::Duration;

use crate::messages::DriveVector;
use crate::state::Calibration;

// Actuation loop frequency
pub const LOOP_HZ: u64 = 50;

// Zenoh topics
pub const TOPIC_CMD: &str = "ninja/cmd/*"; // command queryable, key suffix = command name
pub const TOPIC_RT_STATE: &str = "ninja/rt/state"; // state snapshot telemetry

// Forward/backward: straight drive vector held for 3 s, both modes
pub const DRIVE_FORWARD: DriveVector = DriveVector { x: 0, y: 100 };
pub const DRIVE_BACKWARD: DriveVector = DriveVector { x: 0, y: -100 };
pub const DRIVE_HOLD: Duration = Duration::from_millis(3000);

// ROLL-mode turns: in-place pivot vectors held for 0.5 s.
// Tuned per-robot and part of the behavior contract, do not "fix" the asymmetry.
pub const DRIVE_TURN_LEFT: DriveVector = DriveVector { x: -75, y: -64 };
pub const DRIVE_TURN_RIGHT: DriveVector = DriveVector { x: 51, y: -81 };
pub const TURN_HOLD: Duration = Duration::from_millis(500);

// WALK-mode turn choreography: settle after tilting, then hold the foot offset
pub const TILT_SETTLE: Duration = Duration::from_millis(1000);
pub const FOOT_HOLD: Duration = Duration::from_millis(500);

// Servo bus channels
pub const SERVO_CH_LEFT_LEG: u8 = 1;
pub const SERVO_CH_RIGHT_LEG: u8 = 2;
pub const SERVO_CH_LEFT_FOOT: u8 = 3;
pub const SERVO_CH_RIGHT_FOOT: u8 = 4;

// Leg servo poses (degrees). WALK stance is upright, ROLL stance folds the
// legs so the foot servos touch down as wheels.
pub const LEG_WALK_STANCE: i16 = 90;
pub const LEG_ROLL_STANCE_LEFT: i16 = 170;
pub const LEG_ROLL_STANCE_RIGHT: i16 = 10;
pub const LEG_TILT_LEFT: i16 = 130;
pub const LEG_TILT_RIGHT: i16 = 50;

// Serial port for the servo bus
pub const SERVO_PORT: &str = "/dev/ttyUSB0";

// Factory calibration, used when no calibration file is given
pub const DEFAULT_CALIBRATION: Calibration = Calibration {
    left_foot_neutral: 90,
    left_foot_turn_offset: 20,
    right_foot_neutral: 90,
    right_foot_turn_offset: 20,
};
