// Shared robot state: control state, mode, calibration
//
// The firmware equivalent of this lived in ambient globals; here it is an
// explicitly owned context behind an Arc, handed to the orchestrator, the
// body, and the actuation task. Locks are held only for field reads/writes,
// never across an await.

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::messages::{DriveVector, StateSnapshot};

/// Locomotion mode: WALK stands on articulated legs, ROLL folds the legs and
/// drives the foot servos as wheels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Walk,
    Roll,
}

/// Joystick-equivalent control state, written by command handlers and read
/// continuously by the actuation task.
#[derive(Debug, Clone, Copy, Default)]
pub struct ControlState {
    pub drive: DriveVector,
    /// Set by the tilt primitives while a posture is held manually; the
    /// actuation task must not drive the wheels while this is set.
    pub manual_override: bool,
}

/// Per-unit servo calibration: neutral angles and turn offsets for both foot
/// servos, in degrees. Offsets may be negative on units with flipped horns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Calibration {
    pub left_foot_neutral: i16,
    pub left_foot_turn_offset: i16,
    pub right_foot_neutral: i16,
    pub right_foot_turn_offset: i16,
}

#[derive(Debug, thiserror::Error)]
pub enum CalibrationError {
    #[error("failed to read calibration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse calibration file: {0}")]
    Parse(#[from] serde_json::Error),
}

impl Calibration {
    /// Load calibration from a JSON file
    pub fn load(path: &Path) -> Result<Self, CalibrationError> {
        let raw = std::fs::read_to_string(path)?;
        let cal: Calibration = serde_json::from_str(&raw)?;
        info!("Loaded calibration from {}: {:?}", path.display(), cal);
        Ok(cal)
    }
}

/// Process-lifetime shared state. Created once at startup; cloned handles are
/// passed into the orchestrator, the body, and the actuation task.
pub struct SharedState {
    control: Mutex<ControlState>,
    mode: Mutex<Mode>,
    calibration: Mutex<Calibration>,
}

pub type StateHandle = Arc<SharedState>;

impl SharedState {
    pub fn new(mode: Mode, calibration: Calibration) -> StateHandle {
        Arc::new(Self {
            control: Mutex::new(ControlState::default()),
            mode: Mutex::new(mode),
            calibration: Mutex::new(calibration),
        })
    }

    pub fn drive(&self) -> DriveVector {
        self.control.lock().drive
    }

    pub fn set_drive(&self, drive: DriveVector) {
        self.control.lock().drive = drive;
    }

    pub fn manual_override(&self) -> bool {
        self.control.lock().manual_override
    }

    pub fn set_manual_override(&self, on: bool) {
        self.control.lock().manual_override = on;
    }

    pub fn mode(&self) -> Mode {
        *self.mode.lock()
    }

    pub fn set_mode(&self, mode: Mode) {
        *self.mode.lock() = mode;
    }

    /// Current calibration. Re-fetched by callers on every command since
    /// calibration can change between commands.
    pub fn calibration(&self) -> Calibration {
        *self.calibration.lock()
    }

    pub fn set_calibration(&self, cal: Calibration) {
        *self.calibration.lock() = cal;
    }

    pub fn snapshot(&self) -> StateSnapshot {
        let control = *self.control.lock();
        StateSnapshot {
            drive: control.drive,
            mode: self.mode(),
            manual_override: control.manual_override,
        }
    }
}
