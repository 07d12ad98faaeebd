// Body primitives for the two-mode ninja robot
//
// The `Body` trait is the seam between the command orchestrator and the
// hardware: posture tilts, foot-servo positioning, stance transitions, and
// wheel drive. `ServoBody` talks to the real servo bus; `DryRunBody` logs
// everything for bench runs without hardware.

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::config::{
    LEG_ROLL_STANCE_LEFT, LEG_ROLL_STANCE_RIGHT, LEG_TILT_LEFT, LEG_TILT_RIGHT, LEG_WALK_STANCE,
    SERVO_CH_LEFT_FOOT, SERVO_CH_LEFT_LEG, SERVO_CH_RIGHT_FOOT, SERVO_CH_RIGHT_LEG,
};
use crate::messages::{DriveVector, Side};
use crate::servo::{ServoBus, ServoBusError, ServoMode};
use crate::state::{Mode, StateHandle};

/// All body servo channels: [left leg, right leg, left foot, right foot]
pub const BODY_SERVO_CHANNELS: [u8; 4] = [
    SERVO_CH_LEFT_LEG,
    SERVO_CH_RIGHT_LEG,
    SERVO_CH_LEFT_FOOT,
    SERVO_CH_RIGHT_FOOT,
];

/// Wheel speed per unit of drive bias (bias range ±100, speed range ±1023)
const WHEEL_SPEED_PER_BIAS: i16 = 10;

#[derive(Debug, thiserror::Error)]
pub enum BodyError {
    #[error("Servo bus error: {0}")]
    Bus(#[from] ServoBusError),

    #[error("Body fault: {0}")]
    Fault(String),
}

/// Actuation primitives consumed by the orchestrator and the actuation task.
///
/// Documented side effects on shared state: the tilt primitives set
/// `manual_override = true`, and the mode-transition primitives update the
/// shared `Mode` once the stance change is commanded.
pub trait Body: Send + Sync {
    fn tilt_left(&self) -> Result<(), BodyError>;
    fn tilt_right(&self) -> Result<(), BodyError>;

    /// Direct position write to one foot servo, immediate effect
    fn set_foot(&self, side: Side, angle: i16) -> Result<(), BodyError>;

    /// Restore the neutral standing posture; safe to call from any posture
    fn neutral_stance(&self) -> Result<(), BodyError>;

    fn enter_walk_mode(&self) -> Result<(), BodyError>;
    fn enter_roll_mode(&self) -> Result<(), BodyError>;

    /// Apply a drive vector to the wheel servos (ROLL mode)
    fn drive_wheels(&self, drive: DriveVector) -> Result<(), BodyError>;
}

/// Arcade-mix a drive vector into (left, right) wheel speeds.
///
/// `y` is forward bias, `x` turn bias, both ±100. The right wheel is mounted
/// mirrored, so its command is negated.
pub fn mix_drive(drive: DriveVector) -> (i16, i16) {
    let left = (drive.y + drive.x).clamp(-100, 100);
    let right = (drive.y - drive.x).clamp(-100, 100);
    (
        left * WHEEL_SPEED_PER_BIAS,
        -right * WHEEL_SPEED_PER_BIAS,
    )
}

/// Bus-backed body. The bus sits behind a mutex so the orchestrator and the
/// actuation task can share one serial port.
pub struct ServoBody {
    bus: Mutex<ServoBus>,
    state: StateHandle,
}

impl ServoBody {
    pub fn new(bus: ServoBus, state: StateHandle) -> Self {
        Self {
            bus: Mutex::new(bus),
            state,
        }
    }

    /// Check that all four servos respond and enable torque.
    /// Must be called before issuing motion commands.
    pub fn initialize(&self) -> Result<(), BodyError> {
        let mut bus = self.bus.lock();
        info!("Initializing body servos {:?}", BODY_SERVO_CHANNELS);

        for &ch in &BODY_SERVO_CHANNELS {
            if !bus.ping(ch)? {
                warn!("Servo {} not responding to ping", ch);
                return Err(ServoBusError::Timeout { id: ch }.into());
            }
        }
        for &ch in &BODY_SERVO_CHANNELS {
            bus.set_torque(ch, true)?;
        }

        info!("Body servos initialized");
        Ok(())
    }

    fn foot_channel(side: Side) -> u8 {
        match side {
            Side::Left => SERVO_CH_LEFT_FOOT,
            Side::Right => SERVO_CH_RIGHT_FOOT,
        }
    }
}

impl Body for ServoBody {
    fn tilt_left(&self) -> Result<(), BodyError> {
        // Override first so the actuation task stops touching the wheels
        self.state.set_manual_override(true);
        info!("Tilting left");
        self.bus.lock().set_position_deg(SERVO_CH_LEFT_LEG, LEG_TILT_LEFT)?;
        Ok(())
    }

    fn tilt_right(&self) -> Result<(), BodyError> {
        self.state.set_manual_override(true);
        info!("Tilting right");
        self.bus.lock().set_position_deg(SERVO_CH_RIGHT_LEG, LEG_TILT_RIGHT)?;
        Ok(())
    }

    fn set_foot(&self, side: Side, angle: i16) -> Result<(), BodyError> {
        self.bus.lock().set_position_deg(Self::foot_channel(side), angle)?;
        Ok(())
    }

    fn neutral_stance(&self) -> Result<(), BodyError> {
        let cal = self.state.calibration();
        let mut bus = self.bus.lock();
        match self.state.mode() {
            Mode::Walk => {
                info!("Returning to neutral WALK stance");
                bus.set_position_deg(SERVO_CH_LEFT_LEG, LEG_WALK_STANCE)?;
                bus.set_position_deg(SERVO_CH_RIGHT_LEG, LEG_WALK_STANCE)?;
                bus.set_position_deg(SERVO_CH_LEFT_FOOT, cal.left_foot_neutral)?;
                bus.set_position_deg(SERVO_CH_RIGHT_FOOT, cal.right_foot_neutral)?;
            }
            Mode::Roll => {
                info!("Returning to neutral ROLL stance");
                bus.set_position_deg(SERVO_CH_LEFT_LEG, LEG_ROLL_STANCE_LEFT)?;
                bus.set_position_deg(SERVO_CH_RIGHT_LEG, LEG_ROLL_STANCE_RIGHT)?;
                bus.set_wheel_speed(SERVO_CH_LEFT_FOOT, 0)?;
                bus.set_wheel_speed(SERVO_CH_RIGHT_FOOT, 0)?;
            }
        }
        Ok(())
    }

    fn enter_walk_mode(&self) -> Result<(), BodyError> {
        info!("Entering WALK mode");
        let cal = self.state.calibration();
        {
            let mut bus = self.bus.lock();
            bus.set_wheel_speed(SERVO_CH_LEFT_FOOT, 0)?;
            bus.set_wheel_speed(SERVO_CH_RIGHT_FOOT, 0)?;
            bus.set_mode(SERVO_CH_LEFT_FOOT, ServoMode::Joint)?;
            bus.set_mode(SERVO_CH_RIGHT_FOOT, ServoMode::Joint)?;
            bus.set_position_deg(SERVO_CH_LEFT_LEG, LEG_WALK_STANCE)?;
            bus.set_position_deg(SERVO_CH_RIGHT_LEG, LEG_WALK_STANCE)?;
            bus.set_position_deg(SERVO_CH_LEFT_FOOT, cal.left_foot_neutral)?;
            bus.set_position_deg(SERVO_CH_RIGHT_FOOT, cal.right_foot_neutral)?;
        }
        self.state.set_mode(Mode::Walk);
        Ok(())
    }

    fn enter_roll_mode(&self) -> Result<(), BodyError> {
        info!("Entering ROLL mode");
        {
            let mut bus = self.bus.lock();
            bus.set_position_deg(SERVO_CH_LEFT_LEG, LEG_ROLL_STANCE_LEFT)?;
            bus.set_position_deg(SERVO_CH_RIGHT_LEG, LEG_ROLL_STANCE_RIGHT)?;
            bus.set_mode(SERVO_CH_LEFT_FOOT, ServoMode::Wheel)?;
            bus.set_mode(SERVO_CH_RIGHT_FOOT, ServoMode::Wheel)?;
            bus.set_wheel_speed(SERVO_CH_LEFT_FOOT, 0)?;
            bus.set_wheel_speed(SERVO_CH_RIGHT_FOOT, 0)?;
        }
        self.state.set_mode(Mode::Roll);
        Ok(())
    }

    fn drive_wheels(&self, drive: DriveVector) -> Result<(), BodyError> {
        let (left, right) = mix_drive(drive);
        let mut bus = self.bus.lock();
        bus.set_wheel_speed(SERVO_CH_LEFT_FOOT, left)?;
        bus.set_wheel_speed(SERVO_CH_RIGHT_FOOT, right)?;
        Ok(())
    }
}

impl Drop for ServoBody {
    fn drop(&mut self) {
        // Try to stop the wheels when the body is dropped (safety measure)
        let mut bus = self.bus.lock();
        for ch in [SERVO_CH_LEFT_FOOT, SERVO_CH_RIGHT_FOOT] {
            if let Err(e) = bus.set_wheel_speed(ch, 0) {
                warn!("Failed to stop wheel servo {} on drop: {}", ch, e);
            }
        }
    }
}

/// Log-only body for running the stack without hardware. Shared-state side
/// effects (manual override, mode) behave exactly like the real body.
pub struct DryRunBody {
    state: StateHandle,
}

impl DryRunBody {
    pub fn new(state: StateHandle) -> Self {
        Self { state }
    }
}

impl Body for DryRunBody {
    fn tilt_left(&self) -> Result<(), BodyError> {
        self.state.set_manual_override(true);
        info!("[dry-run] tilt left");
        Ok(())
    }

    fn tilt_right(&self) -> Result<(), BodyError> {
        self.state.set_manual_override(true);
        info!("[dry-run] tilt right");
        Ok(())
    }

    fn set_foot(&self, side: Side, angle: i16) -> Result<(), BodyError> {
        info!("[dry-run] set {:?} foot to {} deg", side, angle);
        Ok(())
    }

    fn neutral_stance(&self) -> Result<(), BodyError> {
        info!("[dry-run] neutral stance");
        Ok(())
    }

    fn enter_walk_mode(&self) -> Result<(), BodyError> {
        info!("[dry-run] enter WALK mode");
        self.state.set_mode(Mode::Walk);
        Ok(())
    }

    fn enter_roll_mode(&self) -> Result<(), BodyError> {
        info!("[dry-run] enter ROLL mode");
        self.state.set_mode(Mode::Roll);
        Ok(())
    }

    fn drive_wheels(&self, drive: DriveVector) -> Result<(), BodyError> {
        if !drive.is_zero() {
            let (left, right) = mix_drive(drive);
            info!("[dry-run] wheels: left={}, right={}", left, right);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mix_zero_is_stopped() {
        assert_eq!(mix_drive(DriveVector::ZERO), (0, 0));
    }

    #[test]
    fn test_mix_straight_drive() {
        // Pure forward: both wheels same magnitude, right negated for mirrored mounting
        let (left, right) = mix_drive(DriveVector { x: 0, y: 100 });
        assert_eq!(left, 1000);
        assert_eq!(right, -1000);

        let (left, right) = mix_drive(DriveVector { x: 0, y: -100 });
        assert_eq!(left, -1000);
        assert_eq!(right, 1000);
    }

    #[test]
    fn test_mix_pivot_left_vector() {
        // The contract ROLL left-turn vector {-75,-64}: left wheel reverses
        // harder than the right, pivoting the base left
        let (left, right) = mix_drive(DriveVector { x: -75, y: -64 });
        assert_eq!(left, -1000); // -139 clamped to -100, scaled
        assert_eq!(right, -110); // -(-64+75) scaled
    }

    #[test]
    fn test_mix_clamps_combined_bias() {
        let (left, right) = mix_drive(DriveVector { x: 100, y: 100 });
        assert!(left.abs() <= 1000);
        assert!(right.abs() <= 1000);
    }
}
