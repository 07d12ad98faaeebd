// Mode-aware motion-command orchestrator
//
// Translates the seven-command surface into actuation sequences, branching on
// the current locomotion mode:
// - continuous drive: write a drive vector into shared state, hold, zero it
//   (forward/backward in both modes, ROLL-mode turns)
// - choreographed turn (WALK mode): tilt, settle, offset one foot servo for a
//   bounded time, restore neutral, force return to neutral stance
//
// Every command leaves the shared state at rest on exit: drive {0,0} and
// manual override cleared. One command is in flight at a time; timed holds
// are cooperative sleeps, so the actuation task keeps running underneath.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{info, warn};

use crate::body::{Body, BodyError};
use crate::config::{
    DRIVE_BACKWARD, DRIVE_FORWARD, DRIVE_HOLD, DRIVE_TURN_LEFT, DRIVE_TURN_RIGHT, FOOT_HOLD,
    TILT_SETTLE, TURN_HOLD,
};
use crate::messages::{Command, DriveVector, ModeReport, Side};
use crate::state::{Calibration, Mode, StateHandle};

/// What a command does in a given mode. `behavior_for` is the full
/// command/mode matrix, kept pure so it can be tested directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    Drive { vector: DriveVector, hold: Duration },
    ChoreographedTurn(Side),
    SwitchMode(Mode),
    GoHome,
    ReportMode,
}

pub fn behavior_for(cmd: Command, mode: Mode) -> Behavior {
    match (cmd, mode) {
        (Command::MoveForward, _) => Behavior::Drive {
            vector: DRIVE_FORWARD,
            hold: DRIVE_HOLD,
        },
        (Command::MoveBackward, _) => Behavior::Drive {
            vector: DRIVE_BACKWARD,
            hold: DRIVE_HOLD,
        },
        (Command::TurnLeft, Mode::Walk) => Behavior::ChoreographedTurn(Side::Left),
        (Command::TurnRight, Mode::Walk) => Behavior::ChoreographedTurn(Side::Right),
        (Command::TurnLeft, Mode::Roll) => Behavior::Drive {
            vector: DRIVE_TURN_LEFT,
            hold: TURN_HOLD,
        },
        (Command::TurnRight, Mode::Roll) => Behavior::Drive {
            vector: DRIVE_TURN_RIGHT,
            hold: TURN_HOLD,
        },
        (Command::GetMode, _) => Behavior::ReportMode,
        (Command::SetWalkMode, _) => Behavior::SwitchMode(Mode::Walk),
        (Command::SetRollMode, _) => Behavior::SwitchMode(Mode::Roll),
        (Command::GoHome, _) => Behavior::GoHome,
    }
}

/// Foot-servo angles for a choreographed turn: (neutral, turn target).
///
/// Left turn offsets the left foot by +offset, right turn the right foot by
/// -offset. The sign asymmetry reflects opposite servo mounting orientation
/// and holds for negative offsets too.
pub fn foot_turn_angles(cal: &Calibration, side: Side) -> (i16, i16) {
    match side {
        Side::Left => (
            cal.left_foot_neutral,
            cal.left_foot_neutral + cal.left_foot_turn_offset,
        ),
        Side::Right => (
            cal.right_foot_neutral,
            cal.right_foot_neutral - cal.right_foot_turn_offset,
        ),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error(transparent)]
    Body(#[from] BodyError),

    #[error("Failed to encode mode report: {0}")]
    Encode(#[from] serde_json::Error),
}

/// The orchestrator holds no state of its own; each dispatch is a stateless
/// transformation applied to the shared state and the body.
pub struct Orchestrator<B: Body> {
    state: StateHandle,
    body: Arc<B>,
}

impl<B: Body> Orchestrator<B> {
    pub fn new(state: StateHandle, body: Arc<B>) -> Self {
        Self { state, body }
    }

    /// Run one command to completion and return its narration.
    pub async fn dispatch(&self, cmd: Command) -> Result<String, CommandError> {
        let mode = self.state.mode();
        info!("Command {} - mode: {:?}", cmd, mode);

        match behavior_for(cmd, mode) {
            Behavior::Drive { vector, hold } => {
                self.drive_hold(vector, hold).await;
                Ok(drive_narration(cmd, mode))
            }
            Behavior::ChoreographedTurn(side) => {
                self.choreographed_turn(side).await?;
                Ok(match side {
                    Side::Left => "Robot Ninja quay trái xong (nghiêng + xoay LF)".to_string(),
                    Side::Right => "Robot Ninja quay phải xong (nghiêng + xoay RF)".to_string(),
                })
            }
            Behavior::SwitchMode(Mode::Walk) => {
                self.body.enter_walk_mode()?;
                Ok("Robot Ninja đã chuyển sang chế độ ĐI BỘ".to_string())
            }
            Behavior::SwitchMode(Mode::Roll) => {
                self.body.enter_roll_mode()?;
                Ok("Robot Ninja đã chuyển sang chế độ LĂN".to_string())
            }
            Behavior::GoHome => {
                self.body.neutral_stance()?;
                Ok("Robot Ninja đã về vị trí HOME".to_string())
            }
            Behavior::ReportMode => Ok(serde_json::to_string(&ModeReport::from(mode))?),
        }
    }

    /// Continuous-drive handler: set the vector, hold, stop. Cannot fail -
    /// both writes go to in-memory shared state; the actuation task picks
    /// the vector up for the duration of the hold.
    async fn drive_hold(&self, vector: DriveVector, hold: Duration) {
        self.state.set_drive(vector);
        sleep(hold).await;
        self.state.set_drive(DriveVector::ZERO);
    }

    /// Choreographed-turn handler with a fail-safe boundary: if any body
    /// primitive fails mid-sequence, the robot is forced back to rest
    /// (drive zeroed, override cleared, neutral stance attempted) before
    /// the error propagates.
    async fn choreographed_turn(&self, side: Side) -> Result<(), BodyError> {
        let result = self.turn_sequence(side).await;

        if let Err(ref e) = result {
            warn!("Turn choreography failed ({}), forcing return to rest", e);
            self.state.set_drive(DriveVector::ZERO);
            self.state.set_manual_override(false);
            if let Err(e2) = self.body.neutral_stance() {
                warn!("Fail-safe neutral stance also failed: {}", e2);
            }
        }

        result
    }

    async fn turn_sequence(&self, side: Side) -> Result<(), BodyError> {
        // Re-fetched on every turn; calibration can change between commands
        let cal = self.state.calibration();
        let (neutral, target) = foot_turn_angles(&cal, side);

        // Tilt exactly like the teleop UI button would; the primitive sets
        // the manual override as a side effect
        match side {
            Side::Left => self.body.tilt_left()?,
            Side::Right => self.body.tilt_right()?,
        }

        // Let the tilt take mechanical effect
        sleep(TILT_SETTLE).await;

        // Rotate the foot against the ground, then bring it back
        self.body.set_foot(side, target)?;
        sleep(FOOT_HOLD).await;
        self.body.set_foot(side, neutral)?;

        // Back to a neutral standing posture
        self.state.set_manual_override(false);
        self.body.neutral_stance()?;
        Ok(())
    }
}

fn drive_narration(cmd: Command, mode: Mode) -> String {
    let mode_vn = match mode {
        Mode::Walk => "ĐI BỘ",
        Mode::Roll => "LĂN",
    };
    match cmd {
        Command::MoveForward => {
            format!("Robot Ninja đã tiến về phía trước 3 giây ở chế độ {}", mode_vn)
        }
        Command::MoveBackward => {
            format!("Robot Ninja đã lùi về phía sau 3 giây ở chế độ {}", mode_vn)
        }
        Command::TurnLeft => "Robot Ninja quay trái xong (chế độ lăn)".to_string(),
        Command::TurnRight => "Robot Ninja quay phải xong (chế độ lăn)".to_string(),
        // Remaining commands never reach the drive handler
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_CALIBRATION;
    use crate::state::SharedState;
    use parking_lot::Mutex;
    use tokio::time::Instant;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum BodyCall {
        TiltLeft,
        TiltRight,
        SetFoot(Side, i16),
        NeutralStance,
        EnterWalk,
        EnterRoll,
    }

    /// Recording body with the same shared-state side effects as the real
    /// one; optionally fails foot-servo writes to exercise the fail-safe.
    struct MockBody {
        state: StateHandle,
        calls: Mutex<Vec<BodyCall>>,
        fail_foot_writes: bool,
    }

    impl MockBody {
        fn new(state: StateHandle) -> Self {
            Self {
                state,
                calls: Mutex::new(Vec::new()),
                fail_foot_writes: false,
            }
        }

        fn failing_feet(state: StateHandle) -> Self {
            Self {
                fail_foot_writes: true,
                ..Self::new(state)
            }
        }

        fn calls(&self) -> Vec<BodyCall> {
            self.calls.lock().clone()
        }
    }

    impl Body for MockBody {
        fn tilt_left(&self) -> Result<(), BodyError> {
            self.state.set_manual_override(true);
            self.calls.lock().push(BodyCall::TiltLeft);
            Ok(())
        }

        fn tilt_right(&self) -> Result<(), BodyError> {
            self.state.set_manual_override(true);
            self.calls.lock().push(BodyCall::TiltRight);
            Ok(())
        }

        fn set_foot(&self, side: Side, angle: i16) -> Result<(), BodyError> {
            if self.fail_foot_writes {
                return Err(BodyError::Fault("foot servo unreachable".into()));
            }
            self.calls.lock().push(BodyCall::SetFoot(side, angle));
            Ok(())
        }

        fn neutral_stance(&self) -> Result<(), BodyError> {
            self.calls.lock().push(BodyCall::NeutralStance);
            Ok(())
        }

        fn enter_walk_mode(&self) -> Result<(), BodyError> {
            self.calls.lock().push(BodyCall::EnterWalk);
            self.state.set_mode(Mode::Walk);
            Ok(())
        }

        fn enter_roll_mode(&self) -> Result<(), BodyError> {
            self.calls.lock().push(BodyCall::EnterRoll);
            self.state.set_mode(Mode::Roll);
            Ok(())
        }

        fn drive_wheels(&self, _drive: DriveVector) -> Result<(), BodyError> {
            Ok(())
        }
    }

    fn setup(mode: Mode, cal: Calibration) -> (StateHandle, Arc<MockBody>, Orchestrator<MockBody>) {
        let state = SharedState::new(mode, cal);
        let body = Arc::new(MockBody::new(state.clone()));
        let orch = Orchestrator::new(state.clone(), body.clone());
        (state, body, orch)
    }

    #[test]
    fn test_behavior_matrix() {
        use Behavior::*;
        for mode in [Mode::Walk, Mode::Roll] {
            assert_eq!(
                behavior_for(Command::MoveForward, mode),
                Drive { vector: DRIVE_FORWARD, hold: DRIVE_HOLD }
            );
            assert_eq!(
                behavior_for(Command::MoveBackward, mode),
                Drive { vector: DRIVE_BACKWARD, hold: DRIVE_HOLD }
            );
            assert_eq!(behavior_for(Command::GetMode, mode), ReportMode);
            assert_eq!(behavior_for(Command::GoHome, mode), GoHome);
        }
        assert_eq!(
            behavior_for(Command::TurnLeft, Mode::Walk),
            ChoreographedTurn(Side::Left)
        );
        assert_eq!(
            behavior_for(Command::TurnRight, Mode::Walk),
            ChoreographedTurn(Side::Right)
        );
        assert_eq!(
            behavior_for(Command::TurnLeft, Mode::Roll),
            Drive { vector: DRIVE_TURN_LEFT, hold: TURN_HOLD }
        );
        assert_eq!(
            behavior_for(Command::TurnRight, Mode::Roll),
            Drive { vector: DRIVE_TURN_RIGHT, hold: TURN_HOLD }
        );
    }

    #[test]
    fn test_foot_turn_angle_signs() {
        let cal = Calibration {
            left_foot_neutral: 90,
            left_foot_turn_offset: 20,
            right_foot_neutral: 90,
            right_foot_turn_offset: 20,
        };
        assert_eq!(foot_turn_angles(&cal, Side::Left), (90, 110));
        assert_eq!(foot_turn_angles(&cal, Side::Right), (90, 70));

        // Sign asymmetry must hold for negative offsets too
        let flipped = Calibration {
            left_foot_neutral: 85,
            left_foot_turn_offset: -15,
            right_foot_neutral: 95,
            right_foot_turn_offset: -10,
        };
        assert_eq!(foot_turn_angles(&flipped, Side::Left), (85, 70));
        assert_eq!(foot_turn_angles(&flipped, Side::Right), (95, 105));
    }

    #[tokio::test(start_paused = true)]
    async fn test_forward_holds_then_stops() {
        let (state, body, orch) = setup(Mode::Walk, DEFAULT_CALIBRATION);
        let start = Instant::now();

        let narration = orch.dispatch(Command::MoveForward).await.unwrap();

        assert!(state.drive().is_zero());
        assert!(start.elapsed() >= Duration::from_millis(3000));
        assert!(narration.contains("tiến"));
        assert!(narration.contains("ĐI BỘ"));
        assert!(body.calls().is_empty()); // drive commands never touch the body
    }

    #[tokio::test(start_paused = true)]
    async fn test_backward_narrates_current_mode() {
        let (state, _body, orch) = setup(Mode::Roll, DEFAULT_CALIBRATION);

        let narration = orch.dispatch(Command::MoveBackward).await.unwrap();

        assert!(state.drive().is_zero());
        assert!(narration.contains("lùi"));
        assert!(narration.contains("LĂN"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_roll_turn_left_drive_profile() {
        let (state, _body, orch) = setup(Mode::Roll, DEFAULT_CALIBRATION);

        let orch = Arc::new(orch);
        let task = {
            let orch = orch.clone();
            tokio::spawn(async move { orch.dispatch(Command::TurnLeft).await })
        };

        // Let the handler run up to its hold, then check the vector is live
        tokio::task::yield_now().await;
        assert_eq!(state.drive(), DRIVE_TURN_LEFT);

        tokio::time::advance(Duration::from_millis(500)).await;
        let narration = task.await.unwrap().unwrap();

        assert!(state.drive().is_zero());
        assert!(narration.contains("lăn"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_walk_turn_left_choreography() {
        let cal = Calibration {
            left_foot_neutral: 90,
            left_foot_turn_offset: 20,
            right_foot_neutral: 90,
            right_foot_turn_offset: 20,
        };
        let (state, body, orch) = setup(Mode::Walk, cal);
        let start = Instant::now();

        let narration = orch.dispatch(Command::TurnLeft).await.unwrap();

        assert_eq!(
            body.calls(),
            vec![
                BodyCall::TiltLeft,
                BodyCall::SetFoot(Side::Left, 110),
                BodyCall::SetFoot(Side::Left, 90),
                BodyCall::NeutralStance,
            ]
        );
        assert!(!state.manual_override());
        assert!(state.drive().is_zero());
        assert!(start.elapsed() >= Duration::from_millis(1500));
        assert!(narration.contains("quay trái"));

        // Mutual exclusion: the right foot is never actuated
        assert!(!body
            .calls()
            .iter()
            .any(|c| matches!(c, BodyCall::SetFoot(Side::Right, _))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_walk_turn_right_uses_negated_offset() {
        let cal = Calibration {
            left_foot_neutral: 90,
            left_foot_turn_offset: 20,
            right_foot_neutral: 88,
            right_foot_turn_offset: -10,
        };
        let (state, body, orch) = setup(Mode::Walk, cal);

        orch.dispatch(Command::TurnRight).await.unwrap();

        assert_eq!(
            body.calls(),
            vec![
                BodyCall::TiltRight,
                BodyCall::SetFoot(Side::Right, 98), // 88 - (-10)
                BodyCall::SetFoot(Side::Right, 88),
                BodyCall::NeutralStance,
            ]
        );
        assert!(!state.manual_override());
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_mode_is_pure() {
        let (state, body, orch) = setup(Mode::Roll, DEFAULT_CALIBRATION);
        state.set_drive(DriveVector { x: 7, y: -3 });

        let first = orch.dispatch(Command::GetMode).await.unwrap();
        let second = orch.dispatch(Command::GetMode).await.unwrap();

        assert_eq!(first, second);
        assert!(first.contains("\"mode\":\"roll\""));
        assert_eq!(state.mode(), Mode::Roll);
        // Query commands leave drive state untouched
        assert_eq!(state.drive(), DriveVector { x: 7, y: -3 });
        assert!(body.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_mode_switch_passthrough() {
        let (state, body, orch) = setup(Mode::Walk, DEFAULT_CALIBRATION);

        let narration = orch.dispatch(Command::SetRollMode).await.unwrap();

        assert_eq!(body.calls(), vec![BodyCall::EnterRoll]);
        assert_eq!(state.mode(), Mode::Roll);
        assert!(narration.contains("LĂN"));

        let narration = orch.dispatch(Command::SetWalkMode).await.unwrap();
        assert_eq!(state.mode(), Mode::Walk);
        assert!(narration.contains("ĐI BỘ"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_go_home_passthrough() {
        let (_state, body, orch) = setup(Mode::Walk, DEFAULT_CALIBRATION);

        let narration = orch.dispatch(Command::GoHome).await.unwrap();

        assert_eq!(body.calls(), vec![BodyCall::NeutralStance]);
        assert!(narration.contains("HOME"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sequential_forward_backward() {
        let (state, _body, orch) = setup(Mode::Walk, DEFAULT_CALIBRATION);
        let start = Instant::now();

        orch.dispatch(Command::MoveForward).await.unwrap();
        assert!(state.drive().is_zero());

        orch.dispatch(Command::MoveBackward).await.unwrap();
        assert!(state.drive().is_zero());

        assert!(start.elapsed() >= Duration::from_millis(6000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_turn_fail_safe_restores_rest_state() {
        let state = SharedState::new(Mode::Walk, DEFAULT_CALIBRATION);
        let body = Arc::new(MockBody::failing_feet(state.clone()));
        let orch = Orchestrator::new(state.clone(), body.clone());

        let result = orch.dispatch(Command::TurnLeft).await;

        assert!(result.is_err());
        // Fail-safe: override cleared, drive zeroed, neutral stance attempted
        assert!(!state.manual_override());
        assert!(state.drive().is_zero());
        assert!(body.calls().contains(&BodyCall::NeutralStance));
    }
}
