// Message and command types for the runtime

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::state::Mode;

/// Joystick-equivalent drive bias. Magnitude is at most 100 per axis by
/// convention; `x` is lateral/turn bias, `y` forward/back bias.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DriveVector {
    pub x: i16,
    pub y: i16,
}

impl DriveVector {
    pub const ZERO: DriveVector = DriveVector { x: 0, y: 0 };

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}

/// Which foot servo a choreographed turn actuates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

/// The seven-command surface exposed on the command topic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    MoveForward,
    MoveBackward,
    TurnLeft,
    TurnRight,
    GetMode,
    SetWalkMode,
    SetRollMode,
    GoHome,
}

impl Command {
    /// All commands, in surface order
    pub const ALL: [Command; 8] = [
        Command::MoveForward,
        Command::MoveBackward,
        Command::TurnLeft,
        Command::TurnRight,
        Command::GetMode,
        Command::SetWalkMode,
        Command::SetRollMode,
        Command::GoHome,
    ];

    /// The command-topic key suffix naming this command
    pub fn name(&self) -> &'static str {
        match self {
            Command::MoveForward => "move_forward",
            Command::MoveBackward => "move_backward",
            Command::TurnLeft => "turn_left",
            Command::TurnRight => "turn_right",
            Command::GetMode => "get_mode",
            Command::SetWalkMode => "set_walk_mode",
            Command::SetRollMode => "set_roll_mode",
            Command::GoHome => "go_home",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown command: {0}")]
pub struct ParseCommandError(pub String);

impl FromStr for Command {
    type Err = ParseCommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "move_forward" => Ok(Command::MoveForward),
            "move_backward" => Ok(Command::MoveBackward),
            "turn_left" => Ok(Command::TurnLeft),
            "turn_right" => Ok(Command::TurnRight),
            "get_mode" => Ok(Command::GetMode),
            "set_walk_mode" => Ok(Command::SetWalkMode),
            "set_roll_mode" => Ok(Command::SetRollMode),
            "go_home" => Ok(Command::GoHome),
            other => Err(ParseCommandError(other.to_string())),
        }
    }
}

/// Structured payload returned by `get_mode`
#[derive(Debug, Clone, Serialize)]
pub struct ModeReport {
    pub mode: &'static str,
    pub description: &'static str,
}

impl From<Mode> for ModeReport {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Walk => ModeReport {
                mode: "walk",
                description: "Chế độ ĐI BỘ - robot Ninja đi bằng 2 chân",
            },
            Mode::Roll => ModeReport {
                mode: "roll",
                description: "Chế độ LĂN - robot Ninja lăn bằng bánh xe",
            },
        }
    }
}

/// Telemetry snapshot published on the state topic each loop tick
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub drive: DriveVector,
    pub mode: Mode,
    pub manual_override: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_name_roundtrip() {
        for cmd in Command::ALL {
            assert_eq!(cmd.name().parse::<Command>().unwrap(), cmd);
        }
    }

    #[test]
    fn test_parse_trims_whitespace() {
        assert_eq!(" turn_left \n".parse::<Command>().unwrap(), Command::TurnLeft);
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert!("jump".parse::<Command>().is_err());
        assert!("".parse::<Command>().is_err());
    }

    #[test]
    fn test_mode_report_payload() {
        let walk = serde_json::to_string(&ModeReport::from(Mode::Walk)).unwrap();
        assert!(walk.contains("\"mode\":\"walk\""));
        let roll = serde_json::to_string(&ModeReport::from(Mode::Roll)).unwrap();
        assert!(roll.contains("\"mode\":\"roll\""));
        assert!(roll.contains("LĂN"));
    }
}
