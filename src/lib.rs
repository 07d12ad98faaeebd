// Motion-command runtime for the two-mode (WALK/ROLL) ninja robot
//
// Modules:
// - messages: command surface and wire types
// - state: shared control state, mode, calibration
// - servo: serial bus-servo protocol
// - body: actuation primitives over the bus (or dry-run)
// - orchestrator: mode-aware command handlers
// - runtime: zenoh command endpoint + actuation loop

pub mod body;
pub mod config;
pub mod messages;
pub mod orchestrator;
pub mod runtime;
pub mod servo;
pub mod state;
