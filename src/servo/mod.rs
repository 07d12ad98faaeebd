// Servo bus module for the ninja's four bus servos
//
// Provides:
// - Half-duplex TTL protocol (packet framing, checksum, status replies)
// - Degree-based position writes for the leg and foot servos
// - Signed speed writes for continuous-rotation (wheel) mode

mod bus;

pub use bus::{ServoBus, ServoBusError, ServoMode};
