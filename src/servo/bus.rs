// Serial bus-servo protocol for the ninja's SCS-series servos
//
// Half-duplex TTL, Dynamixel-1.0-style framing:
// Packet format: [0xFF, 0xFF, ID, Length, Instruction, Params..., Checksum]

use serialport::{self, SerialPort};
use std::io::{Read, Write};
use std::time::Duration;
use tracing::debug;

/// Default serial configuration for the servo bus
pub const DEFAULT_BAUDRATE: u32 = 1_000_000;
pub const DEFAULT_TIMEOUT_MS: u64 = 100;

/// Packet header bytes
const HEADER: [u8; 2] = [0xFF, 0xFF];

/// Servo travel: 0..=300 degrees maps to 0..=1023 ticks
const MAX_ANGLE_DEG: i16 = 300;
const TICKS_PER_RANGE: f32 = 1023.0;

#[repr(u8)]
#[derive(Debug, Clone, Copy)]
enum Instruction {
    Ping = 0x01,
    Write = 0x03,
}

/// Register addresses (RAM area)
#[repr(u8)]
#[derive(Debug, Clone, Copy)]
enum Register {
    RunMode = 33,      // 1 byte: 0=position (joint), 1=wheel (continuous)
    TorqueEnable = 40, // 1 byte: 0=off, 1=on
    GoalPosition = 42, // 2 bytes, ticks
    GoalSpeed = 46,    // 2 bytes, sign-magnitude (wheel mode)
}

/// Servo run modes: joint servos hold positions, wheel mode spins freely
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ServoMode {
    Joint = 0,
    Wheel = 1,
}

#[derive(Debug, thiserror::Error)]
pub enum ServoBusError {
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid response from servo {id}: {reason}")]
    InvalidResponse { id: u8, reason: String },

    #[error("Checksum mismatch for servo {id}")]
    ChecksumMismatch { id: u8 },

    #[error("Servo {id} returned error status: 0x{status:02X}")]
    ServoError { id: u8, status: u8 },

    #[error("Timeout waiting for response from servo {id}")]
    Timeout { id: u8 },

    #[error("Angle {angle} out of range for servo {id} (0..={max})")]
    AngleOutOfRange { id: u8, angle: i16, max: i16 },
}

pub type Result<T> = std::result::Result<T, ServoBusError>;

/// Servo bus - handles serial communication with the four body servos
pub struct ServoBus {
    port: Box<dyn SerialPort>,
}

impl ServoBus {
    /// Open a new connection to the servo bus
    pub fn open(port_name: &str) -> Result<Self> {
        Self::open_with_baudrate(port_name, DEFAULT_BAUDRATE)
    }

    /// Open with custom baudrate
    pub fn open_with_baudrate(port_name: &str, baudrate: u32) -> Result<Self> {
        let port = serialport::new(port_name, baudrate)
            .timeout(Duration::from_millis(DEFAULT_TIMEOUT_MS))
            .open()?;

        Ok(Self { port })
    }

    /// Calculate checksum for a packet (excluding header)
    fn checksum(data: &[u8]) -> u8 {
        let sum: u16 = data.iter().map(|&b| b as u16).sum();
        (!sum & 0xFF) as u8
    }

    /// Build a packet with header and checksum
    fn build_packet(id: u8, instruction: Instruction, params: &[u8]) -> Vec<u8> {
        let length = (params.len() + 2) as u8; // params + instruction + checksum
        let mut packet = Vec::with_capacity(6 + params.len());

        packet.extend_from_slice(&HEADER);
        packet.push(id);
        packet.push(length);
        packet.push(instruction as u8);
        packet.extend_from_slice(params);

        // Checksum over id, length, instruction, params
        let checksum = Self::checksum(&packet[2..]);
        packet.push(checksum);

        packet
    }

    fn send_packet(&mut self, packet: &[u8]) -> Result<()> {
        self.port.write_all(packet)?;
        self.port.flush()?;
        Ok(())
    }

    /// Read a status packet and verify its framing
    fn read_status(&mut self, expected_id: u8) -> Result<()> {
        let mut header = [0u8; 2];
        self.port.read_exact(&mut header).map_err(|e| {
            if e.kind() == std::io::ErrorKind::TimedOut {
                ServoBusError::Timeout { id: expected_id }
            } else {
                ServoBusError::Io(e)
            }
        })?;

        if header != HEADER {
            return Err(ServoBusError::InvalidResponse {
                id: expected_id,
                reason: format!("Invalid header: {:02X?}", header),
            });
        }

        let mut id_length = [0u8; 2];
        self.port.read_exact(&mut id_length)?;
        let id = id_length[0];
        let length = id_length[1] as usize;

        if id != expected_id {
            return Err(ServoBusError::InvalidResponse {
                id: expected_id,
                reason: format!("ID mismatch: expected {}, got {}", expected_id, id),
            });
        }

        // error + params + checksum = length bytes
        let mut remaining = vec![0u8; length];
        self.port.read_exact(&mut remaining)?;

        let mut checksum_data = vec![id, length as u8];
        checksum_data.extend_from_slice(&remaining[..remaining.len() - 1]);
        if Self::checksum(&checksum_data) != remaining[remaining.len() - 1] {
            return Err(ServoBusError::ChecksumMismatch { id });
        }

        let status = remaining[0];
        if status != 0 {
            return Err(ServoBusError::ServoError { id, status });
        }

        Ok(())
    }

    /// Ping a servo to check if it's connected
    pub fn ping(&mut self, id: u8) -> Result<bool> {
        let packet = Self::build_packet(id, Instruction::Ping, &[]);
        self.send_packet(&packet)?;

        match self.read_status(id) {
            Ok(()) => Ok(true),
            Err(ServoBusError::Timeout { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn write_u8(&mut self, id: u8, register: Register, value: u8) -> Result<()> {
        let params = [register as u8, value];
        let packet = Self::build_packet(id, Instruction::Write, &params);
        debug!("Write u8 to servo {}: reg={:?}, value={}", id, register, value);
        self.send_packet(&packet)?;
        self.read_status(id)
    }

    fn write_u16(&mut self, id: u8, register: Register, value: u16) -> Result<()> {
        let params = [register as u8, (value & 0xFF) as u8, (value >> 8) as u8];
        let packet = Self::build_packet(id, Instruction::Write, &params);
        debug!("Write u16 to servo {}: reg={:?}, value={}", id, register, value);
        self.send_packet(&packet)?;
        self.read_status(id)
    }

    /// Enable or disable torque on a servo
    pub fn set_torque(&mut self, id: u8, on: bool) -> Result<()> {
        self.write_u8(id, Register::TorqueEnable, on as u8)
    }

    /// Switch a servo between joint (position) and wheel (continuous) mode
    pub fn set_mode(&mut self, id: u8, mode: ServoMode) -> Result<()> {
        self.write_u8(id, Register::RunMode, mode as u8)
    }

    /// Move a servo to an absolute position in degrees (joint mode)
    pub fn set_position_deg(&mut self, id: u8, angle: i16) -> Result<()> {
        if !(0..=MAX_ANGLE_DEG).contains(&angle) {
            return Err(ServoBusError::AngleOutOfRange {
                id,
                angle,
                max: MAX_ANGLE_DEG,
            });
        }
        self.write_u16(id, Register::GoalPosition, deg_to_ticks(angle))
    }

    /// Set a servo's rotation speed (wheel mode). Range -1023..=1023,
    /// positive = clockwise as seen from the horn side.
    pub fn set_wheel_speed(&mut self, id: u8, speed: i16) -> Result<()> {
        let clamped = speed.clamp(-1023, 1023);
        self.write_u16(id, Register::GoalSpeed, encode_sign_magnitude(clamped))
    }
}

/// Convert degrees (0..=300) to servo ticks (0..=1023)
fn deg_to_ticks(angle: i16) -> u16 {
    let ticks = (angle as f32 / MAX_ANGLE_DEG as f32) * TICKS_PER_RANGE;
    ticks.round() as u16
}

/// Encode a signed speed to sign-magnitude format
/// Bit 15 = sign (1 = negative), bits 0-14 = magnitude
fn encode_sign_magnitude(value: i16) -> u16 {
    if value >= 0 {
        value as u16
    } else {
        0x8000 | (-value as u16)
    }
}
