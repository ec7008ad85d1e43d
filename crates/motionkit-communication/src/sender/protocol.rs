//! Line protocol helpers
//!
//! Framing of relative moves and classification of device response lines.

use crate::communication::LINE_ENDING;
use motionkit_core::{Feedrate, Position};

/// Acknowledgment line
pub const OK: &str = "ok";

/// Prefix of a rejection line
pub const ERROR_PREFIX: &str = "error:";

/// How a response line relates to the pending command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseLine {
    /// Exactly `ok`
    Ok,
    /// Starts with `error:`
    Error(String),
    /// Anything else (echo, status, banner)
    Info(String),
}

impl ResponseLine {
    /// Classify a trimmed line
    pub fn classify(line: &str) -> Self {
        if line == OK {
            ResponseLine::Ok
        } else if line.starts_with(ERROR_PREFIX) {
            ResponseLine::Error(line.to_string())
        } else {
            ResponseLine::Info(line.to_string())
        }
    }

    /// True for `ok` and `error:` lines
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ResponseLine::Info(_))
    }
}

/// Lines framing one relative move
///
/// Millimetres, relative mode, feedrate, the move itself, back to absolute
/// mode, program end.
pub fn frame_relative_move(delta: Position, feedrate: Feedrate) -> Vec<String> {
    // Adding 0.0 turns -0.0 into 0.0 so the line never reads "X-0.000"
    let delta = Position::new(delta.x + 0.0, delta.y + 0.0, delta.z + 0.0);
    vec![
        "G21".to_string(),
        "G91".to_string(),
        format!("F{}", feedrate),
        format!("G1 X{:.3} Y{:.3} Z{:.3}", delta.x, delta.y, delta.z),
        "G90".to_string(),
        "M2".to_string(),
    ]
}

/// True if `line` is the motion line of a framed move
pub fn is_motion_line(line: &str) -> bool {
    line.starts_with("G1 ")
}

/// Normalise a command to exactly one CRLF-terminated line
pub fn encode_line(command: &str) -> String {
    let mut line = command.trim_end_matches(['\r', '\n']).to_string();
    line.push_str(LINE_ENDING);
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_relative_move() {
        let lines = frame_relative_move(
            Position::new(1.0, -2.5, 0.1234),
            Feedrate::new(200.0).unwrap(),
        );
        assert_eq!(
            lines,
            vec!["G21", "G91", "F200", "G1 X1.000 Y-2.500 Z0.123", "G90", "M2"]
        );
        assert!(is_motion_line(&lines[3]));
        assert!(!is_motion_line(&lines[0]));
    }

    #[test]
    fn test_negative_zero_is_normalised() {
        let lines = frame_relative_move(-Position::zero(), Feedrate::new(200.0).unwrap());
        assert_eq!(lines[3], "G1 X0.000 Y0.000 Z0.000");
    }

    #[test]
    fn test_fractional_feedrate() {
        let lines = frame_relative_move(Position::zero(), Feedrate::new(150.5).unwrap());
        assert_eq!(lines[2], "F150.5");
    }

    #[test]
    fn test_classify() {
        assert_eq!(ResponseLine::classify("ok"), ResponseLine::Ok);
        assert_eq!(
            ResponseLine::classify("error:20"),
            ResponseLine::Error("error:20".to_string())
        );
        assert!(!ResponseLine::classify("okay").is_terminal());
        assert!(!ResponseLine::classify("[MSG:Caution]").is_terminal());
        assert!(ResponseLine::classify("error: bad").is_terminal());
    }

    #[test]
    fn test_encode_line() {
        assert_eq!(encode_line("G21"), "G21\r\n");
        assert_eq!(encode_line("G21\r\n"), "G21\r\n");
        assert_eq!(encode_line("G21\n"), "G21\r\n");
    }
}
