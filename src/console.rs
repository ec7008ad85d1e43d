//! Interactive motion console
//!
//! Reads one command per line:
//!
//! ```text
//! move <dx> <dy> <dz> [feed]   relative move
//! home [feed]                  return to the origin
//! raw <gcode...>               send one line and wait for ok
//! pos                          print the position once queued commands finish
//! ports                        list serial ports
//! connect <port> [baud]        (re)connect
//! disconnect
//! help
//! quit
//! ```

use crate::session::MotionSession;
use motionkit_core::{
    ensure_positive_float, parse_float, parse_int, Error, Feedrate, Position, Result,
};
use std::io::{BufRead, Write};
use std::time::Duration;

const QUEUE_TIMEOUT: Duration = Duration::from_secs(30);

const HELP: &str = "\
move <dx> <dy> <dz> [feed]  relative move
home [feed]                 return to the origin
raw <gcode...>              send one line and wait for ok
pos                         print the position
ports                       list serial ports
connect <port> [baud]       (re)connect
disconnect                  close the port
quit                        leave the console";

/// One parsed console line
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Move {
        delta: Position,
        feedrate: Option<Feedrate>,
    },
    Home {
        feedrate: Option<Feedrate>,
    },
    Raw(String),
    Position,
    Ports,
    Connect {
        port: String,
        baud_rate: Option<u32>,
    },
    Disconnect,
    Help,
    Quit,
}

fn feedrate_arg(arg: Option<&str>) -> Result<Option<Feedrate>> {
    arg.map(|value| -> Result<Feedrate> {
        let value = ensure_positive_float(value, "feedrate")?;
        Ok(Feedrate::new(value)?)
    })
    .transpose()
}

fn usage(text: &str) -> Error {
    Error::other(format!("usage: {}", text))
}

/// Parse one line; blank lines and `#` comments yield `None`
pub fn parse_command(line: &str) -> Result<Option<ConsoleCommand>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = words.collect();

    let command = match verb.to_ascii_lowercase().as_str() {
        "move" | "m" => {
            if !(3..=4).contains(&args.len()) {
                return Err(usage("move <dx> <dy> <dz> [feed]"));
            }
            ConsoleCommand::Move {
                delta: Position::new(
                    parse_float(args[0], "dx", None)?,
                    parse_float(args[1], "dy", None)?,
                    parse_float(args[2], "dz", None)?,
                ),
                feedrate: feedrate_arg(args.get(3).copied())?,
            }
        }
        "home" | "h" => {
            if args.len() > 1 {
                return Err(usage("home [feed]"));
            }
            ConsoleCommand::Home {
                feedrate: feedrate_arg(args.first().copied())?,
            }
        }
        "raw" | "r" => {
            // Keep the device line exactly as typed after the verb
            let gcode = line[verb.len()..].trim();
            if gcode.is_empty() {
                return Err(usage("raw <gcode...>"));
            }
            ConsoleCommand::Raw(gcode.to_string())
        }
        "pos" | "position" => ConsoleCommand::Position,
        "ports" => ConsoleCommand::Ports,
        "connect" => {
            let (Some(port), 1..=2) = (args.first(), args.len()) else {
                return Err(usage("connect <port> [baud]"));
            };
            let baud_rate = args
                .get(1)
                .map(|baud| parse_int(baud, "baud rate", Some(1)))
                .transpose()?
                .map(|baud| u32::try_from(baud).map_err(|_| Error::other("baud rate too large")))
                .transpose()?;
            ConsoleCommand::Connect {
                port: port.to_string(),
                baud_rate,
            }
        }
        "disconnect" => ConsoleCommand::Disconnect,
        "help" | "?" => ConsoleCommand::Help,
        "quit" | "exit" | "q" => ConsoleCommand::Quit,
        other => return Err(Error::other(format!("unknown command '{}'", other))),
    };
    Ok(Some(command))
}

/// Run commands from `input` until `quit` or end of input
///
/// Commands are queued; their results arrive on the session's bus. Parse
/// and queueing errors are printed and do not end the console.
pub fn run<R: BufRead, W: Write>(
    session: &MotionSession,
    input: R,
    mut out: W,
) -> anyhow::Result<()> {
    for line in input.lines() {
        let line = line?;
        let command = match parse_command(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                writeln!(out, "{}", e)?;
                continue;
            }
        };

        let result = match command {
            ConsoleCommand::Move { delta, feedrate } => session.move_by(delta, feedrate),
            ConsoleCommand::Home { feedrate } => session.home(feedrate),
            ConsoleCommand::Raw(gcode) => session.raw(&gcode),
            ConsoleCommand::Position => {
                session.wait_idle(QUEUE_TIMEOUT);
                match session.position() {
                    Some(position) => writeln!(out, "{}", position)?,
                    None => writeln!(out, "not connected")?,
                }
                Ok(())
            }
            ConsoleCommand::Ports => session.list_ports().and_then(|ports| {
                for info in ports {
                    writeln!(out, "{}\t{}\t{}", info.device, info.description, info.hwid)?;
                }
                Ok(())
            }),
            ConsoleCommand::Connect { port, baud_rate } => {
                session.connect(&port, baud_rate).and_then(|port| {
                    writeln!(out, "connected to {}", port)?;
                    Ok(())
                })
            }
            ConsoleCommand::Disconnect => {
                session.disconnect();
                Ok(())
            }
            ConsoleCommand::Help => {
                writeln!(out, "{}", HELP)?;
                Ok(())
            }
            ConsoleCommand::Quit => break,
        };
        if let Err(e) = result {
            tracing::error!("{}", e);
            writeln!(out, "error: {}", e)?;
        }
    }

    if !session.wait_idle(QUEUE_TIMEOUT) {
        tracing::warn!("Leaving the console with commands still queued");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use motionkit_settings::Config;
    use std::io::Cursor;

    #[test]
    fn test_parse_move() {
        assert_eq!(
            parse_command("move 1 -2 0.5").unwrap(),
            Some(ConsoleCommand::Move {
                delta: Position::new(1.0, -2.0, 0.5),
                feedrate: None
            })
        );
        assert_eq!(
            parse_command("  MOVE 1 0 0 150 ").unwrap(),
            Some(ConsoleCommand::Move {
                delta: Position::new(1.0, 0.0, 0.0),
                feedrate: Some(Feedrate::new(150.0).unwrap())
            })
        );
        assert!(parse_command("move 1 2").is_err());
        assert!(parse_command("move a 0 0").is_err());
        assert!(parse_command("move 1 0 0 0").is_err());
        assert!(parse_command("move 1 0 0 -5").is_err());
    }

    #[test]
    fn test_parse_other_commands() {
        assert_eq!(parse_command("").unwrap(), None);
        assert_eq!(parse_command("# comment").unwrap(), None);
        assert_eq!(
            parse_command("home").unwrap(),
            Some(ConsoleCommand::Home { feedrate: None })
        );
        assert_eq!(
            parse_command("raw G0  X1 Y2").unwrap(),
            Some(ConsoleCommand::Raw("G0  X1 Y2".to_string()))
        );
        assert!(parse_command("raw").is_err());
        assert_eq!(parse_command("pos").unwrap(), Some(ConsoleCommand::Position));
        assert_eq!(
            parse_command("connect COM9 9600").unwrap(),
            Some(ConsoleCommand::Connect {
                port: "COM9".to_string(),
                baud_rate: Some(9600)
            })
        );
        assert!(parse_command("connect COM9 0").is_err());
        assert!(parse_command("connect").is_err());
        assert_eq!(parse_command("quit").unwrap(), Some(ConsoleCommand::Quit));
        assert!(parse_command("fly 1 2 3").is_err());
    }

    #[test]
    fn test_run_against_simulator() {
        let mut config = Config::new();
        config.connection.read_timeout_ms = 2;
        let session = MotionSession::simulated(&config).unwrap();
        session.connect("auto", None).unwrap();

        let script = "move 1 2 0\nmove -0.5 0 0\nbogus\npos\nhome\npos\nquit\nmove 1 1 1\n";
        let mut out = Vec::new();
        run(&session, Cursor::new(script), &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text.lines().collect::<Vec<_>>(),
            vec![
                "unknown command 'bogus'",
                "X:0.500 Y:2.000 Z:0.000",
                "X:0.000 Y:0.000 Z:0.000"
            ]
        );
        // Nothing after quit runs
        assert_eq!(session.position(), Some(Position::zero()));
        session.shutdown();
    }
}
