//! Line commands read from stdin.

use std::fmt;
use touchmesh_sync::input::InputEvent;
use touchmesh_sync::touch::{ContactId, TouchSample};

/// One parsed stdin line.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Input(InputEvent),
    Status,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    UnknownCommand(String),
    MissingArgument(&'static str),
    InvalidNumber(String),
    TrailingInput(String),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownCommand(c) => write!(f, "Unknown command: {c} (try `help`)"),
            Self::MissingArgument(a) => write!(f, "Missing argument: {a}"),
            Self::InvalidNumber(n) => write!(f, "Not a number: {n}"),
            Self::TrailingInput(t) => write!(f, "Unexpected input: {t}"),
        }
    }
}

impl std::error::Error for ParseError {}

pub const HELP: &str = "\
commands:
  down <id> <x> <y>    touch start
  move <id> <x> <y>    touch move
  up <id>              touch end
  cancel <id>          touch cancel
  mdown <x> <y>        mouse button down
  mmove <x> <y>        mouse move (only while down)
  mup                  mouse button up
  mleave               pointer left the canvas
  status               show connection and participant count
  quit                 send a final clear and exit";

/// Parse one line. Blank lines and `#` comments yield `None`.
pub fn parse_line(line: &str) -> Result<Option<Command>, ParseError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let mut args = line.split_whitespace();
    let Some(word) = args.next() else {
        return Ok(None);
    };

    let command = match word {
        "down" => {
            let (id, x, y) = (touch_id(&mut args)?, coord(&mut args, "x")?, coord(&mut args, "y")?);
            Command::Input(InputEvent::TouchStart(vec![TouchSample::new(id, x, y)]))
        }
        "move" => {
            let (id, x, y) = (touch_id(&mut args)?, coord(&mut args, "x")?, coord(&mut args, "y")?);
            Command::Input(InputEvent::TouchMove(vec![TouchSample::new(id, x, y)]))
        }
        "up" => Command::Input(InputEvent::TouchEnd(vec![ContactId::Touch(touch_id(&mut args)?)])),
        "cancel" => Command::Input(InputEvent::TouchCancel(vec![ContactId::Touch(touch_id(&mut args)?)])),
        "mdown" => {
            let (x, y) = (coord(&mut args, "x")?, coord(&mut args, "y")?);
            Command::Input(InputEvent::MouseDown { x, y })
        }
        "mmove" => {
            let (x, y) = (coord(&mut args, "x")?, coord(&mut args, "y")?);
            Command::Input(InputEvent::MouseMove { x, y })
        }
        "mup" => Command::Input(InputEvent::MouseUp),
        "mleave" => Command::Input(InputEvent::MouseLeave),
        "status" => Command::Status,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => return Err(ParseError::UnknownCommand(other.to_string())),
    };

    let rest: Vec<&str> = args.collect();
    if !rest.is_empty() {
        return Err(ParseError::TrailingInput(rest.join(" ")));
    }
    Ok(Some(command))
}

fn touch_id<'a>(args: &mut impl Iterator<Item = &'a str>) -> Result<i64, ParseError> {
    let raw = args.next().ok_or(ParseError::MissingArgument("id"))?;
    raw.parse()
        .map_err(|_| ParseError::InvalidNumber(raw.to_string()))
}

fn coord<'a>(args: &mut impl Iterator<Item = &'a str>, name: &'static str) -> Result<f64, ParseError> {
    let raw = args.next().ok_or(ParseError::MissingArgument(name))?;
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(ParseError::InvalidNumber(raw.to_string())),
    }
}
