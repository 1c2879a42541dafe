//! Iris protocol parser and response generator.
//!
//! Implements parsing for the classification commands:
//! - Data: input, clear
//! - Model: classify, return
//! - Connection: close, quit, shutdown

use crate::classifier::{Species, CLASSES};
use crate::measurement::{format_value, Measurement, Variable};
use bytes::BytesMut;
use std::fmt;

/// What `return` should report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnOption {
    Inputs,
    Outputs,
    Class,
}

/// Parsed iris protocol command
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Store a measurement (value not yet range checked)
    Input { variable: Variable, value: f64 },

    /// Run the classifier over the stored inputs
    Classify,

    /// Report inputs, raw scores, or the winning class
    Return(ReturnOption),

    /// Reset inputs and outputs
    Clear,

    /// Reset inputs and outputs, then close the connection
    Close,

    /// Close the connection
    Quit,

    /// Stop the server accepting connections, then close
    Shutdown,
}

/// Protocol parsing errors
///
/// `Display` renders the text sent after the `400 ` status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Unknown command, wrong arguments, or blank line
    InvalidCommand,
    /// `input` without exactly a variable and a value
    InvalidInputFormat,
    /// `input` naming an unknown variable
    InvalidVariable,
    /// `input` value that is not a number
    InvalidValue,
    /// `return` without an option
    InvalidReturnFormat,
    /// `return` with an unknown option
    InvalidReturnOption,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::InvalidCommand => write!(f, "Command not valid."),
            ParseError::InvalidInputFormat => write!(f, "Error: Invalid input format."),
            ParseError::InvalidVariable => write!(f, "Error: Invalid variable name."),
            ParseError::InvalidValue => write!(f, "Error: Invalid value format."),
            ParseError::InvalidReturnFormat => write!(f, "Error: Invalid return command format."),
            ParseError::InvalidReturnOption => write!(f, "Error: Invalid return option."),
        }
    }
}

impl std::error::Error for ParseError {}

/// Command that parsed but cannot be carried out in the current session.
///
/// `Display` renders the text sent after the `400 ` status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    /// `input` value outside its variable's range
    ValueOutOfRange,
    /// `classify` before all four inputs are set
    InsufficientInputs,
    /// `return inputs` with every slot empty
    NoInputs,
    /// `return outputs` or `return class` before `classify`
    NoOutputs,
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::ValueOutOfRange => write!(f, "Error: Value out of range."),
            SessionError::InsufficientInputs => {
                write!(f, "Error: Insufficient input values for classification.")
            }
            SessionError::NoInputs => write!(f, "Error: No input values set."),
            SessionError::NoOutputs => write!(f, "Error: No output values set."),
        }
    }
}

impl std::error::Error for SessionError {}

/// Parser for the iris text protocol
pub struct Parser;

impl Parser {
    /// Parse one command line (without its line terminator)
    pub fn parse(line: &str) -> Result<Command, ParseError> {
        let line = line.trim().to_lowercase();
        let parts: Vec<&str> = line.split_whitespace().collect();

        let Some(&name) = parts.first() else {
            return Err(ParseError::InvalidCommand);
        };

        match name {
            "input" => Self::parse_input(&parts),
            "return" => Self::parse_return(&parts),
            "classify" => Self::parse_bare(&parts, Command::Classify),
            "clear" => Self::parse_bare(&parts, Command::Clear),
            "close" => Self::parse_bare(&parts, Command::Close),
            "quit" => Self::parse_bare(&parts, Command::Quit),
            "shutdown" => Self::parse_bare(&parts, Command::Shutdown),
            _ => Err(ParseError::InvalidCommand),
        }
    }

    /// Commands that take no arguments
    fn parse_bare(parts: &[&str], command: Command) -> Result<Command, ParseError> {
        if parts.len() != 1 {
            return Err(ParseError::InvalidCommand);
        }
        Ok(command)
    }

    /// Parse input command
    fn parse_input(parts: &[&str]) -> Result<Command, ParseError> {
        // Format: input <variable> <value>
        let [_, name, value] = parts else {
            return Err(ParseError::InvalidInputFormat);
        };

        let variable = Variable::from_name(name).ok_or(ParseError::InvalidVariable)?;
        let value = value
            .parse::<f64>()
            .map_err(|_| ParseError::InvalidValue)?;

        Ok(Command::Input { variable, value })
    }

    /// Parse return command
    fn parse_return(parts: &[&str]) -> Result<Command, ParseError> {
        // Format: return inputs|outputs|class
        match parts {
            [_] => Err(ParseError::InvalidReturnFormat),
            [_, "inputs"] => Ok(Command::Return(ReturnOption::Inputs)),
            [_, "outputs"] => Ok(Command::Return(ReturnOption::Outputs)),
            [_, "class"] => Ok(Command::Return(ReturnOption::Class)),
            _ => Err(ParseError::InvalidReturnOption),
        }
    }
}

/// Line terminator for every reply line
const CRLF: &[u8] = b"\r\n";

/// Response generator for the iris protocol
pub struct Response;

impl Response {
    /// Generate the greeting sent on connect
    pub fn welcome() -> &'static [u8] {
        b"Server is ready...\r\nWelcome to the Iris Server\r\n"
    }

    /// Generate OK response (input stored)
    pub fn ok() -> &'static [u8] {
        b"OK\r\n"
    }

    /// Generate classify acknowledgement
    pub fn classified() -> &'static [u8] {
        b"Classification complete\r\n"
    }

    /// Generate clear acknowledgement
    pub fn cleared() -> &'static [u8] {
        b"All input and output values have been cleared.\r\n"
    }

    /// Generate close acknowledgement
    pub fn closed() -> &'static [u8] {
        b"200 OK\r\n"
    }

    /// Generate quit acknowledgement
    pub fn quit() -> &'static [u8] {
        b"200 OK\r\nConnection closed.\r\n"
    }

    /// Generate shutdown acknowledgement
    pub fn shutting_down() -> &'static [u8] {
        b"200 OK\r\nServer is shutting down...\r\n"
    }

    /// Generate a 400 error response
    pub fn error(msg: impl fmt::Display) -> BytesMut {
        let mut response = BytesMut::new();
        response.extend_from_slice(format!("400 {}\r\n", msg).as_bytes());
        response
    }

    /// Generate the `return inputs` listing for populated slots
    pub fn inputs<'a, I>(inputs: I) -> BytesMut
    where
        I: IntoIterator<Item = (Variable, &'a Measurement)>,
    {
        let line = inputs
            .into_iter()
            .map(|(variable, m)| format!("{} {}", variable, format_value(m.original)))
            .collect::<Vec<_>>()
            .join(" ");
        Self::line(&line)
    }

    /// Generate the `return outputs` score listing
    pub fn outputs(scores: &[f64; CLASSES]) -> BytesMut {
        let line = Species::ALL
            .iter()
            .zip(scores)
            .map(|(species, score)| format!("{} {:.5}", species.label(), score))
            .collect::<Vec<_>>()
            .join(" ");
        Self::line(&line)
    }

    /// Generate the `return class` response
    pub fn class(species: Species) -> BytesMut {
        Self::line(&format!("Classification: {}", species))
    }

    fn line(text: &str) -> BytesMut {
        let mut response = BytesMut::with_capacity(text.len() + CRLF.len());
        response.extend_from_slice(text.as_bytes());
        response.extend_from_slice(CRLF);
        response
    }
}

/// Find the end of the first line in `buffer`.
///
/// Returns the length of the line content (excluding `\n` and an optional
/// preceding `\r`) and the number of bytes to consume.
pub fn find_line(buffer: &[u8]) -> Option<(usize, usize)> {
    let newline = buffer.iter().position(|&b| b == b'\n')?;
    let consumed = newline + 1;

    if newline > 0 && buffer[newline - 1] == b'\r' {
        Some((newline - 1, consumed))
    } else {
        Some((newline, consumed))
    }
}
