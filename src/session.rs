//! Per-connection session state machine.
//!
//! A `Session` owns one client's measurements and classification scores.
//! It turns parsed commands into replies and tells the connection handler
//! whether to keep reading, close, or close and shut the server down.
//! Nothing here touches the network, so every transition is testable
//! without a socket.

use crate::classifier::{Classifier, Species, CLASSES, INPUTS};
use crate::measurement::{Measurement, Variable};
use crate::protocol::{Command, Parser, Response, ReturnOption, SessionError};
use bytes::BytesMut;
use std::fmt;
use tracing::debug;

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Accepted, greeting not yet sent.
    Open,
    /// Greeting sent, processing commands.
    Active,
    /// Terminal; the connection is released.
    Closed,
}

/// What the connection handler does after sending a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Continue,
    Close,
    /// Close this connection and stop the server accepting new ones.
    Shutdown,
}

/// A reply to send and the follow-up action.
#[derive(Debug)]
pub struct Reply {
    pub data: BytesMut,
    pub action: Action,
}

impl Reply {
    fn new(data: impl Into<BytesMut>, action: Action) -> Self {
        Reply {
            data: data.into(),
            action,
        }
    }

    fn send(data: impl Into<BytesMut>) -> Self {
        Self::new(data, Action::Continue)
    }

    fn error(e: impl fmt::Display) -> Self {
        Self::send(Response::error(e))
    }

    /// Nothing to send; the connection is finished.
    fn closed() -> Self {
        Self::new(BytesMut::new(), Action::Close)
    }
}

/// State for one client connection.
pub struct Session {
    state: SessionState,
    inputs: [Option<Measurement>; INPUTS],
    outputs: Option<[f64; CLASSES]>,
    classifier: &'static Classifier,
}

impl Session {
    pub fn new(classifier: &'static Classifier) -> Self {
        Session {
            state: SessionState::Open,
            inputs: [None; INPUTS],
            outputs: None,
            classifier,
        }
    }

    /// Move from `Open` to `Active`, returning the greeting to send.
    pub fn greet(&mut self) -> &'static [u8] {
        debug_assert_eq!(self.state, SessionState::Open);
        self.state = SessionState::Active;
        Response::welcome()
    }

    /// Mark the session closed without a reply (peer went away).
    pub fn close(&mut self) {
        self.state = SessionState::Closed;
    }

    /// Parse and execute one command line.
    ///
    /// A closed session answers nothing and asks for the connection to close.
    pub fn handle_line(&mut self, line: &str) -> Reply {
        if self.state == SessionState::Closed {
            return Reply::closed();
        }

        match Parser::parse(line) {
            Ok(command) => self.handle(command),
            Err(e) => {
                debug!(error = %e, "Rejected command");
                Reply::error(e)
            }
        }
    }

    /// Execute a parsed command.
    pub fn handle(&mut self, command: Command) -> Reply {
        if self.state == SessionState::Closed {
            return Reply::closed();
        }
        debug_assert_eq!(self.state, SessionState::Active);

        match command {
            Command::Input { variable, value } => self.input(variable, value),
            Command::Classify => self.classify(),
            Command::Return(option) => self.report(option),
            Command::Clear => {
                self.reset();
                Reply::send(Response::cleared())
            }
            Command::Close => {
                self.reset();
                self.state = SessionState::Closed;
                Reply::new(Response::closed(), Action::Close)
            }
            Command::Quit => {
                self.state = SessionState::Closed;
                Reply::new(Response::quit(), Action::Close)
            }
            Command::Shutdown => {
                self.state = SessionState::Closed;
                Reply::new(Response::shutting_down(), Action::Shutdown)
            }
        }
    }

    fn input(&mut self, variable: Variable, value: f64) -> Reply {
        match Measurement::new(variable, value) {
            Some(measurement) => {
                debug!(
                    %variable,
                    value,
                    normalized = measurement.normalized,
                    "Stored input"
                );
                self.inputs[variable.index()] = Some(measurement);
                Reply::send(Response::ok())
            }
            None => {
                debug!(%variable, value, "Input out of range");
                Reply::error(SessionError::ValueOutOfRange)
            }
        }
    }

    fn classify(&mut self) -> Reply {
        let Some(vector) = self.input_vector() else {
            return Reply::error(SessionError::InsufficientInputs);
        };

        let scores = self.classifier.classify(&vector);
        debug!(?scores, "Classified");
        self.outputs = Some(scores);
        Reply::send(Response::classified())
    }

    fn report(&self, option: ReturnOption) -> Reply {
        match option {
            ReturnOption::Inputs => {
                let populated: Vec<_> = Variable::ALL
                    .into_iter()
                    .filter_map(|v| self.inputs[v.index()].as_ref().map(|m| (v, m)))
                    .collect();
                if populated.is_empty() {
                    return Reply::error(SessionError::NoInputs);
                }
                Reply::send(Response::inputs(populated))
            }
            ReturnOption::Outputs => match &self.outputs {
                Some(scores) => Reply::send(Response::outputs(scores)),
                None => Reply::error(SessionError::NoOutputs),
            },
            ReturnOption::Class => match &self.outputs {
                Some(scores) => Reply::send(Response::class(Species::best(scores))),
                None => Reply::error(SessionError::NoOutputs),
            },
        }
    }

    /// Normalized inputs in classifier order, if all are present.
    fn input_vector(&self) -> Option<[f64; INPUTS]> {
        let mut vector = [0.0; INPUTS];
        for (slot, input) in vector.iter_mut().zip(&self.inputs) {
            *slot = input.as_ref()?.normalized;
        }
        Some(vector)
    }

    fn reset(&mut self) {
        self.inputs = [None; INPUTS];
        self.outputs = None;
    }
}
