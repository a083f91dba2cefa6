/*
    fleetbus
    A control and telemetry gateway for Modbus/TCP VFD fleets.

    Copyright (c) 2026 fleetbus contributors

    Permission is hereby granted, free of charge, to any person obtaining a
    copy of this software and associated documentation files (the “Software”),
    to deal in the Software without restriction, including without limitation
    the rights to use, copy, modify, merge, publish, distribute, sublicense,
    and/or sell copies of the Software, and to permit persons to whom the
    Software is furnished to do so, subject to the following conditions:

    The above copyright notice and this permission notice shall be included in
    all copies or substantial portions of the Software.

    THE SOFTWARE IS PROVIDED “AS IS”, WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
    IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
    FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
    AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
    LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
    FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
    DEALINGS IN THE SOFTWARE.

    --------------------------------------------------------------------------

    error.rs

    Error kinds shared across the engine. Grouped by cause, matching the
    five error classes the gateway distinguishes: transport, protocol,
    configuration, precondition and persistence failures.
*/

use std::fmt;

/// A single per-drive failure reason. Cheap to clone; these end up in
/// `ControlEvent` records and cache status strings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GatewayError {
    /// TCP connect/read/write/deadline failure, or a malformed Modbus
    /// response. The Supervisor owns recovery; callers only see the
    /// message.
    Transport(String),
    /// Drive family name not present in the profile catalogue.
    UnknownFamily(String),
    /// Control action name not recognized by the dispatcher.
    UnknownAction(String),
    /// Drive was cached as `Unavailable` or `NotReady`; command
    /// short-circuited before any I/O.
    Precondition(String),
    /// Disk write for the journal, disabled-set, or curtailment file
    /// failed. Logged, never surfaced as a command failure.
    Persistence(String),
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayError::Transport(msg) => write!(f, "transport error: {msg}"),
            GatewayError::UnknownFamily(name) => write!(f, "unknown drive family: {name}"),
            GatewayError::UnknownAction(name) => write!(f, "unknown action: {name}"),
            GatewayError::Precondition(status) => write!(f, "drive not ready: {status}"),
            GatewayError::Persistence(msg) => write!(f, "persistence error: {msg}"),
        }
    }
}

impl std::error::Error for GatewayError {}

impl From<std::io::Error> for GatewayError {
    fn from(e: std::io::Error) -> Self {
        GatewayError::Transport(e.to_string())
    }
}
