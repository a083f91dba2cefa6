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

    lib.rs

    Core drive-fleet engine. Leaves-first: address and error types at the
    bottom, profile evaluation and the Modbus wire encoding above those,
    the Session and its map above that, then the Supervisor, Polling
    Engine, and Command Dispatcher built on top, with the durable side
    files (disabled set, journal, curtailment) and the status aggregator
    alongside. `fleet` assembles all of it behind one facade for an
    embedding binary to drive.
*/

#![forbid(unsafe_code)]

pub mod address;
pub mod cache;
pub mod config;
pub mod curtailment;
pub mod disabled;
pub mod dispatcher;
pub mod error;
pub mod fleet;
pub mod journal;
pub mod modbus;
pub mod persist;
pub mod polling;
pub mod profile;
pub mod session;
pub mod status;
pub mod supervisor;
pub mod workers;

pub use address::DriveAddress;
pub use config::{DriveConfig, DriveRegistry, SiteConfig};
pub use error::GatewayError;
pub use fleet::Fleet;
pub use profile::{DriveProfile, DriveStatus, ProfileCatalogue};
