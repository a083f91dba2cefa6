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

    session.rs

    One Session per drive: a transport, a mutex serializing every exchange
    against it, and a health flag. Poll transactions and command writes
    both contend on the same mutex -- that's the ordering guarantee callers
    rely on: a SetSpeed followed by a poll sees either the old or new
    state, never a torn interleaving. Once a Session goes unhealthy it is
    never reused; the Supervisor discards it and reconnects from scratch.
*/

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use crate::address::DriveAddress;
use crate::error::GatewayError;
use crate::modbus::ModbusTransport;
use crate::profile::RegisterSpace;

pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
const PROBE_REGISTER: u16 = 0;

pub struct Session {
    transport: Mutex<ModbusTransport>,
    healthy: AtomicBool,
    error_count: AtomicU32,
    last_failure: Mutex<Option<Instant>>,
}

impl Session {
    /// Opens a TCP connection with a 2 s timeout, sets the unit id, then
    /// performs a probe read of register 0 (1 word, holding). Any failure
    /// closes the transport and returns an error.
    pub fn connect(ip: IpAddr, port: u16, unit: u8) -> Result<Session, GatewayError> {
        let mut transport = ModbusTransport::connect(ip, port, unit, CONNECT_TIMEOUT)?;
        if let Err(e) = transport.read_holding_registers(PROBE_REGISTER, 1) {
            return Err(e);
        }
        Ok(Session {
            transport: Mutex::new(transport),
            healthy: AtomicBool::new(true),
            error_count: AtomicU32::new(0),
            last_failure: Mutex::new(None),
        })
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Acquire)
    }

    pub fn error_count(&self) -> u32 {
        self.error_count.load(Ordering::Acquire)
    }

    pub fn last_failure(&self) -> Option<Instant> {
        *self.last_failure.lock().unwrap()
    }

    fn record_failure(&self) {
        self.healthy.store(false, Ordering::Release);
        self.error_count.fetch_add(1, Ordering::AcqRel);
        *self.last_failure.lock().unwrap() = Some(Instant::now());
    }

    /// Re-runs the probe read used at connect time. Doubles as a keepalive
    /// for the Supervisor's 5 s health-check loop.
    pub fn probe(&self) -> Result<(), GatewayError> {
        self.read_register(PROBE_REGISTER, RegisterSpace::Holding).map(|_| ())
    }

    pub fn read_register(&self, address: u16, space: RegisterSpace) -> Result<u16, GatewayError> {
        let mut transport = self.transport.lock().unwrap();
        let result = match space {
            RegisterSpace::Holding => transport.read_holding_registers(address, 1),
            RegisterSpace::Input => transport.read_input_registers(address, 1),
        };
        match result {
            Ok(words) => Ok(words[0]),
            Err(e) => {
                drop(transport);
                self.record_failure();
                Err(e)
            }
        }
    }

    /// Signed reads always use holding registers regardless of the
    /// profile's declared register space.
    pub fn read_signed_register(&self, address: u16) -> Result<i16, GatewayError> {
        let mut transport = self.transport.lock().unwrap();
        match transport.read_holding_registers(address, 1) {
            Ok(words) => Ok(words[0] as i16),
            Err(e) => {
                drop(transport);
                self.record_failure();
                Err(e)
            }
        }
    }

    pub fn write_register(&self, address: u16, value: u16) -> Result<(), GatewayError> {
        let mut transport = self.transport.lock().unwrap();
        match transport.write_single_register(address, value) {
            Ok(()) => Ok(()),
            Err(e) => {
                drop(transport);
                self.record_failure();
                Err(e)
            }
        }
    }

    pub fn set_io_timeout(&self, timeout: Duration) -> Result<(), GatewayError> {
        self.transport.lock().unwrap().set_timeout(timeout)
    }
}

/// Published Sessions, one per connected drive. Populated by Supervisors
/// on successful connect, removed on disconnect or administrative
/// disable. Distinct Sessions are fully independent of one another.
#[derive(Default)]
pub struct SessionMap {
    inner: RwLock<HashMap<DriveAddress, Arc<Session>>>,
}

impl SessionMap {
    pub fn new() -> SessionMap {
        SessionMap { inner: RwLock::new(HashMap::new()) }
    }

    pub fn insert(&self, address: DriveAddress, session: Arc<Session>) {
        self.inner.write().unwrap().insert(address, session);
    }

    pub fn remove(&self, address: &DriveAddress) {
        self.inner.write().unwrap().remove(address);
    }

    pub fn get(&self, address: &DriveAddress) -> Option<Arc<Session>> {
        self.inner.read().unwrap().get(address).cloned()
    }

    pub fn connected_count(&self) -> usize {
        self.inner.read().unwrap().len()
    }

    pub fn healthy_count(&self) -> usize {
        self.inner.read().unwrap().values().filter(|s| s.is_healthy()).count()
    }
}
