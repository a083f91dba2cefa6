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

    cache.rs

    The telemetry cache: one record per drive, replaced atomically as a
    whole vector on each poll cycle. Single writer (the Polling Engine),
    many readers; readers never observe a half-updated map.
*/

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Instant;

use crate::address::DriveAddress;
use crate::profile::DriveStatus;

#[derive(Clone, Debug)]
pub struct CachedTelemetry {
    pub set_speed_hz: f64,
    pub actual_speed_hz: f64,
    pub actual_speed_pct: f64,
    pub rpm: f64,
    pub cfm: f64,
    pub current: f64,
    pub clockwise: bool,
    pub status: DriveStatus,
    pub last_updated: Instant,
}

impl CachedTelemetry {
    /// The record written for a drive this cycle finds unreachable:
    /// numeric fields zeroed, status set to the given placeholder.
    pub fn placeholder(status: DriveStatus) -> CachedTelemetry {
        CachedTelemetry {
            set_speed_hz: 0.0,
            actual_speed_hz: 0.0,
            actual_speed_pct: 0.0,
            rpm: 0.0,
            cfm: 0.0,
            current: 0.0,
            clockwise: true,
            status,
            last_updated: Instant::now(),
        }
    }
}

#[derive(Default)]
pub struct TelemetryCache {
    inner: RwLock<HashMap<DriveAddress, CachedTelemetry>>,
}

impl TelemetryCache {
    pub fn new() -> TelemetryCache {
        TelemetryCache { inner: RwLock::new(HashMap::new()) }
    }

    /// An immutable copy of the current snapshot, for the command
    /// dispatcher, status aggregator, and (eventually) a metrics or
    /// WebSocket adapter.
    pub fn snapshot(&self) -> HashMap<DriveAddress, CachedTelemetry> {
        self.inner.read().unwrap().clone()
    }

    pub fn get(&self, address: &DriveAddress) -> Option<CachedTelemetry> {
        self.inner.read().unwrap().get(address).cloned()
    }

    /// Atomically replaces the whole cache. Only the Polling Engine calls
    /// this.
    pub fn replace(&self, new: HashMap<DriveAddress, CachedTelemetry>) {
        *self.inner.write().unwrap() = new;
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().unwrap().is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap().len()
    }
}
