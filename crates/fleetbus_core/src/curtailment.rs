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

    curtailment.rs

    A single durable record capturing the last pre-curtailment set-speeds,
    used by Resume. At most one snapshot exists on disk at any time: it is
    created by Curtail and removed on a successful Resume.
*/

use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::address::DriveAddress;
use crate::persist::write_json_atomic;
use crate::profile::DriveStatus;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CurtailedDrive {
    pub address: DriveAddress,
    pub group: String,
    pub set_speed_hz: f64,
    pub status: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CurtailmentSnapshot {
    pub timestamp: DateTime<Utc>,
    pub groups: Vec<String>,
    pub drives: Vec<CurtailedDrive>,
}

impl CurtailedDrive {
    pub fn was_running(&self) -> bool {
        self.status == DriveStatus::Running.to_string()
    }
}

pub struct CurtailmentStore {
    path: PathBuf,
    current: Mutex<Option<CurtailmentSnapshot>>,
}

impl CurtailmentStore {
    pub fn load(path: PathBuf) -> CurtailmentStore {
        let current = std::fs::read_to_string(&path)
            .ok()
            .and_then(|text| serde_json::from_str(&text).ok());
        CurtailmentStore { path, current: Mutex::new(current) }
    }

    pub fn current(&self) -> Option<CurtailmentSnapshot> {
        self.current.lock().unwrap().clone()
    }

    pub fn save(&self, snapshot: CurtailmentSnapshot) -> Result<(), crate::error::GatewayError> {
        write_json_atomic(&self.path, &snapshot)?;
        *self.current.lock().unwrap() = Some(snapshot);
        Ok(())
    }

    /// Removed on a successful Resume.
    pub fn clear(&self) {
        std::fs::remove_file(&self.path).ok();
        *self.current.lock().unwrap() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn running_status_detected_by_string_match() {
        let d = CurtailedDrive {
            address: DriveAddress { ip: "127.0.0.1".parse().unwrap(), port: 502, unit: 1 },
            group: "north".into(),
            set_speed_hz: 45.0,
            status: DriveStatus::Running.to_string(),
        };
        assert!(d.was_running());

        let stopped = CurtailedDrive { status: DriveStatus::Stopped.to_string(), ..d };
        assert!(!stopped.was_running());
    }
}
