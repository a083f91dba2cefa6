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

    journal.rs

    Bounded, append-only log of control events, durably mirrored to disk
    on every append. Retention is a hard 100 entries; trimming happens
    before the write, so the on-disk file never exceeds the limit either.
*/

use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::address::DriveAddress;
use crate::persist::{read_json_or_default, write_json_atomic};

pub const RETENTION: usize = 100;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DriveResult {
    pub address: DriveAddress,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ControlEvent {
    pub timestamp: DateTime<Utc>,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    pub results: Vec<DriveResult>,
}

impl ControlEvent {
    pub fn new(action: &str, speed: Option<f64>, results: Vec<DriveResult>) -> ControlEvent {
        ControlEvent { timestamp: Utc::now(), action: action.to_string(), speed, results }
    }
}

#[derive(Default, Serialize, Deserialize)]
struct JournalFile {
    events: Vec<ControlEvent>,
}

pub struct EventJournal {
    path: PathBuf,
    events: Mutex<Vec<ControlEvent>>,
}

impl EventJournal {
    /// Loads the journal from disk, truncating to the retention limit. A
    /// missing or malformed file is non-fatal: start empty.
    pub fn load(path: PathBuf) -> EventJournal {
        let mut file: JournalFile = read_json_or_default(&path);
        if file.events.len() > RETENTION {
            let excess = file.events.len() - RETENTION;
            file.events.drain(0..excess);
        }
        EventJournal { path, events: Mutex::new(file.events) }
    }

    /// Appends one event, trims to the retention limit, then rewrites the
    /// file in full. A disk failure is logged, not surfaced to the caller
    /// -- the in-memory journal remains authoritative.
    pub fn append(&self, event: ControlEvent) {
        let snapshot = {
            let mut events = self.events.lock().unwrap();
            events.push(event);
            if events.len() > RETENTION {
                let excess = events.len() - RETENTION;
                events.drain(0..excess);
            }
            events.clone()
        };
        if let Err(e) = write_json_atomic(&self.path, &JournalFile { events: snapshot }) {
            log::warn!("failed to flush event journal: {e}");
        }
    }

    pub fn events(&self) -> Vec<ControlEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retention_never_exceeds_limit() {
        let dir = std::env::temp_dir().join(format!("fleetbus-journal-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("events.json");
        let journal = EventJournal::load(path.clone());
        for i in 0..150 {
            journal.append(ControlEvent::new(&format!("event-{i}"), None, vec![]));
        }
        assert_eq!(journal.len(), RETENTION);

        let reloaded = EventJournal::load(path);
        assert_eq!(reloaded.len(), RETENTION);
        std::fs::remove_dir_all(&dir).ok();
    }
}
