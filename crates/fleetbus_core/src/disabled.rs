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

    disabled.rs

    The durable set of drive addresses the Supervisor must not connect to.
    A coarse mutex, no Session lock ever held while this one is; every
    mutation is followed by a full rewrite of the on-disk file before the
    call returns, so on-disk membership always matches memory.
*/

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Mutex;

use crate::address::DriveAddress;
use crate::persist::{read_json_or_default, write_json_atomic};

pub struct DisabledSet {
    path: PathBuf,
    members: Mutex<HashSet<DriveAddress>>,
}

impl DisabledSet {
    pub fn load(path: PathBuf) -> DisabledSet {
        let raw: HashMap<String, bool> = read_json_or_default(&path);
        let members = raw
            .into_iter()
            .filter(|(_, enabled)| *enabled)
            .filter_map(|(key, _)| key.parse::<DriveAddress>().ok())
            .collect();
        DisabledSet { path, members: Mutex::new(members) }
    }

    pub fn contains(&self, address: &DriveAddress) -> bool {
        self.members.lock().unwrap().contains(address)
    }

    pub fn insert(&self, address: DriveAddress) {
        let mut members = self.members.lock().unwrap();
        members.insert(address);
        self.persist(&members);
    }

    pub fn remove(&self, address: &DriveAddress) {
        let mut members = self.members.lock().unwrap();
        members.remove(address);
        self.persist(&members);
    }

    pub fn snapshot(&self) -> HashSet<DriveAddress> {
        self.members.lock().unwrap().clone()
    }

    fn persist(&self, members: &HashSet<DriveAddress>) {
        let as_map: HashMap<String, bool> = members.iter().map(|a| (a.to_string(), true)).collect();
        if let Err(e) = write_json_atomic(&self.path, &as_map) {
            log::warn!("failed to persist disabled-drive set: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(unit: u8) -> DriveAddress {
        DriveAddress { ip: "127.0.0.1".parse().unwrap(), port: 502, unit }
    }

    #[test]
    fn disk_matches_memory_after_every_mutation() {
        let dir = std::env::temp_dir().join(format!("fleetbus-disabled-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("disabled.json");

        let set = DisabledSet::load(path.clone());
        set.insert(addr(1));
        set.insert(addr(2));
        set.remove(&addr(1));

        let reloaded = DisabledSet::load(path);
        assert_eq!(reloaded.snapshot(), set.snapshot());
        assert!(reloaded.contains(&addr(2)));
        assert!(!reloaded.contains(&addr(1)));
        std::fs::remove_dir_all(&dir).ok();
    }
}
