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

    fleet.rs

    The externally-consumable seam: one struct owning every piece of the
    engine, exposing the handful of operations an HTTP adapter (out of
    scope here) would call. Every method is a direct, synchronous Rust
    call -- there is no network framing at this boundary, only the engine
    itself.
*/

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;

use chrono::Utc;

use crate::address::DriveAddress;
use crate::cache::{CachedTelemetry, TelemetryCache};
use crate::config::{DriveRegistry, SiteConfig};
use crate::curtailment::CurtailmentStore;
use crate::disabled::DisabledSet;
use crate::dispatcher::{ControlOutcome, ControlRequest, Dispatcher};
use crate::error::GatewayError;
use crate::journal::{ControlEvent, DriveResult, EventJournal};
use crate::polling;
use crate::profile::ProfileCatalogue;
use crate::session::SessionMap;
use crate::status::{StatusAggregator, StatusReport};
use crate::supervisor;

/// Filenames for the three durable files, relative to the configured base
/// directory. Fixed, not user-configurable: there is exactly one of each
/// per running gateway.
const DISABLED_FILE: &str = "disabled_drives.json";
const JOURNAL_FILE: &str = "control_events.json";
const CURTAILMENT_FILE: &str = "curtailment.json";

/// Which way a connect/disconnect request moves a drive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectAction {
    Connect,
    Disconnect,
    Toggle,
}

/// One row of the devices query: the latest cached telemetry enriched
/// with the drive's family name, since the cache itself only knows
/// addresses.
#[derive(Clone, Debug)]
pub struct DeviceSnapshot {
    pub address: DriveAddress,
    pub family: String,
    pub group: String,
    pub description: String,
    pub telemetry: Option<CachedTelemetry>,
}

pub struct Fleet {
    pub catalogue: Arc<ProfileCatalogue>,
    pub registry: Arc<DriveRegistry>,
    pub sessions: Arc<SessionMap>,
    pub cache: Arc<TelemetryCache>,
    pub disabled: Arc<DisabledSet>,
    pub journal: Arc<EventJournal>,
    pub curtailment: Arc<CurtailmentStore>,
    pub status: Arc<StatusAggregator>,
    spawned: Mutex<HashSet<DriveAddress>>,
}

impl Fleet {
    /// Loads the three durable files from `base_dir` (creating none of
    /// them -- a missing file just means "start empty") and wires
    /// together every engine component. Does not yet start any
    /// Supervisor thread or the polling loop; call `spawn_supervisors`
    /// and drive `run_poll_cycle` yourself (the gateway binary's `main`
    /// does both).
    pub fn new(site: SiteConfig, catalogue: ProfileCatalogue, base_dir: &Path) -> Fleet {
        let registry = DriveRegistry::new(site.drives);
        Fleet {
            catalogue: Arc::new(catalogue),
            registry: Arc::new(registry),
            sessions: Arc::new(SessionMap::new()),
            cache: Arc::new(TelemetryCache::new()),
            disabled: Arc::new(DisabledSet::load(base_dir.join(DISABLED_FILE))),
            journal: Arc::new(EventJournal::load(base_dir.join(JOURNAL_FILE))),
            curtailment: Arc::new(CurtailmentStore::load(base_dir.join(CURTAILMENT_FILE))),
            status: Arc::new(StatusAggregator::new()),
            spawned: Mutex::new(HashSet::new()),
        }
    }

    /// Spawns one Supervisor thread per configured drive. Each thread
    /// starts in whatever state is appropriate for the drive's current
    /// DisabledSet membership -- the state machine itself re-checks that
    /// membership, so a drive disabled at startup just parks there until
    /// enabled.
    pub fn spawn_supervisors(&self) {
        let mut spawned = self.spawned.lock().unwrap();
        for drive in self.registry.all() {
            let address = drive.address();
            if spawned.insert(address) {
                let sessions = Arc::clone(&self.sessions);
                let disabled = Arc::clone(&self.disabled);
                thread::Builder::new()
                    .name(format!("supervisor-{address}"))
                    .spawn(move || supervisor::run(address, sessions, disabled))
                    .expect("failed to spawn supervisor thread");
            }
        }
    }

    /// Ensures exactly one Supervisor thread is running for `address`.
    /// Called by Enable: if startup already spawned one (the normal
    /// case) this is a no-op; it exists so Enable is correct even for a
    /// drive whose original thread somehow isn't tracked.
    fn ensure_supervisor(&self, address: DriveAddress) {
        let mut spawned = self.spawned.lock().unwrap();
        if spawned.insert(address) {
            let sessions = Arc::clone(&self.sessions);
            let disabled = Arc::clone(&self.disabled);
            thread::Builder::new()
                .name(format!("supervisor-{address}"))
                .spawn(move || supervisor::run(address, sessions, disabled))
                .expect("failed to spawn supervisor thread");
        }
    }

    fn dispatcher(&self) -> Dispatcher<'_> {
        Dispatcher {
            registry: &self.registry,
            catalogue: &self.catalogue,
            sessions: &self.sessions,
            cache: &self.cache,
            disabled: &self.disabled,
            journal: &self.journal,
            curtailment: &self.curtailment,
        }
    }

    /// Runs exactly one poll cycle synchronously. The gateway binary
    /// calls this once a second from its main loop; the Dispatcher
    /// methods below also call it once their writes are in, so the
    /// cache reflects a command within the request's tail latency.
    pub fn run_poll_cycle(&self) {
        polling::run_cycle(self.registry.all(), &self.catalogue, &self.sessions, &self.disabled, &self.cache, &self.status);
    }

    pub fn control(&self, request: ControlRequest) -> ControlOutcome {
        let outcome = self.dispatcher().control(request);
        self.run_poll_cycle();
        outcome
    }

    pub fn curtail(&self, groups: Vec<String>) -> Result<ControlOutcome, GatewayError> {
        let outcome = self.dispatcher().curtail(groups)?;
        self.run_poll_cycle();
        Ok(outcome)
    }

    pub fn resume(&self) -> Result<ControlOutcome, GatewayError> {
        let outcome = self.dispatcher().resume()?;
        self.run_poll_cycle();
        Ok(outcome)
    }

    /// Connect/disconnect/toggle against a set of addresses. `Connect`
    /// and `Disconnect` share one direction for the whole request and go
    /// straight through `Dispatcher::set_disabled` (one journal entry).
    /// `Toggle` can send different addresses in different directions, so
    /// it flips each one individually via `flip_disabled` (no journal
    /// side effect there) and journals the aggregate itself exactly
    /// once.
    pub fn connect_drives(&self, addresses: &[DriveAddress], action: ConnectAction) -> ControlOutcome {
        let dispatcher = self.dispatcher();

        let outcome = match action {
            ConnectAction::Connect => dispatcher.set_disabled(addresses, false),
            ConnectAction::Disconnect => dispatcher.set_disabled(addresses, true),
            ConnectAction::Toggle => {
                let results: Vec<DriveResult> =
                    addresses.iter().map(|addr| dispatcher.flip_disabled(*addr, !self.disabled.contains(addr))).collect();
                let event = ControlEvent::new("toggle", None, results);
                self.journal.append(event.clone());
                ControlOutcome { event }
            }
        };

        for addr in addresses {
            if !self.disabled.contains(addr) {
                self.ensure_supervisor(*addr);
            }
        }
        self.run_poll_cycle();
        outcome
    }

    /// The latest cache snapshot, enriched with each drive's family name
    /// and organizational labels, in configured-drive order.
    pub fn devices_snapshot(&self) -> Vec<DeviceSnapshot> {
        let cache = self.cache.snapshot();
        self.registry
            .all()
            .iter()
            .map(|drive| {
                let address = drive.address();
                DeviceSnapshot {
                    address,
                    family: drive.drive_family.clone(),
                    group: drive.group.clone(),
                    description: drive.description.clone(),
                    telemetry: cache.get(&address).cloned(),
                }
            })
            .collect()
    }

    pub fn status(&self) -> StatusReport {
        self.status.report(
            self.registry.all().len(),
            self.sessions.connected_count(),
            self.sessions.healthy_count(),
            !self.cache.is_empty(),
        )
    }

    pub fn events(&self) -> Vec<ControlEvent> {
        self.journal.events()
    }
}

/// Default base directory for the three durable files when the gateway
/// binary isn't given an explicit override.
pub fn default_base_dir() -> PathBuf {
    PathBuf::from(".")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DriveConfig;

    fn tmp_base(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("fleetbus-fleet-test-{tag}-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn site_with_one_drive() -> SiteConfig {
        SiteConfig {
            site_label: "test site".into(),
            bind_address: "0.0.0.0".parse().unwrap(),
            bind_port: 8080,
            no_fanhold: false,
            group_label: "group".into(),
            drives: vec![DriveConfig {
                ip: "127.0.0.1".parse().unwrap(),
                port: 502,
                unit: 1,
                group: "north".into(),
                fan_number: 1,
                description: "fan one".into(),
                rpm_per_hz: 30.0,
                cfm_per_rpm: 10.0,
                drive_family: "acme-1000".into(),
            }],
        }
    }

    #[test]
    fn devices_snapshot_enriches_with_family_even_without_telemetry() {
        let base = tmp_base("devices");
        let fleet = Fleet::new(site_with_one_drive(), ProfileCatalogue::default(), &base);
        let snapshot = fleet.devices_snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].family, "acme-1000");
        assert!(snapshot[0].telemetry.is_none());
        std::fs::remove_dir_all(&base).ok();
    }

    #[test]
    fn status_report_reflects_configured_drive_count() {
        let base = tmp_base("status");
        let fleet = Fleet::new(site_with_one_drive(), ProfileCatalogue::default(), &base);
        let report = fleet.status();
        assert_eq!(report.total_drives, 1);
        assert_eq!(report.connected, 0);
        std::fs::remove_dir_all(&base).ok();
    }

    #[test]
    fn connect_toggle_flips_disabled_membership_per_drive() {
        let base = tmp_base("toggle");
        let fleet = Fleet::new(site_with_one_drive(), ProfileCatalogue::default(), &base);
        let addr = fleet.registry.all()[0].address();
        assert!(!fleet.disabled.contains(&addr));
        fleet.connect_drives(&[addr], ConnectAction::Toggle);
        assert!(fleet.disabled.contains(&addr));
        fleet.connect_drives(&[addr], ConnectAction::Toggle);
        assert!(!fleet.disabled.contains(&addr));
        std::fs::remove_dir_all(&base).ok();
    }

    #[test]
    fn curtail_without_matching_group_does_not_touch_journal() {
        let base = tmp_base("curtail-refuse");
        let fleet = Fleet::new(site_with_one_drive(), ProfileCatalogue::default(), &base);
        let before = fleet.events().len();
        assert!(fleet.curtail(vec!["nonexistent-group".into()]).is_err());
        assert_eq!(fleet.events().len(), before);
        std::fs::remove_dir_all(&base).ok();
    }

    #[test]
    fn resume_without_snapshot_is_a_precondition_error() {
        let base = tmp_base("resume-empty");
        let fleet = Fleet::new(site_with_one_drive(), ProfileCatalogue::default(), &base);
        assert!(matches!(fleet.resume(), Err(GatewayError::Precondition(_))));
        std::fs::remove_dir_all(&base).ok();
    }

    #[test]
    fn timestamp_is_recorded_in_utc_for_every_journaled_connect_event() {
        let base = tmp_base("ts");
        let fleet = Fleet::new(site_with_one_drive(), ProfileCatalogue::default(), &base);
        let addr = fleet.registry.all()[0].address();
        let before = Utc::now();
        let outcome = fleet.connect_drives(&[addr], ConnectAction::Disconnect);
        assert!(outcome.event.timestamp >= before);
        std::fs::remove_dir_all(&base).ok();
    }
}
