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

    dispatcher.rs

    The command dispatcher: resolves a control action against a set of
    drive addresses, issues the minimum write sequence for each one on its
    own worker, and aggregates every per-drive outcome into a single
    ControlEvent. Writes contend on the exact same Session mutex the
    Polling Engine reads through, which is what makes "SetSpeed followed
    by a poll never sees a torn interleaving" true without any dispatcher-
    side locking of its own.
*/

use crate::address::DriveAddress;
use crate::cache::TelemetryCache;
use crate::config::DriveRegistry;
use crate::curtailment::{CurtailedDrive, CurtailmentSnapshot, CurtailmentStore};
use crate::disabled::DisabledSet;
use crate::error::GatewayError;
use crate::journal::{ControlEvent, DriveResult, EventJournal};
use crate::profile::{apply_calc, DriveStatus, ProfileCatalogue};
use crate::session::{Session, SessionMap};
use crate::workers::run_fanout;

/// A control action a caller can request against one or more drives.
/// `Freespin` is a pure alias of `Stop` (same register write sequence);
/// it survives in the action name only for callers that speak the
/// original vocabulary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Start,
    Stop,
    Freespin,
    SetSpeed,
    Fanhold,
}

impl Action {
    pub fn parse(name: &str) -> Result<Action, GatewayError> {
        match name.to_ascii_lowercase().as_str() {
            "start" => Ok(Action::Start),
            "stop" => Ok(Action::Stop),
            "freespin" => Ok(Action::Freespin),
            "setspeed" | "set_speed" | "set-speed" => Ok(Action::SetSpeed),
            "fanhold" => Ok(Action::Fanhold),
            other => Err(GatewayError::UnknownAction(other.to_string())),
        }
    }

    fn journal_name(self) -> &'static str {
        match self {
            Action::Start => "start",
            Action::Stop => "stop",
            Action::Freespin => "freespin",
            Action::SetSpeed => "setSpeed",
            Action::Fanhold => "fanhold",
        }
    }
}

pub struct ControlRequest {
    pub drives: Vec<DriveAddress>,
    pub action: Action,
    pub speed: Option<f64>,
}

pub struct ControlOutcome {
    pub event: ControlEvent,
}

impl ControlOutcome {
    pub fn all_succeeded(&self) -> bool {
        self.event.results.iter().all(|r| r.success)
    }
}

/// Resolved per-drive context: the session and profile a write sequence
/// needs. Resolving this up front means a missing session or unknown
/// family becomes a normal per-drive failure, not a panic deep inside the
/// write sequence.
struct ResolvedDrive<'a> {
    address: DriveAddress,
    session: std::sync::Arc<Session>,
    profile: &'a crate::profile::DriveProfile,
}

enum Resolution<'a> {
    Ready(ResolvedDrive<'a>),
    Failed(GatewayError),
}

fn resolve<'a>(
    address: DriveAddress,
    registry: &DriveRegistry,
    catalogue: &'a ProfileCatalogue,
    sessions: &SessionMap,
    cache: &TelemetryCache,
) -> Resolution<'a> {
    if let Some(telemetry) = cache.get(&address) {
        if telemetry.status.is_precondition_failure() {
            return Resolution::Failed(GatewayError::Precondition(telemetry.status.to_string()));
        }
    }
    let drive = match registry.by_address(&address) {
        Some(d) => d,
        None => return Resolution::Failed(GatewayError::Precondition("unconfigured drive".into())),
    };
    let profile = match catalogue.get(&drive.drive_family) {
        Some(p) => p,
        None => return Resolution::Failed(GatewayError::UnknownFamily(drive.drive_family.clone())),
    };
    match sessions.get(&address).filter(|s| s.is_healthy()) {
        Some(session) => Resolution::Ready(ResolvedDrive { address, session, profile }),
        None => Resolution::Failed(GatewayError::Precondition(DriveStatus::Unavailable.to_string())),
    }
}

/// Issues the write sequence for one action against one already-resolved
/// drive. Any write failure short-circuits the remaining writes in the
/// sequence; the first error is the one recorded.
fn execute_sequence(resolved: &ResolvedDrive, action: Action, speed: Option<f64>, cached_status: Option<DriveStatus>) -> Result<(), GatewayError> {
    let profile = resolved.profile;
    let session = &resolved.session;

    let untrip_if_needed = |status: Option<DriveStatus>| -> Result<(), GatewayError> {
        if status == Some(DriveStatus::Tripped) {
            if let Some(untrip_reg) = profile.untrip_register {
                session.write_register(untrip_reg, profile.untrip_value)?;
            }
        }
        Ok(())
    };

    match action {
        Action::Start => {
            untrip_if_needed(cached_status)?;
            session.write_register(profile.control_register, profile.start_value)
        }
        Action::Stop | Action::Freespin => session.write_register(profile.control_register, profile.stop_value),
        Action::Fanhold => {
            session.write_register(profile.control_register, profile.start_value)?;
            // Literal zero, not a set_freq_calc-scaled zero: correct only
            // because zero is a fixed point of every calc form the DSL
            // supports. Retained intentionally -- see DESIGN.md.
            for reg in &profile.setpoint_registers {
                session.write_register(*reg, 0)?;
            }
            Ok(())
        }
        Action::SetSpeed => {
            let hz = speed.ok_or_else(|| GatewayError::Precondition("setSpeed requires a speed".into()))?;
            untrip_if_needed(cached_status)?;
            session.write_register(profile.control_register, profile.start_value)?;
            let scaled = apply_calc(hz, &profile.set_freq_calc).round() as i64;
            let primary = profile
                .setpoint_registers
                .first()
                .ok_or_else(|| GatewayError::Precondition("profile has no setpoint registers".into()))?;
            session.write_register(*primary, scaled as u16)?;
            if let Some(secondary) = profile.setpoint_registers.get(1) {
                let preset = apply_calc(hz, &profile.set_freq_calc) * profile.speed_preset_multiplier;
                session.write_register(*secondary, preset.round() as i64 as u16)?;
            }
            Ok(())
        }
    }
}

/// The command dispatcher. Holds shared references to everything a
/// request needs to resolve and execute; owns no per-request state of its
/// own.
pub struct Dispatcher<'a> {
    pub registry: &'a DriveRegistry,
    pub catalogue: &'a ProfileCatalogue,
    pub sessions: &'a SessionMap,
    pub cache: &'a TelemetryCache,
    pub disabled: &'a DisabledSet,
    pub journal: &'a EventJournal,
    pub curtailment: &'a CurtailmentStore,
}

impl<'a> Dispatcher<'a> {
    /// Fans out one action to a set of drives and returns their raw
    /// per-drive outcomes, without touching the journal. The shared
    /// building block `control`, `curtail`, and `resume` each wrap with
    /// their own journaled action name -- the write sequence for "stop
    /// every drive in a group" is identical whether it's called directly
    /// (`Stop`) or as a step of `Curtail`, but the two must be journaled
    /// under different names.
    fn execute_many(&self, addresses: &[DriveAddress], action: Action, speed: Option<f64>) -> Vec<DriveResult> {
        run_fanout(addresses, None, |address| {
            let cached_status = self.cache.get(address).map(|t| t.status);
            match resolve(*address, self.registry, self.catalogue, self.sessions, self.cache) {
                Resolution::Failed(err) => DriveResult { address: *address, success: false, error: Some(err.to_string()) },
                Resolution::Ready(resolved) => match execute_sequence(&resolved, action, speed, cached_status) {
                    Ok(()) => DriveResult { address: *address, success: true, error: None },
                    Err(e) => DriveResult { address: *address, success: false, error: Some(e.to_string()) },
                },
            }
        })
    }

    /// Fans out `request` to its target drives, aggregates every outcome
    /// into one ControlEvent, appends and flushes the journal, then
    /// returns the outcome to the caller. Rejecting an unknown action
    /// happens before any drive is touched.
    pub fn control(&self, request: ControlRequest) -> ControlOutcome {
        let results = self.execute_many(&request.drives, request.action, request.speed);
        let event = ControlEvent::new(request.action.journal_name(), request.speed, results);
        self.journal.append(event.clone());
        ControlOutcome { event }
    }

    /// Selects every configured drive whose group matches one of
    /// `groups` (empty = every drive), captures each one's current
    /// set-speed and status into a single snapshot, writes it to disk,
    /// then issues Stop to each selected drive concurrently. Refuses if
    /// no drive matches.
    pub fn curtail(&self, groups: Vec<String>) -> Result<ControlOutcome, GatewayError> {
        let selected = self.registry.by_groups(&groups);
        if selected.is_empty() {
            return Err(GatewayError::Precondition("no drive matches the requested groups".into()));
        }

        let captured: Vec<CurtailedDrive> = selected
            .iter()
            .map(|drive| {
                let address = drive.address();
                let telemetry = self.cache.get(&address);
                CurtailedDrive {
                    address,
                    group: drive.group.clone(),
                    set_speed_hz: telemetry.as_ref().map(|t| t.set_speed_hz).unwrap_or(0.0),
                    status: telemetry.map(|t| t.status.to_string()).unwrap_or_else(|| DriveStatus::Unavailable.to_string()),
                }
            })
            .collect();

        let snapshot = CurtailmentSnapshot { timestamp: chrono::Utc::now(), groups, drives: captured };
        self.curtailment.save(snapshot)?;

        let addresses: Vec<DriveAddress> = selected.iter().map(|d| d.address()).collect();
        let results = self.execute_many(&addresses, Action::Stop, None);
        let event = ControlEvent::new("curtail", None, results);
        self.journal.append(event.clone());
        Ok(ControlOutcome { event })
    }

    /// Reads back the curtailment snapshot; every drive captured as
    /// `Running` gets its pre-curtailment set-speed restored via
    /// SetSpeed, every other captured drive is left stopped. Deletes the
    /// snapshot only once the restore request has been issued.
    pub fn resume(&self) -> Result<ControlOutcome, GatewayError> {
        let snapshot = self
            .curtailment
            .current()
            .ok_or_else(|| GatewayError::Precondition("no curtailment snapshot on disk".into()))?;

        // Each restarted drive gets its own captured set-speed back, so
        // this fans out directly rather than through `execute_many`
        // (which assumes one shared speed for the whole batch).
        let to_restart: Vec<&CurtailedDrive> = snapshot.drives.iter().filter(|d| d.was_running()).collect();
        let results = run_fanout(&to_restart, None, |drive| {
            let cached_status = self.cache.get(&drive.address).map(|t| t.status);
            match resolve(drive.address, self.registry, self.catalogue, self.sessions, self.cache) {
                Resolution::Failed(err) => DriveResult { address: drive.address, success: false, error: Some(err.to_string()) },
                Resolution::Ready(resolved) => {
                    match execute_sequence(&resolved, Action::SetSpeed, Some(drive.set_speed_hz), cached_status) {
                        Ok(()) => DriveResult { address: drive.address, success: true, error: None },
                        Err(e) => DriveResult { address: drive.address, success: false, error: Some(e.to_string()) },
                    }
                }
            }
        });

        let event = ControlEvent::new("resume", None, results);
        self.journal.append(event.clone());
        self.curtailment.clear();
        Ok(ControlOutcome { event })
    }

    /// Flips DisabledSet membership for one address, without touching
    /// the journal. The building block both `set_disabled` (uniform
    /// direction, one journal entry) and the Fleet facade's per-address
    /// Toggle handling (mixed direction, still one journal entry) are
    /// built from.
    pub fn flip_disabled(&self, address: DriveAddress, disable: bool) -> DriveResult {
        if disable {
            self.disabled.insert(address);
        } else {
            self.disabled.remove(&address);
        }
        DriveResult { address, success: true, error: None }
    }

    /// Same direction for every address in one call; journals a single
    /// aggregated event. Disable simply inserts (the Supervisor tears
    /// down any open transport on its own once it observes the
    /// membership change). Enable just removes the membership here --
    /// re-opening the connection is the Fleet facade's job, since only
    /// it tracks which Supervisor threads are running.
    pub fn set_disabled(&self, addresses: &[DriveAddress], disable: bool) -> ControlOutcome {
        let results: Vec<DriveResult> = addresses.iter().map(|addr| self.flip_disabled(*addr, disable)).collect();
        let action = if disable { "disable" } else { "enable" };
        let event = ControlEvent::new(action, None, results);
        self.journal.append(event.clone());
        ControlOutcome { event }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DriveConfig, DriveRegistry, SiteConfig};
    use crate::profile::{DriveProfile, ProfileCatalogue, RegisterSpace};
    use std::collections::HashMap;

    fn profile_with_two_setpoints() -> DriveProfile {
        DriveProfile {
            register_space: RegisterSpace::Holding,
            setpoint_registers: vec![1, 207],
            speed_preset_multiplier: 6.0,
            control_register: 10,
            start_value: 1,
            stop_value: 0,
            untrip_register: Some(50),
            untrip_value: 1,
            output_frequency_register: 20,
            output_current_register: 21,
            signed_output_freq: false,
            status_register: 30,
            status_bits: HashMap::new(),
            enabled_status_register: 0,
            set_freq_calc: "* 10".into(),
            out_freq_calc: "* 10".into(),
            out_current_calc: String::new(),
        }
    }

    #[test]
    fn action_parse_rejects_unknown() {
        assert!(Action::parse("dance").is_err());
        assert_eq!(Action::parse("Start").unwrap(), Action::Start);
        assert_eq!(Action::parse("set-speed").unwrap(), Action::SetSpeed);
    }

    #[test]
    fn two_setpoint_scaling_applies_the_preset_multiplier_to_the_secondary_register() {
        let profile = profile_with_two_setpoints();
        let hz = 40.0;
        let primary = apply_calc(hz, &profile.set_freq_calc).round() as i64;
        assert_eq!(primary, 400);
        let secondary = (apply_calc(hz, &profile.set_freq_calc) * profile.speed_preset_multiplier).round() as i64;
        assert_eq!(secondary, 2400);
    }

    fn registry_with_one(family: &str) -> DriveRegistry {
        DriveRegistry::new(vec![DriveConfig {
            ip: "127.0.0.1".parse().unwrap(),
            port: 502,
            unit: 1,
            group: "north".into(),
            fan_number: 1,
            description: String::new(),
            rpm_per_hz: 1.0,
            cfm_per_rpm: 1.0,
            drive_family: family.to_string(),
        }])
    }

    #[test]
    fn unconfigured_drive_is_a_precondition_failure_not_a_panic() {
        let registry = DriveRegistry::new(vec![]);
        let catalogue = ProfileCatalogue::default();
        let sessions = SessionMap::new();
        let cache = TelemetryCache::new();
        let addr = DriveAddress { ip: "10.0.0.1".parse().unwrap(), port: 502, unit: 1 };
        match resolve(addr, &registry, &catalogue, &sessions, &cache) {
            Resolution::Failed(GatewayError::Precondition(_)) => {}
            _ => panic!("expected a precondition failure for an unconfigured drive"),
        }
    }

    #[test]
    fn unknown_family_is_a_configuration_failure() {
        let registry = registry_with_one("ghost-family");
        let catalogue = ProfileCatalogue::default();
        let sessions = SessionMap::new();
        let cache = TelemetryCache::new();
        let addr = DriveAddress { ip: "127.0.0.1".parse().unwrap(), port: 502, unit: 1 };
        match resolve(addr, &registry, &catalogue, &sessions, &cache) {
            Resolution::Failed(GatewayError::UnknownFamily(name)) => assert_eq!(name, "ghost-family"),
            _ => panic!("expected an unknown-family failure"),
        }
    }

    #[test]
    fn no_matching_group_refuses_curtail() {
        let _ = SiteConfig { site_label: String::new(), bind_address: "0.0.0.0".parse().unwrap(), bind_port: 0, no_fanhold: false, group_label: String::new(), drives: vec![] };
        let registry = DriveRegistry::new(vec![]);
        let catalogue = ProfileCatalogue::default();
        let sessions = SessionMap::new();
        let cache = TelemetryCache::new();
        let disabled = DisabledSet::load(std::env::temp_dir().join(format!("fleetbus-disp-test-disabled-{}.json", std::process::id())));
        let journal = EventJournal::load(std::env::temp_dir().join(format!("fleetbus-disp-test-journal-{}.json", std::process::id())));
        let curtailment = CurtailmentStore::load(std::env::temp_dir().join(format!("fleetbus-disp-test-curtail-{}.json", std::process::id())));
        let dispatcher = Dispatcher { registry: &registry, catalogue: &catalogue, sessions: &sessions, cache: &cache, disabled: &disabled, journal: &journal, curtailment: &curtailment };
        assert!(dispatcher.curtail(vec!["nonexistent".into()]).is_err());
    }
}
