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

    polling.rs

    Periodic, bounded-parallel reader: one poll transaction per connected
    drive, fanned out across a worker pool of width 10, joined before the
    cache is replaced as a whole. No partial-record publication -- within
    a cycle all drives' updates become visible together.
*/

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::address::DriveAddress;
use crate::cache::{CachedTelemetry, TelemetryCache};
use crate::config::DriveConfig;
use crate::disabled::DisabledSet;
use crate::error::GatewayError;
use crate::profile::{apply_calc, decode_status, DriveProfile, DriveStatus, ProfileCatalogue};
use crate::session::{Session, SessionMap};
use crate::status::StatusAggregator;
use crate::workers::run_fanout;

pub const CYCLE_INTERVAL: Duration = Duration::from_secs(1);
pub const POOL_WIDTH: usize = 10;
const POLL_DEADLINE: Duration = Duration::from_millis(1500);

/// Issues the status/setpoint/output-frequency/current reads for one
/// drive, in the order spec'd, aborting (and leaving the Session
/// unhealthy) the moment any single read fails or the 1.5 s budget for
/// the whole transaction runs out.
fn poll_transaction(
    session: &Session,
    profile: &DriveProfile,
    rpm_per_hz: f64,
    cfm_per_rpm: f64,
    deadline: Instant,
) -> Result<CachedTelemetry, GatewayError> {
    let remaining = |now: Instant| -> Result<Duration, GatewayError> {
        let left = deadline.saturating_duration_since(now);
        if left.is_zero() {
            Err(GatewayError::Transport("poll transaction deadline exceeded".into()))
        } else {
            Ok(left)
        }
    };

    session.set_io_timeout(remaining(Instant::now())?)?;
    let status_raw = session.read_register(profile.status_register, profile.register_space)?;

    let enabled_status_raw = if profile.enabled_status_register > 0 {
        session.set_io_timeout(remaining(Instant::now())?)?;
        session.read_register(profile.enabled_status_register, profile.register_space)?
    } else {
        0
    };

    let setpoint_register = *profile
        .setpoint_registers
        .first()
        .ok_or_else(|| GatewayError::Transport("profile has no setpoint registers".into()))?;
    session.set_io_timeout(remaining(Instant::now())?)?;
    let setpoint_raw = session.read_register(setpoint_register, profile.register_space)?;

    session.set_io_timeout(remaining(Instant::now())?)?;
    let output_freq_raw: i32 = if profile.signed_output_freq {
        session.read_signed_register(profile.output_frequency_register)? as i32
    } else {
        session.read_register(profile.output_frequency_register, profile.register_space)? as i32
    };

    session.set_io_timeout(remaining(Instant::now())?)?;
    let current_raw = session.read_register(profile.output_current_register, profile.register_space)?;

    // NOTE: the commanded set-speed is decoded with out_freq_calc, not
    // set_freq_calc. Retained intentionally -- see DESIGN.md.
    let set_speed_hz = apply_calc(setpoint_raw as f64, &profile.out_freq_calc);
    let clockwise = output_freq_raw >= 0;
    let magnitude = output_freq_raw.unsigned_abs() as f64;
    let actual_speed_hz = apply_calc(magnitude, &profile.out_freq_calc);
    let rpm = (actual_speed_hz * rpm_per_hz).round();
    let cfm = (rpm * cfm_per_rpm).round();
    let actual_speed_pct = ((actual_speed_hz / 0.6) * 10.0).round() / 10.0;
    let current = apply_calc(current_raw as f64, &profile.out_current_calc);
    let status = decode_status(status_raw, enabled_status_raw, profile);

    Ok(CachedTelemetry {
        set_speed_hz,
        actual_speed_hz,
        actual_speed_pct,
        rpm,
        cfm,
        current,
        clockwise,
        status,
        last_updated: Instant::now(),
    })
}

/// Runs exactly one poll cycle: snapshot, per-drive scheduling, bounded
/// fan-out, atomic cache swap. Called every `CYCLE_INTERVAL` by the
/// gateway's main loop.
pub fn run_cycle(
    drives: &[DriveConfig],
    catalogue: &ProfileCatalogue,
    sessions: &SessionMap,
    disabled: &DisabledSet,
    cache: &TelemetryCache,
    status: &StatusAggregator,
) {
    let cycle_start = Instant::now();
    let mut working = cache.snapshot();

    struct Scheduled<'a> {
        address: DriveAddress,
        drive: &'a DriveConfig,
        session: Arc<Session>,
    }

    let mut scheduled = Vec::new();
    for drive in drives {
        let address = drive.address();
        if disabled.contains(&address) {
            working.insert(address, CachedTelemetry::placeholder(DriveStatus::Disabled));
            continue;
        }
        match sessions.get(&address).filter(|s| s.is_healthy()) {
            Some(session) => scheduled.push(Scheduled { address, drive, session }),
            None => {
                working.insert(address, CachedTelemetry::placeholder(DriveStatus::Unavailable));
            }
        }
    }

    let deadline = cycle_start + POLL_DEADLINE;
    let results = run_fanout(&scheduled, Some(POOL_WIDTH), |item| {
        let profile = catalogue.get(&item.drive.drive_family);
        let outcome = match profile {
            Some(profile) => poll_transaction(&item.session, profile, item.drive.rpm_per_hz, item.drive.cfm_per_rpm, deadline),
            None => Err(GatewayError::UnknownFamily(item.drive.drive_family.clone())),
        };
        (item.address, outcome)
    });

    for (address, outcome) in results {
        match outcome {
            // Successful reads replace the record outright.
            Ok(telemetry) => {
                working.insert(address, telemetry);
            }
            // On failure the previous successful snapshot's numeric
            // fields linger: leave whatever was already in `working`
            // (copied from the prior cache at the top of this cycle).
            Err(_) => {}
        }
    }

    cache.replace(working);
    status.stamp_update();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn profile(signed: bool) -> DriveProfile {
        DriveProfile {
            register_space: crate::profile::RegisterSpace::Holding,
            setpoint_registers: vec![1],
            speed_preset_multiplier: 1.0,
            control_register: 10,
            start_value: 1,
            stop_value: 0,
            untrip_register: None,
            untrip_value: 0,
            output_frequency_register: 20,
            output_current_register: 21,
            signed_output_freq: signed,
            status_register: 30,
            status_bits: HashMap::new(),
            enabled_status_register: 0,
            set_freq_calc: "* 100".into(),
            out_freq_calc: "* 10".into(),
            out_current_calc: String::new(),
        }
    }

    #[test]
    fn signed_min_word_decodes_as_reverse_max_magnitude() {
        // 0x8000 as i16 is -32768; magnitude must not overflow i16::abs().
        let raw: i16 = 0x8000u16 as i16;
        let as_i32 = raw as i32;
        assert_eq!(as_i32.unsigned_abs(), 32768);
        assert!(as_i32 < 0);
    }

    #[test]
    fn profile_without_dual_status_is_unsigned_by_default() {
        assert!(!profile(false).signed_output_freq);
        assert!(profile(true).signed_output_freq);
    }
}
