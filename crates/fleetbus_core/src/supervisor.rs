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

    supervisor.rs

    One long-running thread per configured drive, owning that drive's
    Session lifecycle: connect, probe, health-check, backoff, reconnect.
    Backoff sleeps are non-cancellable short of process exit, matching the
    source -- there is nothing to cancel them with, by design.
*/

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::address::DriveAddress;
use crate::disabled::DisabledSet;
use crate::session::{Session, SessionMap};

const DISABLED_RECHECK: Duration = Duration::from_secs(10);
const CONNECT_RETRY_DELAY: Duration = Duration::from_secs(5);
const CONNECT_ATTEMPTS: u32 = 3;
const CONNECT_BACKOFF: Duration = Duration::from_secs(5 * 60);
const HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(5);

/// Attempts to connect up to `attempts` times, sleeping `between` after
/// every failed attempt except the last. Factored out of the thread loop
/// so the retry/backoff policy is testable without a real socket.
pub fn connect_with_retries<T, F>(mut connect: F, attempts: u32, between: Duration) -> Option<T>
where
    F: FnMut() -> Result<T, crate::error::GatewayError>,
{
    for attempt in 0..attempts {
        match connect() {
            Ok(session) => return Some(session),
            Err(e) => {
                log::debug!("connect attempt {} failed: {e}", attempt + 1);
                if attempt + 1 < attempts {
                    thread::sleep(between);
                }
            }
        }
    }
    None
}

/// Runs the per-drive state machine forever. Intended to be spawned on its
/// own `std::thread`; never returns.
pub fn run(address: DriveAddress, sessions: Arc<SessionMap>, disabled: Arc<DisabledSet>) {
    loop {
        // disabled state: block, re-check membership.
        while disabled.contains(&address) {
            sessions.remove(&address);
            thread::sleep(DISABLED_RECHECK);
        }

        // connecting state.
        let session = connect_with_retries(
            || Session::connect(address.ip, address.port, address.unit),
            CONNECT_ATTEMPTS,
            CONNECT_RETRY_DELAY,
        );
        let session = match session {
            Some(s) => s,
            None => {
                log::warn!("drive {address} failed to connect after {CONNECT_ATTEMPTS} attempts, backing off");
                thread::sleep(CONNECT_BACKOFF);
                continue;
            }
        };
        sessions.insert(address, Arc::new(session));
        log::info!("drive {address} connected");

        // healthy state.
        loop {
            if disabled.contains(&address) {
                sessions.remove(&address);
                break;
            }
            thread::sleep(HEALTH_CHECK_INTERVAL);
            let probe_ok = sessions.get(&address).map(|s| s.probe().is_ok()).unwrap_or(false);
            if !probe_ok {
                log::info!("drive {address} disconnected");
                sessions.remove(&address);
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GatewayError;

    #[test]
    fn gives_up_after_configured_attempts() {
        let mut calls = 0;
        let result = connect_with_retries(
            || {
                calls += 1;
                Err::<(), _>(GatewayError::Transport("refused".into()))
            },
            3,
            Duration::from_millis(0),
        );
        assert!(result.is_none());
        assert_eq!(calls, 3);
    }

    #[test]
    fn stops_retrying_once_connected() {
        let mut calls = 0;
        let result = connect_with_retries(
            || {
                calls += 1;
                if calls == 2 {
                    Ok(42)
                } else {
                    Err(GatewayError::Transport("refused".into()))
                }
            },
            3,
            Duration::from_millis(0),
        );
        assert_eq!(calls, 2);
        assert_eq!(result, Some(42));
    }
}
