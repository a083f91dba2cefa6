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

    main.rs

    Gateway process entry point: parse the CLI, load the two
    configuration documents, build the Fleet, spawn a Supervisor per
    configured drive, then drive the 1 s polling loop forever. Startup
    failure to load either document is the only fatal exit; every
    runtime failure afterward is recoverable and handled inside the
    engine.
*/

#![forbid(unsafe_code)]

mod cli;

use std::thread;
use std::time::Instant;

use log::info;

use fleetbus_core::config::SiteConfig;
use fleetbus_core::fleet::Fleet;
use fleetbus_core::polling::CYCLE_INTERVAL;
use fleetbus_core::profile::ProfileCatalogue;

fn main() -> anyhow::Result<()> {
    let args = cli::cmd_line_args().run();

    env_logger::Builder::new().filter_level(args.log_level.parse().unwrap_or(log::LevelFilter::Info)).init();

    let site = SiteConfig::load(&args.config)?;
    let catalogue = ProfileCatalogue::load(&args.profiles)?;

    info!(
        "loaded site '{}' with {} configured drive(s)",
        site.site_label,
        site.drives.len()
    );

    let fleet = Fleet::new(site, catalogue, &args.base_dir);

    if args.dry_run {
        info!("dry-run: configuration loaded successfully, not starting supervisors");
        return Ok(());
    }

    fleet.spawn_supervisors();
    info!("supervisors started, entering polling loop (cycle = {:?})", CYCLE_INTERVAL);

    loop {
        let cycle_start = Instant::now();
        fleet.run_poll_cycle();
        let elapsed = cycle_start.elapsed();
        if let Some(remaining) = CYCLE_INTERVAL.checked_sub(elapsed) {
            thread::sleep(remaining);
        }
    }
}
