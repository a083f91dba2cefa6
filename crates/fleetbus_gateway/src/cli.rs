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

    cli.rs

    Command-line surface for the gateway binary: where the two
    configuration documents live, where the durable files go, and how
    loud to log.
*/

use std::path::PathBuf;

use bpaf::Bpaf;

#[derive(Debug, Clone, Bpaf)]
#[bpaf(options, version)]
pub struct CmdLineArgs {
    /// Path to the site configuration TOML document.
    #[bpaf(long("config"), argument("PATH"), fallback(PathBuf::from("site.toml")))]
    pub config: PathBuf,

    /// Path to the drive-profile catalogue TOML document.
    #[bpaf(long("profiles"), argument("PATH"), fallback(PathBuf::from("profiles.toml")))]
    pub profiles: PathBuf,

    /// Directory holding the three durable files (disabled set, event
    /// journal, curtailment snapshot).
    #[bpaf(long("base-dir"), argument("PATH"), fallback(PathBuf::from(".")))]
    pub base_dir: PathBuf,

    /// Log level passed through to `env_logger` (error, warn, info,
    /// debug, trace).
    #[bpaf(long("log-level"), argument("LEVEL"), fallback(String::from("info")))]
    pub log_level: String,

    /// Load configuration and report what would be started, without
    /// connecting to any drive or spawning a Supervisor.
    #[bpaf(long("dry-run"), switch)]
    pub dry_run: bool,
}
