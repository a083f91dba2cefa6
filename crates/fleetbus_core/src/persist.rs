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

    persist.rs

    Shared write-temp-then-rename helper for the three durable files
    (event journal, disabled set, curtailment snapshot). The source
    truncates and writes in place; a rename is atomic on the same
    filesystem and is a correctness improvement, not a behavior change.
*/

use std::path::Path;

use crate::error::GatewayError;

pub fn write_json_atomic<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), GatewayError> {
    let bytes = serde_json::to_vec_pretty(value)
        .map_err(|e| GatewayError::Persistence(format!("serializing {}: {e}", path.display())))?;
    let tmp_path = path.with_extension("tmp");
    std::fs::write(&tmp_path, &bytes)
        .map_err(|e| GatewayError::Persistence(format!("writing {}: {e}", tmp_path.display())))?;
    std::fs::rename(&tmp_path, path)
        .map_err(|e| GatewayError::Persistence(format!("renaming {} -> {}: {e}", tmp_path.display(), path.display())))?;
    Ok(())
}

/// Loads a JSON file, returning `default` (non-fatal) if it's missing or
/// malformed.
pub fn read_json_or_default<T: serde::de::DeserializeOwned + Default>(path: &Path) -> T {
    match std::fs::read_to_string(path) {
        Ok(text) => serde_json::from_str(&text).unwrap_or_else(|e| {
            log::warn!("{} is malformed, starting fresh: {e}", path.display());
            T::default()
        }),
        Err(_) => T::default(),
    }
}
