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

    address.rs

    The drive address: the sole identifier threaded through the engine.
    Copied by value wherever a drive needs naming; never an index into a
    Vec that could shift underneath a caller.
*/

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct DriveAddress {
    pub ip: IpAddr,
    pub port: u16,
    pub unit: u8,
}

impl fmt::Display for DriveAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}#{}", self.ip, self.port, self.unit)
    }
}

impl FromStr for DriveAddress {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host_port, unit) = s.split_once('#').ok_or_else(|| format!("missing unit id in {s}"))?;
        let (ip, port) = host_port.rsplit_once(':').ok_or_else(|| format!("missing port in {s}"))?;
        Ok(DriveAddress {
            ip: ip.parse().map_err(|e| format!("bad ip in {s}: {e}"))?,
            port: port.parse().map_err(|e| format!("bad port in {s}: {e}"))?,
            unit: unit.parse().map_err(|e| format!("bad unit in {s}: {e}"))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_parse_roundtrip() {
        let addr = DriveAddress { ip: "10.0.0.5".parse().unwrap(), port: 502, unit: 3 };
        let s = addr.to_string();
        assert_eq!(s.parse::<DriveAddress>().unwrap(), addr);
    }
}
