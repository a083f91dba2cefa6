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

    profile.rs

    Drive profiles are pure data: a register map plus a handful of scalar
    calculation expressions and status-decoding rules. There is no
    behavioral subclassing here on purpose -- the few variant behaviors
    (signed output frequency, dual status register, empty status-bits map)
    are selected by predicates over these fields, not by polymorphism.
*/

use std::collections::HashMap;

use regex::Regex;
use serde::Deserialize;

/// Which Modbus read function applies to read-only telemetry registers.
/// Writes always target the single-register write function regardless of
/// this setting.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegisterSpace {
    Holding,
    Input,
}

/// Abstract status bit names. Any subset of these may be present in a
/// profile's `status_bits` map.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusBit {
    Enabled,
    Tripped,
    Inhibited,
}

/// Decoded abstract drive state. `Unavailable` and `Disabled` never come
/// out of `decode_status`; they're cache-only states stamped by the
/// Polling Engine on failure or administrative disablement.
#[derive(Copy, Clone, Debug, PartialEq, Eq, strum_macros::Display)]
pub enum DriveStatus {
    Running,
    Stopped,
    Tripped,
    NotReady,
    Inhibited,
    Unknown,
    Unavailable,
    Disabled,
}

impl DriveStatus {
    /// Commands short-circuit before any I/O when the cache already shows
    /// one of these.
    pub fn is_precondition_failure(self) -> bool {
        matches!(self, DriveStatus::Unavailable | DriveStatus::NotReady)
    }
}

fn default_speed_preset_multiplier() -> f64 {
    1.0
}

#[derive(Clone, Debug, Deserialize)]
pub struct DriveProfile {
    pub register_space: RegisterSpace,

    pub setpoint_registers: Vec<u16>,
    #[serde(default = "default_speed_preset_multiplier")]
    pub speed_preset_multiplier: f64,

    pub control_register: u16,
    pub start_value: u16,
    pub stop_value: u16,

    #[serde(default)]
    pub untrip_register: Option<u16>,
    #[serde(default)]
    pub untrip_value: u16,

    pub output_frequency_register: u16,
    pub output_current_register: u16,

    #[serde(default)]
    pub signed_output_freq: bool,

    pub status_register: u16,
    #[serde(default)]
    pub status_bits: HashMap<StatusBit, u8>,

    #[serde(default)]
    pub enabled_status_register: u16,

    #[serde(default)]
    pub set_freq_calc: String,
    #[serde(default)]
    pub out_freq_calc: String,
    #[serde(default)]
    pub out_current_calc: String,
}

/// Read-only mapping from drive-family name to its profile. Built once at
/// startup from the parsed catalogue document; never mutated afterward.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ProfileCatalogue(pub HashMap<String, DriveProfile>);

impl ProfileCatalogue {
    pub fn get(&self, family: &str) -> Option<&DriveProfile> {
        self.0.get(family)
    }
}

/// Interprets the tiny arithmetic DSL applied to a raw register word.
///
/// `""` -> raw / 10, `"* A"`, `"/ A"`, `"* A / B"`, `"/ A * B"`; anything
/// else that doesn't parse as one of those forms returns `raw` unchanged.
/// Drive families encode Hz either as integer multiples (x10, x100) or as
/// fractions of a scaling constant (e.g. `/ 60 * 8192`); this DSL covers
/// every observed case without a general expression evaluator.
pub fn apply_calc(raw: f64, expr: &str) -> f64 {
    let trimmed = expr.trim();
    if trimmed.is_empty() {
        return raw / 10.0;
    }

    let num = r"[0-9]+(?:\.[0-9]+)?";
    let mul = Regex::new(&format!(r"^\*\s*({num})$")).unwrap();
    let div = Regex::new(&format!(r"^/\s*({num})$")).unwrap();
    let mul_div = Regex::new(&format!(r"^\*\s*({num})\s*/\s*({num})$")).unwrap();
    let div_mul = Regex::new(&format!(r"^/\s*({num})\s*\*\s*({num})$")).unwrap();

    if let Some(c) = mul_div.captures(trimmed) {
        let a: f64 = c[1].parse().unwrap();
        let b: f64 = c[2].parse().unwrap();
        return raw * a / b;
    }
    if let Some(c) = div_mul.captures(trimmed) {
        let a: f64 = c[1].parse().unwrap();
        let b: f64 = c[2].parse().unwrap();
        return raw / a * b;
    }
    if let Some(c) = mul.captures(trimmed) {
        let a: f64 = c[1].parse().unwrap();
        return raw * a;
    }
    if let Some(c) = div.captures(trimmed) {
        let a: f64 = c[1].parse().unwrap();
        return raw / a;
    }

    raw
}

/// Derives the abstract drive state from the raw status word(s) and a
/// profile's decoding rules. See spec §4.1 for the three decoding
/// strategies this selects between.
pub fn decode_status(status: u16, enabled_status: u16, profile: &DriveProfile) -> DriveStatus {
    if profile.status_bits.is_empty() {
        return if status == 0 {
            DriveStatus::Running
        } else {
            DriveStatus::Inhibited
        };
    }

    if profile.enabled_status_register > 0 {
        let inhibited = (status >> 3) & 1 != 0;
        if inhibited {
            return DriveStatus::NotReady;
        }
        return if enabled_status & 1 != 0 {
            DriveStatus::Running
        } else {
            DriveStatus::Stopped
        };
    }

    if let Some(&bit) = profile.status_bits.get(&StatusBit::Tripped) {
        if (status >> bit) & 1 != 0 {
            return DriveStatus::Tripped;
        }
    }
    if let Some(&bit) = profile.status_bits.get(&StatusBit::Inhibited) {
        if (status >> bit) & 1 != 0 {
            return DriveStatus::NotReady;
        }
    }
    if let Some(&bit) = profile.status_bits.get(&StatusBit::Enabled) {
        if (status >> bit) & 1 != 0 {
            return DriveStatus::Running;
        }
    }
    DriveStatus::Stopped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_expr_divides_by_ten() {
        assert_eq!(apply_calc(450.0, ""), 45.0);
    }

    #[test]
    fn mul_form() {
        assert_eq!(apply_calc(450.0, "* 10"), 4500.0);
    }

    #[test]
    fn div_mul_form() {
        let got = apply_calc(4500.0, "/ 60 * 8192");
        assert!((got - 614400.0).abs() < 1e-6);
    }

    #[test]
    fn whitespace_tolerant() {
        assert_eq!(apply_calc(40.0, "*10"), 400.0);
        assert_eq!(apply_calc(40.0, "  *   10  "), 400.0);
    }

    #[test]
    fn unparseable_expr_passes_through() {
        assert_eq!(apply_calc(42.0, "huh?"), 42.0);
    }

    #[test]
    fn calc_roundtrip_law() {
        let x = 300.0_f64;
        let scaled = apply_calc(x, "* 7");
        let back = apply_calc(scaled, "/ 7");
        assert!((back - x).abs() < 1e-9);
    }

    fn profile_with(status_bits: HashMap<StatusBit, u8>, enabled_status_register: u16) -> DriveProfile {
        DriveProfile {
            register_space: RegisterSpace::Holding,
            setpoint_registers: vec![1],
            speed_preset_multiplier: 1.0,
            control_register: 10,
            start_value: 1,
            stop_value: 0,
            untrip_register: None,
            untrip_value: 0,
            output_frequency_register: 20,
            output_current_register: 21,
            signed_output_freq: false,
            status_register: 30,
            status_bits,
            enabled_status_register,
            set_freq_calc: "* 10".into(),
            out_freq_calc: "* 10".into(),
            out_current_calc: String::new(),
        }
    }

    #[test]
    fn empty_bits_law() {
        let profile = profile_with(HashMap::new(), 0);
        assert_eq!(decode_status(0, 0, &profile), DriveStatus::Running);
        for k in 1..5u16 {
            assert_eq!(decode_status(k, 0, &profile), DriveStatus::Inhibited);
        }
    }

    #[test]
    fn bit_based_status_checks_tripped_before_inhibited() {
        let mut bits = HashMap::new();
        bits.insert(StatusBit::Enabled, 0);
        bits.insert(StatusBit::Tripped, 1);
        bits.insert(StatusBit::Inhibited, 3);
        let profile = profile_with(bits, 0);
        assert_eq!(decode_status(0b1010, 0, &profile), DriveStatus::Tripped);
    }

    #[test]
    fn two_register_status_gs_style() {
        let mut bits = HashMap::new();
        bits.insert(StatusBit::Enabled, 0);
        let profile = profile_with(bits, 1);
        assert_eq!(decode_status(0, 1, &profile), DriveStatus::Running);
        assert_eq!(decode_status(8, 1, &profile), DriveStatus::NotReady);
        assert_eq!(decode_status(0, 0, &profile), DriveStatus::Stopped);
    }
}
