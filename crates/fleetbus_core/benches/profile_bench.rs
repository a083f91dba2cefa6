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

    benches::profile_bench.rs

    Benchmarks for the two hot pure functions the Polling Engine calls
    once per drive per cycle: the calc DSL and status decoding.
*/

use std::collections::HashMap;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use fleetbus_core::profile::{apply_calc, decode_status, DriveProfile, RegisterSpace, StatusBit};

fn bit_profile() -> DriveProfile {
    let mut status_bits = HashMap::new();
    status_bits.insert(StatusBit::Enabled, 0);
    status_bits.insert(StatusBit::Tripped, 1);
    status_bits.insert(StatusBit::Inhibited, 3);
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
        enabled_status_register: 0,
        set_freq_calc: "* 10".into(),
        out_freq_calc: "/ 60 * 8192".into(),
        out_current_calc: String::new(),
    }
}

fn apply_calc_bench(c: &mut Criterion) {
    c.bench_function("apply_calc_div_mul", |b| {
        b.iter(|| apply_calc(black_box(4500.0), black_box("/ 60 * 8192")));
    });

    c.bench_function("apply_calc_empty_expr", |b| {
        b.iter(|| apply_calc(black_box(450.0), black_box("")));
    });
}

fn decode_status_bench(c: &mut Criterion) {
    let profile = bit_profile();
    c.bench_function("decode_status_bit_based", |b| {
        b.iter(|| decode_status(black_box(0b1010), black_box(0), black_box(&profile)));
    });
}

criterion_group!(benches, apply_calc_bench, decode_status_bench);
criterion_main!(benches);
