use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

use ls8_vm::{opcode, EmptyDevice, Ls8};

/// Counts R0 down from 200 to zero in a DEC/CMP/JNE loop
#[rustfmt::skip]
const COUNTDOWN: [u8; 17] = [
    opcode::LDI, 0, 200,
    opcode::LDI, 1, 9,   // loop head
    opcode::LDI, 2, 0,
    opcode::DEC, 0,      // at 9
    opcode::CMP, 0, 2,
    opcode::JNE, 1,
    opcode::HLT,
];

pub fn countdown(c: &mut Criterion) {
    c.bench_function("countdown", |b| {
        b.iter(|| {
            let mut vm = Ls8::new(black_box(&COUNTDOWN));
            vm.run(&mut EmptyDevice).unwrap();
            vm.pc()
        })
    });
}

criterion_group!(benches, countdown);
criterion_main!(benches);
