use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use num_bigint::BigInt;
use std::hint::black_box;

use whitespace::{
    assembler::{assemble, Program},
    ops::{Instruction, Label, Token},
    vm::VMOptions,
};

fn push(n: i64) -> Token {
    Instruction::Push(BigInt::from(n)).into()
}

/// Prints the numbers from `n` down to 1.
fn countdown(n: i64) -> Program {
    let loop_start = Label::new(" ");
    let done = Label::new("\t");
    assemble(vec![
        push(n),
        Token::Mark(loop_start.clone()),
        Instruction::Duplicate.into(),
        Instruction::JumpIfZero(done.clone()).into(),
        Instruction::Duplicate.into(),
        Instruction::WriteNumber.into(),
        push(10),
        Instruction::WriteChar.into(),
        push(1),
        Instruction::Subtract.into(),
        Instruction::Jump(loop_start).into(),
        Token::Mark(done),
        Instruction::Exit.into(),
    ])
    .unwrap()
}

/// Computes n! with a recursive subroutine.
fn factorial(n: i64) -> Program {
    let fact = Label::new(" ");
    let base = Label::new("\t");
    assemble(vec![
        push(n),
        Instruction::Call(fact.clone()).into(),
        Instruction::WriteNumber.into(),
        Instruction::Exit.into(),
        // [n] -> [n!]
        Token::Mark(fact.clone()),
        Instruction::Duplicate.into(),
        Instruction::JumpIfZero(base.clone()).into(),
        Instruction::Duplicate.into(),
        push(1),
        Instruction::Subtract.into(),
        Instruction::Call(fact).into(),
        Instruction::Multiply.into(),
        Instruction::Return.into(),
        Token::Mark(base),
        Instruction::Discard.into(),
        push(1),
        Instruction::Return.into(),
    ])
    .unwrap()
}

fn run(program: &Program) {
    black_box(whitespace::vm::run(program, VMOptions::default().with_max_op_count(100_000_000)).unwrap());
}

fn criterion_benchmark(c: &mut Criterion) {
    let tests: Vec<(&str, Program)> = vec![
        ("countdown-10k", countdown(10_000)),
        ("factorial-500", factorial(500)),
    ];

    let mut group = c.benchmark_group("full_program");
    for (name, program) in tests.iter() {
        group.bench_function(BenchmarkId::from_parameter(name), |bencher: &mut criterion::Bencher<'_>| {
            bencher.iter(|| run(black_box(program)));
        });
    }
    group.finish();

    let source = countdown(10_000).encode();
    c.bench_function("parse_program", |bencher| {
        bencher.iter(|| black_box(whitespace::parse_program(black_box(&source)).unwrap()));
    });
}

criterion_group!(name = benches; config = Criterion::default(); targets = criterion_benchmark);
criterion_main!(benches);
