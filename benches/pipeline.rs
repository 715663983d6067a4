//! Benchmarks for the removal pipeline.
//!
//! Every benchmark runs over a synthesized archive of 200 classes:
//! - every fourth class is marked for removal and has a surviving subclass
//! - every class has a marked field assigned in its constructor
//! - every class carries a kept marked method

extern crate coderemover;

use criterion::{criterion_group, criterion_main, Criterion};
use coderemover::{
    archive,
    classfile::{builder::ClassBuilder, reader::parse_class},
    pipeline::{
        config::{RemovalMode, RemoverConfig},
        CodeRemover,
    },
    registry::{LoadOptions, Registry, DEFAULT_MARKER},
};
use std::hint::black_box;

const CLASSES: usize = 200;

fn class(index: usize) -> ClassBuilder {
    let name = format!("bench/C{index}");
    let super_name = if index % 4 == 1 {
        format!("bench/C{}", index - 1)
    } else {
        "java/lang/Object".to_string()
    };

    ClassBuilder::new(name.as_str())
        .super_name(super_name.as_str())
        .marked(index % 4 == 0)
        .field("trace", "Z")
        .marked(true)
        .done()
        .field("count", "J")
        .done()
        .method("<init>", "()V")
        .aload(0)
        .invoke_special(&super_name, "<init>", "()V")
        .aload(0)
        .iconst(1)
        .put_field(&name, "trace", "Z")
        .aload(0)
        .lconst(0)
        .put_field(&name, "count", "J")
        .vreturn()
        .done()
        .method("debug", "()V")
        .marked(false)
        .vreturn()
        .done()
}

fn entries() -> Vec<(String, Vec<u8>)> {
    (0..CLASSES)
        .map(|index| {
            let bytes = class(index).build(DEFAULT_MARKER).unwrap();
            (format!("bench/C{index}.class"), bytes)
        })
        .collect()
}

fn jar() -> Vec<u8> {
    let registry = Registry::build(entries(), &LoadOptions::default()).unwrap();
    archive::store_to_mem(&registry).unwrap()
}

/// Benchmark parsing a single class with a constructor body.
fn bench_parse_class(c: &mut Criterion) {
    let bytes = class(1).build(DEFAULT_MARKER).unwrap();

    c.bench_function("parse_class", |b| {
        b.iter(|| {
            let class = parse_class(black_box(&bytes), DEFAULT_MARKER).unwrap();
            black_box(class)
        });
    });
}

/// Benchmark the full pipeline on an already loaded registry.
fn bench_process_full(c: &mut Criterion) {
    let entries = entries();
    let remover = CodeRemover::default();

    c.bench_function("process_full", |b| {
        b.iter_batched(
            || Registry::build(entries.clone(), &LoadOptions::default()).unwrap(),
            |mut registry| black_box(remover.process(&mut registry).unwrap()),
            criterion::BatchSize::SmallInput,
        );
    });
}

/// Benchmark the remove-only pipeline on an already loaded registry.
fn bench_process_remove_only(c: &mut Criterion) {
    let entries = entries();
    let remover = CodeRemover::new(RemoverConfig::default().with_mode(RemovalMode::RemoveOnly));

    c.bench_function("process_remove_only", |b| {
        b.iter_batched(
            || Registry::build(entries.clone(), &LoadOptions::default()).unwrap(),
            |mut registry| black_box(remover.process(&mut registry).unwrap()),
            criterion::BatchSize::SmallInput,
        );
    });
}

/// Benchmark a whole archive: unzip, parse, process, write and zip.
fn bench_process_archive(c: &mut Criterion) {
    let jar = jar();
    let remover = CodeRemover::default();

    c.bench_function("process_archive", |b| {
        b.iter(|| {
            let (output, result) = remover.process_bytes(black_box(&jar)).unwrap();
            black_box((output, result))
        });
    });
}

criterion_group!(
    benches,
    bench_parse_class,
    bench_process_full,
    bench_process_remove_only,
    bench_process_archive
);
criterion_main!(benches);
