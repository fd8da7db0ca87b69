use criterion::{criterion_group, criterion_main};


use book::register_benchmarks as register_book_benchmarks;
use record::register_benchmarks as register_record_benchmarks;

criterion_group!(
    benches,
    register_book_benchmarks,
    register_record_benchmarks,
);

criterion_main!(benches);
