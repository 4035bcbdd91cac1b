//! Benchmark for the response strategy selector

use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use wayfarer::agents::classifier::{SafetyReason, TravelType, Verdict};
use wayfarer::router::{RouteMode, select_response};

fn verdict(is_valid: bool, travel_type: TravelType) -> Verdict {
    Verdict {
        is_valid,
        reason: SafetyReason::Clean,
        solution: String::new(),
        is_travel_related: true,
        is_plan_related: false,
        travel_type,
    }
}

fn bench_selector(c: &mut Criterion) {
    let clean = verdict(true, TravelType::SpecificSearchQuery);
    let rejected = verdict(false, TravelType::None);

    c.bench_function("select_response_explore", |b| {
        b.iter(|| select_response(black_box(&clean), RouteMode::Explore))
    });

    c.bench_function("select_response_default", |b| {
        b.iter(|| select_response(black_box(&clean), RouteMode::Default))
    });

    c.bench_function("select_response_reject", |b| {
        b.iter(|| select_response(black_box(&rejected), RouteMode::Explore))
    });
}

criterion_group!(benches, bench_selector);
criterion_main!(benches);
