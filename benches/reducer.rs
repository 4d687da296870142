//! Benchmarks for the position reducer

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use trade_monitor::feed::{decode, PriceTick};
use trade_monitor::monitor::PositionBook;
use trade_monitor::risk::{initialize, on_tick, PositionConfig};

fn benchmark_on_tick(c: &mut Criterion) {
    let state = initialize(
        PositionConfig::long("BTCUSDT", 100.0, 10.0)
            .stop_loss(95.0)
            .take_profit(110.0)
            .rr_trigger(1.5),
    )
    .unwrap();

    c.bench_function("on_tick", |b| b.iter(|| on_tick(black_box(&state), black_box(104.25))));
}

fn benchmark_book_fan_out(c: &mut Criterion) {
    let mut book = PositionBook::new();
    for i in 0..50 {
        let entry = 100.0 + i as f64;
        book.open(
            PositionConfig::long("BTCUSDT", entry, 1.0)
                .stop_loss(entry - 5.0)
                .rr_trigger(1.5),
        )
        .unwrap();
    }
    let tick = PriceTick::new("BTCUSDT", 120.0);

    c.bench_function("book_apply_tick_50", |b| {
        b.iter(|| book.apply_tick(black_box(&tick)))
    });
}

fn benchmark_decode(c: &mut Criterion) {
    let frame = r#"{"type":"price_update","data":{"symbol":"BTCUSDT","price":"104.25","size":0.5,"timestamp":1700000000000}}"#;

    c.bench_function("decode_price_update", |b| b.iter(|| decode(black_box(frame))));
}

criterion_group!(
    benches,
    benchmark_on_tick,
    benchmark_book_fan_out,
    benchmark_decode
);
criterion_main!(benches);
