//! Benchmarks for frame decoding and bar aggregation

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use dxfeed_streamer::bars::OhlcvBars;
use dxfeed_streamer::events::{EventType, MarketEvent};
use dxfeed_streamer::parser::{decode, parse_data_message};
use serde_json::{json, Value};

fn trade_frame(records: usize) -> Vec<Value> {
    (0..records)
        .flat_map(|i| {
            [
                json!("AAPL"),
                json!(1_700_000_000_000i64 + i as i64),
                json!(1_700_000_000_000i64 + i as i64 * 250),
                json!(0),
                json!(i),
                json!("Q"),
                json!(19700),
                json!("UP"),
                json!(false),
                json!(189.25 + (i % 10) as f64 * 0.01),
                json!("NaN"),
                json!(100),
                json!(52_000_000),
                json!("NaN"),
            ]
        })
        .collect()
}

fn benchmark_decode(c: &mut Criterion) {
    let frame = trade_frame(100);

    c.bench_function("decode_trade_frame_100", |b| {
        b.iter(|| decode(EventType::Trade, black_box(&frame)).unwrap())
    });
}

fn benchmark_parse_message(c: &mut Criterion) {
    let message = json!([["Trade", ["eventSymbol", "eventTime"]], trade_frame(100)]);

    c.bench_function("parse_data_message_100", |b| {
        b.iter(|| parse_data_message(black_box(&message)).unwrap())
    });
}

fn benchmark_aggregate(c: &mut Criterion) {
    let trades: Vec<_> = decode(EventType::Trade, &trade_frame(1_000))
        .unwrap()
        .into_iter()
        .filter_map(|event| match event {
            MarketEvent::Trade(trade) => Some(trade),
            _ => None,
        })
        .collect();

    c.bench_function("aggregate_1000_ticks_1m", |b| {
        b.iter(|| {
            let mut bars = OhlcvBars::new("AAPL", "1m").unwrap();
            for trade in &trades {
                black_box(bars.update(trade).unwrap());
            }
        })
    });

    c.bench_function("aggregate_1000_ticks_50t", |b| {
        b.iter(|| {
            let mut bars = OhlcvBars::new("AAPL", "50t").unwrap();
            for trade in &trades {
                black_box(bars.update(trade).unwrap());
            }
        })
    });
}

criterion_group!(
    benches,
    benchmark_decode,
    benchmark_parse_message,
    benchmark_aggregate
);
criterion_main!(benches);
