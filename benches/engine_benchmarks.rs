use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use orderbook_sim_engine::orderbook::ladder::Ladder;
use orderbook_sim_engine::prelude::*;

const SYMBOL: &str = "ESZ4";
const EXCHANGE: &str = "CME";

fn seeded_engine(depth: usize) -> Level2ExecutionEngine {
    let config = EngineConfig {
        name: EXCHANGE.to_string(),
        book_depth: depth,
        ..EngineConfig::default()
    };
    let mut engine = match Level2ExecutionEngine::new(config) {
        Ok(engine) => engine,
        Err(e) => panic!("bench config rejected: {}", e),
    };
    engine.add_order_status_listener(|_: &OrderStatusEvent| {});
    if let Err(e) = engine.subscribe(SYMBOL) {
        panic!("subscribe failed: {}", e);
    }

    let mut packet = Level2Packet::new(SYMBOL, EXCHANGE, Timestamp::default());
    for i in 0..depth as Price {
        packet
            .push(UpdateAction::New, EntryType::Bid, 1_000 - i, 100, 5)
            .push(UpdateAction::New, EntryType::Ask, 1_001 + i, 100, 5);
    }
    if let Err(e) = engine.on_book_update(&packet) {
        panic!("seed packet rejected: {}", e);
    }
    engine
}

fn bench_ladder_apply(c: &mut Criterion) {
    let mut group = c.benchmark_group("ladder_apply");
    group.throughput(Throughput::Elements(1));

    for depth in [5usize, 10, 50] {
        group.bench_with_input(BenchmarkId::new("change", depth), &depth, |b, &depth| {
            let mut ladder = Ladder::new(Side::Buy, depth);
            for i in 0..depth as Price {
                ladder.apply(UpdateAction::New, 1_000 - i, 100, 1);
            }

            let mut counter = 0u64;
            b.iter(|| {
                let price = 1_000 - counter % depth as u64;
                let quantity = 50 + (counter % 100) as Quantity;
                black_box(ladder.apply(
                    black_box(UpdateAction::Change),
                    black_box(price),
                    black_box(quantity),
                    1,
                ));
                counter += 1;
            });
        });
    }

    group.bench_function("insert_evict", |b| {
        let mut ladder = Ladder::new(Side::Sell, 10);
        let mut counter = 0u64;
        b.iter(|| {
            let price = 2_000 - (counter % 1_000);
            black_box(ladder.apply(UpdateAction::New, black_box(price), 10, 1));
            counter += 1;
        });
    });

    group.finish();
}

fn bench_packet_processing(c: &mut Criterion) {
    let mut group = c.benchmark_group("packet_processing");
    group.throughput(Throughput::Elements(2));

    group.bench_function("trade_and_refill", |b| {
        let mut engine = seeded_engine(10);
        let mut trade = Level2Packet::new(SYMBOL, EXCHANGE, Timestamp::default());
        trade
            .push_trade(1_001, 30)
            .push(UpdateAction::Change, EntryType::Ask, 1_001, 70, 4);
        let mut refill = Level2Packet::new(SYMBOL, EXCHANGE, Timestamp::default());
        refill.push(UpdateAction::Change, EntryType::Ask, 1_001, 100, 5);

        b.iter(|| {
            black_box(engine.on_book_update(black_box(&trade))).ok();
            black_box(engine.on_book_update(black_box(&refill))).ok();
        });
    });

    group.bench_function("with_resting_orders", |b| {
        let mut engine = seeded_engine(10);
        for i in 0..10 {
            let order = Order::new_limit(SYMBOL, Side::Buy, 1_000 - i, 5);
            if let Err(e) = engine.send_order(order) {
                panic!("seed order rejected: {}", e);
            }
        }
        let mut grow = Level2Packet::new(SYMBOL, EXCHANGE, Timestamp::default());
        grow.push(UpdateAction::Change, EntryType::Bid, 995, 120, 6);
        let mut shrink = Level2Packet::new(SYMBOL, EXCHANGE, Timestamp::default());
        shrink.push(UpdateAction::Change, EntryType::Bid, 995, 100, 5);

        b.iter(|| {
            black_box(engine.on_book_update(black_box(&grow))).ok();
            black_box(engine.on_book_update(black_box(&shrink))).ok();
        });
    });

    group.finish();
}

fn bench_order_entry(c: &mut Criterion) {
    let mut group = c.benchmark_group("order_entry");
    group.throughput(Throughput::Elements(1));

    group.bench_function("rest_and_cancel", |b| {
        let mut engine = seeded_engine(10);
        b.iter(|| {
            let order = Order::new_limit(SYMBOL, Side::Buy, 998, 10);
            let id = order.id();
            black_box(engine.send_order(order)).ok();
            black_box(engine.cancel_order(id)).ok();
        });
    });

    group.bench_function("cross_top_level", |b| {
        b.iter_with_setup(
            || seeded_engine(10),
            |mut engine| {
                let order = Order::new_limit(SYMBOL, Side::Buy, 1_003, 250);
                black_box(engine.send_order(order)).ok();
                engine
            },
        );
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_ladder_apply,
    bench_packet_processing,
    bench_order_entry
);
criterion_main!(benches);
