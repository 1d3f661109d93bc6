//! Benchmarks for the seat packer.

use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use knockout_raffle::draw::models::{Day, DayStatus};
use knockout_raffle::packing::pack_day;
use knockout_raffle::store::{MemoryStore, Store};
use uuid::Uuid;

fn bench_pack_day(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("runtime");

    let mut group = c.benchmark_group("packing");
    for &pool_size in &[1_000usize, 10_000] {
        group.bench_function(format!("pack_day_{pool_size}"), |b| {
            b.iter(|| {
                rt.block_on(async {
                    let store = MemoryStore::new();
                    let event_id = Uuid::new_v4();
                    let day = Day {
                        id: 1,
                        event_id,
                        number: 1,
                        status: DayStatus::Pending,
                        entry: 0,
                        winner: 0,
                    };

                    let mut tickets = Vec::with_capacity(pool_size);
                    for i in 0..pool_size {
                        // 4 tickets per participant keeps the cap in play.
                        let user = (i / 4) as i64;
                        tickets.push(store.create_ticket(user, event_id, None).await.unwrap());
                    }

                    black_box(pack_day(&store, &day, tickets).await.unwrap());
                })
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_pack_day);
criterion_main!(benches);
