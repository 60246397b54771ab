//! Tick throughput.
//!
//! One world tick on the skirmish map with a full bot roster, with and
//! without the bot AI update in front of it.

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};

use tile_skirmish::bot::{BotManager, Difficulty};
use tile_skirmish::core::rng::derive_stream;
use tile_skirmish::game::weapon::WEAPON_TYPES;
use tile_skirmish::world::level::Level;
use tile_skirmish::world::schema::{MapLayout, MapType};
use tile_skirmish::{Team, World};

fn setup() -> (World, BotManager) {
    let level = Level::new(MapLayout::skirmish(MapType::Dirt)).expect("skirmish layout");
    let mut world = World::new(level, 7);
    let mut bots = BotManager::new(derive_stream(7, b"bots"), WEAPON_TYPES.to_vec());
    bots.enable();

    for team in Team::ALL {
        for difficulty in Difficulty::ALL {
            bots.add_bot(&mut world, team, difficulty, None, None).expect("bot slot");
        }
    }

    // Let the fight develop so projectiles are in the air
    for _ in 0..120 {
        let now = world.game_time_ms();
        bots.update(&mut world, now);
        world.tick();
    }

    (world, bots)
}

fn bench_world_tick(c: &mut Criterion) {
    let (world, _) = setup();

    c.bench_function("world_tick_8_bots", |b| {
        b.iter_batched(
            || world.clone(),
            |mut world| black_box(world.tick()),
            BatchSize::SmallInput,
        )
    });
}

fn bench_bots_and_tick(c: &mut Criterion) {
    let (world, bots) = setup();

    c.bench_function("bot_update_and_tick_8_bots", |b| {
        b.iter_batched(
            || (world.clone(), bots.clone()),
            |(mut world, mut bots)| {
                let now = world.game_time_ms();
                bots.update(&mut world, now);
                black_box(world.tick())
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_state_hash(c: &mut Criterion) {
    let (world, _) = setup();
    c.bench_function("world_state_hash", |b| b.iter(|| black_box(world.compute_hash())));
}

criterion_group!(benches, bench_world_tick, bench_bots_and_tick, bench_state_hash);
criterion_main!(benches);
