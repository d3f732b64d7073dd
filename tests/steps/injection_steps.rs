//! Steps registering conditions and sending requests through them.

use std::time::Duration;

use cucumber::{given, then, when};
use netcondition::{ConditionProfile, ResponseOrigin, clock::FixedClock, presets::preset};

use crate::world::ConditionWorld;

#[given(expr = "the clock reads {int}:{int}")]
fn clock_reads(world: &mut ConditionWorld, hour: u32, minute: u32) {
    *world = ConditionWorld::at(FixedClock::at(hour, minute).expect("valid time"));
}

#[given(expr = "the {string} preset on {string}")]
fn preset_on(world: &mut ConditionWorld, name: String, pattern: String) {
    world.register(&pattern, preset(&name).expect("unknown preset"));
}

#[given(expr = "a profile {string} with {int} ms delay and failure rate {float} on {string}")]
fn profile_on(world: &mut ConditionWorld, name: String, delay_ms: u64, rate: f64, pattern: String) {
    let profile = ConditionProfile::builder(name)
        .base_delay_ms(delay_ms)
        .failure_rate(rate)
        .build()
        .expect("invalid profile");
    world.register(&pattern, profile);
}

#[when(expr = "{int} requests are sent to {string}")]
async fn send_requests(world: &mut ConditionWorld, count: usize, path: String) {
    world.send(count, &path).await;
}

#[then(expr = "every forwarded request took between {int} and {int} ms")]
fn forwarded_latency(world: &mut ConditionWorld, low: u64, high: u64) {
    let (low, high) = (Duration::from_millis(low), Duration::from_millis(high));
    for (origin, elapsed) in &world.outcomes {
        if *origin == ResponseOrigin::Upstream {
            assert!(*elapsed >= low && *elapsed <= high, "{elapsed:?} outside bounds");
        }
    }
}

#[then(expr = "between {int} and {int} requests received an injected failure")]
fn injected_between(world: &mut ConditionWorld, low: usize, high: usize) {
    let injected = world.count(ResponseOrigin::Injected);
    assert!((low..=high).contains(&injected), "{injected} injected failures");
}

#[then("only the remaining requests reached the upstream")]
fn remaining_reached_upstream(world: &mut ConditionWorld) {
    let forwarded = world.outcomes.len() - world.count(ResponseOrigin::Injected);
    assert_eq!(world.upstream.calls(), forwarded);
}

#[then(expr = "{int} requests reached the upstream without delay")]
fn reached_without_delay(world: &mut ConditionWorld, count: usize) {
    assert_eq!(world.upstream.calls(), count);
    assert!(world.outcomes.iter().all(|(_, elapsed)| elapsed.is_zero()));
}
