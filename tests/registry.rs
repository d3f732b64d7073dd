//! Registry behaviour: precedence, clearing and concurrent publication.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
};

use netcondition::{
    ConditionProfile,
    InterceptorRegistry,
    ScenarioSession,
    presets::preset,
};
use rstest::{fixture, rstest};

fn named(name: &str) -> ConditionProfile {
    ConditionProfile::builder(name).build().expect("valid profile")
}

#[fixture]
fn registry() -> InterceptorRegistry { InterceptorRegistry::new() }

#[rstest]
fn later_overlapping_registration_shadows_earlier(registry: InterceptorRegistry) {
    registry.register("**/api/payments/**", named("p1")).expect("register");
    registry.register("**/api/**", named("p2")).expect("register");

    for target in ["/api/payments/1", "/api/balance", "https://bank.test/api/x?y=1"] {
        let entry = registry.resolve(target).expect("claimed");
        assert_eq!(entry.action().label(), "p2", "target {target}");
    }
}

#[rstest]
fn sequences_increase_with_each_registration(registry: InterceptorRegistry) {
    let a = registry.register("**/a/**", named("a")).expect("register");
    let b = registry.register("**/b/**", named("b")).expect("register");
    let a_again = registry.register("**/a/**", named("a2")).expect("register");
    assert!(a < b && b < a_again);
    assert_eq!(registry.len(), 2);
}

#[rstest]
#[case("**/api/payments/**", &["images", "api"])]
#[case("**/api/**", &["images"])]
#[case("**", &[])]
#[case("*", &[])]
fn clear_removes_exactly_rooted_entries(
    registry: InterceptorRegistry,
    #[case] prefix: &str,
    #[case] survivors: &[&str],
) {
    registry.register("**/*.jpg", named("images")).expect("register");
    registry.register("**/api/**", named("api")).expect("register");
    registry.register("**/api/payments/**", named("payments")).expect("register");

    registry.clear(prefix).expect("clear");
    let left: Vec<_> = registry
        .snapshot()
        .iter()
        .map(|e| e.action().label().to_owned())
        .collect();
    assert_eq!(left, survivors);
}

#[rstest]
fn cleared_paths_fall_back_then_pass_through(registry: InterceptorRegistry) {
    registry.register("**/api/**", named("api")).expect("register");
    registry.register("**/api/payments/**", named("payments")).expect("register");

    registry.clear("**/api/payments/**").expect("clear");
    assert_eq!(
        registry.resolve("/api/payments/9").expect("claimed").action().label(),
        "api"
    );
    registry.clear("**/api/**").expect("clear");
    assert!(registry.resolve("/api/payments/9").is_none());
}

#[rstest]
fn identical_pair_registered_twice_keeps_one_entry(registry: InterceptorRegistry) {
    let profile = preset("4g").expect("preset");
    registry.register("**/api/**", profile.clone()).expect("register");
    let before = registry.resolve_profile("/api/a");
    registry.register("**/api/**", profile).expect("register");

    assert_eq!(registry.len(), 1);
    assert_eq!(registry.resolve_profile("/api/a"), before);
}

#[rstest]
fn sessions_and_direct_registrations_are_separate_entries(registry: InterceptorRegistry) {
    let registry = Arc::new(registry);
    registry.register("**/api/**", named("direct")).expect("register");
    let session = ScenarioSession::new(Arc::clone(&registry), "s");
    session.register("**/api/**", named("session")).expect("register");

    assert_eq!(registry.len(), 2);
    assert_eq!(
        registry.resolve("/api/x").expect("claimed").action().label(),
        "session"
    );
    drop(session);
    assert_eq!(
        registry.resolve("/api/x").expect("claimed").action().label(),
        "direct"
    );
}

#[test]
fn readers_never_observe_partial_updates() {
    let registry = Arc::new(InterceptorRegistry::new());
    let stop = Arc::new(AtomicBool::new(false));

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let registry = Arc::clone(&registry);
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                let mut observed = 0_usize;
                while !stop.load(Ordering::Relaxed) {
                    if let Some(entry) = registry.resolve("/api/payments/1") {
                        assert!(entry.pattern().matches("/api/payments/1"));
                        let len = registry.snapshot().len();
                        assert!(len <= 2, "saw {len} entries");
                        observed += 1;
                    }
                }
                observed
            })
        })
        .collect();

    for round in 0..500 {
        registry
            .register("**/api/**", named(&format!("api-{round}")))
            .expect("register");
        registry
            .register("**/api/payments/**", named(&format!("pay-{round}")))
            .expect("register");
        registry.clear("**").expect("clear");
    }
    stop.store(true, Ordering::Relaxed);
    for reader in readers {
        reader.join().expect("reader panicked");
    }
    assert!(registry.is_empty());
}
