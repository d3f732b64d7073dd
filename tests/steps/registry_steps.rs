//! Steps inspecting and clearing the registry.

use cucumber::{then, when};

use crate::world::ConditionWorld;

#[when(expr = "the simulations under {string} are cleared")]
fn clear_under(world: &mut ConditionWorld, prefix: String) {
    world.interceptor.registry().clear(&prefix).expect("invalid prefix");
}

#[then(expr = "{string} resolves to {string}")]
fn resolves_to(world: &mut ConditionWorld, target: String, label: String) {
    let entry = world
        .interceptor
        .registry()
        .resolve(&target)
        .unwrap_or_else(|| panic!("{target} is not claimed"));
    assert_eq!(entry.action().label(), label);
}

#[then(expr = "{string} is not claimed")]
fn not_claimed(world: &mut ConditionWorld, target: String) {
    assert!(world.interceptor.registry().resolve(&target).is_none());
}

#[then(expr = "the registry holds {int} entries")]
fn registry_holds(world: &mut ConditionWorld, count: usize) {
    assert_eq!(world.interceptor.registry().len(), count);
}
