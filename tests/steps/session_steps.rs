//! Steps opening and ending scenario sessions.

use cucumber::{given, when};

use crate::world::ConditionWorld;

#[given(expr = "a session applying the {string} scenario")]
fn session_applies(world: &mut ConditionWorld, scenario: String) {
    let session = world.interceptor.session(scenario.clone());
    session.apply_scenario(&scenario).expect("unknown scenario");
    world.session = Some(session);
}

#[when("the session ends")]
fn session_ends(world: &mut ConditionWorld) {
    let session = world.session.take().expect("no open session");
    session.end();
}
