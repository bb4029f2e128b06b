//! Counter application driven by watchers and deferred work

use dirtyscope::runtime::TurnQueue;
use dirtyscope::{Scope, Value};

fn main() {
    println!("=== Counter Application ===\n");

    let turns = TurnQueue::new();
    let scope = Scope::builder().scheduler(turns.clone()).build();
    scope.set("count", 0);
    scope.set("step", 1);
    scope.set("history", Value::array([0]));

    // Derived value: recomputed whenever count changes
    scope.watch(
        |s| s.get("count"),
        |new, old, s| {
            println!("   [count] {} -> {}", old, new);
            s.set("doubled", new.as_f64().unwrap_or(0.0) * 2.0);
        },
    );

    // Deep watch: fires on in-place pushes to the history array
    scope.watch_deep(
        |s| s.get("history"),
        |new, _, _| println!("   [history] {:?}", new),
    );

    println!("1. Initial digest");
    scope.digest().unwrap();

    println!("\n2. Increment through apply");
    for _ in 0..3 {
        scope
            .apply(|s| {
                let next = s.get("count").as_f64().unwrap_or(0.0) + s.get("step").as_f64().unwrap_or(1.0);
                s.set("count", next);
                s.get("history").push(next);
            })
            .unwrap();
    }
    println!("   doubled = {}", scope.get("doubled"));

    println!("\n3. Batched updates with apply_async");
    scope.apply_async(|s| s.set("step", 10));
    scope.apply_async(|s| {
        let next = s.get("count").as_f64().unwrap_or(0.0) + 10.0;
        s.set("count", next);
        s.get("history").push(next);
    });
    println!("   pending turns: {}", turns.pending());
    turns.run_until_idle();

    println!("\n4. Post-digest hook");
    scope.post_digest(|| println!("   [post_digest] tree is stable"));
    scope.apply(|s| s.set("count", 0)).unwrap();

    println!("\nFinal count: {}", scope.get("count"));
}
