use std::sync::{Arc, Mutex};

use kispec::{NodeResult, SpecContext, SpecState, SuiteConfig};
use pretty_assertions::assert_eq;

use crate::lib::suite;

type Calls = Arc<Mutex<Vec<&'static str>>>;

fn call(calls: &Calls, name: &'static str) -> impl Fn(&SpecContext) + Send + Sync + 'static {
    let calls = Arc::clone(calls);
    move |_: &SpecContext| calls.lock().unwrap().push(name)
}

#[test]
fn reporters_see_events_in_order() {
    let (suite, events, _) = suite(SuiteConfig::new("ordering"));
    let report = suite
        .run(|b| {
            b.it("first", |_| ());
            b.it("second", |_| ());
        })
        .unwrap();

    assert!(report.success());
    assert_eq!(
        events.lines(),
        vec![
            "suite_will_begin 2",
            "spec_will_run first",
            "spec_did_complete first Passed",
            "spec_will_run second",
            "spec_did_complete second Passed",
            "suite_did_end 2 passed 0 failed",
        ]
    );
}

#[test]
fn hooks_run_outer_before_inner_and_unwind_in_reverse() {
    let calls = Calls::default();
    let (suite, _, _) = suite(SuiteConfig::new("hooks"));
    suite
        .run(|b| {
            b.describe("A", |b| {
                b.before_each(call(&calls, "A.BeforeEach"));
                b.after_each(call(&calls, "A.AfterEach"));
                b.describe("B", |b| {
                    b.before_each(call(&calls, "B.BeforeEach"));
                    b.after_each(call(&calls, "B.AfterEach"));
                    b.it("leaf", call(&calls, "Leaf"));
                });
            });
        })
        .unwrap();

    assert_eq!(
        *calls.lock().unwrap(),
        vec![
            "A.BeforeEach",
            "B.BeforeEach",
            "Leaf",
            "B.AfterEach",
            "A.AfterEach"
        ]
    );
}

#[test]
fn cleanup_runs_after_a_failed_setup() {
    let calls = Calls::default();
    let (suite, _, _) = suite(SuiteConfig::new("cleanup"));
    let report = suite
        .run(|b| {
            b.describe("A", |b| {
                let failing = Arc::clone(&calls);
                b.before_each(move |ctx: &SpecContext| -> NodeResult {
                    failing.lock().unwrap().push("A.BeforeEach");
                    Err(ctx.fail("setup failed"))
                });
                b.after_each(call(&calls, "A.AfterEach"));
                b.describe("B", |b| {
                    b.before_each(call(&calls, "B.BeforeEach"));
                    b.after_each(call(&calls, "B.AfterEach"));
                    b.it("leaf", call(&calls, "Leaf"));
                });
            });
        })
        .unwrap();

    assert_eq!(
        *calls.lock().unwrap(),
        vec!["A.BeforeEach", "B.AfterEach", "A.AfterEach"]
    );
    let outcome = report.outcome("A B leaf").unwrap();
    assert_eq!(outcome.state, SpecState::Failed);
    let failure = outcome.failure.as_ref().unwrap();
    assert_eq!(failure.message, "setup failed");
    assert!(failure.location.file.ends_with("lifecycle.rs"));
    assert!(!report.success());
}

#[test]
fn errors_propagate_with_question_mark() {
    let (suite, _, _) = suite(SuiteConfig::new("errors"));
    let report = suite
        .run(|b| {
            b.it("parses", |_| -> NodeResult {
                let _: u32 = "forty-two".parse()?;
                Ok(())
            });
        })
        .unwrap();

    let outcome = report.outcome("parses").unwrap();
    assert!(outcome.failed());
    assert_eq!(
        outcome.failure.as_ref().unwrap().message,
        "invalid digit found in string"
    );
}

#[test]
fn panics_become_panicked_outcomes() {
    let (suite, events, _) = suite(SuiteConfig::new("panics"));
    let report = suite
        .run(|b| {
            b.it("explodes", |_| -> () { panic!("kaboom") });
            b.it("survives", |_| ());
        })
        .unwrap();

    assert!(report.outcome("explodes").unwrap().panicked());
    assert!(report.outcome("survives").unwrap().passed());
    assert_eq!(
        events.lines().last().unwrap(),
        "suite_did_end 1 passed 1 failed"
    );
}

#[test]
fn fail_fast_skips_the_rest() {
    let (suite, events, _) = suite(SuiteConfig::new("fail fast").with_fail_fast(true));
    let report = suite
        .run(|b| {
            b.it("fails", |ctx: &SpecContext| {
                let _ = ctx.fail("nope");
            });
            b.it("never runs", |_| -> () { unreachable!() });
        })
        .unwrap();

    assert!(report.outcome("never runs").unwrap().skipped());
    assert!(
        events
            .lines()
            .contains(&"spec_will_run never runs".to_string())
    );
    assert_eq!(report.summary.skipped, 1);
}

#[test]
fn current_description_names_the_running_spec() {
    let seen = Arc::new(Mutex::new(None));
    let (suite, _, _) = suite(SuiteConfig::new("description"));
    {
        let seen = Arc::clone(&seen);
        suite
            .run(move |b| {
                b.describe("Cart", |b| {
                    b.it("knows its name", move |ctx: &SpecContext| {
                        *seen.lock().unwrap() = ctx.current_description();
                    });
                });
            })
            .unwrap();
    }

    let header = seen.lock().unwrap().clone().unwrap();
    assert_eq!(header.full_text(), "Cart knows its name");
    assert_eq!(header.component_texts, vec!["Cart"]);
    assert!(!header.is_measurement);
}
