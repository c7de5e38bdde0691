use std::io::Write;

use kispec::{NodeResult, SpecContext, SuiteConfig};
use pretty_assertions::assert_eq;

use crate::lib::suite;

#[test]
fn passing_specs_stay_quiet() {
    let (suite, _, sink) = suite(SuiteConfig::new("quiet"));
    suite
        .run(|b| {
            b.before_each(|ctx: &SpecContext| ctx.log("setting up"));
            b.it("passes", |ctx: &SpecContext| ctx.log("all good"));
        })
        .unwrap();

    assert_eq!(sink.contents(), "");
}

#[test]
fn failing_specs_flush_their_own_output_once() {
    let (suite, _, sink) = suite(SuiteConfig::new("noisy"));
    suite
        .run(|b| {
            b.it("passes first", |ctx: &SpecContext| ctx.log("from the passing spec"));
            b.it("fails", |ctx: &SpecContext| -> NodeResult {
                writeln!(ctx.writer(), "before failing")?;
                Err(ctx.fail("boom"))
            });
            b.it("passes last", |ctx: &SpecContext| ctx.log("after the failure"));
        })
        .unwrap();

    assert_eq!(sink.contents(), "before failing\n");
}

#[test]
fn suppressed_failures_are_part_of_the_flushed_output() {
    let (suite, _, sink) = suite(SuiteConfig::new("suppressed"));
    let report = suite
        .run(|b| {
            b.after_each(|ctx: &SpecContext| {
                let _ = ctx.fail("cleanup also failed");
            });
            b.it("fails", |ctx: &SpecContext| -> NodeResult {
                Err(ctx.fail("first failure"))
            });
        })
        .unwrap();

    let failure = report.outcome("fails").unwrap().failure.clone().unwrap();
    assert_eq!(failure.message, "first failure");
    let flushed = sink.contents();
    assert!(flushed.contains("[suppressed failure at "), "{flushed}");
    assert!(flushed.contains("cleanup also failed"), "{flushed}");
}

#[test]
fn verbose_output_passes_straight_through() {
    let (suite, _, sink) = suite(SuiteConfig::new("verbose").with_verbose(true));
    suite
        .run(|b| {
            b.it("passes", |ctx: &SpecContext| ctx.log("seen anyway"));
        })
        .unwrap();

    assert_eq!(sink.contents(), "seen anyway\n");
}
