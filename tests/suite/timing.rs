use std::{
    thread,
    time::{Duration, Instant},
};

use kispec::{
    Done, Interrupt, NodeResult, Outcome, Reporter, ReporterError, SpecContext, SpecHeader,
    SuiteConfig, SuiteSummary,
};
use pretty_assertions::assert_eq;

use crate::lib::suite;

#[test]
#[cfg_attr(all(ci, target_os = "macos"), ignore = "timing is unreliable on macOS runners")]
fn silent_async_leaf_times_out_after_the_default_budget() {
    let (suite, events, _) = suite(SuiteConfig::new("timeouts"));
    let now = Instant::now();
    let report = suite
        .run(|b| {
            b.it_async("never signals", |_: SpecContext, done: Done| {
                thread::sleep(Duration::from_secs(5));
                done.complete();
            });
        })
        .unwrap();
    let elapsed = now.elapsed();

    let outcome = report.outcome("never signals").unwrap();
    assert!(outcome.timed_out());
    assert_eq!(
        outcome.failure.as_ref().unwrap().message,
        "Timed out after 1.000s"
    );
    assert!(elapsed >= Duration::from_secs(1), "{elapsed:?}");
    assert!(elapsed < Duration::from_secs(2), "{elapsed:?}");
    assert_eq!(
        events.lines().last().unwrap(),
        "suite_did_end 0 passed 1 failed"
    );
}

#[test]
fn explicit_timeouts_override_the_default() {
    let (suite, _, _) = suite(SuiteConfig::new("timeouts").with_default_timeout(Duration::from_secs(30)));
    let now = Instant::now();
    let report = suite
        .run(|b| {
            b.it_async_timeout(
                "short budget",
                Duration::from_millis(50),
                |_: SpecContext, _: Done| thread::sleep(Duration::from_millis(500)),
            );
            b.it_async("signals in time", |_: SpecContext, done: Done| {
                thread::spawn(move || {
                    thread::sleep(Duration::from_millis(10));
                    done.complete();
                });
            });
        })
        .unwrap();

    assert!(report.outcome("short budget").unwrap().timed_out());
    assert!(report.outcome("signals in time").unwrap().passed());
    assert!(now.elapsed() < Duration::from_secs(30));
}

#[test]
fn late_failures_land_in_the_spec_running_at_the_time() {
    let config = SuiteConfig::new("late").with_default_timeout(Duration::from_millis(50));
    let (suite, _, _) = suite(config);
    let report = suite
        .run(|b| {
            b.it_async("abandoned", |ctx: SpecContext, _: Done| {
                thread::sleep(Duration::from_millis(200));
                let _ = ctx.fail("failed after its spec was over");
            });
            b.it("innocent bystander", |_: &SpecContext| {
                thread::sleep(Duration::from_millis(600));
            });
        })
        .unwrap();

    assert!(report.outcome("abandoned").unwrap().timed_out());
    let bystander = report.outcome("innocent bystander").unwrap();
    assert!(bystander.failed());
    assert_eq!(
        bystander.failure.as_ref().unwrap().message,
        "failed after its spec was over"
    );
}

#[test]
fn late_returned_errors_are_not_lost() {
    let config = SuiteConfig::new("late").with_default_timeout(Duration::from_millis(50));
    let (suite, _, _) = suite(config);
    let report = suite
        .run(|b| {
            b.it_async("abandoned", |_: SpecContext, _: Done| -> NodeResult {
                thread::sleep(Duration::from_millis(150));
                Err(Interrupt::new("returned after its spec was over"))
            });
            b.it("innocent bystander", |_: &SpecContext| {
                thread::sleep(Duration::from_millis(400));
            });
        })
        .unwrap();

    assert!(report.outcome("abandoned").unwrap().timed_out());
    let bystander = report.outcome("innocent bystander").unwrap();
    assert!(bystander.failed());
    assert_eq!(
        bystander.failure.as_ref().unwrap().message,
        "returned after its spec was over"
    );
}

/// Takes its time reporting completed specs.
struct SlowReporter(Duration);

impl Reporter for SlowReporter {
    fn suite_will_begin(&mut self, _: &SuiteConfig, _: &SuiteSummary) -> Result<(), ReporterError> {
        Ok(())
    }

    fn spec_did_complete(&mut self, _: &SpecHeader, _: &Outcome) -> Result<(), ReporterError> {
        thread::sleep(self.0);
        Ok(())
    }

    fn suite_did_end(&mut self, _: &SuiteSummary) -> Result<(), ReporterError> {
        Ok(())
    }
}

#[test]
fn failures_arriving_between_specs_are_carried_into_the_next() {
    let config = SuiteConfig::new("between").with_default_timeout(Duration::from_millis(50));
    let (suite, _, _) = suite(config);
    let report = suite
        .with_reporter(SlowReporter(Duration::from_millis(300)))
        .run(|b| {
            b.it_async("abandoned", |ctx: SpecContext, _: Done| {
                thread::sleep(Duration::from_millis(150));
                let _ = ctx.fail("failed while the spec was being reported");
            });
            b.it("next", |_| ());
        })
        .unwrap();

    assert!(report.outcome("abandoned").unwrap().timed_out());
    let next = report.outcome("next").unwrap();
    assert!(next.failed());
    assert_eq!(
        next.failure.as_ref().unwrap().message,
        "failed while the spec was being reported"
    );
}
