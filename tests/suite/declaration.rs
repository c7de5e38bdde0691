use std::time::Duration;

use kispec::{ConfigurationError, SuiteConfig};

use crate::lib::suite;

#[test]
fn malformed_declarations_abort_before_any_event() {
    let (suite, events, _) = suite(SuiteConfig::new("broken"));
    let err = suite
        .run(|b| {
            b.it("would pass", |_| ());
            b.measure("needs samples", 0, |_, _| ());
        })
        .unwrap_err();

    assert!(matches!(err, ConfigurationError::ZeroSamples { .. }));
    assert!(events.lines().is_empty());
}

#[test]
fn zero_timeouts_are_rejected() {
    let (suite, events, _) = suite(SuiteConfig::new("broken"));
    let err = suite
        .run(|b| {
            b.after_each_async(Some(Duration::ZERO), |_, done| done.complete());
            b.it("leaf", |_| ());
        })
        .unwrap_err();

    assert!(matches!(err, ConfigurationError::ZeroTimeout { .. }));
    assert!(events.lines().is_empty());
}

#[test]
fn panicking_grouping_is_reported_with_its_location() {
    let (suite, _, _) = suite(SuiteConfig::new("broken"));
    let line = line!() + 3;
    let err = suite
        .run(|b| {
            b.describe("explodes", |_| panic!("while declaring"));
        })
        .unwrap_err();

    assert!(err.to_string().contains("`explodes`"));
    let ConfigurationError::GroupingPanicked {
        text,
        location,
        message,
    } = err
    else {
        panic!("expected a grouping panic");
    };
    assert_eq!(text, "explodes");
    assert_eq!(location.line, line);
    assert!(location.file.ends_with("declaration.rs"));
    assert_eq!(message, "while declaring");
}

#[test]
fn invalid_focus_pattern_is_a_configuration_error() {
    let (suite, events, _) = suite(SuiteConfig::new("broken").with_focus("[unclosed"));
    let err = suite.run(|b| {
        b.it("leaf", |_| ());
    });

    assert!(matches!(
        err,
        Err(ConfigurationError::InvalidPattern { which: "focus", .. })
    ));
    assert!(events.lines().is_empty());
}
