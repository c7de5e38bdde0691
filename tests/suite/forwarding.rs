use kispec::{
    Dispatcher, NodeResult, Partition, SpecContext, SuiteConfig, TreeBuilder, WireError,
    reporter::{
        aggregate::Aggregator,
        forward::{Envelope, PROTOCOL_VERSION, WireEvent},
    },
};
use pretty_assertions::assert_eq;

use crate::lib::{Buffer, Events, Wire, suite};

const ENDPOINT: &str = "http://127.0.0.1:8675/";

fn declare(b: &mut TreeBuilder) {
    b.describe("orders", |b| {
        b.it("are created", |_| ());
        b.it("are rejected", |ctx: &SpecContext| -> NodeResult {
            ctx.log("payload was empty");
            Err(ctx.fail("no items"))
        });
        b.it("are shipped", |_| ());
    });
}

fn run_partition(index: usize, count: usize, wire: &Wire) {
    let config = SuiteConfig::new("orders")
        .with_partition(Partition::new(index, count).unwrap())
        .with_remote_reporting_server(ENDPOINT);
    let (suite, _, _) = suite(config);
    suite
        .with_default_reporter(wire.clone())
        .run(declare)
        .unwrap();
}

#[test]
fn events_are_posted_to_their_routes() {
    let wire = Wire::default();
    run_partition(1, 1, &wire);

    let requests = wire.requests();
    let routes: Vec<_> = requests
        .iter()
        .map(|(url, _)| url.trim_start_matches("http://127.0.0.1:8675"))
        .collect();
    assert_eq!(
        routes,
        vec![
            "/SpecSuiteWillBegin",
            "/SpecWillRun",
            "/SpecDidComplete",
            "/SpecWillRun",
            "/SpecOutput",
            "/SpecDidComplete",
            "/SpecWillRun",
            "/SpecDidComplete",
            "/SpecSuiteDidEnd",
        ]
    );

    let envelopes: Vec<_> = requests
        .iter()
        .map(|(_, body)| Envelope::decode(body).unwrap())
        .collect();
    assert!(envelopes.iter().all(|e| e.version == PROTOCOL_VERSION));
    let WireEvent::Output { spec_index, output } = &envelopes[4].event else {
        panic!("expected relayed output");
    };
    assert_eq!(*spec_index, 1);
    assert_eq!(output, "payload was empty\n");
}

#[test]
fn aggregator_replays_every_partition_as_one_suite() {
    let wire = Wire::default();
    run_partition(1, 2, &wire);
    run_partition(2, 2, &wire);

    let events = Events::default();
    let relayed = Buffer::default();
    let dispatcher = Dispatcher::new().with_reporter(events.clone());
    let mut aggregator = Aggregator::new(2, dispatcher, relayed.clone());
    for (_, body) in wire.requests() {
        aggregator.handle(&body).unwrap();
    }

    assert!(aggregator.is_finished());
    assert!(aggregator.dispatcher().errors().is_empty());
    assert_eq!(
        events.lines(),
        vec![
            "suite_will_begin 2",
            "spec_will_run orders are created",
            "spec_did_complete orders are created Passed",
            "spec_will_run orders are rejected",
            "spec_did_complete orders are rejected Failed",
            "spec_will_run orders are shipped",
            "spec_did_complete orders are shipped Passed",
            "suite_did_end 2 passed 1 failed",
        ]
    );
    assert_eq!(relayed.contents(), "[1] payload was empty\n");
}

#[test]
fn other_protocol_versions_are_rejected() {
    let wire = Wire::default();
    run_partition(1, 1, &wire);

    let (_, body) = &wire.requests()[0];
    let mut value: serde_json::Value = serde_json::from_slice(body).unwrap();
    value["version"] = serde_json::json!(PROTOCOL_VERSION + 1);
    let body = serde_json::to_vec(&value).unwrap();

    let err = Envelope::decode(&body).unwrap_err();
    assert!(matches!(
        err,
        WireError::UnsupportedVersion { found, expected }
            if found == PROTOCOL_VERSION + 1 && expected == PROTOCOL_VERSION
    ));
}
