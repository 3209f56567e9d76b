//! Crate-level integration and BDD tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::command::{Command, CommandBuilder};
use crate::dispatch::Dispatcher;
use crate::error::ExecutionError;
use crate::pipeline::JobPipeline;
use crate::process::{ExecutionOutcome, ProcessExecutor};
use crate::transport::{MessagePublisher, PublishError};


/// Publisher double that keeps every payload it is handed.
#[derive(Default)]
struct RecordingPublisher {
    published: Mutex<Vec<(String, Vec<u8>)>>,
}

impl RecordingPublisher {
    fn payloads(&self) -> Vec<(String, Vec<u8>)> {
        self.published.lock().expect("publisher lock").clone()
    }
}

impl MessagePublisher for RecordingPublisher {
    fn publish(&self, queue: &str, payload: &[u8]) -> Result<(), PublishError> {
        self.published
            .lock()
            .expect("publisher lock")
            .push((queue.to_owned(), payload.to_vec()));
        Ok(())
    }
}

struct EchoExecutor;

impl ProcessExecutor for EchoExecutor {
    fn execute(
        &self,
        command: &Command,
        _deadline: Duration,
    ) -> Result<ExecutionOutcome, ExecutionError> {
        Ok(ExecutionOutcome::completed(0, command.arguments().join(" "), 1))
    }
}

#[test]
fn every_payload_yields_one_published_result() {
    let builder = CommandBuilder::new(
        Some(String::from("/opt/jobs/run")),
        &[String::from("{JobId}"), String::from("{Environment}")],
        r"^[A-Za-z0-9_.-]*$",
    )
    .expect("valid template");
    let pipeline = JobPipeline::new(builder, EchoExecutor, Duration::from_secs(1));
    let publisher = Arc::new(RecordingPublisher::default());
    let dispatcher = Dispatcher::new(Arc::clone(&publisher), "results");

    let payloads: [&[u8]; 5] = [
        br#"{"JobId":"a","Body":{"Environment":"prod"}}"#,
        br#"{"JobId":"b","Body":{}}"#,
        b"\xff\xfe",
        br#"{"JobId":"c","Headers":"not an object","Body":{"Environment":"dev"}}"#,
        b"[]",
    ];
    for payload in payloads {
        pipeline.handle(payload, &dispatcher).expect("dispatch");
    }

    let results = publisher
        .payloads()
        .into_iter()
        .map(|(_, payload)| serde_json::from_slice::<serde_json::Value>(&payload).expect("json"))
        .collect::<Vec<_>>();
    let summary = results
        .iter()
        .map(|json| {
            (
                json["JobId"].as_str().unwrap_or_default().to_owned(),
                json["Success"].as_bool().unwrap_or_default(),
            )
        })
        .collect::<Vec<_>>();
    assert_eq!(
        summary,
        vec![
            (String::from("a"), true),
            (String::from("b"), false),
            (String::from("unknown"), false),
            (String::from("c"), true),
            (String::from("unknown"), false),
        ]
    );
    assert_eq!(
        results.first().and_then(|json| json["Output"].as_str()),
        Some("a prod")
    );
}
