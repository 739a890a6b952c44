use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};

use anyhow::{Context, Result};
use keyrate::{ManualClock, RateTracker, Snapshot, TrackerConfig};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::cli::{OutputFormat, Replay};

/// One line of the event log.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Event {
    Add {
        at: u64,
        key: String,
        amount: f64,
        #[serde(default)]
        metadata: Value,
    },
    Get {
        at: u64,
        key: String,
    },
}

/// A read, as printed to stdout.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Report {
    pub at: u64,
    pub key: String,
    #[serde(flatten)]
    pub snapshot: Snapshot<Value>,
}

impl Report {
    fn render(&self, format: OutputFormat) -> Result<String> {
        Ok(match format {
            OutputFormat::Json => serde_json::to_string(self)?,
            OutputFormat::Text => {
                let mut line = format!(
                    "{}\t{}\ttotal={}\trate={:.2}",
                    self.at, self.key, self.snapshot.total, self.snapshot.rate
                );
                if let Some(meta) = self.snapshot.metadata.as_ref().filter(|m| !m.is_null()) {
                    line.push_str(&format!("\tmetadata={meta}"));
                }
                line
            }
        })
    }
}

pub fn run_replay(replay: Replay) -> Result<()> {
    let input: Box<dyn BufRead> = match &replay.input {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("Opening event log {}", path.display()))?;
            Box::new(BufReader::new(file))
        }
        None => Box::new(io::stdin().lock()),
    };
    let stdout = io::stdout();
    let mut out = stdout.lock();
    replay_events(&replay, input, &mut out)
}

pub(crate) fn replay_events(replay: &Replay, input: impl BufRead, out: &mut impl Write) -> Result<()> {
    let clock = ManualClock::new(0);
    let tracker: RateTracker<Value, ManualClock> =
        RateTracker::with_clock(TrackerConfig::from(replay), clock.clone());
    info!(window_ms = replay.window_ms, strict = replay.strict, "Starting replay");

    let mut last_at: Option<u64> = None;
    let mut events = 0usize;
    for (idx, line) in input.lines().enumerate() {
        let lineno = idx + 1;
        let line = line.with_context(|| format!("Reading event log line {lineno}"))?;
        if line.trim().is_empty() {
            continue;
        }
        let event: Event = serde_json::from_str(&line)
            .with_context(|| format!("Parsing event on line {lineno}"))?;

        let at = match &event {
            Event::Add { at, .. } | Event::Get { at, .. } => *at,
        };
        if let Some(prev) = last_at {
            if at < prev {
                warn!(line = lineno, at, prev, "Event time went backwards");
            }
        }
        last_at = Some(at);
        clock.set(at);

        match event {
            Event::Add { key, amount, metadata, .. } => {
                if replay.strict {
                    tracker
                        .try_add(&key, amount, metadata)
                        .with_context(|| format!("Rejected event on line {lineno}"))?;
                } else {
                    tracker.add(&key, amount, metadata);
                }
            }
            Event::Get { key, .. } => {
                let snapshot = tracker.get(&key);
                let report = Report { at, key, snapshot };
                writeln!(out, "{}", report.render(replay.format)?)?;
            }
        }
        events += 1;
    }

    if replay.summary {
        let at = last_at.unwrap_or_default();
        for (key, snapshot) in tracker.snapshots() {
            let report = Report { at, key, snapshot };
            writeln!(out, "{}", report.render(replay.format)?)?;
        }
    }

    info!(events, keys = tracker.len(), "Replay finished");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use keyrate::TrackerError;

    use super::*;

    fn opts(format: OutputFormat) -> Replay {
        Replay {
            input: None,
            window_ms: 10_000,
            strict: false,
            format,
            summary: false,
        }
    }

    fn run(replay: &Replay, log: &str) -> Result<Vec<String>> {
        let mut out = Vec::new();
        replay_events(replay, log.as_bytes(), &mut out)?;
        Ok(String::from_utf8(out).unwrap().lines().map(str::to_string).collect())
    }

    #[test]
    fn parses_both_event_kinds() {
        let add: Event =
            serde_json::from_str(r#"{"op":"add","at":3,"key":"k","amount":1.5}"#).unwrap();
        assert_eq!(
            add,
            Event::Add { at: 3, key: "k".into(), amount: 1.5, metadata: Value::Null }
        );
        let get: Event = serde_json::from_str(r#"{"op":"get","at":9,"key":"k"}"#).unwrap();
        assert_eq!(get, Event::Get { at: 9, key: "k".into() });
    }

    #[test]
    fn json_reports_follow_the_window() {
        let log = r#"
{"op":"add","at":0,"key":"k","amount":500,"metadata":{"peer":"a"}}
{"op":"add","at":5000,"key":"k","amount":500,"metadata":{"peer":"b"}}
{"op":"get","at":5001,"key":"k"}
{"op":"get","at":10002,"key":"k"}
"#;
        let lines = run(&opts(OutputFormat::Json), log).unwrap();
        assert_eq!(lines.len(), 2);

        let first: Value = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(first["at"], 5001);
        assert_eq!(first["total"], 1000.0);
        assert!((first["rate"].as_f64().unwrap() - 199.96).abs() < 0.01);
        assert_eq!(first["metadata"]["peer"], "b");

        let second: Value = serde_json::from_str(&lines[1]).unwrap();
        assert_eq!(second["total"], 1000.0);
        assert!((second["rate"].as_f64().unwrap() - 99.96).abs() < 0.01);
    }

    #[test]
    fn text_report_for_unseen_key() {
        let lines = run(&opts(OutputFormat::Text), r#"{"op":"get","at":12,"key":"ghost"}"#).unwrap();
        assert_eq!(lines, vec!["12\tghost\ttotal=0\trate=0.00".to_string()]);
    }

    #[test]
    fn summary_lists_every_key() {
        let mut replay = opts(OutputFormat::Text);
        replay.summary = true;
        let log = r#"{"op":"add","at":0,"key":"b","amount":2}
{"op":"get","at":1,"key":"a"}"#;
        let lines = run(&replay, log).unwrap();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("1\ta\ttotal=0"));
        assert!(lines[2].starts_with("1\tb\ttotal=2"));
    }

    #[test]
    fn malformed_line_reports_its_number() {
        let log = "{\"op\":\"get\",\"at\":1,\"key\":\"k\"}\nnot json\n";
        let err = run(&opts(OutputFormat::Text), log).unwrap_err();
        assert!(err.to_string().contains("line 2"));
        assert!(err.chain().any(|c| c.is::<serde_json::Error>()));
    }

    #[test]
    fn strict_mode_rejects_negative_amounts() {
        let mut replay = opts(OutputFormat::Text);
        replay.strict = true;
        let err = run(&replay, r#"{"op":"add","at":0,"key":"k","amount":-1}"#).unwrap_err();
        let inner = err.downcast_ref::<TrackerError>().unwrap();
        assert!(matches!(inner, TrackerError::NegativeAmount { .. }));

        replay.strict = false;
        let lines = run(
            &replay,
            "{\"op\":\"add\",\"at\":0,\"key\":\"k\",\"amount\":-1}\n{\"op\":\"get\",\"at\":1000,\"key\":\"k\"}",
        )
        .unwrap();
        assert_eq!(lines, vec!["1000\tk\ttotal=-1\trate=-1.00".to_string()]);
    }

    #[test]
    fn missing_input_file_is_an_io_error() {
        let mut replay = opts(OutputFormat::Text);
        replay.input = Some(PathBuf::from("/nonexistent/keyrate/events.jsonl"));
        let err = run_replay(replay).unwrap_err();
        assert!(err.chain().any(|c| c.is::<std::io::Error>()));
    }
}
