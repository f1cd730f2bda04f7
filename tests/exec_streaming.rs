use std::sync::{Arc, Mutex};

use devstack::exec::{CommandSpec, LineSink, ProcessRunner, Runner, StreamKind};

struct CollectSink {
    lines: Mutex<Vec<(StreamKind, String)>>,
}

impl CollectSink {
    fn new() -> Arc<Self> {
        Arc::new(CollectSink {
            lines: Mutex::new(Vec::new()),
        })
    }

    fn per_stream(&self, kind: StreamKind) -> Vec<String> {
        self.lines
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, l)| l.clone())
            .collect()
    }
}

impl LineSink for CollectSink {
    fn line(&self, kind: StreamKind, line: &str) {
        self.lines.lock().unwrap().push((kind, line.to_string()));
    }
}

fn have_sh() -> bool {
    which::which("sh").is_ok()
}

#[test]
fn test_streaming_preserves_per_stream_order() {
    if !have_sh() {
        eprintln!("skipping: sh not found in PATH");
        return;
    }
    let script = r#"
for i in 1 2 3 4 5 6 7 8 9 10; do
  echo "out $i"
  echo "err $i" >&2
done
"#;
    let sink = CollectSink::new();
    let spec = CommandSpec::new("sh").args(["-c", script]);
    ProcessRunner
        .stream_to(&spec, sink.clone())
        .expect("stream failed");

    let outs = sink.per_stream(StreamKind::Stdout);
    let errs = sink.per_stream(StreamKind::Stderr);
    let expect: Vec<String> = (1..=10).map(|i| format!("out {i}")).collect();
    assert_eq!(outs, expect);
    let expect: Vec<String> = (1..=10).map(|i| format!("err {i}")).collect();
    assert_eq!(errs, expect);
}

#[test]
fn test_streaming_survives_very_long_lines() {
    if !have_sh() {
        eprintln!("skipping: sh not found in PATH");
        return;
    }
    // Well past any fixed scanner buffer: one 500k-character line.
    let script = r#"head -c 500000 /dev/zero | tr '\0' 'x'; echo"#;
    let sink = CollectSink::new();
    let spec = CommandSpec::new("sh").args(["-c", script]);
    ProcessRunner
        .stream_to(&spec, sink.clone())
        .expect("stream failed");

    let outs = sink.per_stream(StreamKind::Stdout);
    assert_eq!(outs.len(), 1);
    assert_eq!(outs[0].len(), 500_000);
    assert!(outs[0].bytes().all(|b| b == b'x'));
}

#[test]
fn test_streaming_nonzero_exit_surfaces_at_wait() {
    if !have_sh() {
        eprintln!("skipping: sh not found in PATH");
        return;
    }
    let sink = CollectSink::new();
    let spec = CommandSpec::new("sh").args(["-c", "echo before failure; exit 7"]);
    let err = ProcessRunner.stream_to(&spec, sink.clone()).unwrap_err();
    assert!(
        err.to_string().contains("exit status 7"),
        "got: {err}"
    );
    // Every line produced before the failure still reached the sink.
    let outs = sink.per_stream(StreamKind::Stdout);
    assert_eq!(outs, vec!["before failure".to_string()]);
}

#[test]
fn test_dry_run_stream_executes_nothing() {
    let sink = CollectSink::new();
    let spec = CommandSpec::new("devstack-no-such-tool-xyzzy")
        .arg("build")
        .dry_run(true);
    ProcessRunner
        .stream_to(&spec, sink.clone())
        .expect("dry-run must succeed");
    assert!(sink.lines.lock().unwrap().is_empty());
}
