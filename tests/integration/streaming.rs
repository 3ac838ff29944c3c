//! Streaming delivery of output fragments

use quill::backends::dev::repl::engine::{ConsoleLevel, FragmentOrigin, OutputFragment};
use quill::session;
use quill::util::config::ReplConfig;
use tokio::sync::mpsc;

#[derive(Debug, PartialEq)]
enum Event {
    Fragment(OutputFragment),
    Finished,
}

#[tokio::test]
async fn test_fragment_delivered_before_later_failure() {
    let mut controller = session(&ReplConfig::default());
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut events = Vec::new();

    let result = {
        let eval = controller.evaluate_streaming("print \"Hello\"; sleep 20; fail \"boom\"", tx);
        tokio::pin!(eval);
        loop {
            tokio::select! {
                biased;
                Some(fragment) = rx.recv() => events.push(Event::Fragment(fragment)),
                result = &mut eval => {
                    events.push(Event::Finished);
                    break result;
                }
            }
        }
    };

    assert_eq!(
        events,
        vec![
            Event::Fragment(OutputFragment::console(ConsoleLevel::Log, "Hello")),
            Event::Finished,
        ]
    );
    let evaluation = result.unwrap();
    assert_eq!(evaluation.output, None);
    assert_eq!(evaluation.logs.len(), 1);
    assert_eq!(evaluation.logs[0].message, "boom");
    assert_eq!(evaluation.fragments.len(), 1);
}

#[tokio::test]
async fn test_streamed_and_buffered_agree() {
    let script = "add 1 1; info \"note\"; concat \"a\" \"b\"";

    let mut buffered = session(&ReplConfig::default());
    let expected = buffered.evaluate_line(script).await.unwrap();

    let mut streaming = session(&ReplConfig::default());
    let (tx, mut rx) = mpsc::unbounded_channel();
    let evaluation = streaming.evaluate_streaming(script, tx).await.unwrap();

    let mut streamed = Vec::new();
    while let Ok(fragment) = rx.try_recv() {
        streamed.push(fragment);
    }
    assert_eq!(streamed, evaluation.fragments);
    assert_eq!(evaluation.output, expected.output);
    // Results first, then console messages
    assert_eq!(evaluation.output.as_deref(), Some("2\nab\nnote"));
    assert_eq!(
        streamed.iter().map(|f| f.origin).collect::<Vec<_>>(),
        vec![
            FragmentOrigin::Result,
            FragmentOrigin::Console(ConsoleLevel::Info),
            FragmentOrigin::Result,
        ]
    );
}
