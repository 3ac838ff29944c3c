//! Readline brokering between a running script and the surface

use quill::backends::dev::repl::engine::{
    CancellationManager, ReadlineBroker, ReadlineError,
};
use quill::util::config::ReplConfig;
use quill::{session, Evaluation, Runtime, SessionController};
use tokio_test::{assert_pending, assert_ready, task};

/// Evaluate `text`, answering each readline request from `answers` in order.
/// Returns the evaluation and the prompts that were shown.
async fn evaluate_answering(
    controller: &mut SessionController<Runtime>,
    text: &str,
    answers: &[&str],
) -> (Evaluation, Vec<String>) {
    let handle = controller.handle();
    let mut active = handle.subscribe();
    let mut answers = answers.iter();
    let mut prompts = Vec::new();

    let eval = controller.evaluate_line(text);
    tokio::pin!(eval);
    let evaluation = loop {
        tokio::select! {
            result = &mut eval => break result.unwrap(),
            changed = active.changed() => {
                changed.unwrap();
                let Some(request) = active.borrow_and_update().clone() else { continue };
                prompts.push(request.prompt);
                match answers.next() {
                    Some(answer) => handle.submit_readline_answer(*answer).unwrap(),
                    None => {
                        handle.interrupt();
                    }
                }
            }
        }
    };
    (evaluation, prompts)
}

#[tokio::test]
async fn test_sequential_requests_answered_in_order() {
    let mut controller = session(&ReplConfig::default());
    let (evaluation, prompts) = evaluate_answering(
        &mut controller,
        "set a (readline \"first? \"); set b (readline \"second? \"); concat a \"-\" b",
        &["one", "two"],
    )
    .await;

    assert_eq!(prompts, vec!["first? ", "second? "]);
    assert_eq!(evaluation.output.as_deref(), Some("one-two"));
    assert!(controller.handle().active_request().is_none());
}

#[tokio::test]
async fn test_unanswered_request_cancels_statement() {
    let mut controller = session(&ReplConfig::default());
    let (evaluation, prompts) =
        evaluate_answering(&mut controller, "print \"before\"; readline \"? \"; print \"after\"", &[])
            .await;

    assert_eq!(prompts, vec!["? "]);
    assert!(evaluation.cancelled);
    assert_eq!(evaluation.output, None);
    assert!(evaluation.logs.is_empty());

    // The session keeps working with a fresh token
    let next = controller.evaluate_line("add 1 2").await.unwrap();
    assert_eq!(next.output.as_deref(), Some("3"));
}

#[test]
fn test_interrupt_rejects_every_queued_request() {
    let broker = ReadlineBroker::new();
    let manager = CancellationManager::new();
    let token = manager.current_token();

    let mut requests: Vec<_> = ["a ", "b ", "c "]
        .into_iter()
        .map(|prompt| task::spawn(broker.request(prompt, &token)))
        .collect();
    for request in &mut requests {
        assert_pending!(request.poll());
    }
    assert_eq!(broker.pending_len(), 3);

    let retired = manager.interrupt();
    assert!(retired.same_as(&token));
    for request in &mut requests {
        assert_eq!(assert_ready!(request.poll()), Err(ReadlineError::Cancelled));
    }
    assert_eq!(broker.pending_len(), 0);
    assert!(broker.active().is_none());

    // A second interrupt retires the fresh token, not the old one again
    let fresh = manager.current_token();
    let second = manager.interrupt();
    assert!(second.same_as(&fresh));
    assert!(!second.same_as(&retired));
}

#[test]
fn test_nested_requests_settle_before_next_is_shown() {
    let broker = ReadlineBroker::new();
    let token = CancellationManager::new().current_token();

    let mut outer = task::spawn(broker.request("R1 ", &token));
    let mut inner = task::spawn(broker.request("R2 ", &token));
    assert_pending!(outer.poll());
    assert_pending!(inner.poll());
    assert_eq!(broker.active().unwrap().prompt, "R1 ");

    broker.answer("first").unwrap();
    assert!(outer.is_woken());
    assert_eq!(assert_ready!(outer.poll()), Ok("first".to_string()));
    assert_eq!(broker.active().unwrap().prompt, "R2 ");

    broker.answer("second").unwrap();
    assert_eq!(assert_ready!(inner.poll()), Ok("second".to_string()));
}
