//! Session controller driven through the reference runtime

use quill::backends::dev::repl::engine::{LineOutcome, SessionState};
use quill::backends::dev::repl::{CommandHandler, CommandResult};
use quill::util::config::ReplConfig;
use quill::{session, Evaluation, Runtime, SessionController, SessionError};

async fn eval(
    controller: &mut SessionController<Runtime>,
    text: &str,
) -> Evaluation {
    controller.evaluate_line(text).await.unwrap()
}

#[tokio::test]
async fn test_bindings_persist_between_statements() {
    let mut controller = session(&ReplConfig::default());

    let first = eval(&mut controller, "set x 10").await;
    assert_eq!(first.output.as_deref(), Some(""));
    assert!(first.logs.is_empty());

    let second = eval(&mut controller, "add x 5").await;
    assert_eq!(second.output.as_deref(), Some("15"));
    assert!(second.logs.is_empty());
    assert_eq!(controller.stats().eval_count, 2);
}

#[tokio::test]
async fn test_syntax_error_skips_reduction() {
    let mut controller = session(&ReplConfig::default());
    let evaluation = eval(&mut controller, "set fib (fun n").await;
    assert_eq!(evaluation.output, None);
    assert!(evaluation.has_errors());
    assert!(controller.bindings().is_empty());
}

#[tokio::test]
async fn test_continuation_lines_join_before_evaluating() {
    let mut controller = session(&ReplConfig::default());

    let outcome = controller.submit_line("set total (add 1 \\").await.unwrap();
    assert_eq!(outcome, LineOutcome::Continuation);
    assert_eq!(controller.state(), SessionState::Buffering);
    assert_eq!(controller.current_prompt(), ".. ");
    assert!(controller.bindings().is_empty());

    let outcome = controller.submit_line("  2)").await.unwrap();
    assert!(matches!(outcome, LineOutcome::Evaluated(ref e) if e.logs.is_empty()));
    assert_eq!(controller.state(), SessionState::Idle);

    let evaluation = eval(&mut controller, "total").await;
    assert_eq!(evaluation.output.as_deref(), Some("3"));
}

#[tokio::test]
async fn test_interrupt_discards_buffered_lines() {
    let mut controller = session(&ReplConfig::default());
    controller.submit_line("print 1 \\").await.unwrap();
    controller.interrupt();
    assert_eq!(controller.state(), SessionState::Idle);

    match controller.submit_line("add 2 2").await.unwrap() {
        LineOutcome::Evaluated(evaluation) => assert_eq!(evaluation.output.as_deref(), Some("4")),
        LineOutcome::Continuation => panic!("expected evaluation"),
    }
}

#[tokio::test]
async fn test_exit_ends_session() {
    let mut controller = session(&ReplConfig::default());
    let evaluation = eval(&mut controller, "print \"bye\"; exit; print \"never\"").await;
    assert!(evaluation.should_exit);
    assert_eq!(evaluation.output.as_deref(), Some("bye"));
    assert_eq!(controller.state(), SessionState::Exited);

    let err = controller.evaluate_line("add 1 1").await.unwrap_err();
    assert!(matches!(err, SessionError::Terminated));
}

#[tokio::test]
async fn test_prompt_follows_config_and_binding() {
    let config = ReplConfig {
        prompt: "q> ".to_string(),
        ..ReplConfig::default()
    };
    let mut controller = session(&config);
    assert_eq!(controller.prompt(), "q> ");
    eval(&mut controller, "set prompt \"λ \"").await;
    assert_eq!(controller.prompt(), "λ ");
}

#[tokio::test]
async fn test_meta_commands_reach_the_session() {
    let mut controller = session(&ReplConfig::default());
    eval(&mut controller, "set greeting \"hi\"").await;

    let listed = CommandHandler::new(&mut controller).handle(":bindings");
    assert_eq!(listed, CommandResult::Output("greeting: \"hi\"".to_string()));

    assert_eq!(
        CommandHandler::new(&mut controller).handle(":reset"),
        CommandResult::Output("Environment reset".to_string())
    );
    assert!(controller.bindings().is_empty());
    assert_eq!(
        CommandHandler::new(&mut controller).handle(":quit"),
        CommandResult::Exit
    );
}

#[tokio::test]
async fn test_deeply_nested_input_is_rejected() {
    let mut controller = session(&ReplConfig::default());
    for depth in [100, 1000, 10_000] {
        let nested = format!("{}1{}", "(".repeat(depth), ")".repeat(depth));
        let evaluation = eval(&mut controller, &nested).await;
        assert_eq!(evaluation.output, None);
        assert_eq!(evaluation.logs.len(), 1);
    }
    assert_eq!(controller.state(), SessionState::Idle);
    assert_eq!(eval(&mut controller, "add 1 2").await.output.as_deref(), Some("3"));
}
