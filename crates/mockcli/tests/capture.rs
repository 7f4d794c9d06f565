//! End-to-end capture scenarios.
//!
//! Every test here swaps process-wide state, so all of them are serialized.

use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Duration;

use mockcli::context::context;
use mockcli::{
    cli_eprintln, cli_print, cli_println, is_active, mock_cli, process, Capture, CaptureError,
    CaptureResult, Failure, Param, SharedBuffer, Sink, Source, Substitutes, Trigger,
};
use serial_test::serial;

#[test]
#[serial]
fn test_args_are_mocked_and_restored_on_stop() {
    let before = process::args();

    let session = Capture::new().args(["node", "s", "--x"]).activate().unwrap();
    assert_eq!(process::args(), vec!["node", "s", "--x"]);
    assert!(is_active());

    let result = session.stop().unwrap();

    assert_eq!(process::args(), before);
    assert!(!is_active());
    assert_eq!(result, CaptureResult::new(130, "", "", ""));
}

#[test]
#[serial]
fn test_exit_code_and_output_reach_callback() {
    let exit_before = context().exit_hook();
    let (tx, rx) = mpsc::channel();
    let session = Capture::new()
        .on_complete(move |error, result| {
            tx.send((error.is_none(), result)).unwrap();
        })
        .activate()
        .unwrap();

    let outcome = session
        .run(|| {
            write!(process::stdout(), "Hello, world!")?;
            process::exit(123)
        })
        .unwrap();

    let (no_error, result) = rx.try_recv().unwrap();
    assert!(no_error);
    assert_eq!(result, CaptureResult::new(123, "", "Hello, world!", ""));
    assert_eq!(outcome.trigger, Trigger::Exit);
    assert_eq!(outcome.result, result);
    assert!(!is_active());
    assert!(Arc::ptr_eq(&context().exit_hook(), &exit_before));
}

#[test]
#[serial]
fn test_exit_without_code_is_zero() {
    let session = Capture::new().activate().unwrap();
    let outcome = session.run(|| process::exit(None::<i32>)).unwrap();
    assert_eq!(outcome.result.code, 0);
    assert!(outcome.error.is_none());
}

#[test]
#[serial]
fn test_substitute_stdin_is_read_to_completion() {
    let (tx, rx) = mpsc::channel();
    let session = Capture::new()
        .stdin(Source::bytes("Hello, world!"))
        .on_complete(move |error, result| {
            tx.send((error.is_none(), result)).unwrap();
        })
        .activate()
        .unwrap();

    session
        .run(|| {
            let input = process::stdin().read_all()?;
            assert_eq!(input, "Hello, world!");
            Ok(())
        })
        .unwrap();

    let (no_error, result) = rx.try_recv().unwrap();
    assert!(no_error);
    assert_eq!(result, CaptureResult::new(0, "Hello, world!", "", ""));
}

#[test]
#[serial]
fn test_panic_fails_with_code_one() {
    let exit_before = context().exit_hook();
    let (tx, rx) = mpsc::channel();
    let session = Capture::new()
        .on_complete(move |error, result| {
            tx.send((error, result)).unwrap();
        })
        .activate()
        .unwrap();

    let outcome = session
        .run(|| {
            cli_eprintln!("about to fail");
            panic!("boom");
        })
        .unwrap();

    let (error, result) = rx.try_recv().unwrap();
    let error = error.expect("panic should be reported");
    assert!(error.is_panic());
    assert_eq!(error.message(), "boom");
    assert_eq!(result.code, 1);
    assert_eq!(result.stderr, "about to fail\n");
    assert_eq!(outcome.trigger, Trigger::Failed);
    assert!(!is_active());
    assert!(Arc::ptr_eq(&context().exit_hook(), &exit_before));
}

#[test]
#[serial]
fn test_worker_thread_panic_fails_session() {
    let (tx, rx) = mpsc::channel();
    let session = Capture::new()
        .on_complete(move |error, result| {
            tx.send((error, result)).unwrap();
        })
        .activate()
        .unwrap();

    let outcome = session
        .run(|| {
            let worker = std::thread::spawn(|| panic!("worker lost its connection"));
            // The program ignores how the worker ended.
            let _ = worker.join();
            cli_print!("main done");
            Ok(())
        })
        .unwrap();

    let (error, result) = rx.try_recv().unwrap();
    assert_eq!(error.unwrap().message(), "worker lost its connection");
    assert_eq!(result.code, 1);
    assert_eq!(result.stdout, "main done");
    assert_eq!(outcome.trigger, Trigger::Failed);
    assert!(!is_active());
}

#[test]
#[serial]
fn test_returned_error_fails_with_code_one() {
    let session = Capture::new().activate().unwrap();

    let outcome = session
        .run(|| {
            cli_println!("partial");
            anyhow::bail!("config file missing")
        })
        .unwrap();

    assert_eq!(outcome.trigger, Trigger::Failed);
    assert_eq!(outcome.result.code, 1);
    assert_eq!(outcome.result.stdout, "partial\n");
    match outcome.error {
        Some(Failure::Error(error)) => assert_eq!(error.to_string(), "config file missing"),
        other => panic!("expected returned error, got {:?}", other),
    }
}

#[test]
#[serial]
fn test_second_activation_is_rejected() {
    let first = Capture::new().args(["first"]).activate().unwrap();

    let err = Capture::new().args(["second"]).activate().unwrap_err();
    assert!(matches!(err, CaptureError::AlreadyActive));
    assert_eq!(process::args(), vec!["first"]);

    let err = mock_cli!(vec!["third"]).unwrap_err();
    assert!(matches!(err, CaptureError::AlreadyActive));

    first.stop().unwrap();
}

#[test]
#[serial]
fn test_substitute_sinks_receive_output_exclusively() {
    let out = SharedBuffer::new();
    let err = SharedBuffer::new();
    let session = Capture::new()
        .stdout(Sink::buffer(&out))
        .stderr(Sink::buffer(&err))
        .activate()
        .unwrap();

    let outcome = session
        .run(|| {
            cli_print!("one ");
            cli_print!("two");
            cli_eprintln!("warning: {}", 3);
            process::stdout().flush()?;
            Ok(())
        })
        .unwrap();

    assert_eq!(out.contents(), "one two");
    assert_eq!(err.contents(), "warning: 3\n");
    assert_eq!(outcome.result.stdout, out.contents());
    assert_eq!(outcome.result.stderr, err.contents());
}

#[test]
#[serial]
fn test_stop_after_finish_is_an_error() {
    let session = Capture::new().activate().unwrap();
    let id = session.id();
    session.run(|| Ok(())).unwrap();

    let err = session.stop().unwrap_err();
    assert!(matches!(err, CaptureError::SessionClosed(closed) if closed == id));
}

#[test]
#[serial]
fn test_stop_does_not_call_callback() {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);
    let session = Capture::new()
        .on_complete(move |_, _| {
            seen.fetch_add(1, Ordering::SeqCst);
        })
        .activate()
        .unwrap();

    cli_print!("captured before stop");
    let result = session.stop().unwrap();

    assert_eq!(result.code, 130);
    assert_eq!(result.stdout, "captured before stop");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
#[serial]
fn test_exit_from_another_thread_finalizes_once() {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);
    let session = Capture::new()
        .on_complete(move |_, result| {
            assert_eq!(result.code, 5);
            seen.fetch_add(1, Ordering::SeqCst);
        })
        .activate()
        .unwrap();

    let outcome = session
        .run(|| {
            let worker = std::thread::spawn(|| process::exit(5));
            let joined = worker.join();
            assert!(joined.unwrap_err().is::<mockcli::ExitSignal>());
            Ok(())
        })
        .unwrap();

    assert_eq!(outcome.trigger, Trigger::Exit);
    assert_eq!(outcome.result.code, 5);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
#[serial]
fn test_positional_activation() {
    let (tx, rx) = mpsc::channel();
    let out = SharedBuffer::new();
    let substitutes = Substitutes {
        stdout: Some(Sink::buffer(&out)),
        ..Substitutes::default()
    };

    let session = mock_cli!(
        substitutes,
        Param::on_complete(move |_, result| tx.send(result).unwrap())
    )
    .unwrap();

    let args_during = process::args();
    session
        .run(|| {
            cli_print!("argc={}", process::args().len());
            Ok(())
        })
        .unwrap();

    let result = rx.try_recv().unwrap();
    assert_eq!(result.stdout, format!("argc={}", args_during.len()));
    assert_eq!(out.contents(), result.stdout);

    let err = mock_cli!(Param::Null, vec!["misplaced"], Param::Null).unwrap_err();
    assert!(matches!(err, CaptureError::InvalidParameters(_)));
    assert!(!is_active());
}

#[test]
#[serial]
fn test_result_serializes_to_json() {
    let session = Capture::new().activate().unwrap();
    let outcome = session
        .run(|| {
            cli_print!("{{\"ok\":true}}");
            Ok(())
        })
        .unwrap();

    let json: serde_json::Value = serde_json::from_str(&outcome.result.to_json().unwrap()).unwrap();
    assert_eq!(json["code"], 0);
    assert_eq!(json["stdout"], "{\"ok\":true}");
}

#[tokio::test]
#[serial]
async fn test_async_program_drains_after_spawned_tasks() {
    let session = Capture::new().activate().unwrap();

    let outcome = session
        .run_async(|| async {
            tokio::task::spawn_local(async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                cli_print!("late");
            });
            cli_print!("early ");
            anyhow::Ok(())
        })
        .await
        .unwrap();

    assert_eq!(outcome.trigger, Trigger::Drained);
    assert_eq!(outcome.result.stdout, "early late");
    assert_eq!(outcome.result.code, 0);
}

#[tokio::test]
#[serial]
async fn test_async_exit_in_spawned_task() {
    let session = Capture::new().activate().unwrap();

    let outcome = session
        .run_async(|| async {
            tokio::task::spawn_local(async {
                tokio::task::yield_now().await;
                process::exit(7);
            });
            anyhow::Ok(())
        })
        .await
        .unwrap();

    assert_eq!(outcome.trigger, Trigger::Exit);
    assert_eq!(outcome.result.code, 7);
    assert!(!is_active());
}

#[tokio::test]
#[serial]
async fn test_async_panicking_task_fails_session() {
    let session = Capture::new().activate().unwrap();

    let outcome = session
        .run_async(|| async {
            tokio::task::spawn_local(async {
                tokio::task::yield_now().await;
                panic!("task hit a bad record");
            });
            cli_print!("scheduled");
            anyhow::Ok(())
        })
        .await
        .unwrap();

    assert_eq!(outcome.trigger, Trigger::Failed);
    assert_eq!(outcome.result.code, 1);
    assert_eq!(outcome.result.stdout, "scheduled");
    let error = outcome.error.unwrap();
    assert!(error.is_panic());
    assert_eq!(error.message(), "task hit a bad record");
    assert!(!is_active());
}

async fn reject_input() -> anyhow::Result<()> {
    let input = process::stdin().read_all()?;
    anyhow::bail!("unsupported input {:?}", input)
}

#[tokio::test]
#[serial]
async fn test_async_error_fails_session() {
    let session = Capture::new().stdin(Source::bytes("x")).activate().unwrap();

    let outcome = session
        .run_async(reject_input)
        .await
        .unwrap();

    assert_eq!(outcome.trigger, Trigger::Failed);
    assert_eq!(outcome.result.code, 1);
    assert_eq!(outcome.result.stdin, "x");
    assert_eq!(outcome.error.unwrap().message(), "unsupported input \"x\"");
}
