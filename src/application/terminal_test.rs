use std::time::Duration;

use tokio::sync::mpsc;

use super::format_conclusion;
use super::format_event;
use super::with_events;
use super::Interrupt;
use super::Interrupts;
use crate::domain::models::EndReason;
use crate::domain::models::Event;

#[test]
fn it_formats_warnings_verbatim() {
    let res = format_event(&Event::Warning("Could not generate text feedback.".to_string()));
    insta::assert_snapshot!(res, @"Could not generate text feedback.");
}

#[test]
fn it_formats_retry_notices() {
    let res = format_event(&Event::Retrying {
        attempt: 2,
        max_retries: 5,
        delay: Duration::from_millis(2250),
        error: "503 UNAVAILABLE".to_string(),
    });
    insta::assert_snapshot!(res, @"Model busy/overloaded. Retrying in 2.25 seconds (attempt 2 of 5)... Error: 503 UNAVAILABLE");
}

#[test]
fn it_formats_conclusions() {
    insta::assert_snapshot!(format_conclusion(EndReason::User), @"--- Pharmacist (You) ended the consultation. Generating feedback... ---");
    insta::assert_snapshot!(format_conclusion(EndReason::Patient), @"--- Consultation concluded by patient. Generating feedback... ---");
}

#[tokio::test]
async fn it_drains_events_while_waiting() {
    let (tx, mut rx) = mpsc::unbounded_channel::<Event>();

    let res = with_events(
        async {
            tx.send(Event::Warning("first".to_string())).unwrap();
            tokio::task::yield_now().await;
            tx.send(Event::Warning("second".to_string())).unwrap();
            return 42;
        },
        &mut rx,
    )
    .await;

    assert_eq!(res, 42);
    assert!(rx.try_recv().is_err());
}

#[test]
fn it_exits_on_interrupt_outside_feedback() {
    let interrupts = Interrupts::default();
    assert_eq!(interrupts.interrupt(), Interrupt::Exit);

    let cancel = interrupts.arm();
    interrupts.disarm();
    assert_eq!(interrupts.interrupt(), Interrupt::Exit);
    assert!(!cancel.is_cancelled());
}

#[test]
fn it_cancels_only_the_current_feedback_run() {
    let interrupts = Interrupts::default();

    let first = interrupts.arm();
    interrupts.disarm();

    let second = interrupts.arm();
    assert_eq!(interrupts.interrupt(), Interrupt::CancelledFeedback);
    assert!(second.is_cancelled());
    assert!(!first.is_cancelled());

    assert_eq!(interrupts.interrupt(), Interrupt::Exit);
}

#[cfg(unix)]
#[tokio::test]
async fn it_keeps_handling_sigint_across_feedback_runs() {
    fn send_sigint() {
        let status = std::process::Command::new("kill")
            .args(["-INT", &std::process::id().to_string()])
            .status()
            .unwrap();
        assert!(status.success());
    }

    let interrupts = Interrupts::default();
    let watcher = interrupts.watch().unwrap();

    for _ in 0..2 {
        let finished = interrupts.arm();
        interrupts.disarm();
        assert!(!finished.is_cancelled());

        let cancel = interrupts.arm();
        send_sigint();
        tokio::time::timeout(Duration::from_secs(5), cancel.cancelled())
            .await
            .unwrap();
        interrupts.disarm();
    }

    watcher.abort();
}
