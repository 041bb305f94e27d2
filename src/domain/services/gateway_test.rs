use std::time::Duration;

use anyhow::anyhow;
use anyhow::Result;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::is_transient;
use super::GatewayError;
use super::ModelGateway;
use crate::domain::models::ConversationHistory;
use crate::domain::models::Event;
use crate::domain::models::GenerationConfig;
use crate::domain::models::RetryPolicy;
use crate::infrastructure::backends::scripted::Scripted;

const OVERLOADED: &str = "Failed to make completion request to Gemini, 503: {\"error\":{\"code\":503,\"message\":\"The model is overloaded. Please try again later.\",\"status\":\"UNAVAILABLE\"}}";

fn gateway(backend: &Scripted) -> ModelGateway {
    return ModelGateway::new(Box::new(backend.clone()), RetryPolicy::default());
}

fn history() -> ConversationHistory {
    let mut history = ConversationHistory::seed("You are a patient.");
    history.push_model("I feel sick.");
    return history;
}

fn gaps(backend: &Scripted) -> Vec<Duration> {
    let calls = backend.calls();
    return calls
        .windows(2)
        .map(|pair| {
            return pair[1].at - pair[0].at;
        })
        .collect();
}

mod classification {
    use super::*;

    #[test]
    fn it_recognises_transient_signatures() {
        assert!(is_transient(&anyhow!(OVERLOADED)));
        assert!(is_transient(&anyhow!("The model is OVERLOADED")));
        assert!(is_transient(&anyhow!("429 RESOURCE_EXHAUSTED: quota")));
        assert!(is_transient(&anyhow!("Service Unavailable")));
        assert!(is_transient(&anyhow!("status 503")));
    }

    #[test]
    fn it_rejects_other_errors() {
        assert!(!is_transient(&anyhow!("400 INVALID_ARGUMENT: API key not valid")));
        assert!(!is_transient(&anyhow!("error sending request for url")));
    }

    #[test]
    fn it_inspects_the_whole_error_chain() {
        let err = anyhow!("503 Service Unavailable").context("Feedback request failed");
        assert!(is_transient(&err));
    }
}

mod generate {
    use super::*;

    #[tokio::test]
    async fn it_makes_exactly_one_attempt() -> Result<()> {
        let backend = Scripted::default().fail(OVERLOADED).reply("never used");
        let res = gateway(&backend)
            .generate(&history(), &GenerationConfig::DIALOGUE)
            .await;

        assert!(res.is_err());
        assert_eq!(backend.calls().len(), 1);
        assert_eq!(backend.calls()[0].config, GenerationConfig::DIALOGUE);
        assert_eq!(backend.calls()[0].turns, history().turns().to_vec());

        return Ok(());
    }
}

mod generate_with_retry {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn it_returns_the_first_success() -> Result<()> {
        let (tx, mut rx) = mpsc::unbounded_channel::<Event>();
        let backend = Scripted::default().reply("Well done.");

        let res = gateway(&backend)
            .generate_with_retry(
                &history(),
                &GenerationConfig::FEEDBACK,
                &tx,
                &CancellationToken::new(),
            )
            .await?;

        assert_eq!(res, "Well done.");
        assert_eq!(backend.calls().len(), 1);
        assert!(rx.try_recv().is_err());

        return Ok(());
    }

    #[tokio::test(start_paused = true)]
    async fn it_recovers_from_transient_errors() -> Result<()> {
        let (tx, mut rx) = mpsc::unbounded_channel::<Event>();
        let backend = Scripted::default()
            .fail_times(OVERLOADED, 2)
            .reply("Good consultation.");

        let res = gateway(&backend)
            .generate_with_retry(
                &history(),
                &GenerationConfig::FEEDBACK,
                &tx,
                &CancellationToken::new(),
            )
            .await?;

        assert_eq!(res, "Good consultation.");
        assert_eq!(backend.calls().len(), 3);

        let first = rx.try_recv()?;
        match first {
            Event::Retrying {
                attempt,
                max_retries,
                delay,
                ..
            } => {
                assert_eq!(attempt, 1);
                assert_eq!(max_retries, 5);
                assert!(delay >= Duration::from_secs(1));
                assert!(delay <= Duration::from_millis(1500));
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert!(matches!(rx.try_recv()?, Event::Retrying { attempt: 2, .. }));
        assert!(rx.try_recv().is_err());

        return Ok(());
    }

    #[tokio::test(start_paused = true)]
    async fn it_doubles_the_delay_until_retries_are_exhausted() -> Result<()> {
        let (tx, _rx) = mpsc::unbounded_channel::<Event>();
        let backend = Scripted::default().fail_times(OVERLOADED, 5);

        let res = gateway(&backend)
            .generate_with_retry(
                &history(),
                &GenerationConfig::FEEDBACK,
                &tx,
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(backend.calls().len(), 5);

        let err = res.unwrap_err();
        match err.downcast_ref::<GatewayError>() {
            Some(GatewayError::ExhaustedRetries { retries }) => assert_eq!(*retries, 5),
            _ => panic!("unexpected error {err:?}"),
        }
        assert_eq!(
            err.to_string(),
            "Failed after 5 retries due to persistent model unavailability."
        );

        let gaps = gaps(&backend);
        assert_eq!(gaps.len(), 4);
        for (idx, gap) in gaps.iter().enumerate() {
            let base = Duration::from_secs(1 << idx);
            assert!(*gap >= base, "gap {idx} was {gap:?}");
            assert!(*gap <= base + Duration::from_millis(501), "gap {idx} was {gap:?}");
            if idx > 0 {
                assert!(*gap > gaps[idx - 1]);
            }
        }

        return Ok(());
    }

    #[tokio::test(start_paused = true)]
    async fn it_fails_immediately_on_other_errors() -> Result<()> {
        let (tx, mut rx) = mpsc::unbounded_channel::<Event>();
        let backend = Scripted::default()
            .fail("Failed to make completion request to Gemini, 400: API key not valid")
            .reply("never used");

        let res = gateway(&backend)
            .generate_with_retry(
                &history(),
                &GenerationConfig::FEEDBACK,
                &tx,
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(backend.calls().len(), 1);
        let err = res.unwrap_err();
        assert!(err.downcast_ref::<GatewayError>().is_none());
        assert!(err.to_string().contains("API key not valid"));
        assert!(rx.try_recv().is_err());

        return Ok(());
    }

    #[tokio::test(start_paused = true)]
    async fn it_stops_on_a_fatal_error_after_transient_ones() -> Result<()> {
        let (tx, _rx) = mpsc::unbounded_channel::<Event>();
        let backend = Scripted::default()
            .fail(OVERLOADED)
            .fail("permission denied")
            .reply("never used");

        let res = gateway(&backend)
            .generate_with_retry(
                &history(),
                &GenerationConfig::FEEDBACK,
                &tx,
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(backend.calls().len(), 2);
        assert_eq!(res.unwrap_err().to_string(), "permission denied");

        return Ok(());
    }

    #[tokio::test(start_paused = true)]
    async fn it_honours_the_configured_attempts() -> Result<()> {
        let (tx, _rx) = mpsc::unbounded_channel::<Event>();
        let backend = Scripted::default().fail_times(OVERLOADED, 2);
        let gateway = ModelGateway::new(
            Box::new(backend.clone()),
            RetryPolicy {
                max_retries: 2,
                initial_delay: Duration::from_millis(10),
                ..RetryPolicy::default()
            },
        );

        let res = gateway
            .generate_with_retry(
                &history(),
                &GenerationConfig::FEEDBACK,
                &tx,
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(backend.calls().len(), 2);
        assert!(matches!(
            res.unwrap_err().downcast_ref::<GatewayError>(),
            Some(GatewayError::ExhaustedRetries { retries: 2 })
        ));

        return Ok(());
    }

    #[tokio::test(start_paused = true)]
    async fn it_cancels_while_waiting() -> Result<()> {
        let (tx, _rx) = mpsc::unbounded_channel::<Event>();
        let backend = Scripted::default().fail_times(OVERLOADED, 5);
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let res = gateway(&backend)
            .generate_with_retry(&history(), &GenerationConfig::FEEDBACK, &tx, &cancel)
            .await;

        assert_eq!(backend.calls().len(), 1);
        assert!(matches!(
            res.unwrap_err().downcast_ref::<GatewayError>(),
            Some(GatewayError::Cancelled)
        ));

        return Ok(());
    }

    #[tokio::test(start_paused = true)]
    async fn it_does_not_call_when_already_cancelled() {
        let (tx, _rx) = mpsc::unbounded_channel::<Event>();
        let backend = Scripted::default().reply("never used");
        let cancel = CancellationToken::new();
        cancel.cancel();

        let res = gateway(&backend)
            .generate_with_retry(&history(), &GenerationConfig::FEEDBACK, &tx, &cancel)
            .await;

        assert!(res.is_err());
        assert!(backend.calls().is_empty());
    }
}
