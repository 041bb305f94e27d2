use anyhow::bail;
use anyhow::Result;

use super::run_doctor;
use super::DoctorChecks;
use crate::domain::models::BackendBox;
use crate::domain::models::BackendName;
use crate::infrastructure::backends::gemini::Gemini;

fn checks(token: &str) -> DoctorChecks {
    return DoctorChecks {
        config_file: "/nonexistent/osce/config.toml".to_string(),
        backend: BackendName::Gemini,
        token: token.to_string(),
        model: "model-1".to_string(),
    };
}

#[tokio::test]
async fn it_reports_every_step_when_the_model_is_reachable() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/v1beta/models/model-1")
        .match_header("x-goog-api-key", "AIzaSecret")
        .with_status(200)
        .create();

    let url = server.url();
    let mut steps = vec![];
    run_doctor(
        checks("AIzaSecret"),
        |_| {
            let backend: BackendBox = Box::new(Gemini::new(&url, "AIzaSecret", "model-1", "200"));
            return Ok(backend);
        },
        |step, text| {
            steps.push(format!("STEP {step}: {text}"));
        },
    )
    .await?;

    mock.assert();
    insta::assert_snapshot!(steps.join("\n"), @r###"
    STEP 1: No config file at /nonexistent/osce/config.toml, using defaults and environment
    STEP 2: API key found, starts with AIzaS...
    STEP 3: Backend gemini initialized
    STEP 4: Successfully accessed model model-1. The connection is good!
    "###);

    return Ok(());
}

#[tokio::test]
async fn it_stops_at_step_four_when_the_model_is_unreachable() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/v1beta/models/model-1")
        .match_header("x-goog-api-key", "AIzaSecret")
        .with_status(403)
        .create();

    let url = server.url();
    let mut steps = vec![];
    let res = run_doctor(
        checks("AIzaSecret"),
        |_| {
            let backend: BackendBox = Box::new(Gemini::new(&url, "AIzaSecret", "model-1", "200"));
            return Ok(backend);
        },
        |step, _| {
            steps.push(step);
        },
    )
    .await;

    mock.assert();
    assert_eq!(steps, vec![1, 2, 3]);
    let err = format!("{:#}", res.unwrap_err());
    insta::assert_snapshot!(err, @"STEP 4: Backend is set up but model model-1 could not be reached. This often means the API key is invalid, region restricted, or lacks access to the model: Gemini health check failed with status 403. Check that the API key is valid and has access to model model-1");

    return Ok(());
}

#[tokio::test]
async fn it_stops_at_step_two_without_an_api_key() -> Result<()> {
    let mut built = false;
    let mut steps = vec![];
    let res = run_doctor(
        checks(""),
        |_| {
            built = true;
            bail!("backend should not be built");
        },
        |step, _| {
            steps.push(step);
        },
    )
    .await;

    assert!(!built);
    assert_eq!(steps, vec![1]);
    assert!(res
        .unwrap_err()
        .to_string()
        .starts_with("STEP 2: GEMINI_API_KEY not found."));

    return Ok(());
}

#[tokio::test]
async fn it_stops_at_step_three_when_the_backend_cannot_be_built() -> Result<()> {
    let mut steps = vec![];
    let res = run_doctor(
        checks("AIzaSecret"),
        |_| bail!("Gemini URL is not defined"),
        |step, _| {
            steps.push(step);
        },
    )
    .await;

    assert_eq!(steps, vec![1, 2]);
    insta::assert_snapshot!(res.unwrap_err().to_string(), @"STEP 3: Failed to set up the gemini backend: Gemini URL is not defined");

    return Ok(());
}
