//! Behavioural coverage for configuration defaults and validation.

use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};

use stagehand_config::{Config, ConfigError};

#[derive(Default)]
struct Harness {
    config: Option<Config>,
    outcome: Option<Result<(), ConfigError>>,
}

#[fixture]
fn harness() -> Harness {
    Harness::default()
}

fn loaded(harness: &Harness) -> &Config {
    harness
        .config
        .as_ref()
        .unwrap_or_else(|| panic!("configuration was not loaded"))
}

#[given("the default configuration")]
fn given_default(harness: &mut Harness) {
    harness.config = Some(Config::default());
}

#[given("a configuration document overriding the notification timeout to {seconds} seconds")]
fn given_timeout_document(harness: &mut Harness, seconds: u64) {
    let document = format!(r#"{{"notification_timeout_secs": {seconds}}}"#);
    harness.config = Some(parse_document(&document));
}

#[given("a configuration document with a blank log filter")]
fn given_blank_filter_document(harness: &mut Harness) {
    harness.config = Some(parse_document(r#"{"log_filter": " "}"#));
}

fn parse_document(document: &str) -> Config {
    serde_json::from_str(document)
        .unwrap_or_else(|error| panic!("invalid configuration document {document}: {error}"))
}

#[when("the configuration is validated")]
fn when_validated(harness: &mut Harness) {
    let outcome = loaded(harness).validate();
    harness.outcome = Some(outcome);
}

#[then("validation succeeds")]
fn then_succeeds(harness: &mut Harness) {
    match harness.outcome.as_ref() {
        Some(Ok(())) => {}
        other => panic!("expected successful validation, got {other:?}"),
    }
}

#[then("validation fails mentioning {fragment}")]
fn then_fails(harness: &mut Harness, fragment: String) {
    let expected = fragment.trim_matches('"');
    match harness.outcome.as_ref() {
        Some(Err(error)) => assert!(
            error.to_string().contains(expected),
            "expected '{expected}' in '{error}'"
        ),
        other => panic!("expected validation failure, got {other:?}"),
    }
}

#[then("the notification timeout is {seconds} seconds")]
fn then_timeout(harness: &mut Harness, seconds: u64) {
    assert_eq!(loaded(harness).notification_timeout().as_secs(), seconds);
}

#[then("the poll interval is {millis} milliseconds")]
fn then_poll_interval(harness: &mut Harness, millis: u64) {
    let actual = loaded(harness).distribution_poll_interval().as_millis();
    assert_eq!(actual, u128::from(millis));
}

#[scenario(path = "tests/features/config_validation.feature")]
fn config_validation_behaviour(harness: Harness) {
    let _ = harness;
}
