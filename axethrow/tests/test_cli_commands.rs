mod common;

use common::{AxethrowProcess, fixture_path, spawn_command};

#[test]
fn validate_valid_config() {
    let config = fixture_path("game.yaml");
    let output = spawn_command(&["validate", config.to_str().unwrap()]);
    assert!(
        output.status.success(),
        "validate should succeed for valid config: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

#[test]
fn validate_invalid_config() {
    let config = fixture_path("invalid.yaml");
    let output = spawn_command(&["validate", config.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(2));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("targets_per_wave"), "{stdout}");
}

#[test]
fn validate_json_output() {
    let config = fixture_path("game.yaml");
    let output = spawn_command(&["validate", "--format", "json", config.to_str().unwrap()]);
    assert!(output.status.success());

    let parsed: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("output should be valid JSON");
    assert_eq!(parsed[0]["valid"], true);
}

#[test]
fn validate_missing_file() {
    let output = spawn_command(&["validate", "/tmp/nonexistent_axethrow_test_file.yaml"]);
    assert_eq!(output.status.code(), Some(3));
}

#[test]
fn version_json() {
    let output = spawn_command(&["version", "--format", "json"]);
    assert!(output.status.success());
    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(parsed["name"], "axethrow");
}

#[tokio::test]
async fn run_answers_commands_over_stdio() {
    let config = fixture_path("game.yaml");
    let mut process = AxethrowProcess::spawn(&["--config", config.to_str().unwrap()]);

    process
        .send_line(r#"{"type":"command","name":"axethrow_top","speaker":"alice","roles":[]}"#)
        .await;
    let whisper = process.expect_directive("whisper").await;
    assert_eq!(whisper["player"], "alice");
    assert_eq!(whisper["lines"][0], "Nobody has played Axe Throw yet. :(");

    // Uncalibrated: the start trigger explains instead of starting.
    process
        .send_line(
            r#"{"type":"interact","player":"bob","signal":"axethrow_start","position":[0,0,0],"brick_size":[1,1,1]}"#,
        )
        .await;
    let whisper = process.expect_directive("whisper").await;
    assert_eq!(whisper["player"], "bob");
    assert_eq!(whisper["lines"][0], axethrow::session::NOT_SET_UP);

    let status = process.shutdown().await;
    assert!(status.success());
}
