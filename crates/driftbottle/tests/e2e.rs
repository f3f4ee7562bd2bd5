// SPDX-FileCopyrightText: 2026 Driftbottle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests: the binary against a real data directory, and the
//! full routing pipeline through the test harness.

use std::path::Path;
use std::process::{Command, Output};

use driftbottle_core::UserId;
use driftbottle_store::{DeliveryStatus, NextLetter};
use driftbottle_test_utils::{MockReply, TestHarness};

fn driftbottle(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_driftbottle"))
        .args(args)
        .current_dir(dir)
        .env("DRIFTBOTTLE_STORAGE_DATA_DIR", dir.join("data"))
        .env("HOME", dir)
        .env("XDG_CONFIG_HOME", dir.join("xdg"))
        .env_remove("ANTHROPIC_API_KEY")
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

#[test]
fn config_command_prints_effective_toml() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("driftbottle.toml"),
        "[mailbox]\ncooldown_secs = 5\n\n[anthropic]\napi_key = \"sk-hidden\"\n",
    )
    .unwrap();

    let output = driftbottle(dir.path(), &["config"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("cooldown_secs = 5"));
    assert!(!stdout.contains("sk-hidden"));
}

#[test]
fn unknown_config_key_fails_with_suggestion() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("driftbottle.toml"),
        "[mailbox]\ncooldown_sec = 5\n",
    )
    .unwrap();

    let output = driftbottle(dir.path(), &["config"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("cooldown_secs"));
}

#[test]
fn pending_lists_stuck_letters_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("data");
    std::fs::create_dir_all(&data).unwrap();
    let letters = serde_json::json!({
        "l-stuck": {
            "date_sent": "2026-01-02T03:04:05Z",
            "date_received": null,
            "sender_id": "alice",
            "recipient": ["waiting_for_process"],
            "title": "",
            "content": "hello",
            "routing_info": {"reason": "", "chosen_candidate": null, "inferred_tone": null}
        }
    });
    std::fs::write(data.join("letters.json"), letters.to_string()).unwrap();

    let output = driftbottle(dir.path(), &["pending"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("l-stuck"));
    assert!(stdout.contains("waiting_for_process"));
    assert!(stdout.contains("1 unresolved letter(s)"));
}

#[test]
fn pending_on_fresh_directory_heals_files() {
    let dir = tempfile::tempdir().unwrap();

    let output = driftbottle(dir.path(), &["pending"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("no unresolved letters"));
    assert!(dir.path().join("data/users.json").exists());
    assert!(dir.path().join("data/letters.json").exists());
}

#[tokio::test]
async fn letters_survive_cooldown_and_arrive_in_order() {
    let harness = TestHarness::builder()
        .with_cooldown_secs(30)
        .on_disk()
        .build()
        .await
        .unwrap();
    harness.register(&["B"]).await.unwrap();

    let first = harness.send_letter("A", "one", "first bottle").await.unwrap();
    harness.advance_secs(1);
    let second = harness.send_letter("A", "two", "second bottle").await.unwrap();
    assert_eq!(first.status, DeliveryStatus::Delivered);
    assert_eq!(second.status, DeliveryStatus::Delivered);

    let b = UserId::from("B");
    let NextLetter::Letter(view) = harness.registry.fetch_next_unopened(&b).await.unwrap() else {
        panic!("expected the first letter");
    };
    assert_eq!(view.letter_id, first.letter_id);
    harness.registry.mark_opened(&b, &view.letter_id).await.unwrap();

    assert!(matches!(
        harness.registry.fetch_next_unopened(&b).await.unwrap(),
        NextLetter::Cooldown { .. }
    ));
    harness.advance_secs(31);

    let NextLetter::Letter(view) = harness.registry.fetch_next_unopened(&b).await.unwrap() else {
        panic!("expected the second letter");
    };
    assert_eq!(view.letter_id, second.letter_id);
    harness.registry.mark_opened(&b, &view.letter_id).await.unwrap();

    let received = harness.registry.list_received(&b).await.unwrap();
    let ids: Vec<_> = received.iter().map(|v| v.letter_id.clone()).collect();
    assert_eq!(ids, vec![second.letter_id, first.letter_id]);
}

#[tokio::test]
async fn classifier_pipeline_moderates_then_matches() {
    let harness = TestHarness::builder()
        .with_moderation_oracle()
        .with_oracle_matcher()
        .with_mock_replies(vec![
            MockReply::from("no"),
            MockReply::from(r#"{"recipient": "B", "reason": "likes the sea"}"#),
        ])
        .build()
        .await
        .unwrap();
    harness.register(&["A", "B"]).await.unwrap();

    let submission = harness
        .send_letter("A", "Sea", "The waves were loud tonight.")
        .await
        .unwrap();
    assert_eq!(submission.status, DeliveryStatus::Delivered);
    assert_eq!(harness.mock_provider.call_count().await, 2);

    let prompts = harness.mock_provider.prompts().await;
    assert!(prompts[1].contains("id: B"));
    assert!(!prompts[1].contains("id: A"));
}
