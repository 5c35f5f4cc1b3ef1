use assert_cmd::prelude::*;
use assert_fs::prelude::*;
use predicates::prelude::*;
use std::process::Command;

fn init_demo(dir: &assert_fs::TempDir, ntrace: usize) -> String {
    let session = dir.child("session.json");
    let path = session.path().to_str().unwrap().to_string();
    Command::cargo_bin("tomo_pick_cli")
        .unwrap()
        .args(["init-demo", &path, "--ntrace", &ntrace.to_string()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote demo session"));
    path
}

#[test]
fn info_command() {
    let dir = assert_fs::TempDir::new().unwrap();
    let session = init_demo(&dir, 8);

    Command::cargo_bin("tomo_pick_cli")
        .unwrap()
        .args(["info", &session])
        .assert()
        .success()
        .stdout(predicate::str::contains("Mogs: 1"))
        .stdout(predicate::str::contains("Air shots: 2"))
        .stdout(predicate::str::contains("[0] M01: 4 of 8 picked"));
    dir.close().unwrap();
}

#[test]
fn velocity_command() {
    let dir = assert_fs::TempDir::new().unwrap();
    let session = init_demo(&dir, 8);

    Command::cargo_bin("tomo_pick_cli")
        .unwrap()
        .args(["velocity", &session, "0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Apparent velocity:"))
        .stdout(predicate::str::contains("uncertainty-weighted"));
    dir.close().unwrap();
}

#[test]
fn stats_command() {
    let dir = assert_fs::TempDir::new().unwrap();
    let session = init_demo(&dir, 8);

    Command::cargo_bin("tomo_pick_cli")
        .unwrap()
        .args(["stats", &session, "0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Traces: 8 (4 picked"))
        .stdout(predicate::str::contains("Travel time: mean"))
        .stdout(predicate::str::contains("Velocity: mean"));
    dir.close().unwrap();
}

#[test]
fn next_unpicked_command() {
    let dir = assert_fs::TempDir::new().unwrap();
    let session = init_demo(&dir, 8);

    Command::cargo_bin("tomo_pick_cli")
        .unwrap()
        .args(["next-unpicked", &session, "0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Next unpicked trace: 5"));
    dir.close().unwrap();
}

#[test]
fn import_tt_command() {
    let dir = assert_fs::TempDir::new().unwrap();
    let session = init_demo(&dir, 8);
    let picks = dir.child("picks.dat");
    picks.write_str("8 45.0 0.5\n").unwrap();

    Command::cargo_bin("tomo_pick_cli")
        .unwrap()
        .args(["import-tt", &session, "0", picks.path().to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Imported 1 travel times"));

    Command::cargo_bin("tomo_pick_cli")
        .unwrap()
        .args(["info", &session])
        .assert()
        .success()
        .stdout(predicate::str::contains("5 of 8 picked"));
    dir.close().unwrap();
}

#[test]
fn export_tt_command() {
    let dir = assert_fs::TempDir::new().unwrap();
    let session = init_demo(&dir, 8);
    let output = dir.child("out.dat");

    Command::cargo_bin("tomo_pick_cli")
        .unwrap()
        .args(["export-tt", &session, "0", output.path().to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote 4 picks"));

    output.assert(predicate::path::exists());
    dir.close().unwrap();
}

#[test]
fn correct_command() {
    let dir = assert_fs::TempDir::new().unwrap();
    let session = init_demo(&dir, 8);
    let output = dir.child("corrected.dat");

    Command::cargo_bin("tomo_pick_cli")
        .unwrap()
        .args([
            "correct",
            &session,
            "0",
            "--output",
            output.path().to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Time zero: before"))
        .stdout(predicate::str::contains("corrected travel times"));

    output.assert(predicate::path::exists());
    dir.close().unwrap();
}

#[test]
fn pick_shell_scripted_session() {
    let dir = assert_fs::TempDir::new().unwrap();
    let session = init_demo(&dir, 8);

    assert_cmd::Command::cargo_bin("tomo_pick_cli")
        .unwrap()
        .args(["pick", &session, "0"])
        .write_stdin("trace 5\npick 45.5\nunc 46.0\nstatus\nsave\nquit\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Pick 45.500 on trace 5"))
        .stdout(predicate::str::contains("Uncertainty 0.500 on trace 5"))
        .stdout(predicate::str::contains("5 picked, 3 pending"))
        .stdout(predicate::str::contains("Saved"));

    Command::cargo_bin("tomo_pick_cli")
        .unwrap()
        .args(["info", &session])
        .assert()
        .success()
        .stdout(predicate::str::contains("5 of 8 picked"));
    dir.close().unwrap();
}

#[test]
fn pick_shell_autosaves_on_cadence() {
    let dir = assert_fs::TempDir::new().unwrap();
    let session = init_demo(&dir, 60);

    let mut script = String::new();
    for i in 1..=50 {
        script.push_str(&format!("trace {}\npick 45.0\n", i));
    }
    script.push_str("quit\n");

    assert_cmd::Command::cargo_bin("tomo_pick_cli")
        .unwrap()
        .args(["pick", &session, "0"])
        .write_stdin(script)
        .assert()
        .success()
        .stdout(predicate::str::contains("Autosaved after 50 picks"));

    // quit does not save, so the state on disk is the autosave snapshot
    // taken at the 50th pick.
    Command::cargo_bin("tomo_pick_cli")
        .unwrap()
        .args(["info", &session])
        .assert()
        .success()
        .stdout(predicate::str::contains("50 of 60 picked"));
    dir.close().unwrap();
}

#[test]
fn missing_session_file_fails() {
    Command::cargo_bin("tomo_pick_cli")
        .unwrap()
        .args(["velocity", "/nonexistent/session.json", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error reading"));
}

#[test]
fn import_missing_file_fails() {
    let dir = assert_fs::TempDir::new().unwrap();
    let session = init_demo(&dir, 8);

    Command::cargo_bin("tomo_pick_cli")
        .unwrap()
        .args(["import-tt", &session, "0", "absent_picks"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error importing"));
    dir.close().unwrap();
}
