mod common;

use std::process::Command;

use serde_json::Value;

use common::SheetLayout;

fn omr_sheet() -> Command {
    Command::new(env!("CARGO_BIN_EXE_omr-sheet"))
}

#[test]
fn test_missing_argument_is_usage_error() {
    let output = omr_sheet().output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(output.stdout.is_empty());
}

#[test]
fn test_unreadable_image_still_exits_zero() {
    let output = omr_sheet()
        .args(["/no/such/sheet.png", "--no-debug"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let value: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["success"], Value::Bool(false));
    assert_eq!(value["error"], Value::from("Could not read image file"));
}

#[test]
fn test_strict_mode_reports_failure_in_exit_code() {
    let output = omr_sheet()
        .args(["/no/such/sheet.png", "--no-debug", "--strict"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_reads_sheet_and_writes_default_overlay() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("scan.png");
    SheetLayout::bordered().render(&[(2, 2), (4, 0)]).save(&input).unwrap();

    let output = omr_sheet().arg(&input).output().unwrap();
    assert!(output.status.success());

    let value: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["success"], Value::Bool(true));
    assert_eq!(
        value["answers"],
        serde_json::json!(["?", "?", "C", "?", "A"])
    );

    let overlay = dir.path().join("scan_debug.jpg");
    assert!(overlay.exists());
    assert_eq!(value["debug_image"], Value::from(overlay.to_string_lossy().as_ref()));
}

#[test]
fn test_bad_config_file_fails_before_reading() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("omr.toml");
    std::fs::write(&config, "[grid.roi]\ntop = 0.9\nbottom = 0.1\n").unwrap();

    let output = omr_sheet()
        .args(["whatever.png", "--no-debug", "--config"])
        .arg(&config)
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
}

#[test]
fn test_missing_font_still_reads_sheet() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("scan.png");
    SheetLayout::bordered().render(&[(1, 3)]).save(&input).unwrap();

    let output = omr_sheet()
        .arg(&input)
        .args(["--font", "/no/such/font.ttf", "--strict"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let value: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["success"], Value::Bool(true));
    assert_eq!(value["answers"], serde_json::json!(["?", "D", "?", "?", "?"]));
    assert!(dir.path().join("scan_debug.jpg").exists());
}
