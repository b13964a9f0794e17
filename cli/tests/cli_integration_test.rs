use std::fs;
use std::path::PathBuf;
use std::process::Command;

fn create_test_file(name: &str, content: &[u8]) -> PathBuf {
    let tmp_dir = PathBuf::from("tmp");
    fs::create_dir_all(&tmp_dir).ok();
    let path = tmp_dir.join(name);
    fs::write(&path, content).expect("Failed to write test file");
    path
}

fn run_heywifi(args: &[&str]) -> (String, bool) {
    let output = Command::new(env!("CARGO_BIN_EXE_heywifi"))
        .args(args)
        .output()
        .expect("Failed to execute heywifi");

    let text = String::from_utf8_lossy(&output.stderr).to_string()
        + &String::from_utf8_lossy(&output.stdout);
    (text, output.status.success())
}

#[test]
fn test_inspect_prints_fields_and_masks_password() {
    // ssid "ABC", password "hunter2", channel 1
    let mut payload = vec![3u8];
    payload.extend_from_slice(b"ABC");
    payload.push(7);
    payload.extend_from_slice(b"hunter2");
    payload.extend_from_slice(&[0x01, 0x00]);
    let path = create_test_file("test_inspect_payload.bin", &payload);

    let (output, ok) = run_heywifi(&["inspect", path.to_str().unwrap()]);

    assert!(ok, "inspect should succeed but got: {}", output);
    assert!(output.contains("ABC"), "SSID missing from: {}", output);
    assert!(output.contains("channel:  1"), "channel missing from: {}", output);
    // The password itself must never be printed.
    assert!(!output.contains("hunter2"), "password leaked in: {}", output);
    assert!(output.contains("*******"), "mask missing from: {}", output);
}

#[test]
fn test_inspect_rejects_truncated_payload() {
    let payload = create_test_file("test_inspect_truncated.bin", &[9, 1]);

    let (output, ok) = run_heywifi(&["inspect", payload.to_str().unwrap()]);

    assert!(!ok, "inspect should fail on a truncated payload");
    assert!(
        output.contains("TruncatedFrame"),
        "expected a truncation error but got: {}",
        output
    );
}

#[test]
fn test_run_fails_fast_on_missing_profiles_file() {
    let (output, ok) = run_heywifi(&["run", "--profiles", "tmp/does_not_exist.json"]);

    assert!(!ok, "run should fail without a profiles file");
    assert!(
        output.contains("ProfilesNotFound"),
        "expected a profiles error but got: {}",
        output
    );
}

#[test]
fn test_run_fails_fast_on_unsupported_bit_depth() {
    // Config validation happens before any worker or modem process starts,
    // so a present profiles file plus a bad bit depth must fail cleanly.
    let profiles = create_test_file("test_profiles.json", b"{}");

    let (output, ok) = run_heywifi(&[
        "run",
        "--profiles",
        profiles.to_str().unwrap(),
        "--bits-per-sample",
        "24",
    ]);

    assert!(!ok, "run should reject 24 bits per sample");
    assert!(
        output.contains("UnsupportedBitDepth"),
        "expected a bit-depth error but got: {}",
        output
    );
}
