use std::process::{Command, Output};

fn netsweep(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_netsweep"))
        .args(args)
        .env_remove("NETSWEEP_LOG")
        .output()
        .expect("spawn netsweep")
}

#[test]
fn invalid_cidr_exits_non_zero_with_reason_on_stderr() {
    let out = netsweep(&["not-a-cidr"]);
    assert!(!out.status.success());
    assert_ne!(out.status.code(), Some(130));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("Invalid CIDR notation"), "stderr: {stderr}");
    assert!(out.stdout.is_empty());
}

#[test]
fn out_of_range_concurrency_is_a_usage_error() {
    let out = netsweep(&["10.0.0.0/30", "--concurrency", "999999999999"]);
    assert_eq!(out.status.code(), Some(2));
    assert!(out.stdout.is_empty());
}
