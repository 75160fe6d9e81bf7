//! Malformed configuration stops loading instead of silently using defaults.

mod support;

use std::ffi::OsString;
use std::fs;

use rstest::rstest;
use tempfile::TempDir;

use oncam_config::Config;
use ortho_config::OrthoConfig;
use support::EnvGuard;

#[rstest]
#[case::broken_toml("daemon_socket = { transport = \"tcp\" host = \"127.0.0.1\" }")]
#[case::wrong_type("discovery_interval_secs = \"soon\"")]
#[case::bad_scheme("daemon_socket = \"udp://127.0.0.1:9000\"")]
fn malformed_file_is_rejected(#[case] body: &str) {
    let mut env = EnvGuard::acquire();
    env.clear("ONCAM_CONFIG_PATH");
    env.clear("ONCAM_DAEMON_SOCKET");

    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("oncam.toml");
    fs::write(&path, body).expect("write configuration file");

    let args = vec![
        OsString::from("oncamd"),
        OsString::from("--config-path"),
        path.into_os_string(),
    ];
    let error = Config::load_from_iter(args).expect_err("loading must fail");
    assert!(!error.to_string().is_empty());
}

#[rstest]
fn malformed_environment_socket_is_rejected() {
    let mut env = EnvGuard::acquire();
    env.clear("ONCAM_CONFIG_PATH");
    env.set("ONCAM_DAEMON_SOCKET", "carrier-pigeon://loft");

    let error = Config::load_from_iter([OsString::from("oncamd")])
        .expect_err("loading must fail");
    assert!(!error.to_string().is_empty());
}
