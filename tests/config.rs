//! Loading and applying TOML configuration files.

use std::{fs, path::PathBuf, sync::Arc, time::Duration};

use netcondition::{
    InterceptorRegistry,
    ScenarioSession,
    config::{ConfigError, EngineConfig},
};

const CONFIG: &str = r#"
[telemetry]
capacity = 16
environment = "ci"

[[scenarios]]
name = "real-app-caching"

[[routes]]
pattern = "**/api/cached/**"
preset = "cache-miss"
name = "cold-cache"

[[routes]]
pattern = "**/api/payments/**"
base_delay_ms = 250
failure_rate = 0.5
failure_status = 500

[routes.peak]
start_hour = 17
end_hour = 19
failure_rate = 0.9
"#;

struct TempConfig(PathBuf);

impl TempConfig {
    fn write(name: &str, contents: &str) -> Self {
        let path = std::env::temp_dir().join(format!("netcondition-{}-{name}.toml", std::process::id()));
        fs::write(&path, contents).expect("write temp config");
        Self(path)
    }
}

impl Drop for TempConfig {
    fn drop(&mut self) { let _ = fs::remove_file(&self.0); }
}

#[test]
fn loads_and_applies_a_file() {
    let file = TempConfig::write("apply", CONFIG);
    let config = EngineConfig::load(&file.0).expect("config loads");
    assert_eq!(config.telemetry.capacity, 16);
    assert_eq!(config.telemetry.environment, "ci");

    let registry = Arc::new(InterceptorRegistry::new());
    let session = ScenarioSession::new(Arc::clone(&registry), "from-file");
    assert_eq!(config.apply(&session).expect("applies"), 4);
    // The explicit cached route replaced the scenario's entry for the same pattern.
    assert_eq!(registry.len(), 3);

    let cached = registry.resolve_profile("/api/cached/avatar").expect("claimed");
    assert_eq!(cached.name(), "cold-cache");
    assert_eq!(cached.base_delay(), Duration::from_millis(800));

    let payments = registry.resolve_profile("/api/payments/1").expect("claimed");
    assert_eq!(payments.name(), "**/api/payments/**");
    assert_eq!(payments.failure_response().status(), 500);
    let evening = chrono::NaiveTime::from_hms_opt(18, 0, 0).expect("time");
    assert!((payments.failure_rate_at(evening) - 0.9).abs() < f64::EPSILON);

    assert_eq!(session.end(), 3);
    assert!(registry.is_empty());
}

#[test]
fn missing_file_reports_its_path() {
    let path = std::env::temp_dir().join("netcondition-definitely-missing.toml");
    let err = EngineConfig::load(&path).expect_err("file is missing");
    match err {
        ConfigError::Io { path: reported, .. } => assert_eq!(reported, path),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn invalid_route_leaves_registry_untouched() {
    let file = TempConfig::write(
        "invalid",
        r#"
[[scenarios]]
name = "payday-friday"

[[routes]]
pattern = "**/api/**"
preset = "edge"
"#,
    );
    let config = EngineConfig::load(&file.0).expect("parses");
    let registry = Arc::new(InterceptorRegistry::new());
    let session = ScenarioSession::new(Arc::clone(&registry), "broken");

    let err = config.apply(&session).expect_err("unknown preset");
    assert!(matches!(err, ConfigError::Route { index: 0, .. }), "{err}");
    assert!(registry.is_empty());
}

#[test]
fn unknown_keys_are_rejected() {
    let err = EngineConfig::from_toml_str("[[routes]]\npattern = \"**\"\nlatency = 5\n")
        .expect_err("unknown key");
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[tokio::test]
async fn telemetry_section_spawns_udp_emitter() {
    let collector = tokio::net::UdpSocket::bind("127.0.0.1:0").await.expect("bind");
    let endpoint = collector.local_addr().expect("address");
    let config = EngineConfig::from_toml_str(&format!(
        "[telemetry]\nenvironment = \"udp-test\"\nudp_endpoint = \"{endpoint}\"\n"
    ))
    .expect("parses");

    let emitter = config.spawn_telemetry().await.expect("emitter");
    assert_eq!(emitter.environment(), Some("udp-test"));
    emitter.record(netcondition::Measurement::new("heartbeat").field("v", 1_i64));

    let mut buf = [0_u8; 256];
    let len = tokio::time::timeout(Duration::from_secs(2), collector.recv(&mut buf))
        .await
        .expect("datagram arrived")
        .expect("recv");
    let line = std::str::from_utf8(&buf[..len]).expect("utf8");
    assert!(line.starts_with("heartbeat,environment=udp-test v=1i "), "{line}");
}
