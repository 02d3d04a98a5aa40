use kapua_broker::{BrokerError, broker_ip_resolver, registered_resolvers};
use kapua_config::BrokerSettings;

fn fixture(name: &str) -> String {
    format!("{}/tests/fixtures/{}", env!("CARGO_MANIFEST_DIR"), name)
}

fn settings(resolver: &str, ip_override: Option<&str>, config_url: Option<String>) -> BrokerSettings {
    BrokerSettings {
        ip_resolver: resolver.to_string(),
        ip_override: ip_override.map(str::to_string),
        config_url,
        ..BrokerSettings::default()
    }
}

#[test]
fn override_only() {
    let resolver = broker_ip_resolver(&settings("default", Some("10.1.1.1"), None)).expect("resolver");
    assert_eq!(resolver.broker_ip_or_host_name().expect("ip"), "10.1.1.1");
}

#[test]
fn config_file_only() {
    let resolver = broker_ip_resolver(&settings(
        "default",
        None,
        Some(fixture("broker.properties")),
    ))
    .expect("resolver");
    assert_eq!(resolver.broker_ip_or_host_name().expect("ip"), "192.168.33.10");
}

#[test]
fn override_wins_over_config_file() {
    let resolver = broker_ip_resolver(&settings(
        "default",
        Some("broker.example.org"),
        Some(format!("file:{}", fixture("broker.properties"))),
    ))
    .expect("resolver");
    assert_eq!(
        resolver.broker_ip_or_host_name().expect("ip"),
        "broker.example.org"
    );
}

#[test]
fn neither_is_an_error() {
    let resolver = broker_ip_resolver(&settings(
        "default",
        Some("  "),
        Some(fixture("no_broker_ip.properties")),
    ))
    .expect("resolver");
    let err = resolver.broker_ip_or_host_name().expect_err("unavailable");
    assert!(matches!(err, BrokerError::BrokerAddressUnavailable));
}

#[test]
fn strategies_are_selected_by_name() {
    assert_eq!(
        registered_resolvers(),
        vec!["default", "environment", "config-file"]
    );
    let environment = broker_ip_resolver(&settings(
        "environment",
        None,
        Some(fixture("broker.properties")),
    ))
    .expect("resolver");
    assert!(environment.broker_ip_or_host_name().is_err());

    let config_file = broker_ip_resolver(&settings(
        "config-file",
        Some("10.1.1.1"),
        Some(fixture("broker.properties")),
    ))
    .expect("resolver");
    assert_eq!(
        config_file.broker_ip_or_host_name().expect("ip"),
        "192.168.33.10"
    );
}

#[test]
fn unknown_strategy_fails_construction() {
    let err = broker_ip_resolver(&settings("kubernetes", None, None)).err().expect("unknown");
    assert!(matches!(err, BrokerError::UnknownResolver(name) if name == "kubernetes"));
}

#[test]
fn unreadable_config_file_fails_construction() {
    let err = broker_ip_resolver(&settings("default", Some("10.1.1.1"), Some("aaa".to_string())))
        .err()
        .expect("unreadable");
    assert!(matches!(err, BrokerError::Config(_)));
}
