use domain::MessageType;
use kapua_config::ProtocolDescriptorSettings;
use kapua_protocol::{
    DEFAULT_TRANSPORT_PROTOCOL, DescriptorError, DescriptorProvider, MessageClass,
    ProtocolDescriptorRegistry,
};

const NAMES: [Option<&str>; 6] = [
    None,
    Some(""),
    Some("protocol name"),
    Some("name1234567890"),
    Some("protocol!@#$%^&*()_<>/"),
    Some("foo"),
];

fn fixture(name: &str) -> String {
    format!("file:{}/tests/fixtures/{}", env!("CARGO_MANIFEST_DIR"), name)
}

fn build(default_disabled: bool, fixture_name: Option<&str>) -> Result<ProtocolDescriptorRegistry, DescriptorError> {
    let uri = fixture_name.map(fixture);
    let settings = ProtocolDescriptorSettings::new(default_disabled, uri.as_deref());
    ProtocolDescriptorRegistry::from_settings(&settings)
}

#[test]
fn default_descriptor_answers_every_name() {
    let registry = build(false, Some("no_protocols.properties")).expect("registry");
    for name in NAMES {
        let descriptor = registry
            .get_descriptor(name)
            .expect("lookup")
            .expect("descriptor");
        assert_eq!(descriptor.transport_protocol(), DEFAULT_TRANSPORT_PROTOCOL);
    }
}

#[test]
fn default_descriptor_maps_every_message_type() {
    let registry = build(false, None).expect("registry");
    let descriptor = registry.get_descriptor(Some("foo")).unwrap().unwrap();
    for message_type in MessageType::ALL {
        assert_eq!(descriptor.device_class(message_type).unwrap().message_type, message_type);
        assert_eq!(descriptor.kapua_class(message_type).unwrap().message_type, message_type);
    }
}

#[test]
fn disabled_default_without_uri_returns_none() {
    let registry = build(true, None).expect("registry");
    assert!(!registry.has_default());
    for name in NAMES {
        assert!(registry.get_descriptor(name).expect("lookup").is_none());
    }
}

#[test]
fn disabled_default_with_empty_source_returns_none() {
    let registry = build(true, Some("no_protocols.properties")).expect("registry");
    for name in NAMES {
        assert!(registry.get_descriptor(name).expect("lookup").is_none());
    }
}

#[test]
fn configured_source_keeps_default_for_other_names() {
    let registry = build(false, Some("all_names.properties")).expect("registry");
    let amqp = registry.get_descriptor(Some("amqp")).unwrap().unwrap();
    assert_eq!(amqp.transport_protocol(), "AMQP");
    for name in NAMES {
        let descriptor = registry.get_descriptor(name).unwrap().unwrap();
        assert_eq!(descriptor.transport_protocol(), DEFAULT_TRANSPORT_PROTOCOL);
    }
}

#[test]
fn configured_mqtt_maps_app_and_leaves_data_unmapped() {
    let registry = build(true, Some("mqtt_app_only.properties")).expect("registry");
    assert!(registry.get_descriptor(Some("foo")).unwrap().is_none());

    let descriptor = registry
        .get_descriptor(Some("mqtt"))
        .expect("lookup")
        .expect("mqtt descriptor");
    assert_eq!(descriptor.transport_protocol(), "MQTT");
    assert_eq!(
        descriptor.device_class(MessageType::App),
        MessageClass::lookup("KuraAppsMessage")
    );
    assert_eq!(
        descriptor.kapua_class(MessageType::App),
        MessageClass::lookup("KapuaAppsMessage")
    );
    assert!(descriptor.device_class(MessageType::Data).is_none());
    assert!(descriptor.kapua_class(MessageType::Data).is_none());
}

#[test]
fn lookup_is_case_sensitive_and_untrimmed() {
    let registry = build(true, Some("mqtt_app_only.properties")).expect("registry");
    assert!(registry.get_descriptor(Some("MQTT")).unwrap().is_none());
    assert!(registry.get_descriptor(Some(" mqtt")).unwrap().is_none());
    assert_eq!(registry.protocols(), vec!["mqtt"]);
}

#[test]
fn unknown_class_fails_only_that_protocol() {
    let registry = build(true, Some("unknown_class.properties")).expect("registry");
    let err = registry.get_descriptor(Some("mqtt")).expect_err("unknown class");
    assert!(matches!(
        err,
        DescriptorError::UnknownMessageClass { ref protocol, ref class_name }
            if protocol == "mqtt" && class_name == "NoSuchAppsMessage"
    ));
    let stomp = registry.get_descriptor(Some("stomp")).unwrap().unwrap();
    assert_eq!(stomp.transport_protocol(), "STOMP");
    for name in NAMES {
        assert!(registry.get_descriptor(name).unwrap().is_none());
    }
}

#[test]
fn class_of_wrong_message_type_fails_lookup() {
    let registry = build(false, Some("mismatched_class.properties")).expect("registry");
    let err = registry.get_descriptor(Some("mqtt")).expect_err("mismatch");
    assert!(matches!(err, DescriptorError::MessageTypeMismatch { .. }));
}

#[test]
fn unreadable_source_fails_construction() {
    assert!(matches!(
        build(false, Some("does-not-exist.properties")),
        Err(DescriptorError::Source(_))
    ));
    let settings = ProtocolDescriptorSettings::new(false, Some("aaa"));
    assert!(ProtocolDescriptorRegistry::from_settings(&settings).is_err());
}

#[test]
fn malformed_sources_fail_construction() {
    for name in [
        "unknown_attribute.properties",
        "missing_transport.properties",
    ] {
        assert!(
            matches!(build(true, Some(name)), Err(DescriptorError::Malformed { .. })),
            "{name} should be malformed"
        );
    }
    assert!(build(true, Some("unparsable.properties")).is_err());
}
