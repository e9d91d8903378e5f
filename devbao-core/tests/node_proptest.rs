// Property-based tests for node construction, validation, and snapshots

use devbao_core::{
    persist, ConfigOption, DevConfig, DevbaoError, Listener, Node, Storage,
};
use proptest::prelude::*;
use serde_json::json;
use std::path::Path;

mod common;

fn address_strategy() -> impl Strategy<Value = String> {
    (
        prop_oneof![Just("127.0.0.1"), Just("localhost"), Just("0.0.0.0")],
        1024u16..65000,
    )
        .prop_map(|(host, port)| format!("{}:{}", host, port))
}

fn listener_strategy() -> impl Strategy<Value = Listener> {
    prop_oneof![
        address_strategy().prop_map(|addr| Listener::tcp(addr)),
        address_strategy().prop_map(|addr| Listener::tcp_tls(addr, "/tls/cert.pem", "/tls/key.pem")),
        "[a-z]{1,8}\\.sock".prop_map(|path| Listener::unix(path)),
    ]
}

fn storage_strategy() -> impl Strategy<Value = Storage> {
    prop_oneof![
        Just(Storage::file()),
        "/[a-z]{1,10}".prop_map(|path| Storage::file_at(path)),
        Just(Storage::raft()),
        Just(Storage::inmem()),
    ]
}

fn product_strategy() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just(""), Just("bao"), Just("vault")]
}

fn name_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{0,15}"
}

/// Options with one storage and at least one listener leading with a TCP one
fn prod_options_strategy() -> impl Strategy<Value = Vec<ConfigOption>> {
    (
        address_strategy(),
        prop::collection::vec(listener_strategy(), 0..4),
        storage_strategy(),
        0usize..5,
    )
        .prop_map(|(primary, rest, storage, storage_at)| {
            let mut options: Vec<ConfigOption> = vec![Listener::tcp(primary).into()];
            options.extend(rest.into_iter().map(ConfigOption::from));
            let at = storage_at.min(options.len());
            options.insert(at, storage.into());
            options
        })
}

proptest! {
    #[test]
    fn test_one_storage_and_listener_validates(
        name in name_strategy(),
        product in product_strategy(),
        options in prod_options_strategy(),
    ) {
        let mut node = Node::build(name, product, options).unwrap();
        prop_assert!(node.validate().is_ok());
    }

    #[test]
    fn test_validate_is_idempotent(
        name in prop_oneof![Just(String::new()), name_strategy()],
        options in prod_options_strategy(),
    ) {
        let mut node = Node::build(name, "bao", options).unwrap();
        let before = node.clone();

        prop_assert!(node.validate().is_ok());
        prop_assert_eq!(&node, &before);
        prop_assert!(node.validate().is_ok());
        prop_assert_eq!(&node, &before);
    }

    #[test]
    fn test_dev_only_validates_with_empty_body(
        name in prop_oneof![Just(String::new()), name_strategy()],
        token in proptest::option::of("[a-z]{1,12}"),
        product in product_strategy(),
    ) {
        let dev = DevConfig { token, address: None };
        let node = Node::build(name, product, [dev.into()]).unwrap();

        let body = node.config.to_config(Path::new("/nodes/dev")).unwrap();
        prop_assert!(body.is_empty());
    }

    #[test]
    fn test_dev_with_listeners_and_storage_validates(
        options in prod_options_strategy(),
        dev_at in 0usize..6,
    ) {
        let mut options = options;
        let at = dev_at.min(options.len());
        options.insert(at, DevConfig::default().into());

        let node = Node::build("mixed", "bao", options).unwrap();
        let body = node.config.to_config(Path::new("/nodes/mixed")).unwrap();
        prop_assert!(body.is_empty());
    }

    #[test]
    fn test_missing_storage_is_configuration_error(
        listeners in prop::collection::vec(listener_strategy(), 0..4),
    ) {
        let options: Vec<ConfigOption> = listeners.into_iter().map(ConfigOption::from).collect();
        let err = Node::build("nostore", "vault", options).unwrap_err();
        prop_assert!(err.is_configuration());
    }

    #[test]
    fn test_unknown_option_reports_index(
        valid_before in 0usize..6,
        bogus_key in "[a-z]{3,10}".prop_filter("not a known option", |k| {
            !matches!(k.as_str(), "listener" | "storage" | "dev")
        }),
    ) {
        let mut values = vec![json!({"storage": {"type": "file"}})];
        for i in 0..valid_before {
            values.push(json!({"listener": {"type": "tcp", "address": format!("127.0.0.1:{}", 8200 + i)}}));
        }
        let mut bogus = serde_json::Map::new();
        bogus.insert(bogus_key, json!({"type": "tcp"}));
        values.push(serde_json::Value::Object(bogus));
        let index = values.len() - 1;

        match Node::build_from_values("n1", "bao", &values) {
            Err(DevbaoError::UnknownOption { index: reported, .. }) => prop_assert_eq!(reported, index),
            other => prop_assert!(false, "expected unknown option, got {:?}", other.map(|n| n.name)),
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn test_snapshot_round_trip(
        name in name_strategy(),
        product in product_strategy(),
        options in prod_options_strategy(),
        pid in 0u32..100_000,
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        let (_temp, layout) = common::temp_layout();

        let mut node = Node::build(name.clone(), product, options).unwrap();
        let directory = node.directory(&layout);
        let mut exec = devbao_core::ExecEnvironment::new(
            vec!["server".to_string()],
            directory.clone(),
            "127.0.0.1:8200".to_string(),
        );
        if pid != 0 {
            exec.mark_started(pid);
        }
        node.exec = Some(exec);

        let loaded = runtime.block_on(async {
            tokio::fs::create_dir_all(&directory).await.unwrap();
            persist::save_snapshot(&layout, &node).await.unwrap();
            Node::load(&layout, &name).await.unwrap()
        });

        prop_assert_eq!(loaded, node);
    }
}
