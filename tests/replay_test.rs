//! Integration tests for the persisted event log: a store reopened over the same log and the
//! same route network must rebuild an identical projection.

mod common;

use common::{init_logging, write_street_network, StreetNetwork};
use ospnet_core::{
    commands::Command,
    config::{ConfigProvider, TomlConfigProvider, TopologyConfig},
    eventlog::{EventStore, FileEventStore},
    properties::{DirectionConvention, EndKind, JunctionId, LineId, LineKind, RelationKind},
    route::InMemoryRouteNetwork,
    topology::TopologyStore,
    TopologyError,
};
use std::sync::Arc;
use tempfile::TempDir;

fn street_commands(
    net: &StreetNetwork,
    multi: LineId,
    drop: LineId,
    splice: JunctionId,
) -> Vec<Command> {
    vec![
        Command::CreateMultiConduit {
            id: multi,
            walk: net.trunk,
            inner_conduit_count: Some(4),
            name: "trunk".to_string(),
        },
        Command::CreateLine {
            id: drop,
            walk: net.drop,
            kind: LineKind::SingleConduit,
            parent: None,
            sequence_number: None,
            name: "house 2 drop".to_string(),
        },
        Command::CutLine {
            line: multi,
            sequence_number: Some(2),
            point: net.handhole,
            expected_version: None,
        },
        Command::ConnectLine {
            line: multi,
            sequence_number: Some(2),
            point: net.handhole,
            end: EndKind::Incoming,
            junction: splice,
            expected_version: None,
        },
        Command::ConnectLine {
            line: drop,
            sequence_number: None,
            point: net.handhole,
            end: EndKind::Outgoing,
            junction: splice,
            expected_version: None,
        },
    ]
}

#[test]
fn test_reopened_store_rebuilds_identical_projection() {
    init_logging();
    let temp_dir = TempDir::new().unwrap();
    let (network_path, net) = write_street_network(&temp_dir);
    let config = TopologyConfig {
        event_log: Some(temp_dir.path().join("events.jsonl")),
        ..Default::default()
    };

    let (multi, drop) = (LineId::new(), LineId::new());
    let (fingerprint, relations) = {
        let network = Arc::new(InMemoryRouteNetwork::load(&network_path).unwrap());
        let store = TopologyStore::new(network, config.clone()).unwrap();
        for command in street_commands(&net, multi, drop, JunctionId::new()) {
            store.execute(command).unwrap();
        }
        (
            store.fingerprint().unwrap(),
            store.relations_at(&net.handhole, None).unwrap(),
        )
    };

    let network = Arc::new(InMemoryRouteNetwork::load(&network_path).unwrap());
    let reopened = TopologyStore::new(network, config).unwrap();
    assert_eq!(reopened.fingerprint().unwrap(), fingerprint);
    assert_eq!(
        reopened.relations_at(&net.handhole, None).unwrap(),
        relations
    );

    let inner2 = reopened.inner_conduit(&multi, 2).unwrap();
    assert_eq!(reopened.stream_version(&inner2), 3);
    assert!(reopened.is_cut_at(&inner2, &net.handhole).unwrap());
    let start = reopened.get_line(&inner2).unwrap().segments[0].id;
    assert_eq!(reopened.traverse(&start).unwrap().len(), 3);

    // Reloading from the same log is idempotent as well
    assert_eq!(reopened.reload().unwrap(), fingerprint);
    assert_eq!(reopened.clean().unwrap(), fingerprint);
}

#[test]
fn test_persisted_log_continues_after_reopen() {
    init_logging();
    let temp_dir = TempDir::new().unwrap();
    let (network_path, net) = write_street_network(&temp_dir);
    let log_path = temp_dir.path().join("events.jsonl");
    let config = TopologyConfig {
        event_log: Some(log_path.clone()),
        ..Default::default()
    };
    let network = Arc::new(InMemoryRouteNetwork::load(&network_path).unwrap());

    let line = LineId::new();
    {
        let store = TopologyStore::new(network.clone(), config.clone()).unwrap();
        store
            .place_line(line, net.trunk, LineKind::SingleConduit, None, None, "spare")
            .unwrap();
    }

    let store = TopologyStore::new(network, config).unwrap();
    // A writer that still believes the line is at version 0 loses.
    let err = store.cut(line, None, net.handhole, Some(0)).unwrap_err();
    assert!(matches!(err, TopologyError::Conflict(_)));
    let applied = store.cut(line, None, net.handhole, Some(1)).unwrap();
    assert_eq!(applied.version, 2);
    drop(store);

    let log = FileEventStore::open(&log_path).unwrap();
    assert_eq!(log.stream_version(&line), 2);
    let records = log.records().unwrap();
    assert_eq!(records.len(), 2);
    assert!(records.windows(2).all(|w| w[0].position < w[1].position));
}

#[test]
fn test_command_lines_replay_into_fresh_store() {
    init_logging();
    let temp_dir = TempDir::new().unwrap();
    let (network_path, net) = write_street_network(&temp_dir);
    let network = Arc::new(InMemoryRouteNetwork::load(&network_path).unwrap());

    let (multi, drop, splice) = (LineId::new(), LineId::new(), JunctionId::new());
    let script: String = street_commands(&net, multi, drop, splice)
        .iter()
        .map(|c| serde_json::to_string(c).unwrap() + "\n")
        .collect();

    let direct = TopologyStore::new(network.clone(), TopologyConfig::default()).unwrap();
    for command in street_commands(&net, multi, drop, splice) {
        direct.execute(command).unwrap();
    }

    let replayed = TopologyStore::new(network, TopologyConfig::default()).unwrap();
    for line in script.lines() {
        let command: Command = serde_json::from_str(line).unwrap();
        replayed.execute(command).unwrap();
    }

    // Same ids and same order give the same projection.
    assert_eq!(
        replayed.fingerprint().unwrap(),
        direct.fingerprint().unwrap()
    );
    let kinds: Vec<RelationKind> = replayed
        .relations_at(&net.handhole, Some(*drop.as_uuid()))
        .unwrap()
        .into_iter()
        .map(|r| r.kind)
        .collect();
    assert_eq!(kinds, vec![RelationKind::Outgoing]);
    assert_eq!(replayed.relations_at(&net.house2, None).unwrap().len(), 1);
    assert_eq!(
        replayed
            .get_junction(&splice, None)
            .unwrap()
            .lines
            .len(),
        2
    );
}

#[test]
fn test_config_file_selects_log_and_direction() {
    init_logging();
    let temp_dir = TempDir::new().unwrap();
    let (network_path, net) = write_street_network(&temp_dir);
    let provider = TomlConfigProvider::new(temp_dir.path().join("ospnet.toml"));
    provider
        .set_config(&TopologyConfig {
            direction: DirectionConvention::Reversed,
            event_log: Some(temp_dir.path().join("events.jsonl")),
            default_inner_conduit_count: 12,
        })
        .unwrap();

    let config = provider.get_config().unwrap();
    assert_eq!(config.default_inner_conduit_count, 12);
    let network = Arc::new(InMemoryRouteNetwork::load(&network_path).unwrap());
    let store = TopologyStore::new(network, config).unwrap();
    store
        .place_line(
            LineId::new(),
            net.trunk,
            LineKind::SingleConduit,
            None,
            None,
            "reversed",
        )
        .unwrap();

    let at_cabinet = store.relations_at(&net.cabinet, None).unwrap();
    assert_eq!(at_cabinet.len(), 1);
    assert_eq!(at_cabinet[0].kind, RelationKind::Incoming);
    let at_house1 = store.relations_at(&net.house1, None).unwrap();
    assert_eq!(at_house1[0].kind, RelationKind::Outgoing);

    // A multi-conduit command without a count takes the configured one
    let multi = LineId::new();
    let applied = store
        .execute(Command::CreateMultiConduit {
            id: multi,
            walk: net.trunk,
            inner_conduit_count: None,
            name: String::new(),
        })
        .unwrap();
    assert_eq!(applied.len(), 13);
    assert!(store.inner_conduit(&multi, 12).is_ok());
    assert!(store.inner_conduit(&multi, 13).is_err());
    assert!(temp_dir.path().join("events.jsonl").exists());
}
