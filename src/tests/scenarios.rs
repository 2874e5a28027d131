//! End-to-end topology scenarios over the shared test network

use super::helpers::*;
use crate::{
    commands::{Command, Query, QueryResult},
    config::TopologyConfig,
    properties::{DirectionConvention, EndKind, JunctionId, LineId, LineKind, RelationKind},
    topology::{relation::tally, TopologyStore},
};
use std::{collections::BTreeMap, sync::Arc, thread};
use test_log::test;

fn counts(pairs: &[(RelationKind, usize)]) -> BTreeMap<RelationKind, usize> {
    pairs.iter().copied().collect()
}

/// A 10-way multi-conduit and a single conduit along cabinet1 -> junction1 -> junction2 -> sdu2:
/// twelve lines in total.
fn trunk_with_twelve_lines(net: &TestNetwork, store: &TopologyStore) -> (LineId, LineId) {
    let multi = place_multi_conduit(store, net.trunk_walk(), 10);
    let single = place_single_conduit(store, net.trunk_walk(), "single");
    (multi, single)
}

#[test]
fn test_relations_along_an_uncut_trunk() {
    let net = TestNetwork::new();
    let store = net.store();
    trunk_with_twelve_lines(&net, &store);

    let at_cabinet = store.relations_at(&net.cabinet1, None).unwrap();
    assert_eq!(tally(&at_cabinet), counts(&[(RelationKind::Outgoing, 12)]));

    let at_junction1 = store.relations_at(&net.junction1, None).unwrap();
    assert_eq!(
        tally(&at_junction1),
        counts(&[(RelationKind::PassThrough, 12)])
    );

    let at_sdu2 = store.relations_at(&net.sdu2, None).unwrap();
    assert_eq!(tally(&at_sdu2), counts(&[(RelationKind::Incoming, 12)]));

    assert!(store.relations_at(&net.sdu1, None).unwrap().is_empty());

    let over = store
        .relations_on_route_segment(&net.junction1_to_junction2, None)
        .unwrap();
    assert_eq!(over.len(), 12);
    assert!(over.iter().all(|r| r.kind == RelationKind::PassThrough));
    assert!(store
        .relations_on_route_segment(&net.junction1_to_sdu1, None)
        .unwrap()
        .is_empty());
}

#[test]
fn test_relations_after_inner_cuts_and_filters() {
    let net = TestNetwork::new();
    let store = net.store();
    let (multi, single) = trunk_with_twelve_lines(&net, &store);
    store.cut(multi, Some(3), net.junction2, None).unwrap();
    store.cut(multi, Some(4), net.junction2, None).unwrap();

    let at_junction2 = store.relations_at(&net.junction2, None).unwrap();
    assert_eq!(
        tally(&at_junction2),
        counts(&[
            (RelationKind::Incoming, 2),
            (RelationKind::Outgoing, 2),
            (RelationKind::PassThrough, 10),
        ])
    );

    // Filter by line id
    let outer_only = store
        .relations_at(&net.junction2, Some(*multi.as_uuid()))
        .unwrap();
    assert_eq!(outer_only.len(), 1);
    assert_eq!(outer_only[0].kind, RelationKind::PassThrough);

    let inner3 = store.inner_conduit(&multi, 3).unwrap();
    let inner3_relations = store
        .relations_at(&net.junction2, Some(*inner3.as_uuid()))
        .unwrap();
    assert_eq!(
        tally(&inner3_relations),
        counts(&[(RelationKind::Incoming, 1), (RelationKind::Outgoing, 1)])
    );

    // Filter by segment id
    let first = store.get_line(&inner3).unwrap().segments[0].id;
    let by_segment = store
        .relations_at(&net.junction2, Some(*first.as_uuid()))
        .unwrap();
    assert_eq!(by_segment.len(), 1);
    assert_eq!(by_segment[0].kind, RelationKind::Incoming);
    assert_eq!(by_segment[0].line, inner3);

    let on_drop = store
        .relations_on_route_segment(&net.junction2_to_sdu2, Some(*single.as_uuid()))
        .unwrap();
    assert_eq!(on_drop.len(), 1);
    assert_eq!(
        store
            .relations_on_route_segment(&net.junction2_to_sdu2, None)
            .unwrap()
            .len(),
        12
    );
}

#[test]
fn test_reversed_direction_convention() {
    let net = TestNetwork::new();
    let store = net.store_with(TopologyConfig {
        direction: DirectionConvention::Reversed,
        ..Default::default()
    });
    trunk_with_twelve_lines(&net, &store);

    assert_eq!(
        tally(&store.relations_at(&net.cabinet1, None).unwrap()),
        counts(&[(RelationKind::Incoming, 12)])
    );
    assert_eq!(
        tally(&store.relations_at(&net.sdu2, None).unwrap()),
        counts(&[(RelationKind::Outgoing, 12)])
    );
}

#[test]
fn test_splice_inner_conduit_to_drop_conduit() {
    let net = TestNetwork::new();
    let store = net.store();
    let multi = LineId::new();
    let drop_conduit = LineId::new();
    let splice = JunctionId::new();
    let commands = vec![
        Command::CreateMultiConduit {
            id: multi,
            walk: net.walk(&[net.cabinet1, net.junction1, net.junction2]),
            inner_conduit_count: Some(6),
            name: "trunk".to_string(),
        },
        Command::CreateLine {
            id: drop_conduit,
            walk: net.walk(&[net.junction2, net.sdu3]),
            kind: LineKind::SingleConduit,
            parent: None,
            sequence_number: None,
            name: "drop".to_string(),
        },
        Command::CutLine {
            line: multi,
            sequence_number: None,
            point: net.junction1,
            expected_version: None,
        },
        Command::ConnectLine {
            line: multi,
            sequence_number: Some(5),
            point: net.junction2,
            end: EndKind::Incoming,
            junction: splice,
            expected_version: None,
        },
        Command::ConnectLine {
            line: drop_conduit,
            sequence_number: None,
            point: net.junction2,
            end: EndKind::Outgoing,
            junction: splice,
            expected_version: None,
        },
    ];
    for command in commands {
        store.execute(command).unwrap();
    }

    let inner5 = match store
        .query(Query::InnerConduit {
            line: multi,
            sequence_number: 5,
        })
        .unwrap()
    {
        QueryResult::LineId(id) => id,
        other => panic!("unexpected {other:?}"),
    };
    let start = store.get_line(&inner5).unwrap().segments[0].id;
    match store.query(Query::Traverse { start }).unwrap() {
        QueryResult::Nodes(nodes) => assert_eq!(nodes.len(), 3),
        other => panic!("unexpected {other:?}"),
    }

    match store
        .query(Query::GetRelationsAt {
            point: net.junction2,
            filter: None,
        })
        .unwrap()
    {
        QueryResult::Relations(relations) => assert_eq!(
            tally(&relations),
            counts(&[(RelationKind::Incoming, 7), (RelationKind::Outgoing, 1)])
        ),
        other => panic!("unexpected {other:?}"),
    }

    // The outer cut at junction1 is invisible to the inner conduit's own segmentation.
    match store
        .query(Query::IsCutAt {
            line: inner5,
            point: net.junction1,
        })
        .unwrap()
    {
        QueryResult::Flag(flag) => assert!(!flag),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_concurrent_writers_on_distinct_and_shared_lines() {
    let net = TestNetwork::new();
    let store = Arc::new(net.store());
    let walk = net.trunk_walk();
    let shared = place_single_conduit(&store, walk, "shared");

    let mut handles = Vec::new();
    for (idx, point) in [net.junction1, net.junction2].into_iter().enumerate() {
        let store = store.clone();
        handles.push(thread::spawn(move || {
            let own = LineId::new();
            store
                .place_line(
                    own,
                    walk,
                    LineKind::SingleConduit,
                    None,
                    None,
                    &format!("worker {idx}"),
                )
                .unwrap();
            store.cut(own, None, point, None).unwrap();
            store.cut(shared, None, point, None).unwrap();
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    let info = store.get_line(&shared).unwrap();
    assert_eq!(info.version, 3);
    assert_eq!(info.segments.len(), 3);
    assert_eq!(
        info.reconstructed_path(),
        vec![net.cabinet1, net.junction1, net.junction2, net.sdu2]
    );
    assert_eq!(store.snapshot().line_count(), 3);
    let fingerprint = store.fingerprint().unwrap();
    assert_eq!(store.reload().unwrap(), fingerprint);
}
