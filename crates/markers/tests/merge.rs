mod common;

use common::{account, at, server, BrokenDatabase};
use markers::{
    config::MarkerConfig, identity::Anonymous, memory::MemoryDatabase,
    server::Server, RequestError,
};
use chrono::{TimeZone, Utc};
use model::{coordinate::Coordinate, marker::LightMarker};
use utility::id::Id;

#[tokio::test]
async fn first_report_becomes_top_level_marker() {
    let server = server();
    let client = server.client(Anonymous);

    let candidate = at(54.3233, 10.1228);
    let stored = client.add_discrete_marker(candidate.clone()).await.unwrap();

    assert_eq!(stored.content, candidate);
    assert_eq!(client.count_markers().await.unwrap(), 1);
}

#[tokio::test]
async fn report_is_attributed_to_authenticated_account() {
    let server = server();
    let client = server.client(account("ada"));

    let stored = client.add_discrete_marker(at(1.0, 1.0)).await.unwrap();

    assert_eq!(stored.content.owner, Some(Id::new("ada".to_owned())));
}

#[tokio::test]
async fn missing_identity_does_not_block_reporting() {
    let server = server();
    let client = server.client(None::<Anonymous>);

    let stored = client.add_discrete_marker(at(1.0, 1.0)).await.unwrap();

    assert!(stored.content.is_anonymous());
    assert_eq!(client.count_markers().await.unwrap(), 1);
}

#[tokio::test]
async fn nearby_report_is_merged_into_existing_marker() {
    let server = server();
    let first = server
        .client(account("ada"))
        .add_discrete_marker(at(54.3233, 10.1228))
        .await
        .unwrap();

    // roughly 11 m north
    let client = server.client(account("bob"));
    let merged = client
        .add_discrete_marker(at(54.3234, 10.1228))
        .await
        .unwrap();

    assert_eq!(merged.id, first.id);
    assert_eq!(merged.content.coordinate, first.content.coordinate);
    assert_eq!(merged.content.owner, Some(Id::new("ada".to_owned())));
    assert_eq!(merged.content.sub_markers.len(), 1);
    let sub_marker = &merged.content.sub_markers[0].content;
    assert_eq!(sub_marker.coordinate, Coordinate::new(54.3234, 10.1228));
    assert_eq!(sub_marker.owner, Some(Id::new("bob".to_owned())));
    assert_eq!(client.count_markers().await.unwrap(), 1);
}

#[tokio::test]
async fn merged_sub_markers_keep_report_order() {
    let server = server();
    let client = server.client(Anonymous);
    let head = client.add_discrete_marker(at(0.0, 0.0)).await.unwrap();

    for (owner, latitude) in [("a", 0.00001), ("b", 0.00002), ("c", 0.00003)] {
        server
            .client(account(owner))
            .add_discrete_marker(at(latitude, 0.0))
            .await
            .unwrap();
    }

    let stored = client.get_marker(head.id).await.unwrap();
    let owners = stored
        .content
        .sub_markers
        .iter()
        .map(|marker| marker.content.owner.clone().map(|id| id.raw()))
        .collect::<Vec<_>>();
    assert_eq!(
        owners,
        vec![Some("a".to_owned()), Some("b".to_owned()), Some("c".to_owned())]
    );
}

#[tokio::test]
async fn merged_report_keeps_its_own_timestamp() {
    let server = server();
    let client = server.client(Anonymous);
    let first_seen = Utc.with_ymd_and_hms(2024, 8, 1, 20, 0, 0).unwrap();
    let second_seen = Utc.with_ymd_and_hms(2024, 8, 1, 21, 30, 0).unwrap();

    client
        .add_discrete_marker(LightMarker::reported_at(
            Coordinate::new(0.0, 0.0),
            first_seen,
        ))
        .await
        .unwrap();
    let merged = client
        .add_discrete_marker(LightMarker::reported_at(
            Coordinate::new(0.0, 0.0),
            second_seen,
        ))
        .await
        .unwrap();

    assert_eq!(merged.content.reported_at, first_seen);
    assert_eq!(merged.content.sub_markers[0].content.reported_at, second_seen);
}

#[tokio::test]
async fn report_beyond_merge_distance_creates_new_marker() {
    let server = server();
    let client = server.client(Anonymous);
    client.add_discrete_marker(at(54.3233, 10.1228)).await.unwrap();

    // roughly 33 m north, default merge distance is 25 m
    let second = client
        .add_discrete_marker(at(54.3236, 10.1228))
        .await
        .unwrap();

    assert!(!second.content.is_cluster());
    assert_eq!(client.count_markers().await.unwrap(), 2);
}

#[tokio::test]
async fn merge_distance_is_configurable() {
    let server = Server::new(
        MemoryDatabase::new(),
        MarkerConfig {
            merge_distance_km: 0.05,
        },
    );
    let client = server.client(Anonymous);
    client.add_discrete_marker(at(54.3233, 10.1228)).await.unwrap();
    let merged = client
        .add_discrete_marker(at(54.3236, 10.1228))
        .await
        .unwrap();

    assert_eq!(merged.content.sub_markers.len(), 1);
    assert_eq!(client.count_markers().await.unwrap(), 1);
}

#[tokio::test]
async fn report_merges_into_the_closest_marker() {
    let server = Server::new(
        MemoryDatabase::new(),
        MarkerConfig {
            merge_distance_km: 1.0,
        },
    );
    let client = server.client(Anonymous);
    let far = client.add_discrete_marker(at(0.0, 0.0)).await.unwrap();
    // more than 1 km away from `far`, so it does not merge
    let near = client.add_discrete_marker(at(0.0, 0.012)).await.unwrap();
    assert_ne!(far.id, near.id);

    let merged = client.add_discrete_marker(at(0.0, 0.008)).await.unwrap();
    assert_eq!(merged.id, near.id);
}

#[tokio::test]
async fn concurrent_reports_at_one_spot_form_a_single_cluster() {
    let server = server();
    let reports = (0..16).map(|i| {
        let client = server.client(account(&format!("user{i}")));
        tokio::spawn(async move { client.add_discrete_marker(at(10.0, 20.0)).await })
    });

    for report in futures::future::join_all(reports).await {
        report.unwrap().unwrap();
    }

    let client = server.client(Anonymous);
    assert_eq!(client.count_markers().await.unwrap(), 1);
    let markers = client
        .find_nearby(Coordinate::new(10.0, 20.0), 0.001)
        .await
        .unwrap();
    assert_eq!(markers.len(), 1);
    assert_eq!(markers[0].content.content.sightings(), 16);
}

#[tokio::test]
async fn fresh_report_can_not_bring_its_own_sub_markers() {
    let server = server();
    let client = server.client(Anonymous);
    let head = client.add_discrete_marker(at(5.0, 5.0)).await.unwrap();

    let mut candidate = at(50.0, 5.0);
    candidate.add_sub_marker(head.clone());
    let stored = client.add_discrete_marker(candidate).await.unwrap();

    assert!(!stored.content.is_cluster());
}

#[tokio::test]
async fn storage_failures_are_propagated() {
    common::init_logging();
    let server = Server::new(BrokenDatabase, MarkerConfig::default());
    let client = server.client(account("ada"));

    let result = client.add_discrete_marker(at(1.0, 1.0)).await;

    match result {
        Err(RequestError::Other(why)) => {
            assert_eq!(why.to_string(), "storage unavailable")
        }
        other => panic!("expected storage failure, got {:?}", other),
    }
}

#[tokio::test]
async fn unknown_marker_is_not_found() {
    let server = server();
    let result = server
        .client(Anonymous)
        .get_marker(Id::new("nope".to_owned()))
        .await;

    assert!(matches!(result, Err(RequestError::NotFound)));
}

#[tokio::test]
async fn report_across_the_antimeridian_is_merged() {
    let server = server();
    let client = server.client(Anonymous);
    let east = client
        .add_discrete_marker(at(0.0, 179.99995))
        .await
        .unwrap();

    // roughly 11 m west, on the other side of the date line
    let merged = client
        .add_discrete_marker(at(0.0, -179.99995))
        .await
        .unwrap();

    assert_eq!(merged.id, east.id);
    assert_eq!(client.count_markers().await.unwrap(), 1);
}
