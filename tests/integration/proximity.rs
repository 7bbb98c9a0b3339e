use crate::*;

/// Two clients ~1.1 km apart with 2 km radii see each other join.
#[tokio::test]
async fn test_nearby_clients_join_each_other() -> Result<()> {
    let server = start_server().await?;
    let mut a = server.client().await?;
    let mut b = server.client().await?;

    let (_, peers) = a.move_to(0.0, 0.0, 2.0).await?;
    assert!(peers.is_empty());

    let (before, peers) = b.move_to(0.0, 0.01, 2.0).await?;
    assert_eq!(before, vec![ServerEvent::PeerJoined(a.id)]);
    assert_eq!(peers, vec![a.id]);

    assert_eq!(a.next_event().await?, ServerEvent::PeerJoined(b.id));

    server.wait_until("one mutual link", |s| s.registry.link_count() == 1).await?;
    server.stop().await
}

/// Within A's radius but outside B's: nobody joins.
#[tokio::test]
async fn test_smaller_radius_blocks_join() -> Result<()> {
    let server = start_server().await?;
    let mut a = server.client().await?;
    let mut b = server.client().await?;

    a.move_to(0.0, 0.0, 2.0).await?;
    let (before, peers) = b.move_to(0.0, 0.01, 0.5).await?;

    assert!(before.is_empty());
    assert!(peers.is_empty());
    a.expect_silence().await?;

    server.stop().await
}

/// Sending the same update twice yields no second join.
#[tokio::test]
async fn test_repeated_update_is_idempotent() -> Result<()> {
    let server = start_server().await?;
    let mut a = server.client().await?;
    let mut b = server.client().await?;

    a.move_to(0.0, 0.0, 2.0).await?;
    b.move_to(0.0, 0.01, 2.0).await?;
    assert_eq!(a.next_event().await?, ServerEvent::PeerJoined(b.id));

    let (before, peers) = b.move_to(0.0, 0.01, 2.0).await?;
    assert!(before.is_empty(), "unexpected events: {before:?}");
    assert_eq!(peers, vec![a.id]);
    a.expect_silence().await?;

    server.stop().await
}

/// Walking out of range produces a leave on both sides.
#[tokio::test]
async fn test_moving_apart_emits_leave() -> Result<()> {
    let server = start_server().await?;
    let mut a = server.client().await?;
    let mut b = server.client().await?;

    a.move_to(0.0, 0.0, 2.0).await?;
    b.move_to(0.0, 0.01, 2.0).await?;
    assert_eq!(a.next_event().await?, ServerEvent::PeerJoined(b.id));

    let (before, peers) = b.move_to(0.0, 0.5, 2.0).await?;
    assert_eq!(before, vec![ServerEvent::PeerLeft(a.id)]);
    assert!(peers.is_empty());
    assert_eq!(a.next_event().await?, ServerEvent::PeerLeft(b.id));

    server.stop().await
}

/// Out-of-bounds radius and bad coordinates are rejected at the door.
#[tokio::test]
async fn test_invalid_location_frames_are_rejected() -> Result<()> {
    let server = start_server().await?;
    let mut a = server.client().await?;

    a.update_location(0.0, 0.0, 50.0).await?;
    match a.next_event().await? {
        ServerEvent::Error { message } => assert!(message.contains("radius"), "{message}"),
        other => panic!("expected error, got {other:?}"),
    }

    a.update_location(123.0, 0.0, 1.0).await?;
    assert!(matches!(a.next_event().await?, ServerEvent::Error { .. }));

    a.send_raw("{ not json").await?;
    assert!(matches!(a.next_event().await?, ServerEvent::Error { .. }));

    // Still usable afterwards.
    let (_, peers) = a.move_to(0.0, 0.0, 1.0).await?;
    assert!(peers.is_empty());
    assert_eq!(server.registry.located_count(), 1);

    server.stop().await
}
