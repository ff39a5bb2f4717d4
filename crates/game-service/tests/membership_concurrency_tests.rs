//! Concurrent join tests.
//!
//! Many users join the same game at once; exactly one may become the
//! opponent. The store's read is slowed down to widen the window between
//! read and write, and the last-writer-wins store variant removes the
//! store-level guard so the per-game lock alone is exercised. Coordinators
//! sharing one store and one cache stand in for separate service instances.

// Test code is allowed to use expect/unwrap for assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use common::types::{GameId, UserId};
use futures::future::join_all;
use game_service::cache::mock::MockSessionCache;
use game_service::models::{NewGameSession, Permission};
use game_service::repositories::MockSessionStore;
use game_service::services::{MembershipCoordinator, MockEventPublisher};
use game_test_utils::TestGameServer;
use std::sync::Arc;
use std::time::Duration;

struct Harness {
    store: Arc<MockSessionStore>,
    cache: Arc<MockSessionCache>,
    publisher: Arc<MockEventPublisher>,
    coordinator: Arc<MembershipCoordinator>,
}

fn harness(store: MockSessionStore) -> Harness {
    let store = Arc::new(store);
    let cache = Arc::new(MockSessionCache::new());
    let publisher = Arc::new(MockEventPublisher::accepting());
    let coordinator = Arc::new(MembershipCoordinator::new(
        store.clone(),
        cache.clone(),
        publisher.clone(),
        Duration::from_secs(10),
        Duration::from_secs(10),
    ));
    Harness {
        store,
        cache,
        publisher,
        coordinator,
    }
}

async fn new_game(h: &Harness) -> GameId {
    h.coordinator
        .create_game(NewGameSession {
            owner_user_id: UserId::from("u1"),
        })
        .await
        .unwrap()
        .id
}

async fn join_many(h: &Harness, game_id: GameId, users: &[String]) -> Vec<Permission> {
    let handles = users.iter().map(|u| {
        let coordinator = Arc::clone(&h.coordinator);
        let user = UserId::from(u.as_str());
        tokio::spawn(async move { coordinator.join(game_id, user).await })
    });

    join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap().permission)
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_two_simultaneous_joins_yield_one_opponent() {
    let h = harness(MockSessionStore::last_writer_wins().with_read_delay(Duration::from_millis(20)));
    let game_id = new_game(&h).await;

    let users = vec!["u2".to_string(), "u3".to_string()];
    let permissions = join_many(&h, game_id, &users).await;

    let writers = permissions
        .iter()
        .filter(|p| **p == Permission::ReadWrite)
        .count();
    assert_eq!(writers, 1);

    let opponent = h.store.get(game_id).unwrap().opponent_user_id.unwrap();
    let snapshot = h.cache.peek(game_id).await.unwrap();
    assert_eq!(snapshot.game_opponent_user_id.as_ref(), Some(&opponent));
    assert_eq!(snapshot.spectators.len(), 1);
    assert!(!snapshot.spectators.contains(&opponent));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_many_simultaneous_joins_yield_one_opponent() {
    let h = harness(MockSessionStore::last_writer_wins().with_read_delay(Duration::from_millis(5)));
    let game_id = new_game(&h).await;

    let users: Vec<String> = (2..=21).map(|i| format!("u{i}")).collect();
    let permissions = join_many(&h, game_id, &users).await;

    assert_eq!(
        permissions
            .iter()
            .filter(|p| **p == Permission::ReadWrite)
            .count(),
        1
    );
    assert_eq!(h.store.update_count(), 1, "only the winner writes the store");

    let snapshot = h.cache.peek(game_id).await.unwrap();
    assert_eq!(snapshot.spectators.len(), users.len() - 1);
    assert_eq!(h.publisher.call_count(), users.len());

    let read_write_events = h
        .publisher
        .events()
        .into_iter()
        .filter(|(_, e)| e.permission == Permission::ReadWrite)
        .count();
    assert_eq!(read_write_events, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_joins_on_different_games_are_independent() {
    let h = harness(MockSessionStore::new().with_read_delay(Duration::from_millis(10)));
    let first = new_game(&h).await;
    let second = new_game(&h).await;

    let a = {
        let c = Arc::clone(&h.coordinator);
        tokio::spawn(async move { c.join(first, UserId::from("u2")).await })
    };
    let b = {
        let c = Arc::clone(&h.coordinator);
        tokio::spawn(async move { c.join(second, UserId::from("u3")).await })
    };

    assert_eq!(a.await.unwrap().unwrap().permission, Permission::ReadWrite);
    assert_eq!(b.await.unwrap().unwrap().permission, Permission::ReadWrite);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_http_joins_yield_one_opponent() -> anyhow::Result<()> {
    let server = TestGameServer::spawn_with(
        MockSessionStore::new().with_read_delay(Duration::from_millis(10)),
        MockEventPublisher::accepting(),
    )
    .await?;
    let game = server.create_game("u1").await?;
    let game_id = game.id.to_string();

    let user_ids: Vec<String> = (2..=9).map(|i| format!("u{i}")).collect();
    let requests = user_ids.iter().map(|user_id| server.join(&game_id, user_id));
    let responses = join_all(requests).await;

    for response in responses {
        assert_eq!(response?.status(), 200);
    }

    let stored = server.store().get(game.id).unwrap();
    let opponent = stored.opponent_user_id.expect("one opponent seated");
    let snapshot = server.cache().peek(game.id).await.unwrap();
    assert_eq!(snapshot.game_opponent_user_id, Some(opponent.clone()));
    assert_eq!(snapshot.spectators.len(), 7);
    assert!(!snapshot.spectators.contains(&opponent));

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_spectators_are_kept_across_instances_sharing_a_cache() {
    let store = Arc::new(MockSessionStore::new());
    let cache = Arc::new(MockSessionCache::new().with_read_delay(Duration::from_millis(20)));
    let publisher = Arc::new(MockEventPublisher::accepting());
    let instances: Vec<Arc<MembershipCoordinator>> = (0..2)
        .map(|_| {
            Arc::new(MembershipCoordinator::new(
                store.clone(),
                cache.clone(),
                publisher.clone(),
                Duration::from_secs(10),
                Duration::from_secs(10),
            ))
        })
        .collect();
    let first = instances.first().unwrap();
    let second = instances.last().unwrap();

    let game_id = first
        .create_game(NewGameSession {
            owner_user_id: UserId::from("u1"),
        })
        .await
        .unwrap()
        .id;
    let seated = second.join(game_id, UserId::from("u2")).await.unwrap();
    assert_eq!(seated.permission, Permission::ReadWrite);

    let spectators: Vec<UserId> = (3..=10).map(|i| UserId::from(format!("u{i}"))).collect();
    let handles = spectators.iter().zip(instances.iter().cycle()).map(|(user, instance)| {
        let instance = Arc::clone(instance);
        let user = user.clone();
        tokio::spawn(async move { instance.join(game_id, user).await })
    });

    for joined in join_all(handles).await {
        assert_eq!(joined.unwrap().unwrap().permission, Permission::Read);
    }

    let snapshot = cache.peek(game_id).await.unwrap();
    assert_eq!(snapshot.game_opponent_user_id, Some(UserId::from("u2")));
    assert_eq!(snapshot.spectators.len(), spectators.len());
    for user in &spectators {
        assert!(snapshot.spectators.contains(user), "{user} missing");
    }
    assert_eq!(store.update_count(), 1);
    assert!(!cache.is_locked(game_id));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_opponent_race_across_instances_sharing_a_cache() {
    let store = Arc::new(
        MockSessionStore::last_writer_wins().with_read_delay(Duration::from_millis(10)),
    );
    let cache = Arc::new(MockSessionCache::new());
    let publisher = Arc::new(MockEventPublisher::accepting());
    let instances: Vec<Arc<MembershipCoordinator>> = (0..3)
        .map(|_| {
            Arc::new(MembershipCoordinator::new(
                store.clone(),
                cache.clone(),
                publisher.clone(),
                Duration::from_secs(10),
                Duration::from_secs(10),
            ))
        })
        .collect();
    let game_id = instances
        .first()
        .unwrap()
        .create_game(NewGameSession {
            owner_user_id: UserId::from("u1"),
        })
        .await
        .unwrap()
        .id;

    let handles = (2..=7).zip(instances.iter().cycle()).map(|(i, instance)| {
        let instance = Arc::clone(instance);
        tokio::spawn(async move { instance.join(game_id, UserId::from(format!("u{i}"))).await })
    });
    let permissions: Vec<Permission> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap().permission)
        .collect();

    assert_eq!(
        permissions
            .iter()
            .filter(|p| **p == Permission::ReadWrite)
            .count(),
        1
    );
    assert_eq!(store.update_count(), 1);
    assert_eq!(cache.peek(game_id).await.unwrap().spectators.len(), 5);
}
