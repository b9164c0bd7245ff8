//! Integration Tests for Split Views
//!
//! Split layouts follow the session lifecycle: sessions that exit or are
//! disposed leave their split, and the remaining panes share the space.

#[path = "../test_utils/mod.rs"]
mod test_utils;

use std::sync::Arc;

use tabmux::models::{ProcessExit, SessionId};
use tabmux::pty::FakeSpawner;
use tabmux::session::RegistryOptions;
use tabmux::{CreateSessionRequest, SessionRegistry, SplitDirection, SplitView, SplitViewManager};
use test_utils::{create_test_config, fake_registry, fake_service, wait_until};

fn assert_ratios(view: &SplitView, expected: &[f64]) {
    assert_eq!(view.ratios.len(), expected.len());
    for (actual, expected) in view.ratios.iter().zip(expected) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "ratios {:?}, expected {:?}",
            view.ratios,
            expected
        );
    }
}

fn exit_session(spawner: &FakeSpawner, registry: &SessionRegistry, id: SessionId) {
    let pid = registry.get_session(id).unwrap().pid.unwrap();
    spawner.find(pid).unwrap().exit(ProcessExit::with_code(0));
}

async fn three_panes() -> (
    Arc<FakeSpawner>,
    SessionRegistry,
    Arc<SplitViewManager>,
    [SessionId; 3],
) {
    let (spawner, registry) = fake_registry(RegistryOptions::default());
    let splits = SplitViewManager::new(registry.clone());
    let a = registry
        .create_session(CreateSessionRequest::new())
        .await
        .unwrap()
        .id;
    let b = splits.create_split(a, SplitDirection::Horizontal).await.unwrap();
    let c = splits.create_split(b, SplitDirection::Horizontal).await.unwrap();
    (spawner, registry, splits, [a, b, c])
}

#[tokio::test]
async fn test_nested_split_shares_parent_space() {
    let (_, _, splits, [a, b, c]) = three_panes().await;

    let views = splits.split_views();
    assert_eq!(views.len(), 1);
    assert_eq!(views[0].sessions, vec![a, b, c]);
    assert_ratios(&views[0], &[0.5, 0.25, 0.25]);
}

#[tokio::test]
async fn test_natural_exit_prunes_split_and_promotes_active() {
    let (spawner, registry, splits, [a, b, c]) = three_panes().await;
    assert_eq!(registry.get_active_session().unwrap().id, c);

    exit_session(&spawner, &registry, b);
    wait_until(|| !registry.contains(b)).await;

    let view = splits.split_for_session(a).unwrap();
    assert_eq!(view.sessions, vec![a, c]);
    assert_ratios(&view, &[2.0 / 3.0, 1.0 / 3.0]);
    assert_eq!(registry.get_active_session().unwrap().id, c);

    exit_session(&spawner, &registry, c);
    wait_until(|| !registry.contains(c)).await;

    assert!(splits.split_views().is_empty());
    assert_eq!(registry.get_active_session().unwrap().id, a);
}

#[tokio::test]
async fn test_dispose_leaves_other_splits_untouched() {
    let (spawner, registry) = fake_registry(RegistryOptions::default());
    let splits = SplitViewManager::new(registry.clone());

    let left = registry
        .create_session(CreateSessionRequest::new())
        .await
        .unwrap()
        .id;
    let right = splits.create_split(left, SplitDirection::Vertical).await.unwrap();
    let other = registry
        .create_session(CreateSessionRequest::new())
        .await
        .unwrap()
        .id;
    let other_pane = splits.create_split(other, SplitDirection::Vertical).await.unwrap();
    assert_eq!(splits.split_views().len(), 2);

    registry.remove_session(right).unwrap();

    let views = splits.split_views();
    assert_eq!(views.len(), 1);
    assert_eq!(views[0].sessions, vec![other, other_pane]);
    assert!(splits.split_for_session(left).is_none());
    assert!(registry.contains(left));
    assert_eq!(spawner.spawn_count(), 4);
}

#[tokio::test]
async fn test_split_of_exited_parent_is_rejected() {
    let (spawner, registry) = fake_registry(RegistryOptions {
        retain_exited: true,
        ..RegistryOptions::default()
    });
    let splits = SplitViewManager::new(registry.clone());
    let parent = registry
        .create_session(CreateSessionRequest::new())
        .await
        .unwrap()
        .id;

    exit_session(&spawner, &registry, parent);
    wait_until(|| !registry.get_session(parent).unwrap().is_running()).await;

    let err = splits
        .create_split(parent, SplitDirection::Horizontal)
        .await
        .unwrap_err();
    assert!(matches!(err, tabmux::Error::InvalidSplit { .. }));
    assert_eq!(registry.len(), 1);
    assert!(splits.split_views().is_empty());
}

#[tokio::test]
async fn test_split_inherits_parent_launch_settings() {
    let (spawner, service) = fake_service(create_test_config());
    let dir = tempfile::tempdir().unwrap();
    let request = CreateSessionRequest::new()
        .cwd(dir.path().to_path_buf())
        .theme("default-light")
        .size(tabmux::TerminalSize::new(132, 43));
    let parent = service
        .create_session(tabmux::HostId::new(), request)
        .await
        .unwrap();

    let child = service
        .split(tabmux::HostId::new(), parent.id, SplitDirection::Vertical)
        .await
        .unwrap();

    let session = service.registry().get_session(child).unwrap();
    assert_eq!(session.profile_name, parent.profile_name);
    assert_eq!(session.theme_name, "default-light");
    assert_eq!(session.cwd, parent.cwd);
    assert_eq!(session.size, tabmux::TerminalSize::new(132, 43));
    assert_eq!(spawner.last().unwrap().request().cwd, parent.cwd);
}

#[tokio::test]
async fn test_updated_ratios_survive_pruning() {
    let (spawner, registry, splits, [a, b, c]) = three_panes().await;
    let id = splits.split_for_session(a).unwrap().id;

    let view = splits.update_split_view(&id, vec![2.0, 1.0, 1.0]).unwrap();
    assert_ratios(&view, &[0.5, 0.25, 0.25]);

    exit_session(&spawner, &registry, a);
    wait_until(|| !registry.contains(a)).await;

    let view = splits.get_split_view(&id).unwrap();
    assert_eq!(view.sessions, vec![b, c]);
    assert_ratios(&view, &[0.5, 0.5]);
}
