//! Controller driving real windows through a headless spawner.

mod common;

use std::time::{Duration, Instant};

use common::{test_env, write_png, HeadlessSpawner};
use frameless_viewer::channel::WindowId;
use frameless_viewer::config::Action;
use frameless_viewer::controller::{Controller, PeerDirectory, Tick};
use frameless_viewer::geometry::PanelRect;

#[test]
fn test_send_image_between_windows() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_png(dir.path(), "a.png", 20, 20);

    let peers = PeerDirectory::default();
    let mut env = test_env();
    env.peers = peers.clone();
    let mut controller = Controller::new(Some(a.clone()), peers);
    let mut spawner = HeadlessSpawner::new(env);
    assert_eq!(controller.tick(&mut spawner), Tick::Continue);

    spawner.window(WindowId(1)).perform(Action::NewWindow);
    controller.tick(&mut spawner);
    assert_eq!(controller.peers().snapshot(), vec![WindowId(1), WindowId(2)]);
    assert_eq!(spawner.window(WindowId(1)).peers(), vec![WindowId(2)]);

    assert!(spawner.window(WindowId(1)).send_image_to(WindowId(2)));
    controller.tick(&mut spawner);

    let target = spawner.window(WindowId(2));
    assert!(target.poll_inbound(Instant::now() + Duration::from_secs(5)));
    assert_eq!(target.focused_panel().unwrap().path(), Some(a.as_path()));
    assert_eq!(target.focused_panel().unwrap().image().unwrap().dimensions(), (20, 20));
}

#[test]
fn test_title_bar_toggle_recreates_window() {
    let mut controller = Controller::new(None, PeerDirectory::default());
    let mut spawner = HeadlessSpawner::new(test_env());
    controller.tick(&mut spawner);
    assert!(spawner.window(WindowId(1)).is_decorated());

    spawner.window(WindowId(1)).perform(Action::ToggleTitleBar);
    assert_eq!(controller.tick(&mut spawner), Tick::Continue);

    assert_eq!(spawner.terminated, vec![WindowId(1)]);
    assert_eq!(controller.window_ids(), vec![WindowId(2)]);
    assert!(!spawner.window(WindowId(2)).is_decorated());
}

#[test]
fn test_clone_copies_panels() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_png(dir.path(), "a.png", 20, 20);

    let mut controller = Controller::new(Some(a.clone()), PeerDirectory::default());
    let mut spawner = HeadlessSpawner::new(test_env());
    controller.tick(&mut spawner);

    spawner.window(WindowId(1)).perform(Action::CloneWindow);
    controller.tick(&mut spawner);

    let clone = spawner.window(WindowId(2));
    assert_eq!(clone.panels().len(), 1);
    assert_eq!(clone.panels()[0].path(), Some(a.as_path()));
}

#[test]
fn test_closing_all_windows_shuts_down() {
    let mut controller = Controller::new(None, PeerDirectory::default());
    let mut spawner = HeadlessSpawner::new(test_env());
    controller.tick(&mut spawner);
    spawner.window(WindowId(1)).perform(Action::NewWindow);
    controller.tick(&mut spawner);

    spawner.window(WindowId(1)).close();
    spawner.window(WindowId(2)).perform(Action::CloseWindow);
    assert_eq!(controller.tick(&mut spawner), Tick::Continue);
    assert!(spawner.windows.is_empty());
    assert_eq!(controller.tick(&mut spawner), Tick::Shutdown);
}

#[test]
fn test_daemon_open_spawns_window_with_file() {
    let dir = tempfile::tempdir().unwrap();
    let b = write_png(dir.path(), "b.png", 16, 8);

    let mut controller = Controller::new(None, PeerDirectory::default());
    let mut spawner = HeadlessSpawner::new(test_env());
    controller.tick(&mut spawner);

    let id = controller.open_from_daemon(&mut spawner, b.clone()).unwrap();
    let window = spawner.window(id);
    assert_eq!(window.focused_panel().unwrap().path(), Some(b.as_path()));
    assert_eq!(window.focused_panel().unwrap().image().unwrap().dimensions(), (16, 8));
}

#[test]
fn test_daemon_open_follows_moved_window() {
    let dir = tempfile::tempdir().unwrap();
    let b = write_png(dir.path(), "b.png", 16, 8);

    let mut controller = Controller::new(None, PeerDirectory::default());
    let mut spawner = HeadlessSpawner::new(test_env());
    controller.tick(&mut spawner);

    let first = spawner.window(WindowId(1));
    assert!(first.is_locked());
    first.on_moved(PanelRect::new(300, 200, 900, 700));
    first.perform(Action::ToggleLock);

    let id = controller.open_from_daemon(&mut spawner, b.clone()).unwrap();
    let opened = spawner.window(id);
    assert_eq!(opened.screen_bounds(), PanelRect::new(300, 200, 900, 700));
    assert!(!opened.is_locked());
    assert_eq!(opened.panels().len(), 1);
    assert_eq!(opened.focused_panel().unwrap().path(), Some(b.as_path()));
}
