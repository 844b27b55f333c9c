//! Crash recovery against the durable store.
//!
//! Each test drives a controller over a redb file, drops it without a clean
//! shutdown, reopens the file and checks what survived.

use meshpae_auth::{Controller, KeyHooks, PaeConfig, RedbStore, SupplicantState};
use meshpae_core::Environment;
use meshpae_harness::SimEnv;
use meshpae_nvm::{Eui64, NetworkName, SecurityKeys};
use tempfile::tempdir;

const DAY: u64 = 24 * 3600;

fn config() -> PaeConfig {
    PaeConfig {
        pan_id: 0x0A0B,
        network_name: NetworkName::new("field-mesh").unwrap(),
        ..PaeConfig::default()
    }
}

#[test]
fn counters_survive_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("pae.redb");
    let env = SimEnv::with_seed(3);

    let slot = {
        let store = RedbStore::open(&path).unwrap();
        let mut controller =
            Controller::start(env.clone(), store, config(), KeyHooks::tracing()).unwrap();
        let slot = controller.install_gtk(env.random_gtk(), 30 * DAY).unwrap();
        controller.activate_gtk(slot).unwrap();
        controller.frame_counter_set(slot, 5_000).unwrap();

        // Persist due after the store interval
        env.advance(3600);
        controller.slow_timer(3600).unwrap();
        controller.frame_counter_set(slot, 5_100).unwrap();
        slot
    };

    let store = RedbStore::open(&path).unwrap();
    let controller = Controller::start(env, store, config(), KeyHooks::tracing()).unwrap();

    // Resumes past anything used before the crash
    assert_eq!(controller.counters().restart_counter(), 1);
    assert_eq!(controller.frame_counter_read(slot), 5_000 + 1_000_000);
    assert!(controller.gtk().keys().active().is_some());
}

#[test]
fn restart_counter_increments_once_per_start() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("pae.redb");
    let env = SimEnv::new();

    for expected in 0..4 {
        let store = RedbStore::open(&path).unwrap();
        let controller =
            Controller::start(env.clone(), store, config(), KeyHooks::tracing()).unwrap();
        assert_eq!(controller.counters().restart_counter(), expected);
    }
}

#[test]
fn supplicants_return_unregistered() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("pae.redb");
    let env = SimEnv::with_seed(9);
    let eui = Eui64([0x02, 0, 0, 0, 0, 0, 0, 0x42]);

    {
        let store = RedbStore::open(&path).unwrap();
        let mut controller =
            Controller::start(env.clone(), store, config(), KeyHooks::tracing()).unwrap();
        let slot = controller.install_gtk(env.random_gtk(), 30 * DAY).unwrap();
        controller.activate_gtk(slot).unwrap();
        controller.supplicant_authenticated(eui, SecurityKeys::default()).unwrap();
    }

    let store = RedbStore::open(&path).unwrap();
    let mut controller =
        Controller::start(env, store, config(), KeyHooks::tracing()).unwrap();
    let restored = controller.supplicants().get(&eui).unwrap();
    assert_eq!(restored.state, SupplicantState::Unregistered);
    assert_eq!(restored.storage_slot, Some(0));

    // Re-authentication reuses the stored record
    controller.supplicant_authenticated(eui, SecurityKeys::default()).unwrap();
    assert_eq!(controller.key_storage_index().len(), 1);
}

#[test]
fn pan_version_advances_across_restart() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("pae.redb");
    let env = SimEnv::new();

    let before = {
        let store = RedbStore::open(&path).unwrap();
        let mut controller =
            Controller::start(env.clone(), store, config(), KeyHooks::tracing()).unwrap();
        controller.install_gtk(env.random_gtk(), DAY).unwrap();
        controller.counters().pan_version()
    };

    let store = RedbStore::open(&path).unwrap();
    let controller = Controller::start(env, store, config(), KeyHooks::tracing()).unwrap();
    assert_eq!(controller.counters().pan_version(), before + 1);
}
