//! Background maintenance for a long-running embedding.
//!
//! The game server owns the runtime; this module only provides the periodic
//! sweep it spawns at startup. Each tick purges expired blessings and boosts,
//! then saves dirty accounts. The interval typically comes from the
//! `[economy] autosave_minutes` configuration key.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, error};

use crate::economy::registry::AccountRegistry;

/// Spawn the periodic save-and-cleanup sweep. Returns the task handle so the
/// embedding can abort it at shutdown; a final explicit `save_all` should
/// still run after the abort to catch changes from the last partial interval.
pub fn spawn_autosave(
    registry: Arc<AccountRegistry>,
    every: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            match registry.cleanup_expired_effects() {
                Ok(0) => {}
                Ok(purged) => debug!("autosave sweep purged {} expired effects", purged),
                Err(err) => error!("autosave cleanup failed: {}", err),
            }
            match registry.save_all() {
                Ok(saved) => debug!("autosave persisted {} accounts", saved),
                Err(err) => error!("autosave failed: {}", err),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::economy::progression::RankLadder;
    use crate::economy::rebirth::RebirthRules;
    use crate::economy::storage::EconomyStoreBuilder;
    use crate::economy::types::TransactionKind;
    use tempfile::TempDir;
    use uuid::Uuid;

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn sweep_persists_dirty_accounts() {
        let dir = TempDir::new().expect("tempdir");
        let store = EconomyStoreBuilder::new(dir.path()).open().expect("open store");
        let registry = Arc::new(AccountRegistry::new(
            store,
            RankLadder::default(),
            RebirthRules::default(),
            0.0,
        ));
        let id = Uuid::new_v4();
        registry
            .credit(id, "Rye", 40.0, TransactionKind::VillageEarnings, "harvest")
            .unwrap();
        assert_eq!(registry.store().count_transactions(id).unwrap(), 0);

        let handle = spawn_autosave(registry.clone(), Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(80)).await;
        handle.abort();

        assert_eq!(registry.store().count_transactions(id).unwrap(), 1);
    }
}
