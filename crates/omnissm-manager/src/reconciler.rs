//! Periodic reconciliation of non-enriched registrations.
//!
//! Scans the registry, partitions the backlog by `(account, region)`,
//! and fans each partition out onto its own task. Partitions are fully
//! independent: a failing account can never poison another, and the
//! run always joins every partition before returning.

use futures::future::join_all;
use omnissm_registry::{RegistrationEntries, RegistrationEntry, RegistryStore};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::configsource::ConfigSourceFactory;
use crate::errors::Result;
use crate::manager::Manager;

/// Batched configuration fetches carry at most this many resource ids.
const BATCH_SIZE: usize = 100;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileSummary {
    /// Distinct `(account, region)` partitions processed
    pub partitions: usize,
    /// Non-enriched entries found by the scan
    pub scanned: usize,
    /// Entries that reached the terminal enriched state this run
    pub enriched: usize,
    /// Fetch or update failures, logged and skipped
    pub failures: usize,
}

#[derive(Default)]
struct PartitionOutcome {
    enriched: usize,
    failures: usize,
}

pub struct Reconciler {
    registry: Arc<dyn RegistryStore>,
    manager: Arc<Manager>,
    sources: Arc<dyn ConfigSourceFactory>,
    config: Arc<Config>,
}

impl Reconciler {
    pub fn new(
        registry: Arc<dyn RegistryStore>,
        manager: Arc<Manager>,
        sources: Arc<dyn ConfigSourceFactory>,
        config: Arc<Config>,
    ) -> Self {
        Reconciler {
            registry,
            manager,
            sources,
            config,
        }
    }

    pub async fn run(&self) -> Result<ReconcileSummary> {
        let entries = self.registry.scan().await?;
        let scanned = entries.len();

        let mut partitions: HashMap<(String, String), Vec<RegistrationEntry>> = HashMap::new();
        for entry in entries {
            partitions
                .entry((entry.account_id.clone(), entry.region.clone()))
                .or_default()
                .push(entry);
        }

        let mut summary = ReconcileSummary {
            partitions: partitions.len(),
            scanned,
            ..ReconcileSummary::default()
        };

        let mut tasks = JoinSet::new();
        for ((account_id, region), group) in partitions {
            let manager = Arc::clone(&self.manager);
            let sources = Arc::clone(&self.sources);
            let config = Arc::clone(&self.config);
            tasks.spawn(async move {
                Self::reconcile_partition(manager, sources, config, account_id, region, group).await
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => {
                    summary.enriched += outcome.enriched;
                    summary.failures += outcome.failures;
                }
                Err(err) => {
                    error!(%err, "reconciliation partition panicked");
                    summary.failures += 1;
                }
            }
        }

        info!(
            partitions = summary.partitions,
            scanned = summary.scanned,
            enriched = summary.enriched,
            failures = summary.failures,
            "reconciliation pass finished"
        );
        Ok(summary)
    }

    async fn reconcile_partition(
        manager: Arc<Manager>,
        sources: Arc<dyn ConfigSourceFactory>,
        config: Arc<Config>,
        account_id: String,
        region: String,
        entries: Vec<RegistrationEntry>,
    ) -> PartitionOutcome {
        let role = config.role_arn(&account_id);
        if role.is_none() {
            info!(account_id, "no assume role configured, using ambient identity");
        }
        let client = sources.client(&account_id, &region, role.as_deref());

        let view = RegistrationEntries::new(entries);
        let instance_ids: Vec<String> = view
            .all()
            .iter()
            .map(|entry| entry.instance_id.clone())
            .collect();

        let fetches = instance_ids.chunks(BATCH_SIZE).map(|chunk| {
            let client = Arc::clone(&client);
            let chunk = chunk.to_vec();
            async move { client.batch_get_resource_config(&chunk).await }
        });

        let mut outcome = PartitionOutcome::default();
        let mut items = Vec::new();
        for result in join_all(fetches).await {
            match result {
                Ok(batch) => items.extend(batch),
                Err(err) => {
                    warn!(%err, account_id, region, "batched configuration fetch failed");
                    outcome.failures += 1;
                }
            }
        }

        for item in items {
            let entry = match view.by_instance_id(&item.resource_id) {
                Some(entry) => entry,
                None => {
                    info!(resource_id = %item.resource_id, "no entry for fetched item, skipping");
                    continue;
                }
            };
            match manager.update(entry, &item).await {
                Ok(updated) => {
                    if updated.enriched {
                        outcome.enriched += 1;
                    }
                }
                Err(err) => {
                    warn!(%err, id = %entry.id, "enrichment failed");
                    outcome.failures += 1;
                }
            }
        }

        info!(
            account_id,
            region,
            enriched = outcome.enriched,
            failures = outcome.failures,
            "partition reconciled"
        );
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configsource::ConfigSource;
    use crate::errors::ManagerError;
    use crate::testutil::{fast_policy, make_item, RecordingSsm};
    use async_trait::async_trait;
    use omnissm_dispatch::Dispatcher;
    use omnissm_identity::registration_id;
    use omnissm_registry::MemoryRegistry;
    use std::collections::HashSet;
    use std::sync::Mutex;

    struct StaticSource {
        account_id: String,
        region: String,
        fail: bool,
        extra_items: usize,
        batch_sizes: Arc<Mutex<Vec<usize>>>,
    }

    #[async_trait]
    impl ConfigSource for StaticSource {
        async fn batch_get_resource_config(
            &self,
            resource_ids: &[String],
        ) -> Result<Vec<crate::event::ConfigurationItem>> {
            if self.fail {
                return Err(ManagerError::ConfigurationFetch("simulated outage".to_string()));
            }
            self.batch_sizes.lock().unwrap().push(resource_ids.len());
            let mut items: Vec<_> = resource_ids
                .iter()
                .map(|id| {
                    let mut item = make_item(id);
                    item.aws_account_id = self.account_id.clone();
                    item.aws_region = self.region.clone();
                    item
                })
                .collect();
            for i in 0..self.extra_items {
                items.push(make_item(&format!("i-unknown-{i}")));
            }
            Ok(items)
        }
    }

    #[derive(Default)]
    struct StaticFactory {
        clients: Mutex<Vec<(String, String, Option<String>)>>,
        batch_sizes: Arc<Mutex<Vec<usize>>>,
        fail_accounts: HashSet<String>,
        extra_items: usize,
    }

    impl ConfigSourceFactory for StaticFactory {
        fn client(
            &self,
            account_id: &str,
            region: &str,
            assume_role: Option<&str>,
        ) -> Arc<dyn ConfigSource> {
            self.clients.lock().unwrap().push((
                account_id.to_string(),
                region.to_string(),
                assume_role.map(str::to_string),
            ));
            Arc::new(StaticSource {
                account_id: account_id.to_string(),
                region: region.to_string(),
                fail: self.fail_accounts.contains(account_id),
                extra_items: self.extra_items,
                batch_sizes: Arc::clone(&self.batch_sizes),
            })
        }
    }

    async fn seed(registry: &MemoryRegistry, account_id: &str, region: &str, count: usize) {
        for i in 0..count {
            let instance_id = format!("i-{region}-{i:05}");
            let name = format!("{account_id}-{instance_id}");
            let mut entry = RegistrationEntry::new(
                registration_id(&name),
                account_id.to_string(),
                region.to_string(),
                instance_id,
            );
            entry.managed_id = format!("mi-{account_id}-{i:05}");
            registry.put(&entry).await.unwrap();
        }
    }

    fn reconciler(
        registry: Arc<MemoryRegistry>,
        factory: Arc<StaticFactory>,
        config: Config,
    ) -> Reconciler {
        let ssm = Arc::new(RecordingSsm::new());
        let dispatcher = Arc::new(Dispatcher::new(ssm, fast_policy(2)));
        let config = Arc::new(config);
        let manager = Arc::new(Manager::new(registry.clone(), dispatcher, &config));
        Reconciler::new(registry, manager, factory, config)
    }

    #[tokio::test]
    async fn test_fan_out_partitions_and_batches() {
        let registry = Arc::new(MemoryRegistry::new());
        seed(&registry, "111111111111", "us-east-1", 120).await;
        seed(&registry, "111111111111", "us-west-2", 80).await;
        seed(&registry, "222222222222", "us-east-1", 30).await;
        seed(&registry, "222222222222", "us-west-2", 20).await;

        let factory = Arc::new(StaticFactory::default());
        let reconciler = reconciler(registry.clone(), factory.clone(), Config::default());

        let summary = reconciler.run().await.unwrap();
        assert_eq!(summary.partitions, 4);
        assert_eq!(summary.scanned, 250);
        assert_eq!(summary.enriched, 250);
        assert_eq!(summary.failures, 0);

        // One client per partition.
        assert_eq!(factory.clients.lock().unwrap().len(), 4);

        // 120 entries split into two batches, the rest fit in one each.
        let mut batch_sizes = factory.batch_sizes.lock().unwrap().clone();
        batch_sizes.sort_unstable();
        assert_eq!(batch_sizes, vec![20, 20, 30, 80, 100]);

        // Everything reachable ended up enriched.
        assert!(registry.scan().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_partition_failure_does_not_poison_others() {
        let registry = Arc::new(MemoryRegistry::new());
        seed(&registry, "111111111111", "us-east-1", 10).await;
        seed(&registry, "222222222222", "us-east-1", 10).await;

        let factory = Arc::new(StaticFactory {
            fail_accounts: HashSet::from(["222222222222".to_string()]),
            ..StaticFactory::default()
        });
        let reconciler = reconciler(registry.clone(), factory, Config::default());

        let summary = reconciler.run().await.unwrap();
        assert_eq!(summary.partitions, 2);
        assert_eq!(summary.enriched, 10);
        assert_eq!(summary.failures, 1);

        // The healthy partition finished; the failed one is retried on
        // the next pass.
        assert_eq!(registry.scan().await.unwrap().len(), 10);
    }

    #[tokio::test]
    async fn test_items_without_entries_are_skipped() {
        let registry = Arc::new(MemoryRegistry::new());
        seed(&registry, "111111111111", "us-east-1", 5).await;

        let factory = Arc::new(StaticFactory {
            extra_items: 2,
            ..StaticFactory::default()
        });
        let reconciler = reconciler(registry.clone(), factory, Config::default());

        let summary = reconciler.run().await.unwrap();
        assert_eq!(summary.enriched, 5);
        assert_eq!(summary.failures, 0);
    }

    #[tokio::test]
    async fn test_assume_role_resolution() {
        let registry = Arc::new(MemoryRegistry::new());
        seed(&registry, "111111111111", "us-east-1", 1).await;
        seed(&registry, "222222222222", "us-east-1", 1).await;

        let mut config = Config::default();
        config.assume_roles.insert(
            "222222222222".to_string(),
            "omnissm-reconciler".to_string(),
        );

        let factory = Arc::new(StaticFactory::default());
        let reconciler = reconciler(registry, factory.clone(), config);
        reconciler.run().await.unwrap();

        let clients = factory.clients.lock().unwrap().clone();
        let roles: HashMap<String, Option<String>> = clients
            .into_iter()
            .map(|(account, _, role)| (account, role))
            .collect();
        assert_eq!(roles["111111111111"], None);
        assert_eq!(
            roles["222222222222"].as_deref(),
            Some("arn:aws:iam::222222222222:role/omnissm-reconciler")
        );
    }

    #[tokio::test]
    async fn test_overlapping_runs_are_idempotent() {
        let registry = Arc::new(MemoryRegistry::new());
        seed(&registry, "111111111111", "us-east-1", 3).await;

        let factory = Arc::new(StaticFactory::default());
        let reconciler = reconciler(registry.clone(), factory, Config::default());

        let first = reconciler.run().await.unwrap();
        assert_eq!(first.enriched, 3);

        // A second pass finds nothing left to do.
        let second = reconciler.run().await.unwrap();
        assert_eq!(second.scanned, 0);
        assert_eq!(second.enriched, 0);
    }
}
