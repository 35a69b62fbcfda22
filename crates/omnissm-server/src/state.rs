//! Application state shared across handlers and background loops.

use anyhow::Result;
use omnissm_dispatch::{Dispatcher, Drainer, FifoQueue, OverflowQueue};
use omnissm_identity::{AccountWhitelist, Verifier};
use omnissm_manager::{
    ChangeProcessor, Config, HttpConfigSourceFactory, HttpObjectStore, Manager, Reconciler,
};
use omnissm_registry::{RegistryStore, RocksDbRegistry};
use omnissm_ssm::HttpSsmClient;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::config::ServerConfig;

pub struct AppState {
    pub config: Config,
    pub verifier: Verifier,
    pub whitelist: AccountWhitelist,
    pub manager: Arc<Manager>,
    pub processor: Arc<ChangeProcessor>,
    pub reconciler: Arc<Reconciler>,
    pub drainer: Option<Arc<Drainer>>,
}

impl AppState {
    pub fn new(server: &ServerConfig, shutdown: CancellationToken) -> Result<Self> {
        let config = Config::load(server.config_file.as_ref())?;

        let registry: Arc<dyn RegistryStore> = Arc::new(RocksDbRegistry::open(
            server.data_path.join("registry"),
            &config.registrations_table,
        )?);

        let ssm = Arc::new(HttpSsmClient::new(&server.ssm_endpoint)?);

        let queue: Option<Arc<dyn OverflowQueue>> = if config.overflow_enabled() {
            Some(Arc::new(FifoQueue::open(
                server.data_path.join(&config.queue_name),
            )?))
        } else {
            None
        };

        let mut dispatcher =
            Dispatcher::new(ssm, config.retry_policy()).with_cancellation(shutdown);
        if let Some(queue) = &queue {
            dispatcher = dispatcher.with_queue(Arc::clone(queue));
        }
        let dispatcher = Arc::new(dispatcher);

        let manager = Arc::new(Manager::new(
            Arc::clone(&registry),
            Arc::clone(&dispatcher),
            &config,
        ));

        let processor = Arc::new(ChangeProcessor::new(
            Arc::clone(&manager),
            Arc::new(HttpObjectStore::new(&server.object_store_endpoint)?),
        ));

        let reconciler = Arc::new(Reconciler::new(
            Arc::clone(&registry),
            Arc::clone(&manager),
            Arc::new(HttpConfigSourceFactory::new(&server.config_source_endpoint)?),
            Arc::new(config.clone()),
        ));

        let drainer = queue.map(|queue| {
            Arc::new(Drainer::new(
                queue,
                Arc::clone(&dispatcher),
                Arc::clone(&registry),
                &config.instance_role,
            ))
        });

        Ok(AppState {
            whitelist: config.whitelist(),
            verifier: Verifier::new(),
            config,
            manager,
            processor,
            reconciler,
            drainer,
        })
    }
}
