//! Provider registry and the `"fake"` factory.

use super::VenueSimulator;
use crate::config::SimulatorConfig;
use crate::error::VenueError;
use crate::events::pool::EventPool;
use crate::instrument::{default_instruments, StaticInstrumentSource};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Registry key under which the simulator factory installs itself.
pub const FACTORY_KEY: &str = "fake";

/// Constructs an instance from a root context, an event pool and a raw
/// config map. The pool is mandatory; registries that cannot supply one
/// pass `None` and get a configuration error back.
pub type ProviderFactory = Arc<
    dyn Fn(
            CancellationToken,
            Option<Arc<dyn EventPool>>,
            &HashMap<String, Value>,
        ) -> Result<Arc<VenueSimulator>, VenueError>
        + Send
        + Sync,
>;

/// Name-keyed factory table the dispatcher constructs providers from.
#[derive(Default)]
pub struct ProviderRegistry {
    factories: HashMap<String, ProviderFactory>,
}

impl ProviderRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a factory under `key`, replacing any previous one.
    pub fn register(&mut self, key: &str, factory: ProviderFactory) {
        self.factories.insert(key.to_string(), factory);
    }

    /// Construct an instance from the factory registered under `key`.
    ///
    /// # Errors
    /// [`VenueError::UnknownFactory`] when no factory holds the key, plus
    /// whatever the factory itself returns.
    pub fn create(
        &self,
        key: &str,
        root: CancellationToken,
        pool: Option<Arc<dyn EventPool>>,
        config: &HashMap<String, Value>,
    ) -> Result<Arc<VenueSimulator>, VenueError> {
        let factory = self
            .factories
            .get(key)
            .ok_or_else(|| VenueError::UnknownFactory(key.to_string()))?;
        factory(root, pool, config)
    }
}

/// Install the simulator factory under [`FACTORY_KEY`].
pub fn register_factory(registry: &mut ProviderRegistry) {
    registry.register(
        FACTORY_KEY,
        Arc::new(|root, pool, map| {
            let pool = pool.ok_or(VenueError::MissingPool)?;
            let config = SimulatorConfig::from_map(map)?;
            Ok(VenueSimulator::new(
                root,
                pool,
                config,
                Arc::new(StaticInstrumentSource(default_instruments())),
            ))
        }),
    );
}
