//! Unified service container for mailgate
//!
//! Provides shared access to the index gateway and configuration.

use crate::core::backend::{Backend, NotmuchCli};
use crate::core::config::Config;
use crate::core::gateway::IndexGateway;
use std::sync::Arc;

/// Unified services container
///
/// The HTTP adapter receives this struct as shared state.
pub struct Services<B: Backend> {
    /// Gateway to the notmuch index
    pub gateway: Arc<IndexGateway<B>>,

    /// Application configuration
    pub config: Arc<Config>,
}

// Manual impl: a derive would require `B: Clone`
impl<B: Backend> Clone for Services<B> {
    fn clone(&self) -> Self {
        Self {
            gateway: Arc::clone(&self.gateway),
            config: Arc::clone(&self.config),
        }
    }
}

impl<B: Backend> Services<B> {
    /// Create services over an explicit backend
    pub fn new(config: Config, backend: B) -> Self {
        let gateway = Arc::new(IndexGateway::new(
            backend,
            config.database.path.clone(),
        ));

        Self {
            gateway,
            config: Arc::new(config),
        }
    }
}

impl Services<NotmuchCli> {
    /// Create services backed by the notmuch command-line tool
    pub fn from_config(config: Config) -> Self {
        let backend = NotmuchCli::new(config.database.notmuch_bin.clone());
        Self::new(config, backend)
    }
}
