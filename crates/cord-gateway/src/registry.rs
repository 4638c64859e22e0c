//! One live client per API token.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::client::GatewayClient;
use crate::config::ClientSettings;
use crate::error::GatewayResult;
use crate::events::EventHandler;

/// Tracks active clients by token so a second consumer of the same token
/// shares the existing session instead of opening another.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: Mutex<HashMap<String, GatewayClient>>,
}

impl ClientRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Return the client for `settings.api_token`, creating and starting one
    /// if none is registered. `handler` is registered on it under `name`
    /// either way.
    pub async fn connect(
        self: &Arc<Self>,
        settings: ClientSettings,
        name: &str,
        handler: Arc<dyn EventHandler>,
    ) -> GatewayResult<GatewayClient> {
        settings.validate()?;
        let token = settings.api_token.clone();

        let existing = self.clients.lock().get(&token).cloned();
        if let Some(client) = existing {
            debug!(client = %client.id(), handler = name, "reusing client for token");
            client.register_handler(name, handler);
            return Ok(client);
        }

        let client = GatewayClient::new(settings)?;
        client.register_handler(name, Arc::clone(&handler));

        let registry: Weak<Self> = Arc::downgrade(self);
        let hook_token = token.clone();
        client.set_teardown_hook(Box::new(move |id| {
            if let Some(registry) = registry.upgrade() {
                registry.remove_if(&hook_token, id);
            }
        }));

        {
            let mut clients = self.clients.lock();
            if let Some(raced) = clients.get(&token) {
                raced.register_handler(name, handler);
                return Ok(raced.clone());
            }
            clients.insert(token.clone(), client.clone());
        }

        if let Err(err) = client.start().await {
            client.disconnect().await;
            return Err(err);
        }
        info!(client = %client.id(), "client registered");
        Ok(client)
    }

    fn remove_if(&self, token: &str, id: uuid::Uuid) {
        let mut clients = self.clients.lock();
        if clients.get(token).is_some_and(|client| client.id() == id) {
            clients.remove(token);
            debug!(client = %id, "client unregistered");
        }
    }

    /// Registered client for `token`.
    pub fn get(&self, token: &str) -> Option<GatewayClient> {
        self.clients.lock().get(token).cloned()
    }

    /// Number of registered clients.
    pub fn len(&self) -> usize {
        self.clients.lock().len()
    }

    /// Whether no clients are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Disconnect every registered client.
    pub async fn disconnect_all(&self) {
        let clients: Vec<GatewayClient> = self.clients.lock().drain().map(|(_, c)| c).collect();
        for client in clients {
            client.disconnect().await;
        }
    }
}
