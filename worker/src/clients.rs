//! Registry of open application instances
//!
//! Stands in for the browser clients registry: activation claims every open
//! page without a reload, and a notification click focuses an existing page
//! or opens a new one at the application root.

use crate::cache::hash::generate_token;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;
use url::Url;

/// An open application page.
#[derive(Debug, Clone)]
pub struct Client {
    pub id: String,
    pub url: Url,
    pub focused: bool,
    /// Whether this worker controls the page.
    pub controlled: bool,
}

#[derive(Default)]
pub struct ClientRegistry {
    clients: Mutex<HashMap<String, Client>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an open page; returns its id.
    pub fn add(&self, url: Url) -> String {
        let id = generate_token();
        let client = Client {
            id: id.clone(),
            url,
            focused: false,
            controlled: false,
        };
        self.clients.lock().unwrap().insert(id.clone(), client);
        id
    }

    pub fn get(&self, id: &str) -> Option<Client> {
        self.clients.lock().unwrap().get(id).cloned()
    }

    /// Take control of every registered client. Returns how many.
    pub fn claim(&self) -> usize {
        let mut clients = self.clients.lock().unwrap();
        for client in clients.values_mut() {
            client.controlled = true;
        }
        clients.len()
    }

    /// Open a new window at `url`, focused and controlled. Returns its id.
    pub fn open_window(&self, url: Url) -> String {
        let id = generate_token();
        let client = Client {
            id: id.clone(),
            url,
            focused: true,
            controlled: true,
        };
        self.clients.lock().unwrap().insert(id.clone(), client);
        debug!("Opened new client window {}", id);
        id
    }

    /// Focus an existing client on the same origin as `url`, or open a new
    /// window there. Returns the id of the focused or opened client.
    pub fn focus_or_open(&self, url: &Url) -> String {
        {
            let mut clients = self.clients.lock().unwrap();
            if let Some(client) = clients
                .values_mut()
                .find(|client| client.url.origin() == url.origin())
            {
                client.focused = true;
                debug!("Focused existing client {}", client.id);
                return client.id.clone();
            }
        }
        self.open_window(url.clone())
    }
}
