//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use ribd_utils::{UnboundedReceiver, UnboundedSender};
use tokio::sync::mpsc;

use crate::af::AddressFamily;
use crate::debug::Debug;
use crate::path::Path;

// Consumer of routing table notifications.
//
// Any type implementing this trait can be registered with a routing table,
// including another routing table.
//
// Callbacks run while the notifying table is locked. They must not call back
// into that table (`lookup`, `dump`, `add_path`, ...) or they deadlock.
// Clients that need to read the table queue notifications through a
// `ChannelClient` and consume them from their own task.
pub trait RouteTableClient<A: AddressFamily>:
    std::fmt::Debug + Send + Sync
{
    // Full synchronization with the contents of the table the client was just
    // registered with. Called exactly once per registration, before any
    // incremental notification.
    fn update_new_client(&self, routes: Vec<(A::IpNetwork, Path)>) {
        for (prefix, path) in routes {
            self.path_added(prefix, path);
        }
    }

    fn path_added(&self, prefix: A::IpNetwork, path: Path);

    fn path_removed(&self, prefix: A::IpNetwork, path: Path);

    // A path was superseded by another one for the same prefix.
    fn path_replaced(&self, prefix: A::IpNetwork, old: Path, new: Path) {
        self.path_removed(prefix, old);
        self.path_added(prefix, new);
    }
}

// What a client gets to see.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ClientOptions {
    // Only best-path changes.
    #[default]
    BestOnly,
    // Every candidate path addition and removal.
    AllPaths,
}

pub struct Registration<A: AddressFamily> {
    pub client: Arc<dyn RouteTableClient<A>>,
    pub options: ClientOptions,
    pub synced: bool,
}

// Observer registry of a single routing table.
pub struct ClientManager<A: AddressFamily> {
    clients: RwLock<BTreeMap<ClientId, Registration<A>>>,
}

// Client identity: address of the shared client object.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub struct ClientId(usize);

// Client that queues every notification into a channel, decoupling the
// consumer from the table's critical section.
#[derive(Debug)]
pub struct ChannelClient<A: AddressFamily> {
    tx: UnboundedSender<RouteUpdate<A>>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RouteUpdate<A: AddressFamily> {
    Add {
        prefix: A::IpNetwork,
        path: Path,
    },
    Remove {
        prefix: A::IpNetwork,
        path: Path,
    },
    Replace {
        prefix: A::IpNetwork,
        old: Path,
        new: Path,
    },
}

// ===== impl Registration =====

impl<A: AddressFamily> Clone for Registration<A> {
    fn clone(&self) -> Registration<A> {
        Registration {
            client: self.client.clone(),
            options: self.options,
            synced: self.synced,
        }
    }
}

impl<A: AddressFamily> std::fmt::Debug for Registration<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("client", &self.client)
            .field("options", &self.options)
            .field("synced", &self.synced)
            .finish()
    }
}

// ===== impl ClientId =====

impl ClientId {
    pub fn of<A: AddressFamily>(client: &Arc<dyn RouteTableClient<A>>) -> Self {
        ClientId(Arc::as_ptr(client) as *const () as usize)
    }
}

// ===== impl ClientManager =====

impl<A: AddressFamily> ClientManager<A> {
    // Registers the client unless already present.
    //
    // `replay` runs once, before the registration becomes visible to
    // incremental notifications. The caller must hold the table's entry lock
    // so that the replayed snapshot and the registration are atomic with
    // respect to table mutations.
    pub(crate) fn register<F>(
        &self,
        table: &str,
        client: Arc<dyn RouteTableClient<A>>,
        options: ClientOptions,
        replay: F,
    ) -> bool
    where
        F: FnOnce(&dyn RouteTableClient<A>, ClientOptions),
    {
        let id = ClientId::of(&client);
        let mut clients = self.clients.write().unwrap();
        if clients.contains_key(&id) {
            return false;
        }

        Debug::ClientRegister(table, &client, options).log();
        let registration = clients.entry(id).or_insert(Registration {
            client,
            options,
            synced: false,
        });
        replay(registration.client.as_ref(), options);
        registration.synced = true;
        true
    }

    // Removes the client. Waits for any notification fan-out already in
    // progress, so nothing is delivered to the client after this returns.
    pub(crate) fn unregister(
        &self,
        table: &str,
        client: &Arc<dyn RouteTableClient<A>>,
    ) -> bool {
        let id = ClientId::of(client);
        let mut clients = self.clients.write().unwrap();
        let removed = clients.remove(&id).is_some();
        if removed {
            Debug::ClientUnregister(table, client).log();
        }
        removed
    }

    pub(crate) fn clients(&self) -> Vec<Registration<A>> {
        let clients = self.clients.read().unwrap();
        clients.values().cloned().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.clients.read().unwrap().len()
    }

    // Notifies a change of the best path of a prefix.
    pub(crate) fn notify_best(
        &self,
        prefix: A::IpNetwork,
        old: Option<&Path>,
        new: Option<&Path>,
    ) {
        self.fan_out(ClientOptions::BestOnly, prefix, old, new);
    }

    // Notifies a change of the candidate path of one source.
    pub(crate) fn notify_candidate(
        &self,
        prefix: A::IpNetwork,
        old: Option<&Path>,
        new: Option<&Path>,
    ) {
        self.fan_out(ClientOptions::AllPaths, prefix, old, new);
    }

    fn fan_out(
        &self,
        options: ClientOptions,
        prefix: A::IpNetwork,
        old: Option<&Path>,
        new: Option<&Path>,
    ) {
        if old == new {
            return;
        }

        let clients = self.clients.read().unwrap();
        for registration in clients
            .values()
            .filter(|reg| reg.synced && reg.options == options)
        {
            let client = &registration.client;
            match (old, new) {
                (None, Some(new)) => client.path_added(prefix, new.clone()),
                (Some(old), None) => client.path_removed(prefix, old.clone()),
                (Some(old), Some(new)) => {
                    client.path_replaced(prefix, old.clone(), new.clone())
                }
                (None, None) => (),
            }
        }
    }
}

impl<A: AddressFamily> Default for ClientManager<A> {
    fn default() -> ClientManager<A> {
        ClientManager {
            clients: Default::default(),
        }
    }
}

// ===== impl ChannelClient =====

impl<A: AddressFamily> ChannelClient<A> {
    pub fn new(tx: UnboundedSender<RouteUpdate<A>>) -> ChannelClient<A> {
        ChannelClient { tx }
    }

    // Creates a client together with the receiving end of its queue.
    pub fn channel() -> (Arc<ChannelClient<A>>, UnboundedReceiver<RouteUpdate<A>>)
    {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(ChannelClient::new(tx)), rx)
    }

    fn send(&self, update: RouteUpdate<A>) {
        // The consumer went away; it will be unregistered by its owner.
        let _ = self.tx.send(update);
    }
}

impl<A: AddressFamily> RouteTableClient<A> for ChannelClient<A> {
    fn path_added(&self, prefix: A::IpNetwork, path: Path) {
        self.send(RouteUpdate::Add { prefix, path });
    }

    fn path_removed(&self, prefix: A::IpNetwork, path: Path) {
        self.send(RouteUpdate::Remove { prefix, path });
    }

    fn path_replaced(&self, prefix: A::IpNetwork, old: Path, new: Path) {
        self.send(RouteUpdate::Replace { prefix, old, new });
    }
}

// ===== impl RouteUpdate =====

impl<A: AddressFamily> RouteUpdate<A> {
    pub fn prefix(&self) -> A::IpNetwork {
        match self {
            RouteUpdate::Add { prefix, .. }
            | RouteUpdate::Remove { prefix, .. }
            | RouteUpdate::Replace { prefix, .. } => *prefix,
        }
    }

    // Path that is current for the prefix after this update, if any.
    pub fn current(&self) -> Option<&Path> {
        match self {
            RouteUpdate::Add { path, .. } => Some(path),
            RouteUpdate::Replace { new, .. } => Some(new),
            RouteUpdate::Remove { .. } => None,
        }
    }
}
