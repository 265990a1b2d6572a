//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use prefix_trie::map::PrefixMap;
use ribd_utils::ip::IpNetworkKind;
use ribd_utils::protocol::Protocol;
use serde::Serialize;

use crate::af::AddressFamily;
use crate::client::{
    ClientManager, ClientOptions, Registration, RouteTableClient,
};
use crate::debug::Debug;
use crate::path::{Path, SourceId};
use crate::selection::{self, PathSelection, RejectReason};

// Store of destination prefixes and their candidate paths.
//
// All mutations of a table are linearized by its entry lock, and client
// notifications resulting from a mutation are delivered before the lock is
// released. Clients therefore observe the changes of any single prefix in
// the order they were committed.
pub struct RoutingTable<A: AddressFamily> {
    name: String,
    protocol: Protocol,
    selection: Arc<dyn PathSelection>,
    inner: Mutex<TableInner<A>>,
    route_count: AtomicUsize,
    clients: ClientManager<A>,
}

struct TableInner<A: AddressFamily> {
    prefixes: PrefixMap<A::IpNetwork, Destination>,
    // Reverse index used for bulk removals.
    sources: BTreeMap<SourceId, BTreeSet<A::IpNetwork>>,
}

// Routing table entry. Never empty: a destination without candidates is
// removed from its table.
#[derive(Clone, Debug, Default)]
#[derive(Serialize)]
pub struct Destination {
    pub paths: BTreeMap<SourceId, Path>,
    pub best: Option<Path>,
    pub rejected: BTreeMap<SourceId, RejectReason>,
}

// ===== impl RoutingTable =====

impl<A> RoutingTable<A>
where
    A: AddressFamily,
{
    pub fn new(
        protocol: Protocol,
        name: impl Into<String>,
        selection: impl PathSelection + 'static,
    ) -> RoutingTable<A> {
        RoutingTable {
            name: name.into(),
            protocol,
            selection: Arc::new(selection),
            inner: Mutex::new(TableInner {
                prefixes: Default::default(),
                sources: Default::default(),
            }),
            route_count: AtomicUsize::new(0),
            clients: Default::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    // Inserts or replaces the candidate of `path.source` for the prefix.
    pub fn add_path(&self, prefix: A::IpNetwork, path: Path) {
        let mut inner = self.inner.lock().unwrap();
        self.update(&mut inner, prefix.apply_mask(), None, Some(path));
    }

    // Removes the candidate of the given source for the prefix, returning it.
    pub fn remove_path(
        &self,
        prefix: A::IpNetwork,
        source: SourceId,
    ) -> Option<Path> {
        let mut inner = self.inner.lock().unwrap();
        self.update(&mut inner, prefix.apply_mask(), Some(source), None)
    }

    // Atomically removes the candidate of `old` and inserts `new`, so that
    // clients only observe the net effect on the best path.
    pub fn replace_path(
        &self,
        prefix: A::IpNetwork,
        old: SourceId,
        new: Path,
    ) -> Option<Path> {
        let mut inner = self.inner.lock().unwrap();
        self.update(&mut inner, prefix.apply_mask(), Some(old), Some(new))
    }

    // Removes every path contributed by the given source.
    //
    // The whole removal happens in a single critical section and each
    // affected prefix is notified once, with its net best-path change. When
    // an alternative exists, clients see a replacement, never a transient
    // withdrawal.
    pub fn remove_source(&self, source: SourceId) -> usize {
        let mut inner = self.inner.lock().unwrap();
        let Some(prefixes) = inner.sources.remove(&source) else {
            return 0;
        };

        Debug::SourceRemove(&self.name, source, prefixes.len()).log();
        for prefix in &prefixes {
            self.update(&mut inner, *prefix, Some(source), None);
        }
        prefixes.len()
    }

    // Removes all entries, notifying withdrawals to every client.
    pub fn clear(&self) {
        let mut inner = self.inner.lock().unwrap();
        let prefixes: PrefixMap<A::IpNetwork, Destination> =
            std::mem::take(&mut inner.prefixes);
        inner.sources.clear();
        self.route_count.store(0, Ordering::Release);

        Debug::TableClear(&self.name, prefixes.iter().count()).log();
        for (prefix, dest) in prefixes.iter() {
            for path in dest.paths.values() {
                self.clients.notify_candidate(*prefix, Some(path), None);
            }
            self.clients.notify_best(*prefix, dest.best.as_ref(), None);
        }
    }

    // Number of destinations holding at least one path.
    //
    // Lock-free; reflects the last committed mutation.
    pub fn route_count(&self) -> usize {
        self.route_count.load(Ordering::Acquire)
    }

    // Returns the current best path of the exact prefix.
    pub fn lookup(&self, prefix: &A::IpNetwork) -> Option<Path> {
        let inner = self.inner.lock().unwrap();
        inner
            .prefixes
            .get(&prefix.apply_mask())
            .and_then(|dest| dest.best.clone())
    }

    // Returns the candidates of the exact prefix.
    pub fn lookup_paths(&self, prefix: &A::IpNetwork) -> Vec<Path> {
        let inner = self.inner.lock().unwrap();
        inner
            .prefixes
            .get(&prefix.apply_mask())
            .map(|dest| dest.paths.values().cloned().collect())
            .unwrap_or_default()
    }

    // Returns the most specific prefix covering the address that has a best
    // path, along with that path.
    pub fn lookup_longest_match(
        &self,
        addr: A::IpAddr,
    ) -> Option<(A::IpNetwork, Path)> {
        let inner = self.inner.lock().unwrap();
        let mut key = <A::IpNetwork as IpNetworkKind<A::IpAddr>>::host(addr);
        loop {
            let (prefix, dest) = inner.prefixes.get_lpm(&key)?;
            if let Some(best) = &dest.best {
                return Some((*prefix, best.clone()));
            }
            key = prefix.supernet()?;
        }
    }

    // Consistent snapshot of every entry.
    pub fn dump(&self) -> Vec<(A::IpNetwork, Destination)> {
        let inner = self.inner.lock().unwrap();
        inner
            .prefixes
            .iter()
            .map(|(prefix, dest)| (*prefix, dest.clone()))
            .collect()
    }

    // Registers a client interested in best-path changes only.
    pub fn register(&self, client: Arc<dyn RouteTableClient<A>>) -> bool {
        self.register_with_options(client, ClientOptions::BestOnly)
    }

    // Registers a client, replaying the current table contents to it.
    //
    // Registering an already registered client is a no-op and returns
    // `false`.
    pub fn register_with_options(
        &self,
        client: Arc<dyn RouteTableClient<A>>,
        options: ClientOptions,
    ) -> bool {
        // Mutations are blocked while the snapshot is replayed.
        let inner = self.inner.lock().unwrap();
        self.clients
            .register(&self.name, client, options, |client, options| {
                let routes = inner
                    .prefixes
                    .iter()
                    .flat_map(|(prefix, dest)| {
                        let paths: Vec<&Path> = match options {
                            ClientOptions::BestOnly => {
                                dest.best.iter().collect()
                            }
                            ClientOptions::AllPaths => {
                                dest.paths.values().collect()
                            }
                        };
                        paths
                            .into_iter()
                            .map(move |path| (*prefix, path.clone()))
                    })
                    .collect();
                client.update_new_client(routes);
            })
    }

    pub fn unregister(&self, client: &Arc<dyn RouteTableClient<A>>) -> bool {
        self.clients.unregister(&self.name, client)
    }

    // Current registrations, for diagnostics.
    pub fn clients(&self) -> Vec<Registration<A>> {
        self.clients.clients()
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    // Applies a single-prefix mutation and notifies its effects.
    fn update(
        &self,
        inner: &mut TableInner<A>,
        prefix: A::IpNetwork,
        remove: Option<SourceId>,
        add: Option<Path>,
    ) -> Option<Path> {
        let TableInner { prefixes, sources } = inner;

        if prefixes.get(&prefix).is_none() {
            if add.is_none() {
                return None;
            }
            prefixes.insert(prefix, Destination::default());
            self.route_count.fetch_add(1, Ordering::AcqRel);
        }
        let dest = prefixes.get_mut(&prefix)?;
        let old_best = dest.best.clone();

        // Update candidates.
        let removed = remove
            .filter(|source| add.as_ref().is_none_or(|p| p.source != *source))
            .and_then(|source| dest.paths.remove(&source));
        let replaced = add
            .as_ref()
            .and_then(|path| dest.paths.insert(path.source, path.clone()));

        // Run best-path selection.
        dest.best = selection::best_path(
            self.selection.as_ref(),
            dest.paths.values(),
            &mut dest.rejected,
        )
        .cloned();
        let new_best = dest.best.clone();
        match &new_best {
            Some(best) => {
                Debug::BestPathFound(&self.name, prefix.into(), best).log()
            }
            None => Debug::BestPathNotFound(&self.name, prefix.into()).log(),
        }

        // Update source index.
        if let Some(removed) = &removed {
            remove_source_index(sources, removed.source, &prefix);
        }
        if let Some(path) = &add {
            sources.entry(path.source).or_default().insert(prefix);
        }

        // Delete empty destinations.
        if dest.paths.is_empty() {
            prefixes.remove(&prefix);
            self.route_count.fetch_sub(1, Ordering::AcqRel);
        }

        // Notify clients. The table stays locked until they return.
        if let Some(removed) = &removed {
            self.clients.notify_candidate(prefix, Some(removed), None);
        }
        if let Some(path) = &add {
            self.clients
                .notify_candidate(prefix, replaced.as_ref(), Some(path));
        }
        self.clients
            .notify_best(prefix, old_best.as_ref(), new_best.as_ref());

        removed.or(replaced)
    }
}

impl<A: AddressFamily> std::fmt::Debug for RoutingTable<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoutingTable")
            .field("name", &self.name)
            .field("protocol", &self.protocol)
            .field("selection", &self.selection)
            .field("route_count", &self.route_count())
            .finish()
    }
}

// A table registered with another table mirrors its output.
impl<A: AddressFamily> RouteTableClient<A> for RoutingTable<A> {
    fn update_new_client(&self, routes: Vec<(A::IpNetwork, Path)>) {
        let mut inner = self.inner.lock().unwrap();
        for (prefix, path) in routes {
            self.update(&mut inner, prefix.apply_mask(), None, Some(path));
        }
    }

    fn path_added(&self, prefix: A::IpNetwork, path: Path) {
        self.add_path(prefix, path);
    }

    fn path_removed(&self, prefix: A::IpNetwork, path: Path) {
        self.remove_path(prefix, path.source);
    }

    fn path_replaced(&self, prefix: A::IpNetwork, old: Path, new: Path) {
        self.replace_path(prefix, old.source, new);
    }
}

// ===== helper functions =====

fn remove_source_index<P: Ord>(
    sources: &mut BTreeMap<SourceId, BTreeSet<P>>,
    source: SourceId,
    prefix: &P,
) {
    if let Some(prefixes) = sources.get_mut(&source) {
        prefixes.remove(prefix);
        if prefixes.is_empty() {
            sources.remove(&source);
        }
    }
}
