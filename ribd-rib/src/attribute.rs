//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::net::IpAddr;
use std::sync::{Arc, Mutex, Weak};

use num_derive::{FromPrimitive, ToPrimitive};
use serde::{Deserialize, Serialize};

pub const DFLT_LOCAL_PREF: u32 = 100;

// Forwarding attributes of a path.
//
// Attributes are compared by value. Best-path selection only ever reads
// them through an interned `AttrSet`.
#[derive(Clone, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
pub struct Attrs {
    pub origin: Origin,
    pub as_path: AsPath,
    pub nexthop: Option<IpAddr>,
    // MULTI_EXIT_DISC for BGP, link metric for ISIS.
    pub metric: Option<u32>,
    pub local_pref: Option<u32>,
    pub communities: BTreeSet<u32>,
}

#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[derive(FromPrimitive, ToPrimitive)]
#[derive(Deserialize, Serialize)]
pub enum Origin {
    #[default]
    Igp = 0,
    Egp = 1,
    Incomplete = 2,
}

#[derive(Clone, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
pub struct AsPath {
    pub segments: VecDeque<AsPathSegment>,
}

#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
pub struct AsPathSegment {
    pub seg_type: AsPathSegmentType,
    pub members: VecDeque<u32>,
}

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[derive(FromPrimitive, ToPrimitive)]
#[derive(Deserialize, Serialize)]
pub enum AsPathSegmentType {
    Set = 1,
    Sequence = 2,
}

// Interned attribute set.
//
// Two paths carry the same `AttrSet` (same `index`) if and only if their
// attributes are equal by value, as long as both were obtained from the same
// `AttrStore`.
#[derive(Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct AttrSet {
    pub index: u64,
    pub value: Attrs,
}

// Canonical store of attribute sets.
#[derive(Debug, Default)]
pub struct AttrStore {
    inner: Mutex<AttrStoreInner>,
}

#[derive(Debug, Default)]
struct AttrStoreInner {
    tree: BTreeMap<Attrs, Weak<AttrSet>>,
    next_index: u64,
}

// ===== impl Attrs =====

impl Attrs {
    pub fn local_pref(&self) -> u32 {
        self.local_pref.unwrap_or(DFLT_LOCAL_PREF)
    }

    pub fn metric(&self) -> u32 {
        self.metric.unwrap_or(0)
    }
}

// ===== impl AsPath =====

impl AsPath {
    pub fn from_sequence(asns: impl IntoIterator<Item = u32>) -> AsPath {
        let members: VecDeque<u32> = asns.into_iter().collect();
        if members.is_empty() {
            return AsPath::default();
        }
        AsPath {
            segments: [AsPathSegment {
                seg_type: AsPathSegmentType::Sequence,
                members,
            }]
            .into(),
        }
    }

    // An AS_SET counts as a single hop regardless of its size.
    pub fn path_length(&self) -> u32 {
        self.segments
            .iter()
            .map(|segment| match segment.seg_type {
                AsPathSegmentType::Set => 1,
                AsPathSegmentType::Sequence => segment.members.len(),
            })
            .sum::<usize>() as u32
    }

    // Returns the neighboring AS, if any.
    pub fn first(&self) -> Option<u32> {
        self.segments
            .front()
            .filter(|segment| segment.seg_type == AsPathSegmentType::Sequence)
            .and_then(|segment| segment.members.front().copied())
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.segments
            .iter()
            .flat_map(|segment| segment.members.iter().copied())
    }

    pub fn prepend(&mut self, asn: u32) {
        if let Some(segment) = self.segments.front_mut()
            && segment.seg_type == AsPathSegmentType::Sequence
            && segment.members.len() < 255
        {
            segment.members.push_front(asn);
        } else {
            self.segments.push_front(AsPathSegment {
                seg_type: AsPathSegmentType::Sequence,
                members: [asn].into(),
            });
        }
    }

    pub fn contains(&self, asn: u32) -> bool {
        self.iter().any(|member| member == asn)
    }
}

// ===== impl AttrStore =====

impl AttrStore {
    // Returns the canonical attribute set for the given value, creating it if
    // no live set holds an equal value.
    pub fn get(&self, attrs: Attrs) -> Arc<AttrSet> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(attr_set) = inner.tree.get(&attrs).and_then(Weak::upgrade)
        {
            return attr_set;
        }

        inner.next_index += 1;
        let attr_set = Arc::new(AttrSet {
            index: inner.next_index,
            value: attrs.clone(),
        });
        inner.tree.insert(attrs, Arc::downgrade(&attr_set));
        attr_set
    }

    // Number of attribute sets still referenced by at least one path.
    pub fn len(&self) -> usize {
        let inner = self.inner.lock().unwrap();
        inner
            .tree
            .values()
            .filter(|attr_set| attr_set.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Number of tracked attribute sets no longer referenced by any path.
    pub fn stale_count(&self) -> usize {
        let inner = self.inner.lock().unwrap();
        inner
            .tree
            .values()
            .filter(|attr_set| attr_set.strong_count() == 0)
            .count()
    }

    // Drops bookkeeping for attribute sets no longer referenced.
    //
    // Callers run this after withdrawing a source's routes.
    pub fn purge(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.tree.retain(|_, attr_set| attr_set.strong_count() > 0);
    }
}

// ===== unit tests =====
