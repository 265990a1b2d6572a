//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeSet;
use std::sync::Arc;

use derive_new::new;
use serde::{Deserialize, Serialize};

use crate::attribute::AttrSet;

// Identifier of the neighbor, session or protocol instance that contributed a
// path. Lower values win the final selection tie-break.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
pub struct SourceId(pub u32);

// One candidate route to a destination.
#[derive(Clone, Debug, new)]
#[derive(Serialize)]
pub struct Path {
    pub source: SourceId,
    pub attrs: Arc<AttrSet>,
    #[new(default)]
    pub ineligible_reason: Option<IneligibleReason>,
}

// Allocator of source identifiers.
//
// Identifiers increase and wrap around, skipping zero and identifiers that
// haven't been released yet.
#[derive(Debug)]
pub struct SourceIdAllocator {
    next: u32,
    in_use: BTreeSet<SourceId>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum IneligibleReason {
    AsLoop,
    NexthopUnreachable,
}

// ===== impl SourceId =====

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ===== impl SourceIdAllocator =====

impl SourceIdAllocator {
    pub fn allocate(&mut self) -> SourceId {
        loop {
            let source = SourceId(self.next);
            self.next = self.next.checked_add(1).unwrap_or(1);
            if self.in_use.insert(source) {
                return source;
            }
        }
    }

    // Returns whether the identifier was allocated.
    pub fn release(&mut self, source: SourceId) -> bool {
        self.in_use.remove(&source)
    }

    pub fn in_use(&self) -> usize {
        self.in_use.len()
    }
}

impl Default for SourceIdAllocator {
    fn default() -> SourceIdAllocator {
        SourceIdAllocator {
            next: 1,
            in_use: Default::default(),
        }
    }
}

// ===== impl Path =====

impl Path {
    pub fn ineligible(
        source: SourceId,
        attrs: Arc<AttrSet>,
        reason: IneligibleReason,
    ) -> Path {
        Path {
            source,
            attrs,
            ineligible_reason: Some(reason),
        }
    }

    pub fn is_eligible(&self) -> bool {
        self.ineligible_reason.is_none()
    }
}

// Paths are equal when they come from the same source and carry the same
// attribute set identity.
impl PartialEq for Path {
    fn eq(&self, other: &Path) -> bool {
        self.source == other.source
            && Arc::ptr_eq(&self.attrs, &other.attrs)
            && self.ineligible_reason == other.ineligible_reason
    }
}

impl Eq for Path {}

// ===== unit tests =====
