//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::path::{Path, SourceId};

// Best-path comparison function.
//
// Implementations must define a total order over paths with distinct
// sources, so that selection over a fixed candidate set always yields the
// same winner regardless of insertion order.
pub trait PathSelection: std::fmt::Debug + Send + Sync {
    // Compares two eligible candidates.
    fn compare(&self, a: &Path, b: &Path) -> RouteCompare;
}

// Standard BGP decision process.
#[derive(Clone, Copy, Debug, Default)]
pub struct BgpSelection;

// ISIS route preference: lowest metric.
#[derive(Clone, Copy, Debug, Default)]
pub struct IsisSelection;

// Result of comparing candidate `a` against candidate `b`. The reason
// describes why the losing candidate lost.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RouteCompare {
    Preferred(RejectReason),
    LessPreferred(RejectReason),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum RejectReason {
    LocalPrefLower,
    PathLonger,
    OriginTypeHigher,
    MetricHigher,
    HigherSourceId,
}

// ===== impl BgpSelection =====

impl PathSelection for BgpSelection {
    fn compare(&self, a: &Path, b: &Path) -> RouteCompare {
        let (a_attrs, b_attrs) = (&a.attrs.value, &b.attrs.value);

        // Higher local preference wins.
        let ord = b_attrs.local_pref().cmp(&a_attrs.local_pref());
        if let Some(cmp) = decide(ord, RejectReason::LocalPrefLower) {
            return cmp;
        }

        // Shorter AS path wins.
        let ord = a_attrs
            .as_path
            .path_length()
            .cmp(&b_attrs.as_path.path_length());
        if let Some(cmp) = decide(ord, RejectReason::PathLonger) {
            return cmp;
        }

        // Lower origin type wins.
        let ord = a_attrs.origin.cmp(&b_attrs.origin);
        if let Some(cmp) = decide(ord, RejectReason::OriginTypeHigher) {
            return cmp;
        }

        // Lower metric wins.
        let ord = a_attrs.metric().cmp(&b_attrs.metric());
        if let Some(cmp) = decide(ord, RejectReason::MetricHigher) {
            return cmp;
        }

        compare_source(a.source, b.source)
    }
}

// ===== impl IsisSelection =====

impl PathSelection for IsisSelection {
    fn compare(&self, a: &Path, b: &Path) -> RouteCompare {
        let ord = a.attrs.value.metric().cmp(&b.attrs.value.metric());
        if let Some(cmp) = decide(ord, RejectReason::MetricHigher) {
            return cmp;
        }

        compare_source(a.source, b.source)
    }
}

// ===== helper functions =====

// Maps an ordering where `Less` means "a is better" to a comparison result.
fn decide(ord: Ordering, reason: RejectReason) -> Option<RouteCompare> {
    match ord {
        Ordering::Less => Some(RouteCompare::Preferred(reason)),
        Ordering::Greater => Some(RouteCompare::LessPreferred(reason)),
        Ordering::Equal => None,
    }
}

// Final tie-break. Candidates of a single destination never share a source,
// so this always picks a winner.
fn compare_source(a: SourceId, b: SourceId) -> RouteCompare {
    if a <= b {
        RouteCompare::Preferred(RejectReason::HigherSourceId)
    } else {
        RouteCompare::LessPreferred(RejectReason::HigherSourceId)
    }
}

// ===== global functions =====

// Selects the best eligible path among the given candidates, recording why
// each eligible loser was rejected.
pub(crate) fn best_path<'a>(
    selection: &dyn PathSelection,
    paths: impl IntoIterator<Item = &'a Path>,
    rejected: &mut BTreeMap<SourceId, RejectReason>,
) -> Option<&'a Path> {
    let mut best: Option<&'a Path> = None;

    rejected.clear();
    for path in paths.into_iter().filter(|path| path.is_eligible()) {
        match best {
            None => best = Some(path),
            Some(current) => match selection.compare(path, current) {
                RouteCompare::Preferred(reason) => {
                    rejected.insert(current.source, reason);
                    best = Some(path);
                }
                RouteCompare::LessPreferred(reason) => {
                    rejected.insert(path.source, reason);
                }
            },
        }
    }

    best
}

// ===== unit tests =====
