// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Diagnostic registry of chains that exist but have not finished.
//!
//! A chain is registered when it is created and removed when it settles, when it is
//! spliced into an outer chain, or when it is dropped without ever running. The
//! registry only holds weak references, so it never keeps a chain alive.

use dashmap::DashMap;
use serde::Serialize;
use std::sync::{Arc, Weak};

use crate::engine::root_state::{ChainId, RootState};
use crate::engine::Status;
use crate::observability::messages::chain::InflightChainReport;
use crate::observability::messages::StructuredLog;

/// Point-in-time view of one registered chain.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct InflightChain {
    pub id: ChainId,
    pub status: Status,
    pub dispatched: bool,
    pub has_tag: bool,
    pub age_ms: u64,
}

#[derive(Debug, Clone, Default)]
pub struct InflightRegistry {
    chains: Arc<DashMap<ChainId, Weak<RootState>>>,
}

impl InflightRegistry {
    pub(crate) fn register(&self, root: &Arc<RootState>) -> Registration {
        self.chains.insert(root.id(), Arc::downgrade(root));
        Registration {
            chains: Arc::clone(&self.chains),
            id: root.id(),
        }
    }

    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }

    pub fn contains(&self, id: ChainId) -> bool {
        self.chains.contains_key(&id)
    }

    /// Every registered chain, ordered by id.
    pub fn snapshot(&self) -> Vec<InflightChain> {
        let roots: Vec<Weak<RootState>> = self
            .chains
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        let mut chains: Vec<InflightChain> = roots
            .iter()
            .filter_map(Weak::upgrade)
            .map(|root| {
                let inner = root.lock();
                InflightChain {
                    id: root.id(),
                    status: inner.status(),
                    dispatched: inner.dispatched(),
                    has_tag: inner.has_tag(),
                    age_ms: u64::try_from(root.created_at().elapsed().as_millis())
                        .unwrap_or(u64::MAX),
                }
            })
            .collect();
        chains.sort_by_key(|chain| chain.id);
        chains
    }

    pub fn dump_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.snapshot())
    }

    /// Log one line per registered chain.
    pub fn log_snapshot(&self) {
        for chain in self.snapshot() {
            InflightChainReport {
                chain_id: chain.id,
                status: chain.status,
                dispatched: chain.dispatched,
                age_ms: chain.age_ms,
            }
            .log();
        }
    }
}

/// Removes its chain from the registry when dropped.
pub(crate) struct Registration {
    chains: Arc<DashMap<ChainId, Weak<RootState>>>,
    id: ChainId,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.chains.remove(&self.id);
    }
}
