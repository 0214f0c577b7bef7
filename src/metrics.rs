// SPDX-License-Identifier: Apache-2.0

//! Lightweight in-memory counters for credential and pool activity.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

use serde::Serialize;

#[derive(Default)]
struct ResolutionMetrics {
    credentials_acquired: AtomicU64,
    credential_failures: AtomicU64,
    authorization_denials: AtomicU64,
    pools_created: AtomicU64,
    pools_evicted: AtomicU64,
    pool_exhaustions: AtomicU64,
    cancelled_checkouts: AtomicU64,
}

static RESOLUTION_METRICS: OnceLock<ResolutionMetrics> = OnceLock::new();

fn metrics() -> &'static ResolutionMetrics {
    RESOLUTION_METRICS.get_or_init(ResolutionMetrics::default)
}

pub fn record_credential(success: bool) {
    let metrics = metrics();
    if success {
        metrics.credentials_acquired.fetch_add(1, Ordering::Relaxed);
    } else {
        metrics.credential_failures.fetch_add(1, Ordering::Relaxed);
    }
}

pub fn record_authorization_denied() {
    metrics().authorization_denials.fetch_add(1, Ordering::Relaxed);
}

pub fn record_pool_created() {
    metrics().pools_created.fetch_add(1, Ordering::Relaxed);
}

pub fn record_pools_evicted(count: u64) {
    metrics().pools_evicted.fetch_add(count, Ordering::Relaxed);
}

pub fn record_pool_exhausted() {
    metrics().pool_exhaustions.fetch_add(1, Ordering::Relaxed);
}

pub fn record_checkout_cancelled() {
    metrics().cancelled_checkouts.fetch_add(1, Ordering::Relaxed);
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolutionMetricsSnapshot {
    pub credentials_acquired: u64,
    pub credential_failures: u64,
    pub authorization_denials: u64,
    pub pools_created: u64,
    pub pools_evicted: u64,
    pub pool_exhaustions: u64,
    pub cancelled_checkouts: u64,
}

pub fn snapshot() -> ResolutionMetricsSnapshot {
    let metrics = metrics();
    ResolutionMetricsSnapshot {
        credentials_acquired: metrics.credentials_acquired.load(Ordering::Relaxed),
        credential_failures: metrics.credential_failures.load(Ordering::Relaxed),
        authorization_denials: metrics.authorization_denials.load(Ordering::Relaxed),
        pools_created: metrics.pools_created.load(Ordering::Relaxed),
        pools_evicted: metrics.pools_evicted.load(Ordering::Relaxed),
        pool_exhaustions: metrics.pool_exhaustions.load(Ordering::Relaxed),
        cancelled_checkouts: metrics.cancelled_checkouts.load(Ordering::Relaxed),
    }
}
