use std::sync::atomic::{AtomicUsize, Ordering};

/// Counters shared by every session of a simulator.
#[derive(Debug, Default)]
pub struct SimStats {
    /// Number of connected peers
    active_sessions: AtomicUsize,
    /// Total packets injected
    packets_injected: AtomicUsize,
    /// Total hop messages written
    hop_messages: AtomicUsize,
    /// Ticks skipped because a route was at its in-flight limit
    skipped_ticks: AtomicUsize,
    /// Traversals that ended with a send error
    failed_traversals: AtomicUsize,
}

impl SimStats {
    #[inline]
    pub(crate) fn increment_active_sessions(&self) {
        self.active_sessions.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn decrement_active_sessions(&self) {
        self.active_sessions.fetch_sub(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn increment_packets_injected(&self) {
        self.packets_injected.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn increment_hop_messages(&self) {
        self.hop_messages.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn increment_skipped_ticks(&self) {
        self.skipped_ticks.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn increment_failed_traversals(&self) {
        self.failed_traversals.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn active_sessions(&self) -> usize {
        self.active_sessions.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn packets_injected(&self) -> usize {
        self.packets_injected.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn hop_messages(&self) -> usize {
        self.hop_messages.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn skipped_ticks(&self) -> usize {
        self.skipped_ticks.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn failed_traversals(&self) -> usize {
        self.failed_traversals.load(Ordering::Relaxed)
    }
}
