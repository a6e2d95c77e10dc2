//! # waypoint-memory
//!
//! Importance-weighted agent memory.
//!
//! `KeyedMemoryStore` implements `waypoint_core::traits::MemoryStore` over any
//! `KeyedStore`:
//!
//! - **store**: importance clamped into `[0, 1]`, optional TTL recorded
//! - **retrieve**: importance-ranked with a recency tie band, touching every
//!   memory it returns
//! - **consolidate**: important short-term memories created close together
//!   are merged into one long-term memory each
//!
//! Expiry is only enforced when `prune_expired` is called.

pub mod ranking;
pub mod store;

pub use store::{consolidated_from, KeyedMemoryStore};

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use chrono::{DateTime, Duration, TimeZone, Utc};

    use waypoint_contracts::{
        config::MemoryConfig,
        error::WaypointError,
        memory::{MemoryKind, MemoryQuery, NewMemory},
    };
    use waypoint_core::traits::{Clock, MemoryStore};
    use waypoint_store::InMemoryKeyedStore;

    use super::{consolidated_from, KeyedMemoryStore};

    const AGENT: &str = "agent-1";
    const OWNER: &str = "owner-1";

    /// A clock the test moves by hand.
    struct ManualClock {
        now: Mutex<DateTime<Utc>>,
    }

    impl ManualClock {
        fn new() -> Self {
            Self {
                now: Mutex::new(Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()),
            }
        }

        fn advance(&self, by: Duration) {
            *self.now.lock().unwrap() += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.now.lock().unwrap()
        }
    }

    fn memory_store() -> (KeyedMemoryStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let store = KeyedMemoryStore::new(Arc::new(InMemoryKeyedStore::new()), MemoryConfig::default())
            .with_clock(clock.clone());
        (store, clock)
    }

    fn note(content: &str, kind: MemoryKind, importance: f64) -> NewMemory {
        NewMemory::new(AGENT, OWNER, content, kind, importance)
    }

    #[test]
    fn test_importance_is_clamped() {
        let (store, _) = memory_store();
        assert_eq!(store.store(note("hi", MemoryKind::Semantic, 1.7)).unwrap().importance, 1.0);
        assert_eq!(store.store(note("lo", MemoryKind::Semantic, -0.2)).unwrap().importance, 0.0);
        assert_eq!(store.store(note("nan", MemoryKind::Semantic, f64::NAN)).unwrap().importance, 0.0);
    }

    #[test]
    fn test_retrieve_filters_by_threshold_and_kind() {
        let (store, _) = memory_store();
        store.store(note("a", MemoryKind::ShortTerm, 0.2)).unwrap();
        store.store(note("b", MemoryKind::ShortTerm, 0.5)).unwrap();
        store.store(note("c", MemoryKind::LongTerm, 0.9)).unwrap();

        let important = store
            .retrieve(&MemoryQuery::for_agent(AGENT).min_importance(0.5))
            .unwrap();
        assert_eq!(important.len(), 2);
        assert!(important.iter().all(|m| m.importance >= 0.5));

        let long_term = store
            .retrieve(&MemoryQuery::for_agent(AGENT).kind(MemoryKind::LongTerm))
            .unwrap();
        assert_eq!(long_term.len(), 1);
        assert_eq!(long_term[0].content, "c");

        let limited = store.retrieve(&MemoryQuery::for_agent(AGENT).limit(1)).unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].content, "c");

        assert!(store.retrieve(&MemoryQuery::for_agent("agent-2")).unwrap().is_empty());
    }

    #[test]
    fn test_tie_band_prefers_recent_access() {
        let (store, clock) = memory_store();
        let older = store.store(note("older", MemoryKind::Semantic, 0.91)).unwrap();
        clock.advance(Duration::minutes(5));
        store.store(note("newer", MemoryKind::Semantic, 0.85)).unwrap();
        clock.advance(Duration::minutes(5));
        store.store(note("far below", MemoryKind::Semantic, 0.5)).unwrap();

        let ranked = store.retrieve(&MemoryQuery::for_agent(AGENT)).unwrap();
        let order: Vec<&str> = ranked.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(order, vec!["newer", "older", "far below"]);

        // Touching "older" alone moves it ahead of "newer".
        clock.advance(Duration::minutes(1));
        let touched = store
            .retrieve(&MemoryQuery::for_agent(AGENT).min_importance(0.9))
            .unwrap();
        assert_eq!(touched[0].id, older.id);

        clock.advance(Duration::minutes(1));
        let ranked = store.retrieve(&MemoryQuery::for_agent(AGENT).limit(2)).unwrap();
        assert_eq!(ranked[0].id, older.id);
    }

    #[test]
    fn test_retrieve_touches_results() {
        let (store, clock) = memory_store();
        let stored = store.store(note("remember me", MemoryKind::Episodic, 0.6)).unwrap();
        assert_eq!(stored.access_count, 0);

        clock.advance(Duration::minutes(3));
        let first = store.retrieve(&MemoryQuery::for_agent(AGENT)).unwrap();
        assert_eq!(first[0].access_count, 1);
        assert_eq!(first[0].last_accessed_at, clock.now());

        clock.advance(Duration::minutes(3));
        let second = store.retrieve(&MemoryQuery::for_agent(AGENT)).unwrap();
        assert_eq!(second[0].access_count, 2);

        // get_memory reads without touching.
        let peek = store.get_memory(AGENT, &stored.id).unwrap().unwrap();
        assert_eq!(peek.access_count, 2);
        assert_eq!(peek.last_accessed_at, clock.now());
        assert_eq!(peek.created_at, stored.created_at);
    }

    #[test]
    fn test_consolidation_groups_by_window() {
        let (store, clock) = memory_store();
        let t0 = store.store(note("Booked flights", MemoryKind::ShortTerm, 0.8)).unwrap();
        clock.advance(Duration::minutes(30));
        let t30 = store.store(note("Reserved hotel", MemoryKind::ShortTerm, 0.9)).unwrap();
        clock.advance(Duration::minutes(95));
        let t125 = store.store(note("Paid invoice", MemoryKind::ShortTerm, 0.7)).unwrap();

        // Not candidates: below threshold, or not short-term.
        store.store(note("trivia", MemoryKind::ShortTerm, 0.3)).unwrap();
        store.store(note("fact", MemoryKind::Semantic, 0.95)).unwrap();

        let report = store.consolidate(AGENT, OWNER).unwrap();

        assert_eq!(report.created.len(), 2);
        assert_eq!(report.removed, 3);

        let first = &report.created[0];
        assert_eq!(first.kind, MemoryKind::LongTerm);
        assert_eq!(first.content, "Booked flights. Reserved hotel");
        assert!((first.importance - 0.85).abs() < 1e-9);
        assert_eq!(consolidated_from(first), vec![t0.id.clone(), t30.id.clone()]);

        let second = &report.created[1];
        assert_eq!(second.content, "Paid invoice");
        assert_eq!(consolidated_from(second), vec![t125.id.clone()]);

        for id in [&t0.id, &t30.id, &t125.id] {
            assert!(store.get_memory(AGENT, id).unwrap().is_none());
        }

        let stats = store.get_stats(AGENT).unwrap();
        assert_eq!(stats.total, 4);
        assert_eq!(stats.by_kind.get(&MemoryKind::LongTerm), Some(&2));
        assert_eq!(stats.by_kind.get(&MemoryKind::ShortTerm), Some(&1));

        // A second pass finds nothing left to merge.
        let again = store.consolidate(AGENT, OWNER).unwrap();
        assert!(again.created.is_empty());
        assert_eq!(again.removed, 0);
    }

    #[test]
    fn test_stats_and_delete() {
        let (store, _) = memory_store();
        let empty = store.get_stats(AGENT).unwrap();
        assert_eq!(empty.total, 0);
        assert_eq!(empty.avg_importance, 0.0);

        let a = store.store(note("a", MemoryKind::Episodic, 0.4)).unwrap();
        store.store(note("b", MemoryKind::Episodic, 0.8)).unwrap();

        let stats = store.get_stats(AGENT).unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.by_kind.get(&MemoryKind::Episodic), Some(&2));
        assert!((stats.avg_importance - 0.6).abs() < 1e-9);

        store.delete_memory(AGENT, &a.id).unwrap();
        assert_eq!(store.get_stats(AGENT).unwrap().total, 1);
        assert!(matches!(store.delete_memory(AGENT, &a.id), Err(WaypointError::NotFound { .. })));
        assert!(matches!(store.delete_memory("agent-2", "nope"), Err(WaypointError::NotFound { .. })));
    }

    #[test]
    fn test_ttl_sets_expiry_and_prune_removes() {
        let (store, clock) = memory_store();
        let short = store
            .store(note("temporary", MemoryKind::ShortTerm, 0.5).with_ttl_days(1))
            .unwrap();
        let keep = store.store(note("keep", MemoryKind::ShortTerm, 0.5)).unwrap();
        assert_eq!(short.expires_at, Some(short.created_at + Duration::days(1)));
        assert!(keep.expires_at.is_none());

        // Still present before the deadline.
        assert_eq!(store.prune_expired(AGENT).unwrap(), 0);

        clock.advance(Duration::days(2));
        assert_eq!(store.prune_expired(AGENT).unwrap(), 1);
        assert!(store.get_memory(AGENT, &short.id).unwrap().is_none());
        assert!(store.get_memory(AGENT, &keep.id).unwrap().is_some());
    }

    #[test]
    fn test_ttl_past_calendar_range_is_rejected() {
        let (store, _) = memory_store();

        let result = store.store(note("forever", MemoryKind::LongTerm, 0.5).with_ttl_days(u32::MAX));

        assert!(matches!(result, Err(WaypointError::Validation { .. })));
        assert_eq!(store.get_stats(AGENT).unwrap().total, 0);
    }
}
