//! # Session Registry
//!
//! Maps session keys to player sessions and running extractions, and
//! enforces the cap on players holding a loaded track.
//!
//! The maps sit behind `parking_lot::RwLock`s and are only held for map
//! operations, never across an await. Admission to the player cap goes
//! through [`SlotReservation`], so two concurrent prepares on different
//! keys cannot both take the last slot.

use crate::error::{CoreError, Result};
use core_playback::PlayerSession;
use core_runtime::session::SessionKey;
use core_waveform::WaveformExtractor;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Holds one player slot while a prepare is in flight.
///
/// Dropped once the prepare finished; by then a successful session reports
/// `holds_track` itself.
#[derive(Debug)]
pub struct SlotReservation {
    pending: Option<Arc<AtomicUsize>>,
}

impl Drop for SlotReservation {
    fn drop(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.fetch_sub(1, Ordering::AcqRel);
        }
    }
}

#[derive(Debug)]
pub struct SessionRegistry {
    players: RwLock<HashMap<SessionKey, Arc<PlayerSession>>>,
    extractors: RwLock<HashMap<SessionKey, Arc<WaveformExtractor>>>,
    pending: Arc<AtomicUsize>,
    max_players: usize,
}

impl SessionRegistry {
    pub fn new(max_players: usize) -> Self {
        Self {
            players: RwLock::new(HashMap::new()),
            extractors: RwLock::new(HashMap::new()),
            pending: Arc::new(AtomicUsize::new(0)),
            max_players,
        }
    }

    pub fn max_players(&self) -> usize {
        self.max_players
    }

    // ========================================================================
    // Players
    // ========================================================================

    pub fn player(&self, key: &SessionKey) -> Option<Arc<PlayerSession>> {
        self.players.read().get(key).cloned()
    }

    /// Existing session for `key`, or the one built by `create`.
    pub fn get_or_insert_player(
        &self,
        key: &SessionKey,
        create: impl FnOnce() -> PlayerSession,
    ) -> Arc<PlayerSession> {
        if let Some(existing) = self.player(key) {
            return existing;
        }
        let mut players = self.players.write();
        Arc::clone(players.entry(key.clone()).or_insert_with(|| {
            debug!(session_key = %key, "Player session created");
            Arc::new(create())
        }))
    }

    pub fn player_count(&self) -> usize {
        self.players.read().len()
    }

    /// Sessions currently holding a loaded track.
    pub fn active_player_count(&self) -> usize {
        self.players
            .read()
            .values()
            .filter(|session| session.holds_track())
            .count()
    }

    /// Admit a prepare for `key` under the player cap.
    ///
    /// A key that already holds a track replaces its own track and needs no
    /// new slot.
    ///
    /// # Errors
    ///
    /// [`CoreError::Capacity`] when the other track-holding sessions plus
    /// in-flight prepares already reach the cap.
    pub fn reserve_slot(&self, key: &SessionKey) -> Result<SlotReservation> {
        // The write lock orders concurrent admissions.
        let players = self.players.write();

        if players.get(key).is_some_and(|session| session.holds_track()) {
            return Ok(SlotReservation { pending: None });
        }

        let holding = players
            .iter()
            .filter(|(other, session)| *other != key && session.holds_track())
            .count();
        let in_flight = self.pending.load(Ordering::Acquire);

        if holding + in_flight >= self.max_players {
            warn!(
                session_key = %key,
                holding,
                in_flight,
                max = self.max_players,
                "Player cap reached"
            );
            return Err(CoreError::Capacity {
                max: self.max_players,
            });
        }

        self.pending.fetch_add(1, Ordering::AcqRel);
        Ok(SlotReservation {
            pending: Some(Arc::clone(&self.pending)),
        })
    }

    pub fn remove_player(&self, key: &SessionKey) -> Option<Arc<PlayerSession>> {
        self.players.write().remove(key)
    }

    /// Remove and return every player session.
    pub fn drain_players(&self) -> Vec<Arc<PlayerSession>> {
        self.players.write().drain().map(|(_, session)| session).collect()
    }

    pub fn mark_all_unmounted(&self) {
        for session in self.players.read().values() {
            session.mark_unmounted();
        }
    }

    /// Returns `false` for an unknown key.
    pub fn mark_player_unmounted(&self, key: &SessionKey) -> bool {
        match self.player(key) {
            Some(session) => {
                session.mark_unmounted();
                true
            }
            None => false,
        }
    }

    // ========================================================================
    // Extractors
    // ========================================================================

    /// Track a new extraction. A running extraction under the same key is
    /// force-stopped and replaced.
    pub fn insert_extractor(&self, extractor: Arc<WaveformExtractor>) {
        let previous = self
            .extractors
            .write()
            .insert(extractor.key().clone(), extractor);
        if let Some(previous) = previous {
            debug!(session_key = %previous.key(), "Replacing running extraction");
            previous.force_stop();
        }
    }

    /// Forget `extractor` if it is still the one tracked under its key.
    pub fn finish_extractor(&self, extractor: &Arc<WaveformExtractor>) {
        let mut extractors = self.extractors.write();
        if extractors
            .get(extractor.key())
            .is_some_and(|current| Arc::ptr_eq(current, extractor))
        {
            extractors.remove(extractor.key());
        }
    }

    pub fn extractor(&self, key: &SessionKey) -> Option<Arc<WaveformExtractor>> {
        self.extractors.read().get(key).cloned()
    }

    pub fn take_extractor(&self, key: &SessionKey) -> Option<Arc<WaveformExtractor>> {
        self.extractors.write().remove(key)
    }

    pub fn extractor_count(&self) -> usize {
        self.extractors.read().len()
    }

    /// Remove and return every tracked extraction.
    pub fn drain_extractors(&self) -> Vec<Arc<WaveformExtractor>> {
        self.extractors
            .write()
            .drain()
            .map(|(_, extractor)| extractor)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_playback::PlayerSettings;
    use core_runtime::events::EventBus;
    use core_waveform::ExtractorSettings;

    struct NoBackend;

    #[async_trait::async_trait]
    impl bridge_traits::playback::PlaybackBackend for NoBackend {
        async fn load(
            &self,
            path: &std::path::Path,
            _options: bridge_traits::playback::PlaybackOptions,
        ) -> bridge_traits::error::Result<Box<dyn bridge_traits::playback::PlaybackHandle>> {
            Err(bridge_traits::error::BridgeError::NotFound(
                path.display().to_string(),
            ))
        }
    }

    fn key(name: &str) -> SessionKey {
        SessionKey::new(name).unwrap()
    }

    fn session(name: &str) -> PlayerSession {
        PlayerSession::new(
            key(name),
            Arc::new(NoBackend),
            EventBus::default(),
            PlayerSettings::default(),
        )
    }

    #[test]
    fn get_or_insert_is_idempotent() {
        let registry = SessionRegistry::new(2);
        let a = registry.get_or_insert_player(&key("a"), || session("a"));
        let again = registry.get_or_insert_player(&key("a"), || session("a"));
        assert!(Arc::ptr_eq(&a, &again));
        assert_eq!(registry.player_count(), 1);
    }

    #[test]
    fn reservations_count_against_the_cap() {
        let registry = SessionRegistry::new(2);
        let first = registry.reserve_slot(&key("a")).unwrap();
        let _second = registry.reserve_slot(&key("b")).unwrap();
        assert!(registry.reserve_slot(&key("c")).unwrap_err().is_capacity());

        drop(first);
        assert!(registry.reserve_slot(&key("c")).is_ok());
    }

    #[test]
    fn unmount_unknown_key_reports_false() {
        let registry = SessionRegistry::new(1);
        assert!(!registry.mark_player_unmounted(&key("ghost")));

        registry.get_or_insert_player(&key("a"), || session("a"));
        assert!(registry.mark_player_unmounted(&key("a")));
        assert!(!registry.player(&key("a")).unwrap().is_mounted());
    }

    #[test]
    fn finish_extractor_only_removes_the_same_job() {
        let registry = SessionRegistry::new(1);
        let provider = Arc::new(core_playback::SymphoniaDecoderProvider::new());
        let make = || {
            Arc::new(WaveformExtractor::new(
                key("w"),
                provider.clone(),
                EventBus::default(),
                ExtractorSettings::default(),
            ))
        };

        let old = make();
        let new = make();
        registry.insert_extractor(Arc::clone(&old));
        registry.insert_extractor(Arc::clone(&new));
        assert!(old.is_cancelled());

        registry.finish_extractor(&old);
        assert_eq!(registry.extractor_count(), 1);
        registry.finish_extractor(&new);
        assert_eq!(registry.extractor_count(), 0);
    }
}
