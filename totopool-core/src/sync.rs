//! Thread-safe handle to an [`Engine`].
//!
//! All operations go through one lock, so they execute in a total order and
//! each one completes before the next begins.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::engine::Engine;

pub struct SharedEngine<A, C> {
    inner: Arc<Mutex<Engine<A, C>>>,
}

impl<A, C> SharedEngine<A, C> {
    pub fn new(engine: Engine<A, C>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(engine)),
        }
    }

    /// Runs `f` with exclusive access to the engine.
    pub fn with<R>(&self, f: impl FnOnce(&mut Engine<A, C>) -> R) -> R {
        let mut engine = self.inner.lock();
        f(&mut engine)
    }

    /// Returns the engine if this is the last handle.
    pub fn try_unwrap(self) -> Result<Engine<A, C>, Self> {
        Arc::try_unwrap(self.inner)
            .map(|mutex| mutex.into_inner())
            .map_err(|inner| Self { inner })
    }
}

impl<A, C> Clone for SharedEngine<A, C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;
    use crate::ClaimId;

    #[test]
    fn test_concurrent_bets_are_serialized() {
        let mut fx = Fixture::new();
        let id = fx.create_condition();
        let bettors = fx.bettors.clone();
        let shared = SharedEngine::new(fx.engine);

        std::thread::scope(|scope| {
            for (i, bettor) in bettors.iter().enumerate() {
                let shared = shared.clone();
                let outcome = if i % 2 == 0 { OUTCOME_WIN } else { OUTCOME_LOSE };
                scope.spawn(move || {
                    for _ in 0..10 {
                        shared
                            .with(|engine| engine.place_bet(bettor, &id, outcome, BET))
                            .unwrap();
                    }
                });
            }
        });

        let engine = match shared.try_unwrap() {
            Ok(engine) => engine,
            Err(_) => panic!("handles outlived the scope"),
        };
        let condition = engine.condition(&id).unwrap();
        let per_side = (bettors.len() as u64 / 2) * 10 * BET;
        assert_eq!(condition.totals, vec![per_side, per_side]);
        assert_eq!(engine.total_supply(&ClaimId::new(id, OUTCOME_WIN)), per_side);
        assert_eq!(engine.assets().custody(), 2 * per_side);
        assert_eq!(engine.events().len(), bettors.len() * 10 + 1);
    }
}
