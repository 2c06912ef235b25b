use std::sync::{Mutex, PoisonError};

use tokio_util::sync::CancellationToken;

/// Handle for one logical call: its generation and the token the network
/// layer must race against.
#[derive(Debug, Clone)]
pub struct CallHandle {
    pub generation: u64,
    pub token: CancellationToken,
}

struct Current {
    generation: u64,
    token: Option<CancellationToken>,
}

/// Owns the single authoritative outstanding call.
///
/// Starting a call cancels whatever was in flight and bumps the generation,
/// so a superseded call can both stop its I/O and recognise that its result
/// must not be applied.
pub struct CancellationController {
    current: Mutex<Current>,
}

impl Default for CancellationController {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationController {
    pub fn new() -> Self {
        Self {
            current: Mutex::new(Current {
                generation: 0,
                token: None,
            }),
        }
    }

    /// Cancel the previous call (if any) and open a new generation.
    pub fn begin_call(&self) -> CallHandle {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = current.token.take() {
            previous.cancel();
        }
        current.generation += 1;
        let token = CancellationToken::new();
        current.token = Some(token.clone());
        CallHandle {
            generation: current.generation,
            token,
        }
    }

    /// Issue an independent token for a later round of the same call.
    ///
    /// The previous round's token is released without being cancelled.
    /// Returns `None` when `generation` has already been superseded.
    pub fn fresh_handle(&self, generation: u64) -> Option<CallHandle> {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if current.generation != generation {
            return None;
        }
        let token = CancellationToken::new();
        current.token = Some(token.clone());
        Some(CallHandle { generation, token })
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .generation
            == generation
    }

    pub fn current_generation(&self) -> u64 {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .generation
    }

    /// Cancel whatever is in flight and invalidate its generation.
    pub fn cancel_all(&self) {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(token) = current.token.take() {
            token.cancel();
        }
        current.generation += 1;
    }
}
