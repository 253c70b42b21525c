//! Process-wide backend instances.
//!
//! Backends are loaded on first use and then shared by every worker. A slot
//! can be reset between runs (or in tests) and will reload on the next call.

use std::sync::{Arc, PoisonError, RwLock};

use super::japanese::JapaneseBackend;
use super::korean::KoreanBackend;
use super::Transliterate;
use crate::error::TransliterationError;
use crate::script::ScriptFamily;

pub struct BackendSlot<B> {
    cell: RwLock<Option<Arc<B>>>,
    load: fn() -> B,
}

impl<B> BackendSlot<B> {
    pub const fn new(load: fn() -> B) -> Self {
        Self {
            cell: RwLock::new(None),
            load,
        }
    }

    /// Return the loaded backend, loading it at most once even when many
    /// workers ask at the same time.
    pub fn get(&self) -> Arc<B> {
        if let Some(b) = self
            .cell
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            return Arc::clone(b);
        }
        let mut guard = self.cell.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(guard.get_or_insert_with(|| Arc::new((self.load)())))
    }

    /// Drop the loaded instance. Callers holding an `Arc` keep theirs.
    pub fn reset(&self) {
        *self.cell.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn is_loaded(&self) -> bool {
        self.cell
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

pub static JAPANESE: BackendSlot<JapaneseBackend> = BackendSlot::new(JapaneseBackend::load);
pub static KOREAN: BackendSlot<KoreanBackend> = BackendSlot::new(KoreanBackend::load);

/// Handle to a process-wide backend; cheap to copy into every worker.
pub struct Shared<B: 'static>(pub &'static BackendSlot<B>);

impl<B: 'static> Clone for Shared<B> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<B: 'static> Copy for Shared<B> {}

impl<B: Transliterate + 'static> Transliterate for Shared<B> {
    fn can_handle(&self, family: ScriptFamily) -> bool {
        self.0.get().can_handle(family)
    }

    fn transliterate(&self, text: &str) -> Result<String, TransliterationError> {
        self.0.get().transliterate(text)
    }
}
