// Translation cache & dispatcher
//
// Remembers the previous frame's fragment texts and translation. An unchanged
// frame is answered from memory; a changed one goes to the translator and the
// answer is paired back onto the fragments' bounding boxes.

use tracing::{debug, info, instrument, warn};

use crate::core::config::PairingMode;
use crate::core::errors::{TranslationError, TranslationResult};
use crate::core::types::{Fragment, TranslatedFragment, TranslatedItem, TranslationRequest};
use crate::services::translation::Translator;
use crate::utils::Metrics;

/// Dispatcher session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No translate call has been made since construction or reset
    Empty,
    /// Fragments were recorded but their translation has not succeeded (yet)
    Pending,
    /// `last_result` is the translation of `last_fragments`
    Populated,
}

pub struct TranslationDispatcher<T> {
    translator: T,
    pairing: PairingMode,
    last_fragments: Vec<Fragment>,
    last_language: String,
    last_result: Vec<TranslatedFragment>,
    // Set once last_result belongs to last_fragments; cleared when a miss starts
    settled: bool,
    metrics: Option<Metrics>,
}

impl<T: Translator> TranslationDispatcher<T> {
    pub fn new(translator: T) -> Self {
        Self {
            translator,
            pairing: PairingMode::Positional,
            last_fragments: Vec::new(),
            last_language: String::new(),
            last_result: Vec::new(),
            settled: false,
            metrics: None,
        }
    }

    pub fn with_pairing(mut self, pairing: PairingMode) -> Self {
        self.pairing = pairing;
        self
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn state(&self) -> SessionState {
        if self.settled {
            SessionState::Populated
        } else if self.last_fragments.is_empty() {
            SessionState::Empty
        } else {
            SessionState::Pending
        }
    }

    pub fn last_fragments(&self) -> &[Fragment] {
        &self.last_fragments
    }

    pub fn last_result(&self) -> &[TranslatedFragment] {
        &self.last_result
    }

    /// Forget the previous frame so the next call goes to the translator
    pub fn reset(&mut self) {
        self.last_fragments.clear();
        self.last_language.clear();
        self.last_result.clear();
        self.settled = false;
    }

    /// Whether `fragments` in `target_language` would be answered from the
    /// previous result.
    ///
    /// Texts are compared element by element and in order, and the language must
    /// match. Boxes are ignored.
    pub fn is_cache_hit(&self, fragments: &[Fragment], target_language: &str) -> bool {
        self.settled
            && self.last_language == target_language
            && fragments.len() == self.last_fragments.len()
            && fragments
                .iter()
                .zip(&self.last_fragments)
                .all(|(new, old)| new.text == old.text)
    }

    /// Translate `fragments` into `target_language`.
    ///
    /// The new fragments are recorded before the translator is called. If the call
    /// fails the previous result is kept but no longer served, so retrying the same
    /// fragments calls the translator again.
    #[instrument(skip(self, fragments), fields(fragments = fragments.len()))]
    pub async fn translate(
        &mut self,
        fragments: Vec<Fragment>,
        target_language: &str,
    ) -> TranslationResult<Vec<TranslatedFragment>> {
        if fragments.is_empty() {
            return Ok(Vec::new());
        }

        if self.is_cache_hit(&fragments, target_language) {
            info!("Detected text is unchanged, no prompt sent");
            if let Some(ref m) = self.metrics {
                m.record_cache_hit();
            }
            return Ok(self.last_result.clone());
        }

        if let Some(ref m) = self.metrics {
            m.record_cache_miss();
        }

        let request = TranslationRequest::from_fragments(&fragments, target_language);
        self.last_fragments = fragments;
        self.last_language = target_language.to_string();
        self.settled = false;

        let items = self.translator.translate(&request).await?;
        let result = pair_translations(&self.last_fragments, items, self.pairing)?;

        debug!("Translated {} of {} fragments", result.len(), self.last_fragments.len());

        self.last_result = result.clone();
        self.settled = true;

        Ok(result)
    }
}

/// Attach each translated item to the bounding box of its fragment.
///
/// `Positional` zips by list position, truncating to the shorter side; any `index`
/// values are ignored. `Indexed` requires a full permutation of request indices
/// and reorders by it, rejecting anything else as malformed.
pub fn pair_translations(
    fragments: &[Fragment],
    items: Vec<TranslatedItem>,
    mode: PairingMode,
) -> TranslationResult<Vec<TranslatedFragment>> {
    match mode {
        PairingMode::Positional => {
            if items.len() != fragments.len() {
                warn!(
                    "Translator returned {} items for {} fragments, truncating",
                    items.len(),
                    fragments.len()
                );
            }

            Ok(items
                .into_iter()
                .zip(fragments)
                .map(|(item, fragment)| TranslatedFragment {
                    text: item.text,
                    bbox: fragment.bbox,
                })
                .collect())
        }
        PairingMode::Indexed => {
            if items.len() != fragments.len() {
                return Err(TranslationError::malformed(format!(
                    "expected {} items, got {}",
                    fragments.len(),
                    items.len()
                )));
            }

            let mut slots: Vec<Option<String>> = vec![None; fragments.len()];
            for (position, item) in items.into_iter().enumerate() {
                let index = item.index.ok_or_else(|| {
                    TranslationError::malformed(format!("item {} has no index", position))
                })?;

                let slot = slots.get_mut(index).ok_or_else(|| {
                    TranslationError::malformed(format!(
                        "index {} out of range for {} items",
                        index,
                        fragments.len()
                    ))
                })?;

                if slot.is_some() {
                    return Err(TranslationError::malformed(format!("duplicate index {}", index)));
                }
                *slot = Some(item.text);
            }

            // Length matches and every index was unique and in range, so all slots are filled
            Ok(slots
                .into_iter()
                .zip(fragments)
                .filter_map(|(text, fragment)| {
                    text.map(|text| TranslatedFragment {
                        text,
                        bbox: fragment.bbox,
                    })
                })
                .collect())
        }
    }
}
