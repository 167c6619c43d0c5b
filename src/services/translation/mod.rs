pub mod dispatcher;
pub mod gemini;

use async_trait::async_trait;
use std::sync::Arc;

use crate::core::errors::TranslationResult;
use crate::core::types::{TranslatedItem, TranslationRequest};

pub use dispatcher::{SessionState, TranslationDispatcher};
pub use gemini::GeminiTranslator;

/// External translation capability.
///
/// Given the target language and an ordered list of strings, return translated
/// items, ideally one per input and in the same order. The dispatcher copes with
/// short or long answers; implementations should not pad or reorder.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, request: &TranslationRequest) -> TranslationResult<Vec<TranslatedItem>>;
}

#[async_trait]
impl<T: Translator + ?Sized> Translator for Arc<T> {
    async fn translate(&self, request: &TranslationRequest) -> TranslationResult<Vec<TranslatedItem>> {
        (**self).translate(request).await
    }
}
