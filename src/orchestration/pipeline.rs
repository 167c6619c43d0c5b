// Pipeline: image -> Detector-Filter -> Dispatcher -> translated fragments

use image::DynamicImage;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use crate::core::errors::PipelineResult;
use crate::core::types::{ImageSource, PipelineOutput};
use crate::services::detection::{DetectionService, TextDetector};
use crate::services::translation::{SessionState, TranslationDispatcher, Translator};
use crate::utils::{load_image_async, Metrics};

/// Composes detection and translation for one overlay session.
///
/// The dispatcher lock is held for the whole compare, call and store sequence so
/// concurrent requests for the same frame produce a single remote call.
pub struct Pipeline<D, T> {
    detection: Arc<DetectionService<D>>,
    dispatcher: Mutex<TranslationDispatcher<T>>,
    target_language: String,
    metrics: Metrics,
}

impl<D, T> Pipeline<D, T>
where
    D: TextDetector + 'static,
    T: Translator,
{
    pub fn new(
        detection: DetectionService<D>,
        dispatcher: TranslationDispatcher<T>,
        target_language: impl Into<String>,
        metrics: Metrics,
    ) -> Self {
        Self {
            detection: Arc::new(detection),
            dispatcher: Mutex::new(dispatcher),
            target_language: target_language.into(),
            metrics,
        }
    }

    pub fn target_language(&self) -> &str {
        &self.target_language
    }

    pub fn detector_name(&self) -> &str {
        self.detection.detector_name()
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Decode `source` and run it through the pipeline
    pub async fn process(
        &self,
        source: ImageSource,
        target_language: Option<&str>,
    ) -> PipelineResult<PipelineOutput> {
        let start = Instant::now();
        let result = match load_image_async(source).await {
            Ok(image) => self.run(image, target_language).await,
            Err(e) => Err(e),
        };
        self.finish(start, result)
    }

    /// Run an already decoded image through the pipeline.
    ///
    /// `target_language` overrides the configured language for this call only.
    pub async fn process_image(
        &self,
        image: DynamicImage,
        target_language: Option<&str>,
    ) -> PipelineResult<PipelineOutput> {
        let start = Instant::now();
        let result = self.run(image, target_language).await;
        self.finish(start, result)
    }

    /// Clear the dispatcher's session so the next frame is always translated
    pub async fn reset(&self) {
        self.dispatcher.lock().await.reset();
        info!("Translation session reset");
    }

    pub async fn session_state(&self) -> SessionState {
        self.dispatcher.lock().await.state()
    }

    #[instrument(skip(self, image), fields(width = image.width(), height = image.height()))]
    async fn run(
        &self,
        image: DynamicImage,
        target_language: Option<&str>,
    ) -> PipelineResult<PipelineOutput> {
        let target_language = target_language.unwrap_or(&self.target_language);

        let detection_start = Instant::now();
        let detection = Arc::clone(&self.detection);
        let (detections, fragments) =
            tokio::task::spawn_blocking(move || detection.detect_counted(&image)).await??;
        let detection_time_ms = detection_start.elapsed().as_secs_f64() * 1000.0;

        let fragment_count = fragments.len();
        let translation_start = Instant::now();

        let (translations, cache_hit) = {
            let mut dispatcher = self.dispatcher.lock().await;
            let cache_hit = dispatcher.is_cache_hit(&fragments, target_language);
            let translations = dispatcher.translate(fragments, target_language).await?;
            (translations, cache_hit)
        };
        let translation_time_ms = translation_start.elapsed().as_secs_f64() * 1000.0;

        info!(
            "Frame done: {} detections, {} fragments, {} translations{} ({:.0}ms detect, {:.0}ms translate)",
            detections,
            fragment_count,
            translations.len(),
            if cache_hit { " (cached)" } else { "" },
            detection_time_ms,
            translation_time_ms
        );

        Ok(PipelineOutput {
            translations,
            detections,
            fragments: fragment_count,
            cache_hit,
            detection_time_ms,
            translation_time_ms,
        })
    }

    fn finish(
        &self,
        start: Instant,
        result: PipelineResult<PipelineOutput>,
    ) -> PipelineResult<PipelineOutput> {
        self.metrics.record_pipeline_run(result.is_ok(), start.elapsed());
        if let Err(ref e) = result {
            warn!("Pipeline failed: {}", e);
        }
        result
    }
}
