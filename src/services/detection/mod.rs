// Detector-Filter stage
//
// Runs the external text detector, turns each detection into a Fragment and drops
// the ones the noise filter rejects. Emission order is preserved.

pub mod noise_filter;

use image::DynamicImage;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::core::config::DetectorParams;
use crate::core::errors::DetectionResult;
use crate::core::types::{Detection, Fragment};
use crate::utils::Metrics;

pub use noise_filter::{NoiseFilter, NoiseRule};

/// External optical text detector.
///
/// Implementations return detections in their natural emission order. `params`
/// are passed through untouched; a backend ignores the ones it cannot honour.
pub trait TextDetector: Send + Sync {
    fn detect(&self, image: &DynamicImage, params: &DetectorParams) -> DetectionResult<Vec<Detection>>;

    /// Short backend name for logs and health output
    fn name(&self) -> &str {
        "detector"
    }
}

impl<D: TextDetector + ?Sized> TextDetector for Arc<D> {
    fn detect(&self, image: &DynamicImage, params: &DetectorParams) -> DetectionResult<Vec<Detection>> {
        (**self).detect(image, params)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Detector plus noise filter
pub struct DetectionService<D> {
    detector: D,
    params: DetectorParams,
    filter: NoiseFilter,
    metrics: Option<Metrics>,
}

impl<D: TextDetector> DetectionService<D> {
    pub fn new(detector: D, params: DetectorParams) -> Self {
        Self {
            detector,
            params,
            filter: NoiseFilter::default(),
            metrics: None,
        }
    }

    pub fn with_filter(mut self, filter: NoiseFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn detector_name(&self) -> &str {
        self.detector.name()
    }

    pub fn params(&self) -> &DetectorParams {
        &self.params
    }

    /// Detect text in `image` and return the fragments worth translating.
    ///
    /// Detector failures propagate unchanged. No text found is an empty list.
    pub fn detect(&self, image: &DynamicImage) -> DetectionResult<Vec<Fragment>> {
        self.detect_counted(image).map(|(_, fragments)| fragments)
    }

    /// Like [`detect`](Self::detect), also returning how many raw detections the
    /// backend produced before filtering
    #[instrument(skip(self, image), fields(backend = self.detector.name()))]
    pub fn detect_counted(&self, image: &DynamicImage) -> DetectionResult<(usize, Vec<Fragment>)> {
        let detections = self.detector.detect(image, &self.params)?;
        let detected = detections.len();

        if detections.is_empty() {
            info!("No text detected");
            if let Some(ref m) = self.metrics {
                m.record_detections(0, 0);
            }
            return Ok((0, Vec::new()));
        }

        let fragments = self.filter_detections(&detections);

        if let Some(ref m) = self.metrics {
            m.record_detections(detected, fragments.len());
        }

        info!(
            "Detected {} text regions, kept {} after noise filtering",
            detected,
            fragments.len()
        );

        Ok((detected, fragments))
    }

    /// Normalize and filter raw detections, keeping their order
    pub fn filter_detections(&self, detections: &[Detection]) -> Vec<Fragment> {
        detections
            .iter()
            .filter(|detection| match self.filter.rejection(&detection.text) {
                Some(rule) => {
                    debug!("Rejected {:?} ({})", detection.text, rule.name());
                    if let Some(ref m) = self.metrics {
                        m.record_rejection(rule.name());
                    }
                    false
                }
                None => true,
            })
            .map(Fragment::from)
            .collect()
    }
}
