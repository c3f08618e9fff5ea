//! Analysis session state
//!
//! Holds what one analysis screen needs: the backend status, the selected
//! image and the outcome of the most recent analysis. Starting a new analysis
//! clears the previous outcome first; a failed one leaves no partial result.
//! `analyze` holds `&mut self` for the whole request, so a second analysis
//! cannot start while one is in flight.
use std::path::Path;

use image::RgbaImage;
#[allow(unused_imports)]
use log::{debug, info, warn, error};

use crate::client::{DetectionClient, ServerStatus};
use crate::detection::DetectionResponse;
use crate::error::{LeafError, LeafResult};
use crate::image_io::{self, ImageFile};
use crate::metrics::{self, HealthMetrics};
use crate::overlay::OverlayStyle;
use crate::render::{self, Visualization};

/// Image chosen for analysis, decoded up front so bad files fail early
pub struct SelectedImage {
    pub file: ImageFile,
    pub pixels: RgbaImage,
}

pub struct AnalysisOutcome {
    pub response: DetectionResponse,
    pub visualization: Visualization,
    pub metrics: HealthMetrics,
}

pub struct AnalysisSession {
    status: ServerStatus,
    image: Option<SelectedImage>,
    last_error: Option<String>,
    outcome: Option<AnalysisOutcome>,
}

impl Default for AnalysisSession {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalysisSession {
    pub fn new() -> Self {
        Self {
            status: ServerStatus::Unknown,
            image: None,
            last_error: None,
            outcome: None,
        }
    }

    pub fn status(&self) -> ServerStatus {
        self.status
    }

    pub fn image(&self) -> Option<&SelectedImage> {
        self.image.as_ref()
    }

    pub fn outcome(&self) -> Option<&AnalysisOutcome> {
        self.outcome.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub async fn refresh_status(&mut self, client: &DetectionClient) -> ServerStatus {
        self.status = client.health().await;
        info!("Backend {} is {}", client.base_url(), self.status);
        self.status
    }

    /// Read and decode `path`. On failure the previous selection is dropped.
    pub async fn select_image(&mut self, path: &Path) -> LeafResult<&SelectedImage> {
        self.image = None;
        let file = image_io::read_image_file(path).await?;
        let pixels = image_io::decode_rgba(&file)?;
        debug!("Selected {} ({}x{})", path.display(), pixels.width(), pixels.height());
        Ok(self.image.insert(SelectedImage { file, pixels }))
    }

    /// An image is selected and the backend is not known to be offline
    pub fn can_analyze(&self) -> bool {
        self.image.is_some() && self.status != ServerStatus::Offline
    }

    /// Upload the selected image, render its visualization and estimate metrics
    pub async fn analyze(
        &mut self,
        client: &DetectionClient,
        style: &OverlayStyle,
        rng: &mut fastrand::Rng,
    ) -> LeafResult<&AnalysisOutcome> {
        self.outcome = None;
        self.last_error = None;

        if self.status == ServerStatus::Offline {
            return Err(LeafError::BackendOffline(client.base_url().to_string()));
        }
        let Some(selected) = self.image.as_ref() else {
            self.last_error = Some(LeafError::NoImageSelected.to_string());
            return Err(LeafError::NoImageSelected);
        };
        let response = match client.detect(&selected.file).await {
            Ok(response) => response,
            Err(e) => {
                if e.is_unreachable() {
                    self.status = ServerStatus::Offline;
                }
                let message = format!("Failed to analyze image: {}", e);
                error!("{}", message);
                self.last_error = Some(message);
                return Err(e.into());
            }
        };

        let outcome = build_outcome(&selected.pixels, response, style, rng);
        Ok(self.outcome.insert(outcome))
    }

    /// Run the same pipeline on a previously saved `/detect` response
    pub fn render_offline(
        &mut self,
        response: DetectionResponse,
        style: &OverlayStyle,
        rng: &mut fastrand::Rng,
    ) -> LeafResult<&AnalysisOutcome> {
        self.outcome = None;
        let Some(selected) = self.image.as_ref() else {
            return Err(LeafError::NoImageSelected);
        };
        let outcome = build_outcome(&selected.pixels, response, style, rng);
        Ok(self.outcome.insert(outcome))
    }

    /// Drop the image, the outcome and any error. Backend status is kept.
    pub fn reset(&mut self) {
        self.image = None;
        self.outcome = None;
        self.last_error = None;
    }
}

fn build_outcome(
    pixels: &RgbaImage,
    response: DetectionResponse,
    style: &OverlayStyle,
    rng: &mut fastrand::Rng,
) -> AnalysisOutcome {
    let visualization = render::render_visualization(pixels, &response.detections, style);
    let metrics = metrics::estimate(Some(&response.detections), rng);
    AnalysisOutcome {
        response,
        visualization,
        metrics,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::test_server::{self, Mode};
    use image::Rgba;
    use std::time::Duration;

    const ONE_LEAF: &str =
        r#"{"predictions": [{"class": "Leaf", "confidence": 0.8, "x": 4, "y": 4, "width": 4, "height": 4}]}"#;

    fn client(base: &str) -> DetectionClient {
        DetectionClient::new(base, Duration::from_secs(2), Duration::from_secs(5)).unwrap()
    }

    fn write_png(dir: &tempfile::TempDir, name: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        RgbaImage::from_pixel(8, 8, Rgba([120, 180, 60, 255])).save(&path).unwrap();
        path
    }

    #[tokio::test]
    async fn test_full_analysis() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(&dir, "leaf.png");
        let base = test_server::spawn(true, Mode::Ok(ONE_LEAF)).await;
        let client = client(&base);

        let mut session = AnalysisSession::new();
        assert!(!session.can_analyze());
        assert_eq!(session.refresh_status(&client).await, ServerStatus::Online);
        session.select_image(&path).await.unwrap();
        assert!(session.can_analyze());

        let mut rng = fastrand::Rng::with_seed(9);
        let outcome = session.analyze(&client, &OverlayStyle::default(), &mut rng).await.unwrap();
        assert_eq!(outcome.response.detections.len(), 1);
        assert_eq!(outcome.visualization.boxes.len(), 1);
        assert_eq!(outcome.visualization.image.dimensions(), (8, 8));
        assert!(outcome.metrics.chlorophyll.is_some());
        assert!(session.last_error().is_none());
    }

    #[tokio::test]
    async fn test_server_error_clears_previous_outcome() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(&dir, "leaf.png");
        let good = client(&test_server::spawn(true, Mode::Ok(ONE_LEAF)).await);
        let bad = client(&test_server::spawn(true, Mode::Fail(500, r#"{"error": "model crashed"}"#)).await);

        let mut session = AnalysisSession::new();
        session.select_image(&path).await.unwrap();
        let mut rng = fastrand::Rng::with_seed(1);
        session.analyze(&good, &OverlayStyle::default(), &mut rng).await.unwrap();
        assert!(session.outcome().is_some());

        assert!(session.analyze(&bad, &OverlayStyle::default(), &mut rng).await.is_err());
        assert!(session.outcome().is_none());
        assert_eq!(session.last_error(), Some("Failed to analyze image: model crashed"));
        assert_eq!(session.status(), ServerStatus::Unknown);
    }

    #[tokio::test]
    async fn test_unreachable_backend_goes_offline() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(&dir, "leaf.png");
        let dead = client(&test_server::dead_address().await);

        let mut session = AnalysisSession::new();
        session.select_image(&path).await.unwrap();
        let mut rng = fastrand::Rng::with_seed(1);
        assert!(session.analyze(&dead, &OverlayStyle::default(), &mut rng).await.is_err());
        assert_eq!(session.status(), ServerStatus::Offline);
        assert!(!session.can_analyze());

        let err = session.analyze(&dead, &OverlayStyle::default(), &mut rng).await.err().unwrap();
        assert!(matches!(err, LeafError::BackendOffline(_)));

        // A later successful health check re-enables analysis
        let up = client(&test_server::spawn(true, Mode::Ok(ONE_LEAF)).await);
        session.refresh_status(&up).await;
        assert!(session.can_analyze());
    }

    #[tokio::test]
    async fn test_bad_image_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.png");
        std::fs::write(&path, b"plain text").unwrap();

        let mut session = AnalysisSession::new();
        let err = session.select_image(&path).await.err().unwrap();
        assert!(matches!(err, LeafError::Decode { .. }));
        assert!(session.image().is_none());
    }

    #[tokio::test]
    async fn test_analyze_without_image() {
        let base = test_server::spawn(true, Mode::Ok(ONE_LEAF)).await;
        let mut session = AnalysisSession::new();
        let mut rng = fastrand::Rng::with_seed(1);
        let err = session.analyze(&client(&base), &OverlayStyle::default(), &mut rng).await.err().unwrap();
        assert!(matches!(err, LeafError::NoImageSelected));
        assert_eq!(session.last_error(), Some("Please select an image file first"));
    }

    #[tokio::test]
    async fn test_offline_render_with_empty_predictions() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(&dir, "leaf.png");
        let mut session = AnalysisSession::new();
        session.select_image(&path).await.unwrap();

        let response = r#"{"predictions": []}"#.parse::<DetectionResponse>().unwrap();
        let mut rng = fastrand::Rng::with_seed(1);
        let outcome = session.render_offline(response, &OverlayStyle::default(), &mut rng).unwrap();
        assert!(outcome.visualization.boxes.is_empty());
        assert!(outcome.metrics.is_unset());

        session.reset();
        assert!(session.image().is_none());
        assert!(session.outcome().is_none());
    }

    #[tokio::test]
    async fn test_unhealthy_backend_still_allows_analysis() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(&dir, "leaf.png");
        let client = client(&test_server::spawn(false, Mode::Ok(ONE_LEAF)).await);

        let mut session = AnalysisSession::new();
        assert_eq!(session.refresh_status(&client).await, ServerStatus::Error);
        assert!(!session.can_analyze());
        session.select_image(&path).await.unwrap();
        assert!(session.can_analyze());

        let mut rng = fastrand::Rng::with_seed(3);
        assert!(session.analyze(&client, &OverlayStyle::default(), &mut rng).await.is_ok());
    }
}
