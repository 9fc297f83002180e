//! Local rerank models backed by the ai_core lexical cross-encoder
//!
//! Each device kind has its own memory budget. Loading checks the model
//! footprint against it; scoring checks the batch working set.

use std::sync::Arc;

use ai_core::{DeviceProfile, InferenceError, LexicalCrossEncoder, LexicalModelConfig};
use application::ports::{DeviceKind, RerankError, RerankModel, RerankModelLoader};
use domain::Document;
use tracing::info;

/// Loader for the lexical cross-encoder
#[derive(Debug, Clone)]
pub struct LexicalRerankLoader {
    model: LexicalModelConfig,
    accelerated: Option<DeviceProfile>,
    unaccelerated: DeviceProfile,
}

impl LexicalRerankLoader {
    /// Create a loader; `accelerated` is `None` on hosts without an accelerator
    pub const fn new(
        model: LexicalModelConfig,
        accelerated: Option<DeviceProfile>,
        unaccelerated: DeviceProfile,
    ) -> Self {
        Self {
            model,
            accelerated,
            unaccelerated,
        }
    }

    fn profile(&self, device: DeviceKind) -> Option<&DeviceProfile> {
        match device {
            DeviceKind::Accelerated => self.accelerated.as_ref(),
            DeviceKind::Unaccelerated => Some(&self.unaccelerated),
        }
    }
}

fn map_error(e: InferenceError) -> RerankError {
    match e {
        InferenceError::ResourceExhausted { .. } => RerankError::ResourceExhausted(e.to_string()),
        other => RerankError::Failed(other.to_string()),
    }
}

impl RerankModelLoader for LexicalRerankLoader {
    fn load(&self, device: DeviceKind) -> Result<Arc<dyn RerankModel>, RerankError> {
        let profile = self
            .profile(device)
            .ok_or_else(|| RerankError::Unavailable(format!("no {device} device configured")))?;

        let encoder = LexicalCrossEncoder::load(self.model.clone(), profile.clone()).map_err(map_error)?;
        info!(%device, name = %profile.name, "Rerank model ready");
        Ok(Arc::new(LexicalRerankModel { encoder, device }))
    }
}

/// A loaded lexical cross-encoder
#[derive(Debug)]
pub struct LexicalRerankModel {
    encoder: LexicalCrossEncoder,
    device: DeviceKind,
}

impl RerankModel for LexicalRerankModel {
    fn device(&self) -> DeviceKind {
        self.device
    }

    fn score_batch(&self, query: &str, documents: &[Document]) -> Result<Vec<f32>, RerankError> {
        let texts: Vec<&str> = documents.iter().map(|d| d.text.as_str()).collect();
        self.encoder.score(query, &texts).map_err(map_error)
    }
}

#[cfg(test)]
mod tests {
    use domain::DocumentId;

    use super::*;

    fn model() -> LexicalModelConfig {
        LexicalModelConfig {
            footprint_bytes: 1_000,
            activation_bytes_per_token: 10,
            ..LexicalModelConfig::default()
        }
    }

    fn doc(id: &str, text: &str) -> Document {
        Document::new(DocumentId::new(id).unwrap(), text)
    }

    #[test]
    fn missing_accelerator_is_unavailable() {
        let loader = LexicalRerankLoader::new(model(), None, DeviceProfile::new("cpu", 1_000_000));
        assert!(matches!(
            loader.load(DeviceKind::Accelerated),
            Err(RerankError::Unavailable(_))
        ));
    }

    #[test]
    fn undersized_accelerator_is_resource_exhaustion() {
        let loader = LexicalRerankLoader::new(
            model(),
            Some(DeviceProfile::new("cuda:0", 10)),
            DeviceProfile::new("cpu", 1_000_000),
        );
        let err = loader.load(DeviceKind::Accelerated).err().unwrap();
        assert!(err.is_resource_exhaustion());
        assert!(loader.load(DeviceKind::Unaccelerated).is_ok());
    }

    #[test]
    fn loaded_model_scores_in_input_order() {
        let loader = LexicalRerankLoader::new(model(), None, DeviceProfile::new("cpu", 1_000_000));
        let model = loader.load(DeviceKind::Unaccelerated).unwrap();
        assert_eq!(model.device(), DeviceKind::Unaccelerated);

        let scores = model
            .score_batch(
                "bid bond",
                &[doc("a", "holiday calendar"), doc("b", "bid bond amount")],
            )
            .unwrap();
        assert_eq!(scores.len(), 2);
        assert!(scores[1] > scores[0]);
    }

    #[test]
    fn oversized_batch_is_resource_exhaustion() {
        let loader = LexicalRerankLoader::new(model(), None, DeviceProfile::new("cpu", 1_030));
        let model = loader.load(DeviceKind::Unaccelerated).unwrap();
        let err = model
            .score_batch("bid bond", &[doc("a", "bid bond terms and conditions")])
            .unwrap_err();
        assert!(err.is_resource_exhaustion());
    }
}
