use crate::{
    emotion::{argmax, Emotion},
    model_service::{InferenceError, ModelService},
};
use bytes::Bytes;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct InferenceService<M: ModelService> {
    model_service: Arc<M>,
}

impl<M: ModelService> InferenceService<M> {
    pub fn new(model_service: M) -> Self {
        Self {
            model_service: Arc::new(model_service),
        }
    }

    pub async fn classify(&self, image_data: &[u8]) -> Result<Emotion, InferenceError> {
        let scores = self.model_service.predict(image_data).await?;
        let index = argmax(&scores)
            .ok_or_else(|| InferenceError::Inference("model returned no scores".to_string()))?;
        let emotion = Emotion::from_index(index).ok_or(InferenceError::OutputWidth {
            got: scores.len(),
            expected: Emotion::ALL.len(),
        })?;

        tracing::debug!("Classified image as {}", emotion.as_str());
        Ok(emotion)
    }

    /// Classifies every image in request order. Any failure aborts the whole
    /// batch.
    pub async fn classify_batch(&self, images: &[Bytes]) -> Result<Vec<Emotion>, InferenceError> {
        let mut labels = Vec::with_capacity(images.len());
        for image_data in images {
            labels.push(self.classify(image_data).await?);
        }
        Ok(labels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    #[derive(Clone)]
    struct MockModelService {}

    #[async_trait]
    impl ModelService for MockModelService {
        async fn predict(&self, image_data: &[u8]) -> Result<Vec<f32>, InferenceError> {
            // One-hot score vector at the index given by the first byte.
            let index = image_data.first().copied().unwrap_or(0) as usize;
            let mut scores = vec![0.0; 7];
            scores[index] = 0.9;
            Ok(scores)
        }
    }

    #[derive(Clone)]
    struct WideModelService {}

    #[async_trait]
    impl ModelService for WideModelService {
        async fn predict(&self, _image_data: &[u8]) -> Result<Vec<f32>, InferenceError> {
            let mut scores = vec![0.0; 14];
            scores[10] = 0.9;
            Ok(scores)
        }
    }

    #[tokio::test]
    async fn test_classify_maps_argmax_to_label() -> Result<(), InferenceError> {
        let service = InferenceService::new(MockModelService {});

        let emotion = service.classify(&[3]).await?;
        assert_eq!(emotion, Emotion::Happy);

        let emotion = service.classify(&[6]).await?;
        assert_eq!(emotion, Emotion::Neutral);

        Ok(())
    }

    #[tokio::test]
    async fn test_classify_batch_keeps_request_order() -> Result<(), InferenceError> {
        let service = InferenceService::new(MockModelService {});
        let images = vec![Bytes::from_static(&[3]), Bytes::from_static(&[4]), Bytes::from_static(&[3])];

        let labels = service.classify_batch(&images).await?;

        assert_eq!(labels, vec![Emotion::Happy, Emotion::Sad, Emotion::Happy]);
        Ok(())
    }

    #[tokio::test]
    async fn test_classify_rejects_out_of_range_argmax() {
        let service = InferenceService::new(WideModelService {});

        let result = service.classify(&[0]).await;

        assert!(matches!(
            result,
            Err(InferenceError::OutputWidth {
                got: 14,
                expected: 7
            })
        ));
    }
}
