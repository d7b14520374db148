use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("Error decoding image: {0}")]
    ImageDecode(String),
    #[error("Inference failed: {0}")]
    Inference(String),
    #[error("Model returned {got} scores, expected {expected}")]
    OutputWidth { got: usize, expected: usize },
}

#[async_trait]
pub trait ModelService: Send + Sync + Clone + 'static {
    async fn predict(&self, image_data: &[u8]) -> Result<Vec<f32>, InferenceError>;
}
