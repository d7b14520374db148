use crate::{
    config::ModelConfig,
    emotion::Emotion,
    model_service::{InferenceError, ModelService},
};
use async_trait::async_trait;
use image::imageops::FilterType;
use ndarray::{Array, Ix4};
use ort::{
    session::{builder::GraphOptimizationLevel, Session},
    value::TensorRef,
};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

pub const INPUT_WIDTH: u32 = 48;
pub const INPUT_HEIGHT: u32 = 48;

/// Decodes the uploaded bytes and normalizes them to the classifier's fixed
/// input: grayscale, 48x48, intensities scaled into [0,1], NHWC.
fn transform_image(image_data: &[u8]) -> Result<Array<f32, Ix4>, String> {
    let image_reader = image::ImageReader::new(std::io::Cursor::new(image_data))
        .with_guessed_format()
        .map_err(|e| format!("Error decoding image: {}", e))?;

    let original_img = image_reader
        .decode()
        .map_err(|e| format!("Error decoding image: {}", e))?;

    let img = original_img.grayscale().resize_exact(
        INPUT_WIDTH,
        INPUT_HEIGHT,
        FilterType::CatmullRom,
    );

    let mut input = Array::zeros((
        1,
        INPUT_HEIGHT as usize,
        INPUT_WIDTH as usize,
        1,
    ));
    for (x, y, pixel) in img.to_luma8().enumerate_pixels() {
        input[[0, y as usize, x as usize, 0]] = (pixel[0] as f32) / 255.;
    }

    Ok(input)
}

#[derive(Clone)]
pub struct OrtModelService {
    sessions: Arc<Vec<Arc<Mutex<Session>>>>,
    counter: Arc<AtomicUsize>,
}

impl OrtModelService {
    pub fn new(model_config: &ModelConfig) -> Result<Self, Box<dyn std::error::Error>> {
        ort::init().commit()?;

        let num_instances = model_config.num_instances;
        let sessions = (0..num_instances)
            .map(|_| {
                let session = Session::builder()?
                    .with_optimization_level(GraphOptimizationLevel::Level3)?
                    .commit_from_file(model_config.get_model_path())?;
                Ok(Arc::new(Mutex::new(session)))
            })
            .collect::<Result<Vec<_>, ort::Error>>()?;

        tracing::info!("Created {} ONNX sessions", num_instances);

        let service = Self {
            counter: Arc::new(AtomicUsize::new(0)),
            sessions: Arc::new(sessions),
        };
        service.validate_output_width()?;

        Ok(service)
    }

    /// Runs a zero-valued probe input through the model and checks that it
    /// produces one score per emotion label. The index-to-label mapping is
    /// positional, so a model with a different output width must be rejected
    /// before the service accepts requests.
    fn validate_output_width(&self) -> Result<(), Box<dyn std::error::Error>> {
        let probe: Array<f32, Ix4> = Array::zeros((
            1,
            INPUT_HEIGHT as usize,
            INPUT_WIDTH as usize,
            1,
        ));
        let scores = self.run_inference(&probe)?;
        if scores.len() != Emotion::ALL.len() {
            return Err(Box::new(InferenceError::OutputWidth {
                got: scores.len(),
                expected: Emotion::ALL.len(),
            }));
        }

        tracing::info!("Model output width validated: {} classes", scores.len());
        Ok(())
    }

    pub fn run_inference(&self, input: &Array<f32, Ix4>) -> Result<Vec<f32>, InferenceError> {
        let index = self.counter.fetch_add(1, Ordering::SeqCst) % self.sessions.len();
        let session_arc = &self.sessions[index];
        let mut session = session_arc
            .lock()
            .map_err(|e| InferenceError::Inference(format!("session mutex poisoned: {}", e)))?;

        tracing::debug!("Handling request with session {}", index);
        let owned_buffer;
        let input_view = if input.view().is_standard_layout() {
            input.view()
        } else {
            owned_buffer = input.to_owned();
            owned_buffer.view()
        };

        let tensor_ref = TensorRef::from_array_view(input_view)
            .map_err(|e| InferenceError::Inference(format!("failed to build tensor: {}", e)))?;

        let input_tensor = ort::inputs![tensor_ref];

        let outputs = session
            .run(input_tensor)
            .map_err(|e| InferenceError::Inference(format!("inference failed: {}", e)))?;

        let (_, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| InferenceError::Inference(format!("failed to extract tensor: {}", e)))?;

        Ok(data.to_vec())
    }
}

#[async_trait]
impl ModelService for OrtModelService {
    async fn predict(&self, image_data: &[u8]) -> Result<Vec<f32>, InferenceError> {
        let input = transform_image(image_data).map_err(InferenceError::ImageDecode)?;
        self.run_inference(&input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Luma, Rgb};
    use std::io::Cursor;

    #[test]
    fn test_transform_image() {
        let img = ImageBuffer::<Rgb<u8>, Vec<u8>>::from_pixel(100, 80, Rgb([255, 0, 0]));
        let mut image_data: Vec<u8> = Vec::new();
        let mut cursor = Cursor::new(&mut image_data);
        img.write_to(&mut cursor, image::ImageFormat::Png).unwrap();

        let input = transform_image(cursor.get_ref()).unwrap();

        assert_eq!(input.shape(), &[1, 48, 48, 1]);
        assert!(input.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_transform_image_already_grayscale() {
        let img = ImageBuffer::<Luma<u8>, Vec<u8>>::from_pixel(48, 48, Luma([255]));
        let mut image_data: Vec<u8> = Vec::new();
        let mut cursor = Cursor::new(&mut image_data);
        img.write_to(&mut cursor, image::ImageFormat::Png).unwrap();

        let input = transform_image(cursor.get_ref()).unwrap();

        assert_eq!(input.shape(), &[1, 48, 48, 1]);
        assert!(input.iter().all(|v| *v > 0.99));
    }

    #[test]
    fn test_transform_image_rejects_garbage_bytes() {
        let result = transform_image(&[0u8; 32]);
        assert!(result.is_err());
    }
}
