use crate::{
    emotion::{most_frequent, Emotion},
    model_service::InferenceError,
    server::SharedState,
};
use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use serde::Serialize;
use thiserror::Error;
use tracing::instrument;

const IMAGES_FIELD: &str = "images";

#[derive(Serialize)]
pub struct PredictResponse {
    pub most_frequent: Emotion,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Error, Debug)]
pub enum PredictError {
    #[error("No images uploaded")]
    MissingImagesField,
    #[error("No images found")]
    NoImagesAttached,
    #[error("No valid images processed")]
    NoValidImages,
    #[error("Multipart read failed: {0}")]
    Multipart(String),
    #[error("{0}")]
    Inference(#[from] InferenceError),
}

impl IntoResponse for PredictError {
    fn into_response(self) -> Response {
        let status = match self {
            PredictError::MissingImagesField
            | PredictError::NoImagesAttached
            | PredictError::NoValidImages
            | PredictError::Multipart(_) => StatusCode::BAD_REQUEST,
            PredictError::Inference(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

#[instrument(skip(state, multipart))]
pub async fn predict(
    State(state): State<SharedState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<PredictResponse>, PredictError> {
    // A request without a multipart body carries no `images` field at all.
    let Ok(mut multipart) = multipart else {
        return Err(PredictError::MissingImagesField);
    };

    let mut field_seen = false;
    let mut files_seen = false;
    let mut images: Vec<Bytes> = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| PredictError::Multipart(e.to_string()))?
    {
        if field.name() != Some(IMAGES_FIELD) {
            continue;
        }
        field_seen = true;

        if field.file_name().is_none() {
            continue;
        }
        files_seen = true;

        let data = field
            .bytes()
            .await
            .map_err(|e| PredictError::Multipart(e.to_string()))?;
        // Zero-byte uploads carry nothing to classify; dropping them here is
        // what makes the `No valid images processed` response reachable.
        if !data.is_empty() {
            images.push(data);
        }
    }

    if !field_seen {
        return Err(PredictError::MissingImagesField);
    }
    if !files_seen {
        return Err(PredictError::NoImagesAttached);
    }

    let labels = state.inference.classify_batch(&images).await?;
    tracing::debug!("Classified {} images", labels.len());

    match most_frequent(&labels) {
        Some(emotion) => Ok(Json(PredictResponse {
            most_frequent: emotion,
        })),
        None => Err(PredictError::NoValidImages),
    }
}
