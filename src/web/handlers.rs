use crate::{
    image::ImageLoader,
    recognition::{PredictResponse, RecognitionPipeline, ResetResponse, ResultFormatter, TrackResponse},
    utils::error::RecognitionError,
    web::{
        extractors::{ImagePayload, RequestId},
        AppState,
    },
    Result,
};
use axum::{
    extract::{multipart::MultipartRejection, rejection::JsonRejection, Multipart, State},
    response::Json,
};

/// Multipart文件上传处理器
pub async fn predict_upload_handler(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<PredictResponse>> {
    let models = state.ready()?;
    let mut multipart = multipart?;

    tracing::info!("Processing multipart predict request: request_id={}", request_id);

    let mut image_data = None;
    while let Some(field) = multipart.next_field().await? {
        let field_name = field.name().unwrap_or("unknown").to_string();
        if field_name != "file" {
            tracing::debug!("Ignoring unknown field: {}", field_name);
            continue;
        }

        // 验证内容类型
        let content_type = field.content_type().unwrap_or_default().to_string();
        if !content_type.starts_with("image/") {
            return Err(RecognitionError::UnsupportedFormat(content_type));
        }

        let data = field.bytes().await?;
        tracing::debug!("Received file: {} bytes", data.len());
        image_data = Some(data);
    }

    let image_data = image_data
        .ok_or_else(|| RecognitionError::InvalidInput("No image file provided".to_string()))?;

    let max_size = state.config().server_config.max_request_size;
    let image = ImageLoader::from_bytes(&image_data, max_size)?;
    let selection =
        RecognitionPipeline::predict(models, image, state.confidence_threshold()).await?;

    tracing::info!(
        "Upload predict completed: request_id={}, detections={}",
        request_id,
        selection.all_detections
    );

    Ok(Json(ResultFormatter::predict_response(selection)))
}

/// JSON base64上传处理器
pub async fn predict_base64_handler(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    payload: std::result::Result<Json<ImagePayload>, JsonRejection>,
) -> Result<Json<PredictResponse>> {
    let models = state.ready()?;
    let Json(payload) = payload?;
    let image_data = payload.into_image()?;

    tracing::info!(
        "Processing base64 predict request: request_id={}, payload={} chars",
        request_id,
        image_data.len()
    );

    let max_size = state.config().server_config.max_request_size;
    let image = ImageLoader::from_base64(&image_data, max_size)?;
    let selection =
        RecognitionPipeline::predict(models, image, state.confidence_threshold()).await?;

    tracing::info!(
        "Base64 predict completed: request_id={}, detections={}",
        request_id,
        selection.all_detections
    );

    Ok(Json(ResultFormatter::predict_response(selection)))
}

/// 跟踪处理器，保持跨帧的目标ID
pub async fn track_handler(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    payload: std::result::Result<Json<ImagePayload>, JsonRejection>,
) -> Result<Json<TrackResponse>> {
    let models = state.ready()?;
    let Json(payload) = payload?;
    let image_data = payload.into_image()?;

    tracing::info!("Processing track request: request_id={}", request_id);

    let max_size = state.config().server_config.max_request_size;
    let image = ImageLoader::from_base64(&image_data, max_size)?;
    let selection =
        RecognitionPipeline::track(models, image, state.confidence_threshold()).await?;

    Ok(Json(ResultFormatter::track_response(selection)))
}

/// 重置跟踪器；失败时返回 success=false 而不是 HTTP 错误
///
/// 模型未加载时没有跟踪状态，直接视为成功。
pub async fn reset_tracker_handler(State(state): State<AppState>) -> Json<ResetResponse> {
    let outcome = match state.ready() {
        Ok(models) => {
            RecognitionPipeline::reset_tracker(models, state.confidence_threshold()).await
        }
        Err(_) => {
            tracing::debug!("No model loaded, nothing to reset");
            Ok(())
        }
    };

    let response = match outcome {
        Ok(()) => ResetResponse {
            success: true,
            message: "Tracker reset".to_string(),
        },
        Err(e) => {
            tracing::warn!("Tracker reset failed: {}", e);
            ResetResponse {
                success: false,
                message: e.to_string(),
            }
        }
    };

    Json(response)
}
