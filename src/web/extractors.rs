use crate::utils::error::RecognitionError;
use crate::Result;
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use serde::Deserialize;

/// base64 图像请求体
#[derive(Debug, Deserialize)]
pub struct ImagePayload {
    /// Base64编码的图像数据，可带 data URL 前缀
    pub image: Option<String>,
}

/// 验证trait
pub trait Validate {
    fn validate(&self) -> Result<()>;
}

impl Validate for ImagePayload {
    fn validate(&self) -> Result<()> {
        match &self.image {
            None => Err(RecognitionError::InvalidInput(
                "Missing 'image' field in request body".to_string(),
            )),
            Some(image) if image.trim().is_empty() => Err(RecognitionError::InvalidInput(
                "Image data cannot be empty".to_string(),
            )),
            Some(_) => Ok(()),
        }
    }
}

impl ImagePayload {
    /// 校验后取出图像字符串
    pub fn into_image(self) -> Result<String> {
        self.validate()?;
        Ok(self.image.unwrap_or_default())
    }
}

/// 请求ID提取器
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for RequestId
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        let request_id = parts
            .headers
            .get("X-Request-ID")
            .and_then(|value| value.to_str().ok())
            .map(|s| s.to_string())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        Ok(RequestId(request_id))
    }
}
