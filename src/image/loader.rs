use crate::utils::error::RecognitionError;
use crate::Result;
use base64::Engine;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

pub struct ImageLoader;

impl ImageLoader {
    /// 从base64字符串加载图像
    pub fn from_base64(base64_data: &str, max_size: usize) -> Result<RgbImage> {
        let base64_clean = Self::strip_data_url(base64_data).trim();
        if base64_clean.is_empty() {
            return Err(RecognitionError::InvalidInput("Empty image data".to_string()));
        }

        let image_bytes = base64::engine::general_purpose::STANDARD.decode(base64_clean)?;

        Self::from_bytes(&image_bytes, max_size)
    }

    /// 从字节流加载图像
    pub fn from_bytes(bytes: &[u8], max_size: usize) -> Result<RgbImage> {
        if bytes.is_empty() {
            return Err(RecognitionError::InvalidInput("Empty file".to_string()));
        }
        if bytes.len() > max_size {
            return Err(RecognitionError::FileTooLarge(bytes.len(), max_size));
        }

        if let Some(format) = Self::detect_format(bytes) {
            tracing::debug!("Decoding {:?} image ({} bytes)", format, bytes.len());
        }

        let image = image::load_from_memory(bytes)?;
        Ok(Self::to_rgb(image))
    }

    /// 移除数据URL前缀 (data:image/xxx;base64,)
    pub fn strip_data_url(base64_data: &str) -> &str {
        match base64_data.split_once(',') {
            Some((_, payload)) => payload,
            None => base64_data,
        }
    }

    /// 统一转换为三通道 RGB（去除 alpha、灰度扩展）
    pub fn to_rgb(image: DynamicImage) -> RgbImage {
        match image {
            DynamicImage::ImageRgb8(rgb) => rgb,
            other => other.to_rgb8(),
        }
    }

    /// 纯黑空白帧
    pub fn blank(width: u32, height: u32) -> RgbImage {
        RgbImage::from_pixel(width, height, Rgb([0, 0, 0]))
    }

    /// 检测图像格式
    pub fn detect_format(bytes: &[u8]) -> Option<ImageFormat> {
        image::guess_format(bytes).ok()
    }
}
