use image::imageops::{self, FilterType};
use image::RgbImage;
use ndarray::Array4;

/// letterbox 填充值（与 ultralytics 导出模型一致）
const PAD_VALUE: f32 = 144.0 / 255.0;

pub struct ImagePreprocessor;

impl ImagePreprocessor {
    /// 等比缩放到 `size x size` 并左上角对齐，返回 NCHW 张量和缩放比例
    pub fn letterbox(image: &RgbImage, size: u32) -> (Array4<f32>, f32) {
        let (w0, h0) = image.dimensions();
        let ratio = Self::scale_ratio(w0, h0, size);
        let new_w = ((w0 as f32 * ratio).round() as u32).clamp(1, size);
        let new_h = ((h0 as f32 * ratio).round() as u32).clamp(1, size);

        let resized = imageops::resize(image, new_w, new_h, FilterType::Triangle);

        let side = size as usize;
        let mut tensor = Array4::<f32>::from_elem((1, 3, side, side), PAD_VALUE);
        for (x, y, pixel) in resized.enumerate_pixels() {
            let (x, y) = (x as usize, y as usize);
            let [r, g, b] = pixel.0;
            tensor[[0, 0, y, x]] = r as f32 / 255.0;
            tensor[[0, 1, y, x]] = g as f32 / 255.0;
            tensor[[0, 2, y, x]] = b as f32 / 255.0;
        }

        (tensor, ratio)
    }

    /// 原图到模型输入的缩放比例
    pub fn scale_ratio(width: u32, height: u32, size: u32) -> f32 {
        (size as f32 / width.max(1) as f32).min(size as f32 / height.max(1) as f32)
    }
}
