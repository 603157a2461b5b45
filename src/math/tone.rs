//! Clamping and min-max brightness rescaling

use crate::math::Image;

/// Clamp every value into [0, 1], mapping NaN to 0
pub fn clamp_unit(image: &mut Image) {
    image.mapv_inplace(|v| if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) });
}

/// Smallest and largest value in the image, `None` when empty
pub fn min_max(image: &Image) -> Option<(f32, f32)> {
    if image.is_empty() {
        return None;
    }
    Some(image.iter().fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
        (lo.min(v), hi.max(v))
    }))
}

/// Largest value in the image, zero when empty
pub fn max_value(image: &Image) -> f32 {
    min_max(image).map_or(0.0, |(_, hi)| hi)
}

// Linearly maps [current_min, current_max] onto [low, high]; flat images become `flat`
fn rescale(image: &Image, low: f32, high: f32, flat: f32) -> Image {
    match min_max(image) {
        Some((current_min, current_max)) if current_max > current_min => {
            let span = current_max - current_min;
            image.mapv(|v| (v - current_min) / span * (high - low) + low)
        }
        Some(_) => image.mapv(|_| flat),
        None => image.clone(),
    }
}

/// Rescale into [0, `max_brightness`]
pub fn darken_image(image: &Image, max_brightness: f32) -> Image {
    rescale(image, 0.0, max_brightness, max_brightness)
}

/// Rescale into [0, (1 - `percent`/100) × current maximum]
pub fn darken_image_pct(image: &Image, percent: f32) -> Image {
    let ceiling = max_value(image) * (1.0 - percent / 100.0);
    darken_image(image, ceiling.max(0.0))
}

/// Rescale into [`min_brightness`, 1]
pub fn brighten_image(image: &Image, min_brightness: f32) -> Image {
    rescale(image, min_brightness, 1.0, min_brightness)
}

/// Rescale into [`min`, `max`]; flat images take the midpoint of the range
pub fn adjust_image_brightness(image: &Image, min: f32, max: f32) -> Image {
    rescale(image, min, max, (min + max) / 2.0)
}
