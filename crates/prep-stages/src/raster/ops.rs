//! Pixel operations on normalized rasters
use prep_core::{Channels, PrepError, Raster};

/// Bilinear resample with pixel-center alignment.
pub fn resize_bilinear(src: &Raster, width: u32, height: u32) -> Result<Raster, PrepError> {
    if src.is_empty() || width == 0 || height == 0 {
        return Err(PrepError::Dataset(format!(
            "cannot resize {}x{} to {}x{}",
            src.width(),
            src.height(),
            width,
            height
        )));
    }
    let channels = src.channels().count();
    let sx = src.width() as f32 / width as f32;
    let sy = src.height() as f32 / height as f32;
    let max_x = (src.width() - 1) as f32;
    let max_y = (src.height() - 1) as f32;

    let mut data = Vec::with_capacity(width as usize * height as usize * channels);
    for y in 0..height {
        let fy = ((y as f32 + 0.5) * sy - 0.5).clamp(0.0, max_y);
        let y0 = fy.floor() as u32;
        let y1 = (y0 + 1).min(src.height() - 1);
        let wy = fy - y0 as f32;
        for x in 0..width {
            let fx = ((x as f32 + 0.5) * sx - 0.5).clamp(0.0, max_x);
            let x0 = fx.floor() as u32;
            let x1 = (x0 + 1).min(src.width() - 1);
            let wx = fx - x0 as f32;
            for c in 0..channels {
                let top = src.sample(x0, y0, c) * (1.0 - wx) + src.sample(x1, y0, c) * wx;
                let bottom = src.sample(x0, y1, c) * (1.0 - wx) + src.sample(x1, y1, c) * wx;
                data.push(top * (1.0 - wy) + bottom * wy);
            }
        }
    }
    Raster::new(width, height, src.channels(), data)
}

/// ITU-R BT.601 luma. Gray input is returned unchanged.
pub fn grayscale(src: &Raster) -> Result<Raster, PrepError> {
    match src.channels() {
        Channels::Gray => Ok(src.clone()),
        Channels::Rgb => {
            let data = src
                .data()
                .chunks_exact(3)
                .map(|px| 0.299 * px[0] + 0.587 * px[1] + 0.114 * px[2])
                .collect();
            Raster::new(src.width(), src.height(), Channels::Gray, data)
        }
    }
}

pub fn flip_horizontal(src: &Raster) -> Result<Raster, PrepError> {
    let channels = src.channels().count();
    let row_len = src.width() as usize * channels;
    let mut data = Vec::with_capacity(src.data().len());
    for row in src.data().chunks_exact(row_len.max(1)) {
        for px in row.chunks_exact(channels).rev() {
            data.extend_from_slice(px);
        }
    }
    Raster::new(src.width(), src.height(), src.channels(), data)
}

/// Min-max stretch of all samples to `[0, 1]`. A flat raster maps to zero.
pub fn normalize(src: &Raster) -> Result<Raster, PrepError> {
    let min = src.data().iter().copied().fold(f32::INFINITY, f32::min);
    let max = src.data().iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let range = max - min;
    let data = src
        .data()
        .iter()
        .map(|v| if range > 0.0 { (v - min) / range } else { 0.0 })
        .collect();
    Raster::new(src.width(), src.height(), src.channels(), data)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gray(width: u32, height: u32, data: &[f32]) -> Raster {
        Raster::new(width, height, Channels::Gray, data.to_vec()).unwrap()
    }

    #[test]
    fn test_resize_constant_stays_constant() {
        let src = gray(2, 2, &[0.5; 4]);
        let out = resize_bilinear(&src, 5, 3).unwrap();
        assert_eq!((out.width(), out.height()), (5, 3));
        assert!(out.data().iter().all(|v| (v - 0.5).abs() < 1e-6));
    }

    #[test]
    fn test_resize_rejects_zero() {
        assert!(resize_bilinear(&gray(1, 1, &[0.0]), 0, 4).is_err());
    }

    #[test]
    fn test_grayscale_luma() {
        let src = Raster::new(1, 1, Channels::Rgb, vec![1.0, 1.0, 1.0]).unwrap();
        let out = grayscale(&src).unwrap();
        assert_eq!(out.channels(), Channels::Gray);
        assert!((out.data()[0] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_flip_rgb_keeps_channel_order() {
        let src = Raster::new(2, 1, Channels::Rgb, vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6]).unwrap();
        let out = flip_horizontal(&src).unwrap();
        assert_eq!(out.data(), &[0.4, 0.5, 0.6, 0.1, 0.2, 0.3]);
    }

    #[test]
    fn test_normalize_stretches() {
        let out = normalize(&gray(3, 1, &[0.2, 0.4, 0.6])).unwrap();
        let expected = [0.0, 0.5, 1.0];
        for (a, b) in out.data().iter().zip(expected) {
            assert!((a - b).abs() < 1e-6);
        }
        assert_eq!(normalize(&gray(2, 1, &[0.3, 0.3])).unwrap().data(), &[0.0, 0.0]);
    }
}
