//! Distortion removal: free-scaling camera matrix and per-pixel remap.

use crate::CalibError;
use chesscal_core::{CameraMatrix, Distortion, UNDISTORT_ITERATIONS};
use image::{ImageBuffer, Pixel};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Axis-aligned pixel rectangle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roi {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Clone, Copy, Debug)]
struct RectF {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
}

const GRID_SAMPLES: usize = 9;

/// Largest rectangle inside, and smallest rectangle around, the undistorted
/// image border. Coordinates are normalized, or pixels of `target` if given.
fn undistorted_rects(
    camera: &CameraMatrix,
    distortion: &Distortion,
    (width, height): (u32, u32),
    target: Option<&CameraMatrix>,
) -> (RectF, RectF) {
    let (mut ix0, mut ix1, mut iy0, mut iy1) = (f64::MIN, f64::MAX, f64::MIN, f64::MAX);
    let (mut ox0, mut ox1, mut oy0, mut oy1) = (f64::MAX, f64::MIN, f64::MAX, f64::MIN);
    let n = GRID_SAMPLES - 1;

    for gy in 0..GRID_SAMPLES {
        for gx in 0..GRID_SAMPLES {
            let pix = Point2::new(
                gx as f64 * (width as f64 - 1.0) / n as f64,
                gy as f64 * (height as f64 - 1.0) / n as f64,
            );
            let mut p = distortion.undistort(camera.normalized_from_pixel(pix), UNDISTORT_ITERATIONS);
            if let Some(k) = target {
                p = k.pixel_from_normalized(p);
            }

            ox0 = ox0.min(p.x);
            ox1 = ox1.max(p.x);
            oy0 = oy0.min(p.y);
            oy1 = oy1.max(p.y);
            if gx == 0 {
                ix0 = ix0.max(p.x);
            }
            if gx == n {
                ix1 = ix1.min(p.x);
            }
            if gy == 0 {
                iy0 = iy0.max(p.y);
            }
            if gy == n {
                iy1 = iy1.min(p.y);
            }
        }
    }

    (
        RectF {
            x: ix0,
            y: iy0,
            width: ix1 - ix0,
            height: iy1 - iy0,
        },
        RectF {
            x: ox0,
            y: oy0,
            width: ox1 - ox0,
            height: oy1 - oy0,
        },
    )
}

/// Camera matrix for the undistorted image, scaled by `alpha`.
///
/// `alpha = 0` keeps only valid pixels (no black border), `alpha = 1` keeps
/// every source pixel. The returned ROI is the all-valid region of the
/// undistorted image.
pub fn optimal_new_camera_matrix(
    camera: &CameraMatrix,
    distortion: &Distortion,
    image_size: (u32, u32),
    alpha: f64,
) -> Result<(CameraMatrix, Roi), CalibError> {
    let (width, height) = image_size;
    if width < 2 || height < 2 {
        return Err(CalibError::InvalidImageSize { width, height });
    }
    let alpha = alpha.clamp(0.0, 1.0);
    let (inner, outer) = undistorted_rects(camera, distortion, image_size, None);
    if inner.width <= 0.0 || inner.height <= 0.0 || outer.width <= 0.0 || outer.height <= 0.0 {
        return Err(CalibError::DegenerateConfiguration("undistorted image border"));
    }

    let (w1, h1) = (width as f64 - 1.0, height as f64 - 1.0);
    let fx0 = w1 / inner.width;
    let fy0 = h1 / inner.height;
    let cx0 = -fx0 * inner.x;
    let cy0 = -fy0 * inner.y;
    let fx1 = w1 / outer.width;
    let fy1 = h1 / outer.height;
    let cx1 = -fx1 * outer.x;
    let cy1 = -fy1 * outer.y;

    let new_camera = CameraMatrix::new(
        fx0 * (1.0 - alpha) + fx1 * alpha,
        fy0 * (1.0 - alpha) + fy1 * alpha,
        cx0 * (1.0 - alpha) + cx1 * alpha,
        cy0 * (1.0 - alpha) + cy1 * alpha,
    );
    if !new_camera.is_finite() {
        return Err(CalibError::DegenerateConfiguration("undistorted image border"));
    }

    let (valid, _) = undistorted_rects(camera, distortion, image_size, Some(&new_camera));
    // Absorb round-off so an exact border does not lose a pixel.
    let ceil = |v: f64| (v - 1e-6).ceil();
    let floor = |v: f64| (v + 1e-6).floor();
    let x0 = ceil(valid.x).max(0.0);
    let y0 = ceil(valid.y).max(0.0);
    let x1 = (ceil(valid.x) + floor(valid.width)).min(width as f64);
    let y1 = (ceil(valid.y) + floor(valid.height)).min(height as f64);
    let roi = if x1 > x0 && y1 > y0 {
        Roi {
            x: x0 as u32,
            y: y0 as u32,
            width: (x1 - x0) as u32,
            height: (y1 - y0) as u32,
        }
    } else {
        Roi {
            x: 0,
            y: 0,
            width: 0,
            height: 0,
        }
    };

    Ok((new_camera, roi))
}

/// Source coordinates for every destination pixel.
#[derive(Clone, Debug)]
pub struct UndistortMap {
    pub width: u32,
    pub height: u32,
    map_x: Vec<f32>,
    map_y: Vec<f32>,
}

impl UndistortMap {
    /// Destination pixels are back-projected with `new_camera`, distorted and
    /// projected with `camera`.
    pub fn new(camera: &CameraMatrix, distortion: &Distortion, new_camera: &CameraMatrix, size: (u32, u32)) -> Self {
        let (width, height) = size;
        let len = width as usize * height as usize;
        let mut map_x = Vec::with_capacity(len);
        let mut map_y = Vec::with_capacity(len);
        for v in 0..height {
            for u in 0..width {
                let ideal = new_camera.normalized_from_pixel(Point2::new(u as f64, v as f64));
                let src = camera.pixel_from_normalized(distortion.distort(ideal));
                map_x.push(src.x as f32);
                map_y.push(src.y as f32);
            }
        }
        Self {
            width,
            height,
            map_x,
            map_y,
        }
    }

    pub fn source(&self, u: u32, v: u32) -> Option<(f32, f32)> {
        if u >= self.width || v >= self.height {
            return None;
        }
        let idx = v as usize * self.width as usize + u as usize;
        Some((self.map_x[idx], self.map_y[idx]))
    }

    /// Bilinear remap; taps outside the source image read as black.
    pub fn remap<P>(&self, src: &ImageBuffer<P, Vec<u8>>) -> ImageBuffer<P, Vec<u8>>
    where
        P: Pixel<Subpixel = u8>,
    {
        let channels = P::CHANNEL_COUNT as usize;
        let (sw, sh) = (src.width() as i64, src.height() as i64);
        let mut out = ImageBuffer::<P, Vec<u8>>::new(self.width, self.height);
        let mut acc = vec![0.0f32; channels];

        for (idx, (x, y)) in self.map_x.iter().zip(&self.map_y).enumerate() {
            let (x, y) = (*x, *y);
            if !(x > -1.0 && y > -1.0 && (x as i64) < sw && (y as i64) < sh) {
                continue;
            }
            let x0 = x.floor() as i64;
            let y0 = y.floor() as i64;
            let fx = x - x0 as f32;
            let fy = y - y0 as f32;
            acc.iter_mut().for_each(|a| *a = 0.0);

            for (dx, dy, w) in [
                (0, 0, (1.0 - fx) * (1.0 - fy)),
                (1, 0, fx * (1.0 - fy)),
                (0, 1, (1.0 - fx) * fy),
                (1, 1, fx * fy),
            ] {
                let (sx, sy) = (x0 + dx, y0 + dy);
                if w == 0.0 || sx < 0 || sy < 0 || sx >= sw || sy >= sh {
                    continue;
                }
                let px = src.get_pixel(sx as u32, sy as u32);
                for (a, c) in acc.iter_mut().zip(px.channels()) {
                    *a += w * *c as f32;
                }
            }

            let u = (idx % self.width as usize) as u32;
            let v = (idx / self.width as usize) as u32;
            let dst = out.get_pixel_mut(u, v);
            for (c, a) in dst.channels_mut().iter_mut().zip(&acc) {
                *c = a.round().clamp(0.0, 255.0) as u8;
            }
        }
        out
    }
}

/// Undistort a whole image in one call.
pub fn undistort_image<P>(
    src: &ImageBuffer<P, Vec<u8>>,
    camera: &CameraMatrix,
    distortion: &Distortion,
    new_camera: &CameraMatrix,
) -> ImageBuffer<P, Vec<u8>>
where
    P: Pixel<Subpixel = u8>,
{
    UndistortMap::new(camera, distortion, new_camera, src.dimensions()).remap(src)
}
