//! Core types and utilities for checkerboard camera calibration.
//!
//! This crate is intentionally small and purely geometric. It does *not*
//! depend on any concrete corner detector or image decoding crate; the
//! higher-level crates adapt their inputs into the types defined here.
//!
//! - [`GrayImage`] / [`GrayImageView`]: row-major 8-bit buffers with bilinear sampling.
//! - [`Homography`]: normalized DLT estimation between planes.
//! - [`CameraMatrix`] / [`Distortion`]: pinhole intrinsics and the
//!   five-coefficient Brown-Conrady lens model.
//! - [`synthetic`]: rendering and projection helpers used by tests and demos.

mod camera;
mod corner;
mod homography;
mod image;
mod logger;
pub mod synthetic;

pub use camera::{project_point, CameraMatrix, Distortion, UNDISTORT_ITERATIONS};
pub use corner::{Corner, GridCoords};
pub use homography::{estimate_homography, Homography};
pub use image::{sample_bilinear, sample_bilinear_u8, GrayImage, GrayImageView};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::init_with_level;
