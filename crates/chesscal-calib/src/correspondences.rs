use crate::CalibError;
use nalgebra::{Point2, Point3};

/// Index-aligned world/image point arrays, one pair per calibration view.
#[derive(Clone, Debug, Default)]
pub struct Correspondences {
    world: Vec<Vec<Point3<f64>>>,
    image: Vec<Vec<Point2<f64>>>,
    image_size: Option<(u32, u32)>,
}

impl Correspondences {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one view. Arrays of unequal length are rejected and leave the
    /// set untouched.
    pub fn push(&mut self, world: Vec<Point3<f64>>, image: Vec<Point2<f64>>) -> Result<(), CalibError> {
        if world.len() != image.len() {
            return Err(CalibError::MismatchedCorrespondences {
                view: self.world.len(),
                world: world.len(),
                image: image.len(),
            });
        }
        self.world.push(world);
        self.image.push(image);
        Ok(())
    }

    /// Remember the pixel size of the most recently processed image.
    pub fn record_image_size(&mut self, width: u32, height: u32) {
        self.image_size = Some((width, height));
    }

    pub fn image_size(&self) -> Option<(u32, u32)> {
        self.image_size
    }

    pub fn len(&self) -> usize {
        self.world.len()
    }

    pub fn is_empty(&self) -> bool {
        self.world.is_empty()
    }

    pub fn total_points(&self) -> usize {
        self.world.iter().map(Vec::len).sum()
    }

    pub fn world_points(&self) -> &[Vec<Point3<f64>>] {
        &self.world
    }

    pub fn image_points(&self) -> &[Vec<Point2<f64>>] {
        &self.image
    }

    pub fn views(&self) -> impl Iterator<Item = (&[Point3<f64>], &[Point2<f64>])> + '_ {
        self.world
            .iter()
            .zip(&self.image)
            .map(|(w, i)| (w.as_slice(), i.as_slice()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unequal_arrays() {
        let mut set = Correspondences::new();
        let err = set
            .push(vec![Point3::origin(); 3], vec![Point2::origin(); 2])
            .unwrap_err();
        assert!(matches!(
            err,
            CalibError::MismatchedCorrespondences {
                view: 0,
                world: 3,
                image: 2
            }
        ));
        assert!(set.is_empty());
    }

    #[test]
    fn keeps_views_aligned() {
        let mut set = Correspondences::new();
        set.push(vec![Point3::origin(); 4], vec![Point2::origin(); 4])
            .unwrap();
        set.push(vec![Point3::new(1.0, 0.0, 0.0); 2], vec![Point2::new(3.0, 4.0); 2])
            .unwrap();
        set.record_image_size(640, 480);
        set.record_image_size(1920, 1080);

        assert_eq!(set.len(), 2);
        assert_eq!(set.total_points(), 6);
        assert_eq!(set.image_size(), Some((1920, 1080)));
        let (w, i) = set.views().nth(1).unwrap();
        assert_eq!(w[0].x, 1.0);
        assert_eq!(i[1].y, 4.0);
    }
}
