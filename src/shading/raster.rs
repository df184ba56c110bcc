//! Row-major 2D grids and region-of-interest masks.

use crate::error::ShadingError;

/// A `width x height` grid stored row by row.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster<T> {
    width: usize,
    height: usize,
    data: Vec<T>,
}

impl<T> Raster<T> {
    pub fn new(width: usize, height: usize, data: Vec<T>) -> Result<Self, ShadingError> {
        let expected = width * height;
        if data.len() != expected {
            return Err(ShadingError::BufferLength {
                width,
                height,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> T) -> Self {
        let mut data = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            data,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn get(&self, x: usize, y: usize) -> Option<&T> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.data.get(y * self.width + x)
    }

    pub fn map<U>(&self, f: impl FnMut(&T) -> U) -> Raster<U> {
        Raster {
            width: self.width,
            height: self.height,
            data: self.data.iter().map(f).collect(),
        }
    }
}

impl<T: Clone> Raster<T> {
    pub fn filled(width: usize, height: usize, value: T) -> Self {
        Self {
            width,
            height,
            data: vec![value; width * height],
        }
    }
}

/// Pixels that belong to the region being analysed.
#[derive(Debug, Clone, PartialEq)]
pub struct RoiMask {
    width: usize,
    height: usize,
    valid: Vec<bool>,
    count: usize,
}

impl RoiMask {
    pub fn from_raster<T>(raster: &Raster<T>, mut keep: impl FnMut(&T) -> bool) -> Self {
        let valid: Vec<bool> = raster.data().iter().map(|v| keep(v)).collect();
        let count = valid.iter().filter(|&&v| v).count();
        Self {
            width: raster.width(),
            height: raster.height(),
            valid,
            count,
        }
    }

    /// Valid wherever the elevation is strictly below `nodata`. NaN is never
    /// valid.
    pub fn from_valid_below(elevation: &Raster<f64>, nodata: f64) -> Self {
        Self::from_raster(elevation, |&z| z < nodata)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Number of pixels inside the region.
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn contains(&self, x: usize, y: usize) -> bool {
        x < self.width && y < self.height && self.valid[y * self.width + x]
    }

    /// Values of `raster` inside the region, in row-major order.
    pub fn select<'a, T>(&'a self, raster: &'a Raster<T>) -> impl Iterator<Item = &'a T> + 'a {
        raster
            .data()
            .iter()
            .zip(&self.valid)
            .filter(|(_, &inside)| inside)
            .map(|(v, _)| v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_checks_buffer_length() {
        assert!(Raster::new(2, 2, vec![0u8; 4]).is_ok());
        assert!(matches!(
            Raster::new(3, 2, vec![0u8; 5]),
            Err(ShadingError::BufferLength {
                expected: 6,
                actual: 5,
                ..
            })
        ));
    }

    #[test]
    fn from_fn_is_row_major() {
        let r = Raster::from_fn(3, 2, |x, y| 10 * y + x);
        assert_eq!(r.data(), &[0, 1, 2, 10, 11, 12]);
        assert_eq!(r.get(2, 1), Some(&12));
        assert_eq!(r.get(3, 0), None);
    }

    #[test]
    fn nodata_and_nan_are_outside_the_mask() {
        let dem = Raster::new(2, 2, vec![-1200.0, 32767.0, f64::NAN, 5.0]).unwrap();
        let mask = RoiMask::from_valid_below(&dem, 32767.0);
        assert_eq!(mask.count(), 2);
        assert!(mask.contains(0, 0));
        assert!(!mask.contains(1, 0));
        assert!(!mask.contains(0, 1));
        assert!(mask.contains(1, 1));

        let shade = Raster::new(2, 2, vec![1u8, 2, 3, 4]).unwrap();
        assert_eq!(mask.select(&shade).copied().collect::<Vec<_>>(), [1, 4]);
    }
}
