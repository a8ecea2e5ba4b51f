use ndarray::Array2;

use crate::error::FeatureResult;

/// Element type of a descriptor matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorKind {
    /// Real valued vectors (SIFT, SURF, DAISY).
    Float,
    /// Packed bit strings (ORB, BRISK).
    Binary,
}

/// Descriptor matrix, one row per keypoint.
#[derive(Debug, Clone, PartialEq)]
pub enum Descriptors {
    Float(Array2<f32>),
    Binary(Array2<u8>),
}

impl Descriptors {
    /// Stack float rows of `width` elements. `None` when `rows` is empty.
    pub fn from_float_rows(rows: Vec<Vec<f32>>, width: usize) -> FeatureResult<Option<Self>> {
        if rows.is_empty() {
            return Ok(None);
        }
        let n = rows.len();
        let flat: Vec<f32> = rows.into_iter().flatten().collect();
        Ok(Some(Descriptors::Float(Array2::from_shape_vec((n, width), flat)?)))
    }

    /// Stack byte rows of `width` bytes. `None` when `rows` is empty.
    pub fn from_binary_rows(rows: Vec<Vec<u8>>, width: usize) -> FeatureResult<Option<Self>> {
        if rows.is_empty() {
            return Ok(None);
        }
        let n = rows.len();
        let flat: Vec<u8> = rows.into_iter().flatten().collect();
        Ok(Some(Descriptors::Binary(Array2::from_shape_vec((n, width), flat)?)))
    }

    pub fn kind(&self) -> DescriptorKind {
        match self {
            Descriptors::Float(_) => DescriptorKind::Float,
            Descriptors::Binary(_) => DescriptorKind::Binary,
        }
    }

    pub fn rows(&self) -> usize {
        self.shape().0
    }

    pub fn cols(&self) -> usize {
        self.shape().1
    }

    /// `(rows, cols)`
    pub fn shape(&self) -> (usize, usize) {
        match self {
            Descriptors::Float(m) => m.dim(),
            Descriptors::Binary(m) => m.dim(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows() == 0
    }

    pub fn as_float(&self) -> Option<&Array2<f32>> {
        match self {
            Descriptors::Float(m) => Some(m),
            Descriptors::Binary(_) => None,
        }
    }

    pub fn as_binary(&self) -> Option<&Array2<u8>> {
        match self {
            Descriptors::Binary(m) => Some(m),
            Descriptors::Float(_) => None,
        }
    }
}
