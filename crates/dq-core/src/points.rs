//! Point proxy views
//!
//! Polylines accept points in three raw encodings. Instead of converting them,
//! the handler reads them through an [`IndexedPoints`] view that presents any
//! encoding as a sequence of [`DVec2`], optionally rotated and translated.
//!
//! Views never copy the backing array. Every `get` recomputes its result, so
//! a caller mutating a [`SharedPoints`] between two reads sees the change.

use std::sync::Arc;

use glam::DVec2;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::value::Value;

/// Raw point array encodings
#[derive(Debug, Clone, PartialEq)]
pub enum RawPoints {
    /// Alternating coordinates `[x0, y0, x1, y1, ...]`
    Flat(Vec<f64>),
    /// Coordinate pairs `[[x0, y0], [x1, y1], ...]`
    Pairs(Vec<[f64; 2]>),
    /// Point objects `[{x, y}, ...]`
    Objects(Vec<DVec2>),
}

impl RawPoints {
    /// Detect the encoding from the first element of a value list.
    ///
    /// A number selects `Flat`, a list selects `Pairs` and a map selects
    /// `Objects`. Entries that do not fit the detected encoding read as zero.
    pub fn detect(values: &[Value]) -> Option<Self> {
        match values.first()? {
            Value::Num(_) | Value::Str(_) => Some(Self::flat_from(values)),
            Value::List(_) => Some(Self::pairs_from(values)),
            Value::Map(_) => Some(Self::objects_from(values)),
            _ => None,
        }
    }

    /// Decode with an explicit format token (`"x,y"`, `"[x,y]"`, `"{x,y}"`).
    /// Unknown tokens fall back to detection.
    pub fn from_format(format: &str, values: &[Value]) -> Option<Self> {
        match format {
            "x,y" => Some(Self::flat_from(values)),
            "[x,y]" => Some(Self::pairs_from(values)),
            "{x,y}" => Some(Self::objects_from(values)),
            _ => Self::detect(values),
        }
    }

    fn flat_from(values: &[Value]) -> Self {
        Self::Flat(values.iter().map(|v| v.as_num().unwrap_or(0.0)).collect())
    }

    fn pairs_from(values: &[Value]) -> Self {
        Self::Pairs(
            values
                .iter()
                .map(|v| {
                    let nums = v.as_numbers().unwrap_or_default();
                    [
                        nums.first().copied().unwrap_or(0.0),
                        nums.get(1).copied().unwrap_or(0.0),
                    ]
                })
                .collect(),
        )
    }

    fn objects_from(values: &[Value]) -> Self {
        Self::Objects(
            values
                .iter()
                .map(|v| v.as_point().unwrap_or(DVec2::ZERO))
                .collect(),
        )
    }

    /// Number of logical points
    pub fn len(&self) -> usize {
        match self {
            Self::Flat(data) => data.len() / 2,
            Self::Pairs(data) => data.len(),
            Self::Objects(data) => data.len(),
        }
    }

    /// Whether there are no logical points
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Shared, caller-mutable point array
#[derive(Debug, Clone)]
pub struct SharedPoints(Arc<RwLock<RawPoints>>);

impl SharedPoints {
    /// Wrap a raw point array
    pub fn new(raw: RawPoints) -> Self {
        Self(Arc::new(RwLock::new(raw)))
    }

    /// Read access to the backing array
    pub fn read(&self) -> RwLockReadGuard<'_, RawPoints> {
        self.0.read()
    }

    /// Write access to the backing array
    pub fn write(&self) -> RwLockWriteGuard<'_, RawPoints> {
        self.0.write()
    }

    /// Number of logical points
    pub fn len(&self) -> usize {
        self.0.read().len()
    }

    /// Whether there are no logical points
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Identity comparison
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl From<RawPoints> for SharedPoints {
    fn from(raw: RawPoints) -> Self {
        Self::new(raw)
    }
}

/// Random-access read-only point sequence
pub trait IndexedPoints {
    /// Number of points
    fn len(&self) -> usize;

    /// Point `i`, `None` when out of range
    fn get(&self, i: usize) -> Option<DVec2>;

    /// Whether the sequence is empty
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<'a> dyn IndexedPoints + 'a {
    /// Iterate the points in index order
    pub fn iter(&self) -> PointIter<'_> {
        PointIter {
            points: self,
            index: 0,
        }
    }
}

/// Forward iterator over an [`IndexedPoints`] view
pub struct PointIter<'a> {
    points: &'a dyn IndexedPoints,
    index: usize,
}

impl Iterator for PointIter<'_> {
    type Item = DVec2;

    fn next(&mut self) -> Option<DVec2> {
        let p = self.points.get(self.index)?;
        self.index += 1;
        Some(p)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let rest = self.points.len().saturating_sub(self.index);
        (rest, Some(rest))
    }
}

impl<'a> IntoIterator for &'a (dyn IndexedPoints + 'a) {
    type Item = DVec2;
    type IntoIter = PointIter<'a>;

    fn into_iter(self) -> PointIter<'a> {
        self.iter()
    }
}

/// View over `[x0, y0, x1, y1, ...]`
pub struct FlatView<'a>(pub &'a [f64]);

impl IndexedPoints for FlatView<'_> {
    fn len(&self) -> usize {
        self.0.len() / 2
    }

    fn get(&self, i: usize) -> Option<DVec2> {
        if i >= self.len() {
            return None;
        }
        Some(DVec2::new(self.0[2 * i], self.0[2 * i + 1]))
    }
}

/// View over `[[x0, y0], ...]`
pub struct PairView<'a>(pub &'a [[f64; 2]]);

impl IndexedPoints for PairView<'_> {
    fn len(&self) -> usize {
        self.0.len()
    }

    fn get(&self, i: usize) -> Option<DVec2> {
        self.0.get(i).map(|&[x, y]| DVec2::new(x, y))
    }
}

/// View over `[{x, y}, ...]`
pub struct ObjectView<'a>(pub &'a [DVec2]);

impl IndexedPoints for ObjectView<'_> {
    fn len(&self) -> usize {
        self.0.len()
    }

    fn get(&self, i: usize) -> Option<DVec2> {
        self.0.get(i).copied()
    }
}

/// Rotate-then-translate adapter over another view
pub struct TransformView<'a> {
    inner: Box<dyn IndexedPoints + 'a>,
    offset: DVec2,
    sin: f64,
    cos: f64,
}

impl<'a> TransformView<'a> {
    /// Wrap `inner`, rotating by `w` then translating by `(x, y)`
    pub fn new(inner: Box<dyn IndexedPoints + 'a>, x: f64, y: f64, w: f64) -> Self {
        let (sin, cos) = w.sin_cos();
        Self {
            inner,
            offset: DVec2::new(x, y),
            sin,
            cos,
        }
    }
}

impl IndexedPoints for TransformView<'_> {
    fn len(&self) -> usize {
        self.inner.len()
    }

    fn get(&self, i: usize) -> Option<DVec2> {
        let p = self.inner.get(i)?;
        Some(DVec2::new(
            p.x * self.cos - p.y * self.sin + self.offset.x,
            p.x * self.sin + p.y * self.cos + self.offset.y,
        ))
    }
}

/// Build a view over `raw`, transformed only when any of `x`, `y`, `w` is non-zero.
pub fn point_view(raw: &RawPoints, x: f64, y: f64, w: f64) -> Box<dyn IndexedPoints + '_> {
    let base: Box<dyn IndexedPoints + '_> = match raw {
        RawPoints::Flat(data) => Box::new(FlatView(data)),
        RawPoints::Pairs(data) => Box::new(PairView(data)),
        RawPoints::Objects(data) => Box::new(ObjectView(data)),
    };
    if x != 0.0 || y != 0.0 || w != 0.0 {
        Box::new(TransformView::new(base, x, y, w))
    } else {
        base
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    fn encodings() -> Vec<RawPoints> {
        vec![
            RawPoints::Flat(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]),
            RawPoints::Pairs(vec![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]]),
            RawPoints::Objects(vec![
                DVec2::new(1.0, 2.0),
                DVec2::new(3.0, 4.0),
                DVec2::new(5.0, 6.0),
            ]),
        ]
    }

    #[test]
    fn test_all_encodings_index_canonically() {
        let expected = [DVec2::new(1.0, 2.0), DVec2::new(3.0, 4.0), DVec2::new(5.0, 6.0)];
        for raw in encodings() {
            let view = point_view(&raw, 0.0, 0.0, 0.0);
            assert_eq!(view.len(), 3, "length mismatch for {raw:?}");
            for (i, p) in expected.iter().enumerate() {
                assert_eq!(view.get(i), Some(*p), "point {i} mismatch for {raw:?}");
            }
            assert_eq!(view.get(3), None, "out of range must be None");
        }
    }

    #[test]
    fn test_iteration_matches_indexing() {
        for raw in encodings() {
            let view = point_view(&raw, 2.0, -1.0, 0.3);
            let indexed: Vec<DVec2> = (0..view.len()).filter_map(|i| view.get(i)).collect();
            let iterated: Vec<DVec2> = view.iter().collect();
            assert_eq!(indexed, iterated, "iteration differs from indexing for {raw:?}");
        }
    }

    #[test]
    fn test_zero_transform_is_identity() {
        for raw in encodings() {
            let plain = point_view(&raw, 0.0, 0.0, 0.0);
            let base: Box<dyn IndexedPoints + '_> = match &raw {
                RawPoints::Flat(d) => Box::new(FlatView(d)),
                RawPoints::Pairs(d) => Box::new(PairView(d)),
                RawPoints::Objects(d) => Box::new(ObjectView(d)),
            };
            let wrapped = TransformView::new(base, 0.0, 0.0, 0.0);
            assert_eq!(plain.len(), wrapped.len());
            for i in 0..plain.len() {
                assert_eq!(plain.get(i), wrapped.get(i), "point {i} differs");
            }
        }
    }

    #[test]
    fn test_flat_odd_length_ignores_trailing_value() {
        let raw = RawPoints::Flat(vec![1.0, 2.0, 3.0]);
        let view = point_view(&raw, 0.0, 0.0, 0.0);
        assert_eq!(view.len(), 1);
        assert_eq!(view.iter().count(), 1);
    }

    #[test]
    fn test_rotate_then_translate() {
        let raw = RawPoints::Pairs(vec![[1.0, 0.0]]);
        let view = point_view(&raw, 10.0, 20.0, FRAC_PI_2);
        let p = view.get(0).unwrap();
        assert_relative_eq!(p.x, 10.0, epsilon = 1e-12);
        assert_relative_eq!(p.y, 21.0, epsilon = 1e-12);
    }

    #[test]
    fn test_view_sees_mutation_between_reads() {
        let shared = SharedPoints::new(RawPoints::Flat(vec![0.0, 0.0, 1.0, 1.0]));
        {
            let raw = shared.read();
            let view = point_view(&raw, 1.0, 0.0, 0.0);
            assert_eq!(view.get(1), Some(DVec2::new(2.0, 1.0)));
        }
        if let RawPoints::Flat(data) = &mut *shared.write() {
            data[2] = 5.0;
        }
        let raw = shared.read();
        let view = point_view(&raw, 1.0, 0.0, 0.0);
        assert_eq!(view.get(1), Some(DVec2::new(6.0, 1.0)), "view must reflect mutation");
    }

    #[test]
    fn test_detect_and_format() {
        let flat = vec![Value::Num(1.0), Value::Num(2.0)];
        assert!(matches!(RawPoints::detect(&flat), Some(RawPoints::Flat(_))));

        let pairs = vec![Value::from(vec![1.0, 2.0])];
        assert!(matches!(RawPoints::detect(&pairs), Some(RawPoints::Pairs(_))));

        let objects = vec![Value::from(DVec2::new(1.0, 2.0))];
        assert_eq!(
            RawPoints::detect(&objects),
            Some(RawPoints::Objects(vec![DVec2::new(1.0, 2.0)]))
        );

        assert_eq!(RawPoints::detect(&[]), None);
        assert!(matches!(
            RawPoints::from_format("x,y", &pairs),
            Some(RawPoints::Flat(_))
        ));
    }
}
