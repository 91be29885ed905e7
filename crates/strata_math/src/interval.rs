/// A closed range `[min, max]` along one axis.
///
/// An interval with `min > max` is empty and contains nothing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval {
    pub min: f32,
    pub max: f32,
}

impl Interval {
    /// Create a new interval given min and max values.
    pub fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    /// Returns true if the interval contains nothing.
    pub fn is_empty(&self) -> bool {
        self.min > self.max
    }

    /// Grow the interval so that it contains x.
    pub fn include(&self, x: f32) -> Interval {
        Interval::new(self.min.min(x), self.max.max(x))
    }

    /// Creates an interval that surrounds two other intervals.
    pub fn surrounding(a: &Interval, b: &Interval) -> Interval {
        Interval::new(a.min.min(b.min), a.max.max(b.max))
    }

    /// An empty interval (min > max, contains nothing).
    pub const EMPTY: Interval = Interval {
        min: f32::INFINITY,
        max: f32::NEG_INFINITY,
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_interval() {
        assert!(Interval::EMPTY.is_empty());
        assert_eq!(Interval::EMPTY.include(0.0), Interval::new(0.0, 0.0));
    }

    #[test]
    fn test_include_grows_empty() {
        let interval = Interval::EMPTY.include(2.0).include(-1.0);
        assert_eq!(interval, Interval::new(-1.0, 2.0));
    }

    #[test]
    fn test_surrounding() {
        let a = Interval::new(0.0, 1.0);
        let b = Interval::new(4.0, 5.0);
        let s = Interval::surrounding(&a, &b);
        assert_eq!(s.min, 0.0);
        assert_eq!(s.max, 5.0);
        assert!(!s.is_empty());
    }
}
