use std::fmt::{Display, Formatter};

/// Simulated platform API level used to choose between alternate shadows.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ApiLevel(pub u32);

impl ApiLevel {
    pub const MIN: ApiLevel = ApiLevel(1);
    pub const MAX: ApiLevel = ApiLevel(u32::MAX);
    /// Level used when nothing else is configured.
    pub const DEFAULT: ApiLevel = ApiLevel(35);

    pub fn get(self) -> u32 {
        self.0
    }
}

impl Default for ApiLevel {
    fn default() -> Self {
        ApiLevel::DEFAULT
    }
}

impl From<u32> for ApiLevel {
    fn from(value: u32) -> Self {
        ApiLevel(value)
    }
}

impl Display for ApiLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Inclusive range of API levels a shadow registration applies to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ApiRange {
    pub min: ApiLevel,
    pub max: ApiLevel,
}

impl ApiRange {
    pub const ALL: ApiRange = ApiRange { min: ApiLevel::MIN, max: ApiLevel::MAX };

    pub const fn new(min: ApiLevel, max: ApiLevel) -> Self {
        Self { min, max }
    }

    pub fn is_empty(&self) -> bool {
        self.min > self.max
    }

    pub fn contains(&self, level: ApiLevel) -> bool {
        self.min <= level && level <= self.max
    }

    pub fn overlaps(&self, other: &ApiRange) -> bool {
        !self.is_empty() && !other.is_empty() && self.min <= other.max && other.min <= self.max
    }
}

impl Default for ApiRange {
    fn default() -> Self {
        ApiRange::ALL
    }
}

impl Display for ApiRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.max == ApiLevel::MAX {
            write!(f, "{}..", self.min)
        } else {
            write!(f, "{}..={}", self.min, self.max)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ApiRange::new(ApiLevel(1), ApiLevel(20)), ApiRange::new(ApiLevel(21), ApiLevel(30)), false)]
    #[case(ApiRange::new(ApiLevel(1), ApiLevel(21)), ApiRange::new(ApiLevel(21), ApiLevel(30)), true)]
    #[case(ApiRange::ALL, ApiRange::new(ApiLevel(5), ApiLevel(5)), true)]
    #[case(ApiRange::new(ApiLevel(9), ApiLevel(3)), ApiRange::ALL, false)]
    fn overlap_is_inclusive(#[case] a: ApiRange, #[case] b: ApiRange, #[case] expected: bool) {
        assert_eq!(a.overlaps(&b), expected);
        assert_eq!(b.overlaps(&a), expected);
    }

    #[rstest]
    fn open_range_displays_without_upper_bound() {
        assert_eq!(ApiRange::new(ApiLevel(21), ApiLevel::MAX).to_string(), "21..");
        assert_eq!(ApiRange::new(ApiLevel(1), ApiLevel(20)).to_string(), "1..=20");
    }
}
