//! Index ranges for addressing part of a non-scalar value.

use std::fmt;
use std::str::FromStr;

use crate::Error;

/// One dimension of a [`NumericRange`]: an inclusive `min..=max` span.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RangeDimension {
    pub min: u32,
    pub max: u32,
}

/// A parsed index range such as `"2"`, `"1:3"` or `"0:1,2:4"`.
///
/// Each comma-separated part addresses one array dimension. A single index
/// `n` is shorthand for `n:n`. Bounds are inclusive and `min` must be
/// strictly less than `max` when both are given.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NumericRange {
    dimensions: Vec<RangeDimension>,
}

impl NumericRange {
    /// A one-dimensional `min:max` span. As in the text form, `min` must be
    /// less than `max`; use [`index`](Self::index) for a single element.
    pub fn new(min: u32, max: u32) -> Result<Self, Error> {
        if min >= max {
            return Err(Error::IndexRangeInvalid(format!("{}:{}", min, max)));
        }
        Ok(Self {
            dimensions: vec![RangeDimension { min, max }],
        })
    }

    /// A one-dimensional range selecting a single index.
    pub fn index(index: u32) -> Self {
        Self {
            dimensions: vec![RangeDimension {
                min: index,
                max: index,
            }],
        }
    }

    pub fn dimensions(&self) -> &[RangeDimension] {
        &self.dimensions
    }

    /// The single dimension of a flat range, or `IndexRangeInvalid` when the
    /// range addresses more than one dimension.
    pub fn single_dimension(&self) -> Result<RangeDimension, Error> {
        match self.dimensions.as_slice() {
            [dim] => Ok(*dim),
            _ => Err(Error::IndexRangeInvalid(format!(
                "{} (only one dimension is supported)",
                self
            ))),
        }
    }
}

impl FromStr for NumericRange {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::IndexRangeInvalid(s.to_string());
        if s.is_empty() {
            return Err(invalid());
        }

        let mut dimensions = Vec::new();
        for part in s.split(',') {
            let dim = match part.split_once(':') {
                Some((min, max)) => {
                    let min: u32 = min.parse().map_err(|_| invalid())?;
                    let max: u32 = max.parse().map_err(|_| invalid())?;
                    if min >= max {
                        return Err(invalid());
                    }
                    RangeDimension { min, max }
                }
                None => {
                    let index: u32 = part.parse().map_err(|_| invalid())?;
                    RangeDimension {
                        min: index,
                        max: index,
                    }
                }
            };
            dimensions.push(dim);
        }

        Ok(Self { dimensions })
    }
}

impl fmt::Display for NumericRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, dim) in self.dimensions.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            if dim.min == dim.max {
                write!(f, "{}", dim.min)?;
            } else {
                write!(f, "{}:{}", dim.min, dim.max)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_single_index() {
        let r: NumericRange = "4".parse().unwrap();
        assert_eq!(r.single_dimension().unwrap(), RangeDimension { min: 4, max: 4 });
        assert_eq!(r.to_string(), "4");
    }

    #[test]
    fn parse_span() {
        let r: NumericRange = "1:3".parse().unwrap();
        assert_eq!(r.single_dimension().unwrap(), RangeDimension { min: 1, max: 3 });
    }

    #[test]
    fn multi_dimension_is_parsed_but_not_flat() {
        let r: NumericRange = "0:1,2:4".parse().unwrap();
        assert_eq!(r.dimensions().len(), 2);
        assert_eq!(r.to_string(), "0:1,2:4");
        assert!(matches!(
            r.single_dimension(),
            Err(Error::IndexRangeInvalid(_))
        ));
    }

    #[test]
    fn rejects_malformed_ranges() {
        for bad in ["", "a", "3:1", "2:2", "1:", ":1", "1,,2", "-1"] {
            assert!(
                matches!(bad.parse::<NumericRange>(), Err(Error::IndexRangeInvalid(_))),
                "expected '{}' to be rejected",
                bad
            );
        }
    }

    #[test]
    fn new_checks_order() {
        assert!(NumericRange::new(2, 5).is_ok());
        assert!(NumericRange::new(5, 2).is_err());
        assert!(NumericRange::new(3, 3).is_err());
        assert!("3:3".parse::<NumericRange>().is_err());
        assert_eq!(NumericRange::index(3), "3".parse::<NumericRange>().unwrap());
    }
}
