//! Feature vectors and the matrix cleaning applied before inference

use crate::error::FeatureError;
use super::FeatureColumns;

/// One prediction's input, in model column order.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    values: Vec<f64>,
}

impl FeatureVector {
    /// Build from named values. Columns not supplied are zero.
    pub fn from_named<'a, I>(columns: &FeatureColumns, named: I) -> Result<Self, FeatureError>
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        let mut values = vec![0.0; columns.len()];
        for (name, value) in named {
            let position = columns
                .position(name)
                .ok_or_else(|| FeatureError::UnknownFeature(name.to_string()))?;
            values[position] = value;
        }
        Ok(Self { values })
    }

    pub fn from_values(columns: &FeatureColumns, values: Vec<f64>) -> Result<Self, FeatureError> {
        if values.len() != columns.len() {
            return Err(FeatureError::FeatureCountMismatch {
                expected: columns.len(),
                actual: values.len(),
            });
        }
        Ok(Self { values })
    }

    pub fn get(&self, columns: &FeatureColumns, name: &str) -> Option<f64> {
        columns.position(name).map(|i| self.values[i])
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn into_values(self) -> Vec<f64> {
        self.values
    }
}

/// A batch of feature rows sharing one column layout.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    width: usize,
    rows: Vec<Vec<f64>>,
}

impl FeatureMatrix {
    pub fn from_rows(columns: &FeatureColumns, rows: Vec<Vec<f64>>) -> Result<Self, FeatureError> {
        if rows.is_empty() {
            return Err(FeatureError::EmptyMatrix);
        }
        if let Some(bad) = rows.iter().find(|row| row.len() != columns.len()) {
            return Err(FeatureError::FeatureCountMismatch {
                expected: columns.len(),
                actual: bad.len(),
            });
        }
        Ok(Self { width: columns.len(), rows })
    }

    pub fn from_vector(vector: FeatureVector) -> Self {
        let values = vector.into_values();
        Self { width: values.len(), rows: vec![values] }
    }

    /// Replace missing and infinite cells, column by column:
    /// NaN takes the median of the column's non-NaN cells, then ±inf takes
    /// the median of the finite cells, and whatever is still non-finite
    /// becomes zero.
    pub fn sanitize(&mut self) {
        for column in 0..self.width {
            self.fill_nan_with_median(column);

            for row in self.rows.iter_mut() {
                if row[column].is_infinite() {
                    row[column] = f64::NAN;
                }
            }
            self.fill_nan_with_median(column);

            for row in self.rows.iter_mut() {
                if !row[column].is_finite() {
                    row[column] = 0.0;
                }
            }
        }
    }

    fn fill_nan_with_median(&mut self, column: usize) {
        let mut present: Vec<f64> = self
            .rows
            .iter()
            .map(|row| row[column])
            .filter(|v| !v.is_nan())
            .collect();

        if present.len() == self.rows.len() {
            return;
        }

        let Some(median) = median(&mut present) else {
            return;
        };

        for row in self.rows.iter_mut() {
            if row[column].is_nan() {
                row[column] = median;
            }
        }
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Median of non-NaN values; `None` when there are none.
fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        Some(values[mid])
    } else {
        Some((values[mid - 1] + values[mid]) / 2.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns(n: usize) -> FeatureColumns {
        FeatureColumns::new((0..n).map(|i| format!("f{}", i)).collect()).unwrap()
    }

    #[test]
    fn test_from_named_fills_zero_and_rejects_unknown() {
        let cols = columns(3);
        let vector = FeatureVector::from_named(&cols, [("f2", 4.0), ("f0", 1.5)]).unwrap();
        assert_eq!(vector.values(), &[1.5, 0.0, 4.0]);
        assert_eq!(vector.get(&cols, "f2"), Some(4.0));

        let err = FeatureVector::from_named(&cols, [("volume", 1.0)]).unwrap_err();
        assert_eq!(err, FeatureError::UnknownFeature("volume".into()));
    }

    #[test]
    fn test_from_values_checks_length() {
        let cols = columns(3);
        assert!(FeatureVector::from_values(&cols, vec![1.0, 2.0, 3.0]).is_ok());
        assert_eq!(
            FeatureVector::from_values(&cols, vec![1.0]).unwrap_err(),
            FeatureError::FeatureCountMismatch { expected: 3, actual: 1 }
        );
    }

    #[test]
    fn test_single_row_non_finite_becomes_zero() {
        let cols = columns(4);
        let vector =
            FeatureVector::from_values(&cols, vec![f64::NAN, f64::INFINITY, -f64::INFINITY, 2.0])
                .unwrap();
        let mut matrix = FeatureMatrix::from_vector(vector);
        matrix.sanitize();
        assert_eq!(matrix.rows()[0], vec![0.0, 0.0, 0.0, 2.0]);
    }

    #[test]
    fn test_nan_takes_column_median() {
        let cols = columns(2);
        let mut matrix = FeatureMatrix::from_rows(
            &cols,
            vec![
                vec![1.0, f64::NAN],
                vec![f64::NAN, f64::NAN],
                vec![3.0, f64::NAN],
                vec![10.0, f64::NAN],
            ],
        )
        .unwrap();
        matrix.sanitize();

        assert_eq!(matrix.rows()[1][0], 3.0);
        // Column with no values at all falls through to zero.
        assert!(matrix.rows().iter().all(|row| row[1] == 0.0));
    }

    #[test]
    fn test_infinity_takes_finite_median() {
        let cols = columns(1);
        let mut matrix = FeatureMatrix::from_rows(
            &cols,
            vec![vec![2.0], vec![f64::INFINITY], vec![4.0], vec![-f64::INFINITY], vec![6.0]],
        )
        .unwrap();
        matrix.sanitize();

        let column: Vec<f64> = matrix.rows().iter().map(|r| r[0]).collect();
        assert_eq!(column, vec![2.0, 4.0, 4.0, 4.0, 6.0]);
    }

    #[test]
    fn test_infinities_participate_in_nan_median() {
        // NaN is filled first with the median of [1, inf, inf] = inf, which
        // the second pass then resolves to the finite median 1.
        let cols = columns(1);
        let mut matrix = FeatureMatrix::from_rows(
            &cols,
            vec![vec![1.0], vec![f64::INFINITY], vec![f64::NAN], vec![f64::INFINITY]],
        )
        .unwrap();
        matrix.sanitize();
        assert!(matrix.rows().iter().all(|r| r[0] == 1.0));
    }

    #[test]
    fn test_matrix_shape_checks() {
        let cols = columns(2);
        assert_eq!(FeatureMatrix::from_rows(&cols, vec![]).unwrap_err(), FeatureError::EmptyMatrix);
        assert!(FeatureMatrix::from_rows(&cols, vec![vec![1.0, 2.0], vec![1.0]]).is_err());

        let matrix = FeatureMatrix::from_vector(FeatureVector::from_values(&cols, vec![1.0, 2.0]).unwrap());
        assert_eq!(matrix.len(), 1);
        assert_eq!(matrix.width(), 2);
    }
}
