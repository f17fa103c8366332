//! Conversion from cumulative to per-hour precipitation.
//!
//! The provider reports precipitation accumulated since issuance. Each
//! hour's output is the difference to the previous forecast hour, so the
//! engine remembers the last cumulative field it saw.

use chrono::NaiveDateTime;

use crate::error::{IngestionError, Result};
use crate::field::PrecipField;

/// Element-wise `current - prior`.
///
/// Without a prior the field is returned unchanged. NaN in either input
/// yields NaN.
pub fn apply_delta(current: &PrecipField, prior: Option<&PrecipField>) -> Result<PrecipField> {
    let Some(prior) = prior else {
        return Ok(current.clone());
    };

    if prior.shape() != current.shape() {
        return Err(IngestionError::ShapeMismatch {
            expected: prior.shape(),
            actual: current.shape(),
        });
    }

    let values = current
        .values
        .iter()
        .zip(&prior.values)
        .map(|(now, before)| now - before)
        .collect();

    Ok(PrecipField {
        rows: current.rows,
        cols: current.cols,
        values,
    })
}

/// Delta state carried across the files of one forecast run.
#[derive(Debug, Default)]
pub struct DeltaEngine {
    prior: Option<(NaiveDateTime, PrecipField)>,
}

impl DeltaEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget the stored field so the next file starts a new run.
    pub fn reset(&mut self) {
        self.prior = None;
    }

    /// Validity time of the stored cumulative field.
    pub fn last_validity(&self) -> Option<NaiveDateTime> {
        self.prior.as_ref().map(|(validity, _)| *validity)
    }

    /// Convert a cumulative field into the increment since the previous
    /// call, then remember it as the new prior.
    ///
    /// Validity times must strictly increase within a run. On error the
    /// stored state is left untouched.
    pub fn apply(&mut self, validity: NaiveDateTime, cumulative: PrecipField) -> Result<PrecipField> {
        if let Some(previous) = self.last_validity() {
            if validity <= previous {
                return Err(IngestionError::OutOfOrder { previous, validity });
            }
        }

        let delta = apply_delta(&cumulative, self.prior.as_ref().map(|(_, field)| field))?;
        self.prior = Some((validity, cumulative));
        Ok(delta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn hour(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn scalar(v: f32) -> PrecipField {
        PrecipField::new(1, 1, vec![v]).unwrap()
    }

    #[test]
    fn test_no_prior_is_identity() {
        let field = PrecipField::new(2, 2, vec![1.0, 2.0, f32::NAN, 4.0]).unwrap();
        let out = apply_delta(&field, None).unwrap();

        assert_eq!(out.shape(), (2, 2));
        assert_eq!(out.values[0], 1.0);
        assert!(out.values[2].is_nan());
    }

    #[test]
    fn test_cumulative_sequence_becomes_increments() {
        let mut engine = DeltaEngine::new();

        let outputs: Vec<f32> = [(1, 10.0), (2, 25.0), (3, 40.0)]
            .into_iter()
            .map(|(h, v)| engine.apply(hour(h), scalar(v)).unwrap().values[0])
            .collect();

        assert_eq!(outputs, vec![10.0, 15.0, 15.0]);
        assert_eq!(engine.last_validity(), Some(hour(3)));
    }

    #[test]
    fn test_nan_propagates() {
        let current = PrecipField::new(1, 2, vec![5.0, f32::NAN]).unwrap();
        let prior = PrecipField::new(1, 2, vec![f32::NAN, 1.0]).unwrap();

        let out = apply_delta(&current, Some(&prior)).unwrap();
        assert!(out.values.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_out_of_order_rejected_without_state_change() {
        let mut engine = DeltaEngine::new();
        engine.apply(hour(2), scalar(20.0)).unwrap();

        let err = engine.apply(hour(1), scalar(10.0)).unwrap_err();
        assert!(matches!(err, IngestionError::OutOfOrder { .. }));
        assert!(matches!(
            engine.apply(hour(2), scalar(30.0)),
            Err(IngestionError::OutOfOrder { .. })
        ));

        assert_eq!(engine.apply(hour(3), scalar(26.0)).unwrap().values, vec![6.0]);
    }

    #[test]
    fn test_shape_mismatch() {
        let mut engine = DeltaEngine::new();
        engine.apply(hour(1), PrecipField::new(2, 2, vec![0.0; 4]).unwrap()).unwrap();

        let err = engine
            .apply(hour(2), PrecipField::new(2, 3, vec![0.0; 6]).unwrap())
            .unwrap_err();
        assert!(matches!(
            err,
            IngestionError::ShapeMismatch {
                expected: (2, 2),
                actual: (2, 3)
            }
        ));
        assert_eq!(engine.last_validity(), Some(hour(1)));
    }

    #[test]
    fn test_reset_starts_new_run() {
        let mut engine = DeltaEngine::new();
        engine.apply(hour(5), scalar(50.0)).unwrap();
        engine.reset();

        assert_eq!(engine.last_validity(), None);
        assert_eq!(engine.apply(hour(1), scalar(10.0)).unwrap().values, vec![10.0]);
    }
}
