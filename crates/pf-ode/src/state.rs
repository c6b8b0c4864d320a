//! ODE states and the layout of the complete state vector.

use crate::error::{OdeError, OdeResult};

/// Time, primary block and secondary blocks of an ODE state.
#[derive(Clone, Debug, PartialEq)]
pub struct OdeState {
    pub time: f64,
    pub primary: Vec<f64>,
    /// Secondary blocks in registration order (block index `k + 1`).
    pub secondary: Vec<Vec<f64>>,
}

impl OdeState {
    pub fn new(time: f64, primary: Vec<f64>) -> Self {
        Self {
            time,
            primary,
            secondary: Vec::new(),
        }
    }

    pub fn with_secondary(time: f64, primary: Vec<f64>, secondary: Vec<Vec<f64>>) -> Self {
        Self {
            time,
            primary,
            secondary,
        }
    }

    /// Block `index`: 0 is the primary block, `k` the k-th secondary block.
    pub fn block(&self, index: usize) -> Option<&[f64]> {
        if index == 0 {
            Some(&self.primary)
        } else {
            self.secondary.get(index - 1).map(Vec::as_slice)
        }
    }

    pub fn number_of_secondary_states(&self) -> usize {
        self.secondary.len()
    }
}

/// ODE state together with its time derivative.
#[derive(Clone, Debug, PartialEq)]
pub struct OdeStateAndDerivative {
    pub state: OdeState,
    pub primary_derivative: Vec<f64>,
    pub secondary_derivative: Vec<Vec<f64>>,
}

impl OdeStateAndDerivative {
    pub fn time(&self) -> f64 {
        self.state.time
    }

    pub fn primary(&self) -> &[f64] {
        &self.state.primary
    }

    pub fn secondary(&self, index: usize) -> Option<&[f64]> {
        self.state.secondary.get(index).map(Vec::as_slice)
    }

    pub fn block_derivative(&self, index: usize) -> Option<&[f64]> {
        if index == 0 {
            Some(&self.primary_derivative)
        } else {
            self.secondary_derivative.get(index - 1).map(Vec::as_slice)
        }
    }
}

/// Offsets of the primary and secondary blocks inside the complete state vector.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EquationsMapper {
    /// `starts[k]` is the first index of block `k`; the last entry is the total dimension.
    starts: Vec<usize>,
}

impl EquationsMapper {
    pub fn new(primary_dimension: usize) -> Self {
        Self {
            starts: vec![0, primary_dimension],
        }
    }

    /// Layout extended by one more block of `dimension` components.
    pub fn extended(&self, dimension: usize) -> Self {
        let mut starts = self.starts.clone();
        starts.push(self.total_dimension() + dimension);
        Self { starts }
    }

    /// Number of blocks, primary included.
    pub fn number_of_equations(&self) -> usize {
        self.starts.len() - 1
    }

    pub fn total_dimension(&self) -> usize {
        self.starts.last().copied().unwrap_or(0)
    }

    pub fn block_dimension(&self, index: usize) -> usize {
        self.starts[index + 1] - self.starts[index]
    }

    pub fn block<'a>(&self, index: usize, complete: &'a [f64]) -> &'a [f64] {
        &complete[self.starts[index]..self.starts[index + 1]]
    }

    /// Flatten a state into the complete vector, checking every block dimension.
    pub fn map_state(&self, state: &OdeState) -> OdeResult<Vec<f64>> {
        let blocks = self.number_of_equations();
        if state.secondary.len() + 1 != blocks {
            return Err(OdeError::DimensionMismatch {
                what: "number of state blocks",
                expected: blocks,
                actual: state.secondary.len() + 1,
            });
        }
        let mut complete = Vec::with_capacity(self.total_dimension());
        for index in 0..blocks {
            let block = state.block(index).unwrap_or_default();
            if block.len() != self.block_dimension(index) {
                return Err(OdeError::DimensionMismatch {
                    what: "state block",
                    expected: self.block_dimension(index),
                    actual: block.len(),
                });
            }
            complete.extend_from_slice(block);
        }
        Ok(complete)
    }

    /// Complete derivative vector of a state, checking every block dimension.
    pub fn map_derivative(&self, state: &OdeStateAndDerivative) -> OdeResult<Vec<f64>> {
        let as_state = OdeState {
            time: state.time(),
            primary: state.primary_derivative.clone(),
            secondary: state.secondary_derivative.clone(),
        };
        self.map_state(&as_state)
    }

    /// Split complete state and derivative vectors back into blocks.
    pub fn map_state_and_derivative(
        &self,
        time: f64,
        y: &[f64],
        y_dot: &[f64],
    ) -> OdeStateAndDerivative {
        let split = |v: &[f64]| -> Vec<Vec<f64>> {
            (1..self.number_of_equations())
                .map(|k| self.block(k, v).to_vec())
                .collect()
        };
        OdeStateAndDerivative {
            state: OdeState {
                time,
                primary: self.block(0, y).to_vec(),
                secondary: split(y),
            },
            primary_derivative: self.block(0, y_dot).to_vec(),
            secondary_derivative: split(y_dot),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapper_layout() {
        let mapper = EquationsMapper::new(3).extended(2).extended(4);
        assert_eq!(mapper.number_of_equations(), 3);
        assert_eq!(mapper.total_dimension(), 9);
        assert_eq!(mapper.block_dimension(1), 2);

        let state = OdeState::with_secondary(
            0.0,
            vec![1.0, 2.0, 3.0],
            vec![vec![4.0, 5.0], vec![6.0, 7.0, 8.0, 9.0]],
        );
        let complete = mapper.map_state(&state).unwrap();
        assert_eq!(mapper.block(2, &complete), &[6.0, 7.0, 8.0, 9.0]);

        let back = mapper.map_state_and_derivative(0.0, &complete, &complete);
        assert_eq!(back.state, state);
        assert_eq!(back.block_derivative(1), Some(&[4.0, 5.0][..]));
    }

    #[test]
    fn wrong_block_size_is_rejected() {
        let mapper = EquationsMapper::new(2).extended(2);
        let state = OdeState::with_secondary(0.0, vec![1.0, 2.0], vec![vec![3.0]]);
        let err = mapper.map_state(&state).unwrap_err();
        assert!(matches!(
            err,
            OdeError::DimensionMismatch {
                expected: 2,
                actual: 1,
                ..
            }
        ));
        let missing = OdeState::new(0.0, vec![1.0, 2.0]);
        assert!(mapper.map_state(&missing).is_err());
    }

    mod proptests {
        use super::*;
        use proptest::collection::vec;
        use proptest::prelude::*;

        fn blocks() -> impl Strategy<Value = (Vec<f64>, Vec<Vec<f64>>)> {
            (vec(-1.0e7f64..1.0e7, 1..8), vec(vec(-1.0e3f64..1.0e3, 1..10), 0..4))
        }

        proptest! {
            #[test]
            fn state_survives_the_complete_vector(
                time in -1.0e6f64..1.0e6,
                (primary, secondary) in blocks(),
            ) {
                let mapper = secondary
                    .iter()
                    .fold(EquationsMapper::new(primary.len()), |m, b| m.extended(b.len()));
                let state = OdeState::with_secondary(time, primary, secondary);
                let complete = mapper.map_state(&state).unwrap();
                prop_assert_eq!(complete.len(), mapper.total_dimension());

                let y_dot: Vec<f64> = complete.iter().map(|v| -2.0 * v).collect();
                let back = mapper.map_state_and_derivative(time, &complete, &y_dot);
                prop_assert_eq!(&back.state, &state);
                prop_assert_eq!(mapper.map_derivative(&back).unwrap(), y_dot);
                for k in 0..state.number_of_secondary_states() {
                    prop_assert_eq!(back.secondary(k), state.block(k + 1));
                }
            }
        }
    }
}
