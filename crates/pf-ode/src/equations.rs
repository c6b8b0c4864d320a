//! Differential equations and the expandable ODE assembling them.

use crate::error::{OdeError, OdeResult};
use crate::state::{EquationsMapper, OdeState};

/// Primary set of first-order equations `y' = f(t, y)`.
pub trait OrdinaryDifferentialEquation {
    fn dimension(&self) -> usize;

    /// Called once before integration starts.
    fn init(&mut self, _t0: f64, _y0: &[f64], _final_time: f64) -> OdeResult<()> {
        Ok(())
    }

    fn compute_derivatives(&mut self, t: f64, y: &[f64]) -> OdeResult<Vec<f64>>;
}

/// Secondary equations integrated alongside the primary set.
///
/// They may read the primary state and its derivative but never modify them.
pub trait SecondaryOde {
    fn dimension(&self) -> usize;

    fn init(
        &mut self,
        _t0: f64,
        _primary0: &[f64],
        _secondary0: &[f64],
        _final_time: f64,
    ) -> OdeResult<()> {
        Ok(())
    }

    fn compute_derivatives(
        &mut self,
        t: f64,
        primary: &[f64],
        primary_dot: &[f64],
        secondary: &[f64],
    ) -> OdeResult<Vec<f64>>;
}

/// Primary equations extended with any number of secondary blocks.
pub struct ExpandableOde<'a> {
    primary: Box<dyn OrdinaryDifferentialEquation + 'a>,
    components: Vec<Box<dyn SecondaryOde + 'a>>,
    mapper: EquationsMapper,
}

impl<'a> ExpandableOde<'a> {
    pub fn new<P>(primary: P) -> Self
    where
        P: OrdinaryDifferentialEquation + 'a,
    {
        let mapper = EquationsMapper::new(primary.dimension());
        Self {
            primary: Box::new(primary),
            components: Vec::new(),
            mapper,
        }
    }

    /// Append a secondary block, returning its block index (1-based).
    pub fn add_secondary_equations<S>(&mut self, secondary: S) -> usize
    where
        S: SecondaryOde + 'a,
    {
        self.mapper = self.mapper.extended(secondary.dimension());
        self.components.push(Box::new(secondary));
        self.components.len()
    }

    pub fn mapper(&self) -> &EquationsMapper {
        &self.mapper
    }

    pub fn init(&mut self, initial: &OdeState, final_time: f64) -> OdeResult<()> {
        let complete = self.mapper.map_state(initial)?;
        self.primary
            .init(initial.time, &initial.primary, final_time)?;
        for (k, component) in self.components.iter_mut().enumerate() {
            let secondary = self.mapper.block(k + 1, &complete);
            component.init(initial.time, &initial.primary, secondary, final_time)?;
        }
        Ok(())
    }

    /// Derivative of the complete state vector.
    pub fn compute_derivatives(&mut self, t: f64, y: &[f64]) -> OdeResult<Vec<f64>> {
        if y.len() != self.mapper.total_dimension() {
            return Err(OdeError::DimensionMismatch {
                what: "complete state",
                expected: self.mapper.total_dimension(),
                actual: y.len(),
            });
        }

        let primary = self.mapper.block(0, y);
        let primary_dot = self.primary.compute_derivatives(t, primary)?;
        if primary_dot.len() != primary.len() {
            return Err(OdeError::DimensionMismatch {
                what: "primary derivative",
                expected: primary.len(),
                actual: primary_dot.len(),
            });
        }

        let mut y_dot = Vec::with_capacity(y.len());
        y_dot.extend_from_slice(&primary_dot);
        for (k, component) in self.components.iter_mut().enumerate() {
            let secondary = self.mapper.block(k + 1, y);
            let secondary_dot =
                component.compute_derivatives(t, primary, &primary_dot, secondary)?;
            if secondary_dot.len() != secondary.len() {
                return Err(OdeError::DimensionMismatch {
                    what: "secondary derivative",
                    expected: secondary.len(),
                    actual: secondary_dot.len(),
                });
            }
            y_dot.extend_from_slice(&secondary_dot);
        }
        Ok(y_dot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Decay;

    impl OrdinaryDifferentialEquation for Decay {
        fn dimension(&self) -> usize {
            1
        }

        fn compute_derivatives(&mut self, _t: f64, y: &[f64]) -> OdeResult<Vec<f64>> {
            Ok(vec![-y[0]])
        }
    }

    /// Integral of the primary state.
    struct Accumulator {
        width: usize,
    }

    impl SecondaryOde for Accumulator {
        fn dimension(&self) -> usize {
            self.width
        }

        fn compute_derivatives(
            &mut self,
            _t: f64,
            primary: &[f64],
            primary_dot: &[f64],
            _secondary: &[f64],
        ) -> OdeResult<Vec<f64>> {
            Ok(vec![primary[0] + primary_dot[0]; self.width])
        }
    }

    #[test]
    fn derivatives_are_concatenated() {
        let mut ode = ExpandableOde::new(Decay);
        assert_eq!(ode.add_secondary_equations(Accumulator { width: 2 }), 1);
        let y_dot = ode.compute_derivatives(0.0, &[2.0, 0.0, 0.0]).unwrap();
        assert_eq!(y_dot, vec![-2.0, 0.0, 0.0]);
    }

    #[test]
    fn secondary_derivative_length_is_checked() {
        struct Wrong;
        impl SecondaryOde for Wrong {
            fn dimension(&self) -> usize {
                2
            }
            fn compute_derivatives(
                &mut self,
                _t: f64,
                _primary: &[f64],
                _primary_dot: &[f64],
                _secondary: &[f64],
            ) -> OdeResult<Vec<f64>> {
                Ok(vec![0.0; 3])
            }
        }

        let mut ode = ExpandableOde::new(Decay);
        ode.add_secondary_equations(Wrong);
        let err = ode.compute_derivatives(0.0, &[1.0, 0.0, 0.0]).unwrap_err();
        assert!(err.to_string().contains("secondary derivative"));
    }
}
