use crate::{
    error::{Result, SrsError},
    inference::{DEFAULT_PARAMETERS, PARAMETER_COUNT, Parameters},
    memory::{D_MAX, D_MIN, S_MIN},
};

pub(crate) const INIT_S_MAX: f32 = 100.0;

/// Accepts an empty slice (defaults) or a full weight vector with finite values.
pub(crate) fn check_parameters(parameters: &Parameters) -> Result<Vec<f32>> {
    let parameters = match parameters.len() {
        0 => DEFAULT_PARAMETERS.to_vec(),
        PARAMETER_COUNT => parameters.to_vec(),
        _ => return Err(SrsError::InvalidParameters),
    };
    if parameters.iter().any(|&w| !w.is_finite()) {
        return Err(SrsError::InvalidParameters);
    }
    Ok(clip_parameters(&parameters))
}

pub(crate) fn clip_parameters(parameters: &Parameters) -> Vec<f32> {
    let mut parameters = parameters.to_vec();
    let clamps: [(f32, f32); PARAMETER_COUNT] = [
        (S_MIN, INIT_S_MAX),
        (S_MIN, INIT_S_MAX),
        (S_MIN, INIT_S_MAX),
        (S_MIN, INIT_S_MAX),
        (D_MIN, D_MAX),
        (0.001, 0.33),
        (0.001, 0.5),
        (0.001, 0.75),
        (0.0, 4.5),
        (0.0, 0.8),
        (0.001, 3.5),
        (0.001, 5.0),
        (0.001, 0.25),
        (0.001, 0.9),
        (0.0, 4.0),
        (0.0, 1.0),
        (1.0, 6.0),
        (1.0, 2.0),
    ];

    parameters
        .iter_mut()
        .zip(clamps)
        .for_each(|(w, (low, high))| *w = w.clamp(low, high));
    parameters
}
