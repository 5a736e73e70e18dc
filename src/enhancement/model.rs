use ndarray::{Array2, ArrayView1, ArrayView2};
use thiserror::Error;

/// Errors that can occur during speech enhancement
#[derive(Debug, Error)]
pub enum EnhancementError {
    #[error("Failed to load model: {0}")]
    ModelLoadError(String),

    #[error("Inference error: {0}")]
    InferenceError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Feature not enabled")]
    FeatureNotEnabled,
}

/// A pretrained model mapping noisy speech to enhanced speech.
///
/// `noisy` is `[batch, time]` at 16kHz. `lengths` holds one relative length
/// per row in `(0, 1]`: the fraction of the padded row that is real signal.
/// The returned array has the same shape as `noisy`; samples past a row's
/// length are zero.
pub trait EnhancementModel: Send {
    fn name(&self) -> &str;

    fn enhance_batch(
        &mut self,
        noisy: ArrayView2<'_, f32>,
        lengths: ArrayView1<'_, f32>,
    ) -> Result<Array2<f32>, EnhancementError>;
}

/// Convert a relative length into a sample count for a row of `time` samples
pub(crate) fn absolute_length(relative: f32, time: usize) -> Result<usize, EnhancementError> {
    if !(relative > 0.0 && relative <= 1.0) {
        return Err(EnhancementError::InvalidInput(format!(
            "relative length {} outside (0, 1]",
            relative
        )));
    }
    Ok(((relative * time as f32).round() as usize).min(time))
}

/// Run `enhance` over every row of a batch, honoring relative lengths
pub(crate) fn enhance_rows<F>(
    noisy: ArrayView2<'_, f32>,
    lengths: ArrayView1<'_, f32>,
    mut enhance: F,
) -> Result<Array2<f32>, EnhancementError>
where
    F: FnMut(&[f32]) -> Result<Vec<f32>, EnhancementError>,
{
    let (batch, time) = noisy.dim();
    if lengths.len() != batch {
        return Err(EnhancementError::InvalidInput(format!(
            "{} relative lengths for a batch of {}",
            lengths.len(),
            batch
        )));
    }

    let mut output = Array2::<f32>::zeros((batch, time));
    for (row_idx, (row, &relative)) in noisy.outer_iter().zip(lengths.iter()).enumerate() {
        let len = absolute_length(relative, time)?;
        let input: Vec<f32> = row.iter().take(len).copied().collect();
        let enhanced = enhance(&input)?;

        let mut out_row = output.row_mut(row_idx);
        for (dst, src) in out_row.iter_mut().zip(enhanced.iter().take(len)) {
            *dst = *src;
        }
    }

    Ok(output)
}
