use ndarray::ArrayD;
use ndarray_npy::WriteNpyExt;
use service_core::InferenceError;

/// Serializes `array` as a complete `.npy` document (little-endian `f32`, C order).
pub fn encode_npy(array: &ArrayD<f32>) -> Result<Vec<u8>, InferenceError> {
    let mut buffer: Vec<u8> = Vec::with_capacity(array.len() * 4 + 128);
    array
        .write_npy(&mut buffer)
        .map_err(|e| InferenceError::Encode(e.to_string()))?;
    Ok(buffer)
}
