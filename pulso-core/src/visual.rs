//! Body-mesh scaling for the 3D avatar view. Cosmetic only.

use serde::{Deserialize, Serialize};

pub const DEFAULT_MODEL_URL: &str =
    "https://threejs.org/examples/models/gltf/Xbot.glb";

/// Weight the unscaled mesh represents.
pub const REFERENCE_WEIGHT_KG: f64 = 70.0;
pub const MIN_SCALE: f64 = 0.8;
pub const MAX_SCALE: f64 = 1.4;

/// Radians per rendered frame.
pub const ROTATION_RATE: f64 = 0.005;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BodyScale {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl BodyScale {
    pub const NEUTRAL: BodyScale = BodyScale {
        x: 1.0,
        y: 1.0,
        z: 1.0,
    };
}

/// Widens the horizontal axes by `clamp(weight / 70, 0.8, 1.4)`. Height is
/// untouched. Missing or nonsensical weights give the neutral mesh.
pub fn body_scale(weight_kg: Option<f64>) -> BodyScale {
    match weight_kg {
        Some(w) if w.is_finite() && w > 0.0 => {
            let factor = (w / REFERENCE_WEIGHT_KG).clamp(MIN_SCALE, MAX_SCALE);
            BodyScale {
                x: factor,
                y: 1.0,
                z: factor,
            }
        }
        _ => BodyScale::NEUTRAL,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisualState {
    pub model_url: String,
    pub weight: Option<f64>,
    pub scale: BodyScale,
    pub rotation_rate: f64,
}

impl VisualState {
    pub fn for_weight(model_url: &str, weight: Option<f64>) -> Self {
        Self {
            model_url: model_url.to_string(),
            weight,
            scale: body_scale(weight),
            rotation_rate: ROTATION_RATE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_weight_is_neutral() {
        assert_eq!(body_scale(Some(70.0)), BodyScale::NEUTRAL);
    }

    #[test]
    fn test_scale_is_clamped() {
        assert_eq!(body_scale(Some(40.0)).x, MIN_SCALE);
        assert_eq!(body_scale(Some(140.0)).z, MAX_SCALE);
        let s = body_scale(Some(84.0));
        assert!((s.x - 1.2).abs() < 1e-9);
        assert_eq!(s.y, 1.0);
    }

    #[test]
    fn test_bad_weight_is_neutral() {
        assert_eq!(body_scale(None), BodyScale::NEUTRAL);
        assert_eq!(body_scale(Some(0.0)), BodyScale::NEUTRAL);
        assert_eq!(body_scale(Some(f64::NAN)), BodyScale::NEUTRAL);
    }
}
