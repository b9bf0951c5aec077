use serde::{Deserialize, Serialize};

/// Settings forwarded to the `chess-corners` detector.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ChessParams {
    /// Relative threshold as a fraction of the max response.
    pub threshold_rel: f32,
    /// Non-maximum suppression radius in pixels.
    pub nms_radius: u32,
    /// Minimum count of positive-response pixels around a peak.
    pub min_cluster_size: u32,
}

impl Default for ChessParams {
    fn default() -> Self {
        Self {
            threshold_rel: 0.2,
            nms_radius: 2,
            min_cluster_size: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct GridGraphParams {
    pub min_spacing_pix: f32,
    pub max_spacing_pix: f32,
    pub k_neighbors: usize,
    pub orientation_tolerance_deg: f32,
}

impl Default for GridGraphParams {
    fn default() -> Self {
        Self {
            min_spacing_pix: 8.0,
            max_spacing_pix: 400.0,
            k_neighbors: 8,
            orientation_tolerance_deg: 22.5,
        }
    }
}

/// Gradient-orthogonality corner refinement settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RefineParams {
    /// Half size of the square search window; the window is `2 * half_window + 1` wide.
    pub half_window: u32,
    pub max_iterations: usize,
    /// Stop once a corner moves less than this many pixels.
    pub epsilon: f64,
}

impl Default for RefineParams {
    fn default() -> Self {
        Self {
            half_window: 5,
            max_iterations: 30,
            epsilon: 0.01,
        }
    }
}

/// Levenberg-Marquardt stopping rules shared by calibration and pose refinement.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SolverParams {
    pub max_iterations: usize,
    /// Relative cost decrease below which the solver stops.
    pub cost_tolerance: f64,
    /// Relative parameter change below which the solver stops.
    pub step_tolerance: f64,
    /// Residual/Jacobian-column orthogonality below which the solver stops.
    pub gradient_tolerance: f64,
    /// Factor for the initial trust-region radius.
    pub step_bound: f64,
}

impl Default for SolverParams {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            cost_tolerance: 1e-12,
            step_tolerance: 1e-12,
            gradient_tolerance: 1e-12,
            step_bound: 100.0,
        }
    }
}

/// Parameters for [`crate::NativeBackend`].
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DetectorParams {
    pub chess: ChessParams,
    pub graph: GridGraphParams,
    pub refine: RefineParams,
    pub solver: SolverParams,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let p: DetectorParams =
            serde_json::from_str(r#"{"chess":{"threshold_rel":0.3},"refine":{"half_window":4}}"#)
                .unwrap();
        assert_eq!(0.3, p.chess.threshold_rel);
        assert_eq!(2, p.chess.nms_radius);
        assert_eq!(4, p.refine.half_window);
        assert_eq!(GridGraphParams::default(), p.graph);
    }
}
