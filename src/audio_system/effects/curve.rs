/// Fade curves
///
/// Pure mappings from normalized fade progress to a channel volume.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Shape of a volume transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FadeCurve {
    /// Constant rate of change: w(p) = p
    Linear,

    /// Slow start, fast finish: w(p) = p²
    Exponential,

    /// Fast start, slow finish: w(p) = log10(1 + 9p)
    Logarithmic,

    /// Smoothstep: w(p) = 3p² - 2p³
    SCurve,
}

impl FadeCurve {
    /// Weight of the end volume at `progress` (0.0 at the start, 1.0 at the end)
    pub fn weight(&self, progress: f32) -> f32 {
        let p = progress;
        match self {
            FadeCurve::Linear => p,
            FadeCurve::Exponential => p * p,
            FadeCurve::Logarithmic => (1.0 + 9.0 * p).log10(),
            FadeCurve::SCurve => p * p * (3.0 - 2.0 * p),
        }
    }

    /// Volume at `progress` for a fade from `start` to `end`.
    ///
    /// Callers pass `progress` in [0, 1]. The endpoints are returned exactly,
    /// and interior values never leave the interval spanned by `start` and
    /// `end`.
    pub fn volume(&self, progress: f32, start: f32, end: f32) -> f32 {
        if progress <= 0.0 {
            return start;
        }
        if progress >= 1.0 {
            return end;
        }

        let value = start + (end - start) * self.weight(progress);
        let (low, high) = if start <= end { (start, end) } else { (end, start) };
        value.clamp(low, high)
    }

    /// Parse a curve name as written in config files or typed on the command line
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "linear" => Some(FadeCurve::Linear),
            "exponential" | "exp" => Some(FadeCurve::Exponential),
            "logarithmic" | "log" => Some(FadeCurve::Logarithmic),
            "s-curve" | "scurve" | "s_curve" | "smoothstep" => Some(FadeCurve::SCurve),
            _ => None,
        }
    }

    /// Human-readable name
    pub fn display_name(&self) -> &'static str {
        match self {
            FadeCurve::Linear => "Linear",
            FadeCurve::Exponential => "Exponential",
            FadeCurve::Logarithmic => "Logarithmic",
            FadeCurve::SCurve => "S-Curve",
        }
    }

    pub fn all_variants() -> &'static [FadeCurve] {
        &[
            FadeCurve::Linear,
            FadeCurve::Exponential,
            FadeCurve::Logarithmic,
            FadeCurve::SCurve,
        ]
    }
}

impl Default for FadeCurve {
    fn default() -> Self {
        FadeCurve::SCurve
    }
}

impl fmt::Display for FadeCurve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}
