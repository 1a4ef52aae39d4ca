// THEORY:
// The `TransformRegistry` is the static lookup table behind every filter. It maps a
// closed set of selectors to the 3x3 matrices that approximate each dichromacy's
// color confusion lines.
//
// Key architectural principles:
// 1.  **Closed Enumeration**: Selection is an explicit enum, not a positional index.
//     Indices only exist at the boundary (`from_index`) and anything unknown falls
//     back to `Identity`.
// 2.  **Identity Is Not a Matrix**: Resolving `Identity` yields `Transform::Identity`
//     so callers can skip the per-pixel work entirely and forward the frame as-is.
// 3.  **Constants**: The matrices are process-wide `static`s. They are never mutated,
//     so reading them needs no synchronization.

use std::fmt;
use std::str::FromStr;

/// A row-major 3x3 color matrix. Rows are output (R, G, B), columns are input (R, G, B).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformMatrix {
    pub rows: [[f32; 3]; 3],
}

impl TransformMatrix {
    pub const fn new(rows: [[f32; 3]; 3]) -> Self {
        Self { rows }
    }

    /// True when every coefficient is non-negative and every row sums to 1.0,
    /// i.e. each output channel is a convex combination of the inputs.
    pub fn is_convex(&self) -> bool {
        self.rows.iter().all(|row| {
            row.iter().all(|c| *c >= 0.0) && (row.iter().sum::<f32>() - 1.0).abs() <= 1e-5
        })
    }
}

pub static PROTANOPIA: TransformMatrix = TransformMatrix::new([
    [0.567, 0.433, 0.0],
    [0.558, 0.442, 0.0],
    [0.0, 0.242, 0.758],
]);

pub static DEUTERANOPIA: TransformMatrix = TransformMatrix::new([
    [0.625, 0.375, 0.0],
    [0.7, 0.3, 0.0],
    [0.0, 0.3, 0.7],
]);

pub static TRITANOPIA: TransformMatrix = TransformMatrix::new([
    [0.95, 0.05, 0.0],
    [0.0, 0.433, 0.567],
    [0.0, 0.475, 0.525],
]);

/// The active simulation. Exactly one is active at any instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TransformSelector {
    /// Red-blind.
    #[default]
    Protanopia,
    /// Green-blind.
    Deuteranopia,
    /// Blue-blind.
    Tritanopia,
    /// Normal vision, no filter.
    Identity,
}

/// What a selector resolves to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transform {
    Identity,
    Matrix(&'static TransformMatrix),
}

impl TransformSelector {
    pub const ALL: [TransformSelector; 4] = [
        TransformSelector::Protanopia,
        TransformSelector::Deuteranopia,
        TransformSelector::Tritanopia,
        TransformSelector::Identity,
    ];

    /// Maps the control index {0,1,2,3}. Any other value is treated as `Identity`.
    pub fn from_index(index: u8) -> Self {
        match index {
            0 => TransformSelector::Protanopia,
            1 => TransformSelector::Deuteranopia,
            2 => TransformSelector::Tritanopia,
            _ => TransformSelector::Identity,
        }
    }

    pub fn index(self) -> u8 {
        match self {
            TransformSelector::Protanopia => 0,
            TransformSelector::Deuteranopia => 1,
            TransformSelector::Tritanopia => 2,
            TransformSelector::Identity => 3,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TransformSelector::Protanopia => "Protanopia (Red-Blind)",
            TransformSelector::Deuteranopia => "Deuteranopia (Green-Blind)",
            TransformSelector::Tritanopia => "Tritanopia (Blue-Blind)",
            TransformSelector::Identity => "Normal Vision",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            TransformSelector::Protanopia => "No functional long-wavelength cones; reds and greens are confused",
            TransformSelector::Deuteranopia => "No functional medium-wavelength cones; reds and greens are confused",
            TransformSelector::Tritanopia => "No functional short-wavelength cones; blues and yellows are confused",
            TransformSelector::Identity => "Frames are shown unfiltered",
        }
    }
}

impl fmt::Display for TransformSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Accepts short names (`protanopia`, `deuteranopia`, `tritanopia`, `normal`/`identity`/`none`)
/// or control indices. Unknown indices still map to `Identity`; unknown words are rejected.
impl FromStr for TransformSelector {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        if let Ok(index) = s.parse::<u8>() {
            return Ok(TransformSelector::from_index(index));
        }
        match s.as_str() {
            "protanopia" | "protan" | "p" => Ok(TransformSelector::Protanopia),
            "deuteranopia" | "deutan" | "d" => Ok(TransformSelector::Deuteranopia),
            "tritanopia" | "tritan" | "t" => Ok(TransformSelector::Tritanopia),
            "identity" | "normal" | "none" => Ok(TransformSelector::Identity),
            other => Err(format!("unknown filter '{other}'")),
        }
    }
}

/// Resolves a selector to its matrix, or to `Transform::Identity` for normal vision.
pub fn matrix_for(selector: TransformSelector) -> Transform {
    match selector {
        TransformSelector::Protanopia => Transform::Matrix(&PROTANOPIA),
        TransformSelector::Deuteranopia => Transform::Matrix(&DEUTERANOPIA),
        TransformSelector::Tritanopia => Transform::Matrix(&TRITANOPIA),
        TransformSelector::Identity => Transform::Identity,
    }
}
