//! 1-D lookup tables with evenly-spaced breakpoints.

use core_types::NumericValue;

/// Method for inputs falling between breakpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpMethod {
    /// Take the breakpoint below.
    Flat,
    /// Take the nearest breakpoint; ties round up.
    Nearest,
    Linear,
    CubicSpline,
}

/// Method for inputs outside the breakpoint range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtrapMethod {
    /// Emit no bounds logic at all; the input is trusted in-range.
    NoCheck,
    /// Clamp to the endpoint values.
    Clip,
    Linear,
    CubicSpline,
}

/// Table search strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMethod {
    /// Scale/truncate the input directly into an index (requires evenly
    /// spaced breakpoints).
    EvenlySpaced,
    LinearNoMemory,
    /// Linear search starting from the previous hit (stateful).
    LinearMemory,
    BinaryNoMemory,
    /// Binary search starting from the previous hit (stateful).
    BinaryMemory,
}

impl SearchMethod {
    /// Search methods with memory keep the previous index as state.
    pub fn has_memory(self) -> bool {
        matches!(self, SearchMethod::LinearMemory | SearchMethod::BinaryMemory)
    }
}

/// A 1-D lookup table node.
#[derive(Debug, Clone, PartialEq)]
pub struct Lut {
    /// Breakpoints for the single dimension, ascending and evenly spaced.
    pub breakpoints: Vec<NumericValue>,
    /// Table data, parallel to the breakpoints.
    pub table: Vec<NumericValue>,
    pub interp: InterpMethod,
    pub extrap: ExtrapMethod,
    pub search: SearchMethod,
}

impl Lut {
    pub fn new(breakpoints: Vec<NumericValue>, table: Vec<NumericValue>) -> Lut {
        Lut {
            breakpoints,
            table,
            interp: InterpMethod::Flat,
            extrap: ExtrapMethod::Clip,
            search: SearchMethod::EvenlySpaced,
        }
    }

    /// First breakpoint as f64.
    pub fn first_breakpoint(&self) -> f64 {
        self.breakpoints.first().map(|v| v.re_f64()).unwrap_or(0.0)
    }

    /// Breakpoint step `s = (b[m-1] - b[0]) / (m - 1)`.
    pub fn step(&self) -> f64 {
        let m = self.breakpoints.len();
        if m < 2 {
            return 0.0;
        }
        (self.breakpoints[m - 1].re_f64() - self.breakpoints[0].re_f64()) / (m as f64 - 1.0)
    }

    /// Maximum relative deviation of any gap from the mean step.
    pub fn max_spacing_error(&self) -> f64 {
        let s = self.step();
        if s == 0.0 {
            return f64::INFINITY;
        }
        self.breakpoints
            .windows(2)
            .map(|w| ((w[1].re_f64() - w[0].re_f64() - s) / s).abs())
            .fold(0.0, f64::max)
    }
}
