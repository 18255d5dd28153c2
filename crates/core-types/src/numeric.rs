//! Numeric literals for constants and initial conditions.

use std::fmt;

use thiserror::Error;

use crate::DataType;

#[derive(Debug, Error)]
#[error("could not parse numeric literal `{0}`")]
pub struct NumericParseError(pub String);

/// A single numeric literal: either an integer or a complex double.
///
/// Integers cover fixed-point and boolean values (the stored integer is the
/// raw, unscaled representation).  Anything fractional or complex is carried
/// as a complex double whose imaginary part is zero for real values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumericValue {
    Int(i64),
    Cplx { re: f64, im: f64 },
}

impl NumericValue {
    pub fn zero() -> NumericValue {
        NumericValue::Int(0)
    }

    pub fn real(v: f64) -> NumericValue {
        NumericValue::Cplx { re: v, im: 0.0 }
    }

    pub fn is_complex(&self) -> bool {
        matches!(self, NumericValue::Cplx { im, .. } if *im != 0.0)
    }

    pub fn is_fractional(&self) -> bool {
        match self {
            NumericValue::Int(_) => false,
            NumericValue::Cplx { re, im } => re.fract() != 0.0 || im.fract() != 0.0,
        }
    }

    pub fn re_f64(&self) -> f64 {
        match self {
            NumericValue::Int(v) => *v as f64,
            NumericValue::Cplx { re, .. } => *re,
        }
    }

    pub fn im_f64(&self) -> f64 {
        match self {
            NumericValue::Int(_) => 0.0,
            NumericValue::Cplx { im, .. } => *im,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            NumericValue::Int(v) => Some(*v),
            NumericValue::Cplx { re, im } if *im == 0.0 && re.fract() == 0.0 => Some(*re as i64),
            _ => None,
        }
    }

    /// Parse one literal: `-3`, `0.25`, `1.5+0.5i`, `2-i`.
    pub fn parse(s: &str) -> Result<NumericValue, NumericParseError> {
        let s = s.trim();
        if let Ok(v) = s.parse::<i64>() {
            return Ok(NumericValue::Int(v));
        }
        if let Ok(v) = s.parse::<f64>() {
            return Ok(NumericValue::real(v));
        }
        if let Some(stripped) = s.strip_suffix('i').or_else(|| s.strip_suffix('j')) {
            // Split "a+bi" / "a-bi" at the sign of the imaginary term, skipping
            // a leading sign on the real part.
            let body = stripped.trim();
            if !body.is_empty()
                && let Some(pos) = body[1..].rfind(['+', '-']).map(|p| p + 1)
            {
                let (re_s, im_s) = body.split_at(pos);
                let re: f64 = re_s.trim().parse().map_err(|_| NumericParseError(s.into()))?;
                let im_s = im_s.trim();
                let im: f64 = if im_s == "+" {
                    1.0
                } else if im_s == "-" {
                    -1.0
                } else {
                    im_s.parse().map_err(|_| NumericParseError(s.into()))?
                };
                return Ok(NumericValue::Cplx { re, im });
            }
            // Pure imaginary: "i", "-2i".
            let im: f64 = match body {
                "" => 1.0,
                "-" => -1.0,
                other => other.parse().map_err(|_| NumericParseError(s.into()))?,
            };
            return Ok(NumericValue::Cplx { re: 0.0, im });
        }
        Err(NumericParseError(s.to_string()))
    }

    /// Parse a whitespace/comma separated list, optionally wrapped in `[...]`.
    /// A bare scalar yields a single-element vector.
    pub fn parse_list(s: &str) -> Result<Vec<NumericValue>, NumericParseError> {
        let inner = s.trim().trim_start_matches('[').trim_end_matches(']');
        if inner.trim().is_empty() {
            return Ok(Vec::new());
        }
        inner
            .split([',', ' ', ';'])
            .filter(|tok| !tok.trim().is_empty())
            .map(NumericValue::parse)
            .collect()
    }

    /// Format as a C literal for the real or imaginary part of a value of
    /// type `dtype`.
    pub fn c_literal(&self, dtype: &DataType, imag: bool) -> String {
        if dtype.is_floating_pt() {
            let v = if imag { self.im_f64() } else { self.re_f64() };
            // %e-ish formatting keeps integral doubles valid C floats.
            if v.fract() == 0.0 && v.abs() < 1e15 {
                format!("{v:.1}")
            } else {
                format!("{v}")
            }
        } else {
            let v = if imag { self.im_f64() } else { self.re_f64() };
            format!("{}", v as i64)
        }
    }
}

impl fmt::Display for NumericValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumericValue::Int(v) => write!(f, "{v}"),
            NumericValue::Cplx { re, im } if *im == 0.0 => write!(f, "{re}"),
            NumericValue::Cplx { re, im } if *im < 0.0 => write!(f, "{re}{im}i"),
            NumericValue::Cplx { re, im } => write!(f, "{re}+{im}i"),
        }
    }
}
