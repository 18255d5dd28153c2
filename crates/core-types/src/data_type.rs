//! Signal data types.
//!
//! A [`DataType`] describes one signal: floating/fixed/integer layout plus the
//! dimensions of the sample carried per clock tick.  Dimensions are never
//! empty; a scalar is represented as `[1]`.  Blocking multiplies the outermost
//! dimension, so `[1]` blocked by 8 becomes `[8]` and `[4, 2]` becomes
//! `[32, 2]`.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

/// Error raised when a numeric type string from the input graph cannot be
/// understood.
#[derive(Debug, Error)]
#[error("unrecognized numeric type `{0}`")]
pub struct TypeParseError(pub String);

/// The type of a signal on an arc or port.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DataType {
    floating_pt: bool,
    signed: bool,
    complex: bool,
    total_bits: usize,
    fractional_bits: usize,
    dimensions: Vec<usize>,
}

impl Default for DataType {
    fn default() -> Self {
        // Unsigned 1-bit scalar, the "boolean" placeholder used before arcs
        // acquire a real type.
        DataType {
            floating_pt: false,
            signed: false,
            complex: false,
            total_bits: 1,
            fractional_bits: 0,
            dimensions: vec![1],
        }
    }
}

impl DataType {
    pub fn new(
        floating_pt: bool,
        signed: bool,
        complex: bool,
        total_bits: usize,
        fractional_bits: usize,
        dimensions: Vec<usize>,
    ) -> DataType {
        assert!(!dimensions.is_empty(), "DataType dimensions cannot be empty");
        if floating_pt {
            // Floating point types are always signed and carry no binary point.
            DataType {
                floating_pt,
                signed: true,
                complex,
                total_bits,
                fractional_bits: 0,
                dimensions,
            }
        } else {
            DataType {
                floating_pt,
                signed,
                complex,
                total_bits,
                fractional_bits,
                dimensions,
            }
        }
    }

    /// Scalar boolean, the type of enable lines and comparison results.
    pub fn bool_scalar() -> DataType {
        DataType::default()
    }

    /// Scalar double, used by synthesized counters and test fixtures.
    pub fn double_scalar() -> DataType {
        DataType::new(true, true, false, 64, 0, vec![1])
    }

    pub fn is_floating_pt(&self) -> bool {
        self.floating_pt
    }

    pub fn is_signed(&self) -> bool {
        self.signed
    }

    pub fn is_complex(&self) -> bool {
        self.complex
    }

    pub fn total_bits(&self) -> usize {
        self.total_bits
    }

    pub fn fractional_bits(&self) -> usize {
        self.fractional_bits
    }

    pub fn dimensions(&self) -> &[usize] {
        &self.dimensions
    }

    pub fn set_complex(&mut self, complex: bool) {
        self.complex = complex;
    }

    pub fn set_dimensions(&mut self, dimensions: Vec<usize>) {
        assert!(!dimensions.is_empty(), "DataType dimensions cannot be empty");
        self.dimensions = dimensions;
    }

    /// Number of elements in one sample (the product of the dimensions).
    pub fn num_elements(&self) -> usize {
        self.dimensions.iter().product()
    }

    /// A type is scalar iff it carries exactly one element.
    pub fn is_scalar(&self) -> bool {
        self.num_elements() == 1
    }

    pub fn is_vector(&self) -> bool {
        !self.is_scalar()
    }

    /// True for the 1-bit unsigned type used for enable/compare lines.
    pub fn is_bool(&self) -> bool {
        !self.floating_pt && !self.signed && self.total_bits == 1
    }

    /// Returns a copy of this type with scalar dimensions.
    pub fn to_scalar(&self) -> DataType {
        let mut t = self.clone();
        t.dimensions = vec![1];
        t
    }

    /// Multiply the outermost dimension by `factor` (blocking expansion).
    ///
    /// A scalar `[1]` becomes `[factor]`; `[d0, d1, ..]` becomes
    /// `[factor*d0, d1, ..]`.
    pub fn expand_outer_dimension(&self, factor: usize) -> DataType {
        assert!(factor >= 1);
        let mut t = self.clone();
        t.dimensions[0] *= factor;
        t
    }

    /// Divide the outermost dimension by `factor` (sub-block splitting).
    /// The outermost dimension must be divisible by `factor`.
    pub fn contract_outer_dimension(&self, factor: usize) -> DataType {
        assert!(factor >= 1 && self.dimensions[0] % factor == 0);
        let mut t = self.clone();
        t.dimensions[0] /= factor;
        t
    }

    /// Smallest standard CPU width (8/16/32/64) holding `total_bits`.
    pub fn cpu_storage_bits(&self) -> usize {
        match self.total_bits {
            0..=8 => 8,
            9..=16 => 16,
            17..=32 => 32,
            _ => 64,
        }
    }

    /// The C type used to store one (real or imaginary) element.
    pub fn c_storage_type(&self) -> String {
        if self.floating_pt {
            if self.total_bits > 32 { "double".to_string() } else { "float".to_string() }
        } else {
            let bits = self.cpu_storage_bits();
            if self.signed { format!("int{bits}_t") } else { format!("uint{bits}_t") }
        }
    }

    /// Common type of two operands: widest total bits, float wins over fixed,
    /// signed wins over unsigned, fractional bits taken from the wider
    /// operand.  Dimensions come from the non-scalar operand (both being
    /// non-scalar requires matching dimensions).
    pub fn promote(a: &DataType, b: &DataType) -> DataType {
        let floating = a.floating_pt || b.floating_pt;
        let dims = if a.is_scalar() { b.dimensions.clone() } else { a.dimensions.clone() };
        if floating {
            let bits = a.total_bits.max(b.total_bits);
            return DataType::new(true, true, a.complex || b.complex, bits.max(32), 0, dims);
        }
        let (wide, _narrow) = if a.total_bits >= b.total_bits { (a, b) } else { (b, a) };
        DataType::new(
            false,
            a.signed || b.signed,
            a.complex || b.complex,
            a.total_bits.max(b.total_bits),
            wide.fractional_bits,
            dims,
        )
    }

    /// Parse the numeric data-type grammar used by the input graph format:
    ///
    /// ```text
    /// float    := "single" | "double"
    /// int      := ("u")? "int" {8,16,32,64}
    /// bool     := "boolean" | "logical"
    /// fixed_sl := ("u"|"s") "fix" <bits> ("_En" <fracbits>)?
    /// fixed_d  := "fixdt(" ("0"|"1") "," <bits> "," <fracbits> ")"
    /// ```
    ///
    /// Vector width and complexity arrive as separate attributes and are
    /// applied by the caller.
    pub fn parse_numeric_str(s: &str) -> Result<DataType, TypeParseError> {
        static FIXED_SL: OnceLock<Regex> = OnceLock::new();
        static FIXED_DT: OnceLock<Regex> = OnceLock::new();
        static INT: OnceLock<Regex> = OnceLock::new();

        let s = s.trim();
        match s {
            "single" => return Ok(DataType::new(true, true, false, 32, 0, vec![1])),
            "double" => return Ok(DataType::new(true, true, false, 64, 0, vec![1])),
            "boolean" | "logical" => return Ok(DataType::bool_scalar()),
            _ => {}
        }

        let int_re = INT.get_or_init(|| Regex::new(r"^(u?)int(8|16|32|64)$").unwrap());
        if let Some(c) = int_re.captures(s) {
            let signed = c.get(1).map(|m| m.as_str().is_empty()).unwrap_or(true);
            let bits: usize = c[2].parse().unwrap();
            return Ok(DataType::new(false, signed, false, bits, 0, vec![1]));
        }

        let sl_re = FIXED_SL.get_or_init(|| Regex::new(r"^([us])fix(\d+)(?:_En(\d+))?$").unwrap());
        if let Some(c) = sl_re.captures(s) {
            let signed = &c[1] == "s";
            let bits: usize = c[2].parse().unwrap();
            let frac: usize = c.get(3).map(|m| m.as_str().parse().unwrap()).unwrap_or(0);
            return Ok(DataType::new(false, signed, false, bits, frac, vec![1]));
        }

        let dt_re = FIXED_DT
            .get_or_init(|| Regex::new(r"^fixdt\(\s*([01])\s*,\s*(\d+)\s*,\s*(\d+)\s*\)$").unwrap());
        if let Some(c) = dt_re.captures(s) {
            let signed = &c[1] == "1";
            let bits: usize = c[2].parse().unwrap();
            let frac: usize = c[3].parse().unwrap();
            return Ok(DataType::new(false, signed, false, bits, frac, vec![1]));
        }

        Err(TypeParseError(s.to_string()))
    }

    /// Canonical string form, re-importable through [`DataType::parse_numeric_str`].
    pub fn to_numeric_str(&self) -> String {
        if self.floating_pt {
            return if self.total_bits > 32 { "double".into() } else { "single".into() };
        }
        if self.is_bool() {
            return "boolean".into();
        }
        if self.fractional_bits == 0 && matches!(self.total_bits, 8 | 16 | 32 | 64) {
            let u = if self.signed { "" } else { "u" };
            return format!("{u}int{}", self.total_bits);
        }
        let s = if self.signed { "s" } else { "u" };
        if self.fractional_bits == 0 {
            format!("{s}fix{}", self.total_bits)
        } else {
            format!("{s}fix{}_En{}", self.total_bits, self.fractional_bits)
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_numeric_str())?;
        if self.complex {
            write!(f, " complex")?;
        }
        if self.is_vector() {
            write!(f, " {:?}", self.dimensions)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_floats_and_bools() {
        let t = DataType::parse_numeric_str("single").unwrap();
        assert!(t.is_floating_pt() && t.is_signed() && t.total_bits() == 32);
        let t = DataType::parse_numeric_str("double").unwrap();
        assert_eq!(t.total_bits(), 64);
        assert!(DataType::parse_numeric_str("boolean").unwrap().is_bool());
        assert!(DataType::parse_numeric_str("logical").unwrap().is_bool());
    }

    #[test]
    fn parses_integer_widths() {
        let t = DataType::parse_numeric_str("uint16").unwrap();
        assert!(!t.is_signed() && t.total_bits() == 16);
        let t = DataType::parse_numeric_str("int64").unwrap();
        assert!(t.is_signed() && t.total_bits() == 64);
        assert!(DataType::parse_numeric_str("int12").is_err());
    }

    #[test]
    fn parses_fixed_point_forms() {
        let t = DataType::parse_numeric_str("ufix48_En12").unwrap();
        assert!(!t.is_signed());
        assert_eq!((t.total_bits(), t.fractional_bits()), (48, 12));
        let t = DataType::parse_numeric_str("sfix24").unwrap();
        assert!(t.is_signed() && t.fractional_bits() == 0);
        let t = DataType::parse_numeric_str("fixdt(1,32,14)").unwrap();
        assert!(t.is_signed());
        assert_eq!((t.total_bits(), t.fractional_bits()), (32, 14));
    }

    #[test]
    fn numeric_str_round_trips() {
        for s in ["single", "double", "boolean", "uint8", "int32", "ufix48_En12", "sfix24"] {
            let t = DataType::parse_numeric_str(s).unwrap();
            let back = DataType::parse_numeric_str(&t.to_numeric_str()).unwrap();
            assert_eq!(t, back, "{s}");
        }
    }

    #[test]
    fn blocking_expands_outer_dimension() {
        let t = DataType::new(false, true, false, 16, 0, vec![1]);
        assert_eq!(t.expand_outer_dimension(8).dimensions(), &[8]);
        let t = DataType::new(false, true, false, 16, 0, vec![4, 2]);
        assert_eq!(t.expand_outer_dimension(8).dimensions(), &[32, 2]);
        assert_eq!(t.num_elements(), 8);
    }

    #[test]
    fn storage_types_round_up() {
        let t = DataType::parse_numeric_str("ufix48_En12").unwrap();
        assert_eq!(t.cpu_storage_bits(), 64);
        assert_eq!(t.c_storage_type(), "uint64_t");
        let t = DataType::parse_numeric_str("single").unwrap();
        assert_eq!(t.c_storage_type(), "float");
    }

    #[test]
    fn float_forces_signed_and_no_fraction() {
        let t = DataType::new(true, false, false, 32, 7, vec![1]);
        assert!(t.is_signed());
        assert_eq!(t.fractional_bits(), 0);
    }
}
