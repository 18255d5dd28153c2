//! Variables declared in the emitted program.

use crate::{DataType, NumericValue};

/// A named slot in the generated C program: state buffers, FIFO pointers,
/// loop counters.  The initial values, when present, are flattened row-major
/// and must cover `dtype.num_elements()` entries (or be empty).
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    name: String,
    dtype: DataType,
    init: Vec<NumericValue>,
    atomic: bool,
}

impl Variable {
    pub fn new(name: impl Into<String>, dtype: DataType) -> Variable {
        Variable { name: name.into(), dtype, init: Vec::new(), atomic: false }
    }

    pub fn with_init(name: impl Into<String>, dtype: DataType, init: Vec<NumericValue>) -> Variable {
        Variable { name: name.into(), dtype, init, atomic: false }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn data_type(&self) -> &DataType {
        &self.dtype
    }

    pub fn init_values(&self) -> &[NumericValue] {
        &self.init
    }

    pub fn set_init_values(&mut self, init: Vec<NumericValue>) {
        self.init = init;
    }

    pub fn is_atomic(&self) -> bool {
        self.atomic
    }

    pub fn set_atomic(&mut self, atomic: bool) {
        self.atomic = atomic;
    }

    /// The C identifier for this variable (imaginary part gets a suffix).
    pub fn c_name(&self, imag: bool) -> String {
        if imag { format!("{}_im", self.name) } else { self.name.clone() }
    }

    /// Emit a C declaration, e.g. `int32_t acc[8] = {0, 0, ...};`.
    ///
    /// Vector types declare a flat array sized by the element count.  When
    /// initial values are present they are emitted in order; a single value is
    /// broadcast across the whole array.
    pub fn c_decl(&self, imag: bool) -> String {
        let base = self.dtype.c_storage_type();
        let base = if self.atomic { format!("_Atomic {base}") } else { base };
        let name = self.c_name(imag);
        let elems = self.dtype.num_elements();

        let mut decl = if elems == 1 {
            format!("{base} {name}")
        } else {
            format!("{base} {name}[{elems}]")
        };

        if !self.init.is_empty() {
            let vals: Vec<String> = if self.init.len() == 1 && elems > 1 {
                std::iter::repeat_with(|| self.init[0].c_literal(&self.dtype, imag))
                    .take(elems)
                    .collect()
            } else {
                self.init.iter().map(|v| v.c_literal(&self.dtype, imag)).collect()
            };
            if elems == 1 {
                decl.push_str(&format!(" = {}", vals[0]));
            } else {
                decl.push_str(&format!(" = {{{}}}", vals.join(", ")));
            }
        }
        decl.push(';');
        decl
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_decl_with_init() {
        let t = DataType::parse_numeric_str("int32").unwrap();
        let v = Variable::with_init("acc", t, vec![NumericValue::Int(7)]);
        assert_eq!(v.c_decl(false), "int32_t acc = 7;");
    }

    #[test]
    fn vector_decl_broadcasts_scalar_init() {
        let mut t = DataType::parse_numeric_str("uint8").unwrap();
        t.set_dimensions(vec![3]);
        let v = Variable::with_init("buf", t, vec![NumericValue::Int(1)]);
        assert_eq!(v.c_decl(false), "uint8_t buf[3] = {1, 1, 1};");
    }

    #[test]
    fn imag_part_gets_suffix() {
        let mut t = DataType::double_scalar();
        t.set_complex(true);
        let v = Variable::new("z", t);
        assert_eq!(v.c_decl(true), "double z_im;");
    }
}
