use std::collections::HashMap;
use std::fmt;
use std::mem::size_of;

use bytemuck::Pod;
use once_cell::sync::Lazy;
use rustfft::num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::dsp::PlotError;

/// Scalar element kinds a port can declare.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Float64,
    Float32,
    Int64,
    Uint64,
    Int32,
    Uint32,
    Int16,
    Uint16,
    Int8,
    Uint8,
    /// 8-bit signed character code.
    Char,
    Bool,
}

impl ScalarKind {
    pub const ALL: [ScalarKind; 12] = [
        ScalarKind::Float64,
        ScalarKind::Float32,
        ScalarKind::Int64,
        ScalarKind::Uint64,
        ScalarKind::Int32,
        ScalarKind::Uint32,
        ScalarKind::Int16,
        ScalarKind::Uint16,
        ScalarKind::Int8,
        ScalarKind::Uint8,
        ScalarKind::Char,
        ScalarKind::Bool,
    ];

    pub fn size(self) -> usize {
        match self {
            ScalarKind::Float64 | ScalarKind::Int64 | ScalarKind::Uint64 => 8,
            ScalarKind::Float32 | ScalarKind::Int32 | ScalarKind::Uint32 => 4,
            ScalarKind::Int16 | ScalarKind::Uint16 => 2,
            ScalarKind::Int8 | ScalarKind::Uint8 | ScalarKind::Char | ScalarKind::Bool => 1,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ScalarKind::Float64 => "float64",
            ScalarKind::Float32 => "float32",
            ScalarKind::Int64 => "int64",
            ScalarKind::Uint64 => "uint64",
            ScalarKind::Int32 => "int32",
            ScalarKind::Uint32 => "uint32",
            ScalarKind::Int16 => "int16",
            ScalarKind::Uint16 => "uint16",
            ScalarKind::Int8 => "int8",
            ScalarKind::Uint8 => "uint8",
            ScalarKind::Char => "char",
            ScalarKind::Bool => "bool",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| kind.name() == name)
    }
}

/// Element type tag carried by an input port.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DType {
    Scalar(ScalarKind),
    Complex(ScalarKind),
    /// Fixed-size record the framework can move but nothing here can plot.
    Opaque { size: usize },
}

impl DType {
    pub fn size(&self) -> usize {
        match self {
            DType::Scalar(kind) => kind.size(),
            DType::Complex(kind) => 2 * kind.size(),
            DType::Opaque { size } => *size,
        }
    }

    pub fn is_complex(&self) -> bool {
        matches!(self, DType::Complex(_))
    }

    /// Parses names such as `int16`, `complex_float32` or `opaque:12`.
    pub fn parse(name: &str) -> Result<Self, PlotError> {
        let trimmed = name.trim();
        if let Some(size) = trimmed.strip_prefix("opaque:") {
            return size
                .parse()
                .map(|size| DType::Opaque { size })
                .map_err(|_| PlotError::UnknownTypeName(name.to_string()));
        }
        let (complex, scalar) = match trimmed.strip_prefix("complex_") {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        let kind = ScalarKind::from_name(scalar)
            .ok_or_else(|| PlotError::UnknownTypeName(name.to_string()))?;
        Ok(if complex {
            DType::Complex(kind)
        } else {
            DType::Scalar(kind)
        })
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DType::Scalar(kind) => f.write_str(kind.name()),
            DType::Complex(kind) => write!(f, "complex_{}", kind.name()),
            DType::Opaque { size } => write!(f, "opaque:{size}"),
        }
    }
}

impl TryFrom<String> for DType {
    type Error = PlotError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        DType::parse(&value)
    }
}

impl From<DType> for String {
    fn from(value: DType) -> Self {
        value.to_string()
    }
}

/// Plain numeric element that widens into a double.
pub trait Sample: Pod {
    fn to_f64(self) -> f64;
}

macro_rules! impl_sample {
    ($($t:ty),*) => {
        $(impl Sample for $t {
            fn to_f64(self) -> f64 {
                self as f64
            }
        })*
    };
}

impl_sample!(f64, f32, i64, u64, i32, u32, i16, u16, i8, u8);

/// Fills `out` from the front of a native-endian raw buffer.
pub type ConvertFn = fn(&[u8], &mut [Complex64]);

fn convert_real<T: Sample>(raw: &[u8], out: &mut [Complex64]) {
    for (slot, chunk) in out.iter_mut().zip(raw.chunks_exact(size_of::<T>())) {
        *slot = Complex64::new(bytemuck::pod_read_unaligned::<T>(chunk).to_f64(), 0.0);
    }
}

fn convert_complex<T: Sample>(raw: &[u8], out: &mut [Complex64]) {
    let size = size_of::<T>();
    for (slot, chunk) in out.iter_mut().zip(raw.chunks_exact(2 * size)) {
        let re = bytemuck::pod_read_unaligned::<T>(&chunk[..size]).to_f64();
        let im = bytemuck::pod_read_unaligned::<T>(&chunk[size..]).to_f64();
        *slot = Complex64::new(re, im);
    }
}

static CONVERTERS: Lazy<HashMap<DType, ConvertFn>> = Lazy::new(|| {
    let mut map: HashMap<DType, ConvertFn> = HashMap::new();
    macro_rules! register {
        ($kind:expr, $t:ty) => {
            map.insert(DType::Scalar($kind), convert_real::<$t>);
            map.insert(DType::Complex($kind), convert_complex::<$t>);
        };
    }
    register!(ScalarKind::Float64, f64);
    register!(ScalarKind::Float32, f32);
    register!(ScalarKind::Int64, i64);
    register!(ScalarKind::Uint64, u64);
    register!(ScalarKind::Int32, i32);
    register!(ScalarKind::Uint32, u32);
    register!(ScalarKind::Int16, i16);
    register!(ScalarKind::Uint16, u16);
    register!(ScalarKind::Int8, i8);
    register!(ScalarKind::Uint8, u8);
    register!(ScalarKind::Char, i8);
    map
});

/// Converter bound to one element type.
#[derive(Clone, Copy)]
pub struct Converter {
    dtype: DType,
    convert: ConvertFn,
}

impl Converter {
    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// Converts the first `count` elements of `raw`. Elements past the end of
    /// `raw` are left at zero.
    pub fn to_complex(&self, raw: &[u8], count: usize) -> Vec<Complex64> {
        let mut out = vec![Complex64::new(0.0, 0.0); count];
        (self.convert)(raw, &mut out);
        out
    }
}

impl fmt::Debug for Converter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Converter").field("dtype", &self.dtype).finish()
    }
}

pub fn converter_for(dtype: DType) -> Result<Converter, PlotError> {
    CONVERTERS
        .get(&dtype)
        .map(|&convert| Converter { dtype, convert })
        .ok_or(PlotError::UnsupportedType(dtype))
}
