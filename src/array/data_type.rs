//! Sample data types and decoded sample blocks.

use half::f16;
use zarrs::array::DataType as ZarrDataType;

/// Element type of a chunked array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float16,
    Float32,
    Float64,
}

impl DataType {
    /// Map a Zarr data type onto the element types this crate reads.
    ///
    /// Complex, raw-bits and variable-length types have no sample type and
    /// map to `None`.
    pub fn from_zarr(data_type: &ZarrDataType) -> Option<Self> {
        Some(match data_type {
            ZarrDataType::Bool => DataType::Bool,
            ZarrDataType::Int8 => DataType::Int8,
            ZarrDataType::Int16 => DataType::Int16,
            ZarrDataType::Int32 => DataType::Int32,
            ZarrDataType::Int64 => DataType::Int64,
            ZarrDataType::UInt8 => DataType::UInt8,
            ZarrDataType::UInt16 => DataType::UInt16,
            ZarrDataType::UInt32 => DataType::UInt32,
            ZarrDataType::UInt64 => DataType::UInt64,
            ZarrDataType::Float16 => DataType::Float16,
            ZarrDataType::Float32 => DataType::Float32,
            ZarrDataType::Float64 => DataType::Float64,
            _ => return None,
        })
    }

    /// Short lowercase name ("uint16", "float32", ...).
    pub fn name(&self) -> &'static str {
        match self {
            DataType::Bool => "bool",
            DataType::Int8 => "int8",
            DataType::Int16 => "int16",
            DataType::Int32 => "int32",
            DataType::Int64 => "int64",
            DataType::UInt8 => "uint8",
            DataType::UInt16 => "uint16",
            DataType::UInt32 => "uint32",
            DataType::UInt64 => "uint64",
            DataType::Float16 => "float16",
            DataType::Float32 => "float32",
            DataType::Float64 => "float64",
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Samples
// =============================================================================

/// Decoded samples of a single element type, row-major.
#[derive(Debug, Clone, PartialEq)]
pub enum Samples {
    Bool(Vec<bool>),
    Int8(Vec<i8>),
    Int16(Vec<i16>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    UInt8(Vec<u8>),
    UInt16(Vec<u16>),
    UInt32(Vec<u32>),
    UInt64(Vec<u64>),
    Float16(Vec<f16>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
}

/// Apply `$body` to the vector inside any [`Samples`] variant.
macro_rules! each_samples {
    ($samples:expr, $values:ident => $body:expr) => {
        match $samples {
            Samples::Bool($values) => $body,
            Samples::Int8($values) => $body,
            Samples::Int16($values) => $body,
            Samples::Int32($values) => $body,
            Samples::Int64($values) => $body,
            Samples::UInt8($values) => $body,
            Samples::UInt16($values) => $body,
            Samples::UInt32($values) => $body,
            Samples::UInt64($values) => $body,
            Samples::Float16($values) => $body,
            Samples::Float32($values) => $body,
            Samples::Float64($values) => $body,
        }
    };
}

impl Samples {
    /// Empty sample vector of `data_type`.
    pub fn empty(data_type: DataType) -> Self {
        match data_type {
            DataType::Bool => Samples::Bool(Vec::new()),
            DataType::Int8 => Samples::Int8(Vec::new()),
            DataType::Int16 => Samples::Int16(Vec::new()),
            DataType::Int32 => Samples::Int32(Vec::new()),
            DataType::Int64 => Samples::Int64(Vec::new()),
            DataType::UInt8 => Samples::UInt8(Vec::new()),
            DataType::UInt16 => Samples::UInt16(Vec::new()),
            DataType::UInt32 => Samples::UInt32(Vec::new()),
            DataType::UInt64 => Samples::UInt64(Vec::new()),
            DataType::Float16 => Samples::Float16(Vec::new()),
            DataType::Float32 => Samples::Float32(Vec::new()),
            DataType::Float64 => Samples::Float64(Vec::new()),
        }
    }

    pub fn data_type(&self) -> DataType {
        match self {
            Samples::Bool(_) => DataType::Bool,
            Samples::Int8(_) => DataType::Int8,
            Samples::Int16(_) => DataType::Int16,
            Samples::Int32(_) => DataType::Int32,
            Samples::Int64(_) => DataType::Int64,
            Samples::UInt8(_) => DataType::UInt8,
            Samples::UInt16(_) => DataType::UInt16,
            Samples::UInt32(_) => DataType::UInt32,
            Samples::UInt64(_) => DataType::UInt64,
            Samples::Float16(_) => DataType::Float16,
            Samples::Float32(_) => DataType::Float32,
            Samples::Float64(_) => DataType::Float64,
        }
    }

    pub fn len(&self) -> usize {
        each_samples!(self, values => values.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every element widened to `f64`; booleans become 0 or 1.
    pub fn to_f64(&self) -> Vec<f64> {
        each_samples!(self, values => values.iter().map(|&v| Sample::to_f64(v)).collect())
    }
}

// =============================================================================
// Sample Trait
// =============================================================================

/// Rust element types that can be read out of a [`SampleBlock`].
pub trait Sample: Copy + Send + Sync + 'static {
    const DATA_TYPE: DataType;

    fn into_samples(values: Vec<Self>) -> Samples;

    /// Borrow the values if `samples` holds this type.
    fn from_samples(samples: &Samples) -> Option<&[Self]>;

    /// Widen to `f64` (lossy for 64-bit integers beyond 2^53).
    fn to_f64(self) -> f64;
}

macro_rules! impl_sample {
    ($ty:ty, $variant:ident, $to_f64:expr) => {
        impl Sample for $ty {
            const DATA_TYPE: DataType = DataType::$variant;

            fn into_samples(values: Vec<Self>) -> Samples {
                Samples::$variant(values)
            }

            fn from_samples(samples: &Samples) -> Option<&[Self]> {
                match samples {
                    Samples::$variant(values) => Some(values),
                    _ => None,
                }
            }

            #[inline]
            fn to_f64(self) -> f64 {
                $to_f64(self)
            }
        }
    };
}

impl_sample!(bool, Bool, |v: bool| f64::from(u8::from(v)));
impl_sample!(i8, Int8, f64::from);
impl_sample!(i16, Int16, f64::from);
impl_sample!(i32, Int32, f64::from);
impl_sample!(i64, Int64, |v: i64| v as f64);
impl_sample!(u8, UInt8, f64::from);
impl_sample!(u16, UInt16, f64::from);
impl_sample!(u32, UInt32, f64::from);
impl_sample!(u64, UInt64, |v: u64| v as f64);
impl_sample!(f16, Float16, f16::to_f64);
impl_sample!(f32, Float32, f64::from);
impl_sample!(f64, Float64, |v: f64| v);

// =============================================================================
// Sample Block
// =============================================================================

/// A dense 3-D block of samples returned by a read.
///
/// The shape is in storage order (outermost axis first).
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBlock {
    shape: [usize; 3],
    samples: Samples,
}

impl SampleBlock {
    /// Returns `None` if `samples` does not hold exactly `shape` elements.
    pub fn new(shape: [usize; 3], samples: Samples) -> Option<Self> {
        (samples.len() == shape.iter().product::<usize>()).then_some(Self { shape, samples })
    }

    /// Wrap typed values.
    pub fn from_values<T: Sample>(shape: [usize; 3], values: Vec<T>) -> Option<Self> {
        Self::new(shape, T::into_samples(values))
    }

    /// Block with a zero-length axis.
    pub fn empty(shape: [usize; 3], data_type: DataType) -> Self {
        debug_assert!(shape.contains(&0));
        Self {
            shape,
            samples: Samples::empty(data_type),
        }
    }

    /// Shape in storage order.
    pub fn shape(&self) -> [usize; 3] {
        self.shape
    }

    pub fn data_type(&self) -> DataType {
        self.samples.data_type()
    }

    pub fn samples(&self) -> &Samples {
        &self.samples
    }

    pub fn into_samples(self) -> Samples {
        self.samples
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Borrow every element as `T`.
    ///
    /// Returns `None` if `T` does not match the block's data type.
    pub fn as_slice<T: Sample>(&self) -> Option<&[T]> {
        T::from_samples(&self.samples)
    }

    /// Copy every element out as `T`.
    pub fn values<T: Sample>(&self) -> Option<Vec<T>> {
        self.as_slice().map(<[T]>::to_vec)
    }

    pub fn to_f64(&self) -> Vec<f64> {
        self.samples.to_f64()
    }

    /// Element at `index` (storage order).
    pub fn get<T: Sample>(&self, index: [usize; 3]) -> Option<T> {
        if index.iter().zip(&self.shape).any(|(i, n)| i >= n) {
            return None;
        }
        let linear = (index[0] * self.shape[1] + index[1]) * self.shape[2] + index[2];
        self.as_slice::<T>()?.get(linear).copied()
    }

    /// Convert half-precision samples to single precision.
    ///
    /// Blocks of any other type are returned unchanged.
    pub fn promote_half(self) -> Self {
        match self.samples {
            Samples::Float16(values) => Self {
                shape: self.shape,
                samples: Samples::Float32(values.into_iter().map(f16::to_f32).collect()),
            },
            _ => self,
        }
    }
}
