//! In-memory NIfTI volume: a header plus its voxels as `f64`.

use super::header::{DataType, NiftiHeader};
use crate::error::{Error, Result};
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use half::{bf16, f16};
use ndarray::{ArrayD, IxDyn, ShapeBuilder};

/// A loaded volume.
///
/// Voxels are indexed logically as `[x, y, z, (t)]`. Values are held with
/// the header's `scl_slope`/`scl_inter` already applied.
#[derive(Debug, Clone)]
pub struct NiftiImage {
    header: NiftiHeader,
    data: ArrayD<f64>,
}

impl NiftiImage {
    /// Combine a header and voxel array; the header's extents follow `data`.
    pub fn from_parts(mut header: NiftiHeader, data: ArrayD<f64>) -> Result<Self> {
        header.set_shape(data.shape())?;
        Ok(Self { header, data })
    }

    /// Build a Float32 image from an array and a voxel-to-world affine.
    pub fn from_array(data: ArrayD<f64>, affine: [[f64; 4]; 4]) -> Result<Self> {
        let mut header = NiftiHeader::default();
        header.set_affine(affine);
        Self::from_parts(header, data)
    }

    /// New image that reuses this image's header for different voxels.
    ///
    /// The result is tagged Float32 with identity scaling, since derived
    /// values (differences, resampled data) are no longer on the source's
    /// integer grid.
    #[must_use = "this function returns a new image and does not modify the original"]
    pub fn derive(&self, data: ArrayD<f64>) -> Result<Self> {
        let mut header = self.header.clone();
        header.datatype = DataType::Float32;
        header.scl_slope = 1.0;
        header.scl_inter = 0.0;
        Self::from_parts(header, data)
    }

    /// Header metadata.
    pub fn header(&self) -> &NiftiHeader {
        &self.header
    }

    /// Shape of the voxel array.
    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    /// Voxel values.
    pub fn data(&self) -> &ArrayD<f64> {
        &self.data
    }

    /// Consume the image, keeping only the voxels.
    pub fn into_data(self) -> ArrayD<f64> {
        self.data
    }

    /// On-disk data type used when saving.
    pub fn dtype(&self) -> DataType {
        self.header.datatype
    }

    /// Change the on-disk data type used when saving.
    ///
    /// Scaling is reset so the stored values are written as-is (rounded for
    /// integer types).
    pub fn with_dtype(mut self, dtype: DataType) -> Self {
        self.header.datatype = dtype;
        self.header.scl_slope = 1.0;
        self.header.scl_inter = 0.0;
        self
    }

    /// Decode a voxel payload described by `header`.
    pub(crate) fn decode(header: NiftiHeader, payload: &[u8]) -> Result<Self> {
        let expected = header.data_size();
        if payload.len() < expected {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!(
                    "file truncated: voxel data has {} bytes, header needs {}",
                    payload.len(),
                    expected
                ),
            )));
        }
        let payload = &payload[..expected];

        let mut values = if header.is_little_endian() {
            decode_values::<LittleEndian>(payload, header.datatype)
        } else {
            decode_values::<BigEndian>(payload, header.datatype)
        };

        let (slope, inter) = header.scaling();
        if slope != 1.0 || inter != 0.0 {
            for v in &mut values {
                *v = *v * slope + inter;
            }
        }

        let shape = header.shape();
        // NIfTI stores x fastest.
        let data = ArrayD::from_shape_vec(IxDyn(&shape).f(), values)
            .map_err(|e| Error::InvalidDimensions(format!("voxel array: {e}")))?;
        Ok(Self { header, data })
    }

    /// Little-endian voxel payload in the header's data type.
    pub(crate) fn encode(&self) -> Vec<u8> {
        let dtype = self.header.datatype;
        let size = dtype.byte_size();
        let (slope, inter) = self.header.scaling();
        let mut out = vec![0u8; self.data.len() * size];

        // Reversed axes iterate the logical array in column-major order.
        for (chunk, &v) in out.chunks_exact_mut(size).zip(self.data.t().iter()) {
            let raw = (v - inter) / slope;
            encode_value(chunk, dtype, raw);
        }
        out
    }
}

fn decode_values<E: ByteOrder>(bytes: &[u8], dtype: DataType) -> Vec<f64> {
    let chunks = bytes.chunks_exact(dtype.byte_size());
    match dtype {
        DataType::UInt8 => chunks.map(|c| f64::from(c[0])).collect(),
        DataType::Int8 => chunks.map(|c| f64::from(c[0] as i8)).collect(),
        DataType::Int16 => chunks.map(|c| f64::from(E::read_i16(c))).collect(),
        DataType::UInt16 => chunks.map(|c| f64::from(E::read_u16(c))).collect(),
        DataType::Int32 => chunks.map(|c| f64::from(E::read_i32(c))).collect(),
        DataType::UInt32 => chunks.map(|c| f64::from(E::read_u32(c))).collect(),
        DataType::Int64 => chunks.map(|c| E::read_i64(c) as f64).collect(),
        DataType::UInt64 => chunks.map(|c| E::read_u64(c) as f64).collect(),
        DataType::Float16 => chunks
            .map(|c| f16::from_bits(E::read_u16(c)).to_f64())
            .collect(),
        DataType::BFloat16 => chunks
            .map(|c| bf16::from_bits(E::read_u16(c)).to_f64())
            .collect(),
        DataType::Float32 => chunks.map(|c| f64::from(E::read_f32(c))).collect(),
        DataType::Float64 => chunks.map(E::read_f64).collect(),
    }
}

fn encode_value(chunk: &mut [u8], dtype: DataType, v: f64) {
    type LE = LittleEndian;
    // Float-to-int `as` casts saturate and map NaN to 0.
    let r = v.round();
    match dtype {
        DataType::UInt8 => chunk[0] = r as u8,
        DataType::Int8 => chunk[0] = (r as i8) as u8,
        DataType::Int16 => LE::write_i16(chunk, r as i16),
        DataType::UInt16 => LE::write_u16(chunk, r as u16),
        DataType::Int32 => LE::write_i32(chunk, r as i32),
        DataType::UInt32 => LE::write_u32(chunk, r as u32),
        DataType::Int64 => LE::write_i64(chunk, r as i64),
        DataType::UInt64 => LE::write_u64(chunk, r as u64),
        DataType::Float16 => LE::write_u16(chunk, f16::from_f64(v).to_bits()),
        DataType::BFloat16 => LE::write_u16(chunk, bf16::from_f64(v).to_bits()),
        DataType::Float32 => LE::write_f32(chunk, v as f32),
        DataType::Float64 => LE::write_f64(chunk, v),
    }
}
