//! NIfTI-1 and NIfTI-2 headers: parsing, serialisation and geometry.
//!
//! Both NIfTI-1 (348-byte) and NIfTI-2 (540-byte) headers are read through a
//! per-version [`Layout`] table, so one parser handles either format and
//! either byte order. Headers are always written little-endian.

use crate::error::{Error, Result};
use byteorder::{BigEndian, ByteOrder, LittleEndian};

/// NIfTI format version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NiftiVersion {
    /// NIfTI-1 format (348-byte header, 16-bit dimensions)
    #[default]
    Nifti1,
    /// NIfTI-2 format (540-byte header, 64-bit dimensions)
    Nifti2,
}

impl NiftiVersion {
    /// Header size in bytes for this version.
    pub const fn header_size(self) -> usize {
        match self {
            Self::Nifti1 => 348,
            Self::Nifti2 => 540,
        }
    }

    /// Offset of the voxel data when no extensions are written.
    pub const fn default_vox_offset(self) -> i64 {
        self.header_size() as i64 + 4
    }

    const fn layout(self) -> &'static Layout {
        match self {
            Self::Nifti1 => &LAYOUT_V1,
            Self::Nifti2 => &LAYOUT_V2,
        }
    }
}

/// Byte offsets and field widths for one header version.
struct Layout {
    magic: usize,
    magics: [&'static [u8]; 2],
    datatype: usize,
    bitpix: usize,
    /// `dim[0]` (ndim) followed by seven extents.
    dim: usize,
    int_width: usize,
    pixdim: usize,
    float_width: usize,
    vox_offset: usize,
    vox_offset_is_float: bool,
    /// `scl_slope` followed by `scl_inter`.
    scl: usize,
    descrip: usize,
    aux_file: usize,
    /// `qform_code` followed by `sform_code`.
    xform_codes: usize,
    code_width: usize,
    /// quatern b, c, d then qoffset x, y, z.
    quatern: usize,
    /// srow_x, srow_y, srow_z.
    srow: usize,
    xyzt_units: usize,
    xyzt_width: usize,
    intent_code: usize,
    intent_width: usize,
}

const LAYOUT_V1: Layout = Layout {
    magic: 344,
    magics: [b"n+1\0", b"ni1\0"],
    datatype: 70,
    bitpix: 72,
    dim: 40,
    int_width: 2,
    pixdim: 76,
    float_width: 4,
    vox_offset: 108,
    vox_offset_is_float: true,
    scl: 112,
    descrip: 148,
    aux_file: 228,
    xform_codes: 252,
    code_width: 2,
    quatern: 256,
    srow: 280,
    xyzt_units: 123,
    xyzt_width: 1,
    intent_code: 68,
    intent_width: 2,
};

const LAYOUT_V2: Layout = Layout {
    magic: 4,
    magics: [b"n+2\0\r\n\x1a\n", b"ni2\0\r\n\x1a\n"],
    datatype: 12,
    bitpix: 14,
    dim: 16,
    int_width: 8,
    pixdim: 104,
    float_width: 8,
    vox_offset: 168,
    vox_offset_is_float: false,
    scl: 176,
    descrip: 240,
    aux_file: 320,
    xform_codes: 344,
    code_width: 4,
    quatern: 352,
    srow: 400,
    xyzt_units: 500,
    xyzt_width: 4,
    intent_code: 504,
    intent_width: 4,
};

const DESCRIP_LEN: usize = 80;
const AUX_FILE_LEN: usize = 24;

/// `NIfTI` data type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i16)]
pub enum DataType {
    /// Unsigned 8-bit integer
    UInt8 = 2,
    /// Signed 16-bit integer
    Int16 = 4,
    /// Signed 32-bit integer
    Int32 = 8,
    /// 32-bit floating point
    Float32 = 16,
    /// 64-bit floating point
    Float64 = 64,
    /// Signed 8-bit integer
    Int8 = 256,
    /// Unsigned 16-bit integer
    UInt16 = 512,
    /// Unsigned 32-bit integer
    UInt32 = 768,
    /// Signed 64-bit integer
    Int64 = 1024,
    /// Unsigned 64-bit integer
    UInt64 = 1280,
    /// IEEE 754 half precision
    Float16 = 16384,
    /// bfloat16
    BFloat16 = 16385,
}

impl DataType {
    /// Parse from `NIfTI` datatype code.
    pub fn from_code(code: i16) -> Result<Self> {
        Ok(match code {
            2 => Self::UInt8,
            4 => Self::Int16,
            8 => Self::Int32,
            16 => Self::Float32,
            64 => Self::Float64,
            256 => Self::Int8,
            512 => Self::UInt16,
            768 => Self::UInt32,
            1024 => Self::Int64,
            1280 => Self::UInt64,
            16384 => Self::Float16,
            16385 => Self::BFloat16,
            _ => return Err(Error::UnsupportedDataType(code)),
        })
    }

    /// Size of each element in bytes.
    pub const fn byte_size(self) -> usize {
        match self {
            Self::UInt8 | Self::Int8 => 1,
            Self::Int16 | Self::UInt16 | Self::Float16 | Self::BFloat16 => 2,
            Self::Int32 | Self::UInt32 | Self::Float32 => 4,
            Self::Int64 | Self::UInt64 | Self::Float64 => 8,
        }
    }

    /// True for the floating point codes.
    pub const fn is_float(self) -> bool {
        matches!(
            self,
            Self::Float16 | Self::BFloat16 | Self::Float32 | Self::Float64
        )
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::UInt8 => "u8",
            Self::Int8 => "i8",
            Self::Int16 => "i16",
            Self::UInt16 => "u16",
            Self::Int32 => "i32",
            Self::UInt32 => "u32",
            Self::Int64 => "i64",
            Self::UInt64 => "u64",
            Self::Float16 => "f16",
            Self::BFloat16 => "bf16",
            Self::Float32 => "f32",
            Self::Float64 => "f64",
        };
        f.write_str(name)
    }
}

/// Reads fixed-width header fields in the file's byte order.
struct FieldReader<'a> {
    bytes: &'a [u8],
    little_endian: bool,
}

impl FieldReader<'_> {
    fn int(&self, offset: usize, width: usize) -> i64 {
        let b = &self.bytes[offset..offset + width];
        match (width, self.little_endian) {
            (1, _) => i64::from(b[0]),
            (2, true) => LittleEndian::read_i16(b).into(),
            (2, false) => BigEndian::read_i16(b).into(),
            (4, true) => LittleEndian::read_i32(b).into(),
            (4, false) => BigEndian::read_i32(b).into(),
            (_, true) => LittleEndian::read_i64(b),
            (_, false) => BigEndian::read_i64(b),
        }
    }

    fn float(&self, offset: usize, width: usize) -> f64 {
        let b = &self.bytes[offset..offset + width];
        match (width, self.little_endian) {
            (4, true) => LittleEndian::read_f32(b).into(),
            (4, false) => BigEndian::read_f32(b).into(),
            (_, true) => LittleEndian::read_f64(b),
            (_, false) => BigEndian::read_f64(b),
        }
    }

    fn floats<const N: usize>(&self, offset: usize, width: usize) -> [f64; N] {
        std::array::from_fn(|i| self.float(offset + i * width, width))
    }

    fn text(&self, offset: usize, len: usize) -> String {
        String::from_utf8_lossy(&self.bytes[offset..offset + len])
            .trim_end_matches('\0')
            .to_string()
    }
}

/// Little-endian field writer over a zeroed header buffer.
struct FieldWriter {
    buf: Vec<u8>,
}

impl FieldWriter {
    fn int(&mut self, offset: usize, width: usize, value: i64) {
        let b = &mut self.buf[offset..offset + width];
        match width {
            1 => b[0] = value as u8,
            2 => LittleEndian::write_i16(b, value as i16),
            4 => LittleEndian::write_i32(b, value as i32),
            _ => LittleEndian::write_i64(b, value),
        }
    }

    fn float(&mut self, offset: usize, width: usize, value: f64) {
        let b = &mut self.buf[offset..offset + width];
        if width == 4 {
            LittleEndian::write_f32(b, value as f32);
        } else {
            LittleEndian::write_f64(b, value);
        }
    }

    fn floats(&mut self, offset: usize, width: usize, values: &[f64]) {
        for (i, &v) in values.iter().enumerate() {
            self.float(offset + i * width, width, v);
        }
    }

    fn text(&mut self, offset: usize, len: usize, value: &str) {
        let bytes = value.as_bytes();
        let n = bytes.len().min(len - 1);
        self.buf[offset..offset + n].copy_from_slice(&bytes[..n]);
    }
}

/// Unified NIfTI header.
///
/// Extents are kept as `i64` and floating fields as `f64` so NIfTI-2 values
/// survive; NIfTI-1 output downcasts them.
#[derive(Debug, Clone, PartialEq)]
pub struct NiftiHeader {
    /// NIfTI format version.
    pub version: NiftiVersion,
    /// Number of dimensions (1-7).
    pub ndim: u8,
    /// Size along each dimension.
    pub dim: [i64; 7],
    /// On-disk data type.
    pub datatype: DataType,
    /// qfac at index 0, voxel sizes at 1..=ndim.
    pub pixdim: [f64; 8],
    /// Byte offset of the voxel data.
    pub vox_offset: i64,
    /// Data scaling slope (0 means unscaled).
    pub scl_slope: f64,
    /// Data scaling intercept.
    pub scl_inter: f64,
    /// Packed spatial/temporal unit codes.
    pub xyzt_units: u8,
    /// Intent code.
    pub intent_code: i32,
    /// Description string.
    pub descrip: String,
    /// Auxiliary filename.
    pub aux_file: String,
    /// qform transform code.
    pub qform_code: i32,
    /// sform transform code.
    pub sform_code: i32,
    /// Quaternion b, c, d.
    pub quatern: [f64; 3],
    /// qform translation.
    pub qoffset: [f64; 3],
    /// sform rows x, y, z.
    pub srow: [[f64; 4]; 3],
    pub(crate) little_endian: bool,
}

impl Default for NiftiHeader {
    fn default() -> Self {
        Self {
            version: NiftiVersion::Nifti1,
            ndim: 3,
            dim: [1; 7],
            datatype: DataType::Float32,
            pixdim: [1.0; 8],
            vox_offset: NiftiVersion::Nifti1.default_vox_offset(),
            scl_slope: 1.0,
            scl_inter: 0.0,
            // millimetres
            xyzt_units: 2,
            intent_code: 0,
            descrip: String::new(),
            aux_file: String::new(),
            qform_code: 0,
            sform_code: 1,
            quatern: [0.0; 3],
            qoffset: [0.0; 3],
            srow: [
                [1.0, 0.0, 0.0, 0.0],
                [0.0, 1.0, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
            ],
            little_endian: true,
        }
    }
}

impl NiftiHeader {
    /// Size of a NIfTI-1 header in bytes.
    pub const SIZE: usize = 348;

    /// Parse a header, detecting version and byte order from `sizeof_hdr`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 4 {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "header too short to detect version",
            )));
        }

        let le = LittleEndian::read_i32(&bytes[0..4]);
        let be = BigEndian::read_i32(&bytes[0..4]);
        let (version, little_endian) = match (le, be) {
            (348, _) => (NiftiVersion::Nifti1, true),
            (_, 348) => (NiftiVersion::Nifti1, false),
            (540, _) => (NiftiVersion::Nifti2, true),
            (_, 540) => (NiftiVersion::Nifti2, false),
            _ => {
                return Err(Error::InvalidMagic([
                    bytes[0], bytes[1], bytes[2], bytes[3],
                ]))
            }
        };

        if bytes.len() < version.header_size() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!(
                    "header too short: got {} bytes, need {} for {:?}",
                    bytes.len(),
                    version.header_size(),
                    version
                ),
            )));
        }

        Self::parse(bytes, version, little_endian)
    }

    fn parse(bytes: &[u8], version: NiftiVersion, little_endian: bool) -> Result<Self> {
        let l = version.layout();
        let r = FieldReader {
            bytes,
            little_endian,
        };

        let magic = &bytes[l.magic..l.magic + l.magics[0].len()];
        if !l.magics.iter().any(|m| *m == magic) {
            return Err(Error::InvalidMagic([magic[0], magic[1], magic[2], magic[3]]));
        }

        let ndim = r.int(l.dim, l.int_width);
        if !(1..=7).contains(&ndim) {
            return Err(Error::InvalidDimensions(format!(
                "ndim must be 1..=7, got {ndim}"
            )));
        }
        let mut dim = [1i64; 7];
        for (i, d) in dim.iter_mut().enumerate() {
            *d = r.int(l.dim + (i + 1) * l.int_width, l.int_width);
            if *d < 0 {
                return Err(Error::InvalidDimensions(format!(
                    "dimension {i} has negative value: {d}"
                )));
            }
        }

        let datatype = DataType::from_code(r.int(l.datatype, 2) as i16)?;
        let bitpix = r.int(l.bitpix, 2);
        if bitpix != (datatype.byte_size() * 8) as i64 {
            return Err(Error::InvalidDimensions(format!(
                "bitpix {bitpix} does not match datatype {datatype}"
            )));
        }

        let vox_offset = if l.vox_offset_is_float {
            let raw = r.float(l.vox_offset, l.float_width);
            if !raw.is_finite() || raw.fract() != 0.0 {
                return Err(Error::InvalidDimensions(format!(
                    "vox_offset must be a finite integer, got {raw}"
                )));
            }
            raw as i64
        } else {
            r.int(l.vox_offset, 8)
        };

        let fw = l.float_width;
        let qparams: [f64; 6] = r.floats(l.quatern, fw);
        let srow: [f64; 12] = r.floats(l.srow, fw);

        let header = Self {
            version,
            ndim: ndim as u8,
            dim,
            datatype,
            pixdim: r.floats(l.pixdim, fw),
            vox_offset,
            scl_slope: r.float(l.scl, fw),
            scl_inter: r.float(l.scl + fw, fw),
            xyzt_units: r.int(l.xyzt_units, l.xyzt_width) as u8,
            intent_code: r.int(l.intent_code, l.intent_width) as i32,
            descrip: r.text(l.descrip, DESCRIP_LEN),
            aux_file: r.text(l.aux_file, AUX_FILE_LEN),
            qform_code: r.int(l.xform_codes, l.code_width) as i32,
            sform_code: r.int(l.xform_codes + l.code_width, l.code_width) as i32,
            quatern: [qparams[0], qparams[1], qparams[2]],
            qoffset: [qparams[3], qparams[4], qparams[5]],
            srow: [
                [srow[0], srow[1], srow[2], srow[3]],
                [srow[4], srow[5], srow[6], srow[7]],
                [srow[8], srow[9], srow[10], srow[11]],
            ],
            little_endian,
        };

        header.validate()?;
        Ok(header)
    }

    /// Serialize the header (little-endian) in its own version's layout.
    pub fn to_bytes(&self) -> Vec<u8> {
        let version = self.version;
        let l = version.layout();
        let mut w = FieldWriter {
            buf: vec![0u8; version.header_size()],
        };

        w.int(0, 4, version.header_size() as i64);
        w.buf[l.magic..l.magic + l.magics[0].len()].copy_from_slice(l.magics[0]);

        w.int(l.datatype, 2, self.datatype as i64);
        w.int(l.bitpix, 2, (self.datatype.byte_size() * 8) as i64);

        w.int(l.dim, l.int_width, i64::from(self.ndim));
        for (i, &d) in self.dim.iter().enumerate() {
            w.int(l.dim + (i + 1) * l.int_width, l.int_width, d);
        }

        let fw = l.float_width;
        w.floats(l.pixdim, fw, &self.pixdim);
        if l.vox_offset_is_float {
            w.float(l.vox_offset, fw, self.vox_offset as f64);
        } else {
            w.int(l.vox_offset, 8, self.vox_offset);
        }
        w.float(l.scl, fw, self.scl_slope);
        w.float(l.scl + fw, fw, self.scl_inter);

        w.int(l.xyzt_units, l.xyzt_width, i64::from(self.xyzt_units));
        w.int(l.intent_code, l.intent_width, i64::from(self.intent_code));
        w.text(l.descrip, DESCRIP_LEN, &self.descrip);
        w.text(l.aux_file, AUX_FILE_LEN, &self.aux_file);

        w.int(l.xform_codes, l.code_width, i64::from(self.qform_code));
        w.int(l.xform_codes + l.code_width, l.code_width, i64::from(self.sform_code));
        w.floats(l.quatern, fw, &self.quatern);
        w.floats(l.quatern + 3 * fw, fw, &self.qoffset);
        w.floats(l.srow, fw, &self.srow.concat());

        w.buf
    }

    /// Copy of this header ready to be written: NIfTI-2 when an extent
    /// overflows NIfTI-1, no extensions, little-endian.
    pub fn for_writing(&self) -> Self {
        let mut header = self.clone();
        header.version = if self.requires_nifti2() {
            NiftiVersion::Nifti2
        } else {
            NiftiVersion::Nifti1
        };
        header.vox_offset = header.version.default_vox_offset();
        header.little_endian = true;
        header
    }

    /// Image shape (first `ndim` extents).
    pub fn shape(&self) -> Vec<usize> {
        self.dim[..self.ndim as usize]
            .iter()
            .map(|&d| d as usize)
            .collect()
    }

    /// Replace `ndim`/`dim` with the given shape.
    pub fn set_shape(&mut self, shape: &[usize]) -> Result<()> {
        if shape.is_empty() || shape.len() > 7 {
            return Err(Error::InvalidDimensions(format!(
                "ndim must be 1..=7, got {}",
                shape.len()
            )));
        }
        self.ndim = shape.len() as u8;
        self.dim = [1; 7];
        for (d, &s) in self.dim.iter_mut().zip(shape) {
            *d = s as i64;
        }
        Ok(())
    }

    /// Voxel spacing for each of the `ndim` axes.
    pub fn spacing(&self) -> Vec<f64> {
        self.pixdim[1..=self.ndim as usize].to_vec()
    }

    /// Total number of voxels.
    pub fn num_voxels(&self) -> usize {
        self.shape().iter().product()
    }

    /// Size of the voxel payload in bytes.
    pub fn data_size(&self) -> usize {
        self.num_voxels() * self.datatype.byte_size()
    }

    /// Whether the file this header came from was little-endian.
    pub fn is_little_endian(&self) -> bool {
        self.little_endian
    }

    /// True when an extent does not fit NIfTI-1's 16-bit fields.
    pub fn requires_nifti2(&self) -> bool {
        self.dim.iter().any(|&d| d > i64::from(i16::MAX))
    }

    /// Effective `(slope, intercept)`; a zero or non-finite slope means none.
    pub fn scaling(&self) -> (f64, f64) {
        if self.scl_slope == 0.0 || !self.scl_slope.is_finite() {
            (1.0, 0.0)
        } else {
            let inter = if self.scl_inter.is_finite() {
                self.scl_inter
            } else {
                0.0
            };
            (self.scl_slope, inter)
        }
    }

    /// Voxel-to-world affine: sform if set, else qform, else scaled identity.
    pub fn affine(&self) -> [[f64; 4]; 4] {
        if self.sform_code > 0 {
            [self.srow[0], self.srow[1], self.srow[2], [0.0, 0.0, 0.0, 1.0]]
        } else if self.qform_code > 0 {
            self.qform_affine()
        } else {
            [
                [self.pixdim[1], 0.0, 0.0, 0.0],
                [0.0, self.pixdim[2], 0.0, 0.0],
                [0.0, 0.0, self.pixdim[3], 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ]
        }
    }

    /// Store `affine` as the sform and refresh the spatial pixdims.
    pub fn set_affine(&mut self, affine: [[f64; 4]; 4]) {
        self.srow = [affine[0], affine[1], affine[2]];
        self.sform_code = 1;
        for axis in 0..3 {
            let norm = (0..3).map(|row| affine[row][axis].powi(2)).sum::<f64>();
            self.pixdim[axis + 1] = norm.sqrt();
        }
    }

    #[allow(clippy::many_single_char_names)]
    fn qform_affine(&self) -> [[f64; 4]; 4] {
        let [b, c, d] = self.quatern;
        let a = (1.0 - b * b - c * c - d * d).max(0.0).sqrt();
        let qfac = if self.pixdim[0] < 0.0 { -1.0 } else { 1.0 };
        let (i, j, k) = (self.pixdim[1], self.pixdim[2], self.pixdim[3] * qfac);
        let [x, y, z] = self.qoffset;
        [
            [
                (a * a + b * b - c * c - d * d) * i,
                2.0 * (b * c - a * d) * j,
                2.0 * (b * d + a * c) * k,
                x,
            ],
            [
                2.0 * (b * c + a * d) * i,
                (a * a + c * c - b * b - d * d) * j,
                2.0 * (c * d - a * b) * k,
                y,
            ],
            [
                2.0 * (b * d - a * c) * i,
                2.0 * (c * d + a * b) * j,
                (a * a + d * d - b * b - c * c) * k,
                z,
            ],
            [0.0, 0.0, 0.0, 1.0],
        ]
    }

    /// Check the invariants the voxel decoder relies on.
    pub fn validate(&self) -> Result<()> {
        if self.ndim == 0 || self.ndim > 7 {
            return Err(Error::InvalidDimensions(format!(
                "ndim must be 1..=7, got {}",
                self.ndim
            )));
        }

        let mut voxels: usize = 1;
        for (i, &d) in self.dim[..self.ndim as usize].iter().enumerate() {
            if d <= 0 {
                return Err(Error::InvalidDimensions(format!("dimension {i} is zero")));
            }
            if !self.pixdim[i + 1].is_finite() {
                return Err(Error::InvalidDimensions(format!(
                    "pixdim[{}] must be finite, got {}",
                    i + 1,
                    self.pixdim[i + 1]
                )));
            }
            voxels = voxels
                .checked_mul(d as usize)
                .ok_or_else(|| Error::InvalidDimensions("dimension product overflow".into()))?;
        }
        voxels
            .checked_mul(self.datatype.byte_size())
            .ok_or_else(|| Error::InvalidDimensions("data size overflow".into()))?;

        let min_offset = self.version.header_size() as i64;
        if self.vox_offset < min_offset {
            return Err(Error::InvalidDimensions(format!(
                "vox_offset {} before header end ({})",
                self.vox_offset, min_offset
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_3d(shape: [i64; 3]) -> NiftiHeader {
        let mut header = NiftiHeader::default();
        header.dim = [shape[0], shape[1], shape[2], 1, 1, 1, 1];
        header.pixdim = [1.0, 1.0, 2.0, 3.0, 0.0, 0.0, 0.0, 0.0];
        header
    }

    #[test]
    fn test_nifti1_roundtrip() {
        let mut header = header_3d([64, 48, 32]);
        header.descrip = "fixed minus subtract".into();
        header.scl_slope = 2.0;
        header.scl_inter = -1.0;

        let bytes = header.to_bytes();
        assert_eq!(bytes.len(), 348);

        let parsed = NiftiHeader::from_bytes(&bytes).unwrap();
        assert_eq!(parsed.version, NiftiVersion::Nifti1);
        assert_eq!(parsed.shape(), vec![64, 48, 32]);
        assert_eq!(parsed.spacing(), vec![1.0, 2.0, 3.0]);
        assert_eq!(parsed.descrip, "fixed minus subtract");
        assert_eq!(parsed.scaling(), (2.0, -1.0));
        assert_eq!(parsed.srow, header.srow);
    }

    #[test]
    fn test_nifti2_selected_for_large_extent() {
        let header = header_3d([100_000, 4, 4]).for_writing();
        assert_eq!(header.version, NiftiVersion::Nifti2);
        assert_eq!(header.vox_offset, 544);

        let bytes = header.to_bytes();
        assert_eq!(bytes.len(), 540);
        let parsed = NiftiHeader::from_bytes(&bytes).unwrap();
        assert_eq!(parsed.version, NiftiVersion::Nifti2);
        assert_eq!(parsed.dim[0], 100_000);
    }

    #[test]
    fn test_big_endian_header() {
        let mut bytes = vec![0u8; 348];
        BigEndian::write_i32(&mut bytes[0..4], 348);
        bytes[344..348].copy_from_slice(b"n+1\0");
        BigEndian::write_i16(&mut bytes[40..42], 3);
        BigEndian::write_i16(&mut bytes[42..44], 5);
        BigEndian::write_i16(&mut bytes[44..46], 6);
        BigEndian::write_i16(&mut bytes[46..48], 7);
        BigEndian::write_i16(&mut bytes[70..72], 4); // Int16
        BigEndian::write_i16(&mut bytes[72..74], 16);
        BigEndian::write_f32(&mut bytes[108..112], 352.0);

        let header = NiftiHeader::from_bytes(&bytes).unwrap();
        assert!(!header.is_little_endian());
        assert_eq!(header.shape(), vec![5, 6, 7]);
        assert_eq!(header.datatype, DataType::Int16);
    }

    #[test]
    fn test_rejects_bad_magic_and_bitpix() {
        let mut bytes = header_3d([2, 2, 2]).to_bytes();
        bytes[344..348].copy_from_slice(b"BAD!");
        assert!(matches!(
            NiftiHeader::from_bytes(&bytes),
            Err(Error::InvalidMagic(_))
        ));

        let mut bytes = header_3d([2, 2, 2]).to_bytes();
        LittleEndian::write_i16(&mut bytes[72..74], 8);
        assert!(matches!(
            NiftiHeader::from_bytes(&bytes),
            Err(Error::InvalidDimensions(_))
        ));
    }

    #[test]
    fn test_zero_slope_means_unscaled() {
        let mut header = NiftiHeader::default();
        header.scl_slope = 0.0;
        header.scl_inter = 5.0;
        assert_eq!(header.scaling(), (1.0, 0.0));
    }

    #[test]
    fn test_set_affine_updates_spacing() {
        let mut header = NiftiHeader::default();
        header.set_affine([
            [0.0, -2.0, 0.0, 10.0],
            [3.0, 0.0, 0.0, 20.0],
            [0.0, 0.0, 1.5, 30.0],
            [0.0, 0.0, 0.0, 1.0],
        ]);
        assert_eq!(&header.pixdim[1..4], &[3.0, 2.0, 1.5]);
        assert_eq!(header.affine()[1][3], 20.0);
    }

    #[test]
    fn test_identity_qform() {
        let mut header = header_3d([4, 4, 4]);
        header.sform_code = 0;
        header.qform_code = 1;
        header.qoffset = [1.0, 2.0, 3.0];
        let affine = header.affine();
        assert_eq!(affine[0], [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(affine[1], [0.0, 2.0, 0.0, 2.0]);
        assert_eq!(affine[2], [0.0, 0.0, 3.0, 3.0]);
    }
}
