//! NIfTI file I/O.
//!
//! `.nii` files are memory-mapped; `.nii.gz` files are decompressed in one
//! pass with a buffer sized from the gzip trailer. The format is chosen by
//! extension on both load and save.

use super::header::NiftiHeader;
use super::image::NiftiImage;
use crate::error::{Error, Result};
use flate2::bufread::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use memmap2::Mmap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

const GZIP_BUFFER_SIZE: usize = 256 * 1024;

/// Load a NIfTI image from file.
///
/// Supports both `.nii` and `.nii.gz` formats.
///
/// # Example
/// ```ignore
/// let img = volpair::nifti::load("sub1_Fixed.nii.gz")?;
/// println!("{:?}", img.shape());
/// ```
#[must_use = "this function returns a loaded image that should be used"]
pub fn load<P: AsRef<Path>>(path: P) -> Result<NiftiImage> {
    let path = path.as_ref();
    if is_gzipped(path) {
        load_gzipped(path)
    } else {
        load_uncompressed(path)
    }
}

/// Load only the header (fast metadata inspection).
pub fn load_header<P: AsRef<Path>>(path: P) -> Result<NiftiHeader> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let mut prefix = Vec::with_capacity(NiftiHeader::SIZE);
    if is_gzipped(path) {
        MultiGzDecoder::new(BufReader::new(file))
            .take(540)
            .read_to_end(&mut prefix)
            .map_err(|e| Error::Decompression(format!("gzip header decode failed: {e}")))?;
    } else {
        file.take(540).read_to_end(&mut prefix)?;
    }
    NiftiHeader::from_bytes(&prefix)
}

/// Save a NIfTI image to file (`.nii.gz` compresses, anything else is raw).
pub fn save<P: AsRef<Path>>(image: &NiftiImage, path: P) -> Result<()> {
    let path = path.as_ref();
    let header = image.header().for_writing();
    header.validate()?;

    let header_bytes = header.to_bytes();
    let padding = header.vox_offset as usize - header_bytes.len();
    let data = image.encode();

    let file = File::create(path)?;
    let writer = BufWriter::with_capacity(1024 * 1024, file);
    if is_gzipped(path) {
        let mut encoder = GzEncoder::new(writer, Compression::fast());
        write_payload(&mut encoder, &header_bytes, padding, &data)?;
        encoder.finish()?.flush()?;
    } else {
        let mut writer = writer;
        write_payload(&mut writer, &header_bytes, padding, &data)?;
        writer.flush()?;
    }
    Ok(())
}

fn write_payload<W: Write>(w: &mut W, header: &[u8], padding: usize, data: &[u8]) -> Result<()> {
    w.write_all(header)?;
    // Zeroed extension flag plus any alignment padding.
    w.write_all(&vec![0u8; padding])?;
    w.write_all(data)?;
    Ok(())
}

/// True for `.gz` paths.
pub fn is_gzipped(path: &Path) -> bool {
    path.extension().is_some_and(|e| e == "gz")
}

/// True for `.nii` and `.nii.gz` paths.
pub fn is_nifti_path(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with(".nii") || n.ends_with(".nii.gz"))
}

/// File name without the `.nii`/`.nii.gz` suffix (or the last extension for
/// other files).
pub fn nifti_stem(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    if let Some(stem) = name
        .strip_suffix(".nii.gz")
        .or_else(|| name.strip_suffix(".nii"))
    {
        return stem.to_string();
    }
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or(name)
}

#[allow(unsafe_code)]
fn load_uncompressed(path: &Path) -> Result<NiftiImage> {
    let file = File::open(path)?;
    // SAFETY: read-only map of a file we just opened; external modification
    // can only yield inconsistent values, not UB in safe code that copies out.
    let mmap = unsafe { Mmap::map(&file)? };
    decode_file_bytes(&mmap)
}

fn estimate_gzip_uncompressed_size(compressed: &[u8]) -> usize {
    // ISIZE per RFC 1952 (input size modulo 2^32).
    if compressed.len() >= 4 {
        let trailer = &compressed[compressed.len() - 4..];
        u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]) as usize
    } else {
        compressed.len() * 4
    }
}

fn load_gzipped(path: &Path) -> Result<NiftiImage> {
    let compressed = std::fs::read(path)?;
    let mut decoder = MultiGzDecoder::new(BufReader::with_capacity(
        GZIP_BUFFER_SIZE,
        compressed.as_slice(),
    ));
    let mut output = Vec::with_capacity(estimate_gzip_uncompressed_size(&compressed));
    decoder
        .read_to_end(&mut output)
        .map_err(|e| Error::Decompression(format!("gzip stream decode failed: {e}")))?;
    decode_file_bytes(&output)
}

fn decode_file_bytes(bytes: &[u8]) -> Result<NiftiImage> {
    let header = NiftiHeader::from_bytes(bytes)?;
    // Extensions, if any, sit between the header and vox_offset.
    let offset = header.vox_offset as usize;
    if bytes.len() < offset {
        return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "file truncated before voxel data",
        )));
    }
    NiftiImage::decode(header, &bytes[offset..])
}
