use crate::build::*;

use flate2::read::{DeflateDecoder, GzDecoder};
use flate2::Crc;
use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

const EOCD_SIGNATURE: u32 = 0x0605_4b50;
const CENTRAL_SIGNATURE: u32 = 0x0201_4b50;
const LOCAL_SIGNATURE: u32 = 0x0403_4b50;
const EOCD_LEN: usize = 22;
const CENTRAL_LEN: usize = 46;
const LOCAL_LEN: usize = 30;
const MAX_COMMENT_LEN: usize = 0xffff;

const METHOD_STORED: u16 = 0;
const METHOD_DEFLATE: u16 = 8;

/// Reads the bytes of a metadata source.
///
/// `.gz` files are decompressed, and for `.zip` archives only `archive_entry` is extracted.
/// Anything else is read as is.
pub fn read_source(path: &Path, archive_entry: &str) -> BuildResult<Vec<u8>> {
    let p = path.display().to_string();
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match extension.as_deref() {
        Some("zip") => extract_zip_entry(path, archive_entry),
        Some("gz") => {
            let file = File::open(path).context(OpeningFileSnafu { path: p.clone() })?;
            let mut res: Vec<u8> = Vec::new();
            GzDecoder::new(file)
                .read_to_end(&mut res)
                .context(DecompressingSnafu { path: p })?;
            Ok(res)
        }
        _ => fs::read(path).context(OpeningFileSnafu { path: p }),
    }
}

fn u16_at(buf: &[u8], offset: usize, path: &str) -> BuildResult<u16> {
    let b = buf.get(offset..offset + 2).context(ArchiveSnafu {
        path,
        reason: "truncated record",
    })?;
    Ok(u16::from_le_bytes([b[0], b[1]]))
}

fn u32_at(buf: &[u8], offset: usize, path: &str) -> BuildResult<u32> {
    let b = buf.get(offset..offset + 4).context(ArchiveSnafu {
        path,
        reason: "truncated record",
    })?;
    Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

fn read_at(file: &mut File, offset: u64, len: usize, path: &str) -> BuildResult<Vec<u8>> {
    file.seek(SeekFrom::Start(offset))
        .context(OpeningFileSnafu { path })?;
    let mut buf = vec![0u8; len];
    file.read_exact(&mut buf)
        .context(OpeningFileSnafu { path })?;
    Ok(buf)
}

// Sizes and offsets come from the archive itself: they are checked against
// the file before anything is allocated.
fn check_within(
    offset: u64,
    len: u64,
    file_len: u64,
    path: &str,
    what: &str,
) -> BuildResult<()> {
    ensure!(
        offset.checked_add(len).map_or(false, |end| end <= file_len),
        ArchiveSnafu {
            path,
            reason: format!("{} runs past the end of the file", what)
        }
    );
    Ok(())
}

struct ZipEntry {
    method: u16,
    crc32: u32,
    compressed_size: u64,
    uncompressed_size: u64,
    local_offset: u64,
}

// Walks the central directory, without reading any entry data.
fn find_entry(file: &mut File, file_len: u64, path: &str, entry: &str) -> BuildResult<ZipEntry> {
    ensure!(
        file_len >= EOCD_LEN as u64,
        ArchiveSnafu {
            path,
            reason: "file too short"
        }
    );
    // The end record is followed by a comment of at most 64k.
    let tail_len = file_len.min((EOCD_LEN + MAX_COMMENT_LEN) as u64) as usize;
    let tail = read_at(file, file_len - tail_len as u64, tail_len, path)?;
    let eocd = (0..=tail_len - EOCD_LEN)
        .rev()
        .find(|&i| tail[i..i + 4] == EOCD_SIGNATURE.to_le_bytes())
        .context(ArchiveSnafu {
            path,
            reason: "end of central directory not found",
        })?;

    let num_entries = u16_at(&tail, eocd + 10, path)?;
    let dir_size = u32_at(&tail, eocd + 12, path)?;
    let dir_offset = u32_at(&tail, eocd + 16, path)? as u64;
    check_within(dir_offset, dir_size as u64, file_len, path, "central directory")?;
    let dir = read_at(file, dir_offset, dir_size as usize, path)?;

    let mut offset = 0;
    for _ in 0..num_entries {
        ensure!(
            u32_at(&dir, offset, path)? == CENTRAL_SIGNATURE,
            ArchiveSnafu {
                path,
                reason: "invalid central directory entry"
            }
        );
        let name_len = u16_at(&dir, offset + 28, path)? as usize;
        let extra_len = u16_at(&dir, offset + 30, path)? as usize;
        let comment_len = u16_at(&dir, offset + 32, path)? as usize;
        let name = dir
            .get(offset + CENTRAL_LEN..offset + CENTRAL_LEN + name_len)
            .context(ArchiveSnafu {
                path,
                reason: "truncated file name",
            })?;
        if name == entry.as_bytes() {
            return Ok(ZipEntry {
                method: u16_at(&dir, offset + 10, path)?,
                crc32: u32_at(&dir, offset + 16, path)?,
                compressed_size: u32_at(&dir, offset + 20, path)? as u64,
                uncompressed_size: u32_at(&dir, offset + 24, path)? as u64,
                local_offset: u32_at(&dir, offset + 42, path)? as u64,
            });
        }
        offset += CENTRAL_LEN + name_len + extra_len + comment_len;
    }
    ArchiveEntryMissingSnafu { path, entry }.fail()
}

/// Extracts a single entry from a zip archive. The other entries are never read.
///
/// The size and the CRC-32 of the extracted bytes must match the central directory.
pub fn extract_zip_entry(path: &Path, entry: &str) -> BuildResult<Vec<u8>> {
    let p = path.display().to_string();
    let mut file = File::open(path).context(OpeningFileSnafu { path: p.clone() })?;
    let file_len = file
        .metadata()
        .context(OpeningFileSnafu { path: p.clone() })?
        .len();
    let info = find_entry(&mut file, file_len, &p, entry)?;

    // The local header repeats the name, with its own extra field length.
    check_within(info.local_offset, LOCAL_LEN as u64, file_len, &p, "local file header")?;
    let local = read_at(&mut file, info.local_offset, LOCAL_LEN, &p)?;
    ensure!(
        u32_at(&local, 0, &p)? == LOCAL_SIGNATURE,
        ArchiveSnafu {
            path: p.clone(),
            reason: "invalid local file header"
        }
    );
    let name_len = u16_at(&local, 26, &p)? as u64;
    let extra_len = u16_at(&local, 28, &p)? as u64;
    let data_offset = info.local_offset + LOCAL_LEN as u64 + name_len + extra_len;
    check_within(data_offset, info.compressed_size, file_len, &p, "entry data")?;
    let data = read_at(&mut file, data_offset, info.compressed_size as usize, &p)?;

    let res = match info.method {
        METHOD_STORED => data,
        METHOD_DEFLATE => {
            let mut res: Vec<u8> = Vec::new();
            // One byte past the recorded size is enough to detect a mismatch.
            DeflateDecoder::new(data.as_slice())
                .take(info.uncompressed_size + 1)
                .read_to_end(&mut res)
                .context(DecompressingSnafu { path: p.clone() })?;
            res
        }
        method => {
            return ArchiveSnafu {
                path: p,
                reason: format!("unsupported compression method {}", method),
            }
            .fail()
        }
    };

    ensure!(
        res.len() as u64 == info.uncompressed_size,
        ArchiveSnafu {
            path: p.clone(),
            reason: format!(
                "entry {} has {} bytes, expected {}",
                entry,
                res.len(),
                info.uncompressed_size
            )
        }
    );
    let mut crc = Crc::new();
    crc.update(&res);
    ensure!(
        crc.sum() == info.crc32,
        ArchiveSnafu {
            path: p,
            reason: format!("CRC-32 mismatch in entry {}", entry)
        }
    );
    Ok(res)
}
