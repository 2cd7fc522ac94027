use std::fs::{self, File};
use std::io::{self, BufReader, Cursor, Write};
use std::ops::Range;
use std::path::Path;

use exif::experimental::Writer;
use exif::{Exif, Field, In, Reader, Tag, Value};

use super::{MetadataStore, ReadError, RecordedDate, WriteError};
use crate::date::{self, ExtractedDate};

const EXIF_ID: &[u8] = b"Exif\0\0";

/// The tags that all receive the inferred date.
const DATE_TAGS: [Tag; 3] = [Tag::DateTime, Tag::DateTimeOriginal, Tag::DateTimeDigitized];

/// Largest payload a JPEG segment length field can describe.
const MAX_SEGMENT_PAYLOAD: usize = u16::MAX as usize - 2;

mod marker {
    pub const P: u8 = 0xff;
    pub const SOI: u8 = 0xd8;
    pub const EOI: u8 = 0xd9;
    pub const SOS: u8 = 0xda;
    pub const TEM: u8 = 0x01;
    pub const RST0: u8 = 0xd0;
    pub const RST7: u8 = 0xd7;
    pub const APP0: u8 = 0xe0;
    pub const APP1: u8 = 0xe1;
}

/// EXIF store over image files on disk.
///
/// Reads any container kamadak-exif understands. Writes only JPEG, by
/// re-serializing the Exif block and swapping the APP1 segment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExifFileStore;

impl ExifFileStore {
    pub fn new() -> Self {
        Self
    }
}

impl MetadataStore for ExifFileStore {
    fn read_original_date(&self, path: &Path) -> Result<Option<RecordedDate>, ReadError> {
        let file = File::open(path).map_err(|source| ReadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut reader = BufReader::new(file);

        let exif = match Reader::new().read_from_container(&mut reader) {
            Ok(exif) => exif,
            Err(exif::Error::NotFound(_)) => return Ok(None),
            Err(exif::Error::Io(source)) => {
                return Err(ReadError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
            Err(e) => {
                return Err(ReadError::Malformed {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                })
            }
        };

        Ok(exif
            .get_field(Tag::DateTimeOriginal, In::PRIMARY)
            .map(|field| RecordedDate::new(date::exif::ascii_value(field))))
    }

    fn write_dates(&self, path: &Path, date: &ExtractedDate) -> Result<(), WriteError> {
        let bytes = fs::read(path).map_err(|source| WriteError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let layout = JpegLayout::parse(&bytes).map_err(|reason| WriteError::UnsupportedContainer {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        })?;

        let existing = layout.exif_index.map(|i| {
            let payload = &bytes[layout.segments[i].payload.clone()];
            &payload[EXIF_ID.len()..]
        });

        let block = build_exif_block(existing, date).map_err(|e| WriteError::Failed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        if block.len() > MAX_SEGMENT_PAYLOAD {
            return Err(WriteError::Failed {
                path: path.to_path_buf(),
                reason: format!("Exif block of {} bytes does not fit in one APP1 segment", block.len()),
            });
        }

        let updated = layout.splice(&bytes, &block);
        replace_file(path, &updated)
    }
}

/// One marker segment before the scan data.
struct Segment {
    marker: u8,
    /// Whole segment, starting at its 0xFF prefix.
    span: Range<usize>,
    payload: Range<usize>,
}

/// Header segments of a JPEG file. Everything from SOS (or EOI) onwards is
/// kept as an opaque tail.
struct JpegLayout {
    segments: Vec<Segment>,
    exif_index: Option<usize>,
    tail_start: usize,
}

impl JpegLayout {
    fn parse(bytes: &[u8]) -> Result<Self, &'static str> {
        if !bytes.starts_with(&[marker::P, marker::SOI]) {
            return Err("not a JPEG file");
        }

        let mut segments = Vec::new();
        let mut pos = 2;
        loop {
            if bytes.get(pos) != Some(&marker::P) {
                return Err("expected a marker");
            }
            let mut code_pos = pos + 1;
            while bytes.get(code_pos) == Some(&marker::P) {
                code_pos += 1;
            }
            let code = *bytes.get(code_pos).ok_or("truncated JPEG")?;

            match code {
                marker::SOS | marker::EOI => break,
                marker::TEM | marker::RST0..=marker::RST7 => {
                    segments.push(Segment {
                        marker: code,
                        span: pos..code_pos + 1,
                        payload: code_pos + 1..code_pos + 1,
                    });
                    pos = code_pos + 1;
                    continue;
                }
                _ => {}
            }

            let len = bytes
                .get(code_pos + 1..code_pos + 3)
                .map(|b| u16::from_be_bytes([b[0], b[1]]) as usize)
                .ok_or("truncated segment header")?;
            if len < 2 {
                return Err("invalid segment length");
            }
            let end = code_pos + 1 + len;
            if end > bytes.len() {
                return Err("truncated segment");
            }
            segments.push(Segment {
                marker: code,
                span: pos..end,
                payload: code_pos + 3..end,
            });
            pos = end;
        }

        let exif_index = segments
            .iter()
            .position(|s| s.marker == marker::APP1 && bytes[s.payload.clone()].starts_with(EXIF_ID));

        Ok(Self {
            segments,
            exif_index,
            tail_start: pos,
        })
    }

    /// Rebuild the file with `block` as its only Exif APP1 segment: in place
    /// of the old one, or right after the leading APP0 (JFIF) segments.
    fn splice(&self, bytes: &[u8], block: &[u8]) -> Vec<u8> {
        let insert_at = self.exif_index.unwrap_or_else(|| {
            self.segments
                .iter()
                .take_while(|s| s.marker == marker::APP0)
                .count()
        });

        let mut app1 = Vec::with_capacity(block.len() + 4);
        app1.extend_from_slice(&[marker::P, marker::APP1]);
        app1.extend_from_slice(&((block.len() + 2) as u16).to_be_bytes());
        app1.extend_from_slice(block);

        let mut out = Vec::with_capacity(bytes.len() + app1.len());
        out.extend_from_slice(&bytes[..2]);
        for (i, seg) in self.segments.iter().enumerate() {
            if i == insert_at {
                out.extend_from_slice(&app1);
            }
            let is_exif = seg.marker == marker::APP1 && bytes[seg.payload.clone()].starts_with(EXIF_ID);
            if !is_exif {
                out.extend_from_slice(&bytes[seg.span.clone()]);
            }
        }
        if insert_at >= self.segments.len() {
            out.extend_from_slice(&app1);
        }
        out.extend_from_slice(&bytes[self.tail_start..]);
        out
    }
}

/// Serialize an Exif block (with the `Exif\0\0` header) holding the existing
/// fields plus the three date tags set to `date`.
fn build_exif_block(existing: Option<&[u8]>, date: &ExtractedDate) -> Result<Vec<u8>, exif::Error> {
    let parsed = existing.map(|tiff| Reader::new().read_raw(tiff.to_vec())).transpose()?;

    let value = date.to_exif_string();
    let date_fields: Vec<Field> = DATE_TAGS
        .iter()
        .map(|&tag| Field {
            tag,
            ifd_num: In::PRIMARY,
            value: Value::Ascii(vec![value.clone().into_bytes()]),
        })
        .collect();

    let mut writer = Writer::new();
    let mut little_endian = false;
    if let Some(exif) = &parsed {
        little_endian = exif.little_endian();
        for field in exif.fields().filter(|f| is_carried_over(f)) {
            writer.push_field(field);
        }
        if let Some(jpeg) = thumbnail(exif) {
            writer.set_jpeg(jpeg, In::THUMBNAIL);
        }
    }
    for field in &date_fields {
        writer.push_field(field);
    }

    let mut tiff = Cursor::new(Vec::new());
    writer.write(&mut tiff, little_endian)?;

    let mut block = EXIF_ID.to_vec();
    block.extend_from_slice(&tiff.into_inner());
    Ok(block)
}

fn is_carried_over(field: &Field) -> bool {
    if field.ifd_num != In::PRIMARY && field.ifd_num != In::THUMBNAIL {
        return false;
    }
    if field.ifd_num == In::PRIMARY && DATE_TAGS.contains(&field.tag) {
        return false;
    }
    !matches!(field.value, Value::Unknown(..))
}

fn thumbnail(exif: &Exif) -> Option<&[u8]> {
    let offset = exif
        .get_field(Tag::JPEGInterchangeFormat, In::THUMBNAIL)?
        .value
        .get_uint(0)? as usize;
    let len = exif
        .get_field(Tag::JPEGInterchangeFormatLength, In::THUMBNAIL)?
        .value
        .get_uint(0)? as usize;
    exif.buf().get(offset..offset.checked_add(len)?)
}

/// Write to a sibling temp file, then rename over the original.
fn replace_file(path: &Path, contents: &[u8]) -> Result<(), WriteError> {
    let io_error = |source: io::Error| WriteError::Io {
        path: path.to_path_buf(),
        source,
    };

    let permissions = fs::metadata(path).map_err(io_error)?.permissions();
    let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("image");
    let temp_path = path.with_file_name(format!(".{}.exifdate.tmp", file_name));

    let result = (|| -> io::Result<()> {
        let mut file = File::create(&temp_path)?;
        file.write_all(contents)?;
        file.sync_all()?;
        drop(file);
        fs::set_permissions(&temp_path, permissions)?;
        fs::rename(&temp_path, path)
    })();

    if let Err(source) = result {
        let _ = fs::remove_file(&temp_path);
        return Err(io_error(source));
    }
    Ok(())
}
