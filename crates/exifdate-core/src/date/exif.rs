use chrono::NaiveDateTime;
use exif::{Field, Value};

/// Raw text of an ASCII tag, without trailing NULs or padding.
pub fn ascii_value(field: &Field) -> String {
    match field.value {
        Value::Ascii(ref parts) => parts
            .first()
            .map(|bytes| String::from_utf8_lossy(bytes).trim_end_matches('\0').trim().to_string())
            .unwrap_or_default(),
        _ => field.display_value().to_string(),
    }
}

/// Parse an EXIF datetime leniently. Cameras write odd separators and blank
/// placeholders like `    :  :     :  :  `; those yield `None`.
pub fn parse_exif_datetime(s: &str) -> Option<NaiveDateTime> {
    let cleaned = s
        .trim()
        .replace('-', ":")
        .replace('/', ":")
        .replace('\\', ":")
        .replace('.', ":");

    if let Ok(dt) = NaiveDateTime::parse_from_str(&cleaned, "%Y:%m:%d %H:%M:%S") {
        return Some(dt);
    }

    if let Ok(d) = chrono::NaiveDate::parse_from_str(cleaned.split(' ').next()?, "%Y:%m:%d") {
        return d.and_hms_opt(0, 0, 0);
    }

    None
}
