//! Content-Disposition formatting and parsing.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Bytes escaped in an RFC 5987 `ext-value`: everything but unreserved characters.
const EXT_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Build an `attachment` disposition for a filename.
///
/// Quotes and backslashes are escaped and control characters replaced.
/// Non-ASCII names get an ASCII fallback plus an RFC 5987 `filename*`.
pub fn attachment_disposition(filename: &str) -> String {
    let fallback: String = filename
        .chars()
        .map(|c| match c {
            c if c.is_control() => '_',
            c if !c.is_ascii() => '_',
            c => c,
        })
        .collect::<String>()
        .replace('\\', "\\\\")
        .replace('"', "\\\"");

    if filename.is_ascii() {
        format!("attachment; filename=\"{fallback}\"")
    } else {
        format!(
            "attachment; filename=\"{fallback}\"; filename*=UTF-8''{}",
            percent_encode(filename)
        )
    }
}

/// Extract the filename from a Content-Disposition header value.
///
/// `filename*` wins over `filename` when both are present.
pub fn filename_from_disposition(header: &str) -> Option<String> {
    let mut plain = None;
    let mut extended = None;

    for param in split_params(header).into_iter().skip(1) {
        let Some((name, value)) = param.split_once('=') else {
            continue;
        };
        let name = name.trim().to_ascii_lowercase();
        let value = value.trim();
        match name.as_str() {
            "filename" => plain = Some(unquote(value)),
            "filename*" => extended = decode_extended(value),
            _ => {}
        }
    }

    extended.or(plain).filter(|f| !f.is_empty())
}

/// Split on `;` outside quoted strings.
fn split_params(header: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    let mut escaped = false;
    for (i, c) in header.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            ';' if !in_quotes => {
                parts.push(&header[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&header[start..]);
    parts
}

fn unquote(value: &str) -> String {
    let Some(inner) = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
    else {
        return value.to_string();
    };
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Decode `charset'lang'percent-encoded`. Only UTF-8 is accepted.
fn decode_extended(value: &str) -> Option<String> {
    let mut pieces = value.splitn(3, '\'');
    let charset = pieces.next()?;
    let _language = pieces.next()?;
    let encoded = pieces.next()?;
    if !charset.eq_ignore_ascii_case("utf-8") {
        return None;
    }
    percent_decode(encoded)
}

fn percent_encode(value: &str) -> String {
    utf8_percent_encode(value, EXT_VALUE).to_string()
}

fn percent_decode(value: &str) -> Option<String> {
    percent_decode_str(value)
        .decode_utf8()
        .ok()
        .map(|decoded| decoded.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_plain_filename() {
        assert_eq!(
            attachment_disposition("greeting.txt"),
            "attachment; filename=\"greeting.txt\""
        );
    }

    #[test]
    fn escapes_quotes_and_controls() {
        assert_eq!(
            attachment_disposition("a\"b\r\n.txt"),
            "attachment; filename=\"a\\\"b__.txt\""
        );
    }

    #[test]
    fn non_ascii_gets_extended_parameter() {
        let header = attachment_disposition("résumé.pdf");
        assert!(header.starts_with("attachment; filename=\"r_sum_.pdf\""));
        assert!(header.ends_with("filename*=UTF-8''r%C3%A9sum%C3%A9.pdf"));
        assert_eq!(filename_from_disposition(&header).unwrap(), "résumé.pdf");
    }

    #[test]
    fn parses_quoted_and_bare_filenames() {
        assert_eq!(
            filename_from_disposition("attachment; filename=\"report.pdf\"").unwrap(),
            "report.pdf"
        );
        assert_eq!(
            filename_from_disposition("attachment; filename=report.pdf").unwrap(),
            "report.pdf"
        );
        assert_eq!(
            filename_from_disposition("attachment; filename=\"semi;colon \\\"q\\\".txt\"").unwrap(),
            "semi;colon \"q\".txt"
        );
    }

    #[test]
    fn missing_filename_is_none() {
        assert_eq!(filename_from_disposition("attachment"), None);
        assert_eq!(filename_from_disposition("inline; size=12"), None);
        assert_eq!(filename_from_disposition("attachment; filename=\"\""), None);
    }

    #[test]
    fn extended_filename_must_be_utf8() {
        assert_eq!(
            filename_from_disposition("attachment; filename*=UTF-8''%FF%FE.bin"),
            None
        );
        assert_eq!(
            filename_from_disposition("attachment; filename=\"x.txt\"; filename*=UTF-8''%E2%82%AC%20rates.txt")
                .unwrap(),
            "€ rates.txt"
        );
    }

    #[test]
    fn formatted_header_round_trips() {
        for name in ["json", "a \"quoted\" name.txt", "back\\slash"] {
            assert_eq!(
                filename_from_disposition(&attachment_disposition(name)).as_deref(),
                Some(name)
            );
        }
    }
}
