/// One file part of a multipart/form-data body.
#[derive(Debug, Clone, PartialEq)]
pub struct FilePart {
    pub field_name: Option<String>,
    /// As sent by the client; directory uploads include the folder path.
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Returns the index of the first occurrence of `needle` in `haystack`.
pub fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Splits `haystack` on every occurrence of `needle`, returning the pieces
/// between occurrences (excluding the needle itself).
pub fn split_on<'a>(haystack: &'a [u8], needle: &[u8]) -> Vec<&'a [u8]> {
    let mut result = Vec::new();
    let mut start = 0;
    while start <= haystack.len() {
        if let Some(pos) = find_subsequence(&haystack[start..], needle) {
            result.push(&haystack[start..start + pos]);
            start += pos + needle.len();
        } else {
            result.push(&haystack[start..]);
            break;
        }
    }
    result
}

/// Extracts the boundary token from a Content-Type header value like
/// `multipart/form-data; boundary=----WebKitFormBoundaryXXX`.
pub fn extract_boundary(content_type: &str) -> Option<String> {
    content_type
        .split(';')
        .map(|s| s.trim())
        .find(|s| s.starts_with("boundary="))
        .map(|s| s["boundary=".len()..].trim_matches('"').to_owned())
}

/// Extracts every file part (those with a `filename=` attribute) in order.
pub fn extract_files(body: &[u8], boundary: &str) -> Vec<FilePart> {
    let delimiter = format!("--{}", boundary);
    let sep = b"\r\n\r\n";
    let mut files = Vec::new();

    for part in split_on(body, delimiter.as_bytes()) {
        let Some(sep_pos) = find_subsequence(part, sep) else { continue };
        let headers = String::from_utf8_lossy(&part[..sep_pos]);
        let Some(filename) = header_param(&headers, "filename") else { continue };

        let raw = &part[sep_pos + sep.len()..];
        let data = raw.strip_suffix(b"\r\n").unwrap_or(raw);
        files.push(FilePart {
            field_name: header_param(&headers, "name"),
            filename,
            content_type: part_content_type(&headers),
            bytes: data.to_vec(),
        });
    }
    files
}

/// Reads `key="value"` from the part's Content-Disposition line.
fn header_param(headers: &str, key: &str) -> Option<String> {
    let disposition = headers
        .lines()
        .find(|l| l.to_ascii_lowercase().starts_with("content-disposition:"))?;
    disposition.split(';').map(str::trim).find_map(|attr| {
        let (k, v) = attr.split_once('=')?;
        (k.trim().eq_ignore_ascii_case(key)).then(|| v.trim().trim_matches('"').to_owned())
    })
}

fn part_content_type(headers: &str) -> Option<String> {
    headers.lines().find_map(|l| {
        let (k, v) = l.split_once(':')?;
        k.trim().eq_ignore_ascii_case("content-type").then(|| v.trim().to_owned())
    })
}
