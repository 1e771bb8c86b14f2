/// Cover image bytes as extracted by a parser.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cover {
    pub data: Vec<u8>,
    pub mime_type: Option<String>,
    /// Page the cover was taken from (comics).
    pub page: Option<u32>,
}

impl Cover {
    /// The declared MIME type, normalized, or one sniffed from the bytes.
    pub fn resolved_mime(&self) -> Option<String> {
        self.mime_type
            .as_deref()
            .map(normalize_mime)
            .filter(|mime| cover_extension(mime).is_some())
            .or_else(|| infer::get(&self.data).map(|kind| normalize_mime(kind.mime_type())))
    }
}

/// Lowercase and fold common aliases onto their registered names.
pub fn normalize_mime(mime: &str) -> String {
    let lower = mime.split(';').next().unwrap_or(mime).trim().to_lowercase();
    match lower.as_str() {
        "image/jpg" | "image/pjpeg" => "image/jpeg".to_string(),
        "image/x-png" => "image/png".to_string(),
        _ => lower,
    }
}

/// File extension for a supported cover MIME type.
pub fn cover_extension(mime: &str) -> Option<&'static str> {
    match normalize_mime(mime).as_str() {
        "image/jpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const PNG_MAGIC: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D];

    #[rstest]
    #[case("image/jpg", Some("jpg"))]
    #[case("IMAGE/JPEG", Some("jpg"))]
    #[case("image/png; charset=binary", Some("png"))]
    #[case("image/webp", Some("webp"))]
    #[case("application/pdf", None)]
    fn test_cover_extension(#[case] mime: &str, #[case] expected: Option<&str>) {
        assert_eq!(cover_extension(mime), expected);
    }

    #[test]
    fn test_sniffs_when_mime_missing() {
        let cover = Cover { data: PNG_MAGIC.to_vec(), mime_type: None, page: None };
        assert_eq!(cover.resolved_mime().as_deref(), Some("image/png"));
    }

    #[test]
    fn test_sniffs_when_mime_unsupported() {
        let cover = Cover { data: PNG_MAGIC.to_vec(), mime_type: Some("application/octet-stream".into()), page: None };
        assert_eq!(cover.resolved_mime().as_deref(), Some("image/png"));
    }
}
