/// Maximum length of the title-derived portion of a download filename.
const MAX_SLUG_LEN: usize = 80;

/// Result of validating an upload filename.
#[derive(Debug)]
pub enum FilenameError {
    /// Filename is empty or whitespace-only.
    Empty,
    /// Filename contains path separators (`/` or `\`).
    ContainsPathSeparator,
    /// Filename contains path traversal patterns (`..`).
    PathTraversal,
    /// Filename contains null bytes.
    NullByte,
    /// Filename starts with a dot (hidden file).
    Hidden,
    /// Filename contains control characters (CR, LF, etc.).
    ControlCharacter,
}

impl FilenameError {
    /// Returns a human-readable error message.
    pub fn message(&self) -> &'static str {
        match self {
            Self::Empty => "Filename cannot be empty",
            Self::ContainsPathSeparator => "Invalid filename: path separators are not allowed",
            Self::PathTraversal => "Invalid filename: '..' is not allowed",
            Self::NullByte => "Invalid filename: null bytes are not allowed",
            Self::Hidden => "Invalid filename: hidden files (starting with '.') are not allowed",
            Self::ControlCharacter => "Invalid filename: control characters are not allowed",
        }
    }
}

/// Validates a flat filename (no directory components allowed).
pub fn validate_flat_filename(filename: &str) -> Result<&str, FilenameError> {
    let trimmed = filename.trim();

    if trimmed.is_empty() {
        return Err(FilenameError::Empty);
    }

    if trimmed.contains('\0') {
        return Err(FilenameError::NullByte);
    }

    // Reject ASCII control characters to prevent
    // HTTP header injection (e.g. CRLF in Content-Disposition).
    if trimmed.chars().any(|c| c.is_ascii_control()) {
        return Err(FilenameError::ControlCharacter);
    }

    if trimmed.contains('/') || trimmed.contains('\\') {
        return Err(FilenameError::ContainsPathSeparator);
    }

    if trimmed == ".." {
        return Err(FilenameError::PathTraversal);
    }

    if trimmed.starts_with('.') {
        return Err(FilenameError::Hidden);
    }

    Ok(trimmed)
}

/// Build the download filename for a delivered artifact from the script
/// title and a short entitlement id.
///
/// The entitlement suffix keeps filenames distinct across licensees even for
/// the same script.
pub fn download_filename(title: &str, entitlement_id: &str) -> String {
    format!("{}-{entitlement_id}.pdf", slugify(title))
}

/// Collapse a free-form title into a filesystem-safe slug.
fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len().min(MAX_SLUG_LEN));
    let mut last_was_dash = false;
    for c in title.trim().chars() {
        if slug.len() >= MAX_SLUG_LEN {
            break;
        }
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_was_dash = false;
        } else if !last_was_dash && !slug.is_empty() {
            slug.push('-');
            last_was_dash = true;
        }
    }
    let trimmed = slug.trim_matches('-').to_string();
    if trimmed.is_empty() {
        "script".to_string()
    } else {
        trimmed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_flat_filename_accepts_valid_names() {
        assert!(validate_flat_filename("manuscript.pdf").is_ok());
        assert!(validate_flat_filename("A Doll's House.pdf").is_ok());
        assert!(validate_flat_filename("  padded.pdf  ").is_ok());
    }

    #[test]
    fn validate_flat_filename_rejects_empty() {
        assert!(matches!(
            validate_flat_filename(""),
            Err(FilenameError::Empty)
        ));
        assert!(matches!(
            validate_flat_filename("   "),
            Err(FilenameError::Empty)
        ));
    }

    #[test]
    fn validate_flat_filename_rejects_path_separators() {
        assert!(matches!(
            validate_flat_filename("dir/manuscript.pdf"),
            Err(FilenameError::ContainsPathSeparator)
        ));
        assert!(matches!(
            validate_flat_filename("dir\\manuscript.pdf"),
            Err(FilenameError::ContainsPathSeparator)
        ));
    }

    #[test]
    fn validate_flat_filename_rejects_path_traversal() {
        assert!(matches!(
            validate_flat_filename(".."),
            Err(FilenameError::PathTraversal)
        ));
    }

    #[test]
    fn validate_flat_filename_rejects_null_bytes() {
        assert!(matches!(
            validate_flat_filename("foo\0bar.pdf"),
            Err(FilenameError::NullByte)
        ));
    }

    #[test]
    fn validate_flat_filename_rejects_control_characters() {
        assert!(matches!(
            validate_flat_filename("file\r\nname.pdf"),
            Err(FilenameError::ControlCharacter)
        ));
    }

    #[test]
    fn validate_flat_filename_rejects_hidden_files() {
        assert!(matches!(
            validate_flat_filename(".hidden"),
            Err(FilenameError::Hidden)
        ));
    }

    #[test]
    fn download_filename_slugs_title_and_appends_id() {
        assert_eq!(
            download_filename("A Doll's House", "0193aaaa"),
            "a-doll-s-house-0193aaaa.pdf"
        );
        assert_eq!(
            download_filename("Hamlet", "ffff0000"),
            "hamlet-ffff0000.pdf"
        );
    }

    #[test]
    fn download_filename_survives_hostile_titles() {
        assert_eq!(
            download_filename("../../etc/passwd", "abcd1234"),
            "etc-passwd-abcd1234.pdf"
        );
        assert_eq!(download_filename("!!!", "abcd1234"), "script-abcd1234.pdf");
        assert_eq!(download_filename("", "abcd1234"), "script-abcd1234.pdf");
    }

    #[test]
    fn download_filename_truncates_long_titles() {
        let long_title = "word ".repeat(100);
        let name = download_filename(&long_title, "abcd1234");
        assert!(name.len() <= MAX_SLUG_LEN + "-abcd1234.pdf".len());
        assert!(name.ends_with("-abcd1234.pdf"));
    }
}
