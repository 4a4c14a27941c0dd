//! Image reference resolution for logos and covers.

/// Public bucket holding business images.
const GALLERY_BUCKET: &str = "galeriacomercios";

/// Placeholder object used when a record has no image.
const PLACEHOLDER_PATH: &str = "storage/v1/object/public/imagenesapp/enpr/imgLogoNoDisponible.jpg";

/// Turns stored image references into public URLs.
#[derive(Debug, Clone)]
pub struct ImageResolver {
    base: String,
}

impl ImageResolver {
    /// Resolver for a storage host such as `https://project.supabase.co`.
    pub fn new(base: impl Into<String>) -> Self {
        let base = base.into();
        Self {
            base: base.trim_end_matches('/').to_string(),
        }
    }

    /// URL shown when a record has no image.
    pub fn placeholder(&self) -> String {
        format!("{}/{PLACEHOLDER_PATH}", self.base)
    }

    /// Absolute `http(s)` URLs pass through; relative paths are placed in the
    /// gallery bucket after dropping a leading `public/` and slashes; empty
    /// references become the placeholder.
    pub fn resolve(&self, reference: Option<&str>) -> String {
        let raw = reference.map(str::trim).unwrap_or_default();
        if raw.is_empty() {
            return self.placeholder();
        }
        if is_absolute_url(raw) {
            return raw.to_string();
        }

        let path = strip_prefix_ignore_case(raw, "public/").unwrap_or(raw);
        let path = path.trim_start_matches('/');
        format!("{}/storage/v1/object/public/{GALLERY_BUCKET}/{path}", self.base)
    }
}

fn is_absolute_url(raw: &str) -> bool {
    strip_prefix_ignore_case(raw, "http://").is_some()
        || strip_prefix_ignore_case(raw, "https://").is_some()
}

fn strip_prefix_ignore_case<'a>(raw: &'a str, prefix: &str) -> Option<&'a str> {
    let head = raw.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then(|| &raw[prefix.len()..])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> ImageResolver {
        ImageResolver::new("https://project.supabase.co/")
    }

    #[test]
    fn test_absolute_url_kept() {
        let url = "HTTPS://cdn.example.com/logo.png";
        assert_eq!(resolver().resolve(Some(url)), url);
    }

    #[test]
    fn test_relative_path_joined() {
        assert_eq!(
            resolver().resolve(Some("public/42/logo.png")),
            "https://project.supabase.co/storage/v1/object/public/galeriacomercios/42/logo.png"
        );
        assert_eq!(
            resolver().resolve(Some("//42/portada.jpg")),
            "https://project.supabase.co/storage/v1/object/public/galeriacomercios/42/portada.jpg"
        );
    }

    #[test]
    fn test_empty_reference_is_placeholder() {
        assert_eq!(resolver().resolve(None), resolver().placeholder());
        assert_eq!(resolver().resolve(Some("   ")), resolver().placeholder());
        assert!(resolver().placeholder().ends_with("imgLogoNoDisponible.jpg"));
    }
}
