use crate::config::SiteConfig;

/// Canonicalizes raw request paths into the comparable form used by the
/// rule indices
///
/// The normalizer owns the site context (virtual folder, start item, page
/// extension) captured once at construction; it holds no other state and
/// every method is a pure string transformation.
#[derive(Debug, Clone)]
pub struct UrlNormalizer {
    /// Virtual folder prefix, lower-cased ("" when the site has none)
    virtual_folder: String,

    /// Site start item prefix, lower-cased
    start_item: String,

    /// Page extension token, including the leading dot
    page_extension: String,
}

impl UrlNormalizer {
    /// Creates a normalizer from the site configuration
    ///
    /// Prefixes are lower-cased here so the strip comparisons in
    /// [`normalize`](Self::normalize) work against already-lowered paths.
    pub fn new(site: &SiteConfig) -> Self {
        Self {
            virtual_folder: site.virtual_folder.to_lowercase(),
            start_item: site.start_item.to_lowercase(),
            page_extension: site.page_extension.to_lowercase(),
        }
    }

    /// Normalizes a raw request path into its canonical comparable form
    ///
    /// # Normalization Steps
    ///
    /// 1. Empty input stays empty; a bare `/` passes through untouched
    /// 2. Lower-case the path
    /// 3. Decode separators: `_` and `-` both become spaces
    /// 4. Trim trailing slashes
    /// 5. Guarantee a leading slash
    /// 6. Strip the virtual-folder prefix, then the start-item prefix, when
    ///    the path begins with them followed by `/` or end-of-string
    ///
    /// The result is idempotent: `normalize(normalize(x)) == normalize(x)`.
    pub fn normalize(&self, path: &str) -> String {
        if path.is_empty() {
            return String::new();
        }

        let mut url = path.to_string();
        if url != "/" {
            url = decode_url(&url.to_lowercase());
            url = url.trim_end_matches('/').to_string();
        }

        if !url.starts_with('/') {
            url = format!("/{}", url);
        }

        let url = strip_start_path(&url, &self.virtual_folder);
        strip_start_path(&url, &self.start_item)
    }

    /// Appends the page extension if not already present
    ///
    /// Used to build exact-tier comparands.
    pub fn check_page_extension(&self, url: &str) -> String {
        if !url.is_empty() && !url.ends_with(&self.page_extension) {
            format!("{}{}", url, self.page_extension)
        } else {
            url.to_string()
        }
    }

    /// Strips the page extension if present
    ///
    /// Used to build prefix- and regex-tier comparands.
    pub fn remove_page_extension(&self, url: &str) -> String {
        match url.strip_suffix(&self.page_extension) {
            Some(stripped) => stripped.to_string(),
            None => url.to_string(),
        }
    }

    /// Encodes a path for output by replacing spaces with `-`
    pub fn encode_url(&self, url: &str) -> String {
        url.replace(' ', "-")
    }

    /// Returns the virtual-folder prefix ("" when the site has none)
    pub fn virtual_folder(&self) -> &str {
        &self.virtual_folder
    }
}

/// Decodes a path by replacing `_` and `-` separators with spaces
fn decode_url(url: &str) -> String {
    url.replace('_', " ").replace('-', " ")
}

/// Removes `start_path` from the front of `url` when it is followed by a
/// path separator or the end of the string
fn strip_start_path(url: &str, start_path: &str) -> String {
    if start_path.is_empty() {
        return url.to_string();
    }

    if let Some(rest) = url.strip_prefix(start_path) {
        if rest.is_empty() || rest.starts_with('/') {
            return rest.to_string();
        }
    }

    url.to_string()
}
