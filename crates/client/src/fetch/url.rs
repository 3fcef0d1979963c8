//! Tile URL templating.
//!
//! Templates carry `{zoom}`, `{x}` and `{y}` placeholders, e.g.
//! `https://a.tile.openstreetmap.org/{zoom}/{x}/{y}.png`.

/// Error type for tile URL rendering failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL template")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("URL template has no {0} placeholder")]
    MissingPlaceholder(&'static str),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

const PLACEHOLDERS: [&str; 3] = ["{zoom}", "{x}", "{y}"];

/// Substitute tile coordinates into `template` and parse the result.
///
/// The template must use every placeholder and produce an http(s) URL.
pub fn render(template: &str, x: u32, y: u32, zoom: u8) -> Result<url::Url, UrlError> {
    let template = template.trim();
    if template.is_empty() {
        return Err(UrlError::Empty);
    }

    if let Some(missing) = PLACEHOLDERS.iter().find(|p| !template.contains(*p)) {
        return Err(UrlError::MissingPlaceholder(*missing));
    }

    let rendered = template
        .replace("{zoom}", &zoom.to_string())
        .replace("{x}", &x.to_string())
        .replace("{y}", &y.to_string());

    let parsed = url::Url::parse(&rendered).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        scheme => Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_basic() {
        let url = render("http://a.tile.openstreetmap.org/{zoom}/{x}/{y}.png", 5, 10, 20).unwrap();
        assert_eq!(url.as_str(), "http://a.tile.openstreetmap.org/20/5/10.png");
    }

    #[test]
    fn test_render_query_placeholders() {
        let url = render("https://tiles.example/t?z={zoom}&x={x}&y={y}", 1, 2, 3).unwrap();
        assert_eq!(url.query(), Some("z=3&x=1&y=2"));
    }

    #[test]
    fn test_render_lowercases_host() {
        let url = render("https://TILES.Example/{zoom}/{x}/{y}", 0, 0, 0).unwrap();
        assert_eq!(url.host_str(), Some("tiles.example"));
    }

    #[test]
    fn test_render_empty() {
        assert!(matches!(render("  ", 0, 0, 0), Err(UrlError::Empty)));
    }

    #[test]
    fn test_render_missing_placeholder() {
        let result = render("https://tiles.example/{zoom}/{x}.png", 0, 0, 0);
        assert!(matches!(result, Err(UrlError::MissingPlaceholder("{y}"))));
    }

    #[test]
    fn test_render_unsupported_scheme() {
        let result = render("ftp://tiles.example/{zoom}/{x}/{y}", 0, 0, 0);
        assert!(matches!(result, Err(UrlError::UnsupportedScheme(_))));
    }

    #[test]
    fn test_render_invalid() {
        let result = render("not a url {zoom}{x}{y}", 0, 0, 0);
        assert!(matches!(result, Err(UrlError::InvalidUrl(_))));
    }
}
