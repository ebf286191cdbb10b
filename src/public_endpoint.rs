use crate::{config::PublicEndpoint, domain::track::Track};

/// returns the base url media links are resolved against:
/// the configured endpoint, otherwise the host the client talked to
pub fn media_base(conf: Option<&PublicEndpoint>, host: Option<&str>) -> Option<String> {
    conf.map(|c| c.base_url.trim_end_matches('/').to_string())
        .or_else(|| host.filter(|h| !h.is_empty()).map(|h| format!("http://{h}")))
}

/// turns a relative media path into an absolute url; absolute urls are kept
pub fn absolute_url(base: &str, path: &str) -> String {
    let lower = path.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        return path.to_string();
    }
    let base = base.trim_end_matches('/');
    if path.starts_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}

pub fn resolve_track_urls(track: &mut Track, base: &str) {
    for field in [&mut track.url, &mut track.cover] {
        if let Some(path) = field.as_mut() {
            *path = absolute_url(base, path);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        config::PublicEndpoint,
        domain::track::Track,
        public_endpoint::{absolute_url, media_base, resolve_track_urls},
    };

    fn endpoint(base_url: &str) -> PublicEndpoint {
        PublicEndpoint {
            base_url: base_url.to_string(),
        }
    }

    #[test]
    fn test_absolute_url_from_rooted_path() {
        assert_eq!(
            absolute_url("http://main-deck:5000", "/uploads/music/a.mp3"),
            "http://main-deck:5000/uploads/music/a.mp3"
        );
    }

    #[test]
    fn test_absolute_url_from_bare_path() {
        assert_eq!(
            absolute_url("http://main-deck:5000/", "uploads/a.png"),
            "http://main-deck:5000/uploads/a.png"
        );
    }

    #[test]
    fn test_absolute_url_kept() {
        assert_eq!(
            absolute_url("http://main-deck:5000", "HTTPS://cdn.example/a.mp3"),
            "HTTPS://cdn.example/a.mp3"
        );
    }

    #[test]
    fn test_media_base_prefers_config() {
        let conf = endpoint("http://public:5000/");

        assert_eq!(
            media_base(Some(&conf), Some("10.0.0.2:5000")),
            Some("http://public:5000".to_string())
        );
        assert_eq!(
            media_base(None, Some("10.0.0.2:5000")),
            Some("http://10.0.0.2:5000".to_string())
        );
        assert_eq!(media_base(None, None), None);
        assert_eq!(media_base(None, Some("")), None);
    }

    #[test]
    fn test_resolve_track_urls() {
        let mut track = Track::new("t1", None);
        track.url = Some("/uploads/music/t1.mp3".to_string());

        resolve_track_urls(&mut track, "http://host");

        assert_eq!(track.url.as_deref(), Some("http://host/uploads/music/t1.mp3"));
        assert_eq!(track.cover, None);
    }
}
