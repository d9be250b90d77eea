//! Storage path normalisation.

/// Canonical storage path for `path` under `root`.
///
/// Surrounding slashes and whitespace are trimmed, one leading segment equal
/// to `root` is dropped if present, then exactly one `root/` is prepended.
///
/// ```
/// use core_playback::path::final_path;
///
/// assert_eq!(final_path("songs", "/songs/intro.mp3"), "songs/intro.mp3");
/// assert_eq!(final_path("songs", "intro.mp3"), "songs/intro.mp3");
/// ```
pub fn final_path(root: &str, path: &str) -> String {
    let root = trim_segment(root);
    let path = trim_segment(path);

    let relative = match path.strip_prefix(root) {
        Some("") => "",
        Some(rest) if rest.starts_with('/') => rest.trim_start_matches('/'),
        _ => path,
    };

    format!("{}/{}", root, relative)
}

fn trim_segment(s: &str) -> &str {
    s.trim_matches(|c: char| c == '/' || c.is_whitespace())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepends_root_once() {
        assert_eq!(final_path("songs", "artist/a.mp3"), "songs/artist/a.mp3");
        assert_eq!(final_path("songs", "songs/artist/a.mp3"), "songs/artist/a.mp3");
        assert_eq!(final_path("/songs/", "  /songs/a.mp3/ "), "songs/a.mp3");
    }

    #[test]
    fn only_strips_a_whole_segment() {
        assert_eq!(final_path("songs", "songsheet.mp3"), "songs/songsheet.mp3");
    }

    #[test]
    fn strips_only_one_leading_root() {
        assert_eq!(final_path("songs", "songs/songs/a.mp3"), "songs/songs/a.mp3");
    }

    #[test]
    fn collapses_duplicate_separator_after_root() {
        assert_eq!(final_path("songs", "songs//a.mp3"), "songs/a.mp3");
    }

    #[test]
    fn bare_root_yields_root_directory() {
        assert_eq!(final_path("songs", "songs"), "songs/");
        assert_eq!(final_path("songs", ""), "songs/");
    }
}
