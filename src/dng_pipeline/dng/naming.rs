use std::path::{Path, PathBuf};

/// Prefix used when the input path has no usable file stem.
const FALLBACK_PREFIX: &str = "frame";

/// File names for the frames of one output sequence:
/// `<prefix>_<index>.dng` with a zero-padded index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputNaming {
    prefix: String,
    digits: usize,
}

impl OutputNaming {
    /// The index field is wide enough for `frame_count - 1` and never
    /// narrower than `index_width`, so names sort in frame order.
    pub fn new(prefix: impl Into<String>, index_width: usize, frame_count: u64) -> Self {
        let last = frame_count.saturating_sub(1);
        let needed = last.checked_ilog10().map_or(1, |d| d as usize + 1);
        Self {
            prefix: prefix.into(),
            digits: index_width.max(needed),
        }
    }

    /// Naming for `input`, using `prefix` if given and the input stem otherwise.
    pub fn for_input(input: &Path, prefix: Option<&str>, index_width: usize, frame_count: u64) -> Self {
        let prefix = prefix
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .or_else(|| input.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| FALLBACK_PREFIX.to_string());
        Self::new(prefix, index_width, frame_count)
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn file_name(&self, index: u64) -> String {
        format!("{}_{:0width$}.dng", self.prefix, index, width = self.digits)
    }

    pub fn path(&self, output_dir: &Path, index: u64) -> PathBuf {
        output_dir.join(self.file_name(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_padding() {
        let naming = OutputNaming::for_input(Path::new("/footage/A001_C002.mov"), None, 6, 10);
        assert_eq!(naming.file_name(0), "A001_C002_000000.dng");
        assert_eq!(naming.file_name(9), "A001_C002_000009.dng");
    }

    #[test]
    fn test_padding_grows_with_frame_count() {
        let naming = OutputNaming::new("clip", 2, 1_000);
        assert_eq!(naming.file_name(7), "clip_007.dng");
        assert_eq!(naming.file_name(999), "clip_999.dng");

        let naming = OutputNaming::new("clip", 2, 1_001);
        assert_eq!(naming.file_name(1_000), "clip_1000.dng");
    }

    #[test]
    fn test_names_sort_in_frame_order() {
        let naming = OutputNaming::new("clip", 1, 120);
        let mut names: Vec<String> = (0..120).rev().map(|i| naming.file_name(i)).collect();
        names.sort();
        assert_eq!(names.first().map(String::as_str), Some("clip_000.dng"));
        assert_eq!(names.last().map(String::as_str), Some("clip_119.dng"));
    }

    #[test]
    fn test_prefix_override_and_fallback() {
        let naming = OutputNaming::for_input(Path::new("clip.mov"), Some("shot"), 4, 3);
        assert_eq!(naming.path(Path::new("/out"), 2), PathBuf::from("/out/shot_0002.dng"));

        let naming = OutputNaming::for_input(Path::new("/"), None, 4, 3);
        assert_eq!(naming.prefix(), "frame");
    }
}
