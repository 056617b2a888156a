//! Cache file handles: persisted links from objects back to a USD stage.

use std::path::PathBuf;

/// Index of a cache file inside its scene.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheFileId(pub(crate) usize);

/// A stage an imported scene keeps reading from after import.
///
/// Transform-cache constraints and mesh-sequence-cache modifiers point at a
/// cache file plus a prim path inside it.
#[derive(Clone, Debug, PartialEq)]
pub struct CacheFile {
    pub filepath: PathBuf,
    /// Scale applied when re-reading transforms.
    pub scale: f32,
    pub is_sequence: bool,
    /// Subtracted from the scene frame before sampling.
    pub frame_offset: f64,
    /// Sample `frame` instead of the scene frame.
    pub override_frame: bool,
    pub frame: f64,
}

impl CacheFile {
    pub fn new(filepath: impl Into<PathBuf>) -> Self {
        Self {
            filepath: filepath.into(),
            scale: 1.0,
            is_sequence: false,
            frame_offset: 0.0,
            override_frame: false,
            frame: 0.0,
        }
    }

    /// Stage time code sampled at `scene_frame`.
    pub fn sample_time(&self, scene_frame: f64) -> f64 {
        let frame = if self.override_frame { self.frame } else { scene_frame };
        frame - self.frame_offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_time() {
        let mut cache = CacheFile::new("/tmp/a.usda");
        assert_eq!(cache.sample_time(12.0), 12.0);
        cache.frame_offset = 2.0;
        assert_eq!(cache.sample_time(12.0), 10.0);
        cache.override_frame = true;
        cache.frame = 5.0;
        assert_eq!(cache.sample_time(12.0), 3.0);
    }
}
