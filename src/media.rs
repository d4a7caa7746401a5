use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::core::errors::{SocialError, SocialResult};
use crate::models::models::{MediaKind, PostId, UserId};

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp"];
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv", "wmv"];
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "flac", "aac", "ogg"];

pub fn allowed_extensions(kind: MediaKind) -> &'static [&'static str] {
    match kind {
        MediaKind::Image => IMAGE_EXTENSIONS,
        MediaKind::Video => VIDEO_EXTENSIONS,
        MediaKind::Audio => AUDIO_EXTENSIONS,
        MediaKind::None => &[],
    }
}

/// Filesystem calls the media gate needs.
pub trait MediaFs {
    fn exists(&self, path: &Path) -> bool;

    fn extension(&self, path: &Path) -> Option<String> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .filter(|ext| !ext.is_empty())
            .map(str::to_string)
    }

    fn copy(&self, src: &Path, dst: &Path) -> io::Result<()>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFs;

impl MediaFs for LocalFs {
    /// A file counts as present only if it can be opened.
    fn exists(&self, path: &Path) -> bool {
        fs::File::open(path).is_ok()
    }

    fn copy(&self, src: &Path, dst: &Path) -> io::Result<()> {
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(src, dst).map(|_| ())
    }
}

/// Checks `path` against the allow-list for `kind`. Returns the extension as
/// written in the source path.
pub fn validate_media(fs: &dyn MediaFs, path: &Path, kind: MediaKind) -> SocialResult<String> {
    if kind == MediaKind::None {
        return Err(SocialError::InvalidMedia("no media kind given".to_string()));
    }
    if !fs.exists(path) {
        return Err(SocialError::InvalidMedia(format!(
            "{} doesn't exist or cannot be opened",
            path.display()
        )));
    }
    let ext = fs
        .extension(path)
        .ok_or_else(|| SocialError::InvalidMedia(format!("{} has no extension", path.display())))?;
    let lower = ext.to_ascii_lowercase();
    if !allowed_extensions(kind).contains(&lower.as_str()) {
        return Err(SocialError::InvalidMedia(format!(
            ".{} is not an accepted {} format",
            ext,
            kind.label().to_ascii_lowercase()
        )));
    }
    Ok(ext)
}

/// Where post attachments are copied to.
pub struct MediaLibrary {
    fs: Box<dyn MediaFs>,
    root: PathBuf,
}

impl MediaLibrary {
    pub fn new(fs: Box<dyn MediaFs>, root: PathBuf) -> Self {
        MediaLibrary { fs, root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn validate(&self, path: &Path, kind: MediaKind) -> SocialResult<String> {
        validate_media(self.fs.as_ref(), path, kind)
    }

    /// `{root}/{kind dir}/user_{user}_post_{post}.{ext}`
    pub fn destination(&self, kind: MediaKind, user_id: UserId, post_id: PostId, ext: &str) -> PathBuf {
        self.root
            .join(kind.dir_name())
            .join(format!("user_{}_post_{}.{}", user_id, post_id, ext))
    }

    /// Validates and copies `src` into the library, returning the stored path.
    pub fn import(
        &self,
        src: &Path,
        kind: MediaKind,
        user_id: UserId,
        post_id: PostId,
    ) -> SocialResult<PathBuf> {
        let ext = self.validate(src, kind)?;
        let dest = self.destination(kind, user_id, post_id, &ext);
        if let Err(err) = self.fs.copy(src, &dest) {
            warn!(src = %src.display(), dest = %dest.display(), error = %err, "media copy failed");
            return Err(err.into());
        }
        debug!(dest = %dest.display(), "media copied");
        Ok(dest)
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use std::cell::RefCell;
    use std::collections::HashSet;
    use std::rc::Rc;

    use super::*;

    /// In-memory filesystem; clones share state so tests can inspect copies.
    #[derive(Clone, Default)]
    pub(crate) struct MemoryFs {
        files: Rc<RefCell<HashSet<PathBuf>>>,
        pub(crate) copies: Rc<RefCell<Vec<(PathBuf, PathBuf)>>>,
        pub(crate) fail_copies: Rc<RefCell<bool>>,
    }

    impl MemoryFs {
        pub(crate) fn with_files(paths: &[&str]) -> Self {
            let fs = MemoryFs::default();
            fs.files.borrow_mut().extend(paths.iter().map(PathBuf::from));
            fs
        }
    }

    impl MediaFs for MemoryFs {
        fn exists(&self, path: &Path) -> bool {
            self.files.borrow().contains(path)
        }

        fn copy(&self, src: &Path, dst: &Path) -> io::Result<()> {
            if *self.fail_copies.borrow() {
                return Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"));
            }
            self.files.borrow_mut().insert(dst.to_path_buf());
            self.copies.borrow_mut().push((src.to_path_buf(), dst.to_path_buf()));
            Ok(())
        }
    }
}
