use crate::storage::{base_slug, candidate, check_slug, check_title, today};
use crate::{codec, Error, Post, Result, Storage};
use chrono::NaiveDate;
use std::ffi::OsStr;
use std::fs;
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};

pub const EXTENSION: &str = "txt";

// FileStore keeps one file per post in a single directory:
// - $root/
//   - Hello-World_2024-07-01.txt
//   - Hello-World_2024-07-01_1.txt
//   - Another-post_2024-07-03.txt
//
// Every write goes to a temporary file in $root first, which is then moved
// into place, so readers never see a half-written post.
// New posts are linked in without replacing existing files, so two
// processes creating posts with the same title get distinct slugs.
#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
    date: Option<NaiveDate>,
}

impl FileStore {
    // Open the store at `root`, creating the directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<FileStore> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(Error::io(&root))?;
        Ok(FileStore { root, date: None })
    }

    // Use `date` instead of the current date when creating slugs.
    pub fn pinned_to(self, date: NaiveDate) -> FileStore {
        FileStore {
            date: Some(date),
            ..self
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    // The file backing the post at `slug`.
    pub fn path(&self, slug: &str) -> PathBuf {
        self.root.join(format!("{slug}.{EXTENSION}"))
    }

    // Write `post` to a temporary file in the store directory.
    fn stage(&self, post: &Post) -> Result<tempfile::NamedTempFile> {
        let mut file = tempfile::Builder::new()
            .prefix(".staged-")
            .suffix(".part")
            .tempfile_in(&self.root)
            .map_err(Error::io(&self.root))?;
        log::trace!("Staging {post:?} in {:?}", file.path());
        file.write_all(&codec::encode(post))
            .and_then(|_| file.as_file().sync_all())
            .map_err(Error::io(file.path()))?;
        Ok(file)
    }
}

impl Storage for FileStore {
    fn create(&mut self, post: &mut Post) -> Result<String> {
        check_title(post)?;
        let base = base_slug(&post.title, today(self.date));
        check_slug(&base)?;
        let mut n = 0;
        loop {
            let slug = candidate(&base, n);
            n += 1;
            let path = self.path(&slug);
            if path.exists() {
                log::trace!("{path:?} exists, probing further");
                continue;
            }
            // `post` only takes the slug once the file is in place.
            let mut staged = post.clone();
            staged.set_slug(slug.clone());
            match self.stage(&staged)?.persist_noclobber(&path) {
                Ok(_) => {
                    log::debug!("Created {path:?}");
                    post.set_slug(slug.clone());
                    return Ok(slug);
                }
                // Another writer took the name between the check and the link.
                Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
                    log::debug!("Lost race for {path:?}, probing further");
                }
                Err(e) => return Err(Error::io(&path)(e.error)),
            }
        }
    }

    fn read(&self, slug: &str) -> Result<Post> {
        check_slug(slug)?;
        let path = self.path(slug);
        log::debug!("Loading {path:?}");
        let bytes = match fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(Error::NotFound(slug.into()))
            }
            Err(e) => return Err(Error::io(&path)(e)),
        };
        // The file name is the source of truth for the slug.
        let mut post = codec::decode(&bytes)?;
        post.set_slug(slug);
        Ok(post)
    }

    fn update(&mut self, slug: &str, post: &mut Post) -> Result<()> {
        check_slug(slug)?;
        check_title(post)?;
        if !self.exists(slug)? {
            return Err(Error::NotFound(slug.into()));
        }
        let path = self.path(slug);
        post.set_slug(slug);
        log::debug!("Saving {post:?} to {path:?}");
        self.stage(post)?
            .persist(&path)
            .map_err(|e| Error::io(&path)(e.error))?;
        Ok(())
    }

    fn delete(&mut self, slug: &str) -> Result<()> {
        check_slug(slug)?;
        let path = self.path(slug);
        match fs::remove_file(&path) {
            Ok(()) => log::debug!("Removed {path:?}"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::debug!("Nothing to remove at {path:?}")
            }
            Err(e) => return Err(Error::io(&path)(e)),
        }
        Ok(())
    }

    fn list(&self) -> Result<Vec<Post>> {
        log::trace!("Listing {:?}", self.root);
        let mut posts = vec![];
        for entry in fs::read_dir(&self.root).map_err(Error::io(&self.root))? {
            let path = entry.map_err(Error::io(&self.root))?.path();
            if path.extension() != Some(OsStr::new(EXTENSION)) || !path.is_file() {
                continue;
            }
            let Some(slug) = path.file_stem().and_then(OsStr::to_str) else {
                log::warn!("Skipping non UTF-8 path: {path:?}");
                continue;
            };
            match self.read(slug) {
                Ok(post) => posts.push(post),
                Err(e) => log::warn!("Skipping {path:?}: {e}"),
            }
        }
        Ok(posts)
    }

    fn exists(&self, slug: &str) -> Result<bool> {
        check_slug(slug)?;
        Ok(self.path(slug).is_file())
    }
}
