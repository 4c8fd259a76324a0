// Accepting media files (images attached to posts).
// Media lives in its own directory, apart from the posts, under generated
// names. Nothing here touches a Storage.
use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

pub const MAX_BYTES: u64 = 2 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Upload limit reached: {0} file(s) per session")]
    QuotaExceeded(u32),

    #[error("No file was uploaded")]
    Empty,

    #[error("File too large: {0} bytes (max: {1})")]
    TooLarge(u64, u64),

    #[error("Content type {0} is not allowed")]
    MimeNotAllowed(&'static str),

    #[error("Extension {0:?} is not allowed, expected one of: {1}")]
    ExtensionNotAllowed(String, String),

    #[error("Failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// What an upload must look like to be accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadPolicy {
    pub max_bytes: u64,

    // Accepted (extension, MIME type) pairs. Extensions are lowercase.
    pub allowed: Vec<(String, String)>,

    // How many files one session may upload.
    pub per_session: u32,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            max_bytes: MAX_BYTES,
            allowed: [
                ("jpg", "image/jpeg"),
                ("jpeg", "image/jpeg"),
                ("png", "image/png"),
            ]
            .into_iter()
            .map(|(ext, mime)| (ext.into(), mime.into()))
            .collect(),
            per_session: 1,
        }
    }
}

impl UploadPolicy {
    pub fn allows_mime(&self, mime: &str) -> bool {
        self.allowed.iter().any(|(_, m)| m == mime)
    }

    pub fn allows_extension(&self, ext: &str) -> bool {
        self.allowed.iter().any(|(e, _)| e == ext)
    }

    fn extensions(&self) -> String {
        self.allowed
            .iter()
            .map(|(e, _)| e.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

// Uploads made by one client.
#[derive(Debug, Default)]
pub struct Session {
    uploads: u32,
}

impl Session {
    pub fn new() -> Session {
        Session::default()
    }

    pub fn uploads(&self) -> u32 {
        self.uploads
    }
}

// Guess the MIME type of a file from its leading bytes.
pub fn sniff(bytes: &[u8]) -> &'static str {
    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n";
    const JPEG: &[u8] = &[0xff, 0xd8, 0xff];
    const GIF: &[u8] = b"GIF8";
    if bytes.starts_with(PNG) {
        "image/png"
    } else if bytes.starts_with(JPEG) {
        "image/jpeg"
    } else if bytes.starts_with(GIF) {
        "image/gif"
    } else if std::str::from_utf8(bytes).is_ok() {
        "text/plain"
    } else {
        "application/octet-stream"
    }
}

#[derive(Debug, Clone)]
pub struct MediaStore {
    dir: PathBuf,
    policy: UploadPolicy,
}

impl MediaStore {
    pub fn new(dir: impl Into<PathBuf>, policy: UploadPolicy) -> MediaStore {
        MediaStore {
            dir: dir.into(),
            policy,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    // Validate and store an uploaded file, returning where it was stored.
    // `file_name` is the name the client gave the file; only its extension
    // is kept.
    pub fn accept(
        &self,
        session: &mut Session,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<PathBuf, Error> {
        if session.uploads >= self.policy.per_session {
            return Err(Error::QuotaExceeded(self.policy.per_session));
        }
        if bytes.is_empty() {
            return Err(Error::Empty);
        }
        let size = bytes.len() as u64;
        if size > self.policy.max_bytes {
            return Err(Error::TooLarge(size, self.policy.max_bytes));
        }
        let mime = sniff(bytes);
        if !self.policy.allows_mime(mime) {
            return Err(Error::MimeNotAllowed(mime));
        }
        let ext = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_lowercase();
        if !self.policy.allows_extension(&ext) {
            return Err(Error::ExtensionNotAllowed(ext, self.policy.extensions()));
        }

        fs::create_dir_all(&self.dir).map_err(|source| Error::Io {
            path: self.dir.clone(),
            source,
        })?;
        let path = self.dir.join(format!("{}.{ext}", uuid::Uuid::new_v4()));
        log::debug!("Storing {size} byte {mime} upload {file_name:?} at {path:?}");
        fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .and_then(|mut f| f.write_all(bytes))
            .map_err(|source| Error::Io {
                path: path.clone(),
                source,
            })?;

        session.uploads += 1;
        Ok(path)
    }

    // Like accept, for a file on disk. Oversized files are turned away
    // before any of their content is read.
    pub fn accept_file(&self, session: &mut Session, path: &Path) -> Result<PathBuf, Error> {
        if session.uploads >= self.policy.per_session {
            return Err(Error::QuotaExceeded(self.policy.per_session));
        }
        let read_err = |source: std::io::Error| Error::Read {
            path: path.to_path_buf(),
            source,
        };
        let size = fs::metadata(path).map_err(read_err)?.len();
        if size > self.policy.max_bytes {
            return Err(Error::TooLarge(size, self.policy.max_bytes));
        }
        let bytes = fs::read(path).map_err(read_err)?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        self.accept(session, name, &bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";
    const JPEG: &[u8] = &[0xff, 0xd8, 0xff, 0xe0, 0x00, 0x10, b'J', b'F', b'I', b'F'];

    fn setup(policy: UploadPolicy) -> (MediaStore, tempfile::TempDir) {
        let _ = env_logger::try_init();
        let tmp = tempfile::tempdir().unwrap();
        (MediaStore::new(tmp.path().join("media"), policy), tmp)
    }

    #[test]
    fn test_sniff() {
        assert_eq!(sniff(PNG), "image/png");
        assert_eq!(sniff(JPEG), "image/jpeg");
        assert_eq!(sniff(b"GIF89a"), "image/gif");
        assert_eq!(sniff(b"hello"), "text/plain");
        assert_eq!(sniff(&[0x00, 0xff, 0xfe]), "application/octet-stream");
    }

    #[test]
    fn test_accept() {
        let (media, _tmp) = setup(UploadPolicy::default());
        let mut session = Session::new();
        let path = media.accept(&mut session, "Cat.PNG", PNG).unwrap();
        assert_eq!(path.parent().unwrap(), media.dir());
        assert_eq!(path.extension().unwrap(), "png");
        assert_eq!(fs::read(&path).unwrap(), PNG);
        assert_eq!(session.uploads(), 1);
    }

    #[test]
    fn test_quota() {
        let policy = UploadPolicy {
            per_session: 2,
            ..Default::default()
        };
        let (media, _tmp) = setup(policy);
        let mut session = Session::new();
        let a = media.accept(&mut session, "a.jpg", JPEG).unwrap();
        let b = media.accept(&mut session, "b.jpeg", JPEG).unwrap();
        assert_ne!(a, b);
        assert!(matches!(
            media.accept(&mut session, "c.jpg", JPEG),
            Err(Error::QuotaExceeded(2))
        ));

        // Quotas are per session.
        let mut other = Session::new();
        media.accept(&mut other, "c.jpg", JPEG).unwrap();
        assert_eq!(fs::read_dir(media.dir()).unwrap().count(), 3);
    }

    #[test]
    fn test_rejections() {
        let policy = UploadPolicy {
            max_bytes: 16,
            ..Default::default()
        };
        let (media, _tmp) = setup(policy);
        let mut session = Session::new();

        assert!(matches!(
            media.accept(&mut session, "a.png", b""),
            Err(Error::Empty)
        ));
        assert!(matches!(
            media.accept(&mut session, "a.png", &[PNG, &[0u8; 16][..]].concat()),
            Err(Error::TooLarge(32, 16))
        ));
        assert!(matches!(
            media.accept(&mut session, "a.png", b"GIF89a"),
            Err(Error::MimeNotAllowed("image/gif"))
        ));
        assert!(matches!(
            media.accept(&mut session, "a.gif", PNG),
            Err(Error::ExtensionNotAllowed(ext, _)) if ext == "gif"
        ));
        assert!(matches!(
            media.accept(&mut session, "no-extension", PNG),
            Err(Error::ExtensionNotAllowed(ext, _)) if ext.is_empty()
        ));

        // Rejected uploads do not count against the quota.
        assert_eq!(session.uploads(), 0);
        assert!(!media.dir().exists());
    }

    #[test]
    fn test_accept_file() {
        let policy = UploadPolicy {
            max_bytes: 16,
            per_session: 2,
            ..Default::default()
        };
        let (media, tmp) = setup(policy);
        let mut session = Session::new();

        let small = tmp.path().join("cat.png");
        fs::write(&small, PNG).unwrap();
        let stored = media.accept_file(&mut session, &small).unwrap();
        assert_eq!(fs::read(&stored).unwrap(), PNG);

        let big = tmp.path().join("big.png");
        fs::write(&big, [PNG, &[0u8; 16][..]].concat()).unwrap();
        assert!(matches!(
            media.accept_file(&mut session, &big),
            Err(Error::TooLarge(32, 16))
        ));

        assert!(matches!(
            media.accept_file(&mut session, &tmp.path().join("missing.png")),
            Err(Error::Read { .. })
        ));
        assert_eq!(session.uploads(), 1);
    }
}
