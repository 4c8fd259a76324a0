// The on-disk encoding of a post.
// Posts are stored as text, one "key = value" line per field, behind a
// header line naming the format and its version:
// ```
// # telegraph post v1
// title = Hello World
// author = Ann
// published = 2024-07-01T09:30:00.000000000Z
// slug = Hello-World_2024-07-01
// body = first line\nsecond line
// ```
// Values escape backslashes, newlines and carriage returns so every field
// stays on one line. Only the single space after '=' is separator; any
// other whitespace belongs to the value.
use crate::{post::slugify, Error, Post, Result};
use chrono::{DateTime, SecondsFormat, Utc};

pub const HEADER: &str = "# telegraph post";
pub const VERSION: u32 = 1;

// Placeholders for fields missing from an otherwise valid payload.
pub const UNTITLED: &str = "Untitled";
pub const UNKNOWN_AUTHOR: &str = "Unknown author";
pub const NO_CONTENT: &str = "No content";

pub fn encode(post: &Post) -> Vec<u8> {
    let published = post
        .published_at()
        .to_rfc3339_opts(SecondsFormat::Nanos, true);
    let mut out = format!("{HEADER} v{VERSION}\n");
    for (key, value) in [
        ("title", post.title.as_str()),
        ("author", post.author.as_str()),
        ("published", published.as_str()),
        ("slug", post.slug()),
        ("body", post.body.as_str()),
    ] {
        out.push_str(key);
        out.push_str(" = ");
        out.push_str(&escape(value));
        out.push('\n');
    }
    out.into_bytes()
}

// Decode a post.
// Missing fields are filled in with placeholders (and the current time for
// `published`) rather than failing, so a half-written file still loads.
// Bytes that are not a post at all fail with NotARecord, and bytes that
// claim to be a post but cannot be parsed fail with CorruptPayload.
pub fn decode(bytes: &[u8]) -> Result<Post> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| Error::CorruptPayload(format!("not valid UTF-8: {e}")))?;
    let mut lines = text.lines().filter(|l| !l.trim().is_empty());

    let header = lines
        .next()
        .ok_or_else(|| Error::NotARecord("empty payload".into()))?;
    check_header(header)?;

    let mut title = None;
    let mut author = None;
    let mut body = None;
    let mut published = None;
    let mut slug = None;
    for line in lines {
        log::trace!("Parsing post line: {line}");
        let Some((key, value)) = line.split_once('=') else {
            return Err(Error::CorruptPayload(format!(
                "expected 'key = value', got {line:?}"
            )));
        };
        let value = unescape(value.strip_prefix(' ').unwrap_or(value))?;
        match key.trim() {
            "title" => title = Some(value),
            "author" => author = Some(value),
            "body" => body = Some(value),
            "slug" => slug = Some(value),
            "published" => published = Some(parse_time(&value)?),
            k => log::warn!("Ignoring unknown post key: {k}"),
        }
    }

    let title = title.unwrap_or_else(|| UNTITLED.into());
    let slug = slug.unwrap_or_else(|| slugify(&title));
    Ok(Post::restore(
        title,
        author.unwrap_or_else(|| UNKNOWN_AUTHOR.into()),
        body.unwrap_or_else(|| NO_CONTENT.into()),
        published.unwrap_or_else(Utc::now),
        slug,
    ))
}

fn check_header(line: &str) -> Result<()> {
    let Some(version) = line.trim().strip_prefix(HEADER) else {
        return Err(Error::NotARecord(format!("missing {HEADER:?} header")));
    };
    let version = version.trim();
    match version.strip_prefix('v').map(str::parse::<u32>) {
        Some(Ok(VERSION)) => Ok(()),
        Some(Ok(v)) => Err(Error::CorruptPayload(format!(
            "unsupported format version {v}"
        ))),
        _ => Err(Error::CorruptPayload(format!(
            "invalid format version {version:?}"
        ))),
    }
}

fn parse_time(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| Error::CorruptPayload(format!("invalid timestamp {value:?}: {e}")))
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out
}

fn unescape(value: &str) -> Result<String> {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some(other) => {
                return Err(Error::CorruptPayload(format!(
                    "invalid escape '\\{other}' in {value:?}"
                )))
            }
            None => {
                return Err(Error::CorruptPayload(format!(
                    "dangling '\\' at end of {value:?}"
                )))
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone as _, Timelike as _};
    use pretty_assertions::assert_eq;

    fn post() -> Post {
        let published = Utc
            .with_ymd_and_hms(2024, 7, 1, 9, 30, 0)
            .unwrap()
            .with_nanosecond(123_456_789)
            .unwrap();
        Post::restore(
            "Hello World".into(),
            "Ann".into(),
            "first line\nsecond \\ line\r\n".into(),
            published,
            "Hello-World_2024-07-01".into(),
        )
    }

    #[test]
    fn test_encode() {
        let text = String::from_utf8(encode(&post())).unwrap();
        insta::assert_snapshot!(text, @r###"
        # telegraph post v1
        title = Hello World
        author = Ann
        published = 2024-07-01T09:30:00.123456789Z
        slug = Hello-World_2024-07-01
        body = first line\nsecond \\ line\r\n
        "###);
    }

    #[test]
    fn test_round_trip() {
        let expected = post();
        assert_eq!(decode(&encode(&expected)).unwrap(), expected);

        let awkward = Post::restore(
            " padded = value ".into(),
            "".into(),
            "\\n is not a newline\n\n".into(),
            Utc::now(),
            "".into(),
        );
        assert_eq!(decode(&encode(&awkward)).unwrap(), awkward);
    }

    #[test]
    fn test_decode_missing_fields() {
        let before = Utc::now();
        let post = decode(b"# telegraph post v1\nauthor = Ann\n").unwrap();
        assert_eq!(post.title, UNTITLED);
        assert_eq!(post.author, "Ann");
        assert_eq!(post.body, NO_CONTENT);
        assert_eq!(post.slug(), "Untitled");
        assert!(post.published_at() >= before);

        let post = decode(b"# telegraph post v1\ntitle = A b\n").unwrap();
        assert_eq!(post.title, "A b");
        assert_eq!(post.author, UNKNOWN_AUTHOR);
        assert_eq!(post.slug(), "A-b");
    }

    #[test]
    fn test_decode_tolerates_drift() {
        let post = decode(
            b"\n# telegraph post v1\r\ntitle=Terse\r\nmood = happy\n\ntitle = Later\n",
        )
        .unwrap();
        assert_eq!(post.title, "Later");
    }

    #[test]
    fn test_decode_not_a_record() {
        for bytes in [
            &b""[..],
            b"   \n\n",
            b"title = Hello\n",
            b"just some notes",
            b"# some other format v1\ntitle = x\n",
        ] {
            assert!(
                matches!(decode(bytes), Err(Error::NotARecord(_))),
                "{:?}",
                String::from_utf8_lossy(bytes)
            );
        }
    }

    #[test]
    fn test_decode_corrupt() {
        for bytes in [
            &[0xff, 0xfe, 0x00, 0x9f][..],
            b"# telegraph post v2\ntitle = x\n",
            b"# telegraph post vx\n",
            b"# telegraph post v1\nno separator here\n",
            b"# telegraph post v1\nbody = bad \\t escape\n",
            b"# telegraph post v1\nbody = dangling \\\n",
            b"# telegraph post v1\npublished = yesterday\n",
        ] {
            assert!(
                matches!(decode(bytes), Err(Error::CorruptPayload(_))),
                "{:?}",
                String::from_utf8_lossy(bytes)
            );
        }
    }
}
