use chrono::{DateTime, Utc};

// Post is a single stored text.
// The slug names the file backing the post. It starts out derived from the
// title, but a Storage may rewrite it on create to keep it unique, so the
// slug returned from Storage::create is the one to keep.
#[derive(Debug, Clone, PartialEq)]
pub struct Post {
    pub title: String,
    pub author: String,
    pub body: String,

    // Fixed when the post is first constructed.
    published_at: DateTime<Utc>,

    slug: String,
}

impl Post {
    pub fn new(
        title: impl Into<String>,
        author: impl Into<String>,
        body: impl Into<String>,
    ) -> Post {
        let title = title.into();
        Post {
            slug: slugify(&title),
            title,
            author: author.into(),
            body: body.into(),
            published_at: Utc::now(),
        }
    }

    // Rebuild a post from stored fields.
    pub(crate) fn restore(
        title: String,
        author: String,
        body: String,
        published_at: DateTime<Utc>,
        slug: String,
    ) -> Post {
        Post {
            title,
            author,
            body,
            published_at,
            slug,
        }
    }

    pub fn published_at(&self) -> DateTime<Utc> {
        self.published_at
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }

    pub(crate) fn set_slug(&mut self, slug: impl Into<String>) {
        self.slug = slug.into();
    }

    // Replace the title and body.
    // The slug is left alone, so the post stays at the same file.
    // Use Storage::rename to move it under a slug matching the new title.
    pub fn edit(&mut self, title: impl Into<String>, body: impl Into<String>) {
        self.title = title.into();
        self.body = body.into();
    }
}

// Derive a slug from a title by replacing every space with a hyphen.
// No other normalization happens, and nothing here guarantees uniqueness.
pub fn slugify(title: &str) -> String {
    title.replace(' ', "-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Hello World"), "Hello-World");
        assert_eq!(slugify("  two  spaces "), "--two--spaces-");
        assert_eq!(slugify("Mixed Case, punctuation!"), "Mixed-Case,-punctuation!");
        assert_eq!(slugify("Привет мир"), "Привет-мир");
        assert_eq!(slugify("tab\tstays"), "tab\tstays");
        assert_eq!(slugify(""), "");
    }

    #[test]
    fn test_new_derives_slug() {
        let before = Utc::now();
        let post = Post::new("First post", "Ann", "Hi");
        assert_eq!(post.slug(), "First-post");
        assert!(post.published_at() >= before);
        assert!(post.published_at() <= Utc::now());
    }

    #[test]
    fn test_edit_keeps_slug_and_timestamp() {
        let mut post = Post::new("First post", "Ann", "Hi");
        let published = post.published_at();
        post.edit("Second title", "Bye");
        assert_eq!(post.title, "Second title");
        assert_eq!(post.body, "Bye");
        assert_eq!(post.slug(), "First-post");
        assert_eq!(post.published_at(), published);
    }
}
