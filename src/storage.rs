use crate::{post::slugify, Error, Post, Result};
use chrono::NaiveDate;
use std::collections::BTreeMap;

// A place posts can be stored, keyed by slug.
pub trait Storage {
    // Store a new post and return its slug.
    // The slug is chosen by the store so that it does not collide with any
    // stored post, and is written back onto `post`.
    fn create(&mut self, post: &mut Post) -> Result<String>;

    // Load the post stored at `slug`.
    fn read(&self, slug: &str) -> Result<Post>;

    // Replace the post stored at `slug`. Fails with NotFound rather than
    // creating a new post. The slug of `post` is set to `slug`.
    fn update(&mut self, slug: &str, post: &mut Post) -> Result<()>;

    // Remove the post at `slug`, if there is one.
    fn delete(&mut self, slug: &str) -> Result<()>;

    // Return every stored post, in no particular order.
    fn list(&self) -> Result<Vec<Post>>;

    // Return true if something is stored at `slug`.
    fn exists(&self, slug: &str) -> Result<bool>;

    // Move the post at `slug` to a fresh slug derived from the current
    // title of `post`, storing `post` there, and return the new slug.
    fn rename(&mut self, slug: &str, post: &mut Post) -> Result<String> {
        check_slug(slug)?;
        if !self.exists(slug)? {
            return Err(Error::NotFound(slug.into()));
        }
        let renamed = self.create(post)?;
        self.delete(slug)?;
        log::debug!("Renamed {slug} to {renamed}");
        Ok(renamed)
    }
}

// Reject slugs that are empty or could resolve outside the store.
pub fn check_slug(slug: &str) -> Result<()> {
    if slug.is_empty() {
        return Err(Error::InvalidInput("slug is empty".into()));
    }
    if slug == "." || slug == ".." || slug.contains(['/', '\\', '\0']) {
        return Err(Error::InvalidInput(format!("invalid slug {slug:?}")));
    }
    Ok(())
}

pub(crate) fn check_title(post: &Post) -> Result<()> {
    if post.title.is_empty() {
        return Err(Error::InvalidInput("post title is empty".into()));
    }
    Ok(())
}

// The slug a new post gets before collisions are resolved: the slugified
// title plus the date it was stored on.
pub(crate) fn base_slug(title: &str, date: NaiveDate) -> String {
    format!("{}_{}", slugify(title), date.format("%Y-%m-%d"))
}

// The nth candidate slug tried when storing a post under `base`.
// Candidates run `base`, `base_1`, `base_2`, ...
pub(crate) fn candidate(base: &str, n: u64) -> String {
    match n {
        0 => base.to_string(),
        n => format!("{base}_{n}"),
    }
}

pub(crate) fn today(pinned: Option<NaiveDate>) -> NaiveDate {
    pinned.unwrap_or_else(|| chrono::Local::now().date_naive())
}

// Storage that only lives as long as the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    posts: BTreeMap<String, Post>,
    date: Option<NaiveDate>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }

    // Use `date` instead of the current date when creating slugs.
    pub fn pinned_to(self, date: NaiveDate) -> MemoryStore {
        MemoryStore {
            date: Some(date),
            ..self
        }
    }
}

impl Storage for MemoryStore {
    fn create(&mut self, post: &mut Post) -> Result<String> {
        check_title(post)?;
        let base = base_slug(&post.title, today(self.date));
        check_slug(&base)?;
        let mut n = 0;
        loop {
            let slug = candidate(&base, n);
            if !self.posts.contains_key(&slug) {
                post.set_slug(slug.clone());
                self.posts.insert(slug.clone(), post.clone());
                return Ok(slug);
            }
            n += 1;
        }
    }

    fn read(&self, slug: &str) -> Result<Post> {
        check_slug(slug)?;
        self.posts
            .get(slug)
            .cloned()
            .ok_or_else(|| Error::NotFound(slug.into()))
    }

    fn update(&mut self, slug: &str, post: &mut Post) -> Result<()> {
        check_slug(slug)?;
        check_title(post)?;
        let Some(stored) = self.posts.get_mut(slug) else {
            return Err(Error::NotFound(slug.into()));
        };
        post.set_slug(slug);
        *stored = post.clone();
        Ok(())
    }

    fn delete(&mut self, slug: &str) -> Result<()> {
        check_slug(slug)?;
        self.posts.remove(slug);
        Ok(())
    }

    fn list(&self) -> Result<Vec<Post>> {
        Ok(self.posts.values().cloned().collect())
    }

    fn exists(&self, slug: &str) -> Result<bool> {
        check_slug(slug)?;
        Ok(self.posts.contains_key(slug))
    }
}
