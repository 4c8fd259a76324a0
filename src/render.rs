// Project a post onto a text template.
//
// Templates live in a directory, one file per template, and refer to post
// fields by name using one of two placeholder syntaxes:
// - Curly:  "{{ title }}", stored as <name>.swig
// - Dollar: "$$title$$",   stored as <name>.spl
use crate::Post;
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Unknown field {0:?}, expected one of: {names}", names = Field::names().join(", "))]
    UnknownField(String),

    #[error("Unknown syntax {0:?}, expected one of: curly, dollar")]
    UnknownSyntax(String),

    #[error("Template {name:?} not found at {path:?}")]
    TemplateNotFound { name: String, path: PathBuf },

    #[error("Failed to read template {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// A field of a post that can be substituted into a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Title,
    Author,
    Body,
    Published,
    Slug,
}

impl Field {
    // "text" is an older name for the body, still used by some templates.
    const ALL: [(&'static str, Field); 6] = [
        ("title", Field::Title),
        ("author", Field::Author),
        ("body", Field::Body),
        ("text", Field::Body),
        ("published", Field::Published),
        ("slug", Field::Slug),
    ];

    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(|(name, _)| *name).collect()
    }

    pub fn name(self) -> &'static str {
        match self {
            Field::Title => "title",
            Field::Author => "author",
            Field::Body => "body",
            Field::Published => "published",
            Field::Slug => "slug",
        }
    }

    pub fn value(self, post: &Post) -> Cow<'_, str> {
        match self {
            Field::Title => Cow::Borrowed(post.title.as_str()),
            Field::Author => Cow::Borrowed(post.author.as_str()),
            Field::Body => Cow::Borrowed(post.body.as_str()),
            Field::Published => Cow::Owned(
                post.published_at()
                    .format("%Y-%m-%d %H:%M:%S")
                    .to_string(),
            ),
            Field::Slug => Cow::Borrowed(post.slug()),
        }
    }
}

impl FromStr for Field {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|(name, _)| *name == s)
            .map(|(_, field)| *field)
            .ok_or_else(|| Error::UnknownField(s.into()))
    }
}

// How fields are marked in a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Syntax {
    #[default]
    Curly,
    Dollar,
}

impl Syntax {
    // The file extension of templates written in this syntax.
    pub fn extension(self) -> &'static str {
        match self {
            Syntax::Curly => "swig",
            Syntax::Dollar => "spl",
        }
    }

    pub fn placeholder(self, field: &str) -> String {
        match self {
            Syntax::Curly => format!("{{{{ {field} }}}}"),
            Syntax::Dollar => format!("$${field}$$"),
        }
    }

    // Replace every placeholder for `field` in `template` with `value`.
    pub fn substitute(self, template: &str, field: &str, value: &str) -> String {
        template.replace(&self.placeholder(field), value)
    }
}

impl FromStr for Syntax {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "curly" | "swig" => Ok(Syntax::Curly),
            "dollar" | "spl" => Ok(Syntax::Dollar),
            _ => Err(Error::UnknownSyntax(s.into())),
        }
    }
}

// A directory of templates.
#[derive(Debug, Clone)]
pub struct Templates {
    dir: PathBuf,
}

impl Templates {
    pub fn new(dir: impl Into<PathBuf>) -> Templates {
        Templates { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, name: &str, syntax: Syntax) -> PathBuf {
        self.dir.join(format!("{name}.{}", syntax.extension()))
    }

    pub fn load(&self, name: &str, syntax: Syntax) -> Result<String, Error> {
        let path = self.path(name, syntax);
        if name.is_empty() || name.contains(['/', '\\']) {
            return Err(Error::TemplateNotFound {
                name: name.into(),
                path,
            });
        }
        log::debug!("Loading template {path:?}");
        match std::fs::read_to_string(&path) {
            Ok(s) => Ok(s),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(Error::TemplateNotFound {
                name: name.into(),
                path,
            }),
            Err(source) => Err(Error::Io { path, source }),
        }
    }
}

// A named template along with the post fields to fill into it.
#[derive(Debug, Clone)]
pub struct View {
    template: String,
    syntax: Syntax,
    fields: Vec<String>,
}

impl View {
    pub fn new(template: impl Into<String>, syntax: Syntax) -> View {
        View {
            template: template.into(),
            syntax,
            fields: vec![],
        }
    }

    // Declare the fields substituted on render.
    // Names are checked when rendering.
    pub fn with_fields<I, S>(self, fields: I) -> View
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        View {
            fields: fields.into_iter().map(Into::into).collect(),
            ..self
        }
    }

    // Render `post` into the template.
    // Placeholders are matched by the name the field was declared with.
    // Placeholders for fields that were not declared are left as-is.
    pub fn render(&self, templates: &Templates, post: &Post) -> Result<String, Error> {
        let fields = self
            .fields
            .iter()
            .map(|name| name.parse::<Field>().map(|field| (name.as_str(), field)))
            .collect::<Result<Vec<_>, _>>()?;
        let mut out = templates.load(&self.template, self.syntax)?;
        for (name, field) in fields {
            log::trace!("Substituting {field:?} as {name:?} into {}", self.template);
            out = self.syntax.substitute(&out, name, &field.value(post));
        }
        Ok(out)
    }
}
