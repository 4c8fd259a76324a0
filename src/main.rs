use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::io::{Read as _, Write as _};
use std::path::PathBuf;
use telegraph::render::{Syntax, Templates, View};
use telegraph::upload::{MediaStore, Session};
use telegraph::{codec, Config, FileStore, Post, Storage};

#[derive(Parser)]
#[command(version, about = "Store and render short text posts")]
struct Cli {
    /// Directory holding the posts, overriding the configured one.
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Log more; repeat for more detail.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Store a new post and print its slug.
    Create {
        #[arg(long)]
        title: String,
        #[arg(long)]
        author: String,
        /// The post text. Read from stdin if not given.
        #[arg(long)]
        body: Option<String>,
    },
    /// Print a post.
    Show { slug: String },
    /// Change the title or body of a post.
    /// Without --title or --body, the post is opened in $EDITOR.
    Edit {
        slug: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        body: Option<String>,
    },
    /// Move a post to a slug matching its current title and print the new slug.
    Rename { slug: String },
    /// Remove a post.
    Delete { slug: String },
    /// Show a table of all posts.
    List,
    /// Fill a template with the fields of a post.
    Render {
        slug: String,
        #[arg(long)]
        template: String,
        /// Placeholder syntax: curly ({{ field }}) or dollar ($$field$$).
        #[arg(long, default_value = "curly")]
        syntax: Syntax,
        /// A field to substitute. May be repeated.
        #[arg(long = "field", required = true)]
        fields: Vec<String>,
    },
    /// Copy an image into the media directory and print where it went.
    Upload { file: PathBuf },
}

#[derive(tabled::Tabled)]
struct Row {
    slug: String,
    title: String,
    author: String,
    published: String,
}

impl From<&Post> for Row {
    fn from(post: &Post) -> Self {
        Row {
            slug: post.slug().into(),
            title: post.title.clone(),
            author: post.author.clone(),
            published: post
                .published_at()
                .with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M")
                .to_string(),
        }
    }
}

fn show(post: &Post) {
    println!("{}", post.title);
    println!("by {}", post.author);
    println!(
        "published {}",
        post.published_at()
            .with_timezone(&chrono::Local)
            .format("%Y-%m-%d %H:%M:%S")
    );
    println!("slug {}", post.slug());
    println!();
    println!("{}", post.body);
}

// Lay out `posts` as a table no wider than `width`, if given.
fn table(posts: &[Post], width: Option<u16>) -> tabled::Table {
    let mut table = tabled::Table::new(posts.iter().map(Row::from));
    table.with(tabled::settings::Style::rounded());
    if let Some(width) = width {
        table.with(tabled::settings::Width::truncate(usize::from(width)));
    }
    table
}

fn list(store: &FileStore) -> Result<()> {
    let mut posts = store.list()?;
    posts.sort_by(|a, b| a.slug().cmp(b.slug()));
    let width = terminal_size::terminal_size().map(|(terminal_size::Width(w), _)| w);
    println!("{}", table(&posts, width));
    Ok(())
}

fn editor() -> Result<PathBuf> {
    match std::env::var_os("EDITOR") {
        Some(editor) if !editor.is_empty() => Ok(editor.into()),
        _ => which::which("vi").context("$EDITOR is not set and vi was not found"),
    }
}

// Let the user edit the post in their editor.
// Only the title, author and body are taken from the edited file.
fn edit_interactive(post: &mut Post) -> Result<()> {
    let mut file = tempfile::Builder::new()
        .prefix("telegraph-")
        .suffix(".txt")
        .tempfile()?;
    file.write_all(&codec::encode(post))?;
    file.flush()?;

    let editor = editor()?;
    log::debug!("Editing {:?} with {editor:?}", file.path());
    let status = std::process::Command::new(&editor)
        .arg(file.path())
        .status()
        .with_context(|| format!("Running {editor:?}"))?;
    if !status.success() {
        bail!("Editor {editor:?} failed: {status}");
    }

    let edited = codec::decode(&std::fs::read(file.path())?)?;
    post.title = edited.title;
    post.author = edited.author;
    post.body = edited.body;
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let root = cli.root.unwrap_or(config.root);
    let mut store = FileStore::new(&root)?;

    match cli.command {
        Command::Create {
            title,
            author,
            body,
        } => {
            let body = match body {
                Some(body) => body,
                None => {
                    let mut body = String::new();
                    std::io::stdin()
                        .read_to_string(&mut body)
                        .context("Reading post body from stdin")?;
                    body
                }
            };
            let mut post = Post::new(title, author, body);
            println!("{}", store.create(&mut post)?);
        }
        Command::Show { slug } => show(&store.read(&slug)?),
        Command::Edit { slug, title, body } => {
            let mut post = store.read(&slug)?;
            if title.is_none() && body.is_none() {
                edit_interactive(&mut post)?;
            } else {
                let title = title.unwrap_or_else(|| post.title.clone());
                let body = body.unwrap_or_else(|| post.body.clone());
                post.edit(title, body);
            }
            store.update(&slug, &mut post)?;
        }
        Command::Rename { slug } => {
            let mut post = store.read(&slug)?;
            println!("{}", store.rename(&slug, &mut post)?);
        }
        Command::Delete { slug } => store.delete(&slug)?,
        Command::List => list(&store)?,
        Command::Render {
            slug,
            template,
            syntax,
            fields,
        } => {
            let post = store.read(&slug)?;
            let view = View::new(template, syntax).with_fields(fields);
            print!("{}", view.render(&Templates::new(&config.templates), &post)?);
        }
        Command::Upload { file } => {
            let media = MediaStore::new(&config.media, config.upload);
            let path = media.accept_file(&mut Session::new(), &file)?;
            println!("{}", path.display());
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
    run(cli)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_fits_width() {
        let posts = [
            Post::new("A rather long title for a post", "Somebody", "text"),
            Post::new("Short", "Ann", "text"),
        ];
        let wide = table(&posts, None).to_string();
        assert!(wide.contains("A rather long title for a post"));

        let narrow = table(&posts, Some(30)).to_string();
        for line in narrow.lines() {
            assert!(line.chars().count() <= 30, "{line}");
        }
    }
}
