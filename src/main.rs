use std::path::Path;
use std::process;
use std::rc::Rc;
use std::sync::mpsc;

use tracing::warn;
use tracing_subscriber::EnvFilter;

use chapter_pad::app::{
    Composer, ComposerSettings, Decoration, DocumentId, FsStore, HtmlRenderer, Notification,
    Result,
};

const USAGE: &str = "\
Usage: ChapterPad [--config <settings.json|settings.toml>] <command> <files...>

Commands:
  compose   Print the chapters joined into one document
  outline   Print section spans, boundaries and decorations";

enum Command {
    Compose,
    Outline,
}

struct Args {
    command: Command,
    config: Option<String>,
    files: Vec<DocumentId>,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Option<Args> {
    let mut config = None;
    let mut command = None;
    let mut files = Vec::new();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => config = Some(args.next()?),
            "compose" if command.is_none() => command = Some(Command::Compose),
            "outline" if command.is_none() => command = Some(Command::Outline),
            _ if command.is_some() => files.push(DocumentId::from(arg.as_str())),
            _ => return None,
        }
    }

    if files.is_empty() {
        return None;
    }
    Some(Args {
        command: command?,
        config,
        files,
    })
}

fn load_settings(config: Option<&str>) -> Result<ComposerSettings> {
    match config {
        Some(path) => ComposerSettings::load_from(Path::new(path)),
        None => Ok(ComposerSettings::load()),
    }
}

fn run(args: Args) -> Result<()> {
    let settings = load_settings(args.config.as_deref())?;
    let (tx, rx) = mpsc::channel();
    let mut composer = Composer::open(
        &args.files,
        Rc::new(FsStore::new(".")),
        Box::new(HtmlRenderer::default().with_root(".")),
        &settings,
        tx,
    )?;

    match args.command {
        Command::Compose => print!("{}", composer.text()),
        Command::Outline => print_outline(&composer),
    }

    composer.teardown();
    for notification in rx.try_iter() {
        if let Notification::Warning(message) = notification {
            warn!("{}", message);
        }
    }
    Ok(())
}

fn print_outline(composer: &Composer) {
    for (index, section) in composer.sections().iter().enumerate() {
        let span = composer.section_span(index).unwrap_or_default();
        println!(
            "{:>3}  {:<32} {:>7}..{:<7} {}",
            index, section.display_name, span.start, span.end, section.source_id
        );
    }

    for widget in composer.boundary_widgets() {
        println!(
            "boundary {}..{} -> {}",
            widget.at.start, widget.at.end, widget.label
        );
    }

    for decoration in composer.decorations() {
        let range = decoration.range();
        match decoration {
            Decoration::Replace { kind, section, .. } => {
                println!("{:?} {}..{} (section {})", kind, range.start, range.end, section)
            }
            Decoration::Hide { .. } => println!("hide {}..{}", range.start, range.end),
            Decoration::Mark { class, .. } => {
                println!("{} {}..{}", class, range.start, range.end)
            }
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let Some(args) = parse_args(std::env::args().skip(1)) else {
        eprintln!("{}", USAGE);
        process::exit(2);
    };

    if let Err(e) = run(args) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
