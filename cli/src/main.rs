//! acrl CLI - inspect and verify Universe of Discourse documents.
//!
//! ```text
//! acrl inspect <file>   print the recovered ownership tree
//! acrl verify <file>    recover, re-marshal, recover again, compare
//! ```
//!
//! Logs go to stderr so stdout stays clean for piping.

mod render;

use std::path::{Path, PathBuf};
use std::{env, fs, io};

use anyhow::{Context, Result, bail};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use acrl_core::{AcrlConfig, BaseElement, Element, Universe, UniverseConfig, check_equivalence};

const USAGE: &str = "usage: acrl <inspect|verify> <file>";

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Inspect(PathBuf),
    Verify(PathBuf),
    Help,
}

impl Command {
    fn parse(mut args: impl Iterator<Item = String>) -> Result<Self> {
        let Some(name) = args.next() else {
            bail!("{USAGE}");
        };
        let command: fn(PathBuf) -> Self = match name.as_str() {
            "-h" | "--help" | "help" => return Ok(Self::Help),
            "inspect" => Self::Inspect,
            "verify" => Self::Verify,
            other => bail!("unknown command {other:?}\n{USAGE}"),
        };
        let Some(path) = args.next() else {
            bail!("missing file\n{USAGE}");
        };
        if let Some(extra) = args.next() {
            bail!("unexpected argument {extra:?}\n{USAGE}");
        }
        Ok(command(PathBuf::from(path)))
    }
}

fn init_tracing(config: Option<&AcrlConfig>) {
    let fallback = config
        .and_then(AcrlConfig::logging_filter)
        .unwrap_or("info");
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(fallback))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(env_filter)
        .init();
}

fn load(universe: &Universe, path: &Path) -> Result<Element> {
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    universe
        .recover(&bytes)
        .with_context(|| format!("recovering {}", path.display()))
}

fn inspect(config: &UniverseConfig, path: &Path) -> Result<()> {
    let universe = Universe::with_config(config);
    let root = load(&universe, path)?;
    print!("{}", render::render_tree(&root));
    tracing::info!(nodes = universe.len(), "inspected document");
    Ok(())
}

fn verify(config: &UniverseConfig, path: &Path) -> Result<()> {
    let first = Universe::with_config(config);
    let root = load(&first, path)?;
    let bytes = first.marshal(&root).context("re-marshaling document")?;

    let second = Universe::with_config(config);
    let copy = second.recover(&bytes).context("recovering re-marshaled document")?;

    if let Err(mismatch) = check_equivalence(&BaseElement::from(root), &BaseElement::from(copy)) {
        bail!("round trip diverged at {}: {}", mismatch.path, mismatch.reason);
    }
    println!("ok: {} nodes survive a round trip", first.len());
    Ok(())
}

fn main() -> Result<()> {
    let config = match AcrlConfig::load() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("acrl: ignoring config: {err}");
            None
        }
    };
    init_tracing(config.as_ref());
    let universe_config = config
        .as_ref()
        .map(AcrlConfig::universe_config)
        .unwrap_or_default();

    match Command::parse(env::args().skip(1))? {
        Command::Help => {
            println!("{USAGE}");
            Ok(())
        }
        Command::Inspect(path) => inspect(&universe_config, &path),
        Command::Verify(path) => verify(&universe_config, &path),
    }
}
