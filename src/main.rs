use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::PathBuf;

use clap::Parser;
use tracing::{info, Level};

use adaptable_topk::{command, Error, TopKSelector};

/// Reads `<element> <key>` / `del <element>` lines and prints the top k.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Number of elements to keep
    #[arg(allow_negative_numbers = true)]
    k: i64,

    /// Read commands from this file instead of stdin
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Log promotions and demotions
    #[arg(short, long)]
    debug: bool,
}

fn main() {
    let args = Args::parse();

    let level = if args.debug { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .init();

    let mut out = BufWriter::new(io::stdout().lock());
    if let Err(err) = run(&args, io::stdin().lock(), &mut out) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

/// Applies the commands from `--input`, or from `stdin` when no file is
/// given, and writes the retained set to `out` as `element key` lines.
fn run<R: Read, W: Write>(args: &Args, mut stdin: R, out: &mut W) -> Result<(), Error> {
    let mut selector: TopKSelector<String, f64> = TopKSelector::try_new(args.k)?;

    let mut text = String::new();
    match &args.input {
        Some(path) => BufReader::new(File::open(path)?).read_to_string(&mut text)?,
        None => stdin.read_to_string(&mut text)?,
    };
    let applied = command::apply_all(&text, &mut selector)?;

    info!(
        applied,
        tracked = selector.len(),
        retained = selector.retained_len(),
        "processed input"
    );

    for (element, key) in selector.top() {
        writeln!(out, "{} {}", element, key)?;
    }
    out.flush()?;
    Ok(())
}
