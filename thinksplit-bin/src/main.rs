use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use futures_util::StreamExt;
use thinksplit_core::{
    config::{Config, ExtractorCfg, LoggingCfg},
    extractor::ReasoningExtractor,
    middleware::ReasoningProvider,
    model::ChatRequest,
    provider::{ScriptedProvider, StreamProvider},
    stream::StreamEvent,
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Split tagged reasoning out of model output streams", long_about = None)]
struct Cli {
    /// JSON or TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct TagArgs {
    /// Tag name without brackets, e.g. `think` (overrides config)
    #[arg(long)]
    tag: Option<String>,
    /// Inserted when a channel resumes after the block; `\n` and `\t` are unescaped
    #[arg(long)]
    separator: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay raw model output as a chunked stream (text to stdout, reasoning to stderr)
    Split {
        #[command(flatten)]
        tags: TagArgs,
        /// Characters per replayed delta
        #[arg(long, default_value_t = 4)]
        chunk_size: usize,
        /// Print both channels to stdout under [reasoning]/[text] headers
        #[arg(long)]
        labels: bool,
        /// Input file (stdin when omitted)
        input: Option<PathBuf>,
    },
    /// Transform a JSON Lines event stream; unrecognised lines pass through verbatim
    Events {
        #[command(flatten)]
        tags: TagArgs,
        /// Input file (stdin when omitted)
        input: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let base = match &cli.config {
        Some(path) => Config::from_path(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => Config {
            extractor: ExtractorCfg::new("think"),
            logging: LoggingCfg::default(),
        },
    };
    init_tracing(&base.logging);

    match cli.command {
        Commands::Split {
            tags,
            chunk_size,
            labels,
            input,
        } => {
            let cfg = resolve_extractor(base.extractor, &tags)?;
            let text = read_input(input.as_ref())?;
            run_split(&text, cfg, chunk_size, labels).await?;
        }
        Commands::Events { tags, input } => {
            let cfg = resolve_extractor(base.extractor, &tags)?;
            let reader: Box<dyn BufRead> = match &input {
                Some(path) => Box::new(BufReader::new(
                    File::open(path).with_context(|| format!("opening {}", path.display()))?,
                )),
                None => Box::new(io::stdin().lock()),
            };
            run_events(reader, &cfg, &mut io::stdout().lock())?;
        }
    }

    Ok(())
}

fn init_tracing(logging: &LoggingCfg) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(logging.ansi)
        .with_writer(io::stderr)
        .init();
}

fn resolve_extractor(mut cfg: ExtractorCfg, args: &TagArgs) -> anyhow::Result<ExtractorCfg> {
    if let Some(tag) = &args.tag {
        cfg.tag_name = tag.clone();
    }
    if let Some(sep) = &args.separator {
        cfg.separator = unescape(sep);
    }
    cfg.validate()?;
    Ok(cfg)
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

fn read_input(path: Option<&PathBuf>) -> anyhow::Result<String> {
    match path {
        Some(p) => std::fs::read_to_string(p).with_context(|| format!("reading {}", p.display())),
        None => {
            let mut s = String::new();
            io::stdin().read_to_string(&mut s)?;
            Ok(s)
        }
    }
}

async fn run_split(
    text: &str,
    cfg: ExtractorCfg,
    chunk_size: usize,
    labels: bool,
) -> anyhow::Result<()> {
    let provider = ReasoningProvider::new(ScriptedProvider::from_text(text, chunk_size), cfg)?;
    let mut stream = provider.stream(ChatRequest::user("replay", "")).await?;

    let mut stdout = io::stdout().lock();
    let mut stderr = io::stderr().lock();
    let mut current: Option<&str> = None;
    while let Some(ev) = stream.next().await {
        let (label, delta) = match ev {
            StreamEvent::ReasoningDelta { delta, .. } => ("reasoning", delta),
            StreamEvent::TextDelta { delta, .. } => ("text", delta),
            StreamEvent::Error { message } => anyhow::bail!("upstream error: {message}"),
            _ => continue,
        };
        if labels {
            if current != Some(label) {
                if current.is_some() {
                    writeln!(stdout)?;
                }
                writeln!(stdout, "[{label}]")?;
                current = Some(label);
            }
            write!(stdout, "{delta}")?;
            stdout.flush()?;
        } else if label == "reasoning" {
            write!(stderr, "{delta}")?;
            stderr.flush()?;
        } else {
            write!(stdout, "{delta}")?;
            stdout.flush()?;
        }
    }
    writeln!(stdout)?;
    Ok(())
}

fn run_events(reader: impl BufRead, cfg: &ExtractorCfg, out: &mut impl Write) -> anyhow::Result<()> {
    let mut extractor = ReasoningExtractor::new(cfg)?;
    let mut queue = VecDeque::new();
    for (n, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<StreamEvent>(&line) {
            Ok(ev) => {
                extractor.process(ev, &mut queue);
                write_events(out, &mut queue)?;
            }
            Err(err) => {
                debug!(line = n + 1, %err, "forwarding unrecognised line verbatim");
                writeln!(out, "{line}")?;
            }
        }
    }
    extractor.finish(&mut queue);
    write_events(out, &mut queue)?;
    out.flush()?;
    Ok(())
}

fn write_events(out: &mut impl Write, queue: &mut VecDeque<StreamEvent>) -> anyhow::Result<()> {
    for ev in queue.drain(..) {
        serde_json::to_writer(&mut *out, &ev)?;
        writeln!(out)?;
    }
    Ok(())
}
