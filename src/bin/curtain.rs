use std::{
    fs::File,
    io::{BufReader, Read as _},
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use curtain::{
    AudioSink, Director, Ending, JournalEntry, ManualClock, MemoryAudio, MemoryPage, MemoryVideo,
    Millis, Runtime, ShowConfig, VideoScript, VideoSink,
};

#[derive(Parser, Debug)]
#[command(name = "curtain", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the whole sequence against an in-memory page and print the journal.
    Simulate(SimulateArgs),
    /// Print the default show configuration as JSON.
    Config,
}

#[derive(Parser, Debug)]
struct SimulateArgs {
    /// Show configuration JSON (fields not given keep their defaults).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the configured ending.
    #[arg(long, value_enum)]
    ending: Option<EndingChoice>,

    /// Unlock audio inside the begin gesture.
    #[arg(long)]
    ios_unlock: bool,

    /// Number of detail items on the page.
    #[arg(long, default_value_t = 4)]
    details: usize,

    /// Number of cards on the page.
    #[arg(long, default_value_t = 3)]
    cards: usize,

    /// Simulate a page without the audio element.
    #[arg(long)]
    no_audio: bool,

    /// Simulate a page without the video element.
    #[arg(long)]
    no_video: bool,

    /// Reject every `play()` (autoplay policy).
    #[arg(long)]
    deny_autoplay: bool,

    /// Video load latency in ms; omit readiness entirely with `--video-never-ready`.
    #[arg(long, default_value_t = 250)]
    video_ready_ms: u64,

    #[arg(long)]
    video_never_ready: bool,

    /// Number of initial video loads that fail.
    #[arg(long, default_value_t = 0)]
    video_errors: u32,

    /// Video length in ms.
    #[arg(long, default_value_t = 10_000)]
    video_ms: u64,

    /// Give up after this much virtual time.
    #[arg(long, default_value_t = 120_000)]
    limit_ms: u64,

    /// Print the journal as JSON instead of text.
    #[arg(long)]
    json: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum EndingChoice {
    ScrollReveal,
    EndSequence,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(tracing::Level::WARN)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Simulate(args) => cmd_simulate(args),
        Command::Config => cmd_config(),
    }
}

fn read_config(path: &Path) -> anyhow::Result<ShowConfig> {
    let f = File::open(path).with_context(|| format!("open config '{}'", path.display()))?;
    let mut s = String::new();
    BufReader::new(f)
        .read_to_string(&mut s)
        .with_context(|| format!("read config '{}'", path.display()))?;
    let cfg = ShowConfig::from_json_str(&s).with_context(|| "parse show config JSON")?;
    Ok(cfg)
}

fn cmd_config() -> anyhow::Result<()> {
    println!("{}", ShowConfig::default().to_json_pretty()?);
    Ok(())
}

fn cmd_simulate(args: SimulateArgs) -> anyhow::Result<()> {
    let mut config = match &args.config {
        Some(path) => read_config(path)?,
        None => ShowConfig::default(),
    };
    if let Some(ending) = args.ending {
        config.ending = match ending {
            EndingChoice::ScrollReveal => Ending::ScrollReveal,
            EndingChoice::EndSequence => Ending::EndSequence,
        };
    }
    if args.ios_unlock {
        config.ios_audio_unlock = true;
    }

    let mut page = MemoryPage::standard(args.details, args.cards);
    if args.no_video {
        page = page.without(curtain::ElementKey::Video);
    }

    let audio: Option<Box<dyn AudioSink>> = match (args.no_audio, args.deny_autoplay) {
        (true, _) => None,
        (false, true) => Some(Box::new(MemoryAudio::denying())),
        (false, false) => Some(Box::new(MemoryAudio::new())),
    };
    let video: Option<Box<dyn VideoSink>> = (!args.no_video).then(|| {
        Box::new(MemoryVideo::new(VideoScript {
            ready_after: (!args.video_never_ready).then_some(Millis(args.video_ready_ms)),
            errors_before_ready: args.video_errors,
            buffered: true,
            deny_play: args.deny_autoplay,
            duration: Millis(args.video_ms),
        })) as Box<dyn VideoSink>
    });

    let director = Director::new(config, Box::new(page), audio, video)?;
    let mut rt = Runtime::new(director, ManualClock::new());
    rt.begin();
    let finished = rt.run_until_done(Millis(args.limit_ms));

    if args.json {
        let out = serde_json::json!({
            "finished": finished,
            "ended_at": rt.now(),
            "journal": rt.journal(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        for entry in rt.journal().entries() {
            match entry {
                JournalEntry::Transition { at, from, to } => {
                    println!("{:>8}  {from:?} -> {to:?}", at.to_string());
                }
                JournalEntry::Fault { at, fault } => {
                    println!("{:>8}  fault {}: {fault:?}", at.to_string(), fault.kind());
                }
            }
        }
        let status = if finished { "done" } else { "stalled" };
        println!("{status} at {:.3}s", rt.now().as_secs_f64());
    }

    if !finished {
        eprintln!("sequence did not finish within {}ms", args.limit_ms);
    }
    Ok(())
}
