use std::io::{self, Write};

use anyhow::Context;
use clap::Parser;
use env_logger::Env;

use yttool::client::{ClientConfig, HttpClient};
use yttool::link::parse_link;
use yttool::output::Printer;
use yttool::page::page_config;
use yttool::readers::{
    search_url, CommentOptions, CommentReader, DetailReader, LivechatOptions, LivechatReader, PlaylistReader,
    SearchOptions, SearchReader, SubtitleFormat, SubtitleOptions, SubtitleReader,
};

#[derive(Parser, Debug)]
#[command(
    name = "yttool",
    version,
    about = "Extract comments, subtitles, livechat, playlists and search results from YouTube"
)]
struct Cli {
    /// Log requests and raw responses
    #[arg(short, long)]
    debug: bool,

    /// Add timestamps and other details to each line
    #[arg(short, long)]
    verbose: bool,

    /// Print video comments
    #[arg(short, long)]
    comments: bool,

    /// Print video subtitles
    #[arg(short = 't', long)]
    subtitles: bool,

    /// Print playlist items
    #[arg(short = 'l', long)]
    playlist: bool,

    /// Print video info
    #[arg(short, long)]
    info: bool,

    /// Print the live chat
    #[arg(long)]
    livechat: bool,

    /// Print the live chat replay of a finished stream
    #[arg(long)]
    replay: bool,

    /// Treat the arguments as search queries
    #[arg(short, long)]
    query: bool,

    /// Output subtitles in .srt format
    #[arg(long)]
    srt: bool,

    /// Only subtitles in this language
    #[arg(long)]
    language: Option<String>,

    /// Only automatically generated subtitles
    #[arg(long)]
    auto: bool,

    /// One JSON object per line instead of text
    #[arg(long)]
    json: bool,

    /// Stop after this many search results
    #[arg(long)]
    limit: Option<usize>,

    /// Deepest reply level to follow
    #[arg(long, default_value_t = 10)]
    max_depth: usize,

    /// Delay before each request in milliseconds
    #[arg(long, default_value_t = 500)]
    delay: u64,

    /// Retries for failed requests
    #[arg(long, default_value_t = 3)]
    retries: u32,

    /// Override the x-youtube-client-version header
    #[arg(long)]
    client_version: Option<String>,

    /// Video, playlist or channel urls or ids, or search queries with --query
    #[arg(required = true)]
    ytids: Vec<String>,
}

impl Cli {
    fn has_mode(&self) -> bool {
        self.comments || self.subtitles || self.playlist || self.info || self.livechat || self.replay || self.query
    }

    fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig {
            delay_ms: self.delay,
            max_retries: self.retries,
            ..ClientConfig::default()
        };
        if let Some(version) = &self.client_version {
            config.client_version = version.clone();
        }
        config
    }
}

/// Raises the level for this crate only, so dependencies stay at `warn`.
fn log_filter(debug: bool, verbose: bool) -> &'static str {
    if debug {
        "warn,yttool=debug"
    } else if verbose {
        "warn,yttool=info"
    } else {
        "warn"
    }
}

fn report(what: &str, result: yttool::Result<usize>) {
    match result {
        Ok(count) => log::info!("{}: {} records", what, count),
        Err(e) => eprintln!("ERROR: {}: {}", what, e),
    }
}

async fn process<W: Write>(cli: &Cli, client: &HttpClient, arg: &str, printer: &mut Printer<W>) -> yttool::Result<()> {
    if cli.query {
        let cfg = page_config(client, &search_url(arg)).await?;
        let options = SearchOptions { limit: cli.limit };
        let result = match SearchReader::new(&cfg, arg, client, options) {
            Ok(reader) => reader.run(printer).await,
            Err(e) => Err(e),
        };
        report("search", result);
        return Ok(());
    }

    let link = parse_link(arg)?;
    log::info!("{:?} {}", link.kind, link.id);
    let cfg = page_config(client, &link.page_url()).await?;

    if cli.comments {
        let options = CommentOptions {
            max_depth: cli.max_depth,
        };
        let result = match CommentReader::new(&cfg, client, options) {
            Ok(reader) => reader.run(printer).await,
            Err(e) => Err(e),
        };
        report("comments", result);
    }
    if cli.subtitles {
        let options = SubtitleOptions {
            language: cli.language.clone(),
            auto: cli.auto,
            format: if cli.srt { SubtitleFormat::Srt } else { SubtitleFormat::Plain },
        };
        let result = match SubtitleReader::new(&cfg, client, options) {
            Ok(reader) => reader.run(printer).await,
            Err(e) => Err(e),
        };
        report("subtitles", result);
    }
    if cli.playlist {
        let result = match PlaylistReader::new(&cfg, client) {
            Ok(reader) => reader.run(printer).await,
            Err(e) => Err(e),
        };
        report("playlist", result);
    }
    if cli.info {
        report("info", DetailReader::new(&cfg).and_then(|reader| reader.run(printer)));
    }
    if cli.livechat || cli.replay {
        let options = LivechatOptions { replay: cli.replay };
        let result = match LivechatReader::new(&cfg, client, options) {
            Ok(reader) => reader.run(printer).await,
            Err(e) => Err(e),
        };
        report("livechat", result);
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    env_logger::init_from_env(Env::default().default_filter_or(log_filter(cli.debug, cli.verbose)));

    if !cli.has_mode() {
        println!("nothing to do");
        return Ok(());
    }

    let client = HttpClient::new(cli.client_config()).context("Failed to set up HTTP client")?;
    let stdout = io::stdout();
    let mut printer = Printer::new(stdout.lock(), cli.json, cli.verbose);

    for arg in &cli.ytids {
        printer.heading(&format!("==> {} <==", arg))?;
        if let Err(e) = process(&cli, &client, arg, &mut printer).await {
            eprintln!("ERROR: {}: {}", arg, e);
        }
    }
    Ok(())
}
