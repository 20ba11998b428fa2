use std::{path::PathBuf, time::Duration};

use clap::{Parser, Subcommand};
use ecyber_harvest::{
    auth_gate,
    capture::CapturePolicy,
    config::{BrowserOptions, NavigationTimings, DEFAULT_SCHOOL_DOMAIN, DEFAULT_WEBDRIVER_URL},
    portal::{
        browser::EcyberPortal, fetcher::HttpSegmentFetcher, media_handler::FfmpegWrapper,
        MediaHandler, Portal, SegmentFetcher, VideoPlayer,
    },
    tracing::{init_tracing_subscriber, LogFormat},
    types::{Credentials, SubjectSelection, WeekSelection},
    AuthHandle, HarvestContext, LectureHarvester, LectureHarvesterBuilder,
};
use ffmpeg_bindings::Ffmpeg;
use itertools::Itertools;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "ecyber-harvest", about = "Lecture audio downloader for the e-cyber portal")]
struct Cli {
    /// Portal login id
    #[arg(long, env = "ECYBER_USERNAME")]
    username: String,

    /// Portal password
    #[arg(long, env = "ECYBER_PASSWORD", hide_env_values = true)]
    password: String,

    /// Root folder for downloaded lectures
    #[arg(long, env = "ECYBER_DOWNLOAD_DIR", default_value = "downloads")]
    download_dir: PathBuf,

    /// Run Chrome without a window
    #[arg(long, env = "ECYBER_HEADLESS")]
    headless: bool,

    /// WebDriver server (chromedriver) URL
    #[arg(long, env = "WEBDRIVER_URL", default_value = DEFAULT_WEBDRIVER_URL)]
    webdriver_url: String,

    #[arg(long, env = "ECYBER_SCHOOL_DOMAIN", default_value = DEFAULT_SCHOOL_DOMAIN)]
    school_domain: String,

    /// Delay after each read of the player's video source
    #[arg(long, env = "ECYBER_POLL_INTERVAL_MS", default_value = "1000")]
    poll_interval_ms: u64,

    /// Consecutive polls without a new segment before giving up on a lecture
    #[arg(long, env = "ECYBER_MAX_MISSED_POLLS", default_value = "999")]
    max_missed_polls: u32,

    /// Download lectures again even when their MP3 exists
    #[arg(long)]
    no_skip_existing: bool,

    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,

    /// Debug-level logs for this tool
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List enrolled subjects
    Subjects {
        /// Print JSON instead of plain lines
        #[arg(long)]
        json: bool,
    },
    /// List weeks that have downloadable lectures
    Weeks {
        /// Subject title or course token
        #[arg(long)]
        subject: String,
    },
    /// Download lectures and extract their audio
    Download {
        /// Subject title, course token, or `all`
        #[arg(long)]
        subject: String,

        /// Week number, 0 for every week
        #[arg(long, default_value = "0")]
        week: u32,

        /// Print the run summary as JSON
        #[arg(long)]
        json: bool,
    },
}

impl Cli {
    fn capture_policy(&self) -> CapturePolicy {
        let mut policy = CapturePolicy {
            poll_delay: Duration::from_millis(self.poll_interval_ms),
            ..Default::default()
        };
        policy.misses.max_attempts = self.max_missed_polls;
        policy
    }
}

/// Waits for the harvester to hit secondary authentication and confirms once
/// the user presses Enter.
async fn prompt_for_auth(handle: AuthHandle) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        handle.requested().await;
        tracing::warn!("Complete the identity check in the browser, then press Enter");

        match lines.next_line().await {
            Ok(Some(_)) => {
                handle.confirm();
            }
            Ok(None) => {
                tracing::warn!("stdin closed, secondary authentication cannot be confirmed");
                return;
            }
            Err(e) => {
                tracing::error!(error = ?e, "Failed to read stdin");
                return;
            }
        }
    }
}

async fn run<P, F, M>(
    harvester: &LectureHarvester<P, F, M>,
    credentials: &Credentials,
    command: Command,
) -> anyhow::Result<()>
where
    P: Portal + VideoPlayer,
    F: SegmentFetcher,
    M: MediaHandler,
{
    let mut ctx = HarvestContext::new();
    harvester.sign_in(credentials).await?;
    let subjects = harvester.load_subjects(&mut ctx).await?;

    match command {
        Command::Subjects { json: true } => {
            println!("{}", serde_json::to_string_pretty(&subjects)?);
        }
        Command::Subjects { json: false } => {
            println!(
                "{}",
                subjects
                    .iter()
                    .map(|s| format!("{}\t{}", s.token, s.title))
                    .join("\n")
            );
        }
        Command::Weeks { subject } => {
            let subject = ctx.find_subject(&subject)?.clone();
            let weeks = harvester.load_weeks(&mut ctx, &subject).await?;
            println!("{}: {}", subject.title, weeks.iter().join(", "));
        }
        Command::Download {
            subject,
            week,
            json,
        } => {
            let selection = if subject.eq_ignore_ascii_case("all") {
                SubjectSelection::All
            } else {
                SubjectSelection::One(ctx.find_subject(&subject)?.clone())
            };

            let summary = harvester
                .download(&mut ctx, &selection, WeekSelection::from(week))
                .await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!(
                    "completed: {}, incomplete: {}, skipped: {}, failed: {}{}",
                    summary.completed,
                    summary.incomplete,
                    summary.skipped,
                    summary.failed.len(),
                    if summary.cancelled { " (stopped)" } else { "" }
                );
                for failure in &summary.failed {
                    println!("  failed: {failure}");
                }
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let _guard = sentry::init((
        std::env::var("SENTRY_DSN").unwrap_or_default(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    ));

    let cli = Cli::parse();
    init_tracing_subscriber(cli.log_format, cli.verbose)?;

    let credentials = Credentials {
        username: cli.username.clone(),
        password: cli.password.clone(),
    };
    let browser = BrowserOptions {
        webdriver_url: cli.webdriver_url.clone(),
        headless: cli.headless,
    };

    let cancel = CancellationToken::new();
    let (gate, handle) = auth_gate();
    tokio::spawn(prompt_for_auth(handle));
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Stop requested, finishing up");
                cancel.cancel();
            }
        }
    });

    let portal =
        EcyberPortal::connect(&browser, &cli.school_domain, NavigationTimings::default()).await?;
    let fetcher = HttpSegmentFetcher::new(Ffmpeg::default())?;

    let harvester = LectureHarvesterBuilder::new(&cli.download_dir)
        .portal(portal)
        .fetcher(fetcher)
        .media_handler(FfmpegWrapper::default())
        .skip_existing(!cli.no_skip_existing)
        .capture_policy(cli.capture_policy())
        .auth_gate(gate)
        .cancellation_token(cancel)
        .build();

    let result = run(&harvester, &credentials, cli.command).await;
    harvester.shutdown().await;

    result.inspect_err(|e| tracing::error!(error = ?e, "Run failed"))
}
