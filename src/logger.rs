use indicatif::{ProgressBar, ProgressStyle};
use tracing::Level;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub enum VerbosityLevel {
    Summary = 0,  // Progress, per-run counts, warnings (default)
    Detailed = 1, // Per-address outcomes and requests
    Debug = 2,    // Everything, including dependencies
}

impl VerbosityLevel {
    pub fn from_verbose_count(count: u8) -> Self {
        match count {
            0 => VerbosityLevel::Summary,
            1 => VerbosityLevel::Detailed,
            2.. => VerbosityLevel::Debug,
        }
    }

    fn level(&self) -> Level {
        match self {
            VerbosityLevel::Summary => Level::INFO,
            VerbosityLevel::Detailed => Level::DEBUG,
            VerbosityLevel::Debug => Level::TRACE,
        }
    }

    /// Filter applied when RUST_LOG is not set. Below Debug, only this crate logs verbosely.
    fn default_filter(&self) -> String {
        match self {
            VerbosityLevel::Debug => self.level().to_string().to_lowercase(),
            _ => format!("warn,icardfinder={}", self.level().to_string().to_lowercase()),
        }
    }
}

/// Install the global tracing subscriber. RUST_LOG, when set, wins over the verbosity flag.
pub fn init_tracing(verbosity: VerbosityLevel, no_color: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.default_filter()));

    let result = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(!no_color && std::env::var_os("NO_COLOR").is_none())
        .with_target(verbosity >= VerbosityLevel::Debug)
        .try_init();

    if let Err(e) = result {
        eprintln!("Warning: tracing subscriber already installed: {}", e);
    }
}

/// Progress bar over the items of one run
#[derive(Clone)]
pub struct RunProgress {
    bar: ProgressBar,
}

impl RunProgress {
    /// Visible bar drawing to stderr
    pub fn new(total: u64) -> Self {
        let bar = ProgressBar::new(total);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
                .unwrap_or_else(|_| {
                    // Fallback to a simpler template if the complex one fails
                    ProgressStyle::default_bar()
                        .template("{bar:40} {pos}/{len} {msg}")
                        .unwrap_or_else(|_| ProgressStyle::default_bar())
                })
                .progress_chars("##-"),
        );
        bar.set_message("Starting...");
        Self { bar }
    }

    /// Bar that tracks position but never draws (tests, --no-progress)
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    pub fn set_total(&self, total: u64) {
        self.bar.set_length(total);
    }

    /// One more item has a recorded outcome
    pub fn advance(&self, found: usize, not_found: usize, failed: usize) {
        self.bar.inc(1);
        self.bar
            .set_message(format!("found {} | none {} | failed {}", found, not_found, failed));
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}
