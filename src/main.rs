//! Quill - CLI

use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use quill::backends::dev::repl::batch::{self, BatchOptions};
use quill::backends::dev::{LineRepl, Playground};
use quill::util::config::{load_config_from, load_user_config, DiagnosticFormat, UserConfig};
use quill::util::logger;
use quill::{session, NAME, VERSION};

/// Interactive session controller for script evaluators
#[derive(Parser, Debug)]
#[command(name = "quill")]
#[command(author = "Quill Team")]
#[command(version = VERSION)]
#[command(about = NAME, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Configuration file to use instead of the user config
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the interactive REPL
    Repl,

    /// Run a script file (`-` reads stdin)
    Run {
        /// Script to run
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Diagnostic format on stderr
        #[arg(long, value_enum)]
        diagnostics: Option<Format>,
    },

    /// Evaluate code from the command line
    Eval {
        /// Code to evaluate
        #[arg(value_name = "CODE")]
        code: String,

        /// Diagnostic format on stderr
        #[arg(long, value_enum)]
        diagnostics: Option<Format>,
    },

    /// Check a script for syntax errors without running it
    Check {
        /// Script to check
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Diagnostic format on stderr
        #[arg(long, value_enum)]
        diagnostics: Option<Format>,
    },

    /// Open the TUI playground
    Playground {
        /// Script to load into the editor
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Print version information
    Version,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
}

impl From<Format> for DiagnosticFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Text => DiagnosticFormat::Text,
            Format::Json => DiagnosticFormat::Json,
        }
    }
}

/// Where a script came from
struct Script {
    name: String,
    text: String,
    from_stdin: bool,
}

fn read_script(path: &Path) -> Result<Script> {
    if path == Path::new("-") {
        let mut text = String::new();
        io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read script from stdin")?;
        return Ok(Script {
            name: "<stdin>".to_string(),
            text,
            from_stdin: true,
        });
    }
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;
    Ok(Script {
        name: path.display().to_string(),
        text,
        from_stdin: false,
    })
}

fn load_config(args: &Args) -> Result<UserConfig> {
    match &args.config {
        Some(path) => load_config_from(path)
            .with_context(|| format!("Failed to load config: {}", path.display())),
        None => load_user_config().context("Failed to load user config"),
    }
}

fn batch_options(
    config: &UserConfig,
    name: String,
    diagnostics: Option<Format>,
) -> BatchOptions {
    BatchOptions {
        source_name: name,
        diagnostics: diagnostics.map_or(config.run.diagnostics, Into::into),
        colors: config.repl.colors && io::stderr().is_terminal(),
        handle_interrupts: true,
    }
}

async fn run_batch(
    config: &UserConfig,
    script: Script,
    diagnostics: Option<Format>,
) -> Result<i32> {
    let options = batch_options(config, script.name, diagnostics);
    let mut controller = session(&config.repl);
    // Readline answers come from stdin unless the script itself did
    let answers = (!script.from_stdin).then(|| BufReader::new(tokio::io::stdin()).lines());
    batch::run(
        &mut controller,
        &script.text,
        &options,
        answers,
        &mut io::stdout(),
        &mut io::stderr(),
    )
    .await
}

async fn dispatch(
    command: Commands,
    config: &UserConfig,
) -> Result<i32> {
    match command {
        Commands::Repl => {
            let repl = LineRepl::new(session(&config.repl), &config.repl)
                .context("Failed to start REPL")?;
            repl.run().await?;
            Ok(0)
        }
        Commands::Run { file, diagnostics } => {
            let script = read_script(&file)?;
            run_batch(config, script, diagnostics)
                .await
                .with_context(|| format!("Failed to run: {}", file.display()))
        }
        Commands::Eval { code, diagnostics } => {
            let script = Script {
                name: "<eval>".to_string(),
                text: code,
                from_stdin: false,
            };
            run_batch(config, script, diagnostics)
                .await
                .context("Failed to evaluate code")
        }
        Commands::Check { file, diagnostics } => {
            let script = read_script(&file)?;
            let options = batch_options(config, script.name, diagnostics);
            batch::check(
                &session(&config.repl),
                &script.text,
                &options,
                &mut io::stderr(),
            )
        }
        Commands::Playground { file } => {
            let source = file
                .as_deref()
                .map(read_script)
                .transpose()?
                .map(|script| script.text);
            Playground::new(session(&config.repl), source)
                .context("Failed to start playground")?
                .run()
                .await?;
            Ok(0)
        }
        Commands::Version => {
            println!("{} {}", NAME, VERSION);
            Ok(0)
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;
    let level = config.log.level.raised_by(args.verbose);

    let playground = matches!(args.command, Commands::Playground { .. });
    match (&config.log.file, playground) {
        (Some(file), _) => logger::init_to_file(level, file)
            .with_context(|| format!("Failed to open log file: {}", file.display()))?,
        // The playground owns the terminal; without a log file it stays silent
        (None, true) => {}
        (None, false) => logger::init_with_level(level),
    }
    debug!(version = VERSION, "starting");

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    let code = runtime.block_on(dispatch(args.command, &config));

    // Blocking stdin reads must not hold up exit
    runtime.shutdown_background();
    let code = code?;
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
