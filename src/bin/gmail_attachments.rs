use anyhow::{Result, anyhow};
use clap::{Args, Parser, Subcommand};
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use gmail_attachments::Error;
use gmail_attachments::auth::token_manager::TokenManager;
use gmail_attachments::auth::{DRIVE_FILE_SCOPE, GMAIL_READONLY_SCOPE};
use gmail_attachments::config::load_config;
use gmail_attachments::mail::extract::{AttachmentFilter, AttachmentKind};
use gmail_attachments::mail::gmail_client::GmailClient;
use gmail_attachments::prompt::{ask, default_window_now};
use gmail_attachments::run::{RunRequest, run};
use gmail_attachments::sink::{DriveSink, LocalSink, TransferSink};

#[derive(Parser)]
#[command(name = "gmail_attachments")]
#[command(about = "Fetch Gmail attachments in a date range to a folder or Google Drive", long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// OAuth client secrets file
    #[arg(long, global = true)]
    credentials: Option<PathBuf>,

    /// Where the OAuth token is cached
    #[arg(long, global = true)]
    token: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Args)]
struct RunArgs {
    /// First day of the range (YYYY-MM-DD)
    #[arg(long)]
    start: Option<String>,

    /// Last day of the range (YYYY-MM-DD)
    #[arg(long)]
    end: Option<String>,

    /// Extra Gmail search text, e.g. "from:billing@example.com"
    #[arg(long)]
    query: Option<String>,

    /// Attachment types to fetch
    #[arg(long, value_enum, value_delimiter = ',')]
    types: Vec<AttachmentKind>,

    /// Don't write the JSON run log
    #[arg(long)]
    no_log: bool,

    /// Never ask; use flags and defaults only
    #[arg(long)]
    no_prompt: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Save attachments into a local folder
    Local {
        #[command(flatten)]
        args: RunArgs,

        /// Destination folder
        #[arg(long)]
        folder: Option<PathBuf>,
    },

    /// Upload attachments to the configured Google Drive folder
    Drive {
        #[command(flatten)]
        args: RunArgs,
    },
}

/// Fills in whatever the command line left open, asking on a terminal.
struct Prompter {
    interactive: bool,
}

impl Prompter {
    fn value(&self, given: Option<String>, question: &str, default: &str) -> Result<String> {
        if let Some(v) = given {
            return Ok(v);
        }
        if !self.interactive {
            return Ok(default.to_string());
        }
        let stdin = io::stdin();
        let mut input = stdin.lock();
        let mut output = io::stdout();
        Ok(ask(&mut input, &mut output, question, default)?)
    }

    fn request(&self, args: &RunArgs) -> Result<RunRequest> {
        let (default_start, default_end) = default_window_now();
        if self.interactive {
            println!("Default date range: {default_start} to {default_end}");
        }
        let start = self.value(
            args.start.clone(),
            &format!("Enter start date (YYYY-MM-DD) or press Enter for {default_start}: "),
            &default_start,
        )?;
        let end = self.value(
            args.end.clone(),
            &format!("Enter end date (YYYY-MM-DD) or press Enter for {default_end}: "),
            &default_end,
        )?;
        let extra_query = self.value(
            args.query.clone(),
            "Enter additional search filters (optional, e.g., 'from:example@gmail.com'): ",
            "",
        )?;
        Ok(RunRequest {
            start,
            end,
            extra_query,
            save_log: !args.no_log,
        })
    }
}

/// Ctrl-C state shared between `main` and the signal handler.
#[derive(Default)]
struct Interrupt {
    /// Set while `run` is transferring; it polls `cancel` between items.
    running: AtomicBool,
    cancel: AtomicBool,
}

#[derive(Debug, PartialEq, Eq)]
enum OnCtrlC {
    /// Let the run stop at its next check.
    StopRun,
    /// Prompt, authorization or a repeated Ctrl-C: leave now.
    Exit,
}

impl Interrupt {
    fn signal(&self) -> OnCtrlC {
        if self.running.load(Ordering::SeqCst) && !self.cancel.swap(true, Ordering::SeqCst) {
            OnCtrlC::StopRun
        } else {
            OnCtrlC::Exit
        }
    }
}

fn exit_cancelled() -> ! {
    println!("\nDownload cancelled by user.");
    std::process::exit(130);
}

fn install_interrupt_handler() -> Result<Arc<Interrupt>> {
    let irq = Arc::new(Interrupt::default());
    let handler = irq.clone();
    ctrlc::set_handler(move || match handler.signal() {
        OnCtrlC::StopRun => {
            eprintln!("\nStopping after the current item; press Ctrl-C again to quit now.")
        }
        OnCtrlC::Exit => exit_cancelled(),
    })?;
    Ok(irq)
}

fn filter_for(types: &[AttachmentKind], fallback: AttachmentFilter) -> AttachmentFilter {
    if types.is_empty() {
        fallback
    } else {
        AttachmentFilter::from_kinds(types)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let cfg = load_config(cli.config.as_deref()).map_err(|e| anyhow!("Configuration error: {e}"))?;
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(cfg.log_level.as_str()),
    )
    .init();

    let irq = install_interrupt_handler()?;

    let credentials = cli.credentials.unwrap_or_else(|| cfg.credentials_file.clone());
    let token = cli.token.unwrap_or_else(|| cfg.token_file.clone());

    println!("Gmail Attachment Downloader");
    println!("{}", "=".repeat(40));

    match cli.cmd {
        Command::Local { args, folder } => {
            let prompter = Prompter {
                interactive: !args.no_prompt && io::stdin().is_terminal(),
            };
            let request = prompter.request(&args)?;
            let default_folder = cfg.download_folder.display().to_string();
            let folder = match folder {
                Some(f) => f,
                None => PathBuf::from(prompter.value(
                    None,
                    &format!("Enter download folder (or press Enter for '{default_folder}'): "),
                    &default_folder,
                )?),
            };

            let session =
                TokenManager::new(&credentials, &token, &[GMAIL_READONLY_SCOPE]).ensure_session()?;
            let mail = GmailClient::new(session)?;
            let sink = LocalSink::new(folder);
            execute(
                &mail,
                &sink,
                &filter_for(&args.types, AttachmentFilter::pdf()),
                &request,
                &irq,
            )
        }

        Command::Drive { args } => {
            let folder_id = cfg.require_drive_folder_id()?.to_string();
            let prompter = Prompter {
                interactive: !args.no_prompt && io::stdin().is_terminal(),
            };
            let request = prompter.request(&args)?;

            let session = TokenManager::new(
                &credentials,
                &token,
                &[GMAIL_READONLY_SCOPE, DRIVE_FILE_SCOPE],
            )
            .ensure_session()?;
            let mail = GmailClient::new(session.clone())?;
            let sink = DriveSink::new(session, folder_id)?;
            execute(
                &mail,
                &sink,
                &filter_for(&args.types, AttachmentFilter::pdf_and_docx()),
                &request,
                &irq,
            )
        }
    }
}

fn execute(
    mail: &GmailClient,
    sink: &dyn TransferSink,
    filter: &AttachmentFilter,
    request: &RunRequest,
    irq: &Interrupt,
) -> Result<()> {
    println!(
        "\nStarting transfer from {} to {}...",
        request.start, request.end
    );

    irq.running.store(true, Ordering::SeqCst);
    let outcome = run(mail, sink, filter, request, &irq.cancel);
    irq.running.store(false, Ordering::SeqCst);

    match outcome {
        Ok(summary) => {
            println!("\n{summary}");
            println!("\nTransfer completed!");
            Ok(())
        }
        Err(Error::Interrupted) => exit_cancelled(),
        Err(e) => Err(e.into()),
    }
}
