use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use flowkey::config::{self, Config};
use flowkey::conversation::Conversation;
use flowkey::diagram::{
    self, DiagramGenerator, DiagramOutcome, GenerationReport, ProviderExecutor, ScriptValidator,
};
use flowkey::logging;
use flowkey::provider::{self, Provider};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "flowkey")]
#[command(version = env!("FLOWKEY_VERSION"))]
#[command(about = "Turn a chat conversation into a workflow diagram")]
struct Args {
    /// Log per-attempt details and provider traffic to the log file
    #[arg(long, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a diagram from a saved conversation (JSON array of messages)
    Diagram {
        history: PathBuf,

        /// Append the accepted script to the conversation file
        #[arg(long)]
        save: bool,

        /// Print what each attempt produced
        #[arg(long)]
        report: bool,
    },

    /// Clean and validate a script file
    Validate { file: PathBuf },

    /// Clean, validate and render a script file as a text preview
    Render { file: PathBuf },

    /// Show the effective configuration
    Config {
        /// Write a commented default config file
        #[arg(long)]
        init: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();

    if args.trace {
        // SAFETY: single-threaded runtime, set before anything reads the environment
        unsafe { std::env::set_var("FLOWKEY_TRACE", "1") };
    }

    logging::init();
    logging::cleanup_old_logs();
    logging::info(&format!(
        "flowkey {} ({}) starting",
        env!("FLOWKEY_VERSION"),
        env!("FLOWKEY_GIT_HASH")
    ));

    match run_main(args).await {
        Ok(code) => code,
        Err(e) => {
            logging::error(&format!("{:?}", e));
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run_main(args: Args) -> Result<ExitCode> {
    match args.command {
        Command::Diagram {
            history,
            save,
            report,
        } => run_diagram(&history, save, report).await,
        Command::Validate { file } => run_validate(&file),
        Command::Render { file } => run_render(&file),
        Command::Config { init } => {
            if init {
                let path = Config::create_default_config_file()?;
                println!("Wrote {}", path.display());
            } else {
                println!("{}", config::config().display_string());
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn run_diagram(history: &Path, save: bool, report: bool) -> Result<ExitCode> {
    let mut conversation = Conversation::load(history)?;
    let cfg = config::config();

    let provider: Arc<dyn Provider> =
        Arc::new(provider::openai::OpenAIProvider::new(&cfg.provider));
    logging::set_provider_info(provider.name(), &provider.model());

    let generator = DiagramGenerator::from_config(ProviderExecutor::new(provider), &cfg.diagram);
    let outcome = generator.generate_with_report(conversation.messages()).await;
    if report {
        print_report(&outcome);
    }

    match outcome.result {
        Ok(DiagramOutcome::Diagram(script)) => {
            println!("{}\n", script);
            print_preview(&script);
            if save {
                conversation.push_diagram(script.as_str());
                conversation.save(history)?;
                logging::info(&format!("Saved diagram to {}", history.display()));
            }
            Ok(ExitCode::SUCCESS)
        }
        Ok(DiagramOutcome::NoDiagram) => {
            println!("No diagram is possible for this conversation.");
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            eprintln!("{}", err);
            Ok(ExitCode::FAILURE)
        }
    }
}

fn print_report(report: &GenerationReport) {
    for attempt in &report.attempts {
        let status = if attempt.valid { "accepted" } else { "rejected" };
        eprintln!(
            "attempt {} [{}] {}",
            attempt.index,
            attempt.tier.label(),
            status
        );
        if let Some(failure) = &attempt.failure {
            eprintln!("  reason: {}", failure);
        }
        if let Some(raw) = &attempt.raw {
            eprintln!("  raw: {}", flowkey::util::preview(raw, 160));
        }
    }
}

fn print_preview(script: &diagram::DiagramScript) {
    match diagram::render(script) {
        Ok(rendered) => {
            for line in rendered.to_lines() {
                println!("{}", line);
            }
        }
        Err(err) => {
            logging::warn(&format!("Render failed: {}", err));
            for line in err.to_lines() {
                eprintln!("{}", line);
            }
        }
    }
}

fn read_script(file: &Path, validator: &ScriptValidator) -> Result<String> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    Ok(diagram::clean::clean_with_types(&raw, validator.diagram_types()))
}

fn run_validate(file: &Path) -> Result<ExitCode> {
    let validator = ScriptValidator::from_config(&config::config().diagram);
    let cleaned = read_script(file, &validator)?;
    if diagram::is_no_diagram(&cleaned) {
        println!("{} (no diagram)", diagram::NO_DIAGRAM);
        return Ok(ExitCode::SUCCESS);
    }
    match validator.check(&cleaned) {
        Ok(kind) => {
            println!("valid ({})", kind);
            Ok(ExitCode::SUCCESS)
        }
        Err(issue) => {
            println!("invalid: {}", issue);
            Ok(ExitCode::FAILURE)
        }
    }
}

fn run_render(file: &Path) -> Result<ExitCode> {
    let validator = ScriptValidator::from_config(&config::config().diagram);
    let cleaned = read_script(file, &validator)?;
    let script = match validator.accept(&cleaned) {
        Ok(script) => script,
        Err(issue) => {
            eprintln!("invalid: {}", issue);
            return Ok(ExitCode::FAILURE);
        }
    };
    match diagram::render(&script) {
        Ok(rendered) => {
            for line in rendered.to_lines() {
                println!("{}", line);
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            for line in err.to_lines() {
                eprintln!("{}", line);
            }
            Ok(ExitCode::FAILURE)
        }
    }
}
