use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use seqlstm::commands::{self, sample::PolicyArg, train::TrainArgs};

#[derive(Parser)]
#[command(name = "seqlstm")]
#[command(version)]
#[command(about = "Stacked LSTM sequence models: train, sample, freeze")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Trains a char-level model on a text file
    Train(TrainArgs),

    /// Continues training from the newest checkpoint
    Resume {
        #[arg(short, long)]
        checkpoint_dir: PathBuf,
        #[arg(short, long)]
        data: PathBuf,
        /// Overrides the saved epoch count
        #[arg(long)]
        num_epochs: Option<usize>,
    },

    /// Generates text from a checkpoint
    Sample {
        #[arg(short, long)]
        checkpoint_dir: PathBuf,
        #[arg(short = 'n', long, default_value = "500")]
        length: usize,
        #[arg(long, default_value = " ")]
        prime: String,
        #[arg(long, default_value = "1.0")]
        temperature: f32,
        #[arg(long, value_enum, default_value = "stochastic")]
        policy: PolicyArg,
        #[arg(long, default_value = "42")]
        seed: u64,
    },

    /// Exports a frozen inference graph
    Freeze {
        #[arg(short, long)]
        checkpoint_dir: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        #[arg(long, default_value = "100")]
        seq_window: usize,
    },

    /// Loss and perplexity of a checkpoint on a text file
    Eval {
        #[arg(short, long)]
        checkpoint_dir: PathBuf,
        #[arg(short, long)]
        data: PathBuf,
        #[arg(long)]
        max_batches: Option<usize>,
    },

    /// Shows a model configuration
    Info {
        #[arg(long, default_value = "char")]
        preset: String,
        #[arg(long)]
        vocab_size: Option<usize>,
        #[arg(long)]
        hidden_size: Option<usize>,
        #[arg(long)]
        num_layers: Option<usize>,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    tracing::debug!(backend = seqlstm::backend_name(), "starting");

    let result = match cli.command {
        Commands::Train(args) => commands::train::execute(&args),
        Commands::Resume {
            checkpoint_dir,
            data,
            num_epochs,
        } => commands::resume::execute(&checkpoint_dir, &data, num_epochs),
        Commands::Sample {
            checkpoint_dir,
            length,
            prime,
            temperature,
            policy,
            seed,
        } => commands::sample::execute(&checkpoint_dir, length, &prime, temperature, policy, seed),
        Commands::Freeze {
            checkpoint_dir,
            output,
            seq_window,
        } => commands::freeze::execute(&checkpoint_dir, &output, seq_window),
        Commands::Eval {
            checkpoint_dir,
            data,
            max_batches,
        } => commands::eval::execute(&checkpoint_dir, &data, max_batches),
        Commands::Info {
            preset,
            vocab_size,
            hidden_size,
            num_layers,
        } => commands::info::execute(&preset, vocab_size, hidden_size, num_layers),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(category = ?e.category(), "{e}");
            eprintln!("❌ {e}");
            ExitCode::FAILURE
        }
    }
}
