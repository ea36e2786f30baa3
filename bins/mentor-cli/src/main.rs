mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "mentor-cli")]
#[command(about = "Mentor CLI - Seed problems and prompts, submit solutions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Redis connection URL for seeding commands
    #[arg(long, global = true, default_value = "redis://127.0.0.1:6379")]
    redis_url: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Seed the test cases for a problem from a JSON file
    SeedTests {
        /// Problem identifier (e.g., two-sum)
        #[arg(short, long)]
        problem: String,

        /// Path to a JSON file containing an array of test cases
        #[arg(short, long)]
        file: String,
    },

    /// Seed the problem description used for AI feedback
    SeedDescription {
        /// Problem identifier
        #[arg(short, long)]
        problem: String,

        /// Path to a text file with the problem description
        #[arg(short, long)]
        file: String,
    },

    /// Seed the approach rubric that gates approach validation
    SeedApproach {
        /// Problem identifier
        #[arg(short, long)]
        problem: String,

        /// Path to a text file with the approach rubric
        #[arg(short, long)]
        file: String,
    },

    /// Seed the tutor system prompt for one problem step
    SeedStep {
        /// Problem identifier
        #[arg(short, long)]
        problem: String,

        /// Step identifier (e.g., step-1)
        #[arg(short, long)]
        step: String,

        /// Path to a text file with the step's system prompt
        #[arg(short, long)]
        file: String,
    },

    /// Seed the problem-independent general-chat system prompt
    SeedGeneral {
        /// Path to a text file with the general-chat system prompt
        #[arg(short, long)]
        file: String,
    },

    /// Submit a solution file to a running Mentor API and print the verdict
    Submit {
        /// Problem identifier
        #[arg(short, long)]
        problem: String,

        /// Submission language (e.g., python, javascript)
        #[arg(short, long)]
        language: String,

        /// Path to the solution source file
        #[arg(short, long)]
        file: String,

        /// Base URL of the Mentor API
        #[arg(long, default_value = "http://localhost:3000")]
        api_url: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::SeedTests { problem, file } => {
            commands::seed_tests(&cli.redis_url, &problem, &file).await?;
        }
        Commands::SeedDescription { problem, file } => {
            commands::seed_description(&cli.redis_url, &problem, &file).await?;
        }
        Commands::SeedApproach { problem, file } => {
            commands::seed_approach(&cli.redis_url, &problem, &file).await?;
        }
        Commands::SeedStep {
            problem,
            step,
            file,
        } => {
            commands::seed_step(&cli.redis_url, &problem, &step, &file).await?;
        }
        Commands::SeedGeneral { file } => {
            commands::seed_general(&cli.redis_url, &file).await?;
        }
        Commands::Submit {
            problem,
            language,
            file,
            api_url,
        } => {
            commands::submit(&api_url, &problem, &language, &file).await?;
        }
    }

    Ok(())
}
