use clap::{Args as ClapArgs, Parser, Subcommand};

pub mod meetings;
pub mod workspaces;

pub use meetings::handle_meetings_command;
pub use workspaces::handle_workspaces_command;

#[derive(Parser, Debug)]
#[command(name = "synca")]
#[command(about = "Meeting recording and transcription assistant", long_about = None)]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<CliCommand>,
}

#[derive(Subcommand, Debug)]
pub enum CliCommand {
    /// Print version information
    Version,
    /// List workspaces and their folders
    Workspaces(WorkspacesCliArgs),
    /// Inspect meetings and transcripts
    Meetings(MeetingsCliArgs),
}

#[derive(ClapArgs, Debug)]
pub struct WorkspacesCliArgs {
    /// Maximum number of workspaces to show
    #[arg(short, long, default_value = "20")]
    pub limit: usize,
}

#[derive(ClapArgs, Debug)]
pub struct MeetingsCliArgs {
    /// List the meetings of this folder
    #[arg(short, long)]
    pub folder: Option<i64>,
    /// Show one meeting with its transcript
    #[arg(short, long)]
    pub show: Option<i64>,
}
