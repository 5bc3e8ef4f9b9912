use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "ecoledger",
    about = "EcoLedger: Eco-Habit Points, Streak & Badge Ledger"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    Serve,
    Status,
    Doctor,
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    Set { key: String, value: String },
    Get { key: String },
}
