use clap::{Parser, Subcommand};

/// HaulQuote — restroom-trailer rental quotation service
#[derive(Parser)]
#[command(name = "haulquote", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the quotation server
    Serve {
        /// Port to bind
        #[arg(short, long, default_value = "8090")]
        port: u16,
    },

    /// Rate-table tooling
    Rates {
        #[command(subcommand)]
        command: RatesCommands,
    },
}

#[derive(Subcommand)]
pub enum RatesCommands {
    /// Validate a rate-table export without serving
    Validate {
        /// Path to a sheet-sync JSON export
        file: String,
    },
}
