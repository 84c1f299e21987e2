// Copyright 2025 Jayashankar
// SPDX-License-Identifier: Apache-2.0

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use uncors_tls::{expiry_warning, provision_ca, Ca, Config, Error, Paths, Result};

#[derive(Parser)]
#[command(name = "uncors-tls")]
#[command(about = "Local CA for the uncors development proxy")]
#[command(version)]
#[command(after_help = "\
EXAMPLES:
    uncors-tls generate-certs                     # Create the local CA
    uncors-tls generate-certs --force             # Replace an existing CA
    uncors-tls generate-certs --validity-days 30  # Short-lived CA
    uncors-tls status                             # Show CA location and expiry")]
struct Cli {
    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Show detailed output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate the CA used to sign per-host certificates
    GenerateCerts {
        /// Days until the CA expires (default from config, 365)
        #[arg(long)]
        validity_days: Option<u32>,

        /// Overwrite an existing CA
        #[arg(long)]
        force: bool,
    },

    /// Show CA location and expiry
    Status,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn init_logging(quiet: bool, verbose: bool) {
    let default = if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.quiet, cli.verbose);

    let paths = Paths::new()?;

    match cli.command {
        Commands::GenerateCerts {
            validity_days,
            force,
        } => cmd_generate_certs(&paths, validity_days, force, cli.quiet),
        Commands::Status => cmd_status(&paths),
    }
}

fn cmd_generate_certs(
    paths: &Paths,
    validity_days: Option<u32>,
    force: bool,
    quiet: bool,
) -> Result<()> {
    let config = Config::load(&paths.config)?;
    let days = validity_days.unwrap_or(config.ca_days);

    let (cert, key) = provision_ca(paths, days, force)?;

    if !quiet {
        println!("CA certificate generated.");
        println!("    Certificate: {}", cert.display());
        println!("    Private key: {}", key.display());
        println!("    Valid for:   {} days", days);
        println!();
        println!("Add the certificate to your system or browser trust store to");
        println!("trust the certificates uncors issues.");
    }
    Ok(())
}

fn cmd_status(paths: &Paths) -> Result<()> {
    println!("uncors-tls status");
    println!("=================");
    println!();

    print!("CA: ");
    if !paths.ca_exists() {
        println!("not initialized");
        println!("    Run 'uncors-tls generate-certs' to set up");
        return Ok(());
    }

    let ca = match Ca::load_from(paths) {
        Ok(ca) => ca,
        Err(e) => {
            println!("unreadable");
            return Err(e);
        }
    };
    println!("initialized");
    println!("    Certificate: {}", paths.ca_cert.display());
    println!("    Private key: {}", paths.ca_key.display());
    println!("    Serial:      {}", ca.info.serial_hex());

    let config = Config::load(&paths.config)?;
    let expiration = ca.check_expiration(config.expiry_threshold());
    println!(
        "    Expires:     {} ({} days)",
        ca.info.expiry_string(),
        expiration.days_remaining()
    );
    if let Some(warning) = expiry_warning(&expiration) {
        tracing::warn!(days_remaining = expiration.days_remaining(), "{}", warning);
    }
    if expiration.remaining.is_negative() {
        return Err(Error::Config(
            "CA certificate has expired. Run 'uncors-tls generate-certs --force' to replace it."
                .into(),
        ));
    }
    Ok(())
}
