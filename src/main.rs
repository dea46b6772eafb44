use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use coldcheck::models::{CoinType, ErrorKind, PerPairResult, ValidationReport};
use coldcheck::KeyValidator;

#[derive(Parser)]
#[command(
    name = "coldcheck",
    version,
    about = "Audits printed cryptocurrency key sheets by re-deriving each address from its private key"
)]
struct Cli {
    /// Emit the report as JSON instead of the console report.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate every key/address pair printed on a sheet image
    Validate {
        /// Path to the sheet image
        #[arg(long)]
        image: PathBuf,

        /// Address scheme the sheet was printed for
        #[arg(long = "type", value_enum)]
        coin: CoinType,
    },
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { image, coin } => run_validate(&image, coin, cli.json),
    }
}

fn run_validate(image: &Path, coin: CoinType, json: bool) -> ExitCode {
    if !image.exists() {
        eprintln!("Error: Image file not found: {}", image.display());
        return ExitCode::from(1);
    }

    let validator = KeyValidator::new(coin);
    let report = match validator.validate(image) {
        Ok(report) => report,
        Err(err) => {
            eprintln!("Error validating image: {}", err);
            return ExitCode::from(1);
        }
    };

    if json {
        match serde_json::to_string_pretty(&report) {
            Ok(body) => println!("{}", body),
            Err(err) => {
                eprintln!("Error rendering report: {}", err);
                return ExitCode::from(1);
            }
        }
    } else {
        print_report(coin, image, &report);
    }

    if report.overall_valid {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}

fn print_report(coin: CoinType, image: &Path, report: &ValidationReport) {
    println!("Validating {} key pairs from: {}", coin, image.display());
    println!("{}", "-".repeat(60));

    if report.results.is_empty() {
        println!("No QR code pairs found in image");
    }
    for result in &report.results {
        print_pair(result);
    }

    println!();
    if report.overall_valid {
        println!("Final Result: ✅ All key pairs are valid");
    } else {
        println!("Final Result: ❌ Validation failed");
    }
}

fn print_pair(result: &PerPairResult) {
    println!("\nValidating Key Pair {}:", result.pair_index);
    println!("{}", "-".repeat(30));

    if let Some(ErrorKind::MalformedPair { codes_found }) = &result.error {
        println!(
            "❌ Could not form a pair: {} code(s) in this group",
            codes_found
        );
        return;
    }

    println!("\nText Extracted from Image (excluding QR codes):");
    println!("{}", "-".repeat(50));
    println!("{}", result.ocr_text);
    println!("{}", "-".repeat(50));

    println!("\nQR Code Contents:");
    println!(
        "Left QR (Private Key): {}",
        result.private_key.as_deref().unwrap_or("")
    );
    println!(
        "Right QR (Address): {}",
        result.address.as_deref().unwrap_or("")
    );

    if let Some(ErrorKind::KeyFormat(msg)) = &result.error {
        println!("\n❌ Key format error: {}", msg);
    }

    if result.crypto_match {
        println!("\nCryptographic Validation: ✅ Valid");
    } else {
        println!("\nCryptographic Validation: ❌ Invalid");
        if let (Some(derived), Some(claimed)) = (&result.derived_address, &result.address) {
            println!("Address mismatch:");
            println!("Generated: {}", derived);
            println!("Expected:  {}", claimed);
        }
    }
}
