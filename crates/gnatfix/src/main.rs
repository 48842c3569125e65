use std::process;

use clap::{Parser, Subcommand};
use gimli::RunTimeEndian;
use gnatfix_core::error::{GnatError, GnatResult};
use gnatfix_core::layout::bits::{read_integer, unpack, UnpackMode};
use gnatfix_core::symbols::demangle::{decode, encode, parse_renaming};
use gnatfix_utils::{debug, init_logging};

/// Inspect GNAT-encoded names and packed bit fields.
#[derive(Parser, Debug)]
#[command(name = "gnatfix")]
#[command(version)]
#[command(about = "Inspect GNAT-encoded names and packed bit fields", long_about = None)]
struct Cli
{
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands
{
    /// Decode linkage names into Ada names
    Decode
    {
        /// Encoded names, e.g. pkg__child__proc
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// Encode an Ada name into its linkage form
    Encode
    {
        /// Decoded name, e.g. pkg."+"
        name: String,
    },
    /// Explain a ___XR renaming symbol
    Renaming
    {
        symbol: String,
    },
    /// Extract a bit field from a hex byte string
    Unpack
    {
        /// Bytes in hex, e.g. e8 or 0x00_80
        hex: String,
        /// Offset of the first bit
        #[arg(short, long, default_value_t = 0)]
        offset: usize,
        /// Number of bits to extract
        #[arg(short, long)]
        bits: usize,
        /// Sign extend the field
        #[arg(long, default_value_t = false)]
        signed: bool,
        /// Left-justify the result instead of treating it as a scalar
        #[arg(long, default_value_t = false)]
        aggregate: bool,
        #[arg(long, default_value_t = false)]
        big_endian: bool,
    },
}

fn main()
{
    let _guard = match init_logging() {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            process::exit(1);
        }
    };

    let cli = Cli::parse();
    if let Err(e) = run_command(cli) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run_command(cli: Cli) -> GnatResult<()>
{
    match cli.command {
        Commands::Decode { names } => {
            for name in names {
                println!("{}", decode(&name));
            }
        }
        Commands::Encode { name } => println!("{}", encode(&name)?),
        Commands::Renaming { symbol } => {
            let renaming = parse_renaming(&symbol)
                .ok_or_else(|| GnatError::InvalidArgument(format!("{symbol} is not a renaming symbol")))?;
            println!("kind:       {:?}", renaming.kind);
            println!("renames:    {}", decode(renaming.renamed_entity));
            if !renaming.expression.is_empty() {
                println!("expression: {}", renaming.expression);
            }
        }
        Commands::Unpack {
            hex,
            offset,
            bits,
            signed,
            aggregate,
            big_endian,
        } => {
            let endian = if big_endian {
                RunTimeEndian::Big
            } else {
                RunTimeEndian::Little
            };
            let source = parse_hex(&hex)?;
            let mode = if aggregate {
                UnpackMode::aggregate(endian)
            } else {
                UnpackMode::scalar(signed, endian)
            };
            debug!(bytes = source.len(), offset, bits, ?mode, "unpacking");
            let unpacked = unpack(&source, offset, bits, mode)?;

            let rendered: Vec<String> = unpacked.iter().map(|byte| format!("{byte:02x}")).collect();
            println!("bytes: {}", rendered.join(" "));
            if !aggregate && unpacked.len() <= 8 {
                println!("value: {}", read_integer(&unpacked, signed, endian));
            }
        }
    }
    Ok(())
}

/// Bytes of a hex string. `0x` and `_` separators are accepted.
fn parse_hex(text: &str) -> GnatResult<Vec<u8>>
{
    let digits: Vec<char> = text
        .trim_start_matches("0x")
        .chars()
        .filter(|c| *c != '_' && !c.is_whitespace())
        .collect();
    if digits.is_empty() || digits.len() % 2 != 0 {
        return Err(GnatError::InvalidArgument(format!("{text} is not a whole number of hex bytes")));
    }
    digits
        .chunks(2)
        .map(|pair| {
            let pair: String = pair.iter().collect();
            u8::from_str_radix(&pair, 16).map_err(|_| GnatError::InvalidArgument(format!("bad hex byte {pair}")))
        })
        .collect()
}
