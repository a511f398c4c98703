use clap::{Parser, Subcommand};
use std::path::PathBuf;

use dura::archive::Archive;
use dura::backup::{backup, BackupOptions, FILES_PER_BLOCK};
use dura::band::BandNumber;
use dura::dump::print_block_index;
use dura::ioutil::read_record;
use dura::records::BlockIndex;
use dura::validate::validate_archive;

#[derive(Parser)]
#[command(name = "dura", version, about = "Append-only snapshot backup archive")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Make a new archive to hold backups
    CreateArchive {
        /// Local path to directory to be created
        archive_directory: PathBuf,
    },
    /// Show summary information about an archive
    DescribeArchive {
        /// Local path to archive directory
        archive_directory: PathBuf,
    },
    /// Store a copy of source files in the archive
    Backup {
        /// Source paths to store, then the archive directory last
        #[arg(required = true, num_args = 2.., value_name = "PATH")]
        paths: Vec<PathBuf>,
        /// Entries per block before rotating to a new one
        #[arg(long, default_value_t = FILES_PER_BLOCK)]
        files_per_block: usize,
    },
    /// List bands in an archive; unfinished bands carry a trailing +
    ListBands {
        /// Path of archive directory
        archive: PathBuf,
        /// Just list band names
        #[arg(short = 'q', long)]
        names_only: bool,
    },
    /// List files in a backup band
    ListFiles {
        /// Path of archive directory
        archive: PathBuf,
        /// Number of band
        band: String,
        /// Just list file names
        #[arg(short = 'q', long)]
        names_only: bool,
    },
    /// Print the contents of block index files
    DumpIndex {
        #[arg(required = true, num_args = 1..)]
        index_file: Vec<PathBuf>,
    },
    /// Check that an archive is well-formed and internally consistent
    Validate {
        /// Path of archive directory
        archive: PathBuf,
        /// Emit findings as JSON, one object per line
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().command {
        // ── Create / describe ────────────────────────────────────────────────
        Commands::CreateArchive { archive_directory } => {
            Archive::create(&archive_directory)?;
            println!("Created archive: {}", archive_directory.display());
        }

        Commands::DescribeArchive { archive_directory } => {
            let archive = Archive::open(&archive_directory)?;
            let bands = archive.list_bands()?;
            println!("Archive: {}", archive.path().display());
            println!("  Bands      {}", bands.len());
            match bands.last() {
                Some(last) => println!("  Last band  {last}"),
                None => println!("  Last band  -"),
            }
        }

        // ── Backup ───────────────────────────────────────────────────────────
        Commands::Backup {
            mut paths,
            files_per_block,
        } => {
            // The archive directory rides last, after the sources.
            let archive_dir = paths.pop().expect("clap enforces two paths minimum");
            let archive = Archive::open(&archive_dir)?;
            let report = backup(&archive, &paths, &BackupOptions { files_per_block })?;
            println!(
                "Stored {} entr{} ({} B) in {} block(s) as band {}",
                report.entries_stored,
                if report.entries_stored == 1 { "y" } else { "ies" },
                report.bytes_stored,
                report.blocks_written,
                report.band_number,
            );
            if report.skipped > 0 {
                println!("Skipped {} special file(s)", report.skipped);
            }
        }

        // ── Listings ─────────────────────────────────────────────────────────
        Commands::ListBands {
            archive,
            names_only,
        } => {
            let archive = Archive::open(&archive)?;
            for number in archive.list_bands()? {
                if names_only {
                    println!("{number}");
                    continue;
                }
                let band = archive.open_band_reader(&number)?;
                let mut name = number.to_string();
                if !band.is_finished() {
                    name.push('+');
                }
                match band.head() {
                    Some(head) => println!(
                        "{:<8}   {}   {}",
                        name,
                        isotime(head.start_unixtime),
                        head.source_hostname
                    ),
                    None => println!("{name:<8}"),
                }
            }
        }

        Commands::ListFiles {
            archive,
            band,
            names_only,
        } => {
            let archive = Archive::open(&archive)?;
            let number: BandNumber = band.parse()?;
            let band = archive.open_band_reader(&number)?;
            let index = band.read_block_index(0)?;
            print_block_index(&mut std::io::stdout(), &index, names_only)?;
        }

        Commands::DumpIndex { index_file } => {
            let mut out = std::io::stdout();
            for path in &index_file {
                let index: BlockIndex = read_record(path)?;
                if index_file.len() > 1 {
                    println!("{}:", path.display());
                }
                print_block_index(&mut out, &index, false)?;
            }
        }

        // ── Validate ─────────────────────────────────────────────────────────
        Commands::Validate { archive, json } => {
            let findings = validate_archive(&archive)?;
            for finding in &findings {
                if json {
                    println!("{}", serde_json::to_string(finding)?);
                } else {
                    println!("{finding}");
                }
            }
            if !json {
                println!("{} finding(s)", findings.len());
            }
        }
    }

    Ok(())
}

// ── helpers ──────────────────────────────────────────────────────────────────

fn isotime(unixtime: i64) -> String {
    use chrono::{Local, TimeZone};
    Local
        .timestamp_opt(unixtime, 0)
        .earliest()
        .map(|t| t.format("%Y-%m-%dT%H:%M:%S").to_string())
        .unwrap_or_else(|| format!("@{unixtime}"))
}
