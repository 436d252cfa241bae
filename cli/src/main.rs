use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process;

use anyhow::Context;
use bstr::BStr;
use clap::{Parser, ValueEnum};
use log::debug;

use rxjit::{CompileOptions, MatchKind, Regexp};

/// Scan files with a compiled regular expression.
#[derive(Parser)]
#[command(name = "rxjit", version, about)]
struct Args {
    /// The regular expression to compile.
    pattern: String,

    /// Files to scan. Reads standard input when none are given.
    files: Vec<PathBuf>,

    /// Match policy.
    #[arg(short = 'm', long, value_enum, default_value = "first")]
    r#match: Policy,

    /// Parse the pattern as case-insensitive.
    #[arg(short = 'i', long)]
    ignore_case: bool,

    /// Let `.` match any byte, including newlines.
    #[arg(short = 's', long)]
    dot_all: bool,

    /// Print the compiled program listing instead of scanning.
    #[arg(long)]
    dump_program: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Policy {
    /// Stop at the first match.
    First,
    /// Report all non-overlapping matches.
    All,
    /// Report the single longest match.
    Longest,
}

impl From<Policy> for MatchKind {
    fn from(policy: Policy) -> Self {
        match policy {
            Policy::First => MatchKind::First,
            Policy::All => MatchKind::All,
            Policy::Longest => MatchKind::Longest,
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = Args::parse();

    let options = CompileOptions {
        case_insensitive: args.ignore_case,
        dot_matches_new_line: args.dot_all,
    };

    let re =
        Regexp::compile_with_options(&args.pattern, args.r#match.into(), options)
            .with_context(|| format!("cannot compile `{}`", args.pattern))?;

    if args.dump_program {
        print!("{}", re);
        return Ok(());
    }

    let mut found = false;

    if args.files.is_empty() {
        let mut data = Vec::new();
        io::stdin()
            .read_to_end(&mut data)
            .context("cannot read standard input")?;
        found |= scan_buffer(&re, "<stdin>", &data);
    } else {
        for path in args.files.iter() {
            let data = fs::read(path)
                .with_context(|| format!("cannot read {}", path.display()))?;
            debug!("scanning {} ({} bytes)", path.display(), data.len());
            found |= scan_buffer(&re, &path.display().to_string(), &data);
        }
    }

    if !found {
        process::exit(1);
    }

    Ok(())
}

fn scan_buffer(re: &Regexp, origin: &str, data: &[u8]) -> bool {
    let spans = re.scan(data);
    for span in spans.iter() {
        println!(
            "{}:{}..{}: {}",
            origin,
            span.start,
            span.end,
            BStr::new(&data[span.start..span.end]),
        );
    }
    !spans.is_empty()
}
