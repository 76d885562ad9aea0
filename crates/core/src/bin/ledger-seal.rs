//! `ledger seal` CLI: runs one Merkle sealer pass against the configured
//! database and ledger artifact tree.
//!
//! Flags mirror §6: `--commit`, `--push` (implies `--commit`), `--remote`,
//! `--branch` (both default from config when omitted). Exits 0 on a
//! completed seal or "nothing to do"; non-zero on error.

use std::process::ExitCode;

use originseal_core::config::Config;
use originseal_core::sealer::seal_pending_records;
use originseal_core::store::Store;

struct Args {
    commit: bool,
    push: bool,
    remote: Option<String>,
    branch: Option<String>,
}

fn parse_args() -> Args {
    let mut commit = false;
    let mut push = false;
    let mut remote = None;
    let mut branch = None;

    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--commit" => commit = true,
            "--push" => push = true,
            "--remote" => remote = it.next(),
            "--branch" => branch = it.next(),
            other => {
                eprintln!("ledger-seal: unrecognized argument {other}");
            }
        }
    }
    // --push implies --commit.
    if push {
        commit = true;
    }
    Args { commit, push, remote, branch }
}

fn main() -> ExitCode {
    originseal_core::logging::init();

    let args = parse_args();

    let mut config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("ledger-seal: configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Some(remote) = args.remote {
        config.ledger_git_remote = remote;
    }
    if let Some(branch) = args.branch {
        config.ledger_git_branch = branch;
    }

    let mut store = match Store::open(&config.database_url) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("ledger-seal: failed to open database: {e}");
            return ExitCode::FAILURE;
        }
    };

    match seal_pending_records(&mut store, &config, args.commit, args.push) {
        Ok(None) => {
            println!("ledger-seal: nothing to do, no pending records");
            ExitCode::SUCCESS
        }
        Ok(Some(report)) => {
            println!(
                "ledger-seal: sealed batch {} ({} records) root={} file={}{}",
                report.batch_id,
                report.record_count,
                report.root_hash,
                report.ledger_file,
                report
                    .commit_sha
                    .as_ref()
                    .map(|sha| format!(" commit={sha}"))
                    .unwrap_or_default(),
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("ledger-seal: sealing error: {e}");
            ExitCode::FAILURE
        }
    }
}
