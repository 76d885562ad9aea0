//! Merkle sealer (C9): sweeps unsealed capture records into a batch, writes
//! the ledger artifact tree, and atomically updates the database.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};

use crate::config::Config;
use crate::error::{CoreError, Result};
use crate::merkle::build_merkle_tree;
use crate::store::Store;

/// Outcome of one sealer pass.
#[derive(Debug, Clone, Serialize)]
pub struct SealReport {
    pub batch_id: String,
    pub record_count: usize,
    pub root_hash: String,
    pub ledger_file: String,
    pub commit_sha: Option<String>,
}

/// Runs one sealing pass. Returns `Ok(None)` when there is nothing pending
/// ("no pending"), matching the CLI's "nothing to do" success exit.
pub fn seal_pending_records(
    store: &mut Store,
    config: &Config,
    commit: bool,
    push: bool,
) -> Result<Option<SealReport>> {
    let pending = store.select_unsealed_records()?;
    if pending.is_empty() {
        return Ok(None);
    }

    let leaves: Vec<String> = pending
        .iter()
        .map(|r| {
            r.asset_hash
                .clone()
                .ok_or_else(|| CoreError::InvariantViolation(format!(
                    "record {} selected as unsealed but has no asset_hash",
                    r.record_id
                )))
        })
        .collect::<Result<_>>()?;

    let (root_hash, levels) = build_merkle_tree(&leaves)?;
    let batch_id = ulid::Ulid::new().to_string();
    let sealed_at = Utc::now();

    let records_json: Vec<Value> = pending
        .iter()
        .map(|r| {
            json!({
                "record_id": r.record_id,
                "asset_hash": r.asset_hash,
                "capture_time_utc": r.capture_time_utc.map(|t| t.to_rfc3339()),
                "device_id": r.device_id,
            })
        })
        .collect();

    let merkle_tree_levels: Vec<Vec<String>> = levels
        .iter()
        .map(|level| level.iter().map(|h| crate::merkle::with_prefix(h)).collect())
        .collect();

    let batch_json = json!({
        "batch_id": batch_id,
        "root_hash": root_hash,
        "sealed_at_utc": sealed_at.to_rfc3339(),
        "record_count": pending.len(),
        "records": records_json,
        "merkle_tree_levels": merkle_tree_levels,
    });

    let paths = ArtifactPaths::new(config, &sealed_at, &batch_id);
    let written = write_artifacts(&paths, &batch_json, pending.len(), &root_hash, &batch_id, &sealed_at)?;

    let record_ids: Vec<String> = pending.iter().map(|r| r.record_id.clone()).collect();
    if let Err(e) = store.mark_records_sealed(&record_ids, &batch_id, &root_hash, sealed_at) {
        // Partial artifact files are acceptable to leave on disk; the batch
        // is simply not considered sealed and the records remain pending.
        return Err(e);
    }

    let mut commit_sha = None;
    if commit || push {
        commit_sha = Some(git_commit(config, &written, &batch_id, &root_hash)?);
        if push {
            git_push(config)?;
        }
    }

    Ok(Some(SealReport {
        batch_id,
        record_count: pending.len(),
        root_hash,
        ledger_file: paths.batch_file.display().to_string(),
        commit_sha,
    }))
}

struct ArtifactPaths {
    root: PathBuf,
    batch_file: PathBuf,
    index_file: PathBuf,
    daily_roots_file: PathBuf,
    proof_manifest_file: PathBuf,
}

impl ArtifactPaths {
    fn new(config: &Config, sealed_at: &chrono::DateTime<Utc>, batch_id: &str) -> Self {
        let root = PathBuf::from(&config.ledger_repo_root);
        let batches_dir = root.join(&config.ledger_batches_subdir);
        let roots_dir = root.join(&config.ledger_roots_subdir);
        let proofs_dir = root.join(&config.ledger_proofs_subdir);
        ArtifactPaths {
            batch_file: batches_dir.join(format!("{}_{batch_id}.json", sealed_at.format("%Y-%m-%d"))),
            index_file: roots_dir.join(&config.ledger_root_index_filename),
            daily_roots_file: roots_dir.join(&config.ledger_daily_roots_filename),
            proof_manifest_file: proofs_dir.join(&config.ledger_proof_manifest_filename),
            root,
        }
    }
}

fn write_artifacts(
    paths: &ArtifactPaths,
    batch_json: &Value,
    record_count: usize,
    root_hash: &str,
    batch_id: &str,
    sealed_at: &chrono::DateTime<Utc>,
) -> Result<Vec<PathBuf>> {
    for dir in [
        paths.batch_file.parent(),
        paths.index_file.parent(),
        paths.proof_manifest_file.parent(),
    ]
    .into_iter()
    .flatten()
    {
        fs::create_dir_all(dir)?;
    }

    write_pretty_sorted(&paths.batch_file, batch_json)?;

    let mut index: Vec<Value> = if paths.index_file.exists() {
        serde_json::from_str(&fs::read_to_string(&paths.index_file)?)?
    } else {
        Vec::new()
    };
    index.push(json!({
        "batch_id": batch_id,
        "root_hash": root_hash,
        "sealed_at_utc": sealed_at.to_rfc3339(),
        "record_count": record_count,
    }));
    index.sort_by(|a, b| {
        a["sealed_at_utc"]
            .as_str()
            .unwrap_or_default()
            .cmp(b["sealed_at_utc"].as_str().unwrap_or_default())
    });
    write_pretty_sorted(&paths.index_file, &Value::Array(index))?;

    let csv_needs_header = !paths.daily_roots_file.exists();
    let mut csv = String::new();
    if csv_needs_header {
        csv.push_str("sealed_at_utc,root_hash,batch_id,record_count\n");
    }
    csv.push_str(&format!(
        "{},{},{},{}\n",
        sealed_at.to_rfc3339(),
        root_hash,
        batch_id,
        record_count
    ));
    append_to_file(&paths.daily_roots_file, &csv)?;

    let proof_line = serde_json::to_string(&sort_object_keys(batch_json))?;
    append_to_file(&paths.proof_manifest_file, &format!("{proof_line}\n"))?;

    Ok(vec![
        paths.batch_file.clone(),
        paths.index_file.clone(),
        paths.daily_roots_file.clone(),
        paths.proof_manifest_file.clone(),
    ])
}

fn write_pretty_sorted(path: &Path, value: &Value) -> Result<()> {
    let sorted = sort_object_keys(value);
    let mut text = serde_json::to_string_pretty(&sorted)?;
    text.push('\n');
    fs::write(path, text)?;
    Ok(())
}

fn append_to_file(path: &Path, content: &str) -> Result<()> {
    use std::io::Write;
    let mut file = fs::OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

/// `serde_json::Value` does not sort object keys on its own when backed by
/// the default `std::collections::HashMap`-free `Map` (which actually
/// preserves insertion order); re-sort recursively for deterministic output.
fn sort_object_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut sorted = serde_json::Map::new();
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for k in keys {
                sorted.insert(k.clone(), sort_object_keys(&map[k]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_object_keys).collect()),
        other => other.clone(),
    }
}

fn git_commit(config: &Config, paths: &[PathBuf], batch_id: &str, root_hash: &str) -> Result<String> {
    let mut add_args: Vec<&str> = vec!["add", "--"];
    let path_strs: Vec<&str> = paths.iter().filter_map(|p| p.to_str()).collect();
    add_args.extend(path_strs);
    run_git(&config.ledger_repo_root, &add_args)?;

    let message = format!("Sealed batch {batch_id} | Root: {root_hash}");
    run_git(&config.ledger_repo_root, &["commit", "-m", &message])?;
    let sha = run_git(&config.ledger_repo_root, &["rev-parse", "HEAD"])?;
    Ok(sha.trim().to_string())
}

fn git_push(config: &Config) -> Result<()> {
    run_git(
        &config.ledger_repo_root,
        &["push", &config.ledger_git_remote, &config.ledger_git_branch],
    )?;
    Ok(())
}

fn run_git(repo_root: &str, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .arg("-C")
        .arg(repo_root)
        .args(args)
        .output()
        .map_err(|e| CoreError::Git(format!("failed to spawn git: {e}")))?;
    if !output.status.success() {
        return Err(CoreError::Git(format!(
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}
