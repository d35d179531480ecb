//! Doctor command - verify API keys, the index and local storage.

use crate::cli::Output;
use crate::config::{Prompts, Settings};
use crate::interactions::InteractionLog;
use crate::vector_store::{SqliteVectorStore, VectorStore};
use console::style;
use std::path::{Path, PathBuf};

/// Check result for a single item.
#[derive(Debug)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, PartialEq)]
pub enum CheckStatus {
    Ok,
    Warning,
    Error,
}

impl CheckResult {
    fn ok(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message: message.to_string(),
            hint: None,
        }
    }

    fn warning(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn error(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn print(&self) {
        let icon = match self.status {
            CheckStatus::Ok => style("✓").green(),
            CheckStatus::Warning => style("!").yellow(),
            CheckStatus::Error => style("✗").red(),
        };

        println!("  {} {} - {}", icon, style(&self.name).bold(), self.message);

        if let Some(hint) = &self.hint {
            println!("    {} {}", style("→").dim(), style(hint).dim());
        }
    }
}

/// Run all diagnostic checks.
pub async fn run_doctor(settings: &Settings, config_path: Option<&PathBuf>) -> anyhow::Result<()> {
    Output::header("Copiloto Doctor");
    println!();
    println!("Checking configuration, API keys and storage...\n");

    let mut checks = Vec::new();

    let mut section = |title: &str, results: Vec<CheckResult>| {
        println!("{}", style(title).bold());
        for check in &results {
            check.print();
        }
        println!();
        checks.extend(results);
    };

    section(
        "API Keys",
        vec![
            check_api_key("Sales completion", &settings.completion.api_key_env),
            check_api_key("Vision", &settings.vision.api_key_env),
            check_api_key("Embeddings", &settings.embedding.api_key_env),
        ],
    );
    let index_check = check_index(settings).await;
    section("Index", vec![index_check]);
    section("Storage", check_storage(settings));
    section(
        "Configuration",
        vec![check_config_file(config_path), check_prompts(settings)],
    );

    let errors = checks.iter().filter(|c| c.status == CheckStatus::Error).count();
    let warnings = checks.iter().filter(|c| c.status == CheckStatus::Warning).count();

    if errors > 0 {
        Output::error(&format!(
            "{} error(s) found. Please fix them before using Copiloto.",
            errors
        ));
        std::process::exit(1);
    } else if warnings > 0 {
        Output::warning(&format!("All checks passed with {} warning(s).", warnings));
    } else {
        Output::success("All checks passed! Copiloto is ready to use.");
    }

    Ok(())
}

/// Check that the environment variable holding an API key is set.
fn check_api_key(name: &str, var: &str) -> CheckResult {
    let hint = format!("Set with: export {}='...'", var);
    match std::env::var(var) {
        Ok(key) if key.trim().is_empty() => CheckResult::error(name, &format!("{} is empty", var), &hint),
        Ok(key) => CheckResult::ok(name, &format!("{} configured ({})", var, mask_key(&key))),
        Err(_) => CheckResult::error(name, &format!("{} not set", var), &hint),
    }
}

/// Keep a short prefix and suffix of a secret.
fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 12 {
        return "***".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

/// Check that the similarity index opens with the configured dimensions.
async fn check_index(settings: &Settings) -> CheckResult {
    let path = settings.index_path();
    let dimensions = settings.embedding.dimensions as usize;

    match SqliteVectorStore::open_existing(&path, dimensions) {
        Ok(store) => {
            let rows = store.document_count().await.unwrap_or(0);
            let sources = store.list_sources().await.map(|s| s.len()).unwrap_or(0);
            CheckResult::ok(
                "Similarity index",
                &format!(
                    "{} ({} rows from {} sources, {})",
                    path.display(),
                    rows,
                    sources,
                    file_size(&path)
                ),
            )
        }
        Err(e) => CheckResult::error(
            "Similarity index",
            &e.to_string(),
            "Build it with: copiloto index <files...>",
        ),
    }
}

/// Check data directory and interaction log.
fn check_storage(settings: &Settings) -> Vec<CheckResult> {
    let mut results = Vec::new();

    let data_dir = settings.data_dir();
    if data_dir.exists() {
        results.push(CheckResult::ok("Data directory", &data_dir.display().to_string()));
    } else {
        results.push(CheckResult::warning(
            "Data directory",
            &format!("{} (will be created)", data_dir.display()),
            "Directory will be created on first use",
        ));
    }

    if !settings.interactions.enabled {
        results.push(CheckResult::ok("Interaction log", "disabled"));
        return results;
    }

    let log_path = settings.interactions_path();
    if !log_path.exists() {
        results.push(CheckResult::warning(
            "Interaction log",
            &format!("{} (not created yet)", log_path.display()),
            "The log is created on the first recorded interaction",
        ));
        return results;
    }

    match InteractionLog::open(&log_path).and_then(|log| log.count()) {
        Ok(count) => results.push(CheckResult::ok(
            "Interaction log",
            &format!("{} ({} interactions, {})", log_path.display(), count, file_size(&log_path)),
        )),
        Err(e) => results.push(CheckResult::error(
            "Interaction log",
            &e.to_string(),
            "Move the file away to start a fresh log",
        )),
    }

    results
}

/// Check if config file exists and parses.
fn check_config_file(config_path: Option<&PathBuf>) -> CheckResult {
    let config_path = config_path
        .cloned()
        .unwrap_or_else(Settings::default_config_path);

    if !config_path.exists() {
        return CheckResult::warning(
            "Config file",
            "using defaults",
            "Create with: copiloto config edit",
        );
    }

    match Settings::load_from(Some(&config_path)) {
        Ok(_) => CheckResult::ok("Config file", &config_path.display().to_string()),
        Err(e) => CheckResult::error("Config file", &e.to_string(), "Fix with: copiloto config edit"),
    }
}

/// Check that prompt overrides load and the sales template is valid.
fn check_prompts(settings: &Settings) -> CheckResult {
    match Prompts::load(settings.prompts.custom_dir.as_deref()) {
        Ok(_) => {
            let source = settings.prompts.custom_dir.as_deref().unwrap_or("built-in");
            CheckResult::ok("Prompts", source)
        }
        Err(e) => CheckResult::error(
            "Prompts",
            &e.to_string(),
            "The sales template needs {{context}} and {{question}}",
        ),
    }
}

fn file_size(path: &Path) -> String {
    std::fs::metadata(path)
        .map(|m| format_size(m.len()))
        .unwrap_or_else(|_| "unknown size".to_string())
}

/// Format file size in human-readable format.
fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
