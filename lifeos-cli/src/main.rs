//! lifeos-cli: terminal client for the LifeOS HTTP API
//!
//! # Subcommands
//! - `status [--json] [--watch <secs>]`                 alignment score, indices, insight, actions
//! - `apply <n>`                                        execute the n-th pending action, then re-query status
//! - `execute <type> <target> <description> [-p <n>]`   execute an arbitrary action
//! - `feed [--hrv ..] [--set k=v] [--interval <secs>]`  push sensor readings to /api/ingest
//! - `tasks` / `projects` / `users`                     list the in-memory panels
//! - `history [-n <limit>]`                             recent analyses
//! - `health`                                           server health

use std::time::Duration;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use serde_json::Number;

const DEFAULT_SERVER: &str = "http://127.0.0.1:8000";
const DEGRADED_HEADER: &str = "x-lifeos-degraded";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Server-side `[upstream.retry]` defaults, used to size the status timeout.
const SERVER_MAX_ATTEMPTS: u32 = 5;
const SERVER_ATTEMPT_TIMEOUT_SECS: u64 = 30;
const SERVER_BASE_DELAY_MS: u64 = 1000;

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(name = "lifeos-cli", version, about = "LifeOS terminal client")]
struct Cli {
    /// LifeOS HTTP server URL (overrides LIFEOS_HTTP_URL env var)
    #[arg(long, env = "LIFEOS_HTTP_URL", default_value = DEFAULT_SERVER)]
    server: String,

    /// Seconds to wait for /api/status (default: the server's default retry budget)
    #[arg(long, env = "LIFEOS_STATUS_TIMEOUT", global = true)]
    status_timeout: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Show the current alignment status
    Status {
        /// Print the raw JSON payload
        #[arg(long)]
        json: bool,

        /// Re-query every N seconds until interrupted
        #[arg(long)]
        watch: Option<u64>,
    },

    /// Execute the n-th pending action (1-based) from the current status
    Apply { index: usize },

    /// Execute an arbitrary action
    Execute {
        action_type: String,
        target: String,
        description: String,

        #[arg(short, long, default_value = "5", value_parser = parse_number)]
        priority: Number,
    },

    /// Push sensor readings into the LifeOS context
    Feed {
        #[arg(long)]
        hrv: Option<String>,

        #[arg(long)]
        sleep: Option<String>,

        #[arg(long)]
        focus_level: Option<String>,

        #[arg(long)]
        bank_balance: Option<String>,

        /// Extra readings as key=value (repeatable)
        #[arg(long = "set", value_parser = parse_reading)]
        readings: Vec<(String, String)>,

        /// Repeat every N seconds; 0 sends once
        #[arg(long, default_value_t = 0)]
        interval: u64,
    },

    /// List tasks
    Tasks,

    /// List projects
    Projects,

    /// List users
    Users,

    /// Show recent analyses
    History {
        #[arg(short = 'n', long, default_value_t = 10)]
        limit: usize,
    },

    /// Show LifeOS server health
    Health,
}

// ============================================================================
// API Types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub action_type: String,
    pub target: String,
    pub description: String,
    pub priority: Number,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Status {
    pub score: Number,
    pub health_index: Number,
    pub wealth_index: Number,
    pub focus_index: Number,
    pub insight: String,
    pub pending_actions: Vec<Action>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryEntry {
    pub recorded_at: String,
    pub score: Number,
    pub insight: String,
    pub degraded: bool,
}

// ============================================================================
// Formatting
// ============================================================================

/// Parse a `key=value` reading.
pub fn parse_reading(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((k, v)) if !k.trim().is_empty() => Ok((k.trim().to_string(), v.trim().to_string())),
        _ => Err(format!("expected key=value, got '{}'", raw)),
    }
}

/// Parse a numeric priority, keeping integers as integers.
pub fn parse_number(raw: &str) -> Result<Number, String> {
    raw.trim()
        .parse::<Number>()
        .map_err(|_| format!("expected a number, got '{}'", raw))
}

/// Longest `/api/status` can take on a server with the given retry settings:
/// every attempt times out and each is followed by its backoff step
/// (`2^attempts - 1` units in total), plus ten seconds of slack.
pub fn status_timeout(max_attempts: u32, attempt_timeout_secs: u64, base_delay_ms: u64) -> Duration {
    let attempts = Duration::from_secs(attempt_timeout_secs).saturating_mul(max_attempts);
    let units = 2u32.saturating_pow(max_attempts).saturating_sub(1);
    let backoff = Duration::from_millis(base_delay_ms).saturating_mul(units);
    attempts + backoff + Duration::from_secs(10)
}

/// Readings payload for `/api/ingest`; named flags first, then `--set` pairs.
pub fn feed_payload(
    named: &[(&str, &Option<String>)],
    extra: &[(String, String)],
) -> serde_json::Map<String, serde_json::Value> {
    let mut payload = serde_json::Map::new();
    for (key, value) in named {
        if let Some(v) = value {
            payload.insert(key.to_string(), serde_json::Value::String(v.clone()));
        }
    }
    for (key, value) in extra {
        payload.insert(key.clone(), serde_json::Value::String(value.clone()));
    }
    payload
}

/// Human-readable status block.
pub fn render_status(status: &Status, degraded: bool) -> String {
    let mut out = String::new();
    out.push_str(&format!("Alignment score: {}", status.score));
    if degraded {
        out.push_str("  [fallback: AI core unavailable]");
    }
    out.push('\n');
    out.push_str(&format!(
        "Health {:>3}   Wealth {:>3}   Focus {:>3}\n\n",
        status.health_index.to_string(),
        status.wealth_index.to_string(),
        status.focus_index.to_string()
    ));
    out.push_str(&status.insight);
    out.push('\n');

    if status.pending_actions.is_empty() {
        out.push_str("\nNo pending actions.\n");
    } else {
        out.push_str("\nPending actions:\n");
        for (i, a) in status.pending_actions.iter().enumerate() {
            out.push_str(&format!(
                "  {}. [P{}] {} → {}: {}\n",
                i + 1,
                a.priority,
                a.action_type,
                a.target,
                a.description
            ));
        }
    }
    out
}

// ============================================================================
// HTTP Client Calls
// ============================================================================

fn client(timeout: Duration) -> anyhow::Result<reqwest::blocking::Client> {
    Ok(reqwest::blocking::Client::builder().timeout(timeout).build()?)
}

/// GET a JSON endpoint; exits on connection or HTTP failure.
fn get_json(server: &str, route: &str) -> anyhow::Result<serde_json::Value> {
    let url = format!("{}{}", server, route);
    let resp = match client(REQUEST_TIMEOUT)?.get(&url).send() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("lifeos-cli: connection failed to {}: {}", url, e);
            std::process::exit(1);
        }
    };
    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().unwrap_or_default();
        eprintln!("lifeos-cli: server returned {}: {}", status, body);
        std::process::exit(1);
    }
    Ok(resp.json()?)
}

/// Fetch the raw status payload and degradation flag; status calls may spend
/// the server's whole retry budget.
fn fetch_status_raw(server: &str, timeout: Duration) -> anyhow::Result<(serde_json::Value, bool)> {
    let url = format!("{}/api/status", server);
    let resp = match client(timeout)?.get(&url).send() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("lifeos-cli: connection failed to {}: {}", url, e);
            std::process::exit(1);
        }
    };
    let degraded = resp
        .headers()
        .get(DEGRADED_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|v| v == "true")
        .unwrap_or(false);
    if !resp.status().is_success() {
        eprintln!("lifeos-cli: server returned {}", resp.status());
        std::process::exit(1);
    }
    Ok((resp.json()?, degraded))
}

fn fetch_status(server: &str, timeout: Duration) -> anyhow::Result<(Status, bool)> {
    let (body, degraded) = fetch_status_raw(server, timeout)?;
    Ok((serde_json::from_value(body)?, degraded))
}

fn do_status(
    server: &str,
    timeout: Duration,
    json_output: bool,
    watch: Option<u64>,
) -> anyhow::Result<()> {
    loop {
        if json_output {
            let (body, _) = fetch_status_raw(server, timeout)?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        } else {
            let (status, degraded) = fetch_status(server, timeout)?;
            println!("{}", render_status(&status, degraded));
        }

        match watch {
            Some(secs) if secs > 0 => std::thread::sleep(Duration::from_secs(secs)),
            _ => return Ok(()),
        }
    }
}

fn post_action(server: &str, action: &Action) -> anyhow::Result<()> {
    let url = format!("{}/api/execute", server);
    let resp = match client(REQUEST_TIMEOUT)?.post(&url).json(action).send() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("lifeos-cli: connection failed to {}: {}", url, e);
            std::process::exit(1);
        }
    };

    let status = resp.status();
    let body: serde_json::Value = resp.json().unwrap_or_default();
    if !status.is_success() {
        eprintln!(
            "lifeos-cli: execution failed ({}): {}",
            status,
            body["error"].as_str().unwrap_or("unknown error")
        );
        std::process::exit(1);
    }
    println!("✅ {}", body["message"].as_str().unwrap_or("executed"));
    Ok(())
}

fn do_apply(server: &str, timeout: Duration, index: usize) -> anyhow::Result<()> {
    let (status, degraded) = fetch_status(server, timeout)?;
    if degraded {
        eprintln!("lifeos-cli: status is in fallback mode; no actions to apply");
        std::process::exit(1);
    }
    let action = match index.checked_sub(1).and_then(|i| status.pending_actions.get(i)) {
        Some(a) => a.clone(),
        None => {
            eprintln!(
                "lifeos-cli: no pending action #{} ({} available)",
                index,
                status.pending_actions.len()
            );
            std::process::exit(1);
        }
    };

    post_action(server, &action)?;

    let (status, degraded) = fetch_status(server, timeout)?;
    println!("\n{}", render_status(&status, degraded));
    Ok(())
}

fn do_feed(server: &str, payload: serde_json::Map<String, serde_json::Value>, interval: u64) -> anyhow::Result<()> {
    if payload.is_empty() {
        eprintln!("lifeos-cli: nothing to feed; pass --hrv, --sleep, --focus-level, --bank-balance or --set");
        std::process::exit(1);
    }
    let url = format!("{}/api/ingest", server);
    let http = client(REQUEST_TIMEOUT)?;

    loop {
        println!("Feeding {} readings to LifeOS...", payload.len());
        match http.post(&url).json(&payload).send() {
            Ok(r) if r.status().is_success() => println!("Success: context updated."),
            Ok(r) => eprintln!("lifeos-cli: ingest rejected ({})", r.status()),
            Err(e) => eprintln!("lifeos-cli: ingest failed: {}", e),
        }

        if interval == 0 {
            return Ok(());
        }
        std::thread::sleep(Duration::from_secs(interval));
    }
}

fn do_list(server: &str, route: &str) -> anyhow::Result<()> {
    let body = get_json(server, route)?;
    for row in body.as_array().into_iter().flatten() {
        let id = row["id"].as_u64().unwrap_or_default();
        if let Some(title) = row["title"].as_str() {
            let mark = if row["done"].as_bool().unwrap_or(false) { "x" } else { " " };
            println!("[{}] #{} {}", mark, id, title);
        } else if let Some(status) = row["status"].as_str() {
            println!("#{} {} ({})", id, row["name"].as_str().unwrap_or("?"), status);
        } else {
            println!("#{} {}", id, row["name"].as_str().unwrap_or("?"));
        }
    }
    Ok(())
}

fn do_history(server: &str, limit: usize) -> anyhow::Result<()> {
    let body = get_json(server, &format!("/api/history?limit={}", limit))?;
    let entries: Vec<HistoryEntry> = serde_json::from_value(body)?;
    if entries.is_empty() {
        eprintln!("No analyses recorded yet.");
    }
    for e in entries {
        let flag = if e.degraded { " (fallback)" } else { "" };
        println!("{}  {:>3}{}  {}", e.recorded_at, e.score, flag, e.insight);
    }
    Ok(())
}

/// Show the server status by calling GET /health.
fn do_health(server: &str) -> anyhow::Result<()> {
    let url = format!("{}/health", server);
    match client(Duration::from_secs(10))?.get(&url).send() {
        Ok(r) if r.status().is_success() => {
            let body: serde_json::Value = r.json().unwrap_or_default();
            println!("LifeOS server: {}", if body["ok"] == true { "ok" } else { "unknown" });
            println!("Version:       {}", body["version"].as_str().unwrap_or("?"));
            println!("Model:         {}", body["model"].as_str().unwrap_or("?"));
            println!(
                "Upstream key:  {}",
                if body["upstream_configured"] == true { "configured" } else { "missing" }
            );
        }
        Ok(r) => {
            eprintln!("lifeos-cli: server unhealthy (HTTP {})", r.status());
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("lifeos-cli: cannot reach {}: {}", url, e);
            std::process::exit(1);
        }
    }
    Ok(())
}

// ============================================================================
// Main
// ============================================================================

fn main() {
    let cli = Cli::parse();
    let server = cli.server.trim_end_matches('/').to_string();
    let timeout = cli.status_timeout.map(Duration::from_secs).unwrap_or_else(|| {
        status_timeout(SERVER_MAX_ATTEMPTS, SERVER_ATTEMPT_TIMEOUT_SECS, SERVER_BASE_DELAY_MS)
    });

    let result = match cli.command {
        Commands::Status { json, watch } => do_status(&server, timeout, json, watch),
        Commands::Apply { index } => do_apply(&server, timeout, index),
        Commands::Execute {
            action_type,
            target,
            description,
            priority,
        } => post_action(
            &server,
            &Action {
                action_type,
                target,
                description,
                priority,
            },
        ),
        Commands::Feed {
            hrv,
            sleep,
            focus_level,
            bank_balance,
            readings,
            interval,
        } => {
            let payload = feed_payload(
                &[
                    ("hrv", &hrv),
                    ("sleep", &sleep),
                    ("focus_level", &focus_level),
                    ("bank_balance", &bank_balance),
                ],
                &readings,
            );
            do_feed(&server, payload, interval)
        }
        Commands::Tasks => do_list(&server, "/tasks"),
        Commands::Projects => do_list(&server, "/projects"),
        Commands::Users => do_list(&server, "/users"),
        Commands::History { limit } => do_history(&server, limit),
        Commands::Health => do_health(&server),
    };

    if let Err(e) = result {
        eprintln!("lifeos-cli: {}", e);
        std::process::exit(1);
    }
}

// ============================================================================
// Tests
// ============================================================================
