//! pulso-cli: terminal client for the Pulso HTTP API
//!
//! # Subcommands
//! - `intake --name <name> [...]`                : register a patient
//! - `chat --patient <id>`                        : interactive pre-diagnosis chat
//! - `food --patient <id> <text>`                 : analyze and log a meal
//! - `health --patient <id> --weight --stress`    : record weight and stress
//! - `avatar --patient <id>`                      : avatar stats and challenges
//! - `challenge new|complete`                     : avatar challenges
//! - `dashboard`                                  : clinician patient list
//! - `export chat|summary --patient <id>`         : download a PDF report
//! - `status`                                     : show server health

mod transcript;

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Deserialize;
use serde_json::{json, Value};

use transcript::{EntryState, Speaker, Transcript};

const DEFAULT_SERVER: &str = "http://127.0.0.1:8780";
const GREETING_SENTINEL: &str = "[SALUDO_INICIAL_SISTEMA]";
const CRITICAL_THRESHOLD: i64 = 50;

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(name = "pulso-cli", version, about = "Pulso patient and clinician client")]
struct Cli {
    /// Pulso HTTP server URL (overrides PULSO_HTTP_URL env var)
    #[arg(long, env = "PULSO_HTTP_URL", default_value = DEFAULT_SERVER)]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Register a new patient (creates its avatar too)
    Intake {
        #[arg(long)]
        name: String,
        #[arg(long)]
        age: Option<i32>,
        /// Height in centimetres
        #[arg(long)]
        height: Option<f64>,
        #[arg(long)]
        gender: Option<String>,
        #[arg(long)]
        activity: Option<String>,
        #[arg(long)]
        diet_type: Option<String>,
        #[arg(long)]
        allergies: Option<String>,
        #[arg(long)]
        health_goal: Option<String>,
    },

    /// Chat with the assistant; `/quit` or EOF ends the session
    Chat {
        #[arg(long)]
        patient: String,

        /// Extra system instruction sent with every turn
        #[arg(long)]
        system_prompt: Option<String>,
    },

    /// Analyze a meal description and store it
    Food {
        #[arg(long)]
        patient: String,

        /// Free-text meal description
        text: String,

        /// Only print the analysis, do not store it
        #[arg(long)]
        analyze_only: bool,
    },

    /// Record a weight (kg) and stress (1-10) reading
    Health {
        #[arg(long)]
        patient: String,
        #[arg(long)]
        weight: f64,
        #[arg(long)]
        stress: i32,
    },

    /// Show avatar stats and challenges
    Avatar {
        #[arg(long)]
        patient: String,
    },

    /// Create or complete an avatar challenge
    Challenge {
        #[command(subcommand)]
        action: ChallengeCommand,
    },

    /// Clinician view: every patient with avatar health
    Dashboard {
        /// Print the raw JSON response
        #[arg(long)]
        json: bool,
    },

    /// Download a PDF report
    Export {
        kind: ReportKind,

        #[arg(long)]
        patient: String,

        /// Directory the PDF is written to
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },

    /// Show Pulso server status
    Status,
}

#[derive(Debug, Subcommand)]
enum ChallengeCommand {
    New {
        #[arg(long)]
        patient: String,

        /// steps, water, exercise, sleep or meditation
        #[arg(long = "type", default_value = "steps")]
        challenge_type: String,
    },
    Complete {
        #[arg(long)]
        challenge: String,

        #[arg(long)]
        patient: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ReportKind {
    Chat,
    Summary,
}

impl ReportKind {
    fn path_segment(self) -> &'static str {
        match self {
            ReportKind::Chat => "chat",
            ReportKind::Summary => "summary",
        }
    }

    fn fallback_filename(self, patient: &str) -> String {
        match self {
            ReportKind::Chat => format!("chat_history_{}.pdf", patient),
            ReportKind::Summary => format!("patient_report_{}.pdf", patient),
        }
    }
}

// ============================================================================
// API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct HistoryMessage {
    role: String,
    message: String,
}

#[derive(Debug, Deserialize)]
struct ChatHistory {
    messages: Vec<HistoryMessage>,
    #[serde(default)]
    synthetic_welcome: bool,
}

// ============================================================================
// Formatting helpers
// ============================================================================

/// Ten-cell bar for a 0-100 stat.
pub fn stat_bar(value: i64) -> String {
    let filled = (value.clamp(0, 100) / 10) as usize;
    format!("[{}{}] {:>3}", "#".repeat(filled), ".".repeat(10 - filled), value)
}

/// One dashboard line; patients without an avatar count as stable.
pub fn dashboard_row(patient: &Value) -> String {
    let name = patient["name"].as_str().unwrap_or("?");
    let id = patient["id"].as_str().unwrap_or("?");
    match patient["avatar"]["health"].as_i64() {
        Some(health) => {
            let flag = if health < CRITICAL_THRESHOLD { "CRITICAL" } else { "stable" };
            format!("{:<36}  {:<24} {}  {}", id, name, stat_bar(health), flag)
        }
        None => format!("{:<36}  {:<24} {:<16}  stable", id, name, "(no avatar)"),
    }
}

/// Filename from a `Content-Disposition: attachment; filename="..."` header.
pub fn disposition_filename(header: &str) -> Option<String> {
    header
        .split(';')
        .map(str::trim)
        .find_map(|part| part.strip_prefix("filename="))
        .map(|name| name.trim_matches('"'))
        .filter(|name| !name.is_empty() && !name.contains('/') && !name.contains('\\'))
        .map(str::to_string)
}

// ============================================================================
// HTTP Client Calls
// ============================================================================

struct Api {
    client: reqwest::blocking::Client,
    server: String,
}

impl Api {
    fn new(server: &str) -> anyhow::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            client,
            server: server.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.server, path)
    }

    fn get(&self, path: &str) -> anyhow::Result<Value> {
        let url = self.url(path);
        let resp = self
            .client
            .get(&url)
            .send()
            .with_context(|| format!("connection failed to {}", url))?;
        read_json(resp)
    }

    fn post(&self, path: &str, body: &Value) -> anyhow::Result<Value> {
        let url = self.url(path);
        let resp = self
            .client
            .post(&url)
            .json(body)
            .send()
            .with_context(|| format!("connection failed to {}", url))?;
        read_json(resp)
    }
}

fn read_json(resp: reqwest::blocking::Response) -> anyhow::Result<Value> {
    let status = resp.status();
    let body: Value = resp.json().unwrap_or(Value::Null);
    if !status.is_success() {
        let error = body["error"].as_str().unwrap_or("unknown error");
        match body["details"].as_str() {
            Some(details) => bail!("server returned {}: {} ({})", status, error, details),
            None => bail!("server returned {}: {}", status, error),
        }
    }
    Ok(body)
}

fn print_json(value: &Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn do_intake(api: &Api, body: Value) -> anyhow::Result<()> {
    let result = api.post("/api/patients", &body)?;
    println!("Patient: {}", result["patient"]["id"].as_str().unwrap_or("?"));
    println!("Avatar:  {}", result["avatar"]["name"].as_str().unwrap_or("?"));
    println!(
        "Health:  {}",
        stat_bar(result["avatar"]["health"].as_i64().unwrap_or(0))
    );
    Ok(())
}

fn print_entry(speaker: Speaker, text: &str) {
    match speaker {
        Speaker::Patient => println!("tú> {}", text),
        Speaker::Assistant => println!("pulso> {}\n", text),
    }
}

fn do_chat(api: &Api, patient: &str, system_prompt: Option<&str>) -> anyhow::Result<()> {
    let history: ChatHistory =
        serde_json::from_value(api.get(&format!("/api/patients/{}/chat", patient))?)?;

    let mut transcript = if history.synthetic_welcome {
        // First session: ask the assistant to introduce itself.
        let body = json!({
            "userMessage": GREETING_SENTINEL,
            "patientId": patient,
            "systemPrompt": system_prompt,
        });
        match api.post("/api/chat", &body) {
            Ok(reply) => Transcript::from_history(vec![(
                Speaker::Assistant,
                reply["message"].as_str().unwrap_or_default().to_string(),
            )]),
            Err(e) => {
                eprintln!("pulso-cli: greeting failed: {}", e);
                Transcript::from_history(
                    history
                        .messages
                        .into_iter()
                        .map(|m| (Speaker::Assistant, m.message)),
                )
            }
        }
    } else {
        Transcript::from_history(history.messages.into_iter().map(|m| {
            let speaker = if m.role == "user" {
                Speaker::Patient
            } else {
                Speaker::Assistant
            };
            (speaker, m.message)
        }))
    };

    for entry in transcript.entries() {
        print_entry(entry.speaker, &entry.text);
    }

    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("tú> ");
        std::io::stdout().flush()?;

        let line = match lines.next() {
            Some(line) => line?,
            None => break,
        };
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        if text == "/quit" {
            break;
        }

        let turn = transcript.begin_turn(text);
        let body = json!({
            "userMessage": text,
            "patientId": patient,
            "systemPrompt": system_prompt,
        });
        match api.post("/api/chat", &body) {
            Ok(reply) => {
                transcript.confirm(turn, reply["message"].as_str().unwrap_or_default());
            }
            Err(e) => {
                eprintln!("pulso-cli: {}", e);
                transcript.fail(turn);
            }
        }

        if let Some(entry) = transcript.last() {
            print_entry(entry.speaker, &entry.text);
        }
    }

    let failed = transcript
        .entries()
        .iter()
        .filter(|e| e.state == EntryState::Failed)
        .count();
    if failed > 0 {
        eprintln!("pulso-cli: {} message(s) were not delivered", failed);
    }
    Ok(())
}

fn do_food(api: &Api, patient: &str, text: &str, analyze_only: bool) -> anyhow::Result<()> {
    let result = if analyze_only {
        api.post("/api/analyze-food", &json!({ "foodText": text }))?
    } else {
        api.post(
            &format!("/api/patients/{}/food-logs", patient),
            &json!({ "description": text }),
        )?
    };

    println!("Calories: {}", result["calories"]);
    let n = &result["nutrients"];
    println!(
        "Protein {}  Carbs {}  Fat {}",
        n["protein"].as_str().unwrap_or("?"),
        n["carbs"].as_str().unwrap_or("?"),
        n["fat"].as_str().unwrap_or("?")
    );
    Ok(())
}

fn do_avatar(api: &Api, patient: &str) -> anyhow::Result<()> {
    let state = api.get(&format!("/api/patients/{}/avatar", patient))?;
    let avatar = &state["avatar"];
    println!("{} (level {})", avatar["name"].as_str().unwrap_or("?"), avatar["level"]);
    println!("Health     {}", stat_bar(avatar["health"].as_i64().unwrap_or(0)));
    println!("Happiness  {}", stat_bar(avatar["happiness"].as_i64().unwrap_or(0)));

    if let Some(challenges) = state["challenges"].as_array() {
        for c in challenges {
            println!(
                "  {}  {:<10} {:<9} due {}",
                c["id"].as_str().unwrap_or("?"),
                c["challenge_type"].as_str().unwrap_or("?"),
                c["status"].as_str().unwrap_or("?"),
                c["due_date"].as_str().unwrap_or("?")
            );
        }
    }
    Ok(())
}

fn do_challenge(api: &Api, action: ChallengeCommand) -> anyhow::Result<()> {
    let body = match action {
        ChallengeCommand::New {
            patient,
            challenge_type,
        } => json!({
            "action": "create_challenge",
            "patientId": patient,
            "type": challenge_type,
        }),
        ChallengeCommand::Complete { challenge, patient } => json!({
            "action": "complete_challenge",
            "challengeId": challenge,
            "patientId": patient,
        }),
    };
    let result = api.post("/api/avatar", &body)?;
    print_json(&result)
}

fn do_dashboard(api: &Api, raw: bool) -> anyhow::Result<()> {
    let result = api.get("/api/patients")?;
    if raw {
        return print_json(&result);
    }

    let summary = &result["summary"];
    println!(
        "Patients: {}   Critical: {}   Stable: {}\n",
        summary["total"], summary["critical"], summary["stable"]
    );
    if let Some(patients) = result["patients"].as_array() {
        for p in patients {
            println!("{}", dashboard_row(p));
        }
    }
    Ok(())
}

fn do_export(api: &Api, kind: ReportKind, patient: &str, out: &Path) -> anyhow::Result<()> {
    let url = api.url(&format!(
        "/api/patients/{}/reports/{}",
        patient,
        kind.path_segment()
    ));
    let resp = api
        .client
        .get(&url)
        .send()
        .with_context(|| format!("connection failed to {}", url))?;

    if !resp.status().is_success() {
        read_json(resp)?;
        bail!("report download failed");
    }

    let filename = resp
        .headers()
        .get(reqwest::header::CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok())
        .and_then(disposition_filename)
        .unwrap_or_else(|| kind.fallback_filename(patient));

    let bytes = resp.bytes()?;
    std::fs::create_dir_all(out)?;
    let path = out.join(filename);
    std::fs::write(&path, &bytes).with_context(|| format!("writing {}", path.display()))?;
    println!("Saved {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}

/// Show the server status by calling GET /health.
fn do_status(api: &Api) -> anyhow::Result<()> {
    let url = api.url("/health");
    let resp = api
        .client
        .get(&url)
        .timeout(Duration::from_secs(10))
        .send();

    match resp {
        Ok(r) if r.status().is_success() => {
            let body: Value = r.json().unwrap_or_default();
            println!("Pulso server: {}", body["status"].as_str().unwrap_or("unknown"));
            println!("Version:      {}", body["version"].as_str().unwrap_or("?"));
            println!("PostgreSQL:   {}", body["postgresql"].as_str().unwrap_or("?"));
            println!("Completion:   {}", body["completion_configured"]);
        }
        Ok(r) => bail!("server unhealthy (HTTP {})", r.status()),
        Err(e) => bail!("cannot reach {}: {}", url, e),
    }

    Ok(())
}

// ============================================================================
// Main
// ============================================================================

fn main() {
    let cli = Cli::parse();

    let result = Api::new(&cli.server).and_then(|api| match cli.command {
        Commands::Intake {
            name,
            age,
            height,
            gender,
            activity,
            diet_type,
            allergies,
            health_goal,
        } => do_intake(
            &api,
            json!({
                "name": name,
                "age": age,
                "height": height,
                "gender": gender,
                "activity": activity,
                "diet_type": diet_type,
                "allergies": allergies,
                "health_goal": health_goal,
            }),
        ),
        Commands::Chat {
            patient,
            system_prompt,
        } => do_chat(&api, &patient, system_prompt.as_deref()),
        Commands::Food {
            patient,
            text,
            analyze_only,
        } => do_food(&api, &patient, &text, analyze_only),
        Commands::Health {
            patient,
            weight,
            stress,
        } => api
            .post(
                &format!("/api/patients/{}/health-logs", patient),
                &json!({ "weight": weight, "stress_level": stress }),
            )
            .and_then(|r| print_json(&r)),
        Commands::Avatar { patient } => do_avatar(&api, &patient),
        Commands::Challenge { action } => do_challenge(&api, action),
        Commands::Dashboard { json } => do_dashboard(&api, json),
        Commands::Export { kind, patient, out } => do_export(&api, kind, &patient, &out),
        Commands::Status => do_status(&api),
    });

    if let Err(e) = result {
        eprintln!("pulso-cli: {:#}", e);
        std::process::exit(1);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stat_bar_clamps_and_fills() {
        assert_eq!(stat_bar(100), "[##########] 100");
        assert_eq!(stat_bar(45), "[####......]  45");
        assert_eq!(stat_bar(-5), "[..........]  -5");
    }

    #[test]
    fn test_dashboard_row_flags_critical() {
        let p = json!({ "id": "a", "name": "Ana", "avatar": { "health": 49 } });
        assert!(dashboard_row(&p).ends_with("CRITICAL"));

        let p = json!({ "id": "a", "name": "Ana", "avatar": { "health": 50 } });
        assert!(dashboard_row(&p).ends_with("stable"));
    }

    #[test]
    fn test_dashboard_row_without_avatar_is_stable() {
        let p = json!({ "id": "b", "name": "Luis", "avatar": null });
        let row = dashboard_row(&p);
        assert!(row.contains("(no avatar)"));
        assert!(row.ends_with("stable"));
    }

    #[test]
    fn test_disposition_filename() {
        assert_eq!(
            disposition_filename("attachment; filename=\"chat_history_ana.pdf\"").as_deref(),
            Some("chat_history_ana.pdf")
        );
        assert_eq!(disposition_filename("attachment"), None);
        assert_eq!(disposition_filename("attachment; filename=\"../x.pdf\""), None);
    }

    #[test]
    fn test_report_fallback_filenames() {
        assert_eq!(ReportKind::Chat.fallback_filename("p1"), "chat_history_p1.pdf");
        assert_eq!(ReportKind::Summary.fallback_filename("p1"), "patient_report_p1.pdf");
        assert_eq!(ReportKind::Summary.path_segment(), "summary");
    }

    #[test]
    fn test_cli_parses_challenge_complete() {
        let cli = Cli::parse_from([
            "pulso-cli",
            "challenge",
            "complete",
            "--challenge",
            "c1",
        ]);
        assert!(matches!(
            cli.command,
            Commands::Challenge {
                action: ChallengeCommand::Complete { patient: None, .. }
            }
        ));
        assert_eq!(cli.server, DEFAULT_SERVER);
    }
}
