use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use quiz_core::model::{QuestionDraft, SUBJECTS, Subject};
use storage::repository::{QuestionRecord, QuestionRepository};
use storage::sqlite::SqliteRepository;

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    file: Option<PathBuf>,
    per_subject: u32,
    now: Option<DateTime<Utc>>,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    InvalidPerSubject { raw: String },
    InvalidNow { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidPerSubject { raw } => {
                write!(f, "invalid --per-subject value: {raw}")
            }
            ArgsError::InvalidNow { raw } => {
                write!(f, "invalid --now value (expected RFC3339): {raw}")
            }
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("QUIZ_DB_URL")
            .unwrap_or_else(|_| "sqlite:prepbank.sqlite3?mode=rwc".into());
        let mut file = std::env::var("QUIZ_SEED_FILE").ok().map(PathBuf::from);
        let mut per_subject = std::env::var("QUIZ_SEED_PER_SUBJECT")
            .ok()
            .and_then(|value| value.parse::<u32>().ok())
            .unwrap_or(20);
        let mut now: Option<DateTime<Utc>> = None;

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = value;
                }
                "--file" => {
                    file = Some(PathBuf::from(require_value(&mut args, "--file")?));
                }
                "--per-subject" => {
                    let value = require_value(&mut args, "--per-subject")?;
                    per_subject = value
                        .parse::<u32>()
                        .map_err(|_| ArgsError::InvalidPerSubject { raw: value.clone() })?;
                }
                "--now" => {
                    let value = require_value(&mut args, "--now")?;
                    let parsed = DateTime::parse_from_rfc3339(&value)
                        .map_err(|_| ArgsError::InvalidNow { raw: value.clone() })?
                        .with_timezone(&Utc);
                    now = Some(parsed);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            file,
            per_subject,
            now,
        })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: sqlite:prepbank.sqlite3?mode=rwc)");
    eprintln!("  --file <path>             JSON array of questions to import");
    eprintln!("  --per-subject <n>         Sample questions per subject when no file is given (default: 20)");
    eprintln!("  --now <rfc3339>           Fixed current time for deterministic seeding");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Environment (same as flags):");
    eprintln!("  QUIZ_DB_URL, QUIZ_SEED_FILE, QUIZ_SEED_PER_SUBJECT");
}

/// Stored rows get staggered creation times so "newest first" is stable.
fn stamp(drafts: Vec<QuestionDraft>, now: DateTime<Utc>) -> Vec<QuestionRecord> {
    let total = i64::try_from(drafts.len()).unwrap_or(i64::MAX);
    drafts
        .into_iter()
        .zip(0_i64..)
        .map(|(draft, i)| QuestionRecord {
            draft,
            created_at: now - Duration::seconds(total - i),
        })
        .collect()
}

fn sample_questions(per_subject: u32) -> Vec<QuestionDraft> {
    let mut drafts = Vec::new();
    for name in SUBJECTS {
        let subject = Subject::from(*name);
        for n in 1..=per_subject {
            let multi = n % 7 == 0;
            let correct = if multi { vec![0, 2] } else { vec![i64::from(n % 4)] };
            drafts.push(QuestionDraft {
                id: format!("{}-{n:03}", slug(name)),
                text: Some(format!("{name} practice question {n}")),
                options: Some(
                    ["Option A", "Option B", "Option C", "Option D"]
                        .map(String::from)
                        .to_vec(),
                ),
                correct_indices: Some(correct),
                kind: Some(if multi { "multi" } else { "single" }.into()),
                explanation: Some(format!("Worked explanation for {name} question {n}.")),
                subject: Some(subject.storage_name().to_owned()),
            });
        }
    }
    drafts
}

fn slug(name: &str) -> String {
    name.chars()
        .filter_map(|c| match c {
            c if c.is_ascii_alphanumeric() => Some(c.to_ascii_lowercase()),
            ' ' => Some('-'),
            _ => None,
        })
        .collect()
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let repo = SqliteRepository::open(&args.db_url).await?;
    let now = args.now.unwrap_or_else(Utc::now);

    let drafts = match &args.file {
        Some(path) => {
            let raw = std::fs::read_to_string(path)?;
            serde_json::from_str::<Vec<QuestionDraft>>(&raw)?
        }
        None => sample_questions(args.per_subject),
    };
    let records = stamp(drafts, now);
    let written = repo.upsert_questions(&records).await?;

    println!("Seeded {written} questions into {}", args.db_url);
    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
