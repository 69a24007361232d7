use chrono::NaiveDate;
use std::path::PathBuf;
use std::time::Instant;

use nook::config::NookConfig;
use nook::core::habit::day_slot;
use nook::core::record::{Record, RecordId};
use nook::sync::identity::{self, Session};
use nook::sync::{CollectionState, Persist};
use nook::widgets::{Backends, Dashboard};

const USAGE: &str = "\
usage: nook [--config PATH] <command>

  tasks list | add <label> [--due YYYY-MM-DD] | done <id> | edit <id> <label> | rm <id>
  habits list | add <name> | tick <id> [day 0-6] | rm <id>
  links list | add <url> [title] | move <from> <to> | rm <id>
  note show | write <text>
  login <owner-id> <access-token>
  logout";

/// Set up logging to the systemd user journal (`journalctl --user -t nook -f`).
/// Wrapper filters: nook at info/debug (per config), everything else at warn.
fn init_logging() {
    struct FilteredJournal {
        inner: systemd_journal_logger::JournalLog,
    }

    impl log::Log for FilteredJournal {
        fn enabled(&self, metadata: &log::Metadata) -> bool {
            nook::log_enabled(metadata)
        }
        fn log(&self, record: &log::Record) {
            if self.enabled(record.metadata()) {
                self.inner.log(record);
            }
        }
        fn flush(&self) {
            self.inner.flush();
        }
    }

    let journal = match systemd_journal_logger::JournalLog::new() {
        Ok(journal) => journal.with_syslog_identifier("nook".to_string()),
        Err(e) => {
            eprintln!("journal logging unavailable: {}", e);
            return;
        }
    };
    if log::set_boxed_logger(Box::new(FilteredJournal { inner: journal })).is_ok() {
        // Global max must be Debug so nook debug logs can pass through when toggled
        log::set_max_level(log::LevelFilter::Debug);
    }
}

fn print_state<F>(state: &CollectionState<F>, line: impl Fn(&Record<F>) -> String) {
    for record in &state.items {
        println!("  {}  {}", record.id, line(record));
    }
    print!("[{}] {} item(s)", state.mode, state.items.len());
    match &state.error {
        Some(error) => println!(" - {}", error),
        None => println!(),
    }
}

fn arg<'a>(args: &'a [String], i: usize, what: &str) -> Result<&'a str, String> {
    args.get(i)
        .map(String::as_str)
        .ok_or_else(|| format!("missing {}\n\n{}", what, USAGE))
}

fn parse_due(args: &[String]) -> Result<Option<NaiveDate>, String> {
    match args.iter().position(|a| a == "--due") {
        Some(i) => {
            let raw = arg(args, i + 1, "due date")?;
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map(Some)
                .map_err(|e| format!("bad due date {}: {}", raw, e))
        }
        None => Ok(None),
    }
}

async fn settle(result: Result<Persist, nook::error::ValidationError>) -> Result<(), String> {
    result.map_err(|e| e.to_string())?.await;
    Ok(())
}

async fn run_tasks(dashboard: &Dashboard, args: &[String]) -> Result<(), String> {
    let tasks = &dashboard.tasks;
    match arg(args, 0, "tasks action")? {
        "list" => {}
        "add" => {
            let label = arg(args, 1, "label")?;
            settle(tasks.add(label, parse_due(args)?)).await?;
        }
        "done" => settle(tasks.toggle_completed(&RecordId::from(arg(args, 1, "id")?))).await?,
        "edit" => {
            let id = RecordId::from(arg(args, 1, "id")?);
            settle(tasks.rename(&id, arg(args, 2, "label")?)).await?;
        }
        "rm" => tasks.remove(&RecordId::from(arg(args, 1, "id")?)).await,
        other => return Err(format!("unknown tasks action {}\n\n{}", other, USAGE)),
    }

    let today = chrono::Local::now().date_naive();
    let state = tasks.collection().state();
    print_state(&state, |r| {
        let mark = if r.fields.completed { "[x]" } else { "[ ]" };
        let due = match r.fields.due_date {
            Some(d) if r.fields.is_overdue(today) => format!(" (overdue {})", d),
            Some(d) => format!(" (due {})", d),
            None => String::new(),
        };
        format!("{} {}{}", mark, r.fields.label, due)
    });
    println!("{} remaining", tasks.remaining());
    Ok(())
}

async fn run_habits(dashboard: &Dashboard, args: &[String]) -> Result<(), String> {
    let habits = &dashboard.habits;
    let today = chrono::Local::now().date_naive();
    match arg(args, 0, "habits action")? {
        "list" => {}
        "add" => settle(habits.add(arg(args, 1, "name")?)).await?,
        "tick" => {
            let id = RecordId::from(arg(args, 1, "id")?);
            let day = match args.get(2) {
                Some(raw) => raw.parse::<usize>().map_err(|e| format!("bad day {}: {}", raw, e))?,
                None => day_slot(today),
            };
            settle(habits.toggle_day(&id, day)).await?;
        }
        "rm" => habits.remove(&RecordId::from(arg(args, 1, "id")?)).await,
        other => return Err(format!("unknown habits action {}\n\n{}", other, USAGE)),
    }

    let state = habits.collection().state();
    print_state(&state, |r| {
        let grid: String = r
            .fields
            .week
            .iter()
            .map(|done| if *done { '\u{25CF}' } else { '\u{25CB}' })
            .collect();
        format!(
            "{} {} {}% streak {}",
            grid,
            r.fields.name,
            r.fields.weekly_percent(),
            r.fields.streak(today)
        )
    });
    println!("{}% of this week done", habits.overall_percent());
    Ok(())
}

async fn run_links(dashboard: &Dashboard, args: &[String]) -> Result<(), String> {
    let links = &dashboard.links;
    match arg(args, 0, "links action")? {
        "list" => {}
        "add" => {
            let title = args.get(2).map(String::as_str).unwrap_or("");
            settle(links.add(arg(args, 1, "url")?, title)).await?;
        }
        "move" => {
            let index = |i: usize, what: &str| -> Result<usize, String> {
                arg(args, i, what)?
                    .parse()
                    .map_err(|e| format!("bad {} index: {}", what, e))
            };
            let (from, to) = (index(1, "from")?, index(2, "to")?);
            futures::future::join_all(links.move_link(from, to)).await;
        }
        "rm" => links.remove(&RecordId::from(arg(args, 1, "id")?)).await,
        other => return Err(format!("unknown links action {}\n\n{}", other, USAGE)),
    }

    let mut state = links.collection().state();
    state.items = links.ordered();
    print_state(&state, |r| format!("{} <{}>", r.fields.title, r.fields.url));
    Ok(())
}

async fn run_note(dashboard: &mut Dashboard, args: &[String]) -> Result<(), String> {
    match arg(args, 0, "note action")? {
        "show" => {}
        "write" => {
            let text = args[1..].join(" ");
            dashboard.notes.edit(&text, None, Instant::now());
            if let Some(persist) = dashboard.notes.flush() {
                persist.await;
            }
        }
        other => return Err(format!("unknown note action {}\n\n{}", other, USAGE)),
    }

    println!("{}", dashboard.notes.text());
    let state = dashboard.notes.collection().state();
    let version = dashboard.notes.current().map(|n| n.fields.version).unwrap_or(0);
    print!("[{}] version {}", state.mode, version);
    match state.error {
        Some(error) => println!(" - {}", error),
        None => println!(),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args: Vec<String> = std::env::args().skip(1).collect();

    let config_path = match args.iter().position(|a| a == "--config") {
        Some(i) if i + 1 < args.len() => {
            let path = PathBuf::from(args.remove(i + 1));
            args.remove(i);
            path
        }
        _ => NookConfig::default_path(),
    };
    // installed first so a broken config file gets reported
    init_logging();
    let config = NookConfig::load(&config_path);
    nook::set_debug_logging(config.debug_logging);

    let Some(command) = args.first().cloned() else {
        println!("{}", USAGE);
        return Ok(());
    };
    let rest = &args[1..];

    match command.as_str() {
        "login" | "logout" => {
            let Some(remote) = &config.remote else {
                return Err(format!("no remote configured in {}", config_path.display()).into());
            };
            if command == "login" {
                let session = Session {
                    owner_id: arg(rest, 0, "owner id")?.to_string(),
                    access_token: arg(rest, 1, "access token")?.to_string(),
                };
                identity::store_session(&remote.url, &session).await?;
                println!("Signed in as {}", session.owner_id);
            } else {
                identity::clear_session(&remote.url).await?;
                println!("Signed out");
            }
            return Ok(());
        }
        "tasks" | "habits" | "links" | "note" => {}
        other => return Err(format!("unknown command {}\n\n{}", other, USAGE).into()),
    }

    let backends = Backends::from_config(&config).await;
    let mut dashboard = Dashboard::new(&backends, config.note_autosave());
    dashboard.load().await;

    match command.as_str() {
        "tasks" => run_tasks(&dashboard, rest).await?,
        "habits" => run_habits(&dashboard, rest).await?,
        "links" => run_links(&dashboard, rest).await?,
        _ => run_note(&mut dashboard, rest).await?,
    }

    Ok(())
}
