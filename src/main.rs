use std::collections::HashSet;
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{ArgGroup, Parser, Subcommand};
use rand::SeedableRng;
use rand::rngs::SmallRng;

use mindvault::config::Config;
use mindvault::content::loader::{ContentSlot, LoadState};
use mindvault::content::provider::ContentLibrary;
use mindvault::content::{
    ChapterId, ChapterMeta, ContentId, ContentProvider, ExamId, ExamMeta, Question,
    split_sentences,
};
use mindvault::engine::scoring::ScoreReport;
use mindvault::engine::session_builder::{self, SIZE_OPTIONS, SessionSize};
use mindvault::event::{AppEvent, EventHandler};
use mindvault::session::progress::{self, ContextPolicy, ProgressTracker};
use mindvault::session::{
    AdvanceOutcome, ExamSession, SelectOutcome, SessionOutcome, TimerTick, format_time,
};
use mindvault::store::{JsonStore, KvStore};
use mindvault::vault::view::VaultView;
use mindvault::vault::{BookmarkContext, MindVault, QuestionIndex};

#[derive(Parser)]
#[command(name = "mindvault", version, about = "Chapter practice, timed exams and a personal review vault")]
struct Cli {
    #[arg(long, global = true, help = "Directory for saved progress and bookmarks")]
    data_dir: Option<PathBuf>,

    #[arg(long, global = true, help = "Directory of question files (default: bundled content)")]
    content_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List chapters and exams
    Chapters,
    /// Practice a chapter, resuming a saved session if there is one
    Practice {
        chapter: String,
        #[arg(long, value_enum)]
        size: Option<SessionSize>,
        #[arg(long, help = "Discard any saved progress and start over")]
        fresh: bool,
    },
    /// Take a timed exam
    Exam { exam: String },
    /// Browse and manage bookmarked questions
    Vault {
        #[command(subcommand)]
        action: VaultCommand,
    },
}

#[derive(Subcommand)]
enum VaultCommand {
    List,
    /// Quiz yourself on bookmarked questions
    Review {
        #[arg(long, conflicts_with = "exam")]
        chapter: Option<String>,
        #[arg(long)]
        exam: Option<String>,
    },
    #[command(group(ArgGroup::new("context").required(true).args(["chapter", "exam"])))]
    Toggle {
        question: String,
        #[arg(long)]
        chapter: Option<String>,
        #[arg(long)]
        exam: Option<String>,
    },
    Clear {
        #[arg(long, help = "Skip the confirmation prompt")]
        yes: bool,
    },
    /// Upgrade bookmarks saved by older versions
    Migrate,
}

struct App {
    config: Config,
    store: KvStore,
    content: ContentLibrary,
    vault: MindVault,
}

impl App {
    fn new(cli: &Cli) -> Result<Self> {
        let mut config = Config::load().context("failed to load config")?;
        if let Some(dir) = &cli.data_dir {
            config.data_dir = dir.to_string_lossy().to_string();
        }
        if let Some(dir) = &cli.content_dir {
            config.content_dir = dir.to_string_lossy().to_string();
        }

        let backend = JsonStore::with_base_dir(PathBuf::from(&config.data_dir))
            .with_context(|| format!("cannot use data directory {}", config.data_dir))?;
        let store = KvStore::new(backend);
        let content = match config.content_dir() {
            Some(dir) => ContentLibrary::from_dir(dir),
            None => ContentLibrary::bundled(),
        };
        let vault = MindVault::load(store.clone());

        Ok(Self {
            config,
            store,
            content,
            vault,
        })
    }

    fn chapter_pools(&self) -> Vec<(ChapterMeta, Vec<Question>)> {
        self.content
            .chapters()
            .into_iter()
            .filter(|meta| !meta.is_coming_soon)
            .filter_map(|meta| {
                let id: ContentId = meta.id.parse().ok()?;
                match self.content.load(id) {
                    Ok(questions) => Some((meta, questions)),
                    Err(e) => {
                        log::warn!("{e}");
                        None
                    }
                }
            })
            .collect()
    }

    fn exam_pools(&self) -> Vec<(ExamMeta, Vec<Question>)> {
        self.content
            .exams()
            .into_iter()
            .filter_map(|meta| {
                let id: ContentId = meta.id.parse().ok()?;
                self.content.load(id).ok().map(|questions| (meta, questions))
            })
            .collect()
    }

    /// `on_collection_load` for the MindVault, against every chapter we can read.
    fn migrate_vault(&mut self, chapters: &[(ChapterMeta, Vec<Question>)]) {
        if self.vault.is_migrated() && self.vault.pending_legacy() == 0 {
            return;
        }
        let index = QuestionIndex::from_pools(chapters.iter().map(|(_, q)| q.as_slice()));
        self.vault.on_collection_load(&index);
    }

    fn load_pool(&self, id: ContentId) -> Result<Vec<Question>> {
        let mut slot = ContentSlot::default();
        match slot.fetch(&self.content, id) {
            LoadState::Ready { questions, .. } => Ok(questions.clone()),
            LoadState::Failed { error, .. } if error.is_retryable() => {
                bail!("{error}. Please try again later.")
            }
            LoadState::Failed { error, .. } => bail!("{error}"),
            LoadState::Idle | LoadState::Loading(_) => bail!("{id} did not load"),
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    let mut app = App::new(&cli)?;

    match cli.command {
        Command::Chapters => list_chapters(&app),
        Command::Practice {
            chapter,
            size,
            fresh,
        } => run_practice(&mut app, &chapter, size, fresh),
        Command::Exam { exam } => run_exam(&mut app, &exam),
        Command::Vault { action } => match action {
            VaultCommand::List => vault_list(&mut app),
            VaultCommand::Review { chapter, exam } => vault_review(&mut app, chapter, exam),
            VaultCommand::Toggle {
                question,
                chapter,
                exam,
            } => vault_toggle(&mut app, &question, chapter, exam),
            VaultCommand::Clear { yes } => vault_clear(&mut app, yes),
            VaultCommand::Migrate => vault_migrate(&mut app),
        },
    }
}

fn list_chapters(app: &App) -> Result<()> {
    let chapters = app.content.chapters();
    if chapters.is_empty() {
        println!("No chapters found.");
    }
    for meta in &chapters {
        if meta.is_coming_soon {
            println!("{:<12} {}  (coming soon)", meta.id, meta.title);
            continue;
        }
        let pool_len = meta
            .id
            .parse::<ContentId>()
            .ok()
            .and_then(|id| app.content.load(id).ok())
            .map_or(0, |q| q.len());
        println!("{:<12} {}  [{pool_len} questions]", meta.id, meta.title);
        for option in &SIZE_OPTIONS {
            let avail = option.availability(pool_len);
            let note = if avail.limited {
                format!(" (only {} available)", avail.count)
            } else {
                String::new()
            };
            println!(
                "    {:<20} {:>2} questions, {}, {}{note}",
                option.label, option.question_count, option.estimated_time, option.difficulty
            );
        }
    }

    let exams = app.content.exams();
    if !exams.is_empty() {
        println!();
    }
    for meta in &exams {
        let minutes = meta
            .duration_minutes
            .map_or(app.config.exam_duration_secs / 60, u64::from);
        println!("{:<12} {}  [{minutes} min]", meta.id, meta.title);
    }
    Ok(())
}

fn run_practice(app: &mut App, chapter: &str, size: Option<SessionSize>, fresh: bool) -> Result<()> {
    let chapter_id: ChapterId = chapter.parse()?;
    let key = chapter_id.to_string();
    let pool = app.load_pool(chapter_id.into())?;

    let chapters = app.chapter_pools();
    app.migrate_vault(&chapters);

    let saved = if fresh {
        progress::clear_checkpoint(&app.store, &key);
        None
    } else {
        progress::load_checkpoint(&app.store, &key)
    };

    let size = size.unwrap_or(app.config.default_session_size);
    let option = size.option();
    let answered = session_builder::answered_history(&app.store, &key);
    let mut rng = SmallRng::from_entropy();
    let questions = match &saved {
        // The whole pool, so every logged question can be put back in place.
        Some(saved) => {
            let built = session_builder::build(&pool, Some(&answered), pool.len(), &mut rng)?;
            let mut questions = progress::restore_order(built.questions, saved);
            questions.truncate(option.question_count);
            questions
        }
        None => {
            let built =
                session_builder::build(&pool, Some(&answered), option.question_count, &mut rng)?;
            if built.capped {
                println!(
                    "Only {} questions available for {key}; {} requested.",
                    built.questions.len(),
                    built.requested
                );
            }
            built.questions
        }
    };

    let mut tracker = ProgressTracker::persistent(questions, app.store.clone(), &key);
    println!("{}: {} questions. Answer with a number, 'b' toggles the bookmark, 'q' saves and quits.", option.label, tracker.questions().len());

    let events = EventHandler::stdin(None);
    if run_quiz(&mut tracker, &mut app.vault, &events)? {
        print_report(&tracker.outcome(), app.config.exam_pass_percent);
    } else {
        println!("Progress saved. Run the same command to continue.");
    }
    Ok(())
}

/// Interactive loop over a tracker. Returns whether the session completed.
fn run_quiz(tracker: &mut ProgressTracker, vault: &mut MindVault, events: &EventHandler) -> Result<bool> {
    let mut shown = None;
    loop {
        let Some(question) = tracker.current_question().cloned() else {
            return Ok(tracker.is_completed());
        };
        let index = tracker.index().unwrap_or(0);
        if shown != Some(index) {
            show_question(&question, index, tracker.questions().len(), tracker, vault);
            if let Some(sel) = tracker.selection() {
                println!("(already answered: {})", sel + 1);
            }
            shown = Some(index);
        }
        prompt();

        let line = match events.next()? {
            AppEvent::Line(line) => line,
            AppEvent::Tick => continue,
            AppEvent::Eof => return Ok(false),
        };
        match line.as_str() {
            "q" => return Ok(false),
            "r" => {
                tracker.reset();
                shown = None;
                println!("Restarted.");
            }
            "b" => toggle_current(tracker, vault, &question),
            "" | "n" => match tracker.advance() {
                AdvanceOutcome::Completed(_) => return Ok(true),
                AdvanceOutcome::NotAnswered => println!("Pick an answer first."),
                AdvanceOutcome::Moved(_) | AdvanceOutcome::Finished => {}
            },
            other => match other.parse::<usize>() {
                Ok(n) if n > 0 => match tracker.select_answer(n - 1, vault) {
                    SelectOutcome::Recorded(record) => {
                        if record.is_correct {
                            println!("Correct!");
                        } else {
                            println!(
                                "Incorrect. The answer is {}) {}",
                                question.correct_answer_index + 1,
                                question.options[question.correct_answer_index]
                            );
                        }
                        if !question.explanation.is_empty() {
                            println!("{}", question.explanation);
                        }
                        println!("Press Enter to continue.");
                    }
                    SelectOutcome::Locked => println!("Already answered. Press Enter to continue."),
                    SelectOutcome::InvalidOption => println!("No option {n}."),
                    SelectOutcome::NoCurrentQuestion | SelectOutcome::Finished => {}
                },
                _ => println!("Enter an option number, Enter to continue, 'b', 'r' or 'q'."),
            },
        }
    }
}

fn run_exam(app: &mut App, exam: &str) -> Result<()> {
    let exam_id: ExamId = exam.parse()?;
    let key = exam_id.to_string();
    let pool = app.load_pool(exam_id.into())?;

    let chapters = app.chapter_pools();
    app.migrate_vault(&chapters);

    let duration_secs = app
        .content
        .exams()
        .iter()
        .find(|m| m.id == key)
        .and_then(|m| m.duration_minutes)
        .map_or(app.config.exam_duration_secs, |m| u64::from(m) * 60);

    let mut rng = SmallRng::from_entropy();
    let built = session_builder::build(&pool, None, pool.len(), &mut rng)?;
    let mut session = ExamSession::new(&key, built.questions, Duration::from_secs(duration_secs));

    println!(
        "{key}: {} questions, {}. Answer with a number; 'n'/'p' skip forward/back, 'g <n>' jumps, \
         'nav' shows progress, 't' the time, 's' submits.",
        session.tracker().questions().len(),
        format_time(duration_secs)
    );
    let events = EventHandler::stdin(Some(Duration::from_secs(1)));
    session.on_session_start();

    let mut shown = None;
    while !session.is_completed() {
        let index = session.tracker().index().unwrap_or(0);
        if shown != Some(index)
            && let Some(question) = session.tracker().current_question()
        {
            show_question(question, index, session.tracker().questions().len(), session.tracker(), &app.vault);
            if let Some(sel) = session.tracker().selection() {
                println!("(answered: {}, locked)", sel + 1);
            }
            prompt();
            shown = Some(index);
        }

        match events.next()? {
            AppEvent::Tick => match session.tick(&mut app.vault) {
                TimerTick::Expired => println!("\nTime is up. Your exam has been submitted."),
                TimerTick::Running(remaining) => {
                    let warn = session.timer().is_warning(app.config.timer_warning_secs);
                    if remaining % 600 == 0 || (warn && remaining % 60 == 0) {
                        println!("\n[{} remaining]", format_time(remaining));
                        prompt();
                    }
                }
                TimerTick::Idle => {}
            },
            AppEvent::Line(line) => match line.as_str() {
                "t" => println!("[{} remaining]", format_time(session.timer().remaining())),
                "s" => {
                    session.submit(&mut app.vault);
                }
                "n" => {
                    if !session.skip() {
                        println!("This is the last question.");
                    }
                }
                "p" => {
                    if !session.previous() {
                        println!("This is the first question.");
                    }
                }
                "nav" => print_navigation(&session),
                other if other.starts_with("g ") => {
                    let target = other[2..].trim().parse::<usize>().ok().filter(|&n| n > 0);
                    if !target.is_some_and(|n| session.goto(n - 1)) {
                        println!("No question {}.", other[2..].trim());
                    }
                }
                other => match other.parse::<usize>() {
                    Ok(n) if n > 0 => match session.select_answer(n - 1, &mut app.vault) {
                        SelectOutcome::Recorded(_) => {
                            session.advance(&mut app.vault);
                        }
                        SelectOutcome::InvalidOption => println!("No option {n}."),
                        _ => {}
                    },
                    _ => println!("Enter an option number, 'n', 'p', 'g <n>', 'nav', 't' or 's'."),
                },
            },
            AppEvent::Eof => {
                session.submit(&mut app.vault);
            }
        }
    }

    if let Some(outcome) = session.outcome() {
        print_report(&outcome, app.config.exam_pass_percent);
    }
    Ok(())
}

fn print_navigation(session: &ExamSession) {
    let current = session.tracker().index();
    let answered = session.answered();
    let marks: Vec<String> = answered
        .iter()
        .enumerate()
        .map(|(i, &answered)| {
            let mark = if answered { "x" } else { " " };
            if current == Some(i) {
                format!("<{}{mark}>", i + 1)
            } else {
                format!("{}{mark}", i + 1)
            }
        })
        .collect();
    let done = answered.iter().filter(|&&a| a).count();
    println!("{}  ({done}/{} answered)", marks.join(" "), marks.len());
    prompt();
}

fn vault_list(app: &mut App) -> Result<()> {
    let chapters = app.chapter_pools();
    app.migrate_vault(&chapters);
    let view = VaultView::build(&app.vault, &chapters, &app.exam_pools());
    if view.is_empty() {
        println!("Your MindVault is empty.");
        return Ok(());
    }
    println!("{} bookmarked questions", view.total());
    for group in view.groups() {
        println!("\n{} ({}, {})", group.title, group.context.context_id, group.questions.len());
        for q in &group.questions {
            let first = split_sentences(&q.question_text).into_iter().next().unwrap_or_default();
            println!("  {} [{}] {first}", q.id, q.chapter_section);
        }
    }
    Ok(())
}

fn vault_review(app: &mut App, chapter: Option<String>, exam: Option<String>) -> Result<()> {
    let chapters = app.chapter_pools();
    app.migrate_vault(&chapters);
    let view = VaultView::build(&app.vault, &chapters, &app.exam_pools());
    let wanted = chapter.or(exam);

    let mut questions = Vec::new();
    let mut contexts = Vec::new();
    for group in view.groups() {
        if wanted.as_ref().is_some_and(|w| *w != group.context.context_id) {
            continue;
        }
        for q in &group.questions {
            questions.push(q.clone());
            contexts.push(group.context.clone());
        }
    }
    if questions.is_empty() {
        println!("Nothing to review.");
        return Ok(());
    }

    let mut tracker =
        ProgressTracker::ephemeral(questions).with_contexts(ContextPolicy::PerQuestion(contexts));
    println!("Reviewing {} questions. Correct answers leave the MindVault.", tracker.questions().len());
    let events = EventHandler::stdin(None);
    if run_quiz(&mut tracker, &mut app.vault, &events)? {
        print_report(&tracker.outcome(), app.config.exam_pass_percent);
    }
    Ok(())
}

fn vault_toggle(app: &mut App, question: &str, chapter: Option<String>, exam: Option<String>) -> Result<()> {
    let context = match (chapter, exam) {
        (Some(chapter), _) => BookmarkContext::chapter(chapter),
        (None, Some(exam)) => BookmarkContext::exam(exam),
        (None, None) => bail!("pass --chapter or --exam"),
    };
    let added = app
        .vault
        .toggle(question, context.source, &context.context_id)?;
    let verb = if added { "Added" } else { "Removed" };
    println!("{verb} {question} ({})", context.context_id);
    Ok(())
}

fn vault_clear(app: &mut App, yes: bool) -> Result<()> {
    if app.vault.is_empty() {
        println!("Your MindVault is already empty.");
        return Ok(());
    }
    if !yes {
        print!("Remove all {} bookmarks? [y/N] ", app.vault.len());
        io::stdout().flush()?;
        let mut answer = String::new();
        io::stdin().read_line(&mut answer)?;
        if !matches!(answer.trim(), "y" | "Y" | "yes") {
            println!("Cancelled.");
            return Ok(());
        }
    }
    app.vault.clear();
    println!("MindVault cleared.");
    Ok(())
}

fn vault_migrate(app: &mut App) -> Result<()> {
    let chapters = app.chapter_pools();
    let index = QuestionIndex::from_pools(chapters.iter().map(|(_, q)| q.as_slice()));
    let report = app.vault.on_collection_load(&index);
    println!(
        "kept {}, upgraded {}, duplicates removed {}, skipped {} ({} waiting for content)",
        report.kept, report.migrated, report.duplicates, report.skipped, report.pending
    );
    if app.vault.is_migrated() {
        println!("Migration complete.");
    }
    Ok(())
}

fn show_question(
    question: &Question,
    index: usize,
    total: usize,
    tracker: &ProgressTracker,
    vault: &MindVault,
) {
    let marked = tracker
        .current_context()
        .is_some_and(|ctx| vault.is_bookmarked(&question.id, ctx.source));
    let star = if marked { "  * in MindVault" } else { "" };
    println!("\nQuestion {}/{total}  [{}]{star}", index + 1, question.chapter_section);
    for line in split_sentences(&question.question_text) {
        println!("{line}");
    }
    for (i, option) in question.options.iter().enumerate() {
        println!("  {}) {option}", i + 1);
    }
}

fn toggle_current(tracker: &ProgressTracker, vault: &mut MindVault, question: &Question) {
    let Some(ctx) = tracker.current_context() else {
        println!("This session has no bookmark context.");
        return;
    };
    match vault.toggle(&question.id, ctx.source, &ctx.context_id) {
        Ok(true) => println!("Added to MindVault."),
        Ok(false) => println!("Removed from MindVault."),
        Err(e) => println!("Could not bookmark: {e}"),
    }
}

fn prompt() {
    print!("> ");
    let _ = io::stdout().flush();
}

fn print_report(outcome: &SessionOutcome, pass_percent: u32) {
    let report = ScoreReport::from_outcome(outcome, pass_percent);
    println!("\n{}/{} correct ({}%)", report.correct, report.total, report.percentage);
    match report.verdict {
        Some(verdict) => println!("{}", verdict.headline()),
        None => println!("{}", report.tier.headline()),
    }
    println!("{}", report.tier.suggestion());

    let missed: HashSet<&str> = outcome.failed_questions().iter().map(|q| q.id.as_str()).collect();
    if missed.is_empty() {
        return;
    }
    println!("\nReview:");
    for item in outcome.review() {
        if !missed.contains(item.question.id.as_str()) {
            continue;
        }
        let q = item.question;
        let picked = item
            .result
            .and_then(|r| r.selected_index)
            .and_then(|i| q.options.get(i))
            .map_or("no answer", String::as_str);
        println!("  {} {}", q.id, q.question_text);
        println!("     yours: {picked}");
        println!("     answer: {}", q.options[q.correct_answer_index]);
    }
    if outcome.is_exam {
        println!("\nMissed questions are saved in your MindVault.");
    }
}
