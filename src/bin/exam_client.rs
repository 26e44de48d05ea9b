// src/bin/exam_client.rs

use std::{error::Error, path::PathBuf, time::Instant};

use clap::{Parser, Subcommand};
use exam_portal::client::{
    ApiError, ExamApi, ExamFlow, FlowError, FlowState, HttpExamApi, Session, render,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

/// Terminal client for the exam portal
#[derive(Parser, Debug)]
#[command(name = "exam-client")]
#[command(author, version, about = "Take exams from the terminal")]
struct Cli {
    /// Base URL of the exam portal API
    #[arg(long, default_value = "http://localhost:5000")]
    server: String,

    /// Where the session token is kept between runs
    #[arg(long, value_name = "PATH")]
    token_file: Option<PathBuf>,

    /// Verbosity level (-v = info, -vv = debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a learner account
    Register {
        #[arg(short, long)]
        username: String,
        #[arg(short, long)]
        password: String,
    },
    /// Log in and keep the token for later commands
    Login {
        #[arg(short, long)]
        username: String,
        #[arg(short, long)]
        password: String,
    },
    /// Forget the stored token
    Logout,
    /// List the exams open to you
    Exams,
    /// Take an exam against the clock
    Take {
        exam_id: i64,
    },
    /// Show your past results
    Results,
}

fn default_token_file() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_default()
        .join(".exam-portal-token")
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(level))
        .with_target(false)
        .init();

    let token_file = cli.token_file.unwrap_or_else(default_token_file);
    let session = Session::load(cli.server.as_str(), &token_file)?;
    let mut api = HttpExamApi::new(session);

    match cli.command {
        Command::Register { username, password } => {
            let user = api.register(&username, &password).await?;
            println!("Registered {} (id {})", user.username, user.id);
        }
        Command::Login { username, password } => {
            let login = api.login(&username, &password).await?;
            api.session_mut().begin(login.token)?;
            println!("Logged in as {} ({})", login.user.username, login.user.role);
        }
        Command::Logout => {
            api.session_mut().end()?;
            println!("Logged out");
        }
        Command::Exams => {
            api.session().require_token()?;
            let exams = api.list_exams().await;
            let exams = check_session(&mut api, exams)?;
            print!("{}", render::exam_list(&exams));
        }
        Command::Results => {
            api.session().require_token()?;
            let results = api.my_results().await;
            let results = check_session(&mut api, results)?;
            print!("{}", render::history(&results));
        }
        Command::Take { exam_id } => {
            api.session().require_token()?;
            take_exam(api, exam_id).await?;
        }
    }

    Ok(())
}

/// Passes `result` through, ending the stored session when the server rejected the token.
fn check_session<T>(api: &mut HttpExamApi, result: Result<T, ApiError>) -> Result<T, Box<dyn Error>> {
    match result {
        Err(ApiError::Unauthorized(msg)) => {
            api.session_mut().end()?;
            Err(format!("session expired ({}), please log in again", msg).into())
        }
        other => Ok(other?),
    }
}

async fn take_exam(api: HttpExamApi, exam_id: i64) -> Result<(), Box<dyn Error>> {
    let mut flow = ExamFlow::new(api);
    if let Err(e) = flow.select_exam(exam_id, Instant::now()).await {
        return Err(flow_failure(flow, e));
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    redraw(&flow);

    loop {
        let deadline = match flow.state() {
            FlowState::Answering(sheet) => sheet.deadline(),
            FlowState::ShowingResult(done) => {
                print!("{}", render::result(done));
                return Ok(());
            }
            _ => return Ok(()),
        };
        let timer_armed = flow.timer_armed();

        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    flow.abandon();
                    println!("Input closed, exam abandoned.");
                    return Ok(());
                };
                if !handle_command(&mut flow, line.trim()).await {
                    return Ok(());
                }
            }
            _ = tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)), if timer_armed => {
                println!("Time is up, submitting your answers...");
                if let Err(e) = flow.tick(Instant::now()).await {
                    report(&e);
                    if matches!(e, FlowError::Api(ApiError::Unauthorized(_))) {
                        return Err(flow_failure(flow, e));
                    }
                    if e.already_recorded() {
                        stop_recorded(&mut flow);
                        return Ok(());
                    }
                    // The timer is now disarmed; only the learner retries.
                    println!("Type `submit` to retry or `quit` to give up.");
                }
            }
        }
    }
}

/// Leaves the attempt after the server reported it as already stored.
fn stop_recorded(flow: &mut ExamFlow<HttpExamApi>) {
    flow.abandon();
    println!("This attempt was already recorded. Run `exam-client results` to see your score.");
}

/// Applies one line of learner input. Returns false when the learner quits.
async fn handle_command(flow: &mut ExamFlow<HttpExamApi>, input: &str) -> bool {
    match input {
        "" | "l" | "list" => redraw(flow),
        "q" | "quit" => {
            flow.abandon();
            println!("Exam abandoned, nothing was recorded.");
            return false;
        }
        "s" | "submit" => {
            if let Err(e) = flow.submit().await {
                report(&e);
                if e.already_recorded() {
                    stop_recorded(flow);
                    return false;
                }
                println!("Your answers are kept; type `submit` to retry.");
            }
        }
        other => match parse_answer(other) {
            Some((position, option)) => {
                let question_id = match flow.state() {
                    FlowState::Answering(sheet) => sheet.questions.get(position.wrapping_sub(1)).map(|q| q.id),
                    _ => None,
                };
                match question_id {
                    Some(id) => match flow.answer(id, option, Instant::now()) {
                        Ok(()) => redraw(flow),
                        Err(e) => report(&e),
                    },
                    None => println!("No question number {}", position),
                }
            }
            None => println!("Unrecognised input {:?}", other),
        },
    }
    true
}

fn parse_answer(input: &str) -> Option<(usize, i32)> {
    let mut parts = input.split_whitespace();
    let position = parts.next()?.parse().ok()?;
    let option = parts.next()?.parse().ok()?;
    parts.next().is_none().then_some((position, option))
}

fn redraw(flow: &ExamFlow<HttpExamApi>) {
    if let FlowState::Answering(sheet) = flow.state() {
        print!("{}", render::answer_sheet(sheet, Instant::now()));
    }
}

fn report(err: &FlowError) {
    eprintln!("error: {}", err);
}

/// Ends the stored session on 401 and turns the error into the exit error.
fn flow_failure(flow: ExamFlow<HttpExamApi>, err: FlowError) -> Box<dyn Error> {
    if matches!(err, FlowError::Api(ApiError::Unauthorized(_))) {
        let mut session = flow.api().session().clone();
        if let Err(e) = session.end() {
            tracing::warn!("Could not clear session: {}", e);
        }
        return "session expired, please log in again".into();
    }
    Box::new(err)
}
