//!
//! databotics CLI
//! --------------
//! Terminal client for the databotics data-quality backend. Interactive
//! interpreter (and one-shot mode) covering the full workflow: login,
//! dataset upload, profiling, rule validation, SQL query, cleaning, anomaly
//! analysis and natural-language-to-SQL.

use std::env;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};

use databotics::api::{AnalyzeRequest, CleanOptions};
use databotics::cli;
use databotics::credentials::FileCredentialStore;
use databotics::gateway::Gateway;
use databotics::paths;
use databotics::persist::FileStateStore;
use databotics::routes::Route;
use databotics::state::WorkflowState;
use databotics::workbench::Workbench;

fn print_usage(program: &str) {
    eprintln!(
        "Usage:\n  {program} [--api-url <url>] [--state-dir <dir>] [--user <u> --password <p>] [--command \"<cmd>\"]\n\nFlags:\n  --api-url <url>      Backend base URL (default: $DATABOTICS_API_URL or http://localhost:8000)\n  --state-dir <dir>    State root for the persisted token/session/profile (default: $DATABOTICS_STATE_DIR or ~/.databotics)\n  --user <u>           Username for auto-login on startup\n  --password <p>       Password for auto-login on startup\n  -c, --command <cmd>  Run a single interpreter command and exit\n  -h, --help           Show this help\n\nInterpreter commands:\n  login <user> <password>        authenticate and persist the token\n  register <user> <password>     create an account and authenticate\n  logout                         drop the credential\n  upload <path>                  upload a CSV/XLSX file, establish a session and profile it\n  profile                        show the dataset profile\n  validate [rules_path]          run rule validation against the uploaded file\n  query <sql>                    run SQL against the uploaded file\n  clean [--trim] [--dedupe] [--case lower|upper] [--out <path>]\n                                 fetch a cleaned copy of the uploaded file\n  analyze <ts_col> <metric_col> [--method <m>] [--dims a,b,...]\n                                 run anomaly analysis on the uploaded file\n  sql <question>                 generate SQL from a natural-language question\n  status                         show connection, auth and workflow state\n  help                           show this help\n  quit | exit                    leave the interpreter\n\nExamples:\n  {program} --user admin --password databotics --command \"upload data/orders.csv\"\n  {program} --api-url http://10.0.0.5:8000\n    > login admin databotics\n    > upload orders.csv\n    > query SELECT region, SUM(amount) FROM df GROUP BY region"
    );
}

fn main() -> Result<()> {
    println!("databotics workbench");

    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .try_init();

    let mut args: Vec<String> = env::args().collect();
    let program = args.remove(0);

    let mut api_url: Option<String> = None;
    let mut state_dir: Option<String> = None;
    let mut user: Option<String> = None;
    let mut password: Option<String> = None;
    let mut command: Option<String> = None;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--api-url" => {
                if i + 1 >= args.len() { eprintln!("--api-url requires a value"); print_usage(&program); std::process::exit(2); }
                api_url = Some(args[i + 1].clone());
                i += 2; continue;
            }
            "--state-dir" => {
                if i + 1 >= args.len() { eprintln!("--state-dir requires a value"); print_usage(&program); std::process::exit(2); }
                state_dir = Some(args[i + 1].clone());
                i += 2; continue;
            }
            "--user" => {
                if i + 1 >= args.len() { eprintln!("--user requires a value"); print_usage(&program); std::process::exit(2); }
                user = Some(args[i + 1].clone());
                i += 2; continue;
            }
            "--password" => {
                if i + 1 >= args.len() { eprintln!("--password requires a value"); print_usage(&program); std::process::exit(2); }
                password = Some(args[i + 1].clone());
                i += 2; continue;
            }
            "--command" | "-c" => {
                if i + 1 >= args.len() { eprintln!("--command requires a value"); print_usage(&program); std::process::exit(2); }
                command = Some(args[i + 1].clone());
                i += 2; continue;
            }
            "-h" | "--help" => {
                print_usage(&program);
                return Ok(());
            }
            unk => {
                eprintln!("Unrecognized argument: {}", unk);
                print_usage(&program);
                std::process::exit(2);
            }
        }
    }

    let api_url = api_url.unwrap_or_else(paths::default_api_url);
    let state_root: PathBuf = state_dir.map(PathBuf::from).unwrap_or_else(paths::default_state_root);

    let credentials = Arc::new(
        FileCredentialStore::new(&state_root)
            .with_context(|| format!("failed to open state root {}", state_root.display()))?,
    );
    let store = Arc::new(FileStateStore::new(&state_root)?);
    let state = Arc::new(WorkflowState::new(store));
    let gateway = Arc::new(Gateway::new(&api_url, credentials.clone())?);
    let wb = Workbench::new(gateway, state, credentials);

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build Tokio runtime")?;

    // Hydrate persisted state before the first navigation decision.
    let initial = wb.start();
    println!("connected to {}", api_url);

    if let (Some(u), Some(p)) = (user.as_deref(), password.as_deref()) {
        match rt.block_on(wb.login(u, p)) {
            Ok(route) => println!("logged in as {}; screen: {}", u, route),
            Err(e) => eprintln!("login failed: {}", e),
        }
    } else if let Some(route) = initial {
        println!("screen: {}", route);
    }

    if let Some(line) = command {
        run_command(&rt, &wb, line.trim());
        return Ok(());
    }

    // REPL
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut input = String::new();
    println!("databotics interpreter. Type 'help' for commands.");
    loop {
        input.clear();
        print!("> ");
        let _ = stdout.flush();
        if stdin.read_line(&mut input).is_err() {
            break;
        }
        if input.is_empty() {
            break; // EOF
        }
        let line = input.trim();
        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
            break;
        }
        if line.eq_ignore_ascii_case("help") {
            print_usage(&program);
            continue;
        }
        run_command(&rt, &wb, line);
    }
    Ok(())
}

fn run_command(rt: &tokio::runtime::Runtime, wb: &Workbench, line: &str) {
    let mut parts = line.split_whitespace();
    let verb = match parts.next() {
        Some(v) => v.to_ascii_lowercase(),
        None => return,
    };
    let rest: Vec<&str> = parts.collect();

    match verb.as_str() {
        "login" => {
            if rest.len() != 2 { eprintln!("usage: login <user> <password>"); return; }
            match rt.block_on(wb.login(rest[0], rest[1])) {
                Ok(route) => println!("logged in; screen: {}", route),
                Err(e) => eprintln!("error: {}", e),
            }
        }
        "register" => {
            if rest.len() != 2 { eprintln!("usage: register <user> <password>"); return; }
            match rt.block_on(wb.register(rest[0], rest[1])) {
                Ok(route) => println!("registered and logged in; screen: {}", route),
                Err(e) => eprintln!("error: {}", e),
            }
        }
        "logout" => {
            wb.logout();
            println!("logged out");
        }
        "status" => {
            let screen = wb.current_route().map(|r| r.path().to_string()).unwrap_or_else(|| "(none)".to_string());
            println!("screen: {}", screen);
            println!("authenticated: {}", wb.is_authenticated());
            println!("session: {}", wb.state().session_id().unwrap_or_else(|| "(none)".to_string()));
            match wb.state().uploaded_file() {
                Some(f) => println!("file: {} ({} bytes)", f.filename, f.bytes.len()),
                None => println!("file: (none; upload required for validate/query/clean/analyze)"),
            }
            println!("profile: {}", if wb.state().profile().is_some() { "loaded" } else { "(none)" });
        }
        "upload" => {
            if rest.len() != 1 { eprintln!("usage: upload <path>"); return; }
            let path = rest[0];
            let bytes = match fs::read(path) {
                Ok(b) => b,
                Err(e) => { eprintln!("error: cannot read {}: {}", path, e); return; }
            };
            let filename = std::path::Path::new(path)
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| path.to_string());
            match rt.block_on(wb.upload(&filename, bytes)) {
                Ok(route) => {
                    println!("uploaded {}; screen: {}", filename, route);
                    if let Some(profile) = wb.state().profile() {
                        cli::print_profile(&profile);
                    }
                }
                Err(e) => eprintln!("error: {}", e),
            }
        }
        "profile" => match rt.block_on(wb.profile()) {
            Ok(profile) => cli::print_profile(&profile),
            Err(e) => eprintln!("error: {}", e),
        },
        "validate" => {
            let rules = rest.first().copied();
            match rt.block_on(wb.validate(rules)) {
                Ok(result) => cli::print_validation(&result),
                Err(e) => eprintln!("error: {}", e),
            }
        }
        "query" => {
            if rest.is_empty() { eprintln!("usage: query <sql>"); return; }
            let sql = line[verb.len()..].trim();
            match rt.block_on(wb.query(sql)) {
                Ok(result) => cli::print_query_result(&result),
                Err(e) => eprintln!("error: {}", e),
            }
        }
        "clean" => {
            let mut options = CleanOptions::default();
            let mut out: Option<String> = None;
            let mut j = 0;
            while j < rest.len() {
                match rest[j] {
                    "--trim" => { options.trim_strings = true; j += 1; }
                    "--dedupe" => { options.drop_duplicates = true; j += 1; }
                    "--case" => {
                        if j + 1 >= rest.len() { eprintln!("--case requires lower|upper"); return; }
                        options.normalize_case = Some(rest[j + 1].to_string());
                        j += 2;
                    }
                    "--out" => {
                        if j + 1 >= rest.len() { eprintln!("--out requires a path"); return; }
                        out = Some(rest[j + 1].to_string());
                        j += 2;
                    }
                    unk => { eprintln!("unknown clean flag: {}", unk); return; }
                }
            }
            let out = out.unwrap_or_else(|| {
                let name = wb
                    .state()
                    .uploaded_file()
                    .map(|f| f.filename)
                    .unwrap_or_else(|| "dataset".to_string());
                format!("cleaned_{}", name)
            });
            match rt.block_on(wb.clean(&options)) {
                Ok(bytes) => match fs::write(&out, &bytes) {
                    Ok(()) => println!("wrote {} bytes to {}", bytes.len(), out),
                    Err(e) => eprintln!("error: cannot write {}: {}", out, e),
                },
                Err(e) => eprintln!("error: {}", e),
            }
        }
        "analyze" => {
            if rest.len() < 2 {
                eprintln!("usage: analyze <timestamp_col> <metric_col> [--method <m>] [--dims a,b,...]");
                return;
            }
            let mut request = AnalyzeRequest {
                timestamp_col: rest[0].to_string(),
                metric_col: rest[1].to_string(),
                dimension_cols: Vec::new(),
                method: None,
            };
            let mut j = 2;
            while j < rest.len() {
                match rest[j] {
                    "--method" => {
                        if j + 1 >= rest.len() { eprintln!("--method requires a value"); return; }
                        request.method = Some(rest[j + 1].to_string());
                        j += 2;
                    }
                    "--dims" => {
                        if j + 1 >= rest.len() { eprintln!("--dims requires a value"); return; }
                        request.dimension_cols =
                            rest[j + 1].split(',').map(|s| s.trim().to_string()).collect();
                        j += 2;
                    }
                    unk => { eprintln!("unknown analyze flag: {}", unk); return; }
                }
            }
            match rt.block_on(wb.analyze(&request)) {
                Ok(result) => {
                    println!("{}", result.narrative);
                    println!("anomalies: {}", result.anomalies.len());
                    for (k, v) in &result.summary {
                        println!("  {}: {}", k, v);
                    }
                }
                Err(e) => eprintln!("error: {}", e),
            }
        }
        "sql" => {
            if rest.is_empty() { eprintln!("usage: sql <question>"); return; }
            let question = line[verb.len()..].trim();
            match rt.block_on(wb.generate_sql(question)) {
                Ok(result) => {
                    println!("{}", result.sql);
                    if !result.explanation.is_empty() {
                        println!("-- {}", result.explanation);
                    }
                    for (k, v) in &result.safety {
                        println!("-- safety {}: {}", k, v);
                    }
                }
                Err(e) => eprintln!("error: {}", e),
            }
        }
        _ => {
            eprintln!("unknown command: {} (try 'help')", verb);
        }
    }

    // A 401 during any of the above already cleared the credential and
    // moved the screen; make that visible at the prompt.
    if !wb.is_authenticated() && wb.current_route() == Some(Route::Login) && verb != "logout" {
        if matches!(verb.as_str(), "upload" | "profile" | "validate" | "query" | "clean" | "analyze" | "sql") {
            eprintln!("signed out; use 'login <user> <password>' to continue");
        }
    }
}
