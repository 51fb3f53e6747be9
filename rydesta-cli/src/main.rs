mod cli;
mod status;

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::rc::Rc;
use std::time::Instant;

use structopt::StructOpt;

use cli::{Command, Opt};
use rydesta::construct::Value;
use rydesta::Master;
use status::Status;

fn boot(filename: &Path, time: bool) -> Result<Master, i32> {
    let start = Instant::now();
    let mut master = Master::new(Rc::from(filename));
    master.kernel();
    if let Err(e) = master.load_init() {
        eprintln!("{}", e);
        return Err(1);
    }
    if time {
        Status::info().log(&format!("booted in {:?}", start.elapsed()));
    }
    Ok(master)
}

fn run_script(path: PathBuf, time: bool) -> i32 {
    let source = match std::fs::read_to_string(&path) {
        Ok(s) => s,
        Err(e) => {
            Status::fatal().log(&format!("could not read \"{}\": {}", path.display(), e));
            return 1;
        }
    };
    let mut master = match boot(&path, time) {
        Ok(m) => m,
        Err(code) => return code,
    };
    let start = Instant::now();
    match master.feed(&source) {
        Ok(_) => {
            if time {
                Status::info().log(&format!("evaluated in {:?}", start.elapsed()));
            }
            0
        }
        Err(e) => {
            eprintln!("{}", e);
            1
        }
    }
}

fn run_suite(time: bool) -> i32 {
    let mut entries: Vec<PathBuf> = match std::fs::read_dir("suite") {
        Ok(dir) => dir
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.extension().map(|e| e == "ry").unwrap_or(false)
                    && p.file_name()
                        .and_then(|n| n.to_str())
                        .and_then(|n| n.chars().next())
                        .map(|c| c.is_ascii_digit())
                        .unwrap_or(false)
            })
            .collect(),
        Err(e) => {
            Status::fatal().log(&format!("could not read \"suite\": {}", e));
            return 1;
        }
    };
    entries.sort();

    let mut failures = 0;
    for path in entries {
        Status::info().log(&format!("running {}", path.display()));
        if run_script(path, time) != 0 {
            failures += 1;
        }
    }
    if failures == 0 {
        Status::success().log("suite passed");
        0
    } else {
        Status::fatal().log(&format!("{} suite file(s) failed", failures));
        1
    }
}

fn run_repl(time: bool) -> i32 {
    let filename = PathBuf::from("<repl>");
    let mut master = match boot(&filename, time) {
        Ok(m) => m,
        Err(code) => return code,
    };
    let stdin = io::stdin();
    loop {
        print!("> ");
        if io::stdout().flush().is_err() {
            return 0;
        }
        let mut line = String::new();
        let read = stdin.read_line(&mut line);
        match read {
            Ok(0) => return 0,
            Ok(_) => {}
            Err(_) => return 1,
        }
        let start = Instant::now();
        match master.feed(&line) {
            Ok(Some(v)) if !matches!(v, Value::Nothing) => println!("-> {}", v),
            Ok(_) => {}
            Err(e) => eprintln!("{}", e),
        }
        if time {
            Status::info().log(&format!("evaluated in {:?}", start.elapsed()));
        }
    }
}

fn main() {
    let opt = Opt::from_args();
    let code = match opt.command {
        Some(Command::Suite { time }) => run_suite(time || opt.time),
        None => match opt.script {
            Some(script) => run_script(script, opt.time),
            None => run_repl(opt.time),
        },
    };
    process::exit(code);
}
