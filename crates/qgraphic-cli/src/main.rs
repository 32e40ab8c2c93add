use std::{env, path::Path, process::ExitCode};

use qgraphic::{FilePublish, Runner};

const USAGE: &str = "usage: qgraphic exec <file.qgk>";

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();
    match args.get(1).map(String::as_str) {
        Some("exec") => {
            let Some(path) = args.get(2) else {
                eprintln!("{USAGE}");
                return ExitCode::FAILURE;
            };
            exec(Path::new(path))
        }
        Some("gui") => {
            eprintln!("the gui command is provided by the graphical editor, not this binary");
            ExitCode::FAILURE
        }
        _ => {
            eprintln!("{USAGE}");
            ExitCode::FAILURE
        }
    }
}

fn exec(path: &Path) -> ExitCode {
    let runner = match Runner::from_file(path) {
        Ok(runner) => runner,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };
    match runner.run(&mut FilePublish::new()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
