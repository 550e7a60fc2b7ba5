//! Command line front end: `ot-scrub SRC [DST [INDEX]]`
//!
//! Reads SRC, sanitizes it (optionally selecting collection member INDEX),
//! and writes the result to DST when given. Exits non-zero when the font is
//! rejected.

use std::process::ExitCode;

fn usage() -> ExitCode {
    eprintln!("usage: ot-scrub SRC [DST [INDEX]]");
    ExitCode::from(2)
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();

    if args.iter().any(|arg| arg == "--version") {
        println!("ot-scrub {}", fontscrub::VERSION);
        return ExitCode::SUCCESS;
    }

    let (src, dst, index) = match args.as_slice() {
        [src] => (src, None, 0),
        [src, dst] => (src, Some(dst), 0),
        [src, dst, index] => match index.parse::<usize>() {
            Ok(index) => (src, Some(dst), index),
            Err(_) => return usage(),
        },
        _ => return usage(),
    };

    let data = match std::fs::read(src) {
        Ok(data) => data,
        Err(err) => {
            eprintln!("ot-scrub: {}: {}", src, err);
            return ExitCode::FAILURE;
        }
    };

    match fontscrub::sanitize_index(&data, index) {
        Ok(clean) => {
            if let Some(dst) = dst {
                if let Err(err) = std::fs::write(dst, clean) {
                    eprintln!("ot-scrub: {}: {}", dst, err);
                    return ExitCode::FAILURE;
                }
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("ot-scrub: {}: {}", src, err);
            ExitCode::FAILURE
        }
    }
}
