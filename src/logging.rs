use std::{
    fmt,
    fs::OpenOptions,
    io::Write,
    path::PathBuf,
    sync::{Mutex, OnceLock},
};

struct LogSink {
    path: PathBuf,
    file: Option<std::fs::File>,
}

static LOG_SINK: OnceLock<Mutex<LogSink>> = OnceLock::new();

fn sink() -> &'static Mutex<LogSink> {
    LOG_SINK.get_or_init(|| {
        Mutex::new(LogSink {
            path: PathBuf::from("logs.txt"),
            file: None,
        })
    })
}

/// Redirects subsequent `log!` output; the file is opened lazily on the next line.
pub fn set_log_path(path: impl Into<PathBuf>) {
    let Ok(mut guard) = sink().lock() else {
        return;
    };
    guard.path = path.into();
    guard.file = None;
}

fn with_log_file(mut f: impl FnMut(&mut std::fs::File)) {
    let Ok(mut guard) = sink().lock() else {
        return;
    };

    if guard.file.is_none() {
        let path = guard.path.clone();
        guard.file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .ok();
    }

    if let Some(file) = guard.file.as_mut() {
        f(file);
    }
}

pub fn log_fmt(args: fmt::Arguments) {
    with_log_file(|file| {
        let _ = file.write_fmt(args);
        let _ = file.write_all(b"\n");
        let _ = file.flush();
    });
}

pub fn log_newline() {
    with_log_file(|file| {
        let _ = file.write_all(b"\n");
        let _ = file.flush();
    });
}

/// Like `println!`, but writes to `logs.txt` (or the path given to `set_log_path`).
#[macro_export]
macro_rules! log {
    () => {
        {
            $crate::logging::log_newline()
        }
    };
    ($($arg:tt)*) => {
        {
            $crate::logging::log_fmt(format_args!($($arg)*))
        }
    };
}
