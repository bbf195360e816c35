use {
    log::info,
    std::{env, str::FromStr, time::SystemTime},
};

/// Installs the global fern dispatcher, honoring `RUST_LOG`.
pub fn init() -> Result<(), fern::InitError> {
    let level = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let level = log::Level::from_str(&level).unwrap_or_else(|_| {
        eprintln!("Invalid RUST_LOG value: {level}, defaulting to info");
        log::Level::Info
    });
    init_with_level(level.to_level_filter())
}

pub fn init_with_level(level: log::LevelFilter) -> Result<(), fern::InitError> {
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                humantime::format_rfc3339_seconds(SystemTime::now()),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stdout())
        .apply()?;

    info!("Logging setup complete");
    Ok(())
}

/// Per-level silencing, used by tooling that owns its own output (the import
/// tool silences Info while listing to keep stdout machine readable).
#[derive(Clone, Copy, Debug, Default)]
pub struct LogFilter {
    silenced: [bool; 5],
}

impl LogFilter {
    pub fn silence(mut self, level: log::Level) -> Self {
        self.silenced[level as usize - 1] = true;
        self
    }

    pub fn allows(&self, level: log::Level) -> bool { !self.silenced[level as usize - 1] }

    pub fn log(&self, level: log::Level, target: &str, args: std::fmt::Arguments<'_>) {
        if self.allows(level) {
            log::log!(target: target, level, "{args}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_silences_single_levels() {
        let filter = LogFilter::default().silence(log::Level::Info);
        assert!(!filter.allows(log::Level::Info));
        assert!(filter.allows(log::Level::Warn));
        assert!(filter.allows(log::Level::Error));
    }
}
