//! Process-wide interpreter settings, read once from environment variables.

use std::{cmp, str::FromStr, sync::LazyLock};

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// 0 is silent; 5 logs assembly, 10 control transfers, 25 every instruction.
    pub verbosity: u8,
    /// How many values from the top of the stack are shown in log lines.
    pub log_stack_top: usize,
}

impl Config {
    #[inline]
    pub fn verbosity(&self) -> u8 {
        if cfg!(debug_assertions) {
            self.verbosity
        } else {
            cmp::min(16, self.verbosity)
        }
    }

    #[inline]
    pub fn should_log(&self, level: u8) -> bool {
        self.verbosity() >= level
    }
}

fn parse_env_opt<T>(key: &str) -> Option<T>
where
    T: FromStr, <T as FromStr>::Err: std::fmt::Display
{
    let val = std::env::var(key).ok()?;
    if val.is_empty() {
        return None;
    }
    match val.parse::<T>() {
        Ok(v) => Some(v),
        Err(err) => {
            eprintln!("Ignoring env var {key} with value {val}: {err}");
            None
        }
    }
}

fn parse_env<T>(key: &str, default: T) -> T
where
    T: FromStr, <T as FromStr>::Err: std::fmt::Display
{
    parse_env_opt(key).unwrap_or(default)
}

fn create_config() -> Config {
    Config {
        verbosity: parse_env("WHITESPACE_VERBOSITY", if cfg!(debug_assertions) { 1 } else { 0 }),
        log_stack_top: parse_env("WHITESPACE_LOG_STACK_TOP", 3),
    }
}

static CELL: LazyLock<Config> = LazyLock::new(create_config);

pub fn get_config() -> &'static Config {
    &CELL
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_log() {
        let conf = Config { verbosity: 10, log_stack_top: 3 };
        assert!(conf.should_log(0));
        assert!(conf.should_log(10));
        assert!(!conf.should_log(11));
        assert!(!Config { verbosity: 0, log_stack_top: 3 }.should_log(1));
    }

    #[test]
    fn test_parse_env() {
        assert_eq!(parse_env::<u8>("WHITESPACE_TEST_UNSET_VARIABLE", 7), 7);

        std::env::set_var("WHITESPACE_TEST_MALFORMED_VARIABLE", "loud");
        assert_eq!(parse_env::<u8>("WHITESPACE_TEST_MALFORMED_VARIABLE", 7), 7);
        std::env::set_var("WHITESPACE_TEST_MALFORMED_VARIABLE", "300");
        assert_eq!(parse_env::<u8>("WHITESPACE_TEST_MALFORMED_VARIABLE", 7), 7);
        std::env::set_var("WHITESPACE_TEST_MALFORMED_VARIABLE", "12");
        assert_eq!(parse_env::<u8>("WHITESPACE_TEST_MALFORMED_VARIABLE", 7), 12);
        std::env::set_var("WHITESPACE_TEST_MALFORMED_VARIABLE", "");
        assert_eq!(parse_env::<u8>("WHITESPACE_TEST_MALFORMED_VARIABLE", 7), 7);
    }
}
