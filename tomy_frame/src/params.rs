//! Command-line and configuration parameter access
//!
//! Units of work read their settings through [`ParamSource`] rather than a
//! concrete parser, so tests can hand them any source they like.

use tomy::config::FrameConfig;

/// Read-only access to process arguments and named parameters.
pub trait ParamSource: Send + Sync {
    /// Value of a named parameter from the configuration file
    fn param(&self, name: &str) -> Option<String>;

    /// Value of a single-letter option.
    ///
    /// `-c value` and `-cvalue` both yield `value`; a bare `-c` yields an
    /// empty string. `None` if the option is absent.
    fn argv(&self, option: char) -> Option<String>;

    /// Raw command line, program name first
    fn args(&self) -> &[String];

    /// Number of command line words, program name included
    fn argc(&self) -> usize {
        self.args().len()
    }
}

/// [`ParamSource`] backed by a command line and a loaded [`FrameConfig`].
#[derive(Debug, Clone)]
pub struct ProcessArgs {
    args: Vec<String>,
    config: FrameConfig,
}

impl ProcessArgs {
    /// Explicit command line and configuration
    pub fn new<I, S>(args: I, config: FrameConfig) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            config,
        }
    }

    /// Command line of the running process
    pub fn from_env(config: FrameConfig) -> Self {
        Self::new(std::env::args(), config)
    }

    /// Configuration the parameters come from
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl ParamSource for ProcessArgs {
    fn param(&self, name: &str) -> Option<String> {
        self.config.param(name).map(str::to_owned)
    }

    fn argv(&self, option: char) -> Option<String> {
        let flag = format!("-{option}");
        let mut words = self.args.iter().skip(1).peekable();

        while let Some(word) = words.next() {
            if *word == flag {
                return match words.peek() {
                    Some(next) if !next.starts_with('-') => Some((*next).clone()),
                    _ => Some(String::new()),
                };
            }
            if let Some(value) = word.strip_prefix(&flag) {
                if !word.starts_with("--") {
                    return Some(value.to_owned());
                }
            }
        }
        None
    }

    fn args(&self) -> &[String] {
        &self.args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(args: &[&str]) -> ProcessArgs {
        let mut config = FrameConfig::new("gateway");
        config.params.insert("BrokerName".into(), "localhost".into());
        ProcessArgs::new(args.iter().copied(), config)
    }

    #[test]
    fn test_param_lookup() {
        let args = source(&["gateway"]);
        assert_eq!(args.param("BrokerName").as_deref(), Some("localhost"));
        assert_eq!(args.param("Missing"), None);
    }

    #[test]
    fn test_argv_separate_value() {
        let args = source(&["gateway", "-c", "/etc/param.conf", "-v"]);
        assert_eq!(args.argv('c').as_deref(), Some("/etc/param.conf"));
        assert_eq!(args.argc(), 4);
    }

    #[test]
    fn test_argv_attached_value() {
        let args = source(&["gateway", "-p8883"]);
        assert_eq!(args.argv('p').as_deref(), Some("8883"));
    }

    #[test]
    fn test_argv_bare_flag() {
        let args = source(&["gateway", "-d", "-v"]);
        assert_eq!(args.argv('d').as_deref(), Some(""));
        assert_eq!(args.argv('v').as_deref(), Some(""));
    }

    #[test]
    fn test_argv_missing_and_program_name_ignored() {
        let args = source(&["-x", "--xtra"]);
        assert_eq!(args.argv('x'), None);
        assert_eq!(args.argv('q'), None);
    }
}
