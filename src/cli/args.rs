//! Command-line arguments of `oplog-tail`.

use std::path::PathBuf;

use clap::Parser;

use crate::consumer::{ConsumerOptions, Filter};

/// Print the operations streamed by an oplog.
///
/// A state file can be provided to simulate a full replication while
/// maintaining the current position.
#[derive(Debug, Parser)]
#[command(name = "oplog-tail")]
#[command(version, about, long_about = None)]
pub struct TailArgs {
    /// Password to access the oplog
    #[arg(long, env = "OPLOG_PASSWORD", default_value = "", hide_env_values = true)]
    pub password: String,

    /// Path to the state file storing the oplog position (default: no store)
    #[arg(long)]
    pub state_file: Option<PathBuf>,

    /// Comma separated list of types to filter on
    #[arg(long, default_value = "")]
    pub types: String,

    /// Comma separated list of parents type/id to filter on
    #[arg(long, default_value = "")]
    pub parents: String,

    /// Try to do a full replication (ignored without --state-file)
    #[arg(long)]
    pub allow_replication: bool,

    /// Oplog URL
    pub url: String,
}

impl TailArgs {
    /// Server side filter from `--types` and `--parents`.
    pub fn filter(&self) -> Filter {
        Filter::default()
            .with_types(split_list(&self.types))
            .with_parents(split_list(&self.parents))
    }

    /// Consumer configuration from the arguments.
    pub fn options(&self) -> ConsumerOptions {
        let mut options = ConsumerOptions::default()
            .with_password(self.password.as_str())
            .with_allow_replication(self.allow_replication)
            .with_filter(self.filter());
        if let Some(path) = &self.state_file {
            options = options.with_state_file(path);
        }
        options
    }
}

fn split_list(list: &str) -> Vec<String> {
    list.split(',').map(|item| item.trim().to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> TailArgs {
        TailArgs::try_parse_from(std::iter::once("oplog-tail").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_url_is_required() {
        assert!(TailArgs::try_parse_from(["oplog-tail"]).is_err());
    }

    #[test]
    fn test_defaults() {
        let args = parse(&["http://oplog/"]);
        assert_eq!(args.url, "http://oplog/");
        assert!(args.state_file.is_none());
        assert!(!args.allow_replication);

        let options = args.options();
        assert!(options.state_file.is_none());
        assert_eq!(options.filter.query(), "");
    }

    #[test]
    fn test_all_flags() {
        let args = parse(&[
            "--password",
            "secret",
            "--state-file",
            "/tmp/oplog.state",
            "--types",
            "video,user",
            "--parents",
            "user/u1",
            "--allow-replication",
            "http://oplog/",
        ]);

        let options = args.options();
        assert_eq!(options.password.as_deref(), Some("secret"));
        assert_eq!(options.state_file, Some(PathBuf::from("/tmp/oplog.state")));
        assert!(options.allow_replication);
        assert_eq!(options.filter.query(), "parents=user%2Fu1&types=video,user");
    }

    #[test]
    fn test_split_list() {
        assert_eq!(split_list(""), vec![""]);
        assert_eq!(split_list("a, b"), vec!["a", "b"]);
    }
}
