use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "sshkeys", version, about = "Work with SSH keys easily!")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Config file to use instead of the per-user one.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory to search for private keys (default: ~/.ssh).
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// ssh-agent socket (default: $SSH_AUTH_SOCK).
    #[arg(long, global = true)]
    pub socket: Option<PathBuf>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Print the keys found on disk and whether the agent holds them.
    List,
    Config {
        #[arg(long)]
        init: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn no_command_means_interactive() {
        let cli = Cli::try_parse_from(["sshkeys"]).unwrap();
        assert!(cli.command.is_none());
        assert!(cli.root.is_none());
    }

    #[test]
    fn overrides_after_subcommand() {
        let cli =
            Cli::try_parse_from(["sshkeys", "list", "--root", "/tmp/keys", "--socket", "/tmp/a.sock"])
                .unwrap();
        assert_eq!(cli.command, Some(Command::List));
        assert_eq!(cli.root, Some(PathBuf::from("/tmp/keys")));
        assert_eq!(cli.socket, Some(PathBuf::from("/tmp/a.sock")));
    }

    #[test]
    fn config_init_flag() {
        let cli = Cli::try_parse_from(["sshkeys", "config", "--init"]).unwrap();
        assert_eq!(cli.command, Some(Command::Config { init: true }));
    }
}
