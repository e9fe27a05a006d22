//! Command-line argument handling.

use anyhow::{bail, Result};

pub const USAGE: &str = "\
Usage: campushub <command> [args]

Commands:
  login [email]                  Sign in (prompts for anything missing)
  register [email] [full name]   Create an account and sign in
  logout                         Forget the stored session
  whoami                         Print the current session as JSON
  status                         Show whether a session is active and when it expires
  verify                         Ask the server whether the session is still valid
  help                           Show this message

Environment:
  CAMPUSHUB_API_URL    API base URL (overrides config)
  CAMPUSHUB_STORAGE    Token storage: file | keyring
  CAMPUSHUB_PASSWORD   Password to use instead of prompting
  CAMPUSHUB_LOG_DIR    Also write logs to this directory
  RUST_LOG             Log filter (default: warn)";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Login { email: Option<String> },
    Register {
        email: Option<String>,
        full_name: Option<String>,
    },
    Logout,
    Whoami,
    Status,
    Verify,
    Help,
}

impl Command {
    pub fn parse(args: &[String]) -> Result<Self> {
        let Some((command, rest)) = args.split_first() else {
            return Ok(Command::Help);
        };

        let command = match command.as_str() {
            "login" => {
                if rest.len() > 1 {
                    bail!("login takes at most one argument");
                }
                Command::Login {
                    email: rest.first().cloned(),
                }
            }
            "register" => {
                let full_name = rest.get(1..).map(|name| name.join(" "));
                Command::Register {
                    email: rest.first().cloned(),
                    full_name: full_name.filter(|n| !n.is_empty()),
                }
            }
            "logout" => Command::Logout,
            "whoami" => Command::Whoami,
            "status" => Command::Status,
            "verify" => Command::Verify,
            "help" | "-h" | "--help" => Command::Help,
            other => bail!("Unknown command: {}", other),
        };

        if !matches!(command, Command::Login { .. } | Command::Register { .. }) && !rest.is_empty() {
            bail!("{} takes no arguments", args[0]);
        }

        Ok(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_simple_commands() {
        assert_eq!(Command::parse(&args(&[])).unwrap(), Command::Help);
        assert_eq!(Command::parse(&args(&["logout"])).unwrap(), Command::Logout);
        assert_eq!(Command::parse(&args(&["whoami"])).unwrap(), Command::Whoami);
        assert_eq!(Command::parse(&args(&["status"])).unwrap(), Command::Status);
        assert_eq!(Command::parse(&args(&["verify"])).unwrap(), Command::Verify);
        assert_eq!(Command::parse(&args(&["--help"])).unwrap(), Command::Help);
    }

    #[test]
    fn test_parse_login() {
        assert_eq!(
            Command::parse(&args(&["login"])).unwrap(),
            Command::Login { email: None }
        );
        assert_eq!(
            Command::parse(&args(&["login", "ada@uni.edu"])).unwrap(),
            Command::Login {
                email: Some("ada@uni.edu".to_string())
            }
        );
        assert!(Command::parse(&args(&["login", "a", "b"])).is_err());
    }

    #[test]
    fn test_parse_register_joins_full_name() {
        assert_eq!(
            Command::parse(&args(&["register", "ada@uni.edu", "Ada", "King", "Lovelace"])).unwrap(),
            Command::Register {
                email: Some("ada@uni.edu".to_string()),
                full_name: Some("Ada King Lovelace".to_string()),
            }
        );
        assert_eq!(
            Command::parse(&args(&["register", "ada@uni.edu"])).unwrap(),
            Command::Register {
                email: Some("ada@uni.edu".to_string()),
                full_name: None,
            }
        );
        assert_eq!(
            Command::parse(&args(&["register"])).unwrap(),
            Command::Register {
                email: None,
                full_name: None,
            }
        );
    }

    #[test]
    fn test_parse_rejects_unknown_and_extra_args() {
        assert!(Command::parse(&args(&["signin"])).is_err());
        assert!(Command::parse(&args(&["logout", "now"])).is_err());
    }
}
