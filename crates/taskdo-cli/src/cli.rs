use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "taskdo")]
#[command(about = "Task To Do - manage your projects from the terminal")]
#[command(version)]
#[command(propagate_version = true)]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: Commands,

    /// API base URL (overrides TASKDO_BASE_URL and the config file)
    #[arg(long, global = true)]
    pub(crate) base_url: Option<String>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    pub(crate) json: bool,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Commands {
    /// Log in and store the session token
    Login {
        /// Username (defaults to TASKDO_USERNAME or the last one used)
        #[arg(long, short)]
        username: Option<String>,
    },

    /// Forget the stored session token
    Logout,

    /// Show the logged-in user's profile
    Whoami,

    /// Show whether a session is active
    Status,

    /// Project operations
    Project {
        #[command(subcommand)]
        action: ProjectCommands,
    },
}

#[derive(Subcommand, Debug)]
pub(crate) enum ProjectCommands {
    /// List projects
    List {
        /// Follow pagination and list every project
        #[arg(long)]
        all: bool,
    },
    /// Show one or more projects
    Get {
        /// Project IDs
        #[arg(required = true)]
        ids: Vec<i64>,
    },
    /// Create a project
    Create {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// Delete a project you own
    Delete {
        /// Project ID
        id: i64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_project_get_many() {
        let cli = Cli::try_parse_from(["taskdo", "project", "get", "1", "2", "3"]).unwrap();
        match cli.command {
            Commands::Project {
                action: ProjectCommands::Get { ids },
            } => assert_eq!(ids, vec![1, 2, 3]),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_project_get_requires_id() {
        assert!(Cli::try_parse_from(["taskdo", "project", "get"]).is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "taskdo",
            "project",
            "list",
            "--all",
            "--json",
            "--base-url",
            "http://localhost:8000",
        ])
        .unwrap();
        assert!(cli.json);
        assert_eq!(cli.base_url.as_deref(), Some("http://localhost:8000"));
        assert!(matches!(
            cli.command,
            Commands::Project {
                action: ProjectCommands::List { all: true }
            }
        ));
    }

    #[test]
    fn test_create_description_defaults_empty() {
        let cli = Cli::try_parse_from(["taskdo", "project", "create", "--name", "Launch"]).unwrap();
        match cli.command {
            Commands::Project {
                action: ProjectCommands::Create { name, description },
            } => {
                assert_eq!(name, "Launch");
                assert_eq!(description, "");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_login_username_flag() {
        let cli = Cli::try_parse_from(["taskdo", "login", "-u", "jdoe"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Login { username: Some(ref u) } if u == "jdoe"
        ));
    }
}
