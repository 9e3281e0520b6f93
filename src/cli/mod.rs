pub mod session;

pub use session::Session;

use anyhow::Result;
use clap::Subcommand;
use std::path::Path;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create and start the group, firing Starting and Running hooks
    Up,
    /// Fire Removing hooks on the running group and tear it down
    Down,
    /// Bring the group up, run a host command, then tear the group down
    Run {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        command: Vec<String>,
    },
    /// Validate the hooks file and print the hook plan
    Check,
}

pub fn run(command: Command, config_path: &Path) -> Result<()> {
    let mut session = Session::load(config_path)?;

    match command {
        Command::Up => {
            session.up()?;
            println!("Group is up ({} containers)", session.service().containers().len());
            Ok(())
        }
        Command::Down => {
            session.down()?;
            println!("Group removed");
            Ok(())
        }
        Command::Run { command } => session.run(&command),
        Command::Check => {
            print!("{}", session.plan());
            Ok(())
        }
    }
}
