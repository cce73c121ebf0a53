use clap::Subcommand;

use thosejobs_core::domain::profile::Role;
use thosejobs_core::roles::RoleGuard;

use crate::commands::{run_action, CommandResult, GlobalArgs};

#[derive(Debug, Subcommand)]
pub enum RoleCommand {
    #[command(about = "Switch the acting profile between worker and provider")]
    Switch {
        #[arg(value_parser = parse_role)]
        role: Role,
    },
}

pub fn run(global: &GlobalArgs, command: RoleCommand) -> CommandResult {
    match command {
        RoleCommand::Switch { role } => run_action("role switch", global, |context, _| async move {
            RoleGuard::new(context).switch_role(role).await
        }),
    }
}

fn parse_role(raw: &str) -> Result<Role, String> {
    Role::parse(raw).ok_or_else(|| format!("`{raw}` is not one of worker, provider, admin"))
}
