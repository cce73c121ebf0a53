use clap::Subcommand;

use thosejobs_core::profiles::ProfileService;

use crate::commands::{run_action, CommandResult, GlobalArgs};

#[derive(Debug, Subcommand)]
pub enum ProfileCommand {
    #[command(about = "Show the acting profile")]
    Show,
    #[command(about = "Change the acting profile's username")]
    Rename { username: String },
}

pub fn run(global: &GlobalArgs, command: ProfileCommand) -> CommandResult {
    match command {
        ProfileCommand::Show => run_action("profile show", global, |context, _| async move {
            ProfileService::new(context).current().await
        }),
        ProfileCommand::Rename { username } => {
            run_action("profile rename", global, |context, _| async move {
                ProfileService::new(context).rename(&username).await
            })
        }
    }
}
