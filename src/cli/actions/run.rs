use crate::cli::actions::{boot, Action};
use anyhow::Result;

/// Execute the provided action.
/// # Errors
/// Returns an error if the action fails.
pub async fn execute(action: Action) -> Result<()> {
    match action {
        Action::Boot(args) => boot::execute(args).await,
    }
}
