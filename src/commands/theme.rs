//! The `expenses theme` command.

use crate::args::ThemeAction;
use crate::commands::Out;
use crate::context::{AppContext, Theme};
use crate::error::{ErrorType, IntoResult};
use crate::Result;

/// Shows or changes the theme. `system` is the theme the terminal suggests; it is used by
/// `ThemeAction::System` and whenever there is no saved choice.
pub async fn theme(
    ctx: &mut AppContext,
    action: ThemeAction,
    system: Theme,
) -> Result<Out<Theme>> {
    let state = ctx.theme_mut();
    let message = match action {
        ThemeAction::Show => {
            let source = if state.has_preference() {
                "saved"
            } else {
                "from the terminal"
            };
            format!("The theme is {} ({source})", state.mode())
        }
        ThemeAction::Toggle => {
            let next = state.toggle().await.pub_result(ErrorType::Io)?;
            format!("Switched to the {next} theme")
        }
        ThemeAction::Light | ThemeAction::Dark => {
            let chosen = action.theme().unwrap_or_default();
            state.set(chosen).await.pub_result(ErrorType::Io)?;
            format!("Switched to the {chosen} theme")
        }
        ThemeAction::System => {
            state.follow_system(system).await.pub_result(ErrorType::Io)?;
            format!("Following the terminal, which suggests the {system} theme")
        }
    };
    Ok(Out::new(message, state.mode()))
}
