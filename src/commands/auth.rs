//! Account command handlers.
//!
//! - `expenses signup` creates an account
//! - `expenses login` exchanges credentials for a session token and saves it
//! - `expenses logout` forgets the saved token

use crate::api::ExpenseApi;
use crate::commands::Out;
use crate::context::AppContext;
use crate::error::{Error, ErrorType};
use crate::model::{LoginForm, SignupForm};
use crate::Result;
use tracing::debug;

const SIGNUP_FAILED: &str = "Something went wrong";
const LOGIN_FAILED: &str = "Login failed";

/// Registers a new account. The user still has to log in afterwards.
pub async fn signup(ctx: &AppContext, form: SignupForm) -> Result<Out<()>> {
    form.validate()?;
    ctx.api()?
        .signup(&form)
        .await
        .map_err(|e| e.into_error(SIGNUP_FAILED))?;
    Ok("Signup successful, now login!".into())
}

/// Logs in and saves the session token for later commands.
pub async fn login(ctx: &mut AppContext, form: LoginForm) -> Result<Out<()>> {
    form.validate()?;
    let session = ctx
        .api()?
        .login(&form)
        .await
        .map_err(|e| e.into_error(LOGIN_FAILED))?;
    ctx.log_in(session).await?;
    debug!("Saved session to {}", ctx.config().session_path().display());
    Ok(format!("Logged in as {}", form.email).into())
}

/// Forgets the saved session token.
pub async fn logout(ctx: &mut AppContext) -> Result<Out<()>> {
    if ctx.log_out().await? {
        Ok("Logged out".into())
    } else {
        Ok("You were not logged in".into())
    }
}

/// The API client for commands that need a logged-in user.
pub(super) fn session_api(ctx: &AppContext) -> Result<Box<dyn ExpenseApi>> {
    if ctx.session().is_none() {
        return Err(Error::new(
            ErrorType::Config,
            anyhow::anyhow!("You are not logged in, run 'expenses login' first"),
        ));
    }
    ctx.api()
}
