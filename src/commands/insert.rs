//! Add command handler.

use crate::commands::auth::session_api;
use crate::commands::Out;
use crate::context::AppContext;
use crate::model::{Expense, ExpenseForm};
use crate::store::ExpenseStore;
use crate::Result;

/// Validates `form` and creates the expense remotely.
///
/// The amount text is converted to a number before anything is sent. A blank field or an
/// amount that is not a number is rejected without a remote call.
///
/// # Returns
///
/// On success, returns an `Out` containing the created expense with its server-assigned id and
/// date.
pub async fn add(ctx: &AppContext, form: ExpenseForm) -> Result<Out<Expense>> {
    let api = session_api(ctx)?;
    let mut store = ExpenseStore::default();
    let created = store.create(api.as_ref(), &form).await?.into_result()?;
    let message = format!(
        "Added {} ({}, {}) with id {}",
        created.title(),
        created.amount(),
        created.category(),
        created.id()
    );
    Ok(Out::new(message, created))
}
