//! Update command handler.

use crate::args::UpdateArgs;
use crate::commands::auth::session_api;
use crate::commands::Out;
use crate::context::AppContext;
use crate::error::{Error, ErrorType};
use crate::model::Expense;
use crate::store::ExpenseStore;
use crate::Result;

/// Changes the fields given in `args` of one expense, keeping the others.
///
/// The current values come from the freshly loaded collection, like an edit form prefilled from
/// the row being edited. The merged form is validated before anything is sent.
///
/// # Errors
///
/// - Returns an error if the expense is not in the collection.
/// - Returns an error if the merged form is invalid or the remote call fails.
pub async fn update(ctx: &AppContext, args: UpdateArgs) -> Result<Out<Expense>> {
    let api = session_api(ctx)?;
    let id = args.id();
    let mut store = ExpenseStore::default();
    store.load(api.as_ref()).await?.into_result()?;

    let mut form = store.edit_form(&id).ok_or_else(|| {
        Error::new(
            ErrorType::Validation,
            anyhow::anyhow!("Expense not found: {id}"),
        )
    })?;
    if let Some(title) = args.title() {
        form.title = title.to_string();
    }
    if let Some(amount) = args.amount() {
        form.amount = amount.to_string();
    }
    if let Some(category) = args.category() {
        form.category = category.to_string();
    }

    let updated = store.update(api.as_ref(), &id, &form).await?.into_result()?;
    let message = format!(
        "Updated {}: {} ({}, {})",
        id,
        updated.title(),
        updated.amount(),
        updated.category()
    );
    Ok(Out::new(message, updated))
}
