//! Delete command handler.

use crate::commands::auth::session_api;
use crate::commands::Out;
use crate::context::AppContext;
use crate::model::ExpenseId;
use crate::store::ExpenseStore;
use crate::Result;

/// Deletes one expense by id.
///
/// The confirmation prompt belongs to the caller. Deleting an id the server does not know is
/// not an error.
pub async fn delete(ctx: &AppContext, id: ExpenseId) -> Result<Out<ExpenseId>> {
    let api = session_api(ctx)?;
    let mut store = ExpenseStore::default();
    store.delete(api.as_ref(), &id).await?.into_result()?;
    Ok(Out::new(format!("Deleted expense {id}"), id))
}
