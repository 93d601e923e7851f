//! The in-memory expense collection of one session, and the rules for changing it.
//!
//! The store only changes after the remote API has confirmed a change, and every change is
//! followed by a recomputation of the derived `Views`. Each remote action goes through two
//! phases: `begin` registers it as in flight and hands out a `Ticket`, and the matching
//! `finish_*` applies the response. A second `begin` for an action that is still in flight is
//! rejected. `close` invalidates every outstanding ticket, so a response that arrives after the
//! view is gone is ignored.

use crate::api::{ApiError, ExpenseApi};
use crate::error::{Error, ErrorType, Result};
use crate::model::{Expense, ExpenseForm, ExpenseId};
use crate::pipeline::{FilterConfig, Views};
use std::collections::{HashMap, HashSet};
use std::fmt::{Display, Formatter};
use tracing::{debug, warn};
use uuid::Uuid;

pub const LOAD_FAILED: &str = "Failed to load expenses";
pub const OPERATION_FAILED: &str = "Operation failed";
pub const DELETE_FAILED: &str = "Delete failed";

/// A remote action that changes, or fills, the collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Action {
    Load,
    Create,
    Update(ExpenseId),
    Delete(ExpenseId),
}

impl Display for Action {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Load => write!(f, "load"),
            Action::Create => write!(f, "create"),
            Action::Update(id) => write!(f, "update of {id}"),
            Action::Delete(id) => write!(f, "delete of {id}"),
        }
    }
}

/// Proof that an action was started. It must be handed back to the matching `finish_*` method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    action: Action,
    epoch: u64,
    token: Uuid,
}

impl Ticket {
    pub fn action(&self) -> &Action {
        &self.action
    }
}

/// What happened to an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    /// The remote call succeeded and its result was applied.
    Applied(T),
    /// The input was rejected locally. No remote call was made.
    Invalid(String),
    /// The remote call failed. The collection is unchanged.
    Failed(String),
    /// The response arrived after the store was closed and was ignored.
    Stale,
}

impl<T> Outcome<T> {
    pub fn is_applied(&self) -> bool {
        matches!(self, Outcome::Applied(_))
    }

    pub fn applied(self) -> Option<T> {
        match self {
            Outcome::Applied(value) => Some(value),
            _ => None,
        }
    }

    /// Converts a failure into an error carrying the user-facing message.
    pub fn into_result(self) -> Result<T> {
        match self {
            Outcome::Applied(value) => Ok(value),
            Outcome::Invalid(message) => Err(Error::validation(message)),
            Outcome::Failed(message) => Err(Error::new(
                ErrorType::Remote,
                anyhow::Error::msg(message),
            )),
            Outcome::Stale => Err(Error::new(
                ErrorType::Remote,
                anyhow::anyhow!("The response arrived after the view was closed"),
            )),
        }
    }
}

/// The expense collection, the table's filter configuration, and everything derived from them.
#[derive(Debug, Default)]
pub struct ExpenseStore {
    expenses: Vec<Expense>,
    filters: FilterConfig,
    views: Views,
    last_error: Option<String>,
    in_flight: HashMap<Action, Uuid>,
    epoch: u64,
}

impl ExpenseStore {
    pub fn new(filters: FilterConfig) -> Self {
        Self {
            filters,
            ..Self::default()
        }
    }

    /// The collection, in store order (most recently created first).
    pub fn expenses(&self) -> &[Expense] {
        &self.expenses
    }

    pub fn get(&self, id: &ExpenseId) -> Option<&Expense> {
        self.expenses.iter().find(|e| e.id() == id)
    }

    pub fn views(&self) -> &Views {
        &self.views
    }

    pub fn filters(&self) -> &FilterConfig {
        &self.filters
    }

    /// Replaces the filter configuration and recomputes the views.
    pub fn set_filters(&mut self, filters: FilterConfig) {
        self.filters = filters;
        self.recompute();
    }

    /// The most recent error message, cleared when the next action begins.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn is_in_flight(&self, action: &Action) -> bool {
        self.in_flight.contains_key(action)
    }

    pub fn is_loading(&self) -> bool {
        self.is_in_flight(&Action::Load)
    }

    /// The edit form prefilled from the expense `id`.
    pub fn edit_form(&self, id: &ExpenseId) -> Option<ExpenseForm> {
        self.get(id).map(ExpenseForm::from)
    }

    /// Registers `action` as in flight and clears the error message.
    ///
    /// # Errors
    /// Returns an `InFlight` error if the same action has not finished yet.
    pub fn begin(&mut self, action: Action) -> Result<Ticket> {
        if self.in_flight.contains_key(&action) {
            return Err(Error::new(
                ErrorType::InFlight,
                anyhow::anyhow!("The {action} is still in progress"),
            ));
        }
        let token = Uuid::new_v4();
        self.in_flight.insert(action.clone(), token);
        self.last_error = None;
        debug!("Began {action}");
        Ok(Ticket {
            action,
            epoch: self.epoch,
            token,
        })
    }

    /// Invalidates every outstanding ticket. Responses that arrive later are ignored.
    pub fn close(&mut self) {
        self.epoch += 1;
        self.in_flight.clear();
    }

    /// Replaces the collection with the fetched list.
    pub fn finish_load(
        &mut self,
        ticket: Ticket,
        response: std::result::Result<Vec<Expense>, ApiError>,
    ) -> Outcome<usize> {
        if !self.settle(&ticket) {
            return Outcome::Stale;
        }
        match response {
            Ok(expenses) => {
                self.expenses = dedupe(expenses);
                self.recompute();
                Outcome::Applied(self.expenses.len())
            }
            Err(e) => self.failed(e, LOAD_FAILED),
        }
    }

    /// Prepends the created record.
    pub fn finish_create(
        &mut self,
        ticket: Ticket,
        response: std::result::Result<Expense, ApiError>,
    ) -> Outcome<Expense> {
        if !self.settle(&ticket) {
            return Outcome::Stale;
        }
        match response {
            Ok(created) => {
                self.expenses.retain(|e| e.id() != created.id());
                self.expenses.insert(0, created.clone());
                self.recompute();
                Outcome::Applied(created)
            }
            Err(e) => self.failed(e, OPERATION_FAILED),
        }
    }

    /// Replaces the updated record in place. A record that is not in the collection is left
    /// absent.
    pub fn finish_update(
        &mut self,
        ticket: Ticket,
        response: std::result::Result<Expense, ApiError>,
    ) -> Outcome<Expense> {
        let id = match ticket.action() {
            Action::Update(id) => id.clone(),
            other => {
                warn!("finish_update called with a ticket for {other}");
                // The ticket still ends its own action
                self.settle(&ticket);
                return Outcome::Stale;
            }
        };
        if !self.settle(&ticket) {
            return Outcome::Stale;
        }
        match response {
            Ok(updated) => {
                match self.expenses.iter_mut().find(|e| e.id() == &id) {
                    Some(slot) => {
                        // The id stays as it was, everything else comes from the server
                        *slot = Expense {
                            id,
                            ..updated.clone()
                        };
                    }
                    None => debug!("Updated expense {id} is not in the collection"),
                }
                self.recompute();
                Outcome::Applied(updated)
            }
            Err(e) => self.failed(e, OPERATION_FAILED),
        }
    }

    /// Removes the deleted record, returning it if it was in the collection.
    pub fn finish_delete(
        &mut self,
        ticket: Ticket,
        response: std::result::Result<(), ApiError>,
    ) -> Outcome<Option<Expense>> {
        let id = match ticket.action() {
            Action::Delete(id) => id.clone(),
            other => {
                warn!("finish_delete called with a ticket for {other}");
                // The ticket still ends its own action
                self.settle(&ticket);
                return Outcome::Stale;
            }
        };
        if !self.settle(&ticket) {
            return Outcome::Stale;
        }
        match response {
            Ok(()) => {
                let removed = self
                    .expenses
                    .iter()
                    .position(|e| e.id() == &id)
                    .map(|ix| self.expenses.remove(ix));
                self.recompute();
                Outcome::Applied(removed)
            }
            Err(e) => self.failed(e, DELETE_FAILED),
        }
    }

    /// Fetches the whole collection.
    pub async fn load(&mut self, api: &dyn ExpenseApi) -> Result<Outcome<usize>> {
        let ticket = self.begin(Action::Load)?;
        let response = api.list_expenses().await;
        Ok(self.finish_load(ticket, response))
    }

    /// Validates `form` and, if it is valid, creates the expense remotely.
    pub async fn create(
        &mut self,
        api: &dyn ExpenseApi,
        form: &ExpenseForm,
    ) -> Result<Outcome<Expense>> {
        let input = match self.validate(form) {
            Ok(input) => input,
            Err(outcome) => return Ok(outcome),
        };
        let ticket = self.begin(Action::Create)?;
        let response = api.create_expense(&input).await;
        Ok(self.finish_create(ticket, response))
    }

    /// Validates `form` and, if it is valid, replaces the fields of expense `id` remotely.
    pub async fn update(
        &mut self,
        api: &dyn ExpenseApi,
        id: &ExpenseId,
        form: &ExpenseForm,
    ) -> Result<Outcome<Expense>> {
        let input = match self.validate(form) {
            Ok(input) => input,
            Err(outcome) => return Ok(outcome),
        };
        let ticket = self.begin(Action::Update(id.clone()))?;
        let response = api.update_expense(id, &input).await;
        Ok(self.finish_update(ticket, response))
    }

    /// Deletes expense `id` remotely.
    pub async fn delete(
        &mut self,
        api: &dyn ExpenseApi,
        id: &ExpenseId,
    ) -> Result<Outcome<Option<Expense>>> {
        let ticket = self.begin(Action::Delete(id.clone()))?;
        let response = api.delete_expense(id).await;
        Ok(self.finish_delete(ticket, response))
    }

    fn validate<T>(
        &mut self,
        form: &ExpenseForm,
    ) -> std::result::Result<crate::model::ExpenseInput, Outcome<T>> {
        self.last_error = None;
        form.validate().map_err(|e| {
            let message = e.to_string();
            self.last_error = Some(message.clone());
            Outcome::Invalid(message)
        })
    }

    /// Accepts the response for `ticket` if it is still current, ending its in-flight state.
    fn settle(&mut self, ticket: &Ticket) -> bool {
        let current = ticket.epoch == self.epoch
            && self.in_flight.get(&ticket.action) == Some(&ticket.token);
        if current {
            self.in_flight.remove(&ticket.action);
        } else {
            debug!("Ignoring stale response for {}", ticket.action);
        }
        current
    }

    fn failed<T>(&mut self, error: ApiError, fallback: &str) -> Outcome<T> {
        warn!("Remote call failed: {error}");
        let message = error.user_message(fallback);
        self.last_error = Some(message.clone());
        Outcome::Failed(message)
    }

    fn recompute(&mut self) {
        self.views = Views::compute(&self.expenses, &self.filters);
    }
}

/// Keeps the first record of each id.
fn dedupe(expenses: Vec<Expense>) -> Vec<Expense> {
    let mut seen = HashSet::new();
    let before = expenses.len();
    let unique: Vec<Expense> = expenses
        .into_iter()
        .filter(|e| seen.insert(e.id().clone()))
        .collect();
    if unique.len() != before {
        warn!("Dropped {} duplicate expenses", before - unique.len());
    }
    unique
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{TestApi, TestApiState};
    use crate::model::{Amount, INVALID_AMOUNT, MISSING_FIELDS};
    use crate::pipeline::SortKey;
    use chrono::{TimeZone, Utc};
    use std::str::FromStr;

    fn amt(s: &str) -> Amount {
        Amount::from_str(s).unwrap()
    }

    fn exp(id: &str, title: &str, amount: &str, category: &str, day: u32) -> Expense {
        let date = Utc.with_ymd_and_hms(2025, 10, day, 12, 0, 0).unwrap();
        Expense::new(id, title, amt(amount), category, date)
    }

    /// An API with a fresh state holding exactly `expenses`.
    fn api_with(expenses: Vec<Expense>) -> TestApi {
        let api = TestApi::new(format!("store-test-{}", Uuid::new_v4()));
        api.set_state(TestApiState {
            expenses,
            ..TestApiState::default()
        });
        api
    }

    fn sample() -> Vec<Expense> {
        vec![
            exp("1", "Coffee", "5", "Food", 1),
            exp("2", "Bus", "2", "Transport", 2),
            exp("3", "Lunch", "15", "Food", 3),
        ]
    }

    async fn loaded(api: &TestApi) -> ExpenseStore {
        let mut store = ExpenseStore::default();
        assert_eq!(store.load(api).await.unwrap(), Outcome::Applied(3));
        store
    }

    #[tokio::test]
    async fn test_load_populates_views() {
        let api = api_with(sample());
        let store = loaded(&api).await;
        assert_eq!(store.views().list.len(), 3);
        assert_eq!(store.views().totals.get("Food"), Some(amt("20")));
        assert!(!store.is_loading());
    }

    #[tokio::test]
    async fn test_load_failure_keeps_collection_and_reports() {
        let api = api_with(sample());
        let mut store = loaded(&api).await;
        api.fail_next(ApiError::status(401, Some("No token, authorization denied".into())));
        let outcome = store.load(&api).await.unwrap();
        assert_eq!(
            outcome,
            Outcome::Failed("No token, authorization denied".into())
        );
        assert_eq!(store.expenses().len(), 3);
        assert_eq!(store.last_error(), Some("No token, authorization denied"));
    }

    #[tokio::test]
    async fn test_create_coerces_amount_and_prepends() {
        let api = api_with(sample());
        let mut store = loaded(&api).await;
        let form = ExpenseForm::new("Dinner", "12.50", "Food");
        let created = store.create(&api, &form).await.unwrap().applied().unwrap();

        assert_eq!(api.get_state().received[0].amount, amt("12.5"));
        assert_eq!(store.expenses()[0], created);
        assert_eq!(store.expenses().len(), 4);
        assert_eq!(store.views().totals.get("Food"), Some(amt("32.5")));
    }

    #[tokio::test]
    async fn test_create_invalid_amount_makes_no_call() {
        let api = api_with(sample());
        let mut store = loaded(&api).await;
        let calls = api.get_state().calls;

        let form = ExpenseForm::new("Dinner", "a lot", "Food");
        let outcome = store.create(&api, &form).await.unwrap();
        assert_eq!(outcome, Outcome::Invalid(INVALID_AMOUNT.into()));
        assert_eq!(store.last_error(), Some(INVALID_AMOUNT));
        assert_eq!(api.get_state().calls, calls);
        assert_eq!(store.expenses().len(), 3);
    }

    #[tokio::test]
    async fn test_create_missing_field() {
        let api = api_with(sample());
        let mut store = loaded(&api).await;
        let outcome = store
            .create(&api, &ExpenseForm::new("", "3", "Food"))
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Invalid(MISSING_FIELDS.into()));
    }

    #[tokio::test]
    async fn test_create_failure_uses_fallback_message() {
        let api = api_with(sample());
        let mut store = loaded(&api).await;
        api.fail_next(ApiError::status(500, None));
        let outcome = store
            .create(&api, &ExpenseForm::new("Tea", "3", "Food"))
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Failed(OPERATION_FAILED.into()));
        assert_eq!(store.expenses(), sample().as_slice());
    }

    #[tokio::test]
    async fn test_update_replaces_in_place() {
        let api = api_with(sample());
        let mut store = loaded(&api).await;
        let id = ExpenseId::new("2");
        let form = ExpenseForm::new("Taxi", "20", "Transport");
        store.update(&api, &id, &form).await.unwrap().applied().unwrap();

        assert_eq!(store.expenses()[1].title(), "Taxi");
        assert_eq!(store.expenses()[1].id(), &id);
        assert_eq!(store.views().totals.get("Transport"), Some(amt("20")));
    }

    #[tokio::test]
    async fn test_update_of_unknown_record_leaves_collection() {
        let mut remote = sample();
        remote.push(exp("9", "Rent", "900", "Home", 4));
        let api = api_with(remote);
        let mut store = ExpenseStore::default();
        let ticket = store.begin(Action::Load).unwrap();
        store.finish_load(ticket, Ok(sample()));

        let outcome = store
            .update(&api, &ExpenseId::new("9"), &ExpenseForm::new("Rent", "950", "Home"))
            .await
            .unwrap();
        assert!(outcome.is_applied());
        assert_eq!(store.expenses(), sample().as_slice());
    }

    #[tokio::test]
    async fn test_delete_removes_record() {
        let api = api_with(sample());
        let mut store = loaded(&api).await;
        let removed = store
            .delete(&api, &ExpenseId::new("1"))
            .await
            .unwrap()
            .applied()
            .unwrap();
        assert_eq!(removed.unwrap().title(), "Coffee");
        assert_eq!(store.expenses().len(), 2);
        assert_eq!(store.views().totals.get("Food"), Some(amt("15")));
    }

    #[tokio::test]
    async fn test_delete_absent_record_is_noop() {
        let api = api_with(sample());
        let mut store = loaded(&api).await;
        let outcome = store.delete(&api, &ExpenseId::new("404")).await.unwrap();
        assert_eq!(outcome, Outcome::Applied(None));
        assert_eq!(store.expenses(), sample().as_slice());
    }

    #[tokio::test]
    async fn test_delete_failure() {
        let api = api_with(sample());
        let mut store = loaded(&api).await;
        api.fail_next(ApiError::transport("connection reset"));
        let outcome = store.delete(&api, &ExpenseId::new("1")).await.unwrap();
        assert_eq!(outcome, Outcome::Failed(DELETE_FAILED.into()));
        assert_eq!(store.expenses().len(), 3);
    }

    #[test]
    fn test_duplicate_action_rejected_while_in_flight() {
        let mut store = ExpenseStore::default();
        let id = ExpenseId::new("1");
        let ticket = store.begin(Action::Delete(id.clone())).unwrap();
        let err = store.begin(Action::Delete(id.clone())).unwrap_err();
        assert_eq!(err.error_type(), ErrorType::InFlight);

        // Other records are independent
        assert!(store.begin(Action::Delete(ExpenseId::new("2"))).is_ok());

        store.finish_delete(ticket, Ok(()));
        assert!(store.begin(Action::Delete(id)).is_ok());
    }

    #[test]
    fn test_response_after_close_is_ignored() {
        let mut store = ExpenseStore::default();
        let ticket = store.begin(Action::Create).unwrap();
        store.close();
        let outcome = store.finish_create(ticket, Ok(exp("1", "Coffee", "5", "Food", 1)));
        assert_eq!(outcome, Outcome::Stale);
        assert!(store.expenses().is_empty());
        assert!(!store.is_in_flight(&Action::Create));
    }

    #[test]
    fn test_mismatched_ticket_still_ends_its_action() {
        let mut store = ExpenseStore::default();
        let ticket = store.begin(Action::Create).unwrap();
        let outcome = store.finish_update(ticket, Ok(exp("1", "Coffee", "5", "Food", 1)));
        assert_eq!(outcome, Outcome::Stale);
        assert!(!store.is_in_flight(&Action::Create));
        assert!(store.expenses().is_empty());

        let ticket = store.begin(Action::Load).unwrap();
        assert_eq!(store.finish_delete(ticket, Ok(())), Outcome::Stale);
        assert!(!store.is_loading());
        assert!(store.begin(Action::Create).is_ok());
        assert!(store.begin(Action::Load).is_ok());
    }

    #[test]
    fn test_old_ticket_cannot_settle_new_action() {
        let mut store = ExpenseStore::default();
        let old = store.begin(Action::Load).unwrap();
        store.close();
        let new = store.begin(Action::Load).unwrap();
        assert_eq!(store.finish_load(old, Ok(sample())), Outcome::Stale);
        assert!(store.is_loading());
        assert_eq!(store.finish_load(new, Ok(sample())), Outcome::Applied(3));
    }

    #[test]
    fn test_begin_clears_error() {
        let mut store = ExpenseStore::default();
        let ticket = store.begin(Action::Load).unwrap();
        store.finish_load(ticket, Err(ApiError::status(500, None)));
        assert_eq!(store.last_error(), Some(LOAD_FAILED));
        let _ticket = store.begin(Action::Load).unwrap();
        assert_eq!(store.last_error(), None);
    }

    #[test]
    fn test_set_filters_recomputes() {
        let mut store = ExpenseStore::default();
        let ticket = store.begin(Action::Load).unwrap();
        store.finish_load(ticket, Ok(sample()));
        store.set_filters(FilterConfig::new().with_sort(SortKey::AmountDesc));
        let titles: Vec<&str> = store.views().list.iter().map(Expense::title).collect();
        assert_eq!(titles, vec!["Lunch", "Coffee", "Bus"]);
    }

    #[test]
    fn test_load_drops_duplicate_ids() {
        let mut store = ExpenseStore::default();
        let ticket = store.begin(Action::Load).unwrap();
        let mut data = sample();
        data.push(exp("1", "Coffee again", "6", "Food", 4));
        assert_eq!(store.finish_load(ticket, Ok(data)), Outcome::Applied(3));
    }

    #[test]
    fn test_edit_form_prefill() {
        let mut store = ExpenseStore::default();
        let ticket = store.begin(Action::Load).unwrap();
        store.finish_load(ticket, Ok(sample()));
        assert_eq!(
            store.edit_form(&ExpenseId::new("3")),
            Some(ExpenseForm::new("Lunch", "15", "Food"))
        );
        assert_eq!(store.edit_form(&ExpenseId::new("x")), None);
    }

    #[test]
    fn test_outcome_into_result() {
        let err = Outcome::<()>::Failed("Delete failed".into())
            .into_result()
            .unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Remote);
        assert_eq!(err.to_string(), "Delete failed");
    }
}
