//! Implements the `ExpenseApi` trait using in-memory data for testing purposes.
//!
//! Note: this is compiled even in the "production" version of this app so that we can run the whole
//! app, top-to-bottom, without an expense server.

use crate::api::{ApiError, ExpenseApi};
use crate::model::{Amount, Expense, ExpenseId, ExpenseInput, LoginForm, Session, SignupForm};
use chrono::{TimeZone, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, OnceLock};
use uuid::Uuid;

/// Everything the in-memory server knows.
#[derive(Debug, Clone, Default)]
pub struct TestApiState {
    /// Stored expenses, newest first, as a server would list them.
    pub expenses: Vec<Expense>,
    /// Registered accounts.
    pub users: Vec<SignupForm>,
    /// When set, the next call fails with this error instead of doing anything.
    pub fail_next: Option<ApiError>,
    /// Every create or update payload received, in order.
    pub received: Vec<ExpenseInput>,
    /// The number of calls made, failed ones included.
    pub calls: usize,
}

/// Process-wide state, keyed so that independent tests (and independent base URLs) do not see
/// each other's data.
static STATES: OnceLock<Mutex<HashMap<String, TestApiState>>> = OnceLock::new();

fn states() -> MutexGuard<'static, HashMap<String, TestApiState>> {
    STATES
        .get_or_init(|| Mutex::new(HashMap::new()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// The account every new key starts with, so a fresh process can log in without signing up.
pub const DEMO_EMAIL: &str = "demo@example.com";
pub const DEMO_PASSWORD: &str = "demo";

/// An implementation of `ExpenseApi` that does not use a server. All instances created with the
/// same `key` share state for the life of the process. A new key starts with seed data and the
/// demo account.
#[derive(Debug, Clone)]
pub struct TestApi {
    key: String,
}

impl TestApi {
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        states()
            .entry(key.clone())
            .or_insert_with(|| TestApiState {
                expenses: seed_expenses(),
                users: vec![demo_user()],
                ..TestApiState::default()
            });
        Self { key }
    }

    /// A copy of the current state.
    pub fn get_state(&self) -> TestApiState {
        states().get(&self.key).cloned().unwrap_or_default()
    }

    /// Replaces the current state.
    pub fn set_state(&self, state: TestApiState) {
        states().insert(self.key.clone(), state);
    }

    /// Makes the next call fail with `error`.
    pub fn fail_next(&self, error: ApiError) {
        self.with_state(|state| state.fail_next = Some(error));
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut TestApiState) -> T) -> T {
        let mut guard = states();
        let state = guard.entry(self.key.clone()).or_default();
        f(state)
    }

    /// Counts the call and consumes a pending failure, then runs `f`.
    fn call<T>(
        &self,
        f: impl FnOnce(&mut TestApiState) -> Result<T, ApiError>,
    ) -> Result<T, ApiError> {
        self.with_state(|state| {
            state.calls += 1;
            match state.fail_next.take() {
                Some(error) => Err(error),
                None => f(state),
            }
        })
    }
}

fn not_found() -> ApiError {
    ApiError::status(404, Some("Expense not found".to_string()))
}

#[async_trait::async_trait]
impl ExpenseApi for TestApi {
    async fn list_expenses(&self) -> Result<Vec<Expense>, ApiError> {
        self.call(|state| Ok(state.expenses.clone()))
    }

    async fn create_expense(&self, input: &ExpenseInput) -> Result<Expense, ApiError> {
        self.call(|state| {
            state.received.push(input.clone());
            let expense = Expense::new(
                Uuid::new_v4().simple().to_string(),
                input.title.clone(),
                input.amount,
                input.category.clone(),
                Utc::now(),
            );
            state.expenses.insert(0, expense.clone());
            Ok(expense)
        })
    }

    async fn update_expense(
        &self,
        id: &ExpenseId,
        input: &ExpenseInput,
    ) -> Result<Expense, ApiError> {
        self.call(|state| {
            state.received.push(input.clone());
            let existing = state
                .expenses
                .iter_mut()
                .find(|e| e.id() == id)
                .ok_or_else(not_found)?;
            existing.title = input.title.clone();
            existing.amount = input.amount;
            existing.category = input.category.clone();
            Ok(existing.clone())
        })
    }

    async fn delete_expense(&self, id: &ExpenseId) -> Result<(), ApiError> {
        self.call(|state| {
            state.expenses.retain(|e| e.id() != id);
            Ok(())
        })
    }

    async fn signup(&self, form: &SignupForm) -> Result<(), ApiError> {
        self.call(|state| {
            if state.users.iter().any(|u| u.email == form.email) {
                return Err(ApiError::status(
                    400,
                    Some("User already exists".to_string()),
                ));
            }
            state.users.push(form.clone());
            Ok(())
        })
    }

    async fn login(&self, form: &LoginForm) -> Result<Session, ApiError> {
        self.call(|state| {
            state
                .users
                .iter()
                .find(|u| u.email == form.email && u.password == form.password)
                .map(|_| Session {
                    token: format!("test-{}", Uuid::new_v4().simple()),
                })
                .ok_or_else(|| ApiError::status(400, Some("Invalid credentials".to_string())))
        })
    }
}

fn demo_user() -> SignupForm {
    SignupForm {
        username: "demo".to_string(),
        email: DEMO_EMAIL.to_string(),
        password: DEMO_PASSWORD.to_string(),
    }
}

/// Seed expenses, newest first.
fn seed_expenses() -> Vec<Expense> {
    let seed = [
        ("seed-004", "Groceries", 87.43, "Food", (2025, 10, 20, 17, 30)),
        ("seed-003", "Bus pass", 45.00, "Transport", (2025, 10, 18, 8, 5)),
        ("seed-002", "Lunch", 14.85, "Food", (2025, 10, 17, 12, 35)),
        ("seed-001", "Electric bill", 142.67, "Utilities", (2025, 10, 16, 6, 0)),
    ];
    seed.into_iter()
        .filter_map(|(id, title, amount, category, (y, mo, d, h, mi))| {
            let date = Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).single()?;
            let amount = Amount::try_from(amount).ok()?;
            Some(Expense::new(id, title, amount, category, date))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn input(title: &str, amount: &str, category: &str) -> ExpenseInput {
        ExpenseInput {
            title: title.to_string(),
            amount: Amount::from_str(amount).unwrap(),
            category: category.to_string(),
        }
    }

    fn unique_key() -> String {
        format!("test-api-{}", Uuid::new_v4())
    }

    #[tokio::test]
    async fn test_new_key_is_seeded() {
        let api = TestApi::new(unique_key());
        let expenses = api.list_expenses().await.unwrap();
        assert_eq!(expenses.len(), 4);
        assert_eq!(expenses[0].id().as_str(), "seed-004");
    }

    #[tokio::test]
    async fn test_new_key_accepts_demo_login() {
        let api = TestApi::new(unique_key());
        let login = LoginForm {
            email: DEMO_EMAIL.into(),
            password: DEMO_PASSWORD.into(),
        };
        assert!(api.login(&login).await.unwrap().token.starts_with("test-"));
    }

    #[tokio::test]
    async fn test_instances_share_state_by_key() {
        let key = unique_key();
        let a = TestApi::new(&key);
        let b = TestApi::new(&key);
        let created = a.create_expense(&input("Tea", "3", "Food")).await.unwrap();
        let listed = b.list_expenses().await.unwrap();
        assert_eq!(listed[0], created);
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let api = TestApi::new(unique_key());
        let err = api
            .update_expense(&ExpenseId::new("nope"), &input("Tea", "3", "Food"))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), Some(404));
    }

    #[tokio::test]
    async fn test_fail_next_only_fails_once() {
        let api = TestApi::new(unique_key());
        api.fail_next(ApiError::status(500, None));
        assert!(api.list_expenses().await.is_err());
        assert!(api.list_expenses().await.is_ok());
        assert_eq!(api.get_state().calls, 2);
    }

    #[tokio::test]
    async fn test_signup_then_login() {
        let api = TestApi::new(unique_key());
        let signup = SignupForm {
            username: "sam".into(),
            email: "sam@example.com".into(),
            password: "hunter2".into(),
        };
        api.signup(&signup).await.unwrap();
        let err = api.signup(&signup).await.unwrap_err();
        assert_eq!(err.message(), Some("User already exists"));

        let mut login = LoginForm {
            email: "sam@example.com".into(),
            password: "hunter2".into(),
        };
        assert!(api.login(&login).await.unwrap().token.starts_with("test-"));
        login.password = "wrong".into();
        assert_eq!(
            api.login(&login).await.unwrap_err().message(),
            Some("Invalid credentials")
        );
    }
}
