use crate::error::{Error, Result};
use crate::model::{Amount, AmountError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Shown when any required field of a form is left blank.
pub const MISSING_FIELDS: &str = "Please fill all fields";

/// Shown when the amount field cannot be read as a number.
pub const INVALID_AMOUNT: &str = "Amount must be a number";

/// The server-assigned identifier of an expense.
#[derive(Debug, Default, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExpenseId(String);

impl ExpenseId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ExpenseId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ExpenseId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for ExpenseId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// A single tracked expense, exactly as the remote API returns it.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    #[serde(rename = "_id")]
    pub(crate) id: ExpenseId,
    pub(crate) title: String,
    pub(crate) amount: Amount,
    pub(crate) category: String,
    pub(crate) date: DateTime<Utc>,
}

impl Expense {
    pub fn new(
        id: impl Into<ExpenseId>,
        title: impl Into<String>,
        amount: Amount,
        category: impl Into<String>,
        date: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            amount,
            category: category.into(),
            date,
        }
    }

    pub fn id(&self) -> &ExpenseId {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn date(&self) -> DateTime<Utc> {
        self.date
    }
}

/// The validated fields sent to the remote API when creating or updating an expense.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct ExpenseInput {
    pub title: String,
    pub amount: Amount,
    pub category: String,
}

/// The raw text of the add/edit expense form.
#[derive(Debug, Default, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct ExpenseForm {
    pub title: String,
    pub amount: String,
    pub category: String,
}

impl ExpenseForm {
    pub fn new(
        title: impl Into<String>,
        amount: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            amount: amount.into(),
            category: category.into(),
        }
    }

    /// Checks that every field is filled in and coerces the amount to a number. A failure here
    /// means no remote call should be made.
    pub fn validate(&self) -> Result<ExpenseInput> {
        let title = self.title.trim();
        let category = self.category.trim();
        if title.is_empty() || self.amount.trim().is_empty() || category.is_empty() {
            return Err(Error::validation(MISSING_FIELDS));
        }
        let amount = match Amount::from_str(&self.amount) {
            Ok(amount) => amount,
            Err(AmountError::Empty) => return Err(Error::validation(MISSING_FIELDS)),
            Err(_) => return Err(Error::validation(INVALID_AMOUNT)),
        };
        Ok(ExpenseInput {
            title: title.to_string(),
            amount,
            category: category.to_string(),
        })
    }
}

impl From<&Expense> for ExpenseForm {
    /// Prefills the form from an existing record, as when the edit button is pressed.
    fn from(expense: &Expense) -> Self {
        Self {
            title: expense.title.clone(),
            amount: expense.amount.value().to_string(),
            category: expense.category.clone(),
        }
    }
}

/// The fields of the signup form.
#[derive(Debug, Default, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct SignupForm {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl SignupForm {
    pub fn validate(&self) -> Result<()> {
        if [&self.username, &self.email, &self.password]
            .iter()
            .any(|s| s.trim().is_empty())
        {
            return Err(Error::validation(MISSING_FIELDS));
        }
        Ok(())
    }
}

/// The fields of the login form.
#[derive(Debug, Default, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

impl LoginForm {
    pub fn validate(&self) -> Result<()> {
        if self.email.trim().is_empty() || self.password.trim().is_empty() {
            return Err(Error::validation(MISSING_FIELDS));
        }
        Ok(())
    }
}

/// An authenticated session with the remote API.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorType;
    use chrono::TimeZone;

    #[test]
    fn test_validate_coerces_amount() {
        let input = ExpenseForm::new("Lunch", "12.50", "Food").validate().unwrap();
        assert_eq!(input.amount, Amount::from_str("12.5").unwrap());
        assert_eq!(input.title, "Lunch");
    }

    #[test]
    fn test_validate_missing_field() {
        let err = ExpenseForm::new("Lunch", "", "Food").validate().unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Validation);
        assert_eq!(err.to_string(), MISSING_FIELDS);

        let err = ExpenseForm::new("  ", "3", "Food").validate().unwrap_err();
        assert_eq!(err.to_string(), MISSING_FIELDS);
    }

    #[test]
    fn test_validate_non_numeric_amount() {
        let err = ExpenseForm::new("Lunch", "twelve", "Food")
            .validate()
            .unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Validation);
        assert_eq!(err.to_string(), INVALID_AMOUNT);
    }

    #[test]
    fn test_expense_wire_format() {
        let json = r#"{
            "_id": "64f1c2",
            "title": "Coffee",
            "amount": 5,
            "category": "Food",
            "date": "2025-10-20T08:15:00.000Z",
            "user": "someone"
        }"#;
        let expense: Expense = serde_json::from_str(json).unwrap();
        assert_eq!(expense.id().as_str(), "64f1c2");
        assert_eq!(expense.amount(), Amount::from_str("5").unwrap());
        assert_eq!(
            expense.date(),
            Utc.with_ymd_and_hms(2025, 10, 20, 8, 15, 0).unwrap()
        );
    }

    #[test]
    fn test_form_prefill_from_expense() {
        let date = Utc.with_ymd_and_hms(2025, 10, 20, 8, 15, 0).unwrap();
        let expense = Expense::new("a", "Bus", Amount::from_str("2.75").unwrap(), "Transport", date);
        let form = ExpenseForm::from(&expense);
        assert_eq!(form, ExpenseForm::new("Bus", "2.75", "Transport"));
    }

    #[test]
    fn test_signup_requires_all_fields() {
        let form = SignupForm {
            username: "sam".into(),
            email: "sam@example.com".into(),
            password: String::new(),
        };
        assert!(form.validate().is_err());
    }
}
