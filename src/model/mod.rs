//! Types that represent the core data model, such as `Expense` and `Amount`.
mod amount;
mod expense;

pub use amount::{Amount, AmountError};
pub use expense::{
    Expense, ExpenseForm, ExpenseId, ExpenseInput, LoginForm, Session, SignupForm,
    INVALID_AMOUNT, MISSING_FIELDS,
};
