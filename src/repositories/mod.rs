pub(crate) mod answers;
pub(crate) mod assignments;
pub(crate) mod attempts;
pub(crate) mod health;
pub(crate) mod questions;
pub(crate) mod users;
pub(crate) mod wallets;
