pub(crate) mod assignments;
pub(crate) mod attempts;
pub(crate) mod auth;
pub(crate) mod errors;
#[cfg(test)]
mod flow_tests;
pub(crate) mod guards;
pub(crate) mod handlers;
pub(crate) mod pagination;
pub(crate) mod router;
pub(crate) mod tests;
pub(crate) mod users;
