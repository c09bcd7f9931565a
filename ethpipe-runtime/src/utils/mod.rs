/// Helpers for driving links on a tokio runtime in tests.
#[cfg(test)]
pub(crate) mod test;
