pub mod asana;
pub mod harvest;

#[cfg(test)]
pub mod fake;
