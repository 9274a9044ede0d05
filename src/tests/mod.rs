pub mod test_evaluation;
pub mod test_playground;
