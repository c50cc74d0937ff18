pub mod automation;
pub mod documents;
pub mod health;
pub mod steps;
pub mod workflows;
