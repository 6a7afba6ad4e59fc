pub mod access;
pub mod health;
pub mod hunts;
pub mod versions;
