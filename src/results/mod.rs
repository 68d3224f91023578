pub mod aggregate;
pub mod mailbox;
pub mod row;
