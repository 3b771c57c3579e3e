pub mod card;
pub mod check;
pub mod index;
pub mod init;
pub mod run;
