pub mod inspect;
pub mod options;
pub mod run;
