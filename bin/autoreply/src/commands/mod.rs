pub mod doctor;
pub mod history;
pub mod run;
pub mod status;
