mod export;
mod replay;
mod run;

pub use export::handle_export;
pub use replay::handle_replay;
pub use run::handle_run;
