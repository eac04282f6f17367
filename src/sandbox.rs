mod local_runner;

pub use local_runner::LocalRunner;
