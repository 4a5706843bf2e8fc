//! Entry points behind the CLI subcommands.

pub mod authorize;
pub mod launch;
pub mod prompt_test;
pub mod run;

pub use authorize::authorize;
pub use launch::launch;
pub use prompt_test::prompt_test;
pub use run::run;
