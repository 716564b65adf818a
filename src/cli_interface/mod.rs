//! command line interface of `flatfs`
mod cli_struct;
pub use cli_struct::*;
