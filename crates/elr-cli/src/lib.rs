//! Library side of the `elr` command: logging setup and the conversion
//! pipeline shared by the binary and its integration tests.

pub mod logging;
pub mod pipeline;
