// Licensed under the Apache-2.0 license

//! Host-side fakes and image builders for exercising the secure monitor
//! boot flow.

mod anchor;
mod builder;
mod fatal;
mod platform;

pub use anchor::*;
pub use builder::*;
pub use fatal::*;
pub use platform::*;

use std::fmt::Write;
use std::sync::Once;

struct StdoutWriter;

impl Write for StdoutWriter {
    fn write_str(&mut self, s: &str) -> std::fmt::Result {
        print!("{}", s);
        Ok(())
    }
}

static CONSOLE: Once = Once::new();

/// Routes `montime::println!` output to the test's stdout.
pub fn enable_console() {
    CONSOLE.call_once(|| {
        montime::set_printer(Box::leak(Box::new(StdoutWriter)));
    });
}
