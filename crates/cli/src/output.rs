use eyre::{Result, WrapErr};
use serde::Serialize;
use std::io::Write;

/// Write `value` to stdout as pretty JSON followed by a newline
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).wrap_err("failed to render output")?;
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{rendered}").wrap_err("failed to write output")?;
    Ok(())
}
