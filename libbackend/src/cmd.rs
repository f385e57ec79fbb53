use std::process::Command;

use crate::error::Error;

/// Run a host command, discarding its output.
pub fn run(program: &str, args: &[&str]) -> Result<(), Error> {
    output(program, args).map(|_| ())
}

/// Run a host command and return its trimmed stdout.
pub fn output(program: &str, args: &[&str]) -> Result<String, Error> {
    tracing::debug!("running {} {}", program, args.join(" "));
    let out = Command::new(program)
        .args(args)
        .output()
        .map_err(|e| Error::CommandFailed {
            program: program.to_string(),
            detail: e.to_string(),
        })?;

    if !out.status.success() {
        let stderr = String::from_utf8_lossy(&out.stderr);
        let detail = match stderr.trim() {
            "" => out.status.to_string(),
            msg => msg.to_string(),
        };
        return Err(Error::CommandFailed {
            program: program.to_string(),
            detail,
        });
    }

    Ok(String::from_utf8_lossy(&out.stdout).trim().to_string())
}
