// src/parse.rs

//! Turning raw script text into discrete shell commands.
//!
//! Scripts are split on `\n`, each line is trimmed, and blank lines and
//! `#` comments are dropped. Nothing else is interpreted; the host shell
//! owns the actual syntax.

/// Flatten `scripts` into an ordered list of non-empty, non-comment commands.
pub fn parse_commands<S: AsRef<str>>(scripts: &[S]) -> Vec<String> {
    scripts
        .iter()
        .flat_map(|script| script.as_ref().split('\n'))
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Join commands into one `&&` chain so the shell short-circuits on failure.
pub fn join_commands(commands: &[String]) -> String {
    commands.join(" && ")
}
