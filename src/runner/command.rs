// Per-phase timeouts are properties of the runner, not of the request.
// Bounding each phase inside the container means a hung compiler cannot
// consume the run phase's budget.
pub(super) const COMPILE_TIMEOUT_SECS: u32 = 30;
pub(super) const RUN_TIMEOUT_SECS: u32 = 15;

/// Directory the source archive is unpacked into before start
pub(super) const WORKSPACE_DIR: &str = "/tmp/workspace";

/// Directory the in-container command writes its captures to
pub(super) const OUTPUT_DIR: &str = "/tmp/dist";

/// Basename of [`OUTPUT_DIR`]; the fetched archive roots its entries here
pub(super) const OUTPUT_DIR_NAME: &str = "dist";

pub(super) const COMPILE_PREFIX: &str = "compile_";

/// Composes the single shell command line the container executes on start.
///
/// The compile phase, when present, is joined to the run phase with `&&`,
/// so the run step only executes if compilation exits zero. A blank
/// compile command means there is no compile phase at all: the run phase
/// stands alone and no `compile_`-prefixed captures are ever written.
pub(super) fn build_command(compile_command: &str, run_command: &str) -> String {
    let run = phase_command(run_command, RUN_TIMEOUT_SECS, "");

    if compile_command.trim().is_empty() {
        return run;
    }

    // Multi-statement compile fragments run as one unit under an inner
    // shell. The fragment is escaped so it reaches that shell literally.
    let wrapped = format!("bash -c \"{}\"", escape_double_quoted(compile_command));
    let compile = phase_command(&wrapped, COMPILE_TIMEOUT_SECS, COMPILE_PREFIX);

    format!("{compile} && {run}")
}

/// Builds one phase of the command line: wall-clock measurement wrapping a
/// timeout bound, with stdout/stderr redirected to the phase's capture
/// files under [`OUTPUT_DIR`].
fn phase_command(base_command: &str, timeout_secs: u32, prefix: &str) -> String {
    format!(
        "/usr/bin/time -q -f %e -o {OUTPUT_DIR}/{prefix}time.txt \
         timeout {timeout_secs} {base_command} \
         > {OUTPUT_DIR}/{prefix}stdout.txt \
         2> {OUTPUT_DIR}/{prefix}stderr.txt"
    )
}

/// Escapes a shell fragment for embedding between double quotes
///
/// Backslash, double quote, dollar and backtick are the characters the
/// outer shell would otherwise interpret inside a double-quoted region.
fn escape_double_quoted(fragment: &str) -> String {
    let mut escaped = String::with_capacity(fragment.len());
    for c in fragment.chars() {
        if matches!(c, '\\' | '"' | '$' | '`') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
