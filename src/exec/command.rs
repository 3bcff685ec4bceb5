//! Effective-command synthesis for the stdin-closing workaround.
//!
//! The exec transport has no way to half-close the duplex stream, so a
//! remote filter that reads stdin to end-of-input would block forever. When
//! the caller supplies stdin and asks for it to be closed, the literal
//! command is replaced by a shell pipeline whose first stage reads exactly
//! the stdin's byte length and then stops, letting the second stage observe
//! end-of-input deterministically. POSIX defines the pipeline's exit code as
//! that of the last stage, so the caller's exit code is preserved.

use super::ExecOptions;

/// Build the command actually sent to the exec endpoint.
///
/// With stdin present and `close_stdin` set, returns
/// `/bin/sh -c 'dd count=1 bs=<N> status=none | <quoted command>'` where N
/// is the stdin length in bytes (not characters). Otherwise the command is
/// passed through untouched. Requires `dd` and `/bin/sh` in the container;
/// callers that cannot rely on those must set `close_stdin: false` and
/// frame their input themselves.
pub(crate) fn effective_command(command: &[String], options: &ExecOptions) -> Vec<String> {
    match options.stdin.as_deref() {
        Some(stdin) if !stdin.is_empty() && options.close_stdin => vec![
            "/bin/sh".to_string(),
            "-c".to_string(),
            format!(
                "dd count=1 bs={} status=none | {}",
                stdin.len(),
                shell_words::join(command)
            ),
        ],
        _ => command.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn strings(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn passthrough_without_stdin() {
        let command = strings(&["ls", "-la"]);
        let options = ExecOptions::new();

        assert_eq!(effective_command(&command, &options), command);
    }

    #[test]
    fn passthrough_when_close_stdin_disabled() {
        let command = strings(&["cat"]);
        let options = ExecOptions::new().stdin("hello").close_stdin(false);

        assert_eq!(effective_command(&command, &options), command);
    }

    #[test]
    fn empty_stdin_behaves_like_no_stdin() {
        let command = strings(&["cat"]);
        let options = ExecOptions::new().stdin(Vec::new());

        assert_eq!(effective_command(&command, &options), command);
    }

    #[test]
    fn synthesizes_counting_pipeline() {
        let command = strings(&["cat"]);
        let options = ExecOptions::new().stdin("hello");

        assert_eq!(
            effective_command(&command, &options),
            strings(&["/bin/sh", "-c", "dd count=1 bs=5 status=none | cat"])
        );
    }

    #[test]
    fn prefix_counts_bytes_for_multibyte_text() {
        let command = strings(&["wc", "-c"]);
        // 5 characters, 7 bytes in UTF-8.
        let stdin = "héllö";
        assert_eq!(stdin.chars().count(), 5);
        assert_eq!(stdin.len(), 7);

        let options = ExecOptions::new().stdin(stdin);
        let synthesized = effective_command(&command, &options);

        assert_eq!(
            synthesized[2],
            "dd count=1 bs=7 status=none | wc -c".to_string()
        );
    }

    #[test]
    fn quotes_command_arguments() {
        let command = strings(&["echo", "a b"]);
        let options = ExecOptions::new().stdin("x");
        let synthesized = effective_command(&command, &options);

        assert_eq!(synthesized[0], "/bin/sh");
        assert_eq!(synthesized[1], "-c");
        assert_eq!(synthesized[2], "dd count=1 bs=1 status=none | echo 'a b'");

        // The pipeline must round-trip through the shell unchanged.
        let reparsed = shell_words::split("echo 'a b'").unwrap();
        assert_eq!(reparsed, command);
    }

    proptest! {
        // The counting prefix must equal the encoded byte length of stdin
        // for any text, not its character count.
        #[test]
        fn prefix_always_matches_byte_length(input in ".{1,64}") {
            let command = strings(&["cat"]);
            let options = ExecOptions::new().stdin(input.clone());
            let synthesized = effective_command(&command, &options);

            prop_assert_eq!(synthesized.len(), 3);
            let expected = format!("dd count=1 bs={} status=none | cat", input.len());
            prop_assert_eq!(&synthesized[2], &expected);
        }
    }
}
