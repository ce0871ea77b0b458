// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Live-state output handling.
//!
//! `wsl.exe` is an unreliable narrator. Listing running distributions exits
//! with a failure status when nothing is running, yet still prints a
//! localized "There are no running distributions." line. On the other hand,
//! a directive that exits cleanly without printing anything did not
//! necessarily do what it was asked. So exit status and output emptiness are
//! classified together before anyone acts on them.

use crate::channel::ProcessOutput;

use std::collections::HashSet;

/// Classification of a finished directive by status and output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputClass {
    /// Zero status with output.
    Confirmed,

    /// Zero status without output.
    Unconfirmed,

    /// Failure status, but output to go on.
    Degraded,

    /// Failure status and nothing to show for it.
    Failed,
}

impl OutputClass {
    /// Classify process output.
    pub fn of(output: &ProcessOutput) -> Self {
        match (output.exited_successfully(), output.has_output()) {
            (true, true) => Self::Confirmed,
            (true, false) => Self::Unconfirmed,
            (false, true) => Self::Degraded,
            (false, false) => Self::Failed,
        }
    }
}

/// Parse output of `wsl.exe --list --running`.
///
/// The first line is always dropped; it is either the localized "none
/// running" notice or a column banner. Every other non-blank line starts
/// with a distribution name, optionally followed by an annotation such as
/// "(Default)". Distribution names cannot contain whitespace.
pub fn parse_running_names(text: &str) -> HashSet<String> {
    text.lines()
        .skip(1)
        .filter_map(|line| line.split_whitespace().next())
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::decode_output;
    use indoc::indoc;
    use simple_test_case::test_case;

    #[test_case(Some(0), "Debian\n", OutputClass::Confirmed; "clean with output")]
    #[test_case(Some(0), "", OutputClass::Unconfirmed; "clean without output")]
    #[test_case(Some(1), "There are no running distributions.\n", OutputClass::Degraded; "failed with output")]
    #[test_case(Some(1), "", OutputClass::Failed; "failed without output")]
    #[test_case(None, "", OutputClass::Failed; "killed")]
    #[test]
    fn classify_output(code: Option<i32>, stdout: &str, expect: OutputClass) {
        let output = ProcessOutput::new(code, stdout, "");
        assert_eq!(OutputClass::of(&output), expect);
    }

    #[test]
    fn parse_names_after_banner() {
        let text = indoc! {"
            Windows Subsystem for Linux Distributions:
            Alpha (Default)
            Beta

        "};

        let expect: HashSet<String> = ["Alpha", "Beta"].map(String::from).into_iter().collect();
        assert_eq!(parse_running_names(text), expect);
    }

    #[test]
    fn parse_names_with_crlf_and_padding() {
        let text = "Banner\r\nUbuntu-22.04 (Default)\r\n   docker-desktop   \r\n\r\n";

        let expect: HashSet<String> = ["Ubuntu-22.04", "docker-desktop"]
            .map(String::from)
            .into_iter()
            .collect();
        assert_eq!(parse_running_names(text), expect);
    }

    #[test]
    fn parse_names_after_non_latin_banner() {
        let bytes = "上 Linux\r\nAlpha\r\n"
            .encode_utf16()
            .flat_map(u16::to_le_bytes)
            .collect::<Vec<_>>();

        let expect: HashSet<String> = ["Alpha"].map(String::from).into_iter().collect();
        assert_eq!(parse_running_names(&decode_output(&bytes)), expect);
    }

    #[test_case("There are no running distributions.\n"; "notice only")]
    #[test_case(""; "nothing")]
    #[test]
    fn parse_nothing_running(text: &str) {
        assert!(parse_running_names(text).is_empty());
    }
}
