//! POSIX shell quoting for commands that cross an exec boundary.
//!
//! Every command rewritten into the container-indirection invocation goes
//! through this module. Building the wrapped invocation from a structured
//! program + argument list and one quoting function keeps ad hoc string
//! concatenation (and its injection risk) out of the call sites.

/// Quote one word for a POSIX shell.
///
/// Words made of safe characters pass through unchanged; everything else is
/// single-quoted, with embedded single quotes escaped via the `'\''` idiom.
pub fn sh_quote(word: &str) -> String {
    let safe = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_-./=:@%+,".contains(c));
    if safe {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}

/// A program invocation as a structured argument list, rendered into a
/// single shell-safe command line.
#[derive(Debug, Clone)]
pub struct ShellLine {
    program: String,
    args: Vec<String>,
}

impl ShellLine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Render the invocation with every argument quoted.
    pub fn render(&self) -> String {
        let mut line = sh_quote(&self.program);
        for arg in &self.args {
            line.push(' ');
            line.push_str(&sh_quote(arg));
        }
        line
    }
}

impl std::fmt::Display for ShellLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_words_pass_through() {
        assert_eq!(sh_quote("systemctl"), "systemctl");
        assert_eq!(sh_quote("/usr/bin/id"), "/usr/bin/id");
        assert_eq!(sh_quote("--flag=value"), "--flag=value");
    }

    #[test]
    fn test_spaces_and_metacharacters_are_quoted() {
        assert_eq!(sh_quote("a b"), "'a b'");
        assert_eq!(sh_quote("$(reboot)"), "'$(reboot)'");
        assert_eq!(sh_quote(""), "''");
    }

    #[test]
    fn test_single_quote_escaping() {
        assert_eq!(sh_quote("it's"), r"'it'\''s'");
    }

    #[test]
    fn test_shell_line_render() {
        let line = ShellLine::new("appctl")
            .arg("exec")
            .arg("--")
            .args(["sh", "-c"])
            .arg("echo 'hi there'");
        assert_eq!(line.render(), r"appctl exec -- sh -c 'echo '\''hi there'\'''");
    }

    // Round-trip: unquoting the rendered line with POSIX rules yields the
    // original words. A real-shell version of this lives in the host
    // integration tests.
    #[test]
    fn test_quote_round_trip() {
        fn unquote(rendered: &str) -> Vec<String> {
            let mut words = Vec::new();
            let mut current = String::new();
            let mut chars = rendered.chars().peekable();
            let mut in_quotes = false;
            let mut started = false;
            while let Some(c) = chars.next() {
                match c {
                    '\'' => {
                        in_quotes = !in_quotes;
                        started = true;
                    }
                    '\\' if !in_quotes => {
                        if let Some(escaped) = chars.next() {
                            current.push(escaped);
                        }
                        started = true;
                    }
                    ' ' if !in_quotes => {
                        if started {
                            words.push(std::mem::take(&mut current));
                            started = false;
                        }
                    }
                    other => {
                        current.push(other);
                        started = true;
                    }
                }
            }
            if started {
                words.push(current);
            }
            words
        }

        let original = vec!["sh", "-c", r#"echo "don't panic" | grep -c 'pan ic'"#];
        let line = ShellLine::new(original[0]).args(original[1..].to_vec());
        assert_eq!(unquote(&line.render()), original);
    }
}
