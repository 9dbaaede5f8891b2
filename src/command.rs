//! Command table model and the matching helpers behind dispatch and
//! completion.

use heapless::Vec;

/// Single-call capability invoked when a command dispatches.
///
/// Blanket-implemented for closures and `fn` items, so a table can mix
/// stateless functions with context-bound actions.
pub trait Action {
    fn invoke(&self, args: &[&str]);
}

impl<F: Fn(&[&str])> Action for F {
    fn invoke(&self, args: &[&str]) {
        self(args)
    }
}

/// One registered command.
///
/// `name` may contain embedded spaces to group subcommands (`"i2c read"`);
/// the full-table help listing collapses such names to their leading
/// token. An entry with `action: None` is a grouping placeholder: it
/// participates in matching and listings but is never invoked.
pub struct Command<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub action: Option<&'a dyn Action>,
    /// Minimum number of arguments the action requires. Submissions with
    /// fewer fall through to the help listing instead of invoking.
    pub required_args: usize,
}

/// Source of the current command table.
///
/// Consulted on every dispatch and completion, so an embedder can swap
/// tables at runtime. Fixed slices and arrays work directly.
pub trait CommandSet {
    fn commands(&self) -> &[Command<'_>];
}

impl<'a> CommandSet for [Command<'a>] {
    fn commands(&self) -> &[Command<'_>] {
        self
    }
}

impl<'a, const N: usize> CommandSet for [Command<'a>; N] {
    fn commands(&self) -> &[Command<'_>] {
        self.as_slice()
    }
}

/// Longest registered name that is a literal prefix of `line`.
///
/// Matching candidates necessarily have distinct lengths (two distinct
/// equal-length names cannot both prefix the same line), so the winner is
/// unique and grouped subcommands beat their parent regardless of table
/// order.
pub(crate) fn find_match<'c, 'a>(
    commands: &'c [Command<'a>],
    line: &str,
) -> Option<&'c Command<'a>> {
    let mut best: Option<&Command> = None;
    for command in commands {
        if line.as_bytes().starts_with(command.name.as_bytes())
            && best.map_or(true, |b| command.name.len() > b.name.len())
        {
            best = Some(command);
        }
    }
    best
}

/// Byte comparison up to the shorter of the two strings: `true` when
/// `input` could still grow into `name` or already extends past it.
pub(crate) fn matches_partial(name: &str, input: &str) -> bool {
    let shorter = name.len().min(input.len());
    name.as_bytes()[..shorter] == input.as_bytes()[..shorter]
}

/// Leading group token of a command name (up to the first space).
pub(crate) fn group_of(name: &str) -> &str {
    match name.find(' ') {
        Some(space) => &name[..space],
        None => name,
    }
}

/// Splits the text after a matched name into at most `N` arguments.
/// Repeated and trailing spaces produce no tokens; tokens past `N` are
/// dropped.
pub(crate) fn tokenize<const N: usize>(rest: &str) -> Vec<&str, N> {
    let mut args = Vec::new();
    for token in rest.split_whitespace() {
        if args.push(token).is_err() {
            break;
        }
    }
    args
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop;

    impl Action for Noop {
        fn invoke(&self, _args: &[&str]) {}
    }

    static NOOP: Noop = Noop;

    fn table() -> [Command<'static>; 3] {
        [
            Command {
                name: "i2c",
                description: "I2C group",
                action: Some(&NOOP),
                required_args: 0,
            },
            Command {
                name: "i2c read",
                description: "I2C read",
                action: Some(&NOOP),
                required_args: 3,
            },
            Command {
                name: "info",
                description: "System info",
                action: Some(&NOOP),
                required_args: 0,
            },
        ]
    }

    #[test]
    fn longest_name_wins_regardless_of_order() {
        let commands = table();
        let matched = find_match(&commands, "i2c read 1 2 3");
        assert_eq!(matched.map(|c| c.name), Some("i2c read"));
    }

    #[test]
    fn parent_matches_when_subcommand_does_not() {
        let commands = table();
        assert_eq!(
            find_match(&commands, "i2c write 1").map(|c| c.name),
            Some("i2c")
        );
    }

    #[test]
    fn matching_is_a_literal_prefix_comparison() {
        let commands = table();
        // no word-boundary rule: "infoo" still begins with "info"
        assert_eq!(find_match(&commands, "infoo").map(|c| c.name), Some("info"));
        assert!(find_match(&commands, "i2").is_none());
    }

    #[test]
    fn partial_match_compares_up_to_the_shorter_length() {
        assert!(matches_partial("i2c read", "i2"));
        assert!(matches_partial("i2c read", "i2c read 1 2"));
        assert!(!matches_partial("info", "i2"));
        assert!(matches_partial("info", ""));
    }

    #[test]
    fn group_token_stops_at_the_first_space() {
        assert_eq!(group_of("i2c read"), "i2c");
        assert_eq!(group_of("info"), "info");
    }

    #[test]
    fn tokenize_discards_redundant_whitespace() {
        for rest in [" 1 2 3", " 1 2 3 ", "  1  2  3  "] {
            let args: Vec<&str, 8> = tokenize(rest);
            assert_eq!(args.as_slice(), &["1", "2", "3"]);
        }
    }

    #[test]
    fn tokenize_caps_the_argument_count() {
        let args: Vec<&str, 3> = tokenize(" a b c d e");
        assert_eq!(args.as_slice(), &["a", "b", "c"]);
    }

    #[test]
    fn tokenize_of_empty_rest_is_empty() {
        let args: Vec<&str, 3> = tokenize("");
        assert!(args.is_empty());
    }
}
